//! Generic resource controller: paging, projection, change sets and the
//! authorization hooks that concrete resources override.

pub mod changeset;
pub mod controller;
pub mod error;
pub mod mapper;
pub mod paging;

pub use changeset::ChangeSet;
pub use controller::{Created, PatchOutcome, Resource, ResourceController};
pub use error::{ResourceError, ResourceResult};
pub use mapper::ProjectionMapper;
pub use paging::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE, PageQuery, PageRequest, PagedResult};
