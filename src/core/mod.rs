pub mod error;

pub use error::{Result, StoreError};

/// JSON object used as the raw document body by stores and scripts.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;
