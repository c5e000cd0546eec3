use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Raw paging parameters as received on the query string.
///
/// Values are kept as text so that garbage normalizes to the defaults instead
/// of failing extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl PageQuery {
    /// Collects paging values from decoded query pairs. `pageSize` and `limit`
    /// are aliases of `page_size`; when a parameter repeats, the last value
    /// wins. Other parameters are ignored.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_ref() {
                "page" => query.page = Some(value.into()),
                "page_size" | "pageSize" | "limit" => query.page_size = Some(value.into()),
                _ => {}
            }
        }
        query
    }

    pub fn normalize(&self) -> PageRequest {
        PageRequest::normalize(
            self.page.as_deref().and_then(parse_number),
            self.page_size.as_deref().and_then(parse_number),
        )
    }
}

fn parse_number(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

/// Effective page descriptor; both values are always >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// `page < 1` becomes 1 and `page_size < 1` becomes 10; absent values take
    /// the same defaults.
    pub fn normalize(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = match page {
            Some(page) if page >= 1 => u32::try_from(page).unwrap_or(u32::MAX),
            _ => DEFAULT_PAGE,
        };
        let page_size = match page_size {
            Some(size) if size >= 1 => u32::try_from(size).unwrap_or(u32::MAX),
            _ => DEFAULT_PAGE_SIZE,
        };
        Self { page, page_size }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// `(page - 1) * page_size`, saturating.
    pub fn skip(&self) -> usize {
        (self.page as usize - 1).saturating_mul(self.page_size as usize)
    }

    pub fn limit(&self) -> usize {
        self.page_size as usize
    }
}

/// One page of results together with the effective paging values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub results: Vec<T>,
    pub page: u32,
    pub page_size: u32,
}

impl<T> PagedResult<T> {
    pub fn new(results: Vec<T>, request: PageRequest) -> Self {
        Self {
            results,
            page: request.page(),
            page_size: request.page_size(),
        }
    }
}
