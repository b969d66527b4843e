use serde::{Deserialize, Deserializer, Serialize};

/// Pagination block of a list response. The backend writes snake_case
/// (`total_pages`, `total`); both spellings are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(rename = "totalPages", alias = "total_pages", default = "first_page")]
    pub total_pages: u32,
    #[serde(rename = "totalResults", alias = "total", default)]
    pub total_results: Option<u64>,
}

fn first_page() -> u32 {
    1
}

impl Default for PaginationMeta {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 0,
            total_pages: 1,
            total_results: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde(default = "Vec::new", deserialize_with = "null_as_empty")]
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: PaginationMeta,
}

// Go encodes an empty result slice as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            meta: PaginationMeta::default(),
        }
    }
}
