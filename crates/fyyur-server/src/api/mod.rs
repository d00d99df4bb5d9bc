pub mod artists;
pub mod shows;
pub mod venues;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// Name-search result: the matching rows plus their count.
#[derive(Debug, Serialize)]
pub struct SearchResponse<T> {
    pub count: usize,
    pub data: Vec<T>,
}

/// Build an ILIKE pattern for a case-insensitive substring match.
/// LIKE wildcards in the term are escaped; an empty term matches every row.
pub(crate) fn ilike_pattern(term: &str) -> String {
    let escaped = term.trim().replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}
