use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

pub mod artist;
pub mod show;
pub mod venue;

/// Ordered genre list, stored as a JSONB column on venues and artists.
/// Serializes transparently as a plain JSON array of strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Genres(pub Vec<String>);

impl Genres {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for Genres {
    fn from(v: Vec<String>) -> Self {
        Genres(v)
    }
}
