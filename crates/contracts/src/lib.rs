use serde::{Deserialize, Serialize};

pub mod schema;

pub use schema::{FieldDescriptor, FieldKind, RECORD_SCHEMA, RecordSchema};

/// One catalog entry as it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    pub id: String,
    #[serde(default)]
    pub isbn: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_key: Option<String>,
}

impl RawRecord {
    /// The asset key when one is present and non-empty.
    pub fn asset_key(&self) -> Option<&str> {
        self.image_key.as_deref().filter(|key| !key.is_empty())
    }
}

/// A catalog entry as returned to callers. `image_url` is empty when the
/// record has no asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub id: String,
    pub isbn: String,
    pub title: String,
    pub publisher: String,
    pub authors: Vec<String>,
    pub genres: Vec<String>,
    pub image_url: String,
}
