//! Key/value metadata store
//!
//! Every short code owns one entry. The entry value is unused (empty) and all
//! state lives in the attached metadata object, a JSON [`FileRecord`].
//! Writes are whole-record overwrites; concurrent writers race and the last
//! one wins.

mod memory;
mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;

/// Key/value store errors
#[derive(Debug, Error)]
pub enum KvError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(#[from] serde_json::Error),
}

/// A stored entry: value plus optional metadata object
#[derive(Debug, Clone, PartialEq)]
pub struct KvEntry {
    pub value: String,
    pub metadata: Option<serde_json::Value>,
}

/// Storage capability injected into the resolver and policy gate
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Get the value and its metadata
    async fn get_with_metadata(&self, key: &str) -> Result<Option<KvEntry>, KvError>;

    /// Store a value, replacing any previous value and metadata
    async fn put(
        &self,
        key: &str,
        value: &str,
        metadata: Option<&serde_json::Value>,
    ) -> Result<(), KvError>;
}

/// Manual allow/deny override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ListType {
    #[default]
    None,
    White,
    Block,
    /// Anything else written by older tooling
    #[serde(other)]
    Unknown,
}

impl ListType {
    /// Unknown values carry no override
    pub fn normalized(self) -> Self {
        match self {
            ListType::Unknown => ListType::None,
            other => other,
        }
    }
}

/// Moderation label that always blocks
pub const ADULT_LABEL: &str = "adult";

/// Resolution and classification state for one short code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "ListType", default)]
    pub list_type: ListType,

    /// Moderation result; None until moderated
    #[serde(rename = "Label", default, deserialize_with = "unset_label")]
    pub label: Option<String>,

    /// Creation time, milliseconds since the epoch
    #[serde(rename = "TimeStamp", default)]
    pub timestamp: i64,

    #[serde(default)]
    pub liked: bool,

    /// Native identifier with optional extension, e.g. `BQACAgE...AQ.jpg`
    #[serde(rename = "fileName", default, deserialize_with = "non_empty")]
    pub file_name: Option<String>,

    #[serde(rename = "fileSize", default)]
    pub file_size: u64,
}

impl FileRecord {
    /// New record with default classification
    pub fn new(file_name: Option<String>, file_size: u64) -> Self {
        Self {
            list_type: ListType::None,
            label: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
            liked: false,
            file_name,
            file_size,
        }
    }

    /// Check if the stored label forces a block
    pub fn is_adult(&self) -> bool {
        self.label.as_deref() == Some(ADULT_LABEL)
    }
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

// Older records spell "not moderated yet" as the string "None"
fn unset_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = non_empty(deserializer)?;
    Ok(value.filter(|s| s != "None"))
}

/// Load the record stored for `key`
///
/// An entry without metadata counts as absent.
pub async fn load_record(store: &dyn KvStore, key: &str) -> Result<Option<FileRecord>, KvError> {
    let Some(entry) = store.get_with_metadata(key).await? else {
        return Ok(None);
    };

    match entry.metadata {
        Some(metadata) if !metadata.is_null() => {
            let mut record: FileRecord = serde_json::from_value(metadata)?;
            record.list_type = record.list_type.normalized();
            Ok(Some(record))
        }
        _ => Ok(None),
    }
}

/// Overwrite the record stored for `key`
pub async fn save_record(store: &dyn KvStore, key: &str, record: &FileRecord) -> Result<(), KvError> {
    let metadata = serde_json::to_value(record)?;
    store.put(key, "", Some(&metadata)).await
}
