//! Payload shapes delivered by the network collaborator. Sizes and ids in
//! these structs come from the server and are never trusted locally: the
//! importer recomputes sizes and allocates its own ids.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocumentGroup {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub language: String,
    #[serde(default, alias = "children")]
    pub groups: Option<Vec<RemoteDocumentGroup>>,
    #[serde(default, alias = "leaves")]
    pub items: Option<Vec<RemoteDocument>>,
    pub created_at: String,
    pub modified_at: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub size: i64,
}

impl RemoteDocumentGroup {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// True when the group carries neither child groups nor documents.
    pub fn is_empty(&self) -> bool {
        self.groups.as_ref().is_none_or(Vec::is_empty)
            && self.items.as_ref().is_none_or(Vec::is_empty)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDocument {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub content: String,
    pub language: String,
    #[serde(default)]
    pub index: i64,
    pub created_at: String,
    pub modified_at: String,
    #[serde(default)]
    pub uuid: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSongBundle {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub abbreviation: String,
    pub name: String,
    pub language: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub copyright: String,
    #[serde(default)]
    pub songs: Option<Vec<RemoteSong>>,
    pub created_at: String,
    pub modified_at: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub hash: Option<String>,
}

impl RemoteSongBundle {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_empty(&self) -> bool {
        self.songs.as_ref().is_none_or(Vec::is_empty)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSong {
    /// Server id; only used to order songs inside their bundle.
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub number: Option<i64>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub copyright: String,
    pub language: String,
    #[serde(default)]
    pub verses: Option<Vec<RemoteVerse>>,
    pub created_at: String,
    pub modified_at: String,
    #[serde(default)]
    pub uuid: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVerse {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub content: String,
    pub language: String,
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub uuid: String,
}

/// Parse an ISO-8601 timestamp from the server. Offsets are honoured; strings
/// without an offset are read as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| StoreError::InvalidTimestamp(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_offset_and_naive_timestamps() {
        let with_offset = parse_timestamp("2024-03-01T10:15:00+02:00").unwrap();
        assert_eq!(with_offset.hour(), 8);

        let naive = parse_timestamp("2024-03-01T10:15:00.123").unwrap();
        assert_eq!(naive.day(), 1);
        assert_eq!(naive.hour(), 10);
    }

    #[test]
    fn rejects_garbage_timestamps() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(matches!(err, StoreError::InvalidTimestamp(value) if value == "yesterday"));
    }

    #[test]
    fn accepts_children_and_leaves_aliases() {
        let group = RemoteDocumentGroup::from_json(
            r#"{
                "name": "Catechism",
                "language": "EN",
                "createdAt": "2024-01-01T00:00:00Z",
                "modifiedAt": "2024-01-01T00:00:00Z",
                "children": [],
                "leaves": [{
                    "name": "Lord's Day 1",
                    "content": "<p>Q1</p>",
                    "language": "EN",
                    "index": 0,
                    "createdAt": "2024-01-01T00:00:00Z",
                    "modifiedAt": "2024-01-01T00:00:00Z"
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(group.items.as_ref().map(Vec::len), Some(1));
        assert!(!group.is_empty());
    }

    #[test]
    fn group_without_children_or_items_is_empty() {
        let group = RemoteDocumentGroup {
            name: "Empty".to_string(),
            groups: Some(Vec::new()),
            ..Default::default()
        };
        assert!(group.is_empty());
    }
}
