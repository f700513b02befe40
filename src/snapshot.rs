//! Immutable snapshot of a fetched teaser listing.
//!
//! A snapshot is an ordered capture of the teasers one monitor saw at one
//! point in time. Snapshots have structural equality and are compared, never
//! mutated in place; the comparator returns a fresh diff snapshot.
//!
//! The serialized form is a self-describing document keyed by the content-type
//! tag, with a sibling item count:
//!
//! ```json
//! {
//!     "page": [
//!         { "title": "Annual report", "published_date": "2026-03-01", "url": "https://example.org/report" }
//!     ],
//!     "count": 1
//! }
//! ```
//!
//! Video items carry `video_id` instead of `url`; event items carry
//! `start_date` instead of `published_date`.

use std::fmt;

use chrono::NaiveDate;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::teaser::{ContentKind, Teaser};

/// Errors reading or writing snapshot documents.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The document has no recognized content-type tag key.
    #[error("snapshot document has no recognized content tag")]
    MissingTag,

    /// The declared count does not match the item array.
    #[error("snapshot count mismatch: declared {declared}, actual {actual}")]
    CountMismatch {
        /// Value of the `count` key.
        declared: u64,
        /// Length of the item array.
        actual: usize,
    },

    /// An item object is malformed.
    #[error("invalid snapshot item at index {index}: {reason}")]
    InvalidItem {
        /// Position in the item array.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// Two snapshots of different kinds were combined.
    #[error("snapshot kind mismatch: expected {expected}, got {actual}")]
    KindMismatch {
        /// Kind of the stored snapshot.
        expected: ContentKind,
        /// Kind of the offending snapshot.
        actual: ContentKind,
    },
}

/// An ordered, immutable capture of teaser items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    kind: ContentKind,
    items: Vec<Teaser>,
}

impl Snapshot {
    /// Creates a snapshot from an ordered item list.
    #[must_use]
    pub fn new(kind: ContentKind, items: Vec<Teaser>) -> Self {
        Self { kind, items }
    }

    /// Creates an empty snapshot, as held by a freshly configured monitor.
    #[must_use]
    pub fn empty(kind: ContentKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
        }
    }

    /// Content kind of every item in this snapshot.
    #[must_use]
    pub const fn kind(&self) -> ContentKind {
        self.kind
    }

    /// The captured items, in fetch order.
    #[must_use]
    pub fn items(&self) -> &[Teaser] {
        &self.items
    }

    /// Number of captured items.
    #[must_use]
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the snapshot holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stable content digest over the canonical document.
    ///
    /// Two snapshots with identical kind, order, items, and annotations share
    /// a digest.
    #[must_use]
    pub fn digest(&self) -> String {
        let doc = self.to_document();
        let canonical = doc.to_string();
        blake3::hash(canonical.as_bytes()).to_hex().to_string()
    }

    /// Serializes into the tag-keyed document form.
    #[must_use]
    pub fn to_document(&self) -> Value {
        let items: Vec<Value> = self
            .items
            .iter()
            .map(|t| item_to_object(self.kind, t))
            .collect();
        let mut doc = Map::new();
        doc.insert(self.kind.tag().to_string(), Value::Array(items));
        doc.insert("count".to_string(), Value::from(self.items.len()));
        Value::Object(doc)
    }

    /// Reads a snapshot back from its document form.
    ///
    /// # Errors
    /// Returns [`SnapshotError`] when the document carries no known tag, the
    /// declared count disagrees with the item array, or an item is malformed.
    pub fn from_document(value: &Value) -> Result<Self, SnapshotError> {
        let obj = value.as_object().ok_or(SnapshotError::MissingTag)?;

        let (kind, raw_items) = obj
            .iter()
            .find_map(|(key, v)| ContentKind::from_tag(key).map(|kind| (kind, v)))
            .ok_or(SnapshotError::MissingTag)?;

        let raw_items = raw_items.as_array().ok_or_else(|| SnapshotError::InvalidItem {
            index: 0,
            reason: "item list is not an array".to_string(),
        })?;

        let mut items = Vec::with_capacity(raw_items.len());
        for (index, raw) in raw_items.iter().enumerate() {
            items.push(teaser_from_object(kind, raw).map_err(|reason| {
                SnapshotError::InvalidItem { index, reason }
            })?);
        }

        if let Some(declared) = obj.get("count").and_then(Value::as_u64) {
            if declared as usize != items.len() {
                return Err(SnapshotError::CountMismatch {
                    declared,
                    actual: items.len(),
                });
            }
        }

        Ok(Self { kind, items })
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind.tag(), self.items.len())
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_document(&value).map_err(D::Error::custom)
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";

fn item_to_object(kind: ContentKind, teaser: &Teaser) -> Value {
    // Fixed field order keeps the digest stable.
    let mut obj = Map::new();
    obj.insert("title".to_string(), Value::String(teaser.title.clone()));
    if let Some(date) = teaser.date {
        obj.insert(
            kind.date_field().to_string(),
            Value::String(date.format(DATE_FORMAT).to_string()),
        );
    }
    obj.insert(
        kind.ident_field().to_string(),
        Value::String(teaser.ident.clone()),
    );
    if let Some(last_title) = &teaser.last_title {
        obj.insert("last_title".to_string(), Value::String(last_title.clone()));
    }
    if let Some(last_ident) = &teaser.last_ident {
        obj.insert(
            kind.last_ident_field().to_string(),
            Value::String(last_ident.clone()),
        );
    }
    if let Some(last_date) = teaser.last_date {
        obj.insert(
            "last_date".to_string(),
            Value::String(last_date.format(DATE_FORMAT).to_string()),
        );
    }
    Value::Object(obj)
}

fn teaser_from_object(kind: ContentKind, raw: &Value) -> Result<Teaser, String> {
    let obj = raw.as_object().ok_or("item is not an object")?;

    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .ok_or("missing title")?
        .to_string();

    let ident = obj
        .get(kind.ident_field())
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing {}", kind.ident_field()))?
        .to_string();

    let date = parse_date(obj, kind.date_field())?;
    let last_date = parse_date(obj, "last_date")?;

    let last_title = obj
        .get("last_title")
        .and_then(Value::as_str)
        .map(ToString::to_string);
    let last_ident = obj
        .get(kind.last_ident_field())
        .and_then(Value::as_str)
        .map(ToString::to_string);

    Ok(Teaser {
        title,
        date,
        ident,
        last_title,
        last_ident,
        last_date,
    })
}

fn parse_date(obj: &Map<String, Value>, field: &str) -> Result<Option<NaiveDate>, String> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map(Some)
            .map_err(|e| format!("bad {field}: {e}")),
        Some(other) => Err(format!("bad {field}: expected string, got {other}")),
    }
}
