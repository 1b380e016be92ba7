//! Normalized item types.
//!
//! Every provider converts its upstream content (tasks, calendar events,
//! pages, notebook pages, videos) into an [`Item`]. The item id is derived
//! from the provider name and the upstream id, and the metadata always keeps
//! both so a later import can recognize content it has already seen.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The semantic type of a normalized item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Task,
    Event,
    Note,
    Goal,
    Routine,
}

impl ItemType {
    /// All item types, in display order.
    pub const ALL: [ItemType; 5] = [
        ItemType::Task,
        ItemType::Event,
        ItemType::Note,
        ItemType::Goal,
        ItemType::Routine,
    ];

    /// Returns the wire name of this item type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Event => "event",
            Self::Note => "note",
            Self::Goal => "goal",
            Self::Routine => "routine",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown item type: {}", s))
    }
}

/// Provenance of an item.
///
/// `source` and `original_id` are what makes re-import idempotent; they are
/// never rewritten after the item is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    /// The provider name (e.g. `"todoist"`).
    pub source: String,
    /// The upstream identifier of the content.
    pub original_id: String,
    /// Provider-specific extras (url, priority, calendar name, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// Builds the deterministic item id for an upstream object.
pub fn item_id(source: &str, original_id: &str) -> String {
    format!("{}-{}", source, original_id)
}

/// A provider-agnostic item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// `"{source}-{original_id}"`.
    pub id: String,
    /// Semantic type.
    pub item_type: ItemType,
    /// Title (task content, event summary, page title).
    pub title: String,
    /// Plain-text body.
    #[serde(default)]
    pub body: String,
    /// Category the item is filed under.
    #[serde(default)]
    pub category: String,
    /// Due date for tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    /// Start of an event occurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    /// End of an event occurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    /// Whether the occurrence spans whole days.
    #[serde(default)]
    pub all_day: bool,
    /// Whether the item was already done upstream.
    #[serde(default)]
    pub completed: bool,
    /// When this item was created locally.
    pub created_at: DateTime<Utc>,
    /// Provenance.
    pub metadata: ItemMetadata,
}

impl Item {
    /// Creates an item for the given upstream object.
    pub fn new(
        source: impl Into<String>,
        original_id: impl Into<String>,
        item_type: ItemType,
        title: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let original_id = original_id.into();
        Self {
            id: item_id(&source, &original_id),
            item_type,
            title: title.into(),
            body: String::new(),
            category: String::new(),
            due_at: None,
            starts_at: None,
            ends_at: None,
            all_day: false,
            completed: false,
            created_at: Utc::now(),
            metadata: ItemMetadata {
                source,
                original_id,
                extra: Map::new(),
            },
        }
    }

    /// Builder method to set the body text.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Builder method to set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Builder method to set the due date.
    pub fn with_due(mut self, due_at: Option<DateTime<Utc>>) -> Self {
        self.due_at = due_at;
        self
    }

    /// Builder method to set the occurrence.
    pub fn with_schedule(mut self, starts_at: DateTime<Utc>, ends_at: Option<DateTime<Utc>>) -> Self {
        self.starts_at = Some(starts_at);
        self.ends_at = ends_at;
        self
    }

    /// Builder method to mark the occurrence as all-day.
    pub fn with_all_day(mut self, all_day: bool) -> Self {
        self.all_day = all_day;
        self
    }

    /// Builder method to set the completion flag.
    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// Builder method to attach a metadata extra. `Null` values are skipped.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.metadata.extra.insert(key.into(), value);
        }
        self
    }

    /// Returns the provider name this item came from.
    pub fn source(&self) -> &str {
        &self.metadata.source
    }

    /// Returns the upstream identifier.
    pub fn original_id(&self) -> &str {
        &self.metadata.original_id
    }

    /// Returns a metadata extra as a string, if present.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.metadata.extra.get(key).and_then(Value::as_str)
    }

    /// Returns the most relevant point in time for this item.
    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        self.starts_at.or(self.due_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn item_id_is_provider_prefixed() {
        let item = Item::new("todoist", "12345", ItemType::Task, "Buy milk");
        assert_eq!(item.id, "todoist-12345");
        assert_eq!(item.source(), "todoist");
        assert_eq!(item.original_id(), "12345");
    }

    #[test]
    fn builder_sets_fields() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let item = Item::new("google_calendar", "evt1", ItemType::Event, "Standup")
            .with_body("daily sync")
            .with_category("Calendar")
            .with_schedule(start, Some(end))
            .with_extra("location", "Room 1")
            .with_extra("missing", Value::Null);

        assert_eq!(item.body, "daily sync");
        assert_eq!(item.category, "Calendar");
        assert_eq!(item.scheduled_at(), Some(start));
        assert_eq!(item.ends_at, Some(end));
        assert_eq!(item.extra_str("location"), Some("Room 1"));
        assert!(!item.metadata.extra.contains_key("missing"));
    }

    #[test]
    fn item_type_parsing() {
        assert_eq!("Task".parse::<ItemType>().unwrap(), ItemType::Task);
        assert_eq!(" routine ".parse::<ItemType>().unwrap(), ItemType::Routine);
        assert!("video".parse::<ItemType>().is_err());
    }

    #[test]
    fn item_serde_keeps_provenance() {
        let item = Item::new("notion", "page-1", ItemType::Note, "Ideas").with_extra("url", "https://x");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["item_type"], "note");
        assert_eq!(json["metadata"]["source"], "notion");
        assert_eq!(json["metadata"]["original_id"], "page-1");

        let back: Item = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }
}
