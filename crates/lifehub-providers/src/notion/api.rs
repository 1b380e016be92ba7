//! Notion API wire types, property extraction and block rendering.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use lifehub_core::{Item, ItemType};
use serde::Deserialize;
use serde_json::Value;

use crate::provider::ProviderKind;

/// Status names that mean a database row is done.
const DONE_STATUSES: &[&str] = &["done", "complete", "completed"];

/// A cursor-paginated list (`search`, database query, block children).
#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

impl<T> ListResponse<T> {
    /// Returns the cursor for the next page, if there is one.
    pub fn continuation(&self) -> Option<String> {
        if self.has_more { self.next_cursor.clone() } else { None }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
}

/// Concatenates a rich-text array.
pub fn plain_text(parts: &[RichText]) -> String {
    parts.iter().map(|p| p.plain_text.as_str()).collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Parent {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub database_id: Option<String>,
}

/// A search result: a page or a database.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub object: String,
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub in_trash: bool,
    #[serde(default)]
    pub parent: Parent,
    /// Database title.
    #[serde(default)]
    pub title: Vec<RichText>,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub last_edited_time: Option<String>,
}

impl SearchResult {
    pub fn is_database(&self) -> bool {
        self.object == "database"
    }

    pub fn is_live(&self) -> bool {
        !self.archived && !self.in_trash
    }

    /// True for pages that are rows of a database.
    pub fn is_database_row(&self) -> bool {
        self.parent.kind == "database_id"
    }

    /// Returns the page or database title.
    pub fn display_title(&self) -> String {
        let title = if self.is_database() {
            plain_text(&self.title)
        } else {
            self.properties
                .values()
                .find(|p| property_type(p) == Some("title"))
                .and_then(|p| p.get("title"))
                .map(rich_text_value)
                .unwrap_or_default()
        };
        let title = title.trim();
        if title.is_empty() {
            "Untitled".to_string()
        } else {
            title.to_string()
        }
    }

    /// Done state from a checkbox or status property, if the row has one.
    pub fn completion(&self) -> Option<bool> {
        let mut checkbox = None;
        let mut status = None;
        for property in self.properties.values() {
            match property_type(property) {
                Some("checkbox") => checkbox = property.get("checkbox").and_then(Value::as_bool),
                Some("status") => {
                    status = property
                        .pointer("/status/name")
                        .and_then(Value::as_str)
                        .map(|name| DONE_STATUSES.contains(&name.trim().to_lowercase().as_str()))
                        .or(Some(false))
                }
                _ => {}
            }
        }
        checkbox.or(status)
    }

    /// The first date property's start.
    pub fn due(&self) -> Option<(DateTime<Utc>, bool)> {
        self.properties
            .values()
            .filter(|p| property_type(p) == Some("date"))
            .find_map(|p| p.pointer("/date/start").and_then(Value::as_str))
            .and_then(parse_date)
    }

    /// Converts a page to a task (rows with a done state) or a note.
    pub fn into_item(self, body: String, database: Option<&str>) -> Item {
        let title = self.display_title();
        let completion = self.completion();
        let item_type = if completion.is_some() { ItemType::Task } else { ItemType::Note };
        let due = self.due();

        let mut item = Item::new(ProviderKind::Notion.as_str(), self.id, item_type, title)
            .with_body(body)
            .with_completed(completion.unwrap_or(false))
            .with_extra("url", self.url)
            .with_extra("database", database.map(str::to_string))
            .with_extra("last_edited", self.last_edited_time);
        if let Some((at, all_day)) = due {
            item = item.with_due(Some(at)).with_all_day(all_day);
        }
        item
    }
}

fn property_type(property: &Value) -> Option<&str> {
    property.get("type").and_then(Value::as_str)
}

fn rich_text_value(value: &Value) -> String {
    value
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("plain_text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_date(raw: &str) -> Option<(DateTime<Utc>, bool)> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some((dt.with_timezone(&Utc), false));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| (d.and_utc(), true))
}

/// A block from the children endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub content: HashMap<String, Value>,
}

impl Block {
    /// Renders one block as a line of plain text; `None` for blocks
    /// without text.
    pub fn render(&self) -> Option<String> {
        let data = self.content.get(&self.kind)?;
        let text = data.get("rich_text").map(rich_text_value).unwrap_or_default();
        let line = match self.kind.as_str() {
            "heading_1" => format!("# {}", text),
            "heading_2" => format!("## {}", text),
            "heading_3" => format!("### {}", text),
            "bulleted_list_item" => format!("- {}", text),
            "numbered_list_item" => format!("1. {}", text),
            "to_do" => {
                let checked = data.get("checked").and_then(Value::as_bool).unwrap_or(false);
                format!("[{}] {}", if checked { "x" } else { " " }, text)
            }
            "quote" | "callout" => format!("> {}", text),
            "code" => format!("```\n{}\n```", text),
            "divider" => "---".to_string(),
            "child_page" | "child_database" => data
                .get("title")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default(),
            _ => text,
        };
        (!line.trim().is_empty()).then_some(line)
    }
}

/// Renders blocks as plain text, one block per line.
pub fn render_blocks(blocks: &[Block]) -> String {
    blocks
        .iter()
        .filter_map(Block::render)
        .collect::<Vec<_>>()
        .join("\n")
}
