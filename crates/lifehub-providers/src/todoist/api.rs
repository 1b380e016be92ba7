//! Todoist API v1 wire types and conversion.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use lifehub_core::{Item, ItemType};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::provider::ProviderKind;

/// Projects Todoist creates for new accounts.
const ONBOARDING_PROJECTS: &[&str] = &["getting started", "welcome"];

/// Titles of the tasks seeded into new accounts.
const TUTORIAL_PREFIXES: &[&str] = &[
    "welcome to todoist",
    "take the todoist tour",
    "try boards",
    "add your first task",
];

/// Cursor-paginated list response.
#[derive(Debug, Deserialize)]
pub struct Paginated<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_archived: bool,
}

impl Project {
    /// Returns true for the onboarding projects.
    pub fn is_onboarding(&self) -> bool {
        let name = self.name.trim().to_lowercase();
        ONBOARDING_PROJECTS.iter().any(|p| name.starts_with(p))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Due {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub datetime: Option<String>,
    #[serde(default)]
    pub string: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
}

impl Due {
    /// Resolves the due date. Floating times are read as UTC.
    ///
    /// Returns the instant and whether it is a whole-day date.
    pub fn resolve(&self) -> Option<(DateTime<Utc>, bool)> {
        let raw = self.datetime.as_deref().or(self.date.as_deref())?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some((dt.with_timezone(&Utc), false));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
            return Some((naive.and_utc(), false));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| (d.and_utc(), true))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub due: Option<Due>,
    #[serde(default, alias = "is_completed")]
    pub checked: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

fn default_priority() -> u8 {
    1
}

impl Task {
    /// Returns true for the tasks seeded into new accounts.
    pub fn is_tutorial(&self) -> bool {
        let content = self.content.trim().to_lowercase();
        TUTORIAL_PREFIXES.iter().any(|p| content.starts_with(p))
    }

    /// Returns true if this task should be imported.
    pub fn is_importable(&self) -> bool {
        !self.checked && !self.is_deleted && !self.is_tutorial()
    }

    /// Converts to a normalized task item.
    pub fn into_item(self, project: &Project) -> Item {
        let url = format!("https://app.todoist.com/app/task/{}", self.id);
        let due = self.due.as_ref().and_then(Due::resolve);
        let recurring = self.due.as_ref().is_some_and(|d| d.is_recurring);
        let due_string = self.due.as_ref().and_then(|d| d.string.clone());

        let mut item = Item::new(ProviderKind::Todoist.as_str(), self.id, ItemType::Task, self.content)
            .with_body(self.description)
            .with_due(due.map(|(at, _)| at))
            .with_all_day(due.is_some_and(|(_, all_day)| all_day))
            .with_completed(self.checked)
            .with_extra("url", url)
            .with_extra("project", project.name.clone())
            .with_extra("project_id", project.id.clone())
            .with_extra("priority", self.priority);
        if !self.labels.is_empty() {
            item = item.with_extra("labels", self.labels);
        }
        if recurring {
            item = item.with_extra("recurring", true);
        }
        item.with_extra("due_string", due_string)
    }
}

/// Builds the create-task body for an exported item.
pub fn export_body(item: &Item, project_id: Option<&str>) -> Value {
    let mut body = json!({ "content": item.title });
    if !item.body.is_empty() {
        body["description"] = json!(item.body);
    }
    if let Some(project_id) = project_id {
        body["project_id"] = json!(project_id);
    }
    if let Some(priority) = item.metadata.extra.get("priority").and_then(Value::as_u64) {
        body["priority"] = json!(priority.clamp(1, 4));
    }
    if let Some(at) = item.scheduled_at() {
        if item.all_day {
            body["due_date"] = json!(at.format("%Y-%m-%d").to_string());
        } else {
            body["due_datetime"] = json!(at.to_rfc3339());
        }
    }
    body
}
