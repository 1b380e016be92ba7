//! Google Calendar API v3 wire types and conversion.

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use lifehub_core::{Item, ItemType};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::provider::ProviderKind;
use crate::text::html_to_text;

/// Length in minutes given to exported events that have no end.
pub const DEFAULT_EVENT_MINUTES: i64 = 60;

/// A `pageToken`-paginated list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// An entry from the calendarList endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub summary_override: Option<String>,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl CalendarListEntry {
    /// Returns the name shown to the user.
    pub fn display_name(&self) -> &str {
        self.summary_override
            .as_deref()
            .or(self.summary.as_deref())
            .unwrap_or(&self.id)
    }
}

/// Start or end of an event: either a timestamp or a whole date.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
}

impl EventTime {
    /// Resolves to an instant and whether it is a whole-day date.
    pub fn resolve(&self) -> Option<(DateTime<Utc>, bool)> {
        if let Some(ref dt) = self.date_time {
            return DateTime::parse_from_rfc3339(dt)
                .map_err(|e| warn!("failed to parse event time {}: {}", dt, e))
                .ok()
                .map(|parsed| (parsed.with_timezone(&Utc), false));
        }
        let date = self.date.as_deref()?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| warn!("failed to parse event date {}: {}", date, e))
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| (d.and_utc(), true))
    }
}

/// A single event from the events endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start: EventTime,
    #[serde(default)]
    pub end: EventTime,
    #[serde(default)]
    pub html_link: Option<String>,
    #[serde(default)]
    pub hangout_link: Option<String>,
    #[serde(default)]
    pub recurring_event_id: Option<String>,
}

impl Event {
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }

    /// Converts to a normalized event item.
    ///
    /// Returns `None` for cancelled events and events without a start.
    pub fn into_item(self, calendar: &CalendarListEntry) -> Option<Item> {
        if self.is_cancelled() {
            return None;
        }
        let Some((starts_at, all_day)) = self.start.resolve() else {
            warn!(event = %self.id, "event has no usable start, skipping");
            return None;
        };
        let ends_at = self.end.resolve().map(|(at, _)| at);
        let body = self
            .description
            .as_deref()
            .map(|d| if d.contains('<') { html_to_text(d) } else { d.trim().to_string() })
            .unwrap_or_default();
        let title = self
            .summary
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "(No title)".to_string());

        Some(
            Item::new(ProviderKind::GoogleCalendar.as_str(), self.id, ItemType::Event, title)
                .with_body(body)
                .with_schedule(starts_at, ends_at)
                .with_all_day(all_day)
                .with_extra("calendar", calendar.display_name())
                .with_extra("calendar_id", calendar.id.clone())
                .with_extra("url", self.html_link)
                .with_extra("location", self.location)
                .with_extra("meeting_url", self.hangout_link)
                .with_extra("time_zone", self.start.time_zone)
                .with_extra("recurring_event_id", self.recurring_event_id),
        )
    }
}

/// Builds the insert-event body for an exported item.
///
/// Uses the start time, or the due date for tasks. Returns `None` when the
/// item has neither.
pub fn export_body(item: &Item) -> Option<Value> {
    let start = item.scheduled_at()?;
    let mut body = json!({ "summary": item.title });
    if !item.body.is_empty() {
        body["description"] = json!(item.body);
    }
    if let Some(location) = item.extra_str("location") {
        body["location"] = json!(location);
    }

    if item.all_day {
        let end = item
            .ends_at
            .filter(|end| end.date_naive() > start.date_naive())
            .unwrap_or(start + Duration::days(1));
        body["start"] = json!({ "date": start.format("%Y-%m-%d").to_string() });
        body["end"] = json!({ "date": end.format("%Y-%m-%d").to_string() });
    } else {
        let end = item
            .ends_at
            .filter(|end| *end > start)
            .unwrap_or(start + Duration::minutes(DEFAULT_EVENT_MINUTES));
        body["start"] = json!({ "dateTime": rfc3339(start) });
        body["end"] = json!({ "dateTime": rfc3339(end) });
    }
    Some(body)
}

/// Formats a timestamp the way the API expects in query parameters.
pub fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
