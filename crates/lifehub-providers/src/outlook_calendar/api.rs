//! Graph calendar wire types and conversion.

use lifehub_core::{Item, ItemType};
use serde::Deserialize;
use tracing::warn;

use crate::graph::DateTimeZone;
use crate::provider::ProviderKind;
use crate::text::html_to_text;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_default_calendar: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineMeeting {
    #[serde(default)]
    pub join_url: Option<String>,
}

/// An event occurrence from `calendarView`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body_preview: Option<String>,
    #[serde(default)]
    pub body: Option<ItemBody>,
    #[serde(default)]
    pub start: DateTimeZone,
    #[serde(default)]
    pub end: DateTimeZone,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub is_cancelled: bool,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub web_link: Option<String>,
    #[serde(default)]
    pub online_meeting: Option<OnlineMeeting>,
    #[serde(default)]
    pub series_master_id: Option<String>,
}

impl Event {
    fn body_text(&self) -> String {
        match self.body {
            Some(ItemBody {
                content_type: Some(ref kind),
                content: Some(ref content),
            }) if kind.eq_ignore_ascii_case("html") => html_to_text(content),
            Some(ItemBody {
                content: Some(ref content),
                ..
            }) => content.trim().to_string(),
            _ => self.body_preview.clone().unwrap_or_default(),
        }
    }

    /// Converts to a normalized event item.
    ///
    /// Returns `None` for cancelled occurrences and unparseable starts.
    pub fn into_item(self, calendar: &Calendar) -> Option<Item> {
        if self.is_cancelled {
            return None;
        }
        let Some(starts_at) = self.start.to_utc() else {
            warn!(event = %self.id, "event has no usable start, skipping");
            return None;
        };
        let body = self.body_text();
        let title = self
            .subject
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "(No subject)".to_string());

        Some(
            Item::new(ProviderKind::OutlookCalendar.as_str(), self.id, ItemType::Event, title)
                .with_body(body)
                .with_schedule(starts_at, self.end.to_utc())
                .with_all_day(self.is_all_day)
                .with_extra("calendar", calendar.name.clone())
                .with_extra("calendar_id", calendar.id.clone())
                .with_extra("url", self.web_link)
                .with_extra("location", self.location.and_then(|l| l.display_name))
                .with_extra("meeting_url", self.online_meeting.and_then(|m| m.join_url))
                .with_extra("series_master_id", self.series_master_id),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn calendar() -> Calendar {
        serde_json::from_value(json!({"id": "cal-1", "name": "Calendar", "isDefaultCalendar": true}))
            .unwrap()
    }

    #[test]
    fn converts_event_with_html_body() {
        let event: Event = serde_json::from_value(json!({
            "id": "AAMk1",
            "subject": "1:1",
            "bodyPreview": "Agenda",
            "body": {"contentType": "html", "content": "<html><body><p>Agenda</p><ul><li>Goals</li></ul></body></html>"},
            "start": {"dateTime": "2025-04-10T09:30:00.0000000", "timeZone": "UTC"},
            "end": {"dateTime": "2025-04-10T10:00:00.0000000", "timeZone": "UTC"},
            "location": {"displayName": "Room 4"},
            "onlineMeeting": {"joinUrl": "https://teams.microsoft.com/l/meetup-join/1"}
        }))
        .unwrap();

        let item = event.into_item(&calendar()).unwrap();
        assert_eq!(item.id, "outlook_calendar-AAMk1");
        assert_eq!(item.body, "Agenda\n- Goals");
        assert_eq!(item.starts_at, Some(Utc.with_ymd_and_hms(2025, 4, 10, 9, 30, 0).unwrap()));
        assert_eq!(item.extra_str("location"), Some("Room 4"));
        assert_eq!(
            item.extra_str("meeting_url"),
            Some("https://teams.microsoft.com/l/meetup-join/1")
        );
    }

    #[test]
    fn skips_cancelled() {
        let event: Event = serde_json::from_value(json!({
            "id": "x", "isCancelled": true,
            "start": {"dateTime": "2025-04-10T09:30:00.0000000", "timeZone": "UTC"}
        }))
        .unwrap();
        assert!(event.into_item(&calendar()).is_none());
    }

    #[test]
    fn falls_back_to_preview() {
        let event: Event = serde_json::from_value(json!({
            "id": "y", "bodyPreview": "short text",
            "start": {"dateTime": "2025-04-10T09:30:00.0000000"}
        }))
        .unwrap();
        let item = event.into_item(&calendar()).unwrap();
        assert_eq!(item.body, "short text");
        assert_eq!(item.title, "(No subject)");
    }
}
