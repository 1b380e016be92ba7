//! OneNote wire types and conversion.

use lifehub_core::{Item, ItemType};
use serde::Deserialize;

use crate::graph::parse_datetime;
use crate::provider::ProviderKind;
use crate::text::{html_to_text, truncate};

/// Longest note body kept from a page.
pub const MAX_BODY_CHARS: usize = 20_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notebook {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLinks {
    #[serde(default)]
    pub one_note_web_url: Option<Link>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_date_time: Option<String>,
    #[serde(default)]
    pub last_modified_date_time: Option<String>,
    #[serde(default)]
    pub links: PageLinks,
}

impl Page {
    /// Returns the title, or a placeholder for untitled pages.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("Untitled page")
    }

    /// Converts to a normalized note item, with `html` as the page content.
    pub fn into_item(self, notebook: &Notebook, section: &Section, html: &str) -> Item {
        let title = self.display_title().to_string();
        let body = truncate(&html_to_text(html), MAX_BODY_CHARS);
        let modified = self
            .last_modified_date_time
            .as_deref()
            .and_then(parse_datetime)
            .map(|dt| dt.to_rfc3339());

        Item::new(ProviderKind::OneNote.as_str(), self.id, ItemType::Note, title)
            .with_body(body)
            .with_extra("notebook", notebook.display_name.clone())
            .with_extra("section", section.display_name.clone())
            .with_extra("url", self.links.one_note_web_url.and_then(|l| l.href))
            .with_extra("created", self.created_date_time)
            .with_extra("modified", modified)
    }
}
