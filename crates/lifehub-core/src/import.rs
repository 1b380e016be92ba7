//! Import and export result types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::item::{Item, ItemType};

/// Outcome of one import call against one integration.
///
/// `failed_items` is always `total_items - imported_items`: duplicates that
/// were skipped count as "not imported" just like conversion failures, and
/// the error list says which was which.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    /// Provider name.
    pub provider: String,
    /// Items seen upstream (after provider filters).
    pub total_items: usize,
    /// Net-new items that were persisted.
    pub imported_items: usize,
    /// `total_items - imported_items`.
    pub failed_items: usize,
    /// Errors and informational notes, in the order they occurred.
    pub errors: Vec<String>,
    /// Imported item counts per type.
    pub summary: BTreeMap<ItemType, usize>,
}

impl ImportResult {
    /// Creates an empty result for a provider.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Default::default()
        }
    }

    /// Creates a zero-item result carrying a single error.
    pub fn failed(provider: impl Into<String>, error: impl Into<String>) -> Self {
        let mut result = Self::new(provider);
        result.errors.push(error.into());
        result
    }

    /// Records the items that were persisted.
    pub fn record_imported(&mut self, items: &[Item]) {
        self.imported_items += items.len();
        for item in items {
            *self.summary.entry(item.item_type).or_default() += 1;
        }
    }

    /// Appends an error or informational entry.
    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Recomputes `failed_items` from the totals.
    pub fn finalize(mut self) -> Self {
        self.failed_items = self.total_items.saturating_sub(self.imported_items);
        self
    }

    /// Returns the number of imported items of a given type.
    pub fn count_of(&self, item_type: ItemType) -> usize {
        self.summary.get(&item_type).copied().unwrap_or(0)
    }
}

/// Outcome of one export call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportResult {
    /// Provider name.
    pub provider: String,
    /// Items created upstream.
    pub exported_items: usize,
    /// Items that could not be exported.
    pub failed_items: usize,
    /// Per-item errors.
    pub errors: Vec<String>,
}

impl ExportResult {
    /// Creates an empty export result.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_computes_failed_items() {
        let mut result = ImportResult::new("todoist");
        result.total_items = 5;
        result.record_imported(&[
            Item::new("todoist", "1", ItemType::Task, "a"),
            Item::new("todoist", "2", ItemType::Task, "b"),
        ]);
        let result = result.finalize();

        assert_eq!(result.imported_items, 2);
        assert_eq!(result.failed_items, 3);
        assert_eq!(result.count_of(ItemType::Task), 2);
        assert_eq!(result.count_of(ItemType::Event), 0);
    }

    #[test]
    fn failed_result_has_zero_items() {
        let result = ImportResult::failed("youtube", "not connected").finalize();
        assert_eq!(result.total_items, 0);
        assert_eq!(result.imported_items, 0);
        assert_eq!(result.failed_items, 0);
        assert_eq!(result.errors, vec!["not connected".to_string()]);
    }

    #[test]
    fn summary_serializes_with_type_names() {
        let mut result = ImportResult::new("notion");
        result.total_items = 1;
        result.record_imported(&[Item::new("notion", "p", ItemType::Note, "n")]);
        let json = serde_json::to_value(result.finalize()).unwrap();
        assert_eq!(json["summary"]["note"], 1);
    }
}
