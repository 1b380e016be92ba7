//! The import pipeline.
//!
//! Adapters fetch and convert; this module owns everything after that:
//! deduplication against the item store, category defaulting, persistence and
//! building the [`ImportResult`].

use std::collections::{HashMap, HashSet};

use lifehub_core::{ImportResult, Item, item_id};
use tracing::{Instrument, info, info_span, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{FetchedItems, ImportOptions, Integration, IntegrationStatus};
use crate::store::{ItemStore, StoreError};

/// Deduplication key for an upstream object.
pub fn dedupe_key(source: &str, original_id: &str) -> String {
    item_id(source, original_id)
}

/// Known items, by `(source, original_id)` and by lowercase title per source.
#[derive(Debug, Default)]
pub struct DedupeIndex {
    keys: HashSet<String>,
    titles: HashMap<String, HashSet<String>>,
}

impl DedupeIndex {
    /// Builds an index from existing items.
    pub fn from_items(items: &[Item]) -> Self {
        let mut index = Self::default();
        for item in items {
            index.insert(item);
        }
        index
    }

    /// Adds an item to the index.
    pub fn insert(&mut self, item: &Item) {
        self.keys.insert(dedupe_key(item.source(), item.original_id()));
        let title = normalize_title(&item.title);
        if !title.is_empty() {
            self.titles
                .entry(item.source().to_string())
                .or_default()
                .insert(title);
        }
    }

    /// Returns true if the item is already known.
    pub fn contains(&self, item: &Item, by_title: bool) -> bool {
        if self.keys.contains(&dedupe_key(item.source(), item.original_id())) {
            return true;
        }
        by_title
            && self
                .titles
                .get(item.source())
                .is_some_and(|titles| titles.contains(&normalize_title(&item.title)))
    }

    /// Keeps only unknown items, indexing them as it goes so duplicates
    /// within `items` are dropped too. Returns the kept items and the number
    /// skipped.
    pub fn retain_new(&mut self, items: Vec<Item>, by_title: bool) -> (Vec<Item>, usize) {
        let mut kept = Vec::with_capacity(items.len());
        let mut skipped = 0;
        for item in items {
            if self.contains(&item, by_title) {
                skipped += 1;
                continue;
            }
            self.insert(&item);
            kept.push(item);
        }
        (kept, skipped)
    }
}

fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

fn store_error(e: StoreError) -> ProviderError {
    ProviderError::internal(format!("item store: {}", e)).with_source(e)
}

/// Imports everything an integration can fetch.
///
/// Holds the session in `Syncing` for the duration; success returns it to
/// `Connected` with a fresh sync time, failure leaves it in `Error`.
///
/// # Errors
///
/// `ImportInProgress` if the session is already importing; otherwise whatever
/// the adapter or the store raised. Per-resource failures are not errors:
/// they end up in [`ImportResult::errors`]. Credential failures abort the
/// import and leave the session in `Error`.
pub async fn run_import(
    integration: &dyn Integration,
    store: &dyn ItemStore,
    options: ImportOptions,
) -> ProviderResult<ImportResult> {
    let provider = integration.kind();
    let span = info_span!("import", provider = %provider);
    async move {
        let session = integration.session();
        let _guard = session.begin_import()?;
        let category = options.category.clone();

        let fetched = integration
            .fetch_items(options)
            .await
            .map_err(|e| session.fail(e))?;
        let result = persist(integration, store, fetched, category)
            .await
            .map_err(|e| session.fail(e))?;

        if session.status() != IntegrationStatus::Error {
            session.mark_synced();
        }
        Ok(result)
    }
    .instrument(span)
    .await
}

/// Imports the single piece of content behind a URL.
///
/// # Errors
///
/// As [`run_import`]; adapters without URL import fail with
/// `UnsupportedOperation`, which leaves the status untouched.
pub async fn run_url_import(
    integration: &dyn Integration,
    store: &dyn ItemStore,
    url: &str,
    options: ImportOptions,
) -> ProviderResult<ImportResult> {
    let provider = integration.kind();
    let span = info_span!("url_import", provider = %provider);
    async move {
        if !integration.capabilities().url_import {
            return Err(ProviderError::unsupported("URL import is not supported")
                .with_provider(provider.as_str()));
        }
        let session = integration.session();
        let _guard = session.begin_import()?;
        let category = options.category.clone();

        let fetched = integration
            .fetch_url(url, options)
            .await
            .map_err(|e| session.fail(e))?;
        let result = persist(integration, store, fetched, category)
            .await
            .map_err(|e| session.fail(e))?;

        if session.status() != IntegrationStatus::Error {
            session.mark_synced();
        }
        Ok(result)
    }
    .instrument(span)
    .await
}

async fn persist(
    integration: &dyn Integration,
    store: &dyn ItemStore,
    fetched: FetchedItems,
    category: Option<String>,
) -> ProviderResult<ImportResult> {
    let provider = integration.kind();
    let mut result = ImportResult::new(provider.as_str());
    result.total_items = fetched.total_items;
    result.errors = fetched.errors;

    let existing = store.get_all_items().await.map_err(store_error)?;
    let mut index = DedupeIndex::from_items(&existing);
    let (fresh, skipped) = index.retain_new(fetched.items, integration.dedupe_by_title());

    let category = category
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| integration.default_category().to_string());
    let fresh: Vec<Item> = fresh
        .into_iter()
        .map(|item| {
            if item.category.is_empty() {
                item.with_category(category.clone())
            } else {
                item
            }
        })
        .collect();

    if !fresh.is_empty() {
        let created = store.bulk_create_items(fresh).await.map_err(store_error)?;
        result.record_imported(&created);
    }
    if skipped > 0 {
        result.push_error(format!("{} duplicates skipped", skipped));
    }

    let result = result.finalize();
    if result.errors.len() > usize::from(skipped > 0) {
        warn!(
            provider = %provider,
            errors = result.errors.len(),
            "import finished with resource errors"
        );
    }
    info!(
        provider = %provider,
        total = result.total_items,
        imported = result.imported_items,
        skipped,
        "import finished"
    );
    Ok(result)
}
