//! Storage collaborators.
//!
//! The integration core reads from and writes to two stores it does not own:
//! a [`CredentialStore`] for token records and an [`ItemStore`] for imported
//! items. In-memory implementations live here; file-backed ones live in the
//! manager crate.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use lifehub_core::Item;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::provider::{BoxFuture, ProviderKind};
use crate::tokens::TokenRecord;

/// Errors raised by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// A specialized Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Change notification broadcast after item writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStoreEvent {
    Created { source: String, count: usize },
    Deleted { source: String, count: usize },
}

/// Capacity of the change notification channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Persists credential records, one per provider (upsert semantics).
pub trait CredentialStore: Send + Sync {
    /// Returns the record for a provider, if any.
    fn get_token(&self, provider: ProviderKind) -> BoxFuture<'_, StoreResult<Option<TokenRecord>>>;

    /// Inserts or replaces the record for a provider.
    fn store_token(
        &self,
        provider: ProviderKind,
        record: TokenRecord,
    ) -> BoxFuture<'_, StoreResult<TokenRecord>>;

    /// Deletes the record; returns whether one existed.
    fn delete_token(&self, provider: ProviderKind) -> BoxFuture<'_, StoreResult<bool>>;
}

/// Persists imported items.
pub trait ItemStore: Send + Sync {
    /// Returns every stored item.
    fn get_all_items(&self) -> BoxFuture<'_, StoreResult<Vec<Item>>>;

    /// Stores items, returning the ones actually created.
    fn bulk_create_items(&self, items: Vec<Item>) -> BoxFuture<'_, StoreResult<Vec<Item>>>;

    /// Deletes every item from a source; returns how many were removed.
    fn delete_items_by_source<'a>(&'a self, source: &'a str) -> BoxFuture<'a, StoreResult<usize>>;
}

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<ProviderKind, TokenRecord>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get_token(&self, provider: ProviderKind) -> BoxFuture<'_, StoreResult<Option<TokenRecord>>> {
        let record = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&provider)
            .cloned();
        Box::pin(async move { Ok(record) })
    }

    fn store_token(
        &self,
        provider: ProviderKind,
        record: TokenRecord,
    ) -> BoxFuture<'_, StoreResult<TokenRecord>> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider, record.clone());
        Box::pin(async move { Ok(record) })
    }

    fn delete_token(&self, provider: ProviderKind) -> BoxFuture<'_, StoreResult<bool>> {
        let existed = self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&provider)
            .is_some();
        Box::pin(async move { Ok(existed) })
    }
}

/// In-memory item store keyed by item id.
#[derive(Debug)]
pub struct MemoryItemStore {
    items: RwLock<Vec<Item>>,
    events: broadcast::Sender<ItemStoreEvent>,
}

impl MemoryItemStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_items(Vec::new())
    }

    /// Creates a store seeded with items.
    pub fn with_items(items: Vec<Item>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            items: RwLock::new(items),
            events,
        }
    }

    /// Subscribes to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ItemStoreEvent> {
        self.events.subscribe()
    }

    /// Returns the number of stored items.
    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn create(&self, items: Vec<Item>) -> Vec<Item> {
        let created = {
            let mut stored = self.items.write().unwrap_or_else(PoisonError::into_inner);
            let mut known: HashSet<String> = stored.iter().map(|s| s.id.clone()).collect();
            let mut created = Vec::with_capacity(items.len());
            for item in items {
                if !known.insert(item.id.clone()) {
                    continue;
                }
                stored.push(item.clone());
                created.push(item);
            }
            created
        };
        notify_created(&self.events, &created);
        created
    }

    fn delete_source(&self, source: &str) -> usize {
        let removed = {
            let mut stored = self.items.write().unwrap_or_else(PoisonError::into_inner);
            let before = stored.len();
            stored.retain(|item| item.source() != source);
            before - stored.len()
        };
        if removed > 0 {
            // No receivers is fine.
            let _ = self.events.send(ItemStoreEvent::Deleted {
                source: source.to_string(),
                count: removed,
            });
        }
        removed
    }
}

impl Default for MemoryItemStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Broadcasts one `Created` event per source among `created`.
pub fn notify_created(events: &broadcast::Sender<ItemStoreEvent>, created: &[Item]) {
    let mut per_source: Vec<(&str, usize)> = Vec::new();
    for item in created {
        match per_source.iter_mut().find(|(s, _)| *s == item.source()) {
            Some((_, count)) => *count += 1,
            None => per_source.push((item.source(), 1)),
        }
    }
    for (source, count) in per_source {
        let _ = events.send(ItemStoreEvent::Created {
            source: source.to_string(),
            count,
        });
    }
}

impl ItemStore for MemoryItemStore {
    fn get_all_items(&self) -> BoxFuture<'_, StoreResult<Vec<Item>>> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner).clone();
        Box::pin(async move { Ok(items) })
    }

    fn bulk_create_items(&self, items: Vec<Item>) -> BoxFuture<'_, StoreResult<Vec<Item>>> {
        let created = self.create(items);
        Box::pin(async move { Ok(created) })
    }

    fn delete_items_by_source<'a>(&'a self, source: &'a str) -> BoxFuture<'a, StoreResult<usize>> {
        let removed = self.delete_source(source);
        Box::pin(async move { Ok(removed) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifehub_core::ItemType;

    #[tokio::test]
    async fn credential_store_upserts() {
        let store = MemoryCredentialStore::new();
        assert!(store.get_token(ProviderKind::Notion).await.unwrap().is_none());

        store
            .store_token(ProviderKind::Notion, TokenRecord::new(ProviderKind::Notion, "a"))
            .await
            .unwrap();
        store
            .store_token(ProviderKind::Notion, TokenRecord::new(ProviderKind::Notion, "b"))
            .await
            .unwrap();
        let record = store.get_token(ProviderKind::Notion).await.unwrap().unwrap();
        assert_eq!(record.access_token, "b");

        assert!(store.delete_token(ProviderKind::Notion).await.unwrap());
        assert!(!store.delete_token(ProviderKind::Notion).await.unwrap());
    }

    #[tokio::test]
    async fn item_store_broadcasts_changes() {
        let store = MemoryItemStore::new();
        let mut events = store.subscribe();

        let created = store
            .bulk_create_items(vec![
                Item::new("todoist", "1", ItemType::Task, "a"),
                Item::new("todoist", "1", ItemType::Task, "a again"),
                Item::new("notion", "p", ItemType::Note, "b"),
            ])
            .await
            .unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(
            events.recv().await.unwrap(),
            ItemStoreEvent::Created {
                source: "todoist".into(),
                count: 1
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            ItemStoreEvent::Created {
                source: "notion".into(),
                count: 1
            }
        );

        assert_eq!(store.delete_items_by_source("todoist").await.unwrap(), 1);
        assert_eq!(
            events.recv().await.unwrap(),
            ItemStoreEvent::Deleted {
                source: "todoist".into(),
                count: 1
            }
        );
        assert_eq!(store.len(), 1);
    }
}
