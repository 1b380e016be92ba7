//! JSON file stores.
//!
//! [`FileCredentialStore`] keeps one `{provider}.json` per provider under a
//! directory; [`FileItemStore`] keeps every item in one JSON array. Both
//! write to a temporary file and rename it into place, and credentials are
//! made readable by the owner only.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use lifehub_core::Item;
use lifehub_providers::store::{EVENT_CHANNEL_CAPACITY, notify_created};
use lifehub_providers::{
    BoxFuture, CredentialStore, ItemStore, ItemStoreEvent, ProviderKind, StoreResult, TokenRecord,
};
use tokio::fs;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

/// Writes `content` next to `path` and renames it into place.
async fn write_atomic(path: &Path, content: &[u8], private: bool) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);
    fs::write(&temp_path, content).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if private {
            fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600)).await?;
        }
    }
    #[cfg(not(unix))]
    let _ = private;

    fs::rename(&temp_path, path).await?;
    Ok(())
}

async fn read_if_exists(path: &Path) -> StoreResult<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// FileCredentialStore
// ---------------------------------------------------------------------------

/// Credential records as `{dir}/{provider}.json`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store rooted at `dir`; nothing is touched until first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the file holding a provider's record.
    pub fn path_for(&self, provider: ProviderKind) -> PathBuf {
        self.dir.join(format!("{}.json", provider))
    }

    async fn load(&self, provider: ProviderKind) -> StoreResult<Option<TokenRecord>> {
        let path = self.path_for(provider);
        let Some(content) = read_if_exists(&path).await? else {
            return Ok(None);
        };
        let record: TokenRecord = serde_json::from_str(&content)?;
        debug!("loaded credentials from {:?}", path);
        Ok(Some(record))
    }

    async fn save(&self, provider: ProviderKind, record: TokenRecord) -> StoreResult<TokenRecord> {
        let path = self.path_for(provider);
        let content = serde_json::to_vec_pretty(&record)?;
        write_atomic(&path, &content, true).await?;
        debug!("saved credentials to {:?}", path);
        Ok(record)
    }

    async fn remove(&self, provider: ProviderKind) -> StoreResult<bool> {
        let path = self.path_for(provider);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("cleared credentials from {:?}", path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn get_token(&self, provider: ProviderKind) -> BoxFuture<'_, StoreResult<Option<TokenRecord>>> {
        Box::pin(self.load(provider))
    }

    fn store_token(
        &self,
        provider: ProviderKind,
        record: TokenRecord,
    ) -> BoxFuture<'_, StoreResult<TokenRecord>> {
        Box::pin(self.save(provider, record))
    }

    fn delete_token(&self, provider: ProviderKind) -> BoxFuture<'_, StoreResult<bool>> {
        Box::pin(self.remove(provider))
    }
}

// ---------------------------------------------------------------------------
// FileItemStore
// ---------------------------------------------------------------------------

/// Every item in one JSON file, loaded on first use.
#[derive(Debug)]
pub struct FileItemStore {
    path: PathBuf,
    /// `None` until the file has been read.
    items: Mutex<Option<Vec<Item>>>,
    events: broadcast::Sender<ItemStoreEvent>,
}

impl FileItemStore {
    /// Creates a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            path: path.into(),
            items: Mutex::new(None),
            events,
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Subscribes to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ItemStoreEvent> {
        self.events.subscribe()
    }

    async fn loaded<'a>(&self, slot: &'a mut Option<Vec<Item>>) -> StoreResult<&'a mut Vec<Item>> {
        if slot.is_none() {
            let items = match read_if_exists(&self.path).await? {
                Some(content) if !content.trim().is_empty() => serde_json::from_str(&content)?,
                _ => Vec::new(),
            };
            debug!(count = items.len(), "loaded items from {:?}", self.path);
            *slot = Some(items);
        }
        Ok(slot.get_or_insert_with(Vec::new))
    }

    async fn persist(&self, items: &[Item]) -> StoreResult<()> {
        let content = serde_json::to_vec_pretty(items)?;
        write_atomic(&self.path, &content, false).await
    }

    async fn all(&self) -> StoreResult<Vec<Item>> {
        let mut slot = self.items.lock().await;
        Ok(self.loaded(&mut slot).await?.clone())
    }

    async fn create(&self, items: Vec<Item>) -> StoreResult<Vec<Item>> {
        let mut slot = self.items.lock().await;
        let stored = self.loaded(&mut slot).await?;

        let mut known: HashSet<String> = stored.iter().map(|s| s.id.clone()).collect();
        let mut created = Vec::with_capacity(items.len());
        for item in items {
            if known.insert(item.id.clone()) {
                created.push(item);
            }
        }
        if created.is_empty() {
            return Ok(created);
        }

        let mut next = stored.clone();
        next.extend(created.iter().cloned());
        self.persist(&next).await?;
        *stored = next;

        notify_created(&self.events, &created);
        Ok(created)
    }

    async fn delete_source(&self, source: &str) -> StoreResult<usize> {
        let mut slot = self.items.lock().await;
        let stored = self.loaded(&mut slot).await?;

        let next: Vec<Item> = stored
            .iter()
            .filter(|item| item.source() != source)
            .cloned()
            .collect();
        let removed = stored.len() - next.len();
        if removed == 0 {
            return Ok(0);
        }

        self.persist(&next).await?;
        *stored = next;
        info!(source, removed, "deleted items");
        let _ = self.events.send(ItemStoreEvent::Deleted {
            source: source.to_string(),
            count: removed,
        });
        Ok(removed)
    }
}

impl ItemStore for FileItemStore {
    fn get_all_items(&self) -> BoxFuture<'_, StoreResult<Vec<Item>>> {
        Box::pin(self.all())
    }

    fn bulk_create_items(&self, items: Vec<Item>) -> BoxFuture<'_, StoreResult<Vec<Item>>> {
        Box::pin(self.create(items))
    }

    fn delete_items_by_source<'a>(&'a self, source: &'a str) -> BoxFuture<'a, StoreResult<usize>> {
        Box::pin(self.delete_source(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifehub_core::ItemType;

    #[tokio::test]
    async fn credentials_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("credentials"));
        assert!(store.get_token(ProviderKind::Todoist).await.unwrap().is_none());

        let record = TokenRecord::new(ProviderKind::Todoist, "tok-1");
        store.store_token(ProviderKind::Todoist, record).await.unwrap();
        let rotated = TokenRecord::new(ProviderKind::Todoist, "tok-2");
        store.store_token(ProviderKind::Todoist, rotated).await.unwrap();

        let loaded = FileCredentialStore::new(dir.path().join("credentials"))
            .get_token(ProviderKind::Todoist)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.access_token, "tok-2");
        assert!(!store.path_for(ProviderKind::Todoist).with_extension("json.tmp").exists());

        assert!(store.delete_token(ProviderKind::Todoist).await.unwrap());
        assert!(!store.delete_token(ProviderKind::Todoist).await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn credential_files_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        store
            .store_token(ProviderKind::Notion, TokenRecord::new(ProviderKind::Notion, "secret_x"))
            .await
            .unwrap();
        let mode = std::fs::metadata(store.path_for(ProviderKind::Notion))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn corrupt_credentials_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        std::fs::write(store.path_for(ProviderKind::OneNote), "{not json").unwrap();
        assert!(store.get_token(ProviderKind::OneNote).await.is_err());
    }

    #[tokio::test]
    async fn items_persist_and_deduplicate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        let store = FileItemStore::new(&path);
        let mut events = store.subscribe();

        let created = store
            .bulk_create_items(vec![
                Item::new("todoist", "1", ItemType::Task, "Buy milk"),
                Item::new("todoist", "1", ItemType::Task, "Buy milk again"),
                Item::new("notion", "p1", ItemType::Note, "Ideas"),
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

        let reopened = FileItemStore::new(&path);
        assert_eq!(reopened.get_all_items().await.unwrap().len(), 2);
        let again = reopened
            .bulk_create_items(vec![Item::new("todoist", "1", ItemType::Task, "Buy milk")])
            .await
            .unwrap();
        assert!(again.is_empty());

        assert_eq!(reopened.delete_items_by_source("todoist").await.unwrap(), 1);
        assert_eq!(reopened.delete_items_by_source("todoist").await.unwrap(), 0);
        let remaining = FileItemStore::new(&path).get_all_items().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].source(), "notion");
    }

    #[tokio::test]
    async fn large_batches_keep_first_of_each_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileItemStore::new(dir.path().join("items.json"));
        let existing: Vec<Item> = (0..500)
            .map(|i| Item::new("todoist", &i.to_string(), ItemType::Task, "old"))
            .collect();
        store.bulk_create_items(existing).await.unwrap();

        let batch: Vec<Item> = (250..1500)
            .flat_map(|i| {
                let id = i.to_string();
                [
                    Item::new("todoist", &id, ItemType::Task, "first"),
                    Item::new("todoist", &id, ItemType::Task, "second"),
                ]
            })
            .collect();
        let created = store.bulk_create_items(batch).await.unwrap();

        assert_eq!(created.len(), 1000);
        assert!(created.iter().all(|item| item.title == "first"));
        assert_eq!(created[0].original_id(), "500");
        assert_eq!(store.get_all_items().await.unwrap().len(), 1500);
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileItemStore::new(dir.path().join("nested/items.json"));
        assert!(store.get_all_items().await.unwrap().is_empty());
        assert_eq!(store.delete_items_by_source("youtube").await.unwrap(), 0);
    }
}
