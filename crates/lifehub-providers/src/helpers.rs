//! Pagination and batching helpers shared by all adapters.

use std::future::Future;
use std::time::Duration;

use lifehub_core::{ExportResult, Item};
use tracing::{debug, info, warn};

use crate::error::ProviderResult;
use crate::provider::ProviderKind;

/// Hard ceiling on pages followed by [`paginate`].
pub const MAX_PAGES: usize = 100;

/// Pause between chunks in [`process_in_batches`].
pub const BATCH_PAUSE: Duration = Duration::from_millis(100);

/// One page of results and the continuation token for the next one.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

impl<T> Page<T> {
    /// Creates a page.
    pub fn new(items: Vec<T>, next: Option<String>) -> Self {
        Self {
            items,
            next: next.filter(|t| !t.is_empty()),
        }
    }

    /// Creates a final page.
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Follows continuation tokens and accumulates every page's items.
///
/// The fetcher receives `None` for the first page and the previous page's
/// token afterwards. Stops when no token is returned or after [`MAX_PAGES`].
pub async fn paginate<T, F, Fut>(mut fetch_page: F) -> ProviderResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = ProviderResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;

    for page_number in 1..=MAX_PAGES {
        let page = fetch_page(cursor.take()).await?;
        items.extend(page.items);

        match page.next {
            Some(next) => cursor = Some(next),
            None => {
                debug!(pages = page_number, items = items.len(), "pagination finished");
                return Ok(items);
            }
        }
    }

    warn!(max_pages = MAX_PAGES, items = items.len(), "page limit reached, stopping pagination");
    Ok(items)
}

/// Runs `worker` over sequential chunks of `items`, pausing between chunks.
///
/// Returns each chunk's output in order. A `batch_size` of zero is treated
/// as one.
pub async fn process_in_batches<T, R, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    mut worker: F,
) -> Vec<R>
where
    F: FnMut(Vec<T>) -> Fut,
    Fut: Future<Output = R>,
{
    let batch_size = batch_size.max(1);
    let mut outputs = Vec::with_capacity(items.len().div_ceil(batch_size));
    let mut remaining = items.into_iter().peekable();

    while remaining.peek().is_some() {
        if !outputs.is_empty() {
            tokio::time::sleep(BATCH_PAUSE).await;
        }
        let chunk: Vec<T> = remaining.by_ref().take(batch_size).collect();
        outputs.push(worker(chunk).await);
    }

    outputs
}

/// Exports items one by one in paused batches and tallies the outcome.
///
/// Per-item failures are recorded as `"{title}: {error}"` and never stop the
/// remaining items.
pub async fn export_in_batches<F, Fut>(
    provider: ProviderKind,
    items: Vec<Item>,
    batch_size: usize,
    create: F,
) -> ExportResult
where
    F: Fn(Item) -> Fut,
    Fut: Future<Output = ProviderResult<()>>,
{
    let create = &create;
    let chunks = process_in_batches(items, batch_size, |chunk| async move {
        let mut exported = 0usize;
        let mut errors = Vec::new();
        for item in chunk {
            let title = item.title.clone();
            match create(item).await {
                Ok(()) => exported += 1,
                Err(e) => errors.push(format!("{}: {}", title, e)),
            }
        }
        (exported, errors)
    })
    .await;

    let mut result = ExportResult::new(provider.as_str());
    for (exported, errors) in chunks {
        result.exported_items += exported;
        result.failed_items += errors.len();
        result.errors.extend(errors);
    }
    info!(
        provider = %provider,
        exported = result.exported_items,
        failed = result.failed_items,
        "export finished"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn paginate_follows_tokens() {
        let pages = paginate(|cursor| async move {
            Ok(match cursor.as_deref() {
                None => Page::new(vec![1, 2], Some("b".to_string())),
                Some("b") => Page::new(vec![3], Some("c".to_string())),
                Some("c") => Page::new(vec![4, 5], Some(String::new())),
                Some(other) => panic!("unexpected cursor {other}"),
            })
        })
        .await
        .unwrap();

        assert_eq!(pages, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn paginate_stops_at_page_limit() {
        let calls = AtomicUsize::new(0);
        let items = paginate(|_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(Page::new(vec![0u8], Some("again".to_string()))) }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), MAX_PAGES);
        assert_eq!(items.len(), MAX_PAGES);
    }

    #[tokio::test]
    async fn paginate_propagates_errors() {
        let result: ProviderResult<Vec<u8>> = paginate(|cursor| async move {
            match cursor {
                None => Ok(Page::new(vec![1], Some("next".to_string()))),
                Some(_) => Err(ProviderError::network("connection reset")),
            }
        })
        .await;

        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn batches_run_in_order_with_pauses() {
        let started = tokio::time::Instant::now();
        let outputs = process_in_batches((1..=7).collect(), 3, |chunk: Vec<i32>| async move {
            chunk.iter().sum::<i32>()
        })
        .await;

        assert_eq!(outputs, vec![6, 15, 7]);
        assert!(started.elapsed() >= BATCH_PAUSE * 2);
        assert!(started.elapsed() < BATCH_PAUSE * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn export_tallies_item_failures() {
        use lifehub_core::ItemType;

        let items = vec![
            Item::new("lifehub", "1", ItemType::Task, "ok"),
            Item::new("lifehub", "2", ItemType::Task, "bad"),
            Item::new("lifehub", "3", ItemType::Task, "ok too"),
        ];
        let result = export_in_batches(ProviderKind::Todoist, items, 2, |item| async move {
            if item.title == "bad" {
                Err(ProviderError::request_failed(400, "rejected"))
            } else {
                Ok(())
            }
        })
        .await;

        assert_eq!(result.provider, "todoist");
        assert_eq!(result.exported_items, 2);
        assert_eq!(result.failed_items, 1);
        assert!(result.errors[0].starts_with("bad: "));
    }

    #[tokio::test]
    async fn zero_batch_size_is_one() {
        let outputs = process_in_batches(vec!["a", "b"], 0, |chunk| async move { chunk.len() }).await;
        assert_eq!(outputs, vec![1, 1]);

        let empty: Vec<usize> = process_in_batches(Vec::<u8>::new(), 5, |c| async move { c.len() }).await;
        assert!(empty.is_empty());
    }
}
