//! Integration trait, shared transport/auth contract and provider adapters.
//!
//! This crate provides everything between an upstream service and the item
//! store:
//!
//! - [`Integration`] - The trait every provider adapter implements
//! - [`AuthSession`] / [`authenticated_request`] - Token state, retry,
//!   rate-limit backoff and 401 refresh
//! - [`HttpTransport`] - The HTTP seam; [`ReqwestTransport`] in production
//! - [`paginate`] / [`process_in_batches`] - Shared fetch helpers
//! - [`run_import`] - Deduplication and persistence of fetched items
//! - [`ProviderError`] - Error types for provider operations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐
//! │ Todoist  │ │ Google   │ │ Outlook  │ │ Notion   │ │ OneNote  │ │ YouTube  │
//! └────┬─────┘ └────┬─────┘ └────┬─────┘ └────┬─────┘ └────┬─────┘ └────┬─────┘
//!      │            │            │            │            │            │
//!      └────────────┴────────────┴─────┬──────┴────────────┴────────────┘
//!                                      │  Integration
//!                                      ▼
//!                       ┌──────────────────────────────┐
//!                       │ AuthSession                  │
//!                       │ authenticated_request()      │──▶ HttpTransport
//!                       └──────────────┬───────────────┘
//!                                      │ FetchedItems
//!                                      ▼
//!                       ┌──────────────────────────────┐
//!                       │ run_import(): dedupe+persist │──▶ ItemStore
//!                       └──────────────┬───────────────┘
//!                                      ▼
//!                                ImportResult
//! ```
//!
//! # Example
//!
//! ```ignore
//! use lifehub_providers::{ImportOptions, MemoryItemStore, TodoistIntegration, run_import};
//!
//! async fn import(todoist: &TodoistIntegration, store: &MemoryItemStore) {
//!     todoist.authenticate().await?;
//!     let result = run_import(todoist, store, ImportOptions::new()).await?;
//!     println!("{} new tasks", result.imported_items);
//! }
//! ```

pub mod config;
pub mod error;
pub mod helpers;
pub mod import;
pub mod oauth;
pub mod provider;
pub mod session;
pub mod store;
pub mod text;
pub mod tokens;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

#[cfg(any(feature = "outlook-calendar", feature = "onenote"))]
mod graph;

#[cfg(feature = "google-calendar")]
pub mod google_calendar;
#[cfg(feature = "notion")]
pub mod notion;
#[cfg(feature = "onenote")]
pub mod onenote;
#[cfg(feature = "outlook-calendar")]
pub mod outlook_calendar;
#[cfg(feature = "todoist")]
pub mod todoist;
#[cfg(feature = "youtube")]
pub mod youtube;

// Re-export main types at crate root
pub use config::IntegrationConfig;
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use helpers::{MAX_PAGES, Page, export_in_batches, paginate, process_in_batches};
pub use import::{DedupeIndex, dedupe_key, run_import, run_url_import};
pub use oauth::{CodeExchange, OAuthClient, PkceFlow};
pub use provider::{
    AuthKind, AuthorizationRequest, BoxFuture, Capabilities, ExportOptions, FetchedItems,
    ImportOptions, Integration, IntegrationStatus, ProviderKind,
};
pub use session::{AuthSession, authenticated_request};
pub use store::{
    CredentialStore, ItemStore, ItemStoreEvent, MemoryCredentialStore, MemoryItemStore,
    StoreError, StoreResult,
};
pub use tokens::TokenRecord;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

#[cfg(feature = "google-calendar")]
pub use google_calendar::GoogleCalendarIntegration;
#[cfg(feature = "notion")]
pub use notion::NotionIntegration;
#[cfg(feature = "onenote")]
pub use onenote::OneNoteIntegration;
#[cfg(feature = "outlook-calendar")]
pub use outlook_calendar::OutlookCalendarIntegration;
#[cfg(feature = "todoist")]
pub use todoist::TodoistIntegration;
#[cfg(feature = "youtube")]
pub use youtube::YouTubeIntegration;
