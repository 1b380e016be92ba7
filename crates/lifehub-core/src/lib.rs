//! Core types: normalized items, import results, time windows, tracing

pub mod import;
pub mod item;
pub mod time;
pub mod tracing;

pub use import::{ExportResult, ImportResult};
pub use item::{Item, ItemMetadata, ItemType, item_id};
pub use time::TimeWindow;
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
