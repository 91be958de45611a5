//! Pipeline entry points.
//!
//! - `run_sync`: Mirror every category and ingest the transferred files
//! - `run_catalog_refresh`: Replace the stored license list when a new version appears
//! - `run_pipeline`: Both, in that order

mod pipeline;
pub mod refresh;
pub mod sync;
mod validate;

pub use pipeline::{RunOptions, run_catalog, run_category_sync_all, run_pipeline};
pub use refresh::{RefreshReport, RefreshState, run_catalog_refresh};
pub use sync::{SyncContext, run_category_sync, run_sync};
pub use validate::{run_validate, validate_file};
