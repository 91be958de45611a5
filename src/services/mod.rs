//! Service layer for the ingestion pipelines.
//!
//! This module contains the business logic for:
//! - Export line parsing (`transform_line`)
//! - Per-file ingestion into the store (`IngestionSink`)
//! - License catalog retrieval (`CatalogFetcher`)

mod catalog;
mod sink;
mod transform;

pub use catalog::{CatalogFetcher, CatalogSource};
pub use sink::IngestionSink;
pub use transform::{DELIMITER, UNKNOWN_LICENSE, transform_line};
