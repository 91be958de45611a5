// src/lib.rs

//! license-sync library
//!
//! Mirrors category-partitioned package license exports into a document
//! store and keeps a single version of the SPDX license list alongside them.

pub mod config;
pub mod error;
pub mod events;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod mirror;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
