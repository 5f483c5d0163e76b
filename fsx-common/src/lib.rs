//! # fsx Common Library
//!
//! Shared code for the fsx field-scan analytics tools:
//! - Canonical scan record schema ([`record`])
//! - Scan timestamp normalization ([`scan_date`])
//! - Search cluster client ([`search`])
//! - Configuration loading ([`config`])
//! - Common error types ([`error`])

pub mod config;
pub mod error;
pub mod record;
pub mod scan_date;
pub mod search;

pub use error::{Error, Result};
pub use record::{doc_id_of, ScanRecord, SensorKind};
