//! # fsx Data Preparation
//!
//! Normalizes staged sensor exports into index-ready JSON documents:
//! - Fieldbook key tables ([`fieldbook`])
//! - Season layout path parsing ([`scan_path`])
//! - 3D scanner entropy tars ([`entropy`])
//! - stereoTop / FLIR IR camera CSVs ([`camera`])
//! - Drone TGI tars ([`drone`])
//! - AZMET weather extracts and calendar-day enrichment ([`azmet`])
//! - JSON output files ([`output`])

pub mod azmet;
pub mod camera;
pub mod drone;
pub mod entropy;
pub mod fieldbook;
pub mod output;
pub mod scan_path;

mod table;
