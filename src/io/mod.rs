//! Input/output helpers.
//!
//! - cumulative table ingest + validation (`ingest`)
//! - series exports: CSV and reloadable series JSON (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
