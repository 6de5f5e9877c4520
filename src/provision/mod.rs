//! Administrative provisioning — bulk account import and transcript export.

pub mod export;
pub mod importer;

pub use export::export_csv;
pub use importer::{ImportOutcome, Importer};
