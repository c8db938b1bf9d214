//! Report module.
//!
//! - Assembling per-symbol rows into a markdown table
//! - Archiving the previous report before writing the new one

pub mod archive;
pub mod assembler;

pub use archive::{PersistenceError, PublishOutcome, ReportWriter};
pub use assembler::{format_timestamp, Report, ReportAssembler, ReportRow, UNAVAILABLE};
