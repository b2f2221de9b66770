//! Data models for the PDF sharing service.
//!
//! Records are kept in memory only; they serialize as JSON via `serde`.

pub mod stored_file;
