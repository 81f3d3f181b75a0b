//! Domain types for the siteaudit platform.
//!
//! This crate holds the scan job model, the typed event vocabulary shared
//! between the analyzer bridge and the API layer, and the narrow storage
//! contract ([`store::JobStore`]) the rest of the workspace depends on.
//! It deliberately has no I/O dependencies of its own.

pub mod error;
pub mod event;
pub mod scan;
pub mod store;
pub mod types;
