//! Bridge to the external analyzer process.
//!
//! One analyzer subprocess is launched per scan job. Its stdout speaks
//! the `{"type", "data"}` JSON-lines protocol, decoded by [`messages`]
//! into typed events; stderr lines surface as `ERROR` log events. The
//! [`manager::ScanManager`] owns the job lifecycle: it creates the
//! record, spawns the worker, applies each event to the store, and fans
//! the event out to subscribed observers.

pub mod config;
pub mod manager;
pub mod messages;
pub mod process;

pub use config::WorkerConfig;
pub use manager::ScanManager;
