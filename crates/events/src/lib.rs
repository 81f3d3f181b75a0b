//! Event fan-out to live observers.
//!
//! [`ScanBroadcaster`] is the single owner of the job-id -> observer
//! registry. Observers are registered through [`ScanBroadcaster::subscribe`]
//! and torn down through [`unsubscribe`](ScanBroadcaster::unsubscribe) /
//! [`disconnect`](ScanBroadcaster::disconnect); no other code path touches
//! the registry.

mod broadcaster;

pub use broadcaster::{ObserverSender, ScanBroadcaster};
