//! Sync orchestration.
//!
//! [`SyncService`] drives product pushes, stock pushes and order pulls
//! across an organization's platform connections. Each operation is
//! tracked as a sync job whose counters are written by a single
//! aggregator ([`tracker`]); per-connection work runs on a bounded pool.

mod service;
pub mod tracker;

pub use service::{ProductPushReport, SyncOptions, SyncService};
pub use tracker::{JobTracker, ProgressReporter};
