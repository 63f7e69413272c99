//! Per-client calendar synchronization.
//!
//! Each open calendar holds a [`coordinator::SyncCoordinator`]: an optimistic
//! local view plus a reconciliation loop over the store's change feed.

pub mod coordinator;

pub use coordinator::SyncCoordinator;
