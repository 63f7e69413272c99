//! Durable, versioned storage for the campaign calendar.
//!
//! [`EventStore`] is the single shared mutable resource: all calendar
//! mutations are targeted, per-event writes that publish to the change feed.
//! [`SeriesManager`] layers all-or-nothing multi-day operations on top of it.
//! Approval records and change requests live in their own keyed collections
//! ([`ApprovalRepo`], [`ChangeRequestRepo`]) with no cross-record locking.

pub mod approval_repo;
pub mod backend;
pub mod change_request_repo;
pub mod event_store;
pub mod persistence;
pub mod retry;
pub mod series_manager;

pub use approval_repo::ApprovalRepo;
pub use backend::{MemoryBackend, StoreBackend};
pub use change_request_repo::{ChangeRequestRepo, ResolveOutcome};
pub use persistence::Persister;
pub use event_store::EventStore;
pub use series_manager::{SeriesManager, SeriesPatch};
