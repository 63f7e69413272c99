//! Change-feed plumbing for the campaign calendar.
//!
//! The store publishes every mutation here; sync coordinators and the
//! WebSocket surface subscribe. See [`feed::ChangeFeed`].

pub mod feed;

pub use feed::{ChangeFeed, ChangeKind, EventChange, ScopedReceiver};
