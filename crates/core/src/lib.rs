//! Domain types, validation, and error taxonomy for the campaign calendar.
//!
//! This crate has no internal dependencies so that the store, sync, and API
//! layers can all share the same event/approval/change-request definitions.

pub mod approval;
pub mod change_request;
pub mod error;
pub mod event;
pub mod sanitize;
pub mod series;
pub mod types;
