//! Keyed collection of approval records.
//!
//! One record per approval key, ever. Creation is idempotent so repeated
//! "create approval page" clicks cannot duplicate a record or reset an
//! already-approved month. All transition rules live in
//! `cadence_core::approval`; this repo owns the single-record update
//! (one lock, one document, no cross-record coordination).

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use cadence_core::approval::{ApprovalKey, ApprovalRecord, ApprovalStatus, EventSnapshot};
use cadence_core::error::CoreError;

/// Provides create-or-get, transition, and unapprove for approval records.
#[derive(Default)]
pub struct ApprovalRepo {
    records: RwLock<HashMap<ApprovalKey, ApprovalRecord>>,
}

impl ApprovalRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err() -> CoreError {
        CoreError::TransientStore("approval lock poisoned".into())
    }

    /// Idempotent creation: a missing key gets a fresh `pending` record with
    /// the provided snapshot; an existing record is returned unchanged, its
    /// status and snapshot untouched.
    pub fn create_or_get(
        &self,
        key: &ApprovalKey,
        snapshot: Vec<EventSnapshot>,
    ) -> Result<ApprovalRecord, CoreError> {
        let mut records = self.records.write().map_err(|_| Self::lock_err())?;
        if let Some(existing) = records.get(key) {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let record = ApprovalRecord {
            key: key.clone(),
            status: ApprovalStatus::Pending,
            snapshot,
            created_at: now,
            updated_at: now,
        };
        records.insert(key.clone(), record.clone());
        tracing::info!(key = %key, events = record.snapshot.len(), "Approval record created");
        Ok(record)
    }

    /// Fetch one record. Absence is a normal state for the caller, not an
    /// error; the API layer turns `None` into a `data: null` sentinel.
    pub fn get(&self, key: &ApprovalKey) -> Result<Option<ApprovalRecord>, CoreError> {
        Ok(self
            .records
            .read()
            .map_err(|_| Self::lock_err())?
            .get(key)
            .cloned())
    }

    /// Apply a status transition, enforcing terminal-state protection.
    pub fn transition(
        &self,
        key: &ApprovalKey,
        next: ApprovalStatus,
    ) -> Result<ApprovalRecord, CoreError> {
        let mut records = self.records.write().map_err(|_| Self::lock_err())?;
        let record = records.get_mut(key).ok_or(CoreError::NotFound {
            entity: "ApprovalRecord",
            id: key.to_string(),
        })?;

        record.status.validate_transition(&next)?;
        let next_name = next.name();
        record.status = next;
        record.updated_at = Utc::now();

        tracing::info!(key = %key, status = next_name, "Approval transitioned");
        Ok(record.clone())
    }

    /// The only legal mutation of an approved record: reset to `pending`,
    /// clearing approver identity and timestamp. The caller boundary is
    /// responsible for confirmation; this repo is confirmation-agnostic.
    pub fn unapprove(&self, key: &ApprovalKey) -> Result<ApprovalRecord, CoreError> {
        let mut records = self.records.write().map_err(|_| Self::lock_err())?;
        let record = records.get_mut(key).ok_or(CoreError::NotFound {
            entity: "ApprovalRecord",
            id: key.to_string(),
        })?;

        if !record.status.is_terminal() {
            return Err(CoreError::Validation(format!(
                "cannot unapprove a record in status {}",
                record.status.name()
            )));
        }

        record.status = ApprovalStatus::Pending;
        record.updated_at = Utc::now();
        tracing::info!(key = %key, "Approval reset to pending");
        Ok(record.clone())
    }

    /// All records, for the admin triage overview. Ordered by key.
    pub fn list(&self) -> Result<Vec<ApprovalRecord>, CoreError> {
        let records = self.records.read().map_err(|_| Self::lock_err())?;
        let mut all: Vec<ApprovalRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
        Ok(all)
    }

    // -----------------------------------------------------------------------
    // Persistence hooks
    // -----------------------------------------------------------------------

    pub fn export(&self) -> Result<Vec<ApprovalRecord>, CoreError> {
        self.list()
    }

    pub fn import(&self, records: Vec<ApprovalRecord>) -> Result<(), CoreError> {
        let mut map = self.records.write().map_err(|_| Self::lock_err())?;
        map.clear();
        for record in records {
            map.insert(record.key.clone(), record);
        }
        Ok(())
    }
}
