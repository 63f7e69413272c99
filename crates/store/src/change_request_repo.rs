//! Append-only log of client change requests.
//!
//! Requests are created from the public review page and resolved by admin
//! triage. A request requires its parent approval record to exist at
//! creation time, but is never deleted afterwards: it is a historical
//! record, even when the parent transitions or referenced events disappear.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use uuid::Uuid;

use cadence_core::approval::ApprovalKey;
use cadence_core::change_request::{self, ChangeRequest, RequestKind, RequestStatus};
use cadence_core::error::CoreError;

use crate::approval_repo::ApprovalRepo;

/// Outcome of an admin triage action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveOutcome {
    InProgress,
    Completed,
    Rejected,
}

impl From<ResolveOutcome> for RequestStatus {
    fn from(outcome: ResolveOutcome) -> Self {
        match outcome {
            ResolveOutcome::InProgress => RequestStatus::InProgress,
            ResolveOutcome::Completed => RequestStatus::Completed,
            ResolveOutcome::Rejected => RequestStatus::Rejected,
        }
    }
}

/// Provides create, list, and resolve for change requests.
pub struct ChangeRequestRepo {
    approvals: Arc<ApprovalRepo>,
    /// Insertion order doubles as creation order for `list`.
    requests: RwLock<Vec<ChangeRequest>>,
}

impl ChangeRequestRepo {
    pub fn new(approvals: Arc<ApprovalRepo>) -> Self {
        Self {
            approvals,
            requests: RwLock::new(Vec::new()),
        }
    }

    fn lock_err() -> CoreError {
        CoreError::TransientStore("change request lock poisoned".into())
    }

    /// Create a request against an existing approval record.
    ///
    /// The parent's status is deliberately not checked: clients may file
    /// late feedback against an already-approved month.
    pub fn create(
        &self,
        approval_key: &ApprovalKey,
        kind: RequestKind,
        description: String,
    ) -> Result<ChangeRequest, CoreError> {
        change_request::validate_description(&description)?;
        if self.approvals.get(approval_key)?.is_none() {
            return Err(CoreError::NotFound {
                entity: "ApprovalRecord",
                id: approval_key.to_string(),
            });
        }

        let now = Utc::now();
        let request = ChangeRequest {
            id: Uuid::new_v4(),
            approval_key: approval_key.clone(),
            kind,
            description,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        self.requests
            .write()
            .map_err(|_| Self::lock_err())?
            .push(request.clone());

        tracing::info!(
            request_id = %request.id,
            key = %approval_key,
            kind = ?kind,
            "Change request created"
        );
        Ok(request)
    }

    /// All requests for a key in creation order (oldest first), so the
    /// admin queue reads as the client's task list.
    pub fn list(&self, approval_key: &ApprovalKey) -> Result<Vec<ChangeRequest>, CoreError> {
        Ok(self
            .requests
            .read()
            .map_err(|_| Self::lock_err())?
            .iter()
            .filter(|r| &r.approval_key == approval_key)
            .cloned()
            .collect())
    }

    /// Resolve a pending or in-progress request. Resolving a request that is
    /// already completed/rejected is a successful no-op (idempotent); the
    /// stored outcome is not overwritten.
    pub fn resolve(
        &self,
        request_id: uuid::Uuid,
        outcome: ResolveOutcome,
    ) -> Result<ChangeRequest, CoreError> {
        let mut requests = self.requests.write().map_err(|_| Self::lock_err())?;
        let request = requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or(CoreError::NotFound {
                entity: "ChangeRequest",
                id: request_id.to_string(),
            })?;

        if request.status.is_terminal() {
            return Ok(request.clone());
        }

        request.status = outcome.into();
        request.updated_at = Utc::now();
        tracing::info!(request_id = %request.id, status = ?request.status, "Change request resolved");
        Ok(request.clone())
    }

    // -----------------------------------------------------------------------
    // Persistence hooks
    // -----------------------------------------------------------------------

    pub fn export(&self) -> Result<Vec<ChangeRequest>, CoreError> {
        Ok(self.requests.read().map_err(|_| Self::lock_err())?.clone())
    }

    pub fn import(&self, requests: Vec<ChangeRequest>) -> Result<(), CoreError> {
        *self.requests.write().map_err(|_| Self::lock_err())? = requests;
        Ok(())
    }
}
