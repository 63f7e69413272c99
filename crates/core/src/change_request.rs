//! Client-submitted change requests against an approval record.
//!
//! Requests are an append-only feedback log: they are created from the public
//! review page, triaged by admins, and never deleted when the parent approval
//! transitions. A request that references an event deleted later from the
//! store simply goes stale; there is no referential-integrity cascade.

use serde::{Deserialize, Serialize};

use crate::approval::ApprovalKey;
use crate::error::CoreError;
use crate::types::{RequestId, Timestamp};

/// Maximum change-request description length in characters.
pub const MAX_DESCRIPTION_LEN: usize = 5_000;

/// What kind of change the client is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Modification,
    Deletion,
    Addition,
}

/// Triage status of a change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    InProgress,
    Completed,
    Rejected,
}

impl RequestStatus {
    /// Completed and rejected requests accept no further transitions;
    /// resolving them again is a successful no-op.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Rejected)
    }
}

/// One feedback item tied to an approval record by its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: RequestId,
    pub approval_key: ApprovalKey,
    pub kind: RequestKind,
    pub description: String,
    pub status: RequestStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Validate a request description before it reaches storage.
pub fn validate_description(description: &str) -> Result<(), CoreError> {
    if description.trim().is_empty() {
        return Err(CoreError::Validation(
            "description must not be empty".into(),
        ));
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(CoreError::Validation(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}
