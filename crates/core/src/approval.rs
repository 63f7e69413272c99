//! Approval lifecycle: keys, status state machine, and records.
//!
//! An [`ApprovalRecord`] captures one client-facing review of one month.
//! Status is a tagged enum so that illegal states (an approved record with no
//! approver) are unrepresentable. The approved state is terminal: the only
//! way out is the explicit unapprove operation, which is modeled separately
//! from ordinary transitions.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::event::CalendarEvent;
use crate::types::{EventId, Timestamp, YearMonth};

// ---------------------------------------------------------------------------
// ApprovalKey
// ---------------------------------------------------------------------------

/// Deterministic approval identifier: `{client_slug}-{year}-{MM}`.
///
/// The key doubles as the externally shared URL path segment for the
/// client-facing review page, so it is restricted to `[a-z0-9-]` and parsed
/// through an allow-list before it ever addresses storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApprovalKey(String);

impl ApprovalKey {
    /// Build a key from a client slug and month scope.
    ///
    /// The slug must already be lowercase `[a-z0-9-]`; anything else is a
    /// validation error rather than something we silently normalize.
    pub fn new(client_slug: &str, scope: YearMonth) -> Result<Self, CoreError> {
        if client_slug.is_empty() {
            return Err(CoreError::Validation("client slug must not be empty".into()));
        }
        if !is_key_charset(client_slug) {
            return Err(CoreError::Validation(format!(
                "client slug '{client_slug}' may only contain a-z, 0-9, and hyphens"
            )));
        }
        Ok(Self(format!("{client_slug}-{}-{:02}", scope.year, scope.month)))
    }

    /// Parse and validate an externally supplied key.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        if raw.is_empty() || !is_key_charset(raw) {
            return Err(CoreError::Validation(format!(
                "approval key '{raw}' may only contain a-z, 0-9, and hyphens"
            )));
        }
        // Structural check: the last two segments are a 4-digit year and a
        // 2-digit month; everything before them is the client slug.
        let mut parts = raw.rsplitn(3, '-');
        let month = parts.next().unwrap_or_default();
        let year = parts.next().unwrap_or_default();
        let slug = parts.next().unwrap_or_default();

        if slug.is_empty() {
            return Err(CoreError::Validation(format!(
                "approval key '{raw}' is missing a client slug"
            )));
        }
        if year.len() != 4 || month.len() != 2 {
            return Err(CoreError::Validation(format!(
                "approval key '{raw}' must end in -YYYY-MM"
            )));
        }
        let year: i32 = year
            .parse()
            .map_err(|_| CoreError::Validation(format!("approval key '{raw}' has a non-numeric year")))?;
        let month: u32 = month
            .parse()
            .map_err(|_| CoreError::Validation(format!("approval key '{raw}' has a non-numeric month")))?;
        YearMonth::new(year, month)?;

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The client slug portion of the key.
    pub fn client_slug(&self) -> &str {
        // parse() guaranteed the -YYYY-MM suffix (8 chars).
        &self.0[..self.0.len() - 8]
    }

    /// The month scope encoded in the key.
    pub fn scope(&self) -> YearMonth {
        let tail = &self.0[self.0.len() - 7..];
        let (year, month) = tail.split_at(4);
        YearMonth {
            year: year.parse().unwrap_or(0),
            month: month[1..].parse().unwrap_or(0),
        }
    }
}

impl std::fmt::Display for ApprovalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ApprovalKey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ApprovalKey::parse(&value)
    }
}

impl From<ApprovalKey> for String {
    fn from(key: ApprovalKey) -> Self {
        key.0
    }
}

fn is_key_charset(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

// ---------------------------------------------------------------------------
// ApprovalStatus
// ---------------------------------------------------------------------------

/// Review status of one (client, month) approval record.
///
/// Serialized with an internally tagged `"status"` discriminator so the
/// review page can route on the status string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Initial state, implicit on first creation.
    Pending,
    /// Terminal state; carries who approved and when.
    Approved {
        approved_by: String,
        approved_at: Timestamp,
    },
    /// Client asked for changes; notes carry their summary.
    ChangesRequested { notes: Option<String> },
    /// Client rejected the month outright.
    Rejected { notes: Option<String> },
}

impl ApprovalStatus {
    /// The wire name of the status, matching the serde tag.
    pub fn name(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved { .. } => "approved",
            ApprovalStatus::ChangesRequested { .. } => "changes_requested",
            ApprovalStatus::Rejected { .. } => "rejected",
        }
    }

    /// Approved records are read-only except for explicit unapprove.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApprovalStatus::Approved { .. })
    }

    /// Validate a transition from `self` to `next`.
    ///
    /// - `approved` rejects everything (unapprove is a separate operation,
    ///   not a transition).
    /// - `changes_requested` and `rejected` may go back to `pending` or
    ///   forward to `approved`; re-applying the same status refreshes notes.
    /// - `pending` may move to any status.
    pub fn validate_transition(&self, next: &ApprovalStatus) -> Result<(), CoreError> {
        match (self, next) {
            (ApprovalStatus::Approved { .. }, _) => Err(CoreError::TerminalState(
                "approved records only accept an explicit unapprove".into(),
            )),
            (ApprovalStatus::Pending, _) => Ok(()),
            (
                ApprovalStatus::ChangesRequested { .. },
                ApprovalStatus::Pending
                | ApprovalStatus::Approved { .. }
                | ApprovalStatus::ChangesRequested { .. },
            ) => Ok(()),
            (
                ApprovalStatus::Rejected { .. },
                ApprovalStatus::Pending | ApprovalStatus::Approved { .. } | ApprovalStatus::Rejected { .. },
            ) => Ok(()),
            (current, next) => Err(CoreError::Validation(format!(
                "cannot transition from {} to {}",
                current.name(),
                next.name()
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ApprovalRecord
// ---------------------------------------------------------------------------

/// A frozen projection of one calendar event, captured when the approval
/// record is created. The review page renders this snapshot, not a live
/// query, so later edits do not silently change what was approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub id: EventId,
    pub scheduled_at: Timestamp,
    pub channel: crate::event::Channel,
    pub campaign_name: String,
}

impl From<&CalendarEvent> for EventSnapshot {
    fn from(event: &CalendarEvent) -> Self {
        Self {
            id: event.id,
            scheduled_at: event.scheduled_at,
            channel: event.channel,
            campaign_name: event.campaign_name.clone(),
        }
    }
}

/// One (client, month) approval record. At most one exists per key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub key: ApprovalKey,
    #[serde(flatten)]
    pub status: ApprovalStatus,
    pub snapshot: Vec<EventSnapshot>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
