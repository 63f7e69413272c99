//! Calendar event model and payload validation.
//!
//! A [`CalendarEvent`] is the unit of storage: it is created, updated, and
//! deleted individually (surgical writes), never as part of a month-wide
//! batch. The `version` field is assigned by the store on every write and is
//! the last-writer-wins ordering key during sync reconciliation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{EventId, SeriesId, Timestamp};

/// Maximum campaign name length in characters.
pub const MAX_CAMPAIGN_NAME_LEN: usize = 200;

/// Maximum brief/content length in characters.
pub const MAX_BRIEF_LEN: usize = 10_000;

/// Delivery channel for a scheduled campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    Push,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Push => "push",
        }
    }
}

/// A scheduled campaign event on one client's calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: EventId,
    /// Owning client slug (lowercase, also the first segment of approval keys).
    pub client_id: String,
    pub scheduled_at: Timestamp,
    pub channel: Channel,
    pub campaign_name: String,
    /// Free-text content brief. Sanitized at the API boundary.
    pub brief: String,
    /// Set when the event is a member of a multi-day campaign series.
    pub series_id: Option<SeriesId>,
    /// Marks a resend of an earlier campaign.
    pub is_resend: bool,
    /// Store-assigned write counter; 0 until first persisted.
    pub version: u64,
    pub updated_at: Timestamp,
}

impl CalendarEvent {
    /// Validate payload fields before the event reaches the store.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.client_id.is_empty() {
            return Err(CoreError::Validation("client_id must not be empty".into()));
        }
        if self.campaign_name.trim().is_empty() {
            return Err(CoreError::Validation(
                "campaign_name must not be empty".into(),
            ));
        }
        if self.campaign_name.chars().count() > MAX_CAMPAIGN_NAME_LEN {
            return Err(CoreError::Validation(format!(
                "campaign_name must be at most {MAX_CAMPAIGN_NAME_LEN} characters"
            )));
        }
        if self.brief.chars().count() > MAX_BRIEF_LEN {
            return Err(CoreError::Validation(format!(
                "brief must be at most {MAX_BRIEF_LEN} characters"
            )));
        }
        Ok(())
    }

    /// Apply a partial update in place. Does not touch `version` or
    /// `updated_at`; the store stamps those on write.
    pub fn apply_patch(&mut self, patch: &EventPatch) {
        if let Some(at) = patch.scheduled_at {
            self.scheduled_at = at;
        }
        if let Some(channel) = patch.channel {
            self.channel = channel;
        }
        if let Some(name) = &patch.campaign_name {
            self.campaign_name = name.clone();
        }
        if let Some(brief) = &patch.brief {
            self.brief = brief.clone();
        }
        if let Some(resend) = patch.is_resend {
            self.is_resend = resend;
        }
    }
}

/// Partial update for a calendar event. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EventPatch {
    pub scheduled_at: Option<Timestamp>,
    pub channel: Option<Channel>,
    pub campaign_name: Option<String>,
    pub brief: Option<String>,
    pub is_resend: Option<bool>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.scheduled_at.is_none()
            && self.channel.is_none()
            && self.campaign_name.is_none()
            && self.brief.is_none()
            && self.is_resend.is_none()
    }
}
