use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::lead::LeadId;
use crate::domain::meeting::{Meeting, MeetingSlot};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("slot lookup failed: {0}")]
    SlotLookup(String),
    #[error("booking failed: {0}")]
    Booking(String),
}

/// Collaborator contract for availability and bookings.
///
/// Implementations decide slot-generation policy; callers may rely on the
/// returned slots being strictly in the future at lookup time and
/// duplicate-free within one response.
#[async_trait]
pub trait Calendar: Send + Sync {
    async fn available_slots(
        &self,
        lead_id: Option<&LeadId>,
        count: usize,
    ) -> Result<Vec<MeetingSlot>, CalendarError>;

    async fn create_meeting(
        &self,
        lead_id: &LeadId,
        start: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<Meeting, CalendarError>;
}
