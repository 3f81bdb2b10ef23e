use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::meeting::MeetingSlot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    NotInterested,
    Completed,
    Error,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotInterested => "not_interested",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// Structured directive attached to an agent reply. This is a closed set:
/// anything the decision engine proposes outside of it is discarded before
/// reaching the turn controller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    OfferSlots { slots: Vec<MeetingSlot> },
    BookMeeting { selected_start: DateTime<Utc>, duration_minutes: u32 },
    EndCall { reason: EndReason },
}

impl Action {
    /// Wire tag used in the `action` field of the canonical turn response.
    pub fn action_key(&self) -> &'static str {
        match self {
            Self::OfferSlots { .. } => "offer_slots",
            Self::BookMeeting { .. } => "book_meeting",
            Self::EndCall { .. } => "end_call",
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Action, EndReason};

    #[test]
    fn action_keys_match_wire_protocol() {
        let offer = Action::OfferSlots { slots: Vec::new() };
        let book = Action::BookMeeting { selected_start: Utc::now(), duration_minutes: 30 };
        let end = Action::EndCall { reason: EndReason::NotInterested };

        assert_eq!(offer.action_key(), "offer_slots");
        assert_eq!(book.action_key(), "book_meeting");
        assert_eq!(end.action_key(), "end_call");
    }

    #[test]
    fn end_reason_serializes_snake_case() {
        let raw = serde_json::to_string(&EndReason::NotInterested).expect("serialize");
        assert_eq!(raw, "\"not_interested\"");
    }
}
