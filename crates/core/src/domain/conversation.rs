use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::lead::LeadId;
use crate::domain::meeting::MeetingSlot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Agent,
}

/// One utterance in a conversation. Immutable once recorded; ordering
/// within [`ConversationState::history`] is the sole source of truth for
/// context so far.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self { speaker: Speaker::User, text: text.into(), timestamp }
    }

    pub fn agent(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self { speaker: Speaker::Agent, text: text.into(), timestamp }
    }
}

/// Advisory progress marker derived from action history. Used for
/// idempotence checks and engine context, never to gate which replies are
/// possible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Greeted,
    Qualifying,
    SlotsOffered,
    Booked,
    Ended,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Booked | Self::Ended)
    }
}

/// The last set of slots offered to the caller, kept so a subsequent
/// booking attempt can be validated against what was actually offered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotOffer {
    pub slots: Vec<MeetingSlot>,
    pub offered_at: DateTime<Utc>,
}

impl SlotOffer {
    pub fn contains(&self, start: DateTime<Utc>, duration_minutes: u32) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.start == start && slot.duration_minutes == duration_minutes)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub session_id: String,
    pub history: Vec<Turn>,
    pub lead_id: Option<LeadId>,
    pub phase: Phase,
    pub pending_offer: Option<SlotOffer>,
}

impl ConversationState {
    pub fn new(session_id: impl Into<String>, lead_id: Option<LeadId>) -> Self {
        Self {
            session_id: session_id.into(),
            history: Vec::new(),
            lead_id,
            phase: Phase::NotStarted,
            pending_offer: None,
        }
    }

    /// Appends a turn. History is append-only; there is deliberately no
    /// way to remove or rewrite recorded turns.
    pub fn push_turn(&mut self, turn: Turn) {
        self.history.push(turn);
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{ConversationState, Phase, SlotOffer, Speaker, Turn};
    use crate::domain::meeting::MeetingSlot;

    #[test]
    fn new_sessions_start_empty_and_not_started() {
        let state = ConversationState::new("call-1", None);
        assert!(state.history.is_empty());
        assert_eq!(state.phase, Phase::NotStarted);
        assert!(state.pending_offer.is_none());
        assert!(!state.is_terminal());
    }

    #[test]
    fn push_turn_preserves_order() {
        let mut state = ConversationState::new("call-1", None);
        let now = Utc::now();
        state.push_turn(Turn::user("hello", now));
        state.push_turn(Turn::agent("hi there", now));

        assert_eq!(state.history.len(), 2);
        assert_eq!(state.history[0].speaker, Speaker::User);
        assert_eq!(state.history[1].speaker, Speaker::Agent);
    }

    #[test]
    fn slot_offer_matches_on_start_and_duration() {
        let start = Utc::now() + Duration::days(1);
        let offer = SlotOffer {
            slots: vec![MeetingSlot {
                start,
                duration_minutes: 30,
                display_text: "Tomorrow at 10:00".to_string(),
            }],
            offered_at: Utc::now(),
        };

        assert!(offer.contains(start, 30));
        assert!(!offer.contains(start, 45));
        assert!(!offer.contains(start + Duration::hours(1), 30));
    }

    #[test]
    fn booked_and_ended_are_terminal() {
        assert!(Phase::Booked.is_terminal());
        assert!(Phase::Ended.is_terminal());
        assert!(!Phase::SlotsOffered.is_terminal());
    }
}
