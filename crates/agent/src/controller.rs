use std::sync::Arc;

use cadence_core::{
    Action, Calendar, ConversationState, EndReason, Lead, MeetingSlot, Phase, SlotOffer, Turn,
};
use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::engine::{ActionIntent, DecisionEngine, EngineDecision, EngineError};
use crate::prompt::EngineContext;
use crate::session::{SessionLocks, SessionStore};

const ENGINE_UNAVAILABLE_REPLY: &str =
    "I'm having a little trouble on my end right now. Let's continue in a moment.";
const MALFORMED_FALLBACK_REPLY: &str = "Sorry, I didn't catch that. Could you repeat?";
const SLOT_LOOKUP_FAILED_REPLY: &str =
    "I couldn't pull up our available times just now. Let's try again in a moment.";
const NO_AVAILABILITY_REPLY: &str =
    "I don't seem to have any open times at the moment. Can I follow up with you later this week?";
const BOOKING_FAILED_REPLY: &str =
    "I couldn't finalize the booking just now. Let's try again in a moment.";
const MISSING_LEAD_REPLY: &str =
    "I'd love to set that up. Can I first get your name and company so I can send the invite?";

#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    pub reply_text: String,
    pub action: Option<Action>,
    pub action_payload: Option<Value>,
}

#[derive(Debug, Error)]
pub enum TurnError {
    /// No safe conversational fallback exists without state; channels must
    /// surface this as a channel-level failure, not a reply.
    #[error("session store unavailable: {0}")]
    SessionStore(String),
}

/// The turn-taking state machine. Owns the conversation's logical state:
/// applies the decision engine's output, resolves actions against the
/// calendar, updates the session store, and emits the final reply plus
/// validated action payload.
pub struct TurnController {
    store: Arc<dyn SessionStore>,
    locks: SessionLocks,
    engine: DecisionEngine,
    calendar: Arc<dyn Calendar>,
    slot_offer_count: usize,
}

impl TurnController {
    pub fn new(
        store: Arc<dyn SessionStore>,
        engine: DecisionEngine,
        calendar: Arc<dyn Calendar>,
        slot_offer_count: usize,
    ) -> Self {
        Self { store, locks: SessionLocks::new(), engine, calendar, slot_offer_count }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Processes one inbound utterance for a session. Turns within one
    /// session id are strictly sequential; the per-session lock is held
    /// from load to persist.
    ///
    /// Every collaborator failure except session-store loss degrades to a
    /// conversational reply; the persisted history always gains exactly
    /// one user turn and one agent turn per call.
    pub async fn process_turn(
        &self,
        session_id: &str,
        utterance: &str,
        lead: Option<&Lead>,
    ) -> Result<TurnOutcome, TurnError> {
        let lock = self.locks.acquire(session_id);
        let _guard = lock.lock().await;

        let mut state = self
            .store
            .get(session_id)
            .await
            .map_err(|err| TurnError::SessionStore(err.to_string()))?
            .unwrap_or_else(|| {
                ConversationState::new(session_id, lead.map(|lead| lead.id.clone()))
            });
        if state.lead_id.is_none() {
            state.lead_id = lead.map(|lead| lead.id.clone());
        }

        state.push_turn(Turn::user(utterance, Utc::now()));

        let context = EngineContext {
            already_booked: state.phase == Phase::Booked,
            already_ended: state.phase == Phase::Ended,
            pending_slots: state
                .pending_offer
                .as_ref()
                .map(|offer| offer.slots.clone())
                .unwrap_or_default(),
        };

        let outcome = match self.engine.decide(lead, &state.history, &context).await {
            Ok(decision) => self.resolve(&mut state, decision, lead).await,
            Err(EngineError::Unavailable { detail }) => {
                warn!(
                    event_name = "agent.turn.engine_unavailable",
                    session_id,
                    detail = %detail,
                    "decision engine unavailable after retry, degrading to fallback reply"
                );
                plain_reply(ENGINE_UNAVAILABLE_REPLY.to_string())
            }
            Err(EngineError::MalformedOutput { detail, reply_text }) => {
                warn!(
                    event_name = "agent.turn.engine_malformed",
                    session_id,
                    detail = %detail,
                    "discarding malformed engine action"
                );
                let reply = reply_text
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or_else(|| MALFORMED_FALLBACK_REPLY.to_string());
                plain_reply(reply)
            }
        };

        state.push_turn(Turn::agent(outcome.reply_text.clone(), Utc::now()));
        self.store
            .put(state)
            .await
            .map_err(|err| TurnError::SessionStore(err.to_string()))?;

        info!(
            event_name = "agent.turn.processed",
            session_id,
            action = outcome.action.as_ref().map(Action::action_key).unwrap_or("none"),
            "turn processed"
        );

        Ok(outcome)
    }

    async fn resolve(
        &self,
        state: &mut ConversationState,
        decision: EngineDecision,
        lead: Option<&Lead>,
    ) -> TurnOutcome {
        match decision.intent {
            None => {
                state.phase = match state.phase {
                    Phase::NotStarted => Phase::Greeted,
                    Phase::Greeted => Phase::Qualifying,
                    other => other,
                };
                plain_reply(decision.reply_text)
            }
            Some(ActionIntent::OfferSlots { reason }) => {
                self.resolve_offer(state, &reason).await
            }
            Some(ActionIntent::BookMeeting { selected_start, duration_minutes }) => {
                self.resolve_booking(state, selected_start, duration_minutes, lead).await
            }
            Some(ActionIntent::EndCall { reason }) => {
                state.phase = Phase::Ended;
                let reply = if decision.reply_text.trim().is_empty() {
                    goodbye_reply(reason)
                } else {
                    decision.reply_text
                };
                TurnOutcome {
                    reply_text: reply,
                    action: Some(Action::EndCall { reason }),
                    action_payload: Some(json!({ "reason": reason.as_str() })),
                }
            }
        }
    }

    /// The engine only signals *intent* to offer; availability comes from
    /// the calendar so the reasoning layer can never fabricate times.
    async fn resolve_offer(&self, state: &mut ConversationState, reason: &str) -> TurnOutcome {
        if let Some(offer) = &state.pending_offer {
            // Slots are already on the table; keep the conversation moving
            // instead of repeating the offer.
            return plain_reply(choose_between_reply(&offer.slots));
        }

        let slots = match self
            .calendar
            .available_slots(state.lead_id.as_ref(), self.slot_offer_count)
            .await
        {
            Ok(slots) => slots,
            Err(error) => {
                warn!(
                    event_name = "agent.turn.slot_lookup_failed",
                    session_id = %state.session_id,
                    error = %error,
                    "calendar availability lookup failed"
                );
                return plain_reply(SLOT_LOOKUP_FAILED_REPLY.to_string());
            }
        };

        let now = Utc::now();
        let mut seen = std::collections::BTreeSet::new();
        let slots: Vec<MeetingSlot> = slots
            .into_iter()
            .filter(|slot| slot.start > now)
            .filter(|slot| seen.insert((slot.start, slot.duration_minutes)))
            .collect();

        if slots.is_empty() {
            warn!(
                event_name = "agent.turn.no_availability",
                session_id = %state.session_id,
                "calendar returned no usable future slots"
            );
            return plain_reply(NO_AVAILABILITY_REPLY.to_string());
        }

        info!(
            event_name = "agent.turn.slots_offered",
            session_id = %state.session_id,
            slot_count = slots.len(),
            reason,
            "offering meeting slots"
        );

        let reply = offer_reply(&slots);
        state.pending_offer = Some(SlotOffer { slots: slots.clone(), offered_at: now });
        state.phase = Phase::SlotsOffered;

        TurnOutcome {
            reply_text: reply,
            action_payload: Some(json!({ "slots": &slots })),
            action: Some(Action::OfferSlots { slots }),
        }
    }

    async fn resolve_booking(
        &self,
        state: &mut ConversationState,
        selected_start: chrono::DateTime<Utc>,
        duration_minutes: u32,
        lead: Option<&Lead>,
    ) -> TurnOutcome {
        let matched = state
            .pending_offer
            .as_ref()
            .filter(|offer| offer.contains(selected_start, duration_minutes))
            .and_then(|offer| {
                offer.slots.iter().find(|slot| slot.start == selected_start).cloned()
            });

        let Some(slot) = matched else {
            // Booking a time that was never offered is a validation
            // failure, not a silent booking; ask the caller to re-select.
            warn!(
                event_name = "agent.turn.invalid_booking_attempt",
                session_id = %state.session_id,
                selected_start = %selected_start.to_rfc3339(),
                "booking attempt did not match the pending offer"
            );
            let reply = match &state.pending_offer {
                Some(offer) => choose_between_reply(&offer.slots),
                None => "I haven't offered any times yet. Would you like me to check our \
                         availability?"
                    .to_string(),
            };
            return plain_reply(reply);
        };

        let Some(lead_id) = state.lead_id.clone().or_else(|| lead.map(|l| l.id.clone())) else {
            return plain_reply(MISSING_LEAD_REPLY.to_string());
        };

        match self.calendar.create_meeting(&lead_id, selected_start, duration_minutes).await {
            Ok(meeting) => {
                state.phase = Phase::Booked;
                state.pending_offer = None;
                info!(
                    event_name = "agent.turn.meeting_booked",
                    session_id = %state.session_id,
                    meeting_id = %meeting.id,
                    lead_id = %lead_id,
                    "meeting booked"
                );
                TurnOutcome {
                    reply_text: booked_reply(&slot),
                    action: Some(Action::BookMeeting { selected_start, duration_minutes }),
                    action_payload: Some(json!({
                        "meeting_id": meeting.id.0,
                        "start": meeting.start.to_rfc3339(),
                        "duration_minutes": meeting.duration_minutes,
                        "calendar_link": meeting.calendar_link,
                    })),
                }
            }
            Err(error) => {
                warn!(
                    event_name = "agent.turn.booking_failed",
                    session_id = %state.session_id,
                    error = %error,
                    "calendar booking failed, keeping pending offer"
                );
                plain_reply(BOOKING_FAILED_REPLY.to_string())
            }
        }
    }
}

fn plain_reply(reply_text: String) -> TurnOutcome {
    TurnOutcome { reply_text, action: None, action_payload: None }
}

fn offer_reply(slots: &[MeetingSlot]) -> String {
    let options =
        slots.iter().map(|slot| slot.display_text.clone()).collect::<Vec<_>>().join(" or ");
    format!(
        "Sounds great! I'd be happy to schedule a brief introduction call. I have availability \
         {options}. What works for you?"
    )
}

fn choose_between_reply(slots: &[MeetingSlot]) -> String {
    let options = slots
        .iter()
        .enumerate()
        .map(|(index, slot)| format!("option {}: {}", index + 1, slot.display_text))
        .collect::<Vec<_>>()
        .join(" or ");
    format!(
        "Just to confirm, which time works for you: {options}? If neither works, tell me what \
         day and time you'd prefer."
    )
}

fn booked_reply(slot: &MeetingSlot) -> String {
    format!(
        "Excellent! I've scheduled our meeting for {}. You'll receive a calendar invitation \
         shortly. Looking forward to it!",
        slot.display_text
    )
}

fn goodbye_reply(reason: EndReason) -> String {
    match reason {
        EndReason::NotInterested => {
            "I completely understand. If you'd like to talk in the future, I'd be happy to. Have \
             a good day!"
                .to_string()
        }
        EndReason::Completed | EndReason::Error => {
            "Thank you for your time. Have a great day!".to_string()
        }
    }
}
