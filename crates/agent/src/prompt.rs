use cadence_core::{Lead, MeetingSlot, Speaker, Turn};
use serde_json::json;

use crate::llm::{ChatMessage, ToolSpec};

/// Persona and conversation rules for the decision engine. The engine
/// reasons in the working language only; caller-language rendering happens
/// at the channel boundary.
pub const SYSTEM_PROMPT: &str = "\
You are an AI sales agent named Nova working for Cadence Labs.

## Company: Cadence Labs
Cadence Labs provides AI solutions for sales teams. The main product is AI \
agents that help SDR teams increase sales and handle inbound leads \
automatically.

## Your Role
You call leads by phone to:
1. Present Cadence Labs and its solution
2. Qualify whether the contact has a need for the solution
3. If interested - schedule a meeting with the sales team

## Conversation Guidelines
- Be friendly but professional
- Ask short, open questions
- Listen to what the contact says
- Don't be aggressive or pushy
- If the contact says they are not interested - end politely

## Language Rules
- Respond ONLY in English. Replies are translated for the caller when \
needed; never switch languages yourself.

## Conversation Flow
1. Brief greeting + introduction
2. Short value proposition
3. Permission gate: ask if it's a good time to talk (yes/no)
4. Qualifying question: how do they handle inbound leads today?
5. If interested - one or two more qualifying questions
6. If strong interest - offer a meeting (call offer_meeting_slots)
7. When the contact selects a time - call book_meeting with that time

## Tools
When ready to offer a meeting, call offer_meeting_slots. The system \
supplies the actual times; never invent times yourself.
When the contact selects one of the offered times, call book_meeting with \
the selected start and duration exactly as offered.
If the contact is not interested, call end_call.

## Important
- Don't invent information about Cadence Labs not given to you
- Keep responses short - 1-2 sentences max
- Don't discuss pricing (that's for the meeting)
- Be authentic and natural";

/// Facts about the session the engine should know but the state machine
/// does not branch on.
#[derive(Clone, Debug, Default)]
pub struct EngineContext {
    pub already_booked: bool,
    pub already_ended: bool,
    pub pending_slots: Vec<MeetingSlot>,
}

pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "offer_meeting_slots",
            description:
                "Offer available meeting time slots when the contact shows strong interest",
            parameters: json!({
                "type": "object",
                "properties": {
                    "reason": {
                        "type": "string",
                        "description": "Why you're offering slots now"
                    }
                },
                "required": ["reason"]
            }),
        },
        ToolSpec {
            name: "book_meeting",
            description: "Book a meeting when the contact selects one of the offered times",
            parameters: json!({
                "type": "object",
                "properties": {
                    "selected_start": {
                        "type": "string",
                        "description": "RFC 3339 start of the selected slot, exactly as offered"
                    },
                    "duration_minutes": {
                        "type": "integer",
                        "description": "Duration of the selected slot in minutes"
                    }
                },
                "required": ["selected_start", "duration_minutes"]
            }),
        },
        ToolSpec {
            name: "end_call",
            description:
                "End the call politely when the contact is not interested or the conversation is complete",
            parameters: json!({
                "type": "object",
                "properties": {
                    "reason": {
                        "type": "string",
                        "description": "Reason for ending (e.g. 'Not interested', 'Meeting booked')"
                    }
                },
                "required": ["reason"]
            }),
        },
    ]
}

/// Assembles the full message sequence for one decision: persona, lead
/// context, session notes, then the conversation history (which already
/// contains the latest user utterance).
pub fn build_messages(
    lead: Option<&Lead>,
    history: &[Turn],
    context: &EngineContext,
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];

    if let Some(lead) = lead {
        let mut lead_context = format!(
            "Current lead information:\n- Name: {}\n- Company: {}\n- Role: {}\n- Phone: {}\n",
            lead.name, lead.company, lead.role, lead.phone
        );
        if let Some(notes) = &lead.notes {
            lead_context.push_str(&format!("- Notes: {notes}\n"));
        }
        messages.push(ChatMessage::system(lead_context));
    }

    if context.already_booked {
        messages.push(ChatMessage::system(
            "A meeting has already been booked in this conversation. Do not book another one \
             unless the contact explicitly asks to reschedule; acknowledge the existing booking.",
        ));
    }
    if context.already_ended {
        messages.push(ChatMessage::system(
            "This call was previously ended. The contact has spoken again; respond naturally.",
        ));
    }

    if !context.pending_slots.is_empty() {
        let mut note = String::from("Currently offered meeting slots:\n");
        for (index, slot) in context.pending_slots.iter().enumerate() {
            note.push_str(&format!(
                "{}. {} (start={}, {} minutes)\n",
                index + 1,
                slot.display_text,
                slot.start.to_rfc3339(),
                slot.duration_minutes
            ));
        }
        note.push_str(
            "If the contact picks one, call book_meeting with that exact start and duration.",
        );
        messages.push(ChatMessage::system(note));
    }

    for turn in history {
        messages.push(match turn.speaker {
            Speaker::User => ChatMessage::user(turn.text.clone()),
            Speaker::Agent => ChatMessage::assistant(turn.text.clone()),
        });
    }

    messages
}

/// Deterministic first-leg greeting. Intentionally non-LLM to minimize
/// latency at the start of a call.
pub fn permission_gate_greeting(lead: Option<&Lead>) -> String {
    let who = lead.and_then(Lead::first_name).unwrap_or("there");
    ensure_yes_no_instruction(&format!(
        "Hi {who}! I'm Nova from Cadence Labs. We help companies increase sales with AI agents. \
         Is this a good time to talk?"
    ))
}

fn ensure_yes_no_instruction(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "Please answer ONLY yes or no.".to_string();
    }
    if trimmed.to_ascii_lowercase().contains("yes or no") {
        return trimmed.to_string();
    }
    if trimmed.ends_with(['.', '!', '?']) {
        format!("{trimmed} Please answer ONLY yes or no.")
    } else {
        format!("{trimmed}. Please answer ONLY yes or no.")
    }
}

#[cfg(test)]
mod tests {
    use cadence_core::{Lead, LeadId, LeadStatus, MeetingSlot, Turn};
    use chrono::{Duration, Utc};

    use super::{build_messages, permission_gate_greeting, tool_specs, EngineContext};
    use crate::llm::ChatRole;

    fn lead() -> Lead {
        Lead {
            id: LeadId(7),
            name: "Gal Miles".to_string(),
            company: "Sales Corp".to_string(),
            role: "VP Sales".to_string(),
            phone: "+15550100".to_string(),
            notes: Some("Inbound inquiry".to_string()),
            status: LeadStatus::New,
        }
    }

    #[test]
    fn greeting_addresses_lead_by_first_name_and_gates() {
        let greeting = permission_gate_greeting(Some(&lead()));
        assert!(greeting.contains("Hi Gal!"));
        assert!(greeting.contains("ONLY yes or no"));

        let anonymous = permission_gate_greeting(None);
        assert!(anonymous.contains("Hi there!"));
    }

    #[test]
    fn messages_start_with_persona_and_include_history_in_order() {
        let now = Utc::now();
        let history =
            vec![Turn::agent("Hi! Good time to talk?", now), Turn::user("sure, go ahead", now)];
        let messages = build_messages(Some(&lead()), &history, &EngineContext::default());

        assert_eq!(messages[0].role, ChatRole::System);
        assert!(messages[1].content.contains("Gal Miles"));
        let last = messages.last().expect("history present");
        assert_eq!(last.role, ChatRole::User);
        assert_eq!(last.content, "sure, go ahead");
    }

    #[test]
    fn pending_slots_are_listed_with_machine_readable_starts() {
        let start = Utc::now() + Duration::days(1);
        let context = EngineContext {
            pending_slots: vec![MeetingSlot {
                start,
                duration_minutes: 30,
                display_text: "Tomorrow at 10:00".to_string(),
            }],
            ..EngineContext::default()
        };
        let messages = build_messages(None, &[], &context);

        let note = messages.iter().find(|m| m.content.contains("Currently offered"));
        let note = note.expect("slot note present");
        assert!(note.content.contains(&start.to_rfc3339()));
    }

    #[test]
    fn terminal_flags_produce_context_notes() {
        let context = EngineContext { already_booked: true, ..EngineContext::default() };
        let messages = build_messages(None, &[], &context);
        assert!(messages.iter().any(|m| m.content.contains("already been booked")));
    }

    #[test]
    fn tool_specs_cover_the_closed_action_set() {
        let names: Vec<_> = tool_specs().into_iter().map(|tool| tool.name).collect();
        assert_eq!(names, vec!["offer_meeting_slots", "book_meeting", "end_call"]);
    }
}
