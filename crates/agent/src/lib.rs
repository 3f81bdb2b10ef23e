//! Dialogue runtime - turn-taking state machine and decision engine adapter
//!
//! This crate is the brain of the cadence system:
//! - Drives the multi-turn qualification flow (`controller`) - one
//!   `process_turn` call per inbound utterance
//! - Wraps the natural-language reasoning call (`engine` + `llm` +
//!   `openai`) and validates everything it returns
//! - Holds per-call conversation state (`session`) with session-scoped
//!   mutual exclusion
//! - Translates between the caller language and the working language at
//!   the channel boundary (`translate`)
//!
//! # Architecture
//!
//! Each turn follows a fixed path:
//! 1. **Lock + load** (`session`) - acquire the per-session lock, load or
//!    create conversation state
//! 2. **Decide** (`engine`) - ask the reasoning engine for a reply and an
//!    optional action intent
//! 3. **Resolve** (`controller`) - validate the intent, fetch authoritative
//!    slot data, book against the calendar
//! 4. **Persist + reply** - append both turns, persist, emit the outcome
//!
//! # Safety Principle
//!
//! The reasoning engine is untrusted. Its only trusted output is reply
//! text; structured actions are schema-validated into the closed
//! [`cadence_core::Action`] set or discarded. Time slots always come from
//! the calendar collaborator, never from the engine.

pub mod controller;
pub mod engine;
pub mod llm;
pub mod openai;
pub mod prompt;
pub mod session;
pub mod translate;
