//! Domain model and shared configuration for the cadence dialogue system.
//!
//! This crate holds the types every other crate agrees on:
//! - leads, meetings, and meeting slots
//! - conversation state (turns, phases, pending offers)
//! - the closed [`domain::action::Action`] set an agent reply may carry
//! - the [`scheduling::Calendar`] collaborator seam
//! - layered configuration loading and validation
//!
//! It performs no network or database I/O; collaborator implementations
//! live in `cadence-db` and `cadence-agent`.

pub mod config;
pub mod domain;
pub mod scheduling;

pub use domain::action::{Action, EndReason};
pub use domain::conversation::{ConversationState, Phase, SlotOffer, Speaker, Turn};
pub use domain::lead::{Lead, LeadId, LeadStatus};
pub use domain::meeting::{Meeting, MeetingId, MeetingSlot};
pub use scheduling::{Calendar, CalendarError};
