pub mod calendar;
pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use calendar::SqlCalendar;
pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoSeed, SeedResult, VerificationResult};
