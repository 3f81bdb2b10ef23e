use thiserror::Error;

pub mod lead;
pub mod meeting;

pub use lead::{NewLead, SqlLeadRepository};
pub use meeting::SqlMeetingRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}
