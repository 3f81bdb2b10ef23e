use cadence_core::{LeadId, Meeting, MeetingId};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::RepositoryError;
use crate::DbPool;

#[derive(Clone)]
pub struct SqlMeetingRepository {
    pool: DbPool,
}

impl SqlMeetingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        lead_id: &LeadId,
        start: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<Meeting, RepositoryError> {
        let id = MeetingId(Uuid::new_v4().to_string());
        let calendar_link = format!("https://calendar.example.com/meeting/{}", id.0);

        sqlx::query(
            "INSERT INTO meetings (id, lead_id, start_at, duration_minutes, calendar_link)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&id.0)
        .bind(lead_id.0)
        .bind(start.to_rfc3339())
        .bind(duration_minutes as i64)
        .bind(&calendar_link)
        .execute(&self.pool)
        .await?;

        Ok(Meeting { id, lead_id: lead_id.clone(), start, duration_minutes, calendar_link })
    }

    pub async fn find_by_id(&self, id: &MeetingId) -> Result<Option<Meeting>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, lead_id, start_at, duration_minutes, calendar_link
             FROM meetings WHERE id = ?1",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_meeting).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Meeting>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, lead_id, start_at, duration_minutes, calendar_link
             FROM meetings ORDER BY start_at",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_meeting).collect()
    }
}

fn decode_meeting(row: &sqlx::sqlite::SqliteRow) -> Result<Meeting, RepositoryError> {
    let start_raw: String = row.get("start_at");
    let start = DateTime::parse_from_rfc3339(&start_raw)
        .map_err(|err| RepositoryError::Decode(format!("invalid meeting start_at: {err}")))?
        .with_timezone(&Utc);

    let duration_raw: i64 = row.get("duration_minutes");
    let duration_minutes = u32::try_from(duration_raw)
        .map_err(|_| RepositoryError::Decode(format!("invalid duration `{duration_raw}`")))?;

    Ok(Meeting {
        id: MeetingId(row.get("id")),
        lead_id: LeadId(row.get("lead_id")),
        start,
        duration_minutes,
        calendar_link: row.get("calendar_link"),
    })
}
