use cadence_core::{Lead, LeadId, LeadStatus};
use sqlx::Row;

use super::RepositoryError;
use crate::DbPool;

#[derive(Clone, Debug)]
pub struct NewLead {
    pub name: String,
    pub company: String,
    pub role: String,
    pub phone: String,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_lead: NewLead) -> Result<Lead, RepositoryError> {
        let row = sqlx::query(
            "INSERT INTO leads (name, company, role, phone, notes)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, name, company, role, phone, notes, status",
        )
        .bind(&new_lead.name)
        .bind(&new_lead.company)
        .bind(&new_lead.role)
        .bind(&new_lead.phone)
        .bind(&new_lead.notes)
        .fetch_one(&self.pool)
        .await?;

        decode_lead(&row)
    }

    pub async fn find_by_id(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, company, role, phone, notes, status FROM leads WHERE id = ?1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_lead).transpose()
    }

    /// Phone match used to identify the lead for an inbound call leg.
    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, company, role, phone, notes, status FROM leads WHERE phone = ?1",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_lead).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Lead>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, company, role, phone, notes, status FROM leads ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_lead).collect()
    }

    pub async fn update_status(
        &self,
        id: &LeadId,
        status: LeadStatus,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE leads
             SET status = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = ?2",
        )
        .bind(status.as_str())
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn decode_lead(row: &sqlx::sqlite::SqliteRow) -> Result<Lead, RepositoryError> {
    let status_raw: String = row.get("status");
    let status = LeadStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown lead status `{status_raw}`")))?;

    Ok(Lead {
        id: LeadId(row.get("id")),
        name: row.get("name"),
        company: row.get("company"),
        role: row.get("role"),
        phone: row.get("phone"),
        notes: row.get("notes"),
        status,
    })
}

#[cfg(test)]
mod tests {
    use cadence_core::LeadStatus;

    use super::{NewLead, SqlLeadRepository};
    use crate::{connect_with_settings, migrations};

    fn sample_lead(phone: &str) -> NewLead {
        NewLead {
            name: "Gal Miles".to_string(),
            company: "Sales Corp".to_string(),
            role: "VP Sales".to_string(),
            phone: phone.to_string(),
            notes: Some("Inbound inquiry".to_string()),
        }
    }

    #[tokio::test]
    async fn create_then_lookup_round_trips() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let repo = SqlLeadRepository::new(pool);

        let created = repo.create(sample_lead("+15550100")).await.expect("create");
        assert_eq!(created.status, LeadStatus::New);

        let by_id = repo.find_by_id(&created.id).await.expect("find").expect("present");
        assert_eq!(by_id, created);

        let by_phone = repo.find_by_phone("+15550100").await.expect("find").expect("present");
        assert_eq!(by_phone.id, created.id);

        assert!(repo.find_by_phone("+15550199").await.expect("find").is_none());
    }

    #[tokio::test]
    async fn update_status_persists() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let repo = SqlLeadRepository::new(pool);

        let created = repo.create(sample_lead("+15550101")).await.expect("create");
        repo.update_status(&created.id, LeadStatus::MeetingBooked).await.expect("update");

        let reloaded = repo.find_by_id(&created.id).await.expect("find").expect("present");
        assert_eq!(reloaded.status, LeadStatus::MeetingBooked);
    }

    #[tokio::test]
    async fn list_returns_leads_in_insertion_order() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        let repo = SqlLeadRepository::new(pool);

        repo.create(sample_lead("+15550102")).await.expect("create");
        repo.create(sample_lead("+15550103")).await.expect("create");

        let leads = repo.list().await.expect("list");
        assert_eq!(leads.len(), 2);
        assert!(leads[0].id.0 < leads[1].id.0);
    }
}
