use sqlx::Row;

use crate::repositories::{NewLead, RepositoryError, SqlLeadRepository};
use crate::DbPool;

#[derive(Clone, Debug)]
pub struct SeedResult {
    pub leads_seeded: usize,
}

#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

/// Deterministic demo dataset: two warm leads, enough to exercise the full
/// qualify → offer → book path by hand.
pub struct DemoSeed;

impl DemoSeed {
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let existing: i64 = sqlx::query("SELECT COUNT(*) AS count FROM leads")
            .fetch_one(pool)
            .await?
            .get("count");
        if existing > 0 {
            return Ok(SeedResult { leads_seeded: 0 });
        }

        let repo = SqlLeadRepository::new(pool.clone());
        let samples = [
            NewLead {
                name: "Roy Tamir".to_string(),
                company: "Tamir Agents Ltd".to_string(),
                role: "CEO".to_string(),
                phone: "+15550100".to_string(),
                notes: Some("Warm lead from conference".to_string()),
            },
            NewLead {
                name: "Gal Miles".to_string(),
                company: "Sales Corp".to_string(),
                role: "VP Sales".to_string(),
                phone: "+15550101".to_string(),
                notes: Some("Inbound inquiry".to_string()),
            },
        ];

        let mut seeded = 0;
        for sample in samples {
            repo.create(sample).await?;
            seeded += 1;
        }

        Ok(SeedResult { leads_seeded: seeded })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let lead_count: i64 =
            sqlx::query("SELECT COUNT(*) AS count FROM leads").fetch_one(pool).await?.get("count");
        let checks = vec![("leads_present", lead_count >= 2)];
        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }
}
