//! Draft store: one scratch form per (installation, template)

use super::{format_timestamp, new_id, ChecklistDb};
use crate::error::{Error, Result};
use crate::model::{Draft, FormData};
use serde::Serialize;
use tracing::{debug, info};

/// Aggregate draft counts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftStats {
    pub total_drafts: usize,
    pub recent_drafts: usize,
    pub stale_drafts: usize,
    pub average_progress: f64,
}

/// Result of a stale-draft sweep
#[derive(Debug, Clone, Serialize)]
pub struct PurgeReport {
    pub deleted_count: usize,
    pub stale_drafts: Vec<Draft>,
}

impl ChecklistDb {
    // ===== Draft Operations =====

    pub async fn get_draft(&self, installation_id: &str, template_id: &str) -> Result<Option<Draft>> {
        let draft = sqlx::query_as::<_, Draft>(
            "SELECT * FROM checklist_drafts WHERE installation_id = ? AND template_id = ?",
        )
        .bind(installation_id)
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(draft)
    }

    /// Create or fully replace the draft for (installation, template)
    ///
    /// The stored form is overwritten, never merged. `last_saved_at` is
    /// refreshed but never moves backwards.
    pub async fn save_draft(
        &self,
        installation_id: &str,
        template_id: &str,
        form_data: &FormData,
        progress_percentage: i32,
        section: Option<&str>,
    ) -> Result<Draft> {
        if !(0..=100).contains(&progress_percentage) {
            return Err(Error::invalid(
                "progress_percentage",
                "must be between 0 and 100",
            ));
        }
        self.require_installation(installation_id).await?;
        if self.get_template(template_id).await?.is_none() {
            return Err(Error::TemplateNotFound(template_id.to_string()));
        }

        let now = self.timestamp();
        let form_json = serde_json::to_string(form_data)?;

        sqlx::query(
            r#"
            INSERT INTO checklist_drafts
                (id, installation_id, template_id, form_data, progress_percentage,
                 last_saved_section, last_saved_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(installation_id, template_id) DO UPDATE SET
                form_data = excluded.form_data,
                progress_percentage = excluded.progress_percentage,
                last_saved_section = excluded.last_saved_section,
                last_saved_at = MAX(checklist_drafts.last_saved_at, excluded.last_saved_at),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(new_id())
        .bind(installation_id)
        .bind(template_id)
        .bind(&form_json)
        .bind(progress_percentage)
        .bind(section)
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        debug!(
            installation_id = %installation_id,
            progress = progress_percentage,
            "Saved draft"
        );

        self.get_draft(installation_id, template_id)
            .await?
            .ok_or_else(|| Error::DraftNotFound(format!("{}/{}", installation_id, template_id)))
    }

    /// Delete the draft for (installation, template); absent drafts are fine
    pub async fn delete_draft(&self, installation_id: &str, template_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM checklist_drafts WHERE installation_id = ? AND template_id = ?",
        )
        .bind(installation_id)
        .bind(template_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Drafts of one installation, most recently saved first
    pub async fn list_drafts(&self, installation_id: &str) -> Result<Vec<Draft>> {
        self.require_installation(installation_id).await?;
        let drafts = sqlx::query_as::<_, Draft>(
            "SELECT * FROM checklist_drafts WHERE installation_id = ? ORDER BY last_saved_at DESC",
        )
        .bind(installation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(drafts)
    }

    pub async fn get_draft_by_id(&self, installation_id: &str, draft_id: &str) -> Result<Draft> {
        sqlx::query_as::<_, Draft>(
            "SELECT * FROM checklist_drafts WHERE id = ? AND installation_id = ?",
        )
        .bind(draft_id)
        .bind(installation_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::DraftNotFound(draft_id.to_string()))
    }

    pub async fn delete_draft_by_id(&self, installation_id: &str, draft_id: &str) -> Result<()> {
        let result =
            sqlx::query("DELETE FROM checklist_drafts WHERE id = ? AND installation_id = ?")
                .bind(draft_id)
                .bind(installation_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::DraftNotFound(draft_id.to_string()));
        }
        debug!(draft_id = %draft_id, "Deleted draft");
        Ok(())
    }

    /// Drafts not saved within the staleness window
    pub async fn list_stale_drafts(&self) -> Result<Vec<Draft>> {
        let drafts = sqlx::query_as::<_, Draft>(
            "SELECT * FROM checklist_drafts WHERE last_saved_at < ? ORDER BY last_saved_at",
        )
        .bind(self.stale_cutoff())
        .fetch_all(&self.pool)
        .await?;
        Ok(drafts)
    }

    /// Delete every stale draft, returning what was removed
    pub async fn purge_stale_drafts(&self) -> Result<PurgeReport> {
        let cutoff = self.stale_cutoff();
        let mut tx = self.pool.begin().await?;

        let stale_drafts = sqlx::query_as::<_, Draft>(
            "SELECT * FROM checklist_drafts WHERE last_saved_at < ? ORDER BY last_saved_at",
        )
        .bind(&cutoff)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM checklist_drafts WHERE last_saved_at < ?")
            .bind(&cutoff)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let deleted_count = result.rows_affected() as usize;
        info!(deleted = deleted_count, "Purged stale drafts");
        Ok(PurgeReport {
            deleted_count,
            stale_drafts,
        })
    }

    pub async fn draft_stats(&self) -> Result<DraftStats> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM checklist_drafts")
            .fetch_one(&self.pool)
            .await?;

        let recent: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM checklist_drafts WHERE last_saved_at > ?")
                .bind(self.recent_cutoff())
                .fetch_one(&self.pool)
                .await?;

        let stale: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM checklist_drafts WHERE last_saved_at < ?")
                .bind(self.stale_cutoff())
                .fetch_one(&self.pool)
                .await?;

        let average: Option<f64> =
            sqlx::query_scalar("SELECT AVG(progress_percentage) FROM checklist_drafts")
                .fetch_one(&self.pool)
                .await?;

        Ok(DraftStats {
            total_drafts: total as usize,
            recent_drafts: recent as usize,
            stale_drafts: stale as usize,
            average_progress: average.map(|a| (a * 100.0).round() / 100.0).unwrap_or(0.0),
        })
    }

    fn stale_cutoff(&self) -> String {
        format_timestamp(self.now() - chrono::Duration::days(self.drafts.stale_after_days))
    }

    fn recent_cutoff(&self) -> String {
        format_timestamp(self.now() - chrono::Duration::hours(self.drafts.recent_within_hours))
    }
}
