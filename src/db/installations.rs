//! Installation records that checklists are filled for

use super::ChecklistDb;
use crate::error::{Error, Result};
use crate::model::Installation;
use sqlx::SqliteConnection;
use tracing::{debug, info};

impl ChecklistDb {
    // ===== Installation Operations =====

    /// Register an installation, or refresh its label if it already exists
    pub async fn register_installation(&self, id: &str, label: Option<String>) -> Result<Installation> {
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::invalid("id", "is required"));
        }
        let now = self.timestamp();

        sqlx::query(
            r#"
            INSERT INTO installations (id, label, verified_by_health_officer, created_at, updated_at)
            VALUES (?, ?, 0, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                label = COALESCE(excluded.label, installations.label),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(&label)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        info!(installation_id = %id, "Registered installation");
        self.require_installation(id).await
    }

    pub async fn get_installation(&self, id: &str) -> Result<Option<Installation>> {
        let installation =
            sqlx::query_as::<_, Installation>("SELECT * FROM installations WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(installation)
    }

    /// Installation by id, or `InstallationNotFound`
    pub async fn require_installation(&self, id: &str) -> Result<Installation> {
        self.get_installation(id)
            .await?
            .ok_or_else(|| Error::InstallationNotFound(id.to_string()))
    }

    pub async fn list_installations(&self) -> Result<Vec<Installation>> {
        let installations =
            sqlx::query_as::<_, Installation>("SELECT * FROM installations ORDER BY created_at, rowid")
                .fetch_all(&self.pool)
                .await?;
        Ok(installations)
    }

    /// Set the health-officer verification flag outside a submission
    pub async fn set_installation_verified(&self, id: &str, verified: bool) -> Result<Installation> {
        let now = self.timestamp();
        let mut conn = self.pool.acquire().await?;
        set_verified(&mut *conn, id, verified, &now).await?;
        drop(conn);
        self.require_installation(id).await
    }
}

/// Flip the verification flag on the given connection, so submissions can
/// do it inside their transaction
pub(crate) async fn set_verified(
    conn: &mut SqliteConnection,
    id: &str,
    verified: bool,
    now: &str,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE installations SET verified_by_health_officer = ?, updated_at = ? WHERE id = ?",
    )
    .bind(verified)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::InstallationNotFound(id.to_string()));
    }
    debug!(installation_id = %id, verified, "Updated installation verification");
    Ok(())
}
