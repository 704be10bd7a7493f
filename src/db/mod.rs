//! Checklist storage using SQLite
//!
//! This module holds all persistent checklist state:
//! - Templates, sections and questions (the template store)
//! - Drafts (per-installation scratch forms)
//! - Submissions and their answers
//! - The installation records checklists are filled for

mod drafts;
mod installations;
mod schema;
mod submissions;
mod templates;

pub use drafts::{DraftStats, PurgeReport};
pub use schema::*;

use crate::config::{Config, DraftConfig, SubmissionConfig};
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Source of the current time for timestamps and staleness checks
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Format a timestamp for storage
///
/// Fixed microsecond precision with a `Z` suffix, so stored values order
/// correctly as plain strings.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Global statistics
#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    pub template_count: usize,
    pub active_template: Option<String>,
    pub question_count: usize,
    pub installation_count: usize,
    pub verified_installation_count: usize,
    pub draft_count: usize,
    pub submission_count: usize,
    pub verified_submission_count: usize,
}

/// Checklist database handle
#[derive(Debug, Clone)]
pub struct ChecklistDb {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    drafts: DraftConfig,
    submission: SubmissionConfig,
}

impl ChecklistDb {
    /// Connect to the checklist database
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = Self::open_pool(&config.paths.db_file, config.database.max_connections).await?;

        Ok(Self {
            pool,
            clock: Arc::new(SystemClock),
            drafts: config.drafts.clone(),
            submission: config.submission.clone(),
        })
    }

    /// Create database with path directly (without full config)
    pub async fn new(db_path: &Path) -> Result<Self> {
        let pool = Self::open_pool(db_path, 5).await?;

        let db = Self {
            pool,
            clock: Arc::new(SystemClock),
            drafts: DraftConfig::default(),
            submission: SubmissionConfig::default(),
        };

        // Auto-initialize schema if needed
        if !db.is_initialized().await? {
            db.init_schema().await?;
        }

        Ok(db)
    }

    async fn open_pool(db_path: &Path, max_connections: u32) -> Result<SqlitePool> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(pool)
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_draft_config(mut self, drafts: DraftConfig) -> Self {
        self.drafts = drafts;
        self
    }

    pub fn with_submission_config(mut self, submission: SubmissionConfig) -> Self {
        self.submission = submission;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn timestamp(&self) -> String {
        format_timestamp(self.clock.now())
    }

    pub fn draft_config(&self) -> &DraftConfig {
        &self.drafts
    }

    pub fn submission_config(&self) -> &SubmissionConfig {
        &self.submission
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='checklist_templates'",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(result.is_some())
    }

    // ===== Statistics =====

    /// Get global statistics
    pub async fn get_global_stats(&self) -> Result<GlobalStats> {
        let template_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM checklist_templates")
            .fetch_one(&self.pool)
            .await?;

        let active_template = self.get_active_template().await?.map(|t| t.name);

        let question_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM checklist_questions")
            .fetch_one(&self.pool)
            .await?;

        let (installation_count, verified_installation_count): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(verified_by_health_officer), 0) FROM installations",
        )
        .fetch_one(&self.pool)
        .await?;

        let draft_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM checklist_drafts")
            .fetch_one(&self.pool)
            .await?;

        let (submission_count, verified_submission_count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'verified' THEN 1 ELSE 0 END), 0)
            FROM checklist_submissions
            WHERE deleted_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(GlobalStats {
            template_count: template_count as usize,
            active_template,
            question_count: question_count as usize,
            installation_count: installation_count as usize,
            verified_installation_count: verified_installation_count as usize,
            draft_count: draft_count as usize,
            submission_count: submission_count as usize,
            verified_submission_count: verified_submission_count as usize,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let (db, _tmp) = setup_test_db().await;
        assert!(db.is_initialized().await.unwrap());
        db.init_schema().await.unwrap();
        assert!(db.is_initialized().await.unwrap());
    }

    #[tokio::test]
    async fn test_new_auto_initializes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db = ChecklistDb::new(&tmp.path().join("nested").join("c.db"))
            .await
            .unwrap();
        assert!(db.is_initialized().await.unwrap());
    }

    #[tokio::test]
    async fn test_global_stats() {
        let (db, _tmp) = setup_test_db().await;
        let stats = db.get_global_stats().await.unwrap();
        assert_eq!(stats.template_count, 0);
        assert!(stats.active_template.is_none());

        seed_template(&db).await;
        db.register_installation("inst-1", None).await.unwrap();

        let stats = db.get_global_stats().await.unwrap();
        assert_eq!(stats.template_count, 1);
        assert_eq!(stats.active_template.as_deref(), Some("Solar Install"));
        assert_eq!(stats.question_count, 2);
        assert_eq!(stats.installation_count, 1);
        assert_eq!(stats.verified_installation_count, 0);
    }

    #[test]
    fn test_timestamps_sort_as_strings() {
        let earlier = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = earlier + chrono::Duration::milliseconds(1);
        let a = format_timestamp(earlier);
        let b = format_timestamp(later);
        assert!(a < b);
        assert_eq!(a, "2025-01-01T00:00:00.000000Z");
    }
}
