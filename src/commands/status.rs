//! Status command implementation

use crate::config::Config;
use crate::db::{ChecklistDb, GlobalStats};
use crate::error::Result;
use serde::Serialize;
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub bind: String,
    pub stale_after_days: i64,
    pub enforce_question_rules: bool,
    pub db_stats: GlobalStats,
}

/// Get system status
pub async fn cmd_status(config: &Config, db: &ChecklistDb) -> Result<StatusInfo> {
    info!("Getting status");

    let db_stats = db.get_global_stats().await?;

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        bind: config.server.bind.clone(),
        stale_after_days: config.drafts.stale_after_days,
        enforce_question_rules: config.submission.enforce_question_rules,
        db_stats,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    let stats = &status.db_stats;

    println!("\n📊 fieldcheck Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("Bind: {}", status.bind);
    println!(
        "Strict question rules: {}",
        if status.enforce_question_rules { "on" } else { "off" }
    );

    println!("\nChecklists:");
    println!("  Templates: {}", stats.template_count);
    match &stats.active_template {
        Some(name) => println!("  Active: {}", name),
        None => println!("  Active: ⚠ none (run 'fieldcheck template import')"),
    }
    println!("  Questions: {}", stats.question_count);

    println!("\nInstallations:");
    println!("  Registered: {}", stats.installation_count);
    println!("  Verified: {}", stats.verified_installation_count);

    println!("\nActivity:");
    println!(
        "  Drafts: {} (stale after {} days)",
        stats.draft_count, status.stale_after_days
    );
    println!("  Submissions: {}", stats.submission_count);
    println!("  Verified submissions: {}", stats.verified_submission_count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{seed_template, setup_test_db};

    #[tokio::test]
    async fn test_status_reports_counts() {
        let (db, _tmp) = setup_test_db().await;
        seed_template(&db).await;
        db.register_installation("inst-1", None).await.unwrap();

        let status = cmd_status(&Config::default(), &db).await.unwrap();
        assert_eq!(status.db_stats.template_count, 1);
        assert_eq!(status.db_stats.active_template.as_deref(), Some("Solar Install"));
        assert_eq!(status.db_stats.question_count, 2);
        assert_eq!(status.db_stats.installation_count, 1);
        assert_eq!(status.db_stats.submission_count, 0);
        assert_eq!(status.stale_after_days, 7);
    }
}
