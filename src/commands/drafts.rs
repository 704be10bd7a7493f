//! Draft maintenance commands

use crate::db::{ChecklistDb, DraftStats};
use crate::error::Result;
use crate::model::Draft;
use serde::Serialize;
use tracing::info;

/// Outcome of a cleanup run
#[derive(Debug, Clone, Serialize)]
pub struct CleanupStats {
    pub dry_run: bool,
    pub stale_after_days: i64,
    pub deleted_count: usize,
    pub stale_drafts: Vec<Draft>,
}

pub async fn cmd_draft_stats(db: &ChecklistDb) -> Result<DraftStats> {
    db.draft_stats().await
}

/// Delete drafts not saved within the staleness window
pub async fn cmd_draft_cleanup(db: &ChecklistDb, dry_run: bool) -> Result<CleanupStats> {
    let stale_after_days = db.draft_config().stale_after_days;

    if dry_run {
        let stale_drafts = db.list_stale_drafts().await?;
        info!("Dry run: {} stale drafts would be deleted", stale_drafts.len());
        return Ok(CleanupStats {
            dry_run,
            stale_after_days,
            deleted_count: 0,
            stale_drafts,
        });
    }

    let report = db.purge_stale_drafts().await?;
    Ok(CleanupStats {
        dry_run,
        stale_after_days,
        deleted_count: report.deleted_count,
        stale_drafts: report.stale_drafts,
    })
}

pub fn print_draft_stats(stats: &DraftStats) {
    println!("\n📝 Draft Statistics\n");
    println!("  Total: {}", stats.total_drafts);
    println!("  Saved recently: {}", stats.recent_drafts);
    println!("  Stale: {}", stats.stale_drafts);
    println!("  Average progress: {:.2}%", stats.average_progress);
}

pub fn print_cleanup_stats(stats: &CleanupStats) {
    if stats.dry_run {
        println!(
            "Dry run: {} drafts older than {} days would be deleted",
            stats.stale_drafts.len(),
            stats.stale_after_days
        );
    } else {
        println!("✓ Cleaned up {} stale drafts", stats.deleted_count);
    }

    for draft in &stats.stale_drafts {
        println!(
            "  - {} (installation {}, {}%, last saved {})",
            draft.id, draft.installation_id, draft.progress_percentage, draft.last_saved_at
        );
    }
}
