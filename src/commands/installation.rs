//! Installation and submission lifecycle commands

use crate::db::ChecklistDb;
use crate::error::Result;
use crate::model::{Installation, Submission};
use tracing::info;

pub async fn cmd_installation_add(
    db: &ChecklistDb,
    id: &str,
    label: Option<String>,
) -> Result<Installation> {
    info!(installation_id = %id, "Registering installation");
    db.register_installation(id, label).await
}

pub async fn cmd_installation_list(db: &ChecklistDb) -> Result<Vec<Installation>> {
    db.list_installations().await
}

/// Move a submission from submitted to verified
pub async fn cmd_submission_verify(db: &ChecklistDb, id: &str) -> Result<Submission> {
    db.verify_submission(id).await
}

pub fn print_installations(installations: &[Installation]) {
    if installations.is_empty() {
        println!("No installations registered. Add one with 'fieldcheck installation add <id>'");
        return;
    }

    println!("\n🔧 Installations\n");
    for installation in installations {
        let verified = if installation.verified_by_health_officer {
            "✓ verified"
        } else {
            "pending"
        };
        match &installation.label {
            Some(label) => println!("  {} ({}) [{}]", installation.id, label, verified),
            None => println!("  {} [{}]", installation.id, verified),
        }
    }
}
