//! Init command implementation

use super::template::cmd_template_import;
use crate::config::Config;
use crate::db::ChecklistDb;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: Option<PathBuf>,
    pub force: bool,
    /// Import the bundled installation checklist when no template exists
    pub seed: bool,
}

/// What init produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitReport {
    pub base_dir: PathBuf,
    pub config_file: PathBuf,
    pub db_file: PathBuf,
    pub seeded_template: Option<String>,
}

/// Initialize fieldcheck configuration and database
pub async fn cmd_init(options: InitOptions) -> Result<InitReport> {
    let mut config = Config::default();
    config.init_paths(options.base_dir);

    if config.paths.config_file.exists() && !options.force {
        return Err(Error::AlreadyInitialized(
            config.paths.config_file.display().to_string(),
        ));
    }

    config.save()?;

    let db = ChecklistDb::connect(&config).await?;
    db.init_schema().await?;
    info!("Created database at {:?}", config.paths.db_file);

    let seeded_template = if options.seed && db.list_templates().await?.is_empty() {
        let summary = cmd_template_import(&db, None).await?;
        Some(summary.name)
    } else {
        None
    };

    Ok(InitReport {
        base_dir: config.paths.base_dir.clone(),
        config_file: config.paths.config_file.clone(),
        db_file: config.paths.db_file.clone(),
        seeded_template,
    })
}

/// Print init outcome to console
pub fn print_init_report(report: &InitReport) {
    println!("✓ fieldcheck initialized at {}", report.base_dir.display());
    println!("  Config: {}", report.config_file.display());
    println!("  Database: {}", report.db_file.display());
    if let Some(name) = &report.seeded_template {
        println!("  Active checklist: {}", name);
    }
    println!("\nNext steps:");
    println!("  fieldcheck installation add <id>    # Register an installation");
    println!("  fieldcheck serve                    # Start the REST API");
}
