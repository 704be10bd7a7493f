//! Serve command: run the REST API

use crate::api::{self, AppState};
use crate::config::Config;
use crate::db::ChecklistDb;
use crate::error::Result;
use tracing::info;

/// Start the HTTP server, optionally overriding the configured bind address
pub async fn cmd_serve(mut config: Config, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    let addr = config.bind_addr()?;

    let db = ChecklistDb::connect(&config).await?;
    if !db.is_initialized().await? {
        info!("Initializing schema at {:?}", config.paths.db_file);
        db.init_schema().await?;
    }

    match db.get_active_template().await? {
        Some(template) => info!(
            template_id = %template.id,
            "Serving checklist '{}' v{}", template.name, template.version
        ),
        None => tracing::warn!(
            "No active checklist; run 'fieldcheck template import' before collecting data"
        ),
    }

    api::serve(AppState::new(db, config), addr).await
}
