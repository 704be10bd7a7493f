//! fieldcheck CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use fieldcheck::{
    commands::{
        cmd_draft_cleanup, cmd_draft_stats, cmd_init, cmd_installation_add,
        cmd_installation_list, cmd_serve, cmd_status, cmd_submission_verify,
        cmd_template_import, cmd_template_show, print_cleanup_stats, print_draft_stats,
        print_init_report, print_installations, print_status, print_template_summary,
        InitOptions,
    },
    config::Config,
    db::ChecklistDb,
    error::{Error, Result},
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "fieldcheck")]
#[command(version, about = "Checklist engine and REST API for field installation tracking", long_about = None)]
struct Cli {
    /// Path to config file or base directory
    #[arg(short, long, global = true, env = "FIELDCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize fieldcheck configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,

        /// Do not import the bundled installation checklist
        #[arg(long)]
        no_seed: bool,
    },

    /// Run the REST API
    Serve {
        /// Address to bind (overrides server.bind)
        #[arg(long, env = "FIELDCHECK_BIND")]
        bind: Option<String>,
    },

    /// Show system status
    Status,

    /// Inspect and clean up drafts
    Drafts {
        #[command(subcommand)]
        action: DraftAction,
    },

    /// Manage checklist templates
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },

    /// Manage installations
    Installation {
        #[command(subcommand)]
        action: InstallationAction,
    },

    /// Submission lifecycle
    Submission {
        #[command(subcommand)]
        action: SubmissionAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum DraftAction {
    /// Show draft statistics
    Stats,

    /// Delete stale drafts
    Cleanup {
        /// Dry run - list what would be removed
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum TemplateAction {
    /// Import a template definition (.toml or .json); defaults to the bundled checklist
    Import {
        /// Definition file
        file: Option<PathBuf>,
    },

    /// Show a template's sections and question counts
    Show {
        /// Template ID (defaults to the active template)
        id: Option<String>,
    },
}

#[derive(Subcommand)]
enum InstallationAction {
    /// Register an installation
    Add {
        /// Installation ID
        id: String,

        /// Human-readable label
        #[arg(short, long)]
        label: Option<String>,
    },

    /// List installations
    List,
}

#[derive(Subcommand)]
enum SubmissionAction {
    /// Mark a submitted checklist as verified
    Verify {
        /// Submission ID
        id: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if cli.log_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    // Handle init command specially (doesn't need existing config)
    if let Commands::Init { force, no_seed } = cli.command {
        let options = InitOptions {
            base_dir: cli.config.as_deref().map(base_dir_for),
            force,
            seed: !no_seed,
        };
        let report = cmd_init(options).await?;
        return emit(cli.json, &report, print_init_report);
    }

    // Handle completions command (doesn't need config/db)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "fieldcheck", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;

    if let Commands::Serve { bind } = cli.command {
        return cmd_serve(config, bind).await;
    }

    let db = ChecklistDb::connect(&config).await?;
    if !db.is_initialized().await? {
        return Err(Error::NotInitialized);
    }

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } | Commands::Serve { .. } => {
            unreachable!()
        }

        Commands::Status => {
            let status = cmd_status(&config, &db).await?;
            emit(cli.json, &status, print_status)?;
        }

        Commands::Drafts { action } => match action {
            DraftAction::Stats => {
                let stats = cmd_draft_stats(&db).await?;
                emit(cli.json, &stats, print_draft_stats)?;
            }
            DraftAction::Cleanup { dry_run } => {
                let stats = cmd_draft_cleanup(&db, dry_run).await?;
                emit(cli.json, &stats, print_cleanup_stats)?;
            }
        },

        Commands::Template { action } => {
            let summary = match action {
                TemplateAction::Import { file } => {
                    cmd_template_import(&db, file.as_deref()).await?
                }
                TemplateAction::Show { id } => cmd_template_show(&db, id.as_deref()).await?,
            };
            emit(cli.json, &summary, print_template_summary)?;
        }

        Commands::Installation { action } => match action {
            InstallationAction::Add { id, label } => {
                let installation = cmd_installation_add(&db, &id, label).await?;
                emit(cli.json, &installation, |i| {
                    println!("✓ Installation '{}' registered", i.id)
                })?;
            }
            InstallationAction::List => {
                let installations = cmd_installation_list(&db).await?;
                emit(cli.json, &installations, |list| print_installations(list))?;
            }
        },

        Commands::Submission { action } => match action {
            SubmissionAction::Verify { id } => {
                let submission = cmd_submission_verify(&db, &id).await?;
                emit(cli.json, &submission, |s| {
                    println!("✓ Submission '{}' is now {}", s.id, s.status)
                })?;
            }
        },
    }

    Ok(())
}

/// Print either pretty JSON or the human rendering
fn emit<T: Serialize>(json: bool, value: &T, print: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print(value);
    }
    Ok(())
}

/// A `.toml` path names the config file; anything else is the base directory
fn base_dir_for(path: &Path) -> PathBuf {
    if path.extension().map_or(false, |e| e == "toml") {
        path.parent()
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_base_dir)
    } else {
        path.to_path_buf()
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) if path.extension().map_or(false, |e| e == "toml") => Config::load(path)?,
        Some(path) => Config::load_from(Some(path.to_path_buf()))?,
        None => Config::load_from(None)?,
    };

    if !config.paths.config_file.exists() {
        return Err(Error::NotInitialized);
    }
    Ok(config)
}
