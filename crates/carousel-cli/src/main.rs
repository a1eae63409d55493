//! Carousel CLI: drives an attachment editing session from the terminal.
//!
//! Configure the upload backend with CAROUSEL_* variables (CAROUSEL_API_URL,
//! CAROUSEL_API_KEY, CAROUSEL_UPLOAD_BACKEND, ...), optionally from `.env`.
//! The instruction payload is printed to stdout as JSON; logs go to stderr.

use std::path::PathBuf;

use anyhow::Context;
use carousel_cli::{active_view, find_active, init_tracing, load_existing, read_candidate};
use carousel_core::{CarouselConfig, ErrorMetadata, MediaCollection, PickMode};
use carousel_session::EditingSession;
use carousel_storage::create_endpoint;
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "carousel", about = "Ordered image attachment editor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files into an attachment list and print the submission payload
    Attach {
        /// Files to add
        files: Vec<PathBuf>,
        /// JSON file with the existing attachments
        #[arg(long)]
        existing: Option<PathBuf>,
        /// Target folder (overrides CAROUSEL_UPLOAD_FOLDER)
        #[arg(long)]
        folder: Option<String>,
        /// Keep only the first file and replace the current list
        #[arg(long)]
        single: bool,
        /// Treat the files as a drop: non-images are skipped
        #[arg(long)]
        drop: bool,
        /// Upload id of an existing attachment to delete
        #[arg(long = "delete")]
        delete: Vec<String>,
        /// Upload id or file name of the item to make main
        #[arg(long)]
        main: Option<String>,
        /// Retry failed uploads up to this many times
        #[arg(long, default_value = "0")]
        retries: u32,
    },
    /// Normalise an existing attachment list and print its active view
    Check {
        /// JSON file with the existing attachments
        #[arg(long)]
        existing: PathBuf,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Attach {
            files,
            existing,
            folder,
            single,
            drop,
            delete,
            main,
            retries,
        } => {
            let mut config = CarouselConfig::from_env().context("Failed to load configuration")?;
            if let Some(folder) = folder {
                config.upload_folder = folder;
            }
            if single {
                config.pick_mode = PickMode::Single;
            }
            config.validate().context("Invalid configuration")?;

            let endpoint = create_endpoint(&config)
                .await
                .context("Failed to create upload endpoint")?;
            let existing = load_existing(existing.as_deref()).await?;
            let mut session = EditingSession::from_config(existing, endpoint, &config);

            let mut candidates = Vec::with_capacity(files.len());
            for path in &files {
                candidates.push(read_candidate(path).await?);
            }
            let added = if drop {
                session.intake_dropped(candidates)?
            } else {
                session.intake_picked(candidates)?
            };
            tracing::info!(added = added.len(), backend = %config.upload_backend(), "Uploading");
            session.settle().await;

            for attempt in 1..=retries {
                let failed = session.collection().failed_keys();
                if failed.is_empty() {
                    break;
                }
                tracing::info!(attempt, failed = failed.len(), "Retrying failed uploads");
                for key in failed {
                    session.retry(key)?;
                }
                session.settle().await;
            }

            for key in session.collection().failed_keys() {
                if let (Some(item), Some(err)) = (session.collection().get(key), session.failure(key)) {
                    eprintln!("{}: {} ({})", item.label(), err.user_message(), err.error_code());
                }
            }

            for upload_id in &delete {
                let key = find_active(session.collection(), upload_id)
                    .with_context(|| format!("No active attachment {}", upload_id))?;
                session.remove(key)?;
            }
            if let Some(selector) = main {
                let key = find_active(session.collection(), &selector)
                    .with_context(|| format!("No active attachment {}", selector))?;
                session.set_main(key)?;
            }

            let instructions = session.submit().map_err(|err| {
                let hint = err.suggested_action().unwrap_or_default();
                anyhow::anyhow!("{}. {}", err.user_message(), hint)
            })?;
            print_json(&instructions)?;
            session.discard();
        }
        Commands::Check { existing } => {
            let existing = load_existing(Some(&existing)).await?;
            let collection = MediaCollection::from_existing(existing);
            print_json(&active_view(&collection))?;
        }
    }

    Ok(())
}
