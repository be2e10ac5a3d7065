//! Resumable Upload CLI
//!
//! Uploads a local file to the configured bucket, resuming from the
//! progress ledger when a previous attempt was interrupted.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resumable_upload::ledger::create_pool;
use resumable_upload::{Config, S3MultipartStore, SqliteLedger, UploadEngine};

#[derive(Parser)]
#[command(name = "resumable-upload", version, about = "Resumable multipart uploads to S3")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a file, resuming any interrupted attempt for the same key
    Upload {
        /// Local file; its base name becomes the object key
        file: PathBuf,
    },
    /// Show in-flight uploads (all of them, or one key)
    Status {
        key: Option<String>,
    },
    /// Abandon an in-flight upload and discard its parts
    Abort {
        key: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resumable_upload=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Invalid configuration")?;

    tracing::info!("S3 bucket: {}", config.storage.bucket);
    tracing::info!("S3 region: {}", config.storage.region);

    let pool = create_pool(&config.ledger.url)
        .await
        .with_context(|| format!("Failed to open progress ledger at {}", config.ledger.url))?;
    let ledger = SqliteLedger::new(pool);

    let store = S3MultipartStore::new(&config.storage).await;

    let engine = UploadEngine::new(
        config.storage.bucket.clone(),
        Arc::new(ledger.clone()),
        Arc::new(store.clone()),
    );

    match cli.command {
        Command::Upload { file } => {
            store.verify_bucket(engine.bucket()).await;
            let receipt = engine.upload_file(&file).await.map_err(|e| {
                let hint = if e.is_resumable() { "; run again to resume" } else { "" };
                anyhow::Error::new(e).context(format!("Upload of {} failed{}", file.display(), hint))
            })?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
        Command::Status { key: Some(key) } => match engine.status(&key).await? {
            Some(progress) => println!("{}", serde_json::to_string_pretty(&progress)?),
            None => println!("No upload in flight for {}", key),
        },
        Command::Status { key: None } => {
            let in_flight = ledger.list(engine.bucket()).await?;
            println!("{}", serde_json::to_string_pretty(&in_flight)?);
        }
        Command::Abort { key } => {
            let removed = engine.abort(&key).await?;
            tracing::info!(
                "Discarded {} uploaded parts of {}",
                removed.part_count(),
                removed.key
            );
        }
    }

    Ok(())
}
