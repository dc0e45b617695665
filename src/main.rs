use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use castfeed::config::Config;
use castfeed::feed::{AddOutcome, FeedPublisher};
use castfeed::storage::{Database, StoreError, UploadRecord, UploadStatus};

/// Get the config directory path (~/.config/castfeed/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("castfeed");
    Ok(config_dir)
}

#[derive(Parser, Debug)]
#[command(
    name = "castfeed",
    about = "Publish audio uploads as a capacity-limited podcast RSS feed"
)]
struct Args {
    /// Config file (defaults to ~/.config/castfeed/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish an upload at the head of the feed
    Add {
        upload_id: String,
    },
    /// Rebuild the feed from all completed audio uploads
    Regenerate,
    /// Move an archived episode back into the feed
    Restore {
        entry_id: u32,
    },
    /// Print feed statistics as JSON
    Stats,
    /// Print archived episodes as JSON
    Archive,
    /// Print the public feed URL
    Url,
    /// Print the upload behind an enclosure id as JSON
    Media {
        entry_id: u32,
    },
    /// Check the published document with a standard feed parser
    Validate,
    /// Insert or update an upload in the database
    Record(RecordArgs),
}

#[derive(clap::Args, Debug)]
struct RecordArgs {
    #[arg(long)]
    id: String,

    #[arg(long)]
    title: String,

    #[arg(long)]
    description: Option<String>,

    /// Original uploaded file
    #[arg(long, value_name = "PATH")]
    file: PathBuf,

    /// Processed file served instead of the original when present
    #[arg(long, value_name = "PATH")]
    processed_file: Option<PathBuf>,

    /// Size in bytes (defaults to the size of the served file)
    #[arg(long)]
    size: Option<u64>,

    #[arg(long, default_value = "audio/mpeg")]
    mime_type: String,

    #[arg(long, default_value = "completed")]
    status: UploadStatus,

    /// Duration in seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Creation time (RFC 3339), defaults to now
    #[arg(long)]
    created_at: Option<DateTime<Utc>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => get_config_dir()?.join("config.toml"),
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db = open_database(&config).await?;
    let publisher = FeedPublisher::open(config.publisher_config(), Arc::new(db.clone()))
        .context("Failed to prepare feed directory")?;

    match args.command {
        Command::Add { upload_id } => {
            let outcome = publisher
                .add_episode(&upload_id)
                .await
                .with_context(|| format!("Failed to add upload {upload_id}"))?;
            match outcome {
                AddOutcome::Added { active, archived } => {
                    println!("Published {upload_id} ({active} active, {archived} archived)");
                }
                AddOutcome::Ineligible => println!("Skipped {upload_id}: not an audio upload"),
                AddOutcome::Duplicate => println!("Skipped {upload_id}: already published"),
            }
        }
        Command::Regenerate => {
            let summary = publisher
                .regenerate_feed()
                .await
                .context("Failed to regenerate feed")?;
            println!(
                "Regenerated {}: {} active, {} archived",
                publisher.feed_path().display(),
                summary.active,
                summary.archived
            );
        }
        Command::Restore { entry_id } => {
            let restored = publisher
                .restore_episode_from_archive(entry_id)
                .await
                .with_context(|| format!("Failed to restore episode {entry_id}"))?;
            if !restored {
                eprintln!("Error: No archived episode with id {entry_id}");
                std::process::exit(1);
            }
            println!("Restored episode {entry_id}");
        }
        Command::Stats => {
            let stats = publisher
                .get_feed_stats()
                .await
                .context("Failed to read feed stats")?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Archive => {
            let archived = publisher.get_archived_episodes_list();
            println!("{}", serde_json::to_string_pretty(&archived)?);
        }
        Command::Url => println!("{}", publisher.get_feed_url()),
        Command::Media { entry_id } => {
            let upload = publisher
                .find_upload_for_entry(entry_id)
                .await
                .context("Failed to look up media")?;
            match upload {
                Some(upload) => println!("{}", serde_json::to_string_pretty(&upload)?),
                None => {
                    eprintln!("Error: No audio upload for entry {entry_id}");
                    std::process::exit(1);
                }
            }
        }
        Command::Validate => {
            let report = publisher
                .validate_feed()
                .await
                .context("Feed document is not valid")?;
            println!(
                "Valid RSS 2.0 feed '{}' with {} episodes",
                report.title.as_deref().unwrap_or("(untitled)"),
                report.item_count
            );
        }
        Command::Record(record) => record_upload(&db, record).await?,
    }

    Ok(())
}

async fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config
        .database_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory {}", parent.display())
        })?;
    }

    let db_path_str = config
        .database_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    match Database::open(db_path_str).await {
        Ok(db) => Ok(db),
        Err(StoreError::InstanceLocked) => {
            eprintln!("Error: The upload database is locked by another process. Try again shortly.");
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open database: {}", e)),
    }
}

async fn record_upload(db: &Database, args: RecordArgs) -> Result<()> {
    let file_size = match args.size {
        Some(size) => size,
        None => {
            let served = args.processed_file.as_ref().unwrap_or(&args.file);
            std::fs::metadata(served)
                .with_context(|| format!("Failed to read size of {}", served.display()))?
                .len()
        }
    };

    let upload = UploadRecord {
        id: args.id,
        title: args.title,
        description: args.description,
        file_path: args.file.display().to_string(),
        processed_file_path: args.processed_file.map(|p| p.display().to_string()),
        file_size,
        mime_type: args.mime_type,
        status: args.status,
        duration_secs: args.duration,
        created_at: args.created_at.unwrap_or_else(Utc::now),
    };

    db.upsert_upload(&upload)
        .await
        .with_context(|| format!("Failed to record upload {}", upload.id))?;
    tracing::info!(upload_id = %upload.id, status = %upload.status, "Recorded upload");
    println!("Recorded upload {}", upload.id);
    Ok(())
}
