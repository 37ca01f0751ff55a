//! Jobsync CLI: drives the session engine against in-process stores.
//!
//! Blob storage follows `JOBSYNC_STORAGE_BACKEND` (`local` or `memory`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use jobsync_cli::{init_tracing, load_photo, print_json};
use jobsync_core::models::{DetailField, UploadKind};
use jobsync_core::validation::{PhotoFileInfo, PhotoValidator};
use jobsync_core::SyncConfig;
use jobsync_db::MemoryDocumentStore;
use jobsync_services::{
    ChannelNotifier, FixedGeolocator, IdentityProvider, LocalIdentityProvider, SyncContext,
    SyncEngine, SystemClock,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "jobsync", about = "Job session sync engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one shift: clock in, fill details, upload photos, clock out
    Simulate {
        #[arg(long, default_value = "tech@example.com")]
        email: String,
        #[arg(long, default_value = "")]
        job_type: String,
        /// Seconds between clock-in and clock-out
        #[arg(long, default_value = "2")]
        work_secs: u64,
        #[arg(long)]
        site_name: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Before photos
        #[arg(long, num_args = 1..)]
        before: Vec<PathBuf>,
        /// After photos
        #[arg(long, num_args = 1..)]
        after: Vec<PathBuf>,
    },
    /// Check files against the photo rules without uploading
    CheckPhotos {
        files: Vec<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = SyncConfig::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Simulate {
            email,
            job_type,
            work_secs,
            site_name,
            notes,
            before,
            after,
        } => {
            let shift = Shift {
                email,
                job_type,
                work: Duration::from_secs(work_secs),
                site_name,
                notes,
                before,
                after,
            };
            simulate(config, shift).await?;
        }
        Commands::CheckPhotos { files } => {
            let validator = PhotoValidator::new(config.max_photo_size_bytes);
            let mut results = Vec::with_capacity(files.len());
            for path in files {
                let photo = load_photo(&path).await?;
                let info = PhotoFileInfo {
                    name: &photo.name,
                    content_type: &photo.content_type,
                    size: photo.size(),
                };
                let outcome = validator.validate(info);
                results.push(json!({
                    "file": photo.name,
                    "contentType": photo.content_type,
                    "size": photo.size(),
                    "ok": outcome.is_ok(),
                    "error": outcome.err().map(|e| e.to_string()),
                }));
            }
            print_json(&results)?;
        }
        Commands::Config => {
            print_json(&json!({
                "environment": config.environment,
                "collection": config.collection,
                "photoPrefix": config.photo_prefix,
                "confirmTimeoutMs": config.confirm_timeout.as_millis() as u64,
                "safetyTimeoutMs": config.safety_timeout.as_millis() as u64,
                "autosaveQuietMs": config.autosave_quiet_period.as_millis() as u64,
                "geolocationTimeoutMs": config.geolocation_timeout.as_millis() as u64,
                "maxPhotoSizeBytes": config.max_photo_size_bytes,
                "recentShown": config.recent_shown,
                "jobTypes": jobsync_core::constants::JOB_TYPE_PRESETS,
                "storageBackend": config.storage_backend.to_string(),
                "localStoragePath": config.local_storage_path,
            }))?;
        }
    }

    Ok(())
}

struct Shift {
    email: String,
    job_type: String,
    work: Duration,
    site_name: Option<String>,
    notes: Option<String>,
    before: Vec<PathBuf>,
    after: Vec<PathBuf>,
}

async fn simulate(config: SyncConfig, shift: Shift) -> anyhow::Result<()> {
    let identity = LocalIdentityProvider::new();
    let password = "local-session";
    identity.register(&shift.email, password)?;
    identity.sign_in(&shift.email, password).await?;

    let store = MemoryDocumentStore::new(config.collection.clone());
    let blobs = jobsync_storage::create_blob_store(&config)
        .await
        .context("Failed to create blob store")?;

    let (notifier, mut toasts) = ChannelNotifier::new();
    let printer = tokio::spawn(async move {
        while let Some(toast) = toasts.recv().await {
            eprintln!("{}", toast);
        }
    });

    let clock = Arc::new(SystemClock);
    let ctx = SyncContext::for_signed_in(&identity, Arc::new(store.clone()), blobs, config)?
        .with_clock(clock.clone())
        .with_geolocator(Arc::new(FixedGeolocator::new(45.5017, -73.5673, Some(15.0), clock)))
        .with_notifier(Arc::new(notifier));

    let engine = SyncEngine::start(ctx).await;
    engine
        .sessions()
        .watch()
        .wait_for(|s| s.loaded)
        .await
        .context("Session subscription closed before loading")?;

    if let Some(site_name) = shift.site_name {
        engine.autosaver().edit(DetailField::SiteName, site_name);
    }

    let receipt = engine.clock_in(&shift.job_type).await?;
    let state = engine.clock().settled().await;
    tracing::info!(session_id = %receipt.session_id, state = ?state, "Clock in settled");
    if engine.active_session().is_none() {
        anyhow::bail!("Clock in was not confirmed");
    }

    if let Some(notes) = shift.notes {
        engine.autosaver().edit(DetailField::Notes, notes);
        engine.autosaver().save_now().await?;
    }

    for (kind, paths) in [(UploadKind::Before, shift.before), (UploadKind::After, shift.after)] {
        if paths.is_empty() {
            continue;
        }
        let mut files = Vec::with_capacity(paths.len());
        for path in &paths {
            files.push(load_photo(path).await?);
        }
        engine.select_photos(files, kind)?;
        let summary = engine.upload_photos(kind).await?;
        tracing::info!(
            kind = %kind,
            uploaded = summary.uploaded.len(),
            failed = summary.failed.len(),
            "Photos processed"
        );
    }

    tokio::time::sleep(shift.work).await;
    tracing::info!(elapsed = %engine.elapsed_display(), "Clocking out");

    engine.clock_out().await?;
    engine.clock().settled().await;

    let mut recent = engine.recent().watch();
    let feed = tokio::time::timeout(
        Duration::from_secs(5),
        recent.wait_for(|f| f.entries.iter().any(|e| e.id == receipt.session_id)),
    )
    .await
    .context("Recent activity did not update")?
    .context("Recent activity feed closed")?
    .clone();

    print_json(&json!({
        "session": store.get(&receipt.session_id).map(|d| d.data),
        "recent": feed,
    }))?;

    engine.shutdown().await;
    printer.abort();
    Ok(())
}
