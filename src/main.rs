//! PhotoSync binary entry point

use clap::{Parser, Subcommand};
use photosync::data::{Identified, LocalPhoto, UploadMetadata, VisibleWindow};
use photosync::error::AppError;
use photosync::service::{describe_file, scan_directory};
use photosync::{AppState, config};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "photosync")]
#[command(about = "Organize a local photo gallery and keep it in sync with the photo server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show local and server photos grouped by month
    List {
        /// Local media directory to include
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Server folder to list
        #[arg(long)]
        folder: Option<String>,

        /// Bypass the cached server listing
        #[arg(long)]
        refresh: bool,

        /// Index of the first photo on screen
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// List images found below a directory
    Scan { dir: PathBuf },

    /// Add files to the upload queue
    Enqueue {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Show the upload queue
    Queue {
        /// Only items that ran out of retries
        #[arg(long)]
        abandoned: bool,
    },

    /// Run one sweep over the upload queue
    Process,

    /// Upload one file right away
    Upload { path: PathBuf },

    /// Download a server photo
    Download {
        photo_id: String,

        /// Target directory (defaults to storage.download_dir)
        #[arg(long)]
        dir: Option<PathBuf>,

        #[arg(long)]
        folder: Option<String>,
    },

    /// Manage albums
    Album {
        #[command(subcommand)]
        command: AlbumCommand,
    },

    /// Manage the server listing cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Watch a directory, queueing and uploading new photos
    Watch {
        dir: PathBuf,

        /// Seconds between sweeps (defaults to queue.sweep_interval_seconds)
        #[arg(long, env = "PHOTOSYNC_WATCH_INTERVAL")]
        interval: Option<u64>,
    },

    /// Queue summary and metrics
    Status,
}

#[derive(Subcommand, Debug)]
enum AlbumCommand {
    /// Create an album from photo ids
    Create {
        name: String,
        photo_ids: Vec<String>,
    },
    List,
    Show { id: String },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Drop the cached server listing
    Clear,
}

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging from `logging.level` and `logging.format`
/// 3. Initialize metrics
/// 4. Initialize AppState
/// 5. Run the requested command
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging; RUST_LOG overrides logging.level
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| config.logging.filter_directive().into())
    };

    if config.logging.is_json() {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!(
        base_url = %config.api.base_url,
        level = %config.logging.level,
        "Configuration loaded"
    );

    // 3. Initialize metrics
    photosync::metrics::init_metrics();

    // 4. Initialize application state
    let state = AppState::new(config).await?;

    // 5. Run command
    match cli.command {
        Command::List {
            dir,
            folder,
            refresh,
            offset,
        } => list(&state, dir.as_deref(), folder.as_deref(), refresh, offset).await?,
        Command::Scan { dir } => {
            for photo in scan_directory(&dir)? {
                println!("{}\t{}", photo.id, photo.uri);
            }
        }
        Command::Enqueue { paths } => {
            for path in paths {
                let photo = describe_file(&path)?;
                state.queue.enqueue(&photo.uri, metadata_for(&photo)).await?;
                println!("queued {}", photo.uri);
            }
        }
        Command::Queue { abandoned } => {
            let items = if abandoned {
                state.queue.abandoned().await?
            } else {
                state.queue.get_queue().await?
            };
            for item in items {
                println!(
                    "{}\t{}\tretries={}\t{}",
                    item.status,
                    item.uri,
                    item.retry_count,
                    item.error.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Process => {
            let report = state.queue.process_queue().await?;
            println!(
                "selected={} succeeded={} failed={} skipped={} removed={}",
                report.selected, report.succeeded, report.failed, report.skipped, report.removed
            );
        }
        Command::Upload { path } => {
            let photo = describe_file(&path)?;
            let response = state.gallery.upload_now(&path, &photo.id).await;
            if response.success {
                println!("uploaded {}", path.display());
            } else {
                println!(
                    "upload failed: {}",
                    response.msg.as_deref().unwrap_or("Upload failed")
                );
            }
        }
        Command::Download {
            photo_id,
            dir,
            folder,
        } => {
            let photos = state.gallery.fetch_server_photos(folder.as_deref()).await;
            let photo = photos
                .iter()
                .find(|photo| photo.id == photo_id)
                .ok_or(AppError::NotFound)?;
            let dir = dir.unwrap_or_else(|| state.config.storage.download_dir.clone());
            match state.gallery.download_photo(photo, &dir).await {
                Some(path) => println!("saved {}", path.display()),
                None => println!("download failed for {}", photo.id),
            }
        }
        Command::Album { command } => match command {
            AlbumCommand::Create { name, photo_ids } => {
                let album = state.albums.create(&name, &photo_ids).await?;
                println!("{}\t{}\t{} photos", album.id, album.name, album.photo_ids.len());
            }
            AlbumCommand::List => {
                for album in state.albums.list().await? {
                    println!("{}\t{}\t{} photos", album.id, album.name, album.photo_ids.len());
                }
            }
            AlbumCommand::Show { id } => {
                let album = state.albums.get(&id).await?;
                println!("{} ({})", album.name, album.id);
                for photo_id in album.photo_ids {
                    println!("  {}", photo_id);
                }
            }
        },
        Command::Cache { command } => match command {
            CacheCommand::Clear => {
                state.gallery.cache().clear_cached().await?;
                println!("server listing cache cleared");
            }
        },
        Command::Watch { dir, interval } => watch(state, dir, interval).await?,
        Command::Status => {
            let queue = state.queue.get_queue().await?;
            let abandoned = state.queue.abandoned().await?;
            let uploaded = state.registry.list().await?;
            println!(
                "queued={} abandoned={} uploaded={} max_retries={} listing_ttl={}s",
                queue.len(),
                abandoned.len(),
                uploaded.len(),
                state.queue.max_retries(),
                state.gallery.cache().ttl().num_seconds()
            );
            print!("{}", photosync::metrics::gather_text());
        }
    }

    Ok(())
}

async fn list(
    state: &AppState,
    dir: Option<&Path>,
    folder: Option<&str>,
    refresh: bool,
    offset: usize,
) -> Result<(), AppError> {
    let local = match dir {
        Some(dir) => scan_directory(dir)?,
        None => Vec::new(),
    };
    let server = if refresh {
        state.gallery.refresh_server_photos(folder).await
    } else {
        state.gallery.fetch_server_photos(folder).await
    };

    let groups = state.gallery.timeline(&local, &server);
    let ordered: Vec<_> = groups
        .iter()
        .flat_map(|group| group.photos.iter().cloned())
        .collect();

    let mut window = VisibleWindow::new(state.config.cache.visible_window_size);
    window.update(&ordered, offset);

    for group in &groups {
        println!("{} {}", group.month, group.year);
        for photo in &group.photos {
            let marker = if window.is_visible(photo.id()) { "*" } else { " " };
            let uploaded = if state.gallery.is_uploaded(photo.id()).await {
                "uploaded"
            } else {
                ""
            };
            println!(" {} {}\t{}", marker, photo.id(), uploaded);
        }
    }
    Ok(())
}

/// Watch loop: scan, detect new photos, queue them, sweep the queue
async fn watch(state: AppState, dir: PathBuf, interval: Option<u64>) -> Result<(), AppError> {
    let configured_interval_secs = interval.unwrap_or(state.config.queue.sweep_interval_seconds);
    let interval_secs = configured_interval_secs.max(1);
    if configured_interval_secs == 0 {
        tracing::warn!("Watch interval of 0 seconds is invalid; clamped to 1 second");
    }

    let mut notifications = state.notifier.subscribe();
    tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;

        loop {
            match notifications.recv().await {
                Ok(notification) => println!("[{}] {}", notification.title, notification.body),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Notification printer lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut monitor = state.monitor_since(chrono::Utc::now());
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    tracing::info!(dir = %dir.display(), interval_secs, "Watching for new photos");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopping watch");
                return Ok(());
            }
        }

        // permission problems are reported once and end the watch
        let photos = scan_directory(&dir)?;

        for photo in monitor.detect(&photos) {
            if let Err(e) = state.queue.enqueue(&photo.uri, metadata_for(&photo)).await {
                tracing::error!(uri = %photo.uri, error = %e, "Failed to queue new photo");
            }
        }

        match state.queue.process_queue().await {
            Ok(report) if report.selected > 0 => tracing::info!(
                succeeded = report.succeeded,
                failed = report.failed,
                "Sweep finished"
            ),
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "Upload queue sweep failed"),
        }
    }
}

fn metadata_for(photo: &LocalPhoto) -> UploadMetadata {
    UploadMetadata {
        creation_time: Some(photo.creation_time.to_string()),
        modification_time: Some(photo.modification_time.to_string()),
    }
}
