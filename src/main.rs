use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use std::{fmt::Debug, path::PathBuf};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use music_uploader::uploader::{
    run_settings_checks, AlbumUploadBackend, MusicUploaderClient, SessionConfig,
};
use music_uploader::{
    create_session, AlbumState, AppConfig, CliConfig, FileConfig, UploaderHandle,
    UploaderSnapshot,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[clap(version = env!("UPLOADER_BUILD"))]
struct CliArgs {
    /// Path to a TOML config file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Base URL of the music server, e.g. http://localhost:8000.
    #[clap(long)]
    pub server_url: Option<String>,

    /// User name for basic authentication.
    #[clap(long)]
    pub user: Option<String>,

    /// Password for basic authentication.
    #[clap(long)]
    pub password: Option<String>,

    /// Timeout in seconds for each request to the server.
    #[clap(long, default_value_t = 300)]
    pub request_timeout_sec: u64,

    /// Only check connection and credentials, then exit.
    #[clap(long)]
    pub check: bool,

    /// Name of the album to upload.
    #[clap(long)]
    pub album: Option<String>,

    /// Artist of the album to upload.
    #[clap(long)]
    pub artist: Option<String>,

    /// Song files to put in the album.
    #[clap(value_parser = parse_path)]
    pub files: Vec<PathBuf>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            server_url: self.server_url.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            request_timeout_sec: self.request_timeout_sec,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;
    info!("music-uploader {}", env!("UPLOADER_BUILD"));

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;
    info!(
        "Uploading to {} as {:?}",
        app_config.uploader.server_url, app_config.uploader.user
    );

    let settings = Arc::new(RwLock::new(app_config.uploader.clone()));
    let client = Arc::new(MusicUploaderClient::new(
        settings.clone(),
        app_config.request_timeout_sec,
    )?);

    let (event_tx, event_rx) = mpsc::channel(app_config.event_channel_capacity);
    let backend = Arc::new(AlbumUploadBackend::new(
        client.clone(),
        settings,
        event_tx,
        app_config.trigger_scan_after_upload,
    ));

    let shutdown_token = CancellationToken::new();
    let (session, handle) = create_session(
        backend,
        event_rx,
        shutdown_token.clone(),
        SessionConfig {
            message_log_capacity: app_config.message_log_capacity,
            ..SessionConfig::default()
        },
    );
    let session_task = tokio::spawn(session.run());

    let result = tokio::select! {
        result = run_cli(&cli_args, &client, &handle) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            Ok(false)
        }
    };

    shutdown_token.cancel();
    if tokio::time::timeout(Duration::from_secs(1), session_task)
        .await
        .is_err()
    {
        warn!("Uploader session did not stop in time");
    }

    if !result? {
        std::process::exit(1);
    }
    Ok(())
}

/// Run the requested action. Returns whether it succeeded.
async fn run_cli(
    cli_args: &CliArgs,
    client: &MusicUploaderClient,
    handle: &UploaderHandle,
) -> Result<bool> {
    if cli_args.check {
        let ok = run_settings_checks(client, handle).await?;
        print_messages(&handle.snapshot());
        return Ok(ok);
    }

    if cli_args.files.is_empty() {
        bail!("No files given, nothing to upload");
    }

    let album_id = handle.snapshot().selected_album_id;
    handle
        .set_album_name(cli_args.album.clone().unwrap_or_default())
        .await?;
    handle
        .set_album_artist(cli_args.artist.clone().unwrap_or_default())
        .await?;

    let paths = cli_args
        .files
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    let report = handle.add_files(paths).await?;
    info!(
        "{} files added, {} skipped",
        report.admitted.len(),
        report.rejected.len()
    );

    if handle.request_upload(album_id).await.is_err() {
        print_messages(&handle.snapshot());
        return Ok(false);
    }

    let snapshot = handle.wait_until_idle().await?;
    print_report(&snapshot);
    Ok(snapshot
        .album(album_id)
        .map(|album| album.state == AlbumState::UploadSuccess)
        .unwrap_or(false))
}

fn print_report(snapshot: &UploaderSnapshot) {
    for album in &snapshot.albums {
        println!(
            "{} {} - {} [{}]",
            album.state.symbol(),
            album.artist,
            album.name,
            album.state
        );
        for file in &album.files {
            println!("    {} {}", file.state.symbol(), file.name);
        }
    }
    print_messages(snapshot);
}

fn print_messages(snapshot: &UploaderSnapshot) {
    // The log is kept newest first.
    for line in snapshot.messages.iter().rev() {
        println!("[{}] {}", line.time, line.text);
    }
}
