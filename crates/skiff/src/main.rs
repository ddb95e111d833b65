use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;
use skiff_fs::{LocalStorage, MediaStatus, Storage};
use skiff_transfer::{HttpDriver, ReqwestDriver, TransferEngine};
use tracing::info;

use crate::app::{App, Commands, parse_pairs};
use crate::config::FileConfig;

mod app;
mod config;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<bool> {
    let app = App::parse();
    let file = match &app.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let (download_url, upload_url) = resolve_urls(&app, &file)?;
    let config = file.transfer_config(download_url, upload_url);

    let out_dir = app
        .out_dir
        .clone()
        .or_else(|| file.out_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let storage = LocalStorage::new(&out_dir);
    wait_for_media(&storage, Duration::from_secs(app.storage_wait))?;

    let mut driver = ReqwestDriver::with_timeout(Duration::from_secs(file.timeout_secs()))?
        .with_inline_body_limit(config.inline_body_limit)
        .with_chunk_capacity(config.recv_buffer_size);

    let mut engine = TransferEngine::new(config, storage);
    engine.mark_storage_ready();
    engine.mark_network_ready();

    match &app.cmd {
        Commands::Get(_) => engine.start_download(&mut driver)?,
        Commands::Upload(arg) => {
            engine.start_upload(&mut driver, &arg.file, arg.format.into(), &arg.key, &arg.value)?
        }
        Commands::Post(arg) => {
            let pairs = parse_pairs(&arg.pairs)?;
            engine.start_post(&mut driver, &pairs)?;
        }
    }

    let max_retries = file.max_retries();
    while !engine.is_terminal() {
        if engine.retries() > max_retries {
            engine.abort("retry limit reached");
            break;
        }
        match driver.poll_event()? {
            Some(event) => engine.handle_event(&mut driver, event)?,
            None => engine.abort("no further events from driver"),
        }
    }

    if engine.completed() {
        info!(bytes = engine.received(), "transfer complete");
        if let Some(name) = engine.file_name() {
            println!("{name}");
        }
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Per-command URL resolution: the command line wins, the config file
/// backs it up, and a missing required URL is an error up front.
fn resolve_urls(app: &App, file: &FileConfig) -> anyhow::Result<(String, String)> {
    let download = match &app.cmd {
        Commands::Get(arg) => Some(
            arg.url
                .clone()
                .or_else(|| file.download_url.clone())
                .context("no download URL: pass one or set download_url in the config file")?,
        ),
        _ => file.download_url.clone(),
    };
    let upload = match &app.cmd {
        Commands::Upload(arg) => Some(
            arg.url
                .clone()
                .or_else(|| file.upload_url.clone())
                .context("no upload URL: pass --url or set upload_url in the config file")?,
        ),
        Commands::Post(arg) => Some(
            arg.url
                .clone()
                .or_else(|| file.upload_url.clone())
                .context("no upload URL: pass --url or set upload_url in the config file")?,
        ),
        Commands::Get(_) => file.upload_url.clone(),
    };
    Ok((download.unwrap_or_default(), upload.unwrap_or_default()))
}

/// Block until the storage medium reports ready, up to `wait`. Local
/// directories are ready immediately; removable media may take a
/// moment to mount.
fn wait_for_media(storage: &LocalStorage, wait: Duration) -> anyhow::Result<()> {
    let deadline = std::time::Instant::now() + wait;
    loop {
        match storage.media_status() {
            MediaStatus::Ready => return Ok(()),
            MediaStatus::Failed => bail!("storage medium failed"),
            MediaStatus::NotPresent | MediaStatus::Initializing => {
                if std::time::Instant::now() >= deadline {
                    bail!("storage medium did not become ready");
                }
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }
}
