//! CLI Command Handlers
//!
//! Implements all CLI commands by calling the library clients and the
//! resolution workflow. Each handler takes CLI args and Output, returns
//! ExitCode.

use serde::Serialize;
use std::path::{Path, PathBuf};

use ted::api::{DebridClient, DownloadClient, StreamQuery, TorrentioClient};
use ted::models::{
    DebridTorrentHandle, FileEntry, FileFilter, MagnetReference, Quality, StreamSource,
    TorrentStatus,
};
use ted::ResolveError;
use ted::{Action, Config, Orchestrator, WorkflowState};

use crate::cli::{
    ConfigAction, ConfigCmd, DownloadCmd, DownloadsCmd, ExitCode, FilesCmd, MagnetCmd, Output,
    PlayFileCmd, QualityFilter, StatusCmd, StreamSort, StreamsCmd,
};

/// Orchestrator with whichever clients the config allows
fn orchestrator(config: &Config) -> Result<Orchestrator, ResolveError> {
    let debrid = config
        .debrid_settings()
        .ok()
        .map(DebridClient::new)
        .transpose()?;
    let downloads = config
        .rdt_settings()
        .ok()
        .map(DownloadClient::new)
        .transpose()?;
    Ok(Orchestrator::new(debrid, downloads, config.poll_policy()))
}

fn parse_magnet(raw: &str, output: &Output) -> Result<MagnetReference, ExitCode> {
    raw.parse()
        .map_err(|e| output.error(format!("{}", e), ExitCode::InvalidArgs))
}

// =============================================================================
// Streams Command
// =============================================================================

#[derive(Serialize)]
struct IndexedStream {
    index: usize,
    magnet: MagnetReference,
    #[serde(flatten)]
    stream: StreamSource,
}

fn min_quality(filter: QualityFilter) -> Quality {
    match filter {
        QualityFilter::Q4k => Quality::UHD4K,
        QualityFilter::Q1080p => Quality::FHD1080p,
        QualityFilter::Q720p => Quality::HD720p,
        QualityFilter::Q480p => Quality::SD480p,
    }
}

pub async fn streams_cmd(cmd: StreamsCmd, config: &Config, output: &Output) -> ExitCode {
    if let Err(e) = crate::cli::validate_imdb_id(&cmd.imdb_id) {
        return output.error(e, ExitCode::InvalidArgs);
    }

    let client = TorrentioClient::new(config.torrentio_url());
    output.info(format!("Finding streams for: {}", cmd.imdb_id));

    let query = match (cmd.season, cmd.episode) {
        (Some(season), Some(episode)) => StreamQuery::Episode {
            imdb_id: &cmd.imdb_id,
            season,
            episode,
        },
        _ => StreamQuery::Movie(&cmd.imdb_id),
    };

    let mut streams = match client.streams(query).await {
        Ok(s) if s.is_empty() => return output.error("No streams found", ExitCode::NoStreams),
        Ok(s) => s,
        Err(e) => {
            return output.error(
                format!("Stream fetch failed: {:#}", e),
                ExitCode::NetworkError,
            )
        }
    };

    if let Some(filter) = cmd.quality {
        let min = min_quality(filter);
        streams.retain(|s| s.quality >= min);
    }

    // Torrentio already returns quality-then-seeds order
    match cmd.sort {
        StreamSort::Quality => {}
        StreamSort::Seeds => streams.sort_by(|a, b| b.seeds.cmp(&a.seeds)),
        StreamSort::Size => {
            streams.sort_by(|a, b| b.size_bytes.unwrap_or(0).cmp(&a.size_bytes.unwrap_or(0)))
        }
    }

    streams.truncate(cmd.limit);

    if output.json {
        let indexed: Vec<IndexedStream> = streams
            .into_iter()
            .enumerate()
            .map(|(index, stream)| IndexedStream {
                index,
                magnet: stream.to_magnet(&cmd.imdb_id),
                stream,
            })
            .collect();
        if let Err(e) = output.print(&indexed) {
            return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
        }
    } else {
        for (index, stream) in streams.iter().enumerate() {
            println!("{:>3}  {}", index, stream);
            println!("     {}", stream.to_magnet(&cmd.imdb_id));
        }
    }
    ExitCode::Success
}

// =============================================================================
// Resolution Commands
// =============================================================================

/// Run one workflow action and report its terminal state
async fn run_action(raw_magnet: &str, action: Action, config: &Config, output: &Output) -> ExitCode {
    let magnet = match parse_magnet(raw_magnet, output) {
        Ok(m) => m,
        Err(code) => return code,
    };

    let mut orchestrator = match orchestrator(config) {
        Ok(o) => o,
        Err(e) => return output.error(e.to_string(), ExitCode::for_error(&e)),
    };
    let processing = match &action {
        Action::Download { media_type, .. } => {
            format!("Sending {} to RDT Client...", media_type.to_string().to_lowercase())
        }
        Action::AddToDebrid => "Adding to Real-Debrid...".to_string(),
        Action::WatchNow => "Resolving through Real-Debrid...".to_string(),
    };
    output.info(processing);

    match orchestrator.run(&magnet, action).await {
        WorkflowState::Done { resolution } => {
            if let Err(e) = output.print(resolution) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        WorkflowState::Failed { kind, message, .. } => {
            output.error(message.clone(), ExitCode::for_kind(kind))
        }
        WorkflowState::Idle | WorkflowState::Processing { .. } => {
            output.error("Workflow did not finish", ExitCode::Error)
        }
    }
}

pub async fn download_cmd(cmd: DownloadCmd, config: &Config, output: &Output) -> ExitCode {
    let action = Action::Download {
        media_type: cmd.media_type.into(),
        task: cmd.task(),
    };
    run_action(&cmd.magnet, action, config, output).await
}

pub async fn debrid_cmd(cmd: MagnetCmd, config: &Config, output: &Output) -> ExitCode {
    run_action(&cmd.magnet, Action::AddToDebrid, config, output).await
}

pub async fn watch_cmd(cmd: MagnetCmd, config: &Config, output: &Output) -> ExitCode {
    run_action(&cmd.magnet, Action::WatchNow, config, output).await
}

// =============================================================================
// Files Command
// =============================================================================

/// A kept file with its index into the torrent's links (`play-file` index)
#[derive(Serialize)]
struct IndexedFile<'a> {
    index: usize,
    #[serde(flatten)]
    file: &'a FileEntry,
}

#[derive(Serialize)]
struct FileListing<'a> {
    id: &'a str,
    total: usize,
    files: Vec<IndexedFile<'a>>,
}

fn file_listing<'a>(handle: &'a DebridTorrentHandle, filter: &FileFilter) -> FileListing<'a> {
    FileListing {
        id: &handle.id,
        total: handle.files.len(),
        files: filter
            .apply(&handle.files)
            .into_iter()
            .map(|(index, file)| IndexedFile { index, file })
            .collect(),
    }
}

pub async fn files_cmd(cmd: FilesCmd, config: &Config, output: &Output) -> ExitCode {
    let magnet = match parse_magnet(&cmd.magnet, output) {
        Ok(m) => m,
        Err(code) => return code,
    };
    let orchestrator = match orchestrator(config) {
        Ok(o) => o,
        Err(e) => return output.error(e.to_string(), ExitCode::for_error(&e)),
    };

    output.info("Loading files...");
    let handle = match orchestrator.preview_files(&magnet).await {
        Ok(h) => h,
        Err(e) => return output.error(format!("files failed: {}", e), ExitCode::for_error(&e)),
    };

    let listing = file_listing(&handle, &cmd.task().filter());

    if output.json {
        if let Err(e) = output.print(&listing) {
            return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
        }
    } else {
        println!("Torrent {} ({} of {} files)", listing.id, listing.files.len(), listing.total);
        for entry in &listing.files {
            println!("{:>3}  {}", entry.index, entry.file);
        }
    }
    ExitCode::Success
}

pub async fn play_file_cmd(cmd: PlayFileCmd, config: &Config, output: &Output) -> ExitCode {
    let orchestrator = match orchestrator(config) {
        Ok(o) => o,
        Err(e) => return output.error(e.to_string(), ExitCode::for_error(&e)),
    };
    match orchestrator.play_file(&cmd.id, cmd.index).await {
        Ok(resolution) => {
            if let Err(e) = output.print(&resolution) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        Err(e) => output.error(format!("watch failed: {}", e), ExitCode::for_error(&e)),
    }
}

// =============================================================================
// Downloads Command
// =============================================================================

fn is_active(status: &TorrentStatus) -> bool {
    status.file_counts.total == 0 || status.file_counts.finished < status.file_counts.total
}

pub async fn downloads_cmd(cmd: DownloadsCmd, config: &Config, output: &Output) -> ExitCode {
    let settings = match config.rdt_settings() {
        Ok(s) => s,
        Err(e) => return output.error(e.to_string(), ExitCode::ConfigError),
    };
    let client = match DownloadClient::new(settings) {
        Ok(c) => c,
        Err(e) => return output.error(e.to_string(), ExitCode::for_error(&e)),
    };

    match client.list_torrents().await {
        Ok(mut torrents) => {
            if cmd.active {
                torrents.retain(is_active);
            }
            if torrents.is_empty() {
                output.info("No active downloads");
            }
            if let Err(e) = output.print_lines(&torrents) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        Err(e) => output.error(
            format!("Failed to fetch downloads: {}", e),
            ExitCode::for_error(&e),
        ),
    }
}

// =============================================================================
// Status Command
// =============================================================================

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum ServiceState {
    Connected,
    Disconnected,
    NotConfigured,
}

#[derive(Serialize)]
struct ServiceStatus {
    real_debrid: ServiceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    real_debrid_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    real_debrid_premium: Option<bool>,
    rdt_client: ServiceState,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

pub async fn status_cmd(_cmd: StatusCmd, config: &Config, output: &Output) -> ExitCode {
    output.info("Checking services...");

    let mut status = ServiceStatus {
        real_debrid: ServiceState::NotConfigured,
        real_debrid_user: None,
        real_debrid_premium: None,
        rdt_client: ServiceState::NotConfigured,
        errors: Vec::new(),
    };

    if let Ok(settings) = config.debrid_settings() {
        let user = match DebridClient::new(settings) {
            Ok(client) => client.user().await,
            Err(e) => Err(e),
        };
        match user {
            Ok(user) => {
                status.real_debrid = ServiceState::Connected;
                status.real_debrid_premium = Some(user.is_premium());
                status.real_debrid_user = Some(user.username);
            }
            Err(e) if e.is_unauthorized() => {
                status.real_debrid = ServiceState::Disconnected;
                status
                    .errors
                    .push("Real-Debrid: API key rejected, check real_debrid_api_key".to_string());
            }
            Err(e) => {
                status.real_debrid = ServiceState::Disconnected;
                status.errors.push(format!("Real-Debrid: {}", e));
            }
        }
    }

    if let Ok(settings) = config.rdt_settings() {
        let session = match DownloadClient::new(settings) {
            Ok(client) => client.session().ensure_authenticated().await,
            Err(e) => Err(e),
        };
        match session {
            Ok(()) => status.rdt_client = ServiceState::Connected,
            Err(e) => {
                status.rdt_client = ServiceState::Disconnected;
                status.errors.push(format!("RDT Client: {}", e));
            }
        }
    }

    if let Err(e) = output.print(&status) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }

    let disconnected = [status.real_debrid, status.rdt_client].contains(&ServiceState::Disconnected);
    if disconnected {
        ExitCode::NetworkError
    } else {
        ExitCode::Success
    }
}

// =============================================================================
// Config Command
// =============================================================================

#[derive(Serialize)]
struct ConfigPath {
    path: String,
}

fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(Config::path)
}

pub async fn config_cmd(
    cmd: ConfigCmd,
    config: &Config,
    explicit_path: Option<&Path>,
    output: &Output,
) -> ExitCode {
    match cmd.action {
        ConfigAction::Show => {
            if let Err(e) = output.print(config.redacted()) {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        ConfigAction::Path => match config_path(explicit_path) {
            Some(path) => {
                let shown = ConfigPath {
                    path: path.display().to_string(),
                };
                if let Err(e) = output.print(&shown) {
                    return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
                }
                ExitCode::Success
            }
            None => output.error("Could not determine config path", ExitCode::Error),
        },
        ConfigAction::Set { key, value } => {
            let Some(path) = config_path(explicit_path) else {
                return output.error("Could not determine config path", ExitCode::Error);
            };
            // Edit the file itself, so environment overrides are not persisted
            let mut on_disk = if path.exists() {
                match Config::read(&path) {
                    Ok(c) => c,
                    Err(e) => return output.error(format!("{:#}", e), ExitCode::Error),
                }
            } else {
                Config::default()
            };

            if let Err(e) = on_disk.set(&key, &value) {
                return output.error(e.to_string(), ExitCode::InvalidArgs);
            }
            if let Err(e) = on_disk.save_to(&path) {
                return output.error(format!("Failed to save config: {}", e), ExitCode::Error);
            }
            output.info(format!("Saved {} to {}", key, path.display()));
            ExitCode::Success
        }
    }
}
