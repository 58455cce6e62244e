//! CLI - Command Line Interface for ted
//!
//! Every action is scriptable and all output is JSON-parseable.
//!
//! # Examples
//!
//! ```bash
//! # Find streams and pick a magnet
//! ted streams tt1877830 --json
//!
//! # Resolve it
//! ted watch "magnet:?xt=urn:btih:..."
//! ted download "magnet:?xt=urn:btih:..." --type series --exclude sample
//! ted downloads
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

use ted::error::ResolveError;
use ted::models::{DownloadTask, MediaType};

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network error
    NetworkError = 3,
    /// Missing URL or credential
    ConfigError = 4,
    /// No streams available
    NoStreams = 5,
    /// Login rejected by the download client
    AuthFailed = 6,
    /// Provider did not finish in time
    Timeout = 7,
    /// Upstream API answered with an error
    UpstreamError = 8,
}

impl ExitCode {
    /// Exit code for a workflow error
    pub fn for_error(err: &ResolveError) -> Self {
        Self::for_kind(err.kind())
    }

    /// Exit code for an error kind name (see `ResolveError::kind`)
    pub fn for_kind(kind: &str) -> Self {
        match kind {
            "configuration" => ExitCode::ConfigError,
            "auth" => ExitCode::AuthFailed,
            "network" => ExitCode::NetworkError,
            "timeout" => ExitCode::Timeout,
            "upstream" | "torrent_failed" | "invalid_response" => ExitCode::UpstreamError,
            "no_links" => ExitCode::NoStreams,
            "invalid_magnet" => ExitCode::InvalidArgs,
            _ => ExitCode::Error,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// ted - The Entertainment District
///
/// Find torrent streams and resolve them through Real-Debrid or RDT Client.
#[derive(Parser, Debug)]
#[command(
    name = "ted",
    version,
    about = "Find torrent streams and resolve them through Real-Debrid or RDT Client",
    after_help = "EXAMPLES:\n\
                  ted streams tt1877830                 List streams for a movie\n\
                  ted watch \"magnet:?xt=urn:btih:...\"  Get a playable URL\n\
                  ted download \"magnet:?...\" -t series Send to RDT Client\n\
                  ted downloads --json                  Show download progress"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Get available torrent streams for a movie or episode
    #[command(visible_alias = "st")]
    Streams(StreamsCmd),

    /// Send a magnet to RDT Client for download
    #[command(visible_alias = "dl")]
    Download(DownloadCmd),

    /// Add a magnet to Real-Debrid
    Debrid(MagnetCmd),

    /// Resolve a magnet to a playable URL through Real-Debrid
    #[command(visible_alias = "w")]
    Watch(MagnetCmd),

    /// List the files of a magnet via Real-Debrid
    Files(FilesCmd),

    /// Get a playable URL for one file of a Real-Debrid torrent
    PlayFile(PlayFileCmd),

    /// Show RDT Client download progress
    Downloads(DownloadsCmd),

    /// Check connectivity to Real-Debrid and RDT Client
    Status(StatusCmd),

    /// Show or change configuration
    Config(ConfigCmd),
}

// =============================================================================
// Streams Command
// =============================================================================

/// Get available streams for a movie or TV episode
#[derive(Args, Debug)]
pub struct StreamsCmd {
    /// IMDB ID (e.g., tt1877830)
    #[arg(required = true)]
    pub imdb_id: String,

    /// Season number (for TV shows)
    #[arg(long, short = 's', requires = "episode")]
    pub season: Option<u16>,

    /// Episode number (for TV shows)
    #[arg(long, short = 'e', requires = "season")]
    pub episode: Option<u16>,

    /// Filter by minimum quality
    #[arg(long, short = 'Q', value_enum)]
    pub quality: Option<QualityFilter>,

    /// Maximum number of results
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,

    /// Sort by criterion
    #[arg(long, value_enum, default_value = "quality")]
    pub sort: StreamSort,
}

/// Quality filter for streams
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityFilter {
    /// 4K / 2160p
    #[value(name = "4k", alias = "2160p")]
    Q4k,
    /// 1080p Full HD
    #[value(name = "1080p")]
    Q1080p,
    /// 720p HD
    #[value(name = "720p")]
    Q720p,
    /// 480p SD
    #[value(name = "480p")]
    Q480p,
}

/// Sort criterion for streams
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamSort {
    /// Sort by quality, then seeds (default)
    #[default]
    Quality,
    /// Sort by seed count
    Seeds,
    /// Sort by file size
    Size,
}

// =============================================================================
// Resolution Commands
// =============================================================================

/// Media type of the magnet's content
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaTypeArg {
    #[default]
    Movie,
    Series,
}

impl From<MediaTypeArg> for MediaType {
    fn from(arg: MediaTypeArg) -> Self {
        match arg {
            MediaTypeArg::Movie => MediaType::Movie,
            MediaTypeArg::Series => MediaType::Series,
        }
    }
}

/// Include/exclude regex for the files of a torrent
#[derive(Args, Debug, Clone, Default)]
pub struct FileFilterArgs {
    /// Only keep files whose path matches this regex
    #[arg(long, conflicts_with = "exclude")]
    pub include: Option<String>,

    /// Drop files whose path matches this regex
    #[arg(long)]
    pub exclude: Option<String>,
}

/// Send a magnet to RDT Client
#[derive(Args, Debug)]
pub struct DownloadCmd {
    /// Magnet link or torrent URL
    #[arg(required = true)]
    pub magnet: String,

    /// Media type; picks the default download folder
    #[arg(long = "type", short = 't', value_enum, default_value = "movie")]
    pub media_type: MediaTypeArg,

    /// Download folder (defaults to the configured movies/shows folder)
    #[arg(long, short = 'f')]
    pub folder: Option<String>,

    #[command(flatten)]
    pub filter: FileFilterArgs,
}

impl DownloadCmd {
    /// Download task described by the flags
    pub fn task(&self) -> DownloadTask {
        DownloadTask {
            category: self.folder.clone().unwrap_or_default(),
            include_regex: self.filter.include.clone(),
            exclude_regex: self.filter.exclude.clone(),
        }
    }
}

/// A command that only takes a magnet
#[derive(Args, Debug)]
pub struct MagnetCmd {
    /// Magnet link or torrent URL
    #[arg(required = true)]
    pub magnet: String,
}

/// List the files of a magnet
#[derive(Args, Debug)]
pub struct FilesCmd {
    /// Magnet link or torrent URL
    #[arg(required = true)]
    pub magnet: String,

    #[command(flatten)]
    pub filter: FileFilterArgs,
}

impl FilesCmd {
    pub fn task(&self) -> DownloadTask {
        DownloadTask {
            category: String::new(),
            include_regex: self.filter.include.clone(),
            exclude_regex: self.filter.exclude.clone(),
        }
    }
}

/// Play one file of a torrent already on Real-Debrid
#[derive(Args, Debug)]
pub struct PlayFileCmd {
    /// Real-Debrid torrent ID (from `files` or `debrid` output)
    #[arg(required = true)]
    pub id: String,

    /// Index into the torrent's links
    #[arg(default_value = "0")]
    pub index: usize,
}

/// Show RDT Client downloads
#[derive(Args, Debug)]
pub struct DownloadsCmd {
    /// Only show downloads that are not finished
    #[arg(long)]
    pub active: bool,
}

/// Check service connectivity
#[derive(Args, Debug)]
pub struct StatusCmd {}

// =============================================================================
// Config Command
// =============================================================================

/// Show or change configuration
#[derive(Args, Debug)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (secrets masked)
    Show,
    /// Print the config file path
    Path,
    /// Set a value and save the config file
    Set {
        /// Config key (e.g. real_debrid_api_key)
        key: String,
        /// New value
        value: String,
    },
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print data as JSON, or as display lines on a terminal
    pub fn print_lines<T: Serialize + std::fmt::Display>(&self, items: &[T]) -> anyhow::Result<()> {
        if self.json {
            return self.print(items);
        }
        for item in items {
            println!("{}", item);
        }
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// IMDB ID Validation
// =============================================================================

/// Validate IMDB ID format (tt followed by digits)
pub fn validate_imdb_id(id: &str) -> Result<&str, &'static str> {
    if id.starts_with("tt") && id.len() >= 9 && id[2..].chars().all(|c| c.is_ascii_digit()) {
        Ok(id)
    } else {
        Err("Invalid IMDB ID format (expected tt followed by 7+ digits)")
    }
}

// =============================================================================
// Tests
// =============================================================================
