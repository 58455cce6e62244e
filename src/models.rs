//! Data structures and types for ted
//!
//! Shared models organized by domain:
//! - **Addons**: Torrentio stream sources and quality info
//! - **Debrid**: Real-Debrid torrent handles, files and unrestricted links
//! - **Downloads**: RDT Client download tasks, receipts and progress

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ResolveError;

/// Streaming page prefix for streamable unrestricted links
pub const STREAMING_PAGE_URL: &str = "https://real-debrid.com/streaming-";

// =============================================================================
// Media Type
// =============================================================================

/// Kind of media a magnet belongs to; drives the default download folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Movie,
    Series,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Movie => write!(f, "Movie"),
            MediaType::Series => write!(f, "Series"),
        }
    }
}

// =============================================================================
// Addon Models (Torrentio/Stremio)
// =============================================================================

/// Video quality classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Quality {
    UHD4K,
    FHD1080p,
    HD720p,
    SD480p,
    #[default]
    Unknown,
}

impl Quality {
    /// Parse quality from a string (e.g., "4K", "1080p", "720p")
    pub fn from_str_loose(s: &str) -> Self {
        let s_lower = s.to_lowercase();
        if s_lower.contains("4k") || s_lower.contains("2160p") || s_lower.contains("uhd") {
            Quality::UHD4K
        } else if s_lower.contains("1080p") || s_lower.contains("fhd") {
            Quality::FHD1080p
        } else if s_lower.contains("720p") || s_lower.contains("hd") && !s_lower.contains("hdcam") {
            Quality::HD720p
        } else if s_lower.contains("480p") || s_lower.contains("sd") {
            Quality::SD480p
        } else {
            Quality::Unknown
        }
    }

    /// Quality ranking for sorting (higher = better)
    pub fn rank(&self) -> u8 {
        match self {
            Quality::UHD4K => 4,
            Quality::FHD1080p => 3,
            Quality::HD720p => 2,
            Quality::SD480p => 1,
            Quality::Unknown => 0,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::UHD4K => write!(f, "4K"),
            Quality::FHD1080p => write!(f, "1080p"),
            Quality::HD720p => write!(f, "720p"),
            Quality::SD480p => write!(f, "480p"),
            Quality::Unknown => write!(f, "???"),
        }
    }
}

impl Ord for Quality {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Quality {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Stream source from Torrentio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSource {
    pub name: String,
    pub title: String,
    pub info_hash: String,
    pub file_idx: Option<u32>,
    pub seeds: u32,
    pub quality: Quality,
    pub size_bytes: Option<u64>,
}

impl StreamSource {
    /// Build the magnet reference handed to the resolution workflow
    pub fn to_magnet(&self, display_name: &str) -> MagnetReference {
        MagnetReference(format!(
            "magnet:?xt=urn:btih:{}&dn={}",
            self.info_hash,
            urlencoding::encode(display_name)
        ))
    }

    /// Parse seeds from title string (e.g., "👤 142" or "👤 1.2k")
    pub fn parse_seeds(title: &str) -> u32 {
        let re = Regex::new(r"👤\s*(\d+(?:\.\d+)?)\s*(k)?").ok();
        if let Some(caps) = re.as_ref().and_then(|re| re.captures(title)) {
            let num: f32 = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0.0);
            let multiplier = if caps.get(2).is_some() { 1000.0 } else { 1.0 };
            return (num * multiplier) as u32;
        }

        let lower = title.to_lowercase();
        let re_seeds = Regex::new(r"seeds?:\s*(\d+)").ok();
        if let Some(caps) = re_seeds.as_ref().and_then(|re| re.captures(&lower)) {
            return caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
        }

        0
    }

    /// Parse size from title string (e.g., "4.2 GB" or "890 MB")
    pub fn parse_size(title: &str) -> Option<u64> {
        let re = Regex::new(r"(\d+(?:\.\d+)?)\s*(GB|MB|gb|mb)").ok()?;
        let caps = re.captures(title)?;
        let num: f64 = caps.get(1)?.as_str().parse().ok()?;
        let unit = caps.get(2)?.as_str().to_uppercase();

        match unit.as_str() {
            "GB" => Some((num * 1024.0 * 1024.0 * 1024.0) as u64),
            "MB" => Some((num * 1024.0 * 1024.0) as u64),
            _ => None,
        }
    }
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self
            .size_bytes
            .map(format_bytes)
            .unwrap_or_else(|| "?".to_string());
        write!(
            f,
            "[{}] {} 👤{} {}",
            self.quality,
            size,
            self.seeds,
            self.title.lines().next().unwrap_or(&self.title)
        )
    }
}

// =============================================================================
// Magnet Reference
// =============================================================================

/// A torrent reference: a `magnet:?` URI or a direct http(s) URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MagnetReference(String);

impl MagnetReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Content hash from the `xt=urn:btih:` parameter, if present
    pub fn info_hash(&self) -> Option<&str> {
        let start = self.0.find("xt=urn:btih:")? + "xt=urn:btih:".len();
        let rest = &self.0[start..];
        let hash = rest.split('&').next().unwrap_or(rest);
        (!hash.is_empty()).then_some(hash)
    }
}

impl FromStr for MagnetReference {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with("magnet:?") || s.starts_with("http://") || s.starts_with("https://") {
            Ok(MagnetReference(s.to_string()))
        } else {
            Err(ResolveError::InvalidMagnet(
                "must start with 'magnet:?' or be an http(s) URL".to_string(),
            ))
        }
    }
}

impl fmt::Display for MagnetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Debrid Models (Real-Debrid)
// =============================================================================

/// Coarse processing state of a debrid torrent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DebridStatus {
    #[default]
    Queued,
    Downloading,
    Ready,
    Error,
}

impl DebridStatus {
    /// Map a Real-Debrid status string
    pub fn from_provider(status: &str) -> Self {
        match status {
            "downloaded" => DebridStatus::Ready,
            "downloading" | "compressing" | "uploading" => DebridStatus::Downloading,
            "magnet_error" | "error" | "virus" | "dead" => DebridStatus::Error,
            _ => DebridStatus::Queued,
        }
    }
}

impl fmt::Display for DebridStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebridStatus::Queued => write!(f, "queued"),
            DebridStatus::Downloading => write!(f, "downloading"),
            DebridStatus::Ready => write!(f, "ready"),
            DebridStatus::Error => write!(f, "error"),
        }
    }
}

/// A file inside a debrid torrent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: u32,
    pub path: String,
    pub bytes: u64,
    #[serde(default)]
    pub selected: bool,
}

impl FileEntry {
    const VIDEO_EXTENSIONS: &'static [&'static str] =
        &[".mp4", ".mkv", ".avi", ".mov", ".wmv", ".flv", ".webm", ".m4v"];

    pub fn is_video(&self) -> bool {
        let lower = self.path.to_lowercase();
        Self::VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
    }
}

impl fmt::Display for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icon = if self.is_video() { "▶" } else { " " };
        write!(f, "{} {} ({})", icon, self.path, format_bytes(self.bytes))
    }
}

/// Client-side view of a torrent registered with the debrid provider.
///
/// After `add_magnet` only `id` is meaningful; the rest fills in as the
/// provider processes the torrent and the handle is re-fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DebridTorrentHandle {
    pub id: String,
    pub status: DebridStatus,
    /// Status string exactly as the provider reported it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub files: Vec<FileEntry>,
    pub links: Vec<String>,
}

impl DebridTorrentHandle {
    /// Handle for a freshly added magnet
    pub fn added(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn has_links(&self) -> bool {
        !self.links.is_empty()
    }
}

/// Which files of a debrid torrent to fetch
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FileSelection {
    #[default]
    All,
    Indices(Vec<u32>),
}

impl FileSelection {
    /// Value of the `files` form field
    pub fn form_value(&self) -> String {
        match self {
            FileSelection::All => "all".to_string(),
            FileSelection::Indices(ids) => ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Result of unrestricting a hoster link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnrestrictedLink {
    pub download_url: String,
    pub streamable: bool,
    pub stream_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl UnrestrictedLink {
    /// Streaming page when the provider can stream it, else the raw download URL
    pub fn playable_url(&self) -> String {
        if self.streamable {
            format!("{}{}", STREAMING_PAGE_URL, self.stream_id)
        } else {
            self.download_url.clone()
        }
    }
}

/// Account details from the debrid provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebridUser {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Remaining premium time in seconds
    #[serde(default, rename = "premium")]
    pub premium_seconds: u64,
    #[serde(default)]
    pub expiration: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl DebridUser {
    pub fn is_premium(&self) -> bool {
        self.kind.as_deref() == Some("premium") || self.premium_seconds > 0
    }
}

// =============================================================================
// Download Client Models (RDT Client)
// =============================================================================

/// Where and which files the download client should fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DownloadTask {
    /// Target folder; empty means the per-media-type default
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub include_regex: Option<String>,
    #[serde(default)]
    pub exclude_regex: Option<String>,
}

impl DownloadTask {
    pub fn filter(&self) -> FileFilter {
        match (&self.include_regex, &self.exclude_regex) {
            (Some(pattern), _) => FileFilter::Include(Regex::new(pattern).ok()),
            (None, Some(pattern)) => FileFilter::Exclude(Regex::new(pattern).ok()),
            (None, None) => FileFilter::None,
        }
    }
}

/// File-path filter mirroring a task's include/exclude regex.
///
/// An unparseable pattern matches every path: it keeps every file when
/// including and hides every file when excluding.
#[derive(Debug, Clone, Default)]
pub enum FileFilter {
    #[default]
    None,
    Include(Option<Regex>),
    Exclude(Option<Regex>),
}

impl FileFilter {
    fn matches(re: &Option<Regex>, path: &str) -> bool {
        re.as_ref().map_or(true, |re| re.is_match(path))
    }

    pub fn keeps(&self, path: &str) -> bool {
        match self {
            FileFilter::None => true,
            FileFilter::Include(re) => Self::matches(re, path),
            FileFilter::Exclude(re) => !Self::matches(re, path),
        }
    }

    /// Kept files paired with their position in the unfiltered list, which
    /// is also their index into the torrent's links
    pub fn apply<'a>(&self, files: &'a [FileEntry]) -> Vec<(usize, &'a FileEntry)> {
        files
            .iter()
            .enumerate()
            .filter(|(_, f)| self.keeps(&f.path))
            .collect()
    }
}

/// Acknowledgement from the download client for an enqueued magnet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub media_type: MediaType,
    pub category: String,
    /// Response body, if the client returned JSON
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

/// Per-file progress as reported by the download client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadProgress {
    pub bytes_done: u64,
    pub bytes_total: u64,
    pub speed: u64,
    pub finished: bool,
}

/// Finished vs total file counts for a download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FileCounts {
    pub finished: usize,
    pub total: usize,
}

/// Aggregated progress of one torrent in the download client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentStatus {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
    pub speed_bytes_per_sec: u64,
    pub file_counts: FileCounts,
}

impl TorrentStatus {
    /// Sum per-file counters into one status line
    pub fn aggregate(
        name: Option<String>,
        category: Option<String>,
        downloads: &[DownloadProgress],
    ) -> Self {
        let mut status = TorrentStatus {
            name: name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "Unknown Torrent".to_string()),
            category,
            total_bytes: 0,
            downloaded_bytes: 0,
            speed_bytes_per_sec: 0,
            file_counts: FileCounts {
                finished: 0,
                total: downloads.len(),
            },
        };

        for d in downloads {
            status.downloaded_bytes += d.bytes_done;
            status.total_bytes += d.bytes_total;
            status.speed_bytes_per_sec += d.speed;
            if d.finished {
                status.file_counts.finished += 1;
            }
        }

        status
    }

    /// Whole-percent progress, 0 when the total is unknown
    pub fn progress_percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 0;
        }
        let pct = (self.downloaded_bytes as f64 / self.total_bytes as f64 * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

impl fmt::Display for TorrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let speed = if self.speed_bytes_per_sec > 0 {
            format!("{}/s", format_bytes(self.speed_bytes_per_sec))
        } else {
            "-".to_string()
        };
        write!(
            f,
            "{} [{}%] {} files {}/{} {}",
            self.name,
            self.progress_percent(),
            format_bytes(self.total_bytes),
            self.file_counts.finished,
            self.file_counts.total,
            speed
        )
    }
}

// =============================================================================
// Formatting
// =============================================================================

/// Human-readable byte count with binary units (e.g. "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
