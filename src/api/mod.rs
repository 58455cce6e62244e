//! API clients for external services
//!
//! - Real-Debrid: magnet registration, file selection, link unrestriction
//! - RDT Client: self-hosted download manager (session + torrent adapter)
//! - Torrentio: stream sources via the Stremio addon protocol

pub mod rdtclient;
pub mod realdebrid;
pub mod torrentio;

pub use rdtclient::{DownloadClient, RdtSettings, SessionManager};
pub use realdebrid::{DebridClient, DebridSettings};
pub use torrentio::{StreamQuery, TorrentioClient};
