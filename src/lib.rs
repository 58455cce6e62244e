//! ted - The Entertainment District
//!
//! Finds torrent streams and resolves them through a debrid provider or a
//! self-hosted download client.
//!
//! # Modules
//!
//! - `models` - Magnets, debrid handles, download tasks and progress
//! - `api` - API clients (Real-Debrid, RDT Client, Torrentio)
//! - `resolve` - The download / add-to-debrid / watch-now workflow
//! - `config` - Config file and environment settings
//! - `error` - Error taxonomy shared by the clients
//! - `logging` - tracing subscriber setup

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod resolve;

pub use api::{DebridClient, DownloadClient, SessionManager, TorrentioClient};
pub use config::Config;
pub use error::ResolveError;
pub use models::{
    DebridStatus, DebridTorrentHandle, DownloadTask, FileEntry, FileSelection, MagnetReference,
    MediaType, Quality, Receipt, StreamSource, TorrentStatus, UnrestrictedLink,
};
pub use resolve::{Action, Orchestrator, PollPolicy, Resolution, WorkflowState};
