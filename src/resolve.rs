//! Resolution workflow
//!
//! Turns a magnet into one of three outcomes, depending on the action:
//! - `download`: enqueue on RDT Client, done once it acknowledges
//! - `debrid`: register on Real-Debrid and select all files
//! - `watch`: register, select, wait for links, unrestrict the first one
//!
//! Each run moves `Idle -> Processing -> Done | Failed` and stops at the
//! first error. Real-Debrid has no push notification, so links are polled
//! with exponential backoff up to a fixed number of attempts.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::{DebridClient, DownloadClient};
use crate::error::ResolveError;
use crate::models::{
    DebridStatus, DebridTorrentHandle, DownloadTask, FileSelection, MagnetReference, MediaType,
    Receipt,
};

/// Backoff schedule for polling torrent info
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait before the first poll
    pub initial_delay: Duration,
    pub max_attempts: u32,
    /// Cap for a single wait
    pub max_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_attempts: 5,
            max_delay: Duration::from_secs(16),
        }
    }
}

impl PollPolicy {
    /// Wait before the given 0-based attempt: doubles each time, capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// What the user asked to do with a magnet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send to the home download client
    Download {
        media_type: MediaType,
        task: DownloadTask,
    },
    /// Register on the debrid provider only
    AddToDebrid,
    /// Resolve to a playable URL
    WatchNow,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Download { .. } => "download",
            Action::AddToDebrid => "debrid",
            Action::WatchNow => "watch",
        }
    }
}

/// Successful outcome of an action
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Resolution {
    Queued { receipt: Receipt },
    AddedToDebrid { id: String },
    Playable { url: String, streamable: bool },
}

/// Per-action workflow state
#[derive(Debug, Clone, Serialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Idle,
    Processing { action: &'static str },
    Done { resolution: Resolution },
    Failed {
        action: &'static str,
        kind: &'static str,
        message: String,
    },
}

/// Sequences calls across the debrid client and the download client.
///
/// Either client may be absent; actions that need a missing one fail with a
/// configuration error before any request is sent.
pub struct Orchestrator {
    debrid: Option<DebridClient>,
    downloads: Option<DownloadClient>,
    poll: PollPolicy,
    state: WorkflowState,
}

impl Orchestrator {
    pub fn new(
        debrid: Option<DebridClient>,
        downloads: Option<DownloadClient>,
        poll: PollPolicy,
    ) -> Self {
        Self {
            debrid,
            downloads,
            poll,
            state: WorkflowState::Idle,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    fn debrid(&self) -> Result<&DebridClient, ResolveError> {
        self.debrid.as_ref().ok_or_else(|| {
            ResolveError::Configuration("Real-Debrid API key not configured".to_string())
        })
    }

    fn downloads(&self) -> Result<&DownloadClient, ResolveError> {
        self.downloads
            .as_ref()
            .ok_or_else(|| ResolveError::Configuration("RDT Client URL not configured".to_string()))
    }

    /// Run one action to completion and record the terminal state.
    /// Failure messages are prefixed with the action name.
    pub async fn run(&mut self, magnet: &MagnetReference, action: Action) -> &WorkflowState {
        let name = action.name();
        self.state = WorkflowState::Processing { action: name };
        info!(action = name, magnet = %magnet, "processing");

        self.state = match self.resolve(magnet, &action).await {
            Ok(resolution) => {
                info!(action = name, "done");
                WorkflowState::Done { resolution }
            }
            Err(e) => {
                warn!(action = name, kind = e.kind(), error = %e, "failed");
                WorkflowState::Failed {
                    action: name,
                    kind: e.kind(),
                    message: format!("{} failed: {}", name, e),
                }
            }
        };
        &self.state
    }

    /// The call sequence behind an action, without state bookkeeping
    pub async fn resolve(
        &self,
        magnet: &MagnetReference,
        action: &Action,
    ) -> Result<Resolution, ResolveError> {
        match action {
            Action::Download { media_type, task } => {
                let receipt = self
                    .downloads()?
                    .add_torrent(magnet, *media_type, task)
                    .await?;
                Ok(Resolution::Queued { receipt })
            }
            Action::AddToDebrid => {
                let handle = self.add_and_select(magnet).await?;
                Ok(Resolution::AddedToDebrid { id: handle.id })
            }
            Action::WatchNow => self.watch_now(magnet).await,
        }
    }

    async fn add_and_select(
        &self,
        magnet: &MagnetReference,
    ) -> Result<DebridTorrentHandle, ResolveError> {
        let debrid = self.debrid()?;
        let handle = debrid.add_magnet(magnet).await?;
        debrid.select_files(&handle.id, &FileSelection::All).await?;
        Ok(handle)
    }

    async fn watch_now(&self, magnet: &MagnetReference) -> Result<Resolution, ResolveError> {
        let added = self.add_and_select(magnet).await?;
        let handle = self.poll_until(&added.id, DebridTorrentHandle::has_links).await?;
        let link = handle
            .links
            .first()
            .ok_or_else(|| ResolveError::NoLinks {
                id: handle.id.clone(),
            })?;
        self.unrestrict(link).await
    }

    async fn unrestrict(&self, link: &str) -> Result<Resolution, ResolveError> {
        let unrestricted = self.debrid()?.unrestrict_link(link).await?;
        Ok(Resolution::Playable {
            url: unrestricted.playable_url(),
            streamable: unrestricted.streamable,
        })
    }

    /// Re-fetch the handle until `done` holds.
    ///
    /// Stops early when the provider reports an error, or reports the
    /// torrent ready without satisfying `done` (that handle is returned).
    async fn poll_until<F>(&self, id: &str, done: F) -> Result<DebridTorrentHandle, ResolveError>
    where
        F: Fn(&DebridTorrentHandle) -> bool,
    {
        let debrid = self.debrid()?;

        for attempt in 0..self.poll.max_attempts {
            tokio::time::sleep(self.poll.delay_for(attempt)).await;

            let handle = debrid.torrent_info(id).await?;
            if done(&handle) {
                return Ok(handle);
            }
            match handle.status {
                DebridStatus::Error => {
                    return Err(ResolveError::TorrentFailed {
                        id: handle.id,
                        status: handle.raw_status.unwrap_or_else(|| "error".to_string()),
                    })
                }
                DebridStatus::Ready => return Ok(handle),
                status => debug!(%id, attempt, %status, "torrent not ready yet"),
            }
        }

        Err(ResolveError::Timeout {
            attempts: self.poll.max_attempts,
        })
    }

    /// Register a magnet and wait until its file list is known, for
    /// previewing what a download would fetch
    pub async fn preview_files(
        &self,
        magnet: &MagnetReference,
    ) -> Result<DebridTorrentHandle, ResolveError> {
        let added = self.add_and_select(magnet).await?;
        self.poll_until(&added.id, |h| !h.files.is_empty()).await
    }

    /// Resolve the link at `index` of an already registered torrent
    pub async fn play_file(&self, id: &str, index: usize) -> Result<Resolution, ResolveError> {
        let handle = self.debrid()?.torrent_info(id).await?;
        let link = handle
            .links
            .get(index)
            .ok_or_else(|| ResolveError::NoLinks { id: id.to_string() })?;
        self.unrestrict(link).await
    }
}
