//! RDT Client API client
//!
//! Drives a self-hosted RDT Client instance: cookie-based login, enqueueing
//! magnets into a download folder, and listing download progress.
//!
//! The session cookie lives in the `reqwest` cookie jar shared by
//! `SessionManager` and `DownloadClient`, so every request after login
//! carries it automatically.

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ResolveError, RDT_NETWORK_HINT};
use crate::models::{
    DownloadProgress, DownloadTask, MagnetReference, MediaType, Receipt, TorrentStatus,
};

/// Resolved settings for the RDT Client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdtSettings {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub movies_path: String,
    pub shows_path: String,
}

impl RdtSettings {
    /// Settings with default folders and the given credentials
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: Some(username.into()),
            password: Some(password.into()),
            movies_path: "Movies".to_string(),
            shows_path: "TV Shows".to_string(),
        }
    }
}

fn is_auth_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

// =============================================================================
// Session Manager
// =============================================================================

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Holds the RDT Client login session
pub struct SessionManager {
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    client: reqwest::Client,
}

impl SessionManager {
    /// Fails if the cookie-jar client cannot be built
    pub fn new(settings: &RdtSettings) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ResolveError::Client)?;
        Ok(Self {
            base_url: settings.base_url.clone(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            client,
        })
    }

    /// HTTP client carrying the session cookie
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Check the session. Any failure, network or auth, reads as logged out.
    pub async fn check_login(&self) -> bool {
        match self
            .client
            .get(self.url("/Api/Authentication/IsLoggedIn"))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "RDT Client session check failed");
                false
            }
        }
    }

    /// Submit stored credentials; the session cookie lands in the jar
    pub async fn authenticate(&self) -> Result<(), ResolveError> {
        let (Some(username), Some(password)) = (self.username.as_deref(), self.password.as_deref())
        else {
            return Err(ResolveError::Auth(
                "RDT Client credentials not configured".to_string(),
            ));
        };

        let response = self
            .client
            .post(self.url("/Api/Authentication/Login"))
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|e| ResolveError::network(e, RDT_NETWORK_HINT))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolveError::Auth(format!(
                "RDT Client rejected the login (HTTP {}). Check your credentials. {}",
                status.as_u16(),
                body
            )
            .trim_end()
            .to_string()));
        }

        info!(user = %username, "authenticated with RDT Client");
        Ok(())
    }

    /// Log in only if the current session is not valid
    pub async fn ensure_authenticated(&self) -> Result<(), ResolveError> {
        if self.check_login().await {
            return Ok(());
        }
        self.authenticate().await
    }
}

// =============================================================================
// Download Client Adapter
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadMagnetRequest<'a> {
    magnet_link: &'a str,
    torrent: TorrentOptions<'a>,
}

/// RDT Client torrent options; numeric fields are RDT Client enum values
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TorrentOptions<'a> {
    category: &'a str,
    host_download_action: u8,
    download_action: u8,
    finished_action: u8,
    finished_action_delay: u32,
    download_min_size: u64,
    include_regex: Option<&'a str>,
    exclude_regex: Option<&'a str>,
    download_manual_files: Option<&'a str>,
    priority: u8,
    torrent_retry_attempts: u8,
    download_retry_attempts: u8,
    delete_on_error: u8,
    lifetime: u32,
    download_client: u8,
}

impl<'a> TorrentOptions<'a> {
    fn new(category: &'a str, task: &'a DownloadTask) -> Self {
        let non_empty = |s: &'a Option<String>| s.as_deref().filter(|s| !s.is_empty());
        Self {
            category,
            host_download_action: 0,
            // download all files
            download_action: 1,
            // remove torrent from provider when finished
            finished_action: 1,
            finished_action_delay: 0,
            download_min_size: 0,
            include_regex: non_empty(&task.include_regex),
            exclude_regex: non_empty(&task.exclude_regex),
            download_manual_files: None,
            priority: 0,
            torrent_retry_attempts: 1,
            download_retry_attempts: 3,
            delete_on_error: 0,
            lifetime: 0,
            download_client: 0,
        }
    }
}

/// Entry of `GET /Api/Torrents`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RdtTorrent {
    #[serde(default)]
    rd_name: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    downloads: Option<Vec<RdtDownload>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RdtDownload {
    #[serde(default)]
    bytes_done: Option<u64>,
    #[serde(default)]
    bytes_total: Option<u64>,
    #[serde(default)]
    speed: Option<f64>,
    /// Completion timestamp; null while in progress
    #[serde(default)]
    download_finished: Option<serde_json::Value>,
}

impl RdtDownload {
    fn progress(&self) -> DownloadProgress {
        DownloadProgress {
            bytes_done: self.bytes_done.unwrap_or(0),
            bytes_total: self.bytes_total.unwrap_or(0),
            speed: self.speed.unwrap_or(0.0).max(0.0) as u64,
            finished: !matches!(
                self.download_finished,
                None | Some(serde_json::Value::Bool(false))
            ),
        }
    }
}

impl RdtTorrent {
    fn into_status(self) -> TorrentStatus {
        let downloads: Vec<DownloadProgress> = self
            .downloads
            .unwrap_or_default()
            .iter()
            .map(RdtDownload::progress)
            .collect();
        TorrentStatus::aggregate(self.rd_name, self.category, &downloads)
    }
}

/// Adapter over the RDT Client torrent API
pub struct DownloadClient {
    session: SessionManager,
    movies_path: String,
    shows_path: String,
}

impl DownloadClient {
    pub fn new(settings: RdtSettings) -> Result<Self, ResolveError> {
        Ok(Self {
            session: SessionManager::new(&settings)?,
            movies_path: settings.movies_path,
            shows_path: settings.shows_path,
        })
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Configured folder for a media type
    pub fn default_category(&self, media_type: MediaType) -> &str {
        match media_type {
            MediaType::Movie => &self.movies_path,
            MediaType::Series => &self.shows_path,
        }
    }

    /// Send a request built by `build`, after making sure the session is
    /// valid. A 401/403 triggers one re-login and one retry; a second
    /// 401/403 is an auth failure.
    async fn send_authorized<F>(&self, build: F) -> Result<Response, ResolveError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        self.session.ensure_authenticated().await?;

        let mut response = self.send(build(self.session.http())).await?;
        if is_auth_status(response.status()) {
            warn!(
                status = response.status().as_u16(),
                "RDT Client unauthorized, attempting to login"
            );
            self.session.authenticate().await?;
            response = self.send(build(self.session.http())).await?;
            if is_auth_status(response.status()) {
                return Err(ResolveError::Auth(format!(
                    "RDT Client refused the request after re-authenticating (HTTP {})",
                    response.status().as_u16()
                )));
            }
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolveError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ResolveError> {
        request
            .send()
            .await
            .map_err(|e| ResolveError::network(e, RDT_NETWORK_HINT))
    }

    /// Enqueue a magnet for download into the task's folder (or the
    /// per-media-type default when the task leaves it empty)
    pub async fn add_torrent(
        &self,
        magnet: &MagnetReference,
        media_type: MediaType,
        task: &DownloadTask,
    ) -> Result<Receipt, ResolveError> {
        let category = match task.category.trim() {
            "" => self.default_category(media_type).to_string(),
            custom => custom.to_string(),
        };
        let payload = UploadMagnetRequest {
            magnet_link: magnet.as_str(),
            torrent: TorrentOptions::new(&category, task),
        };
        let url = self.session.url("/Api/Torrents/UploadMagnet");

        let response = self
            .send_authorized(|http| http.post(&url).json(&payload))
            .await?;
        let body = response
            .text()
            .await
            .map_err(|e| ResolveError::network(e, RDT_NETWORK_HINT))?;

        info!(%category, %media_type, "magnet sent to RDT Client");
        Ok(Receipt {
            media_type,
            category,
            response: serde_json::from_str(&body).ok(),
        })
    }

    /// Current downloads with per-file progress summed up
    pub async fn list_torrents(&self) -> Result<Vec<TorrentStatus>, ResolveError> {
        let url = self.session.url("/Api/Torrents");
        let response = self.send_authorized(|http| http.get(&url)).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ResolveError::network(e, RDT_NETWORK_HINT))?;

        let torrents: Option<Vec<RdtTorrent>> = serde_json::from_str(&body)
            .map_err(|e| ResolveError::InvalidResponse(format!("RDT Client JSON parse error: {}", e)))?;

        Ok(torrents
            .unwrap_or_default()
            .into_iter()
            .map(RdtTorrent::into_status)
            .collect())
    }
}
