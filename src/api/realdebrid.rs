//! Real-Debrid API client
//!
//! Registers magnets, selects files, polls torrent info and unrestricts
//! hoster links into direct download URLs.
//! API docs: https://api.real-debrid.com/
//!
//! No call here is retried: any non-2xx surfaces as `ResolveError::Upstream`.

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{ResolveError, DEBRID_NETWORK_HINT};
use crate::models::{
    DebridStatus, DebridTorrentHandle, DebridUser, FileEntry, FileSelection, MagnetReference,
    UnrestrictedLink,
};

/// Real-Debrid REST base URL
pub const DEFAULT_BASE_URL: &str = "https://api.real-debrid.com/rest/1.0";

/// Resolved settings for the debrid client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebridSettings {
    pub api_key: String,
    pub base_url: String,
}

/// `POST /torrents/addMagnet` response
#[derive(Debug, Deserialize)]
struct AddMagnetResponse {
    id: String,
}

/// `GET /torrents/info/{id}` response
#[derive(Debug, Deserialize)]
struct TorrentInfoResponse {
    id: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    files: Vec<TorrentFile>,
    #[serde(default)]
    links: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TorrentFile {
    id: u32,
    path: String,
    bytes: u64,
    #[serde(default)]
    selected: u8,
}

impl TorrentInfoResponse {
    fn into_handle(self) -> DebridTorrentHandle {
        let status = self
            .status
            .as_deref()
            .map(DebridStatus::from_provider)
            .unwrap_or_default();

        DebridTorrentHandle {
            id: self.id,
            status,
            raw_status: self.status,
            filename: self.filename,
            files: self
                .files
                .into_iter()
                .map(|f| FileEntry {
                    id: f.id,
                    path: f.path,
                    bytes: f.bytes,
                    selected: f.selected == 1,
                })
                .collect(),
            links: self.links,
        }
    }
}

/// `POST /unrestrict/link` response
#[derive(Debug, Deserialize)]
struct UnrestrictResponse {
    id: String,
    download: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    streamable: u8,
}

/// Real-Debrid API client
pub struct DebridClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl DebridClient {
    /// Create a client from resolved settings
    pub fn new(settings: DebridSettings) -> Result<Self, ResolveError> {
        Self::with_base_url(settings.api_key, settings.base_url)
    }

    /// Create a client against an explicit base URL (tests, mirrors)
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ResolveError::Client)?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            client,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Attach auth, send, and map non-2xx to `Upstream`
    async fn send(&self, request: RequestBuilder) -> Result<Response, ResolveError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ResolveError::network(e, DEBRID_NETWORK_HINT))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), %body, "real-debrid request failed");
            return Err(ResolveError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ResolveError> {
        let response = self.send(request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ResolveError::network(e, DEBRID_NETWORK_HINT))?;
        serde_json::from_str(&body)
            .map_err(|e| ResolveError::InvalidResponse(format!("Real-Debrid JSON parse error: {}", e)))
    }

    /// Register a magnet. Only `id` is populated on the returned handle.
    pub async fn add_magnet(
        &self,
        magnet: &MagnetReference,
    ) -> Result<DebridTorrentHandle, ResolveError> {
        let request = self
            .client
            .post(self.url("/torrents/addMagnet"))
            .form(&[("magnet", magnet.as_str())]);
        let added: AddMagnetResponse = self.json(request).await?;

        debug!(id = %added.id, "magnet added to real-debrid");
        Ok(DebridTorrentHandle::added(added.id))
    }

    /// Choose which files the provider should fetch; required before links exist
    pub async fn select_files(&self, id: &str, selection: &FileSelection) -> Result<(), ResolveError> {
        let files = selection.form_value();
        let request = self
            .client
            .post(self.url(&format!("/torrents/selectFiles/{}", id)))
            .form(&[("files", files.as_str())]);
        self.send(request).await?;

        debug!(%id, %files, "files selected");
        Ok(())
    }

    /// Fetch the fully populated handle
    pub async fn torrent_info(&self, id: &str) -> Result<DebridTorrentHandle, ResolveError> {
        let request = self.client.get(self.url(&format!("/torrents/info/{}", id)));
        let info: TorrentInfoResponse = self.json(request).await?;
        Ok(info.into_handle())
    }

    /// Convert a hoster link into a direct download URL
    pub async fn unrestrict_link(&self, link: &str) -> Result<UnrestrictedLink, ResolveError> {
        let request = self
            .client
            .post(self.url("/unrestrict/link"))
            .form(&[("link", link)]);
        let unrestricted: UnrestrictResponse = self.json(request).await?;

        Ok(UnrestrictedLink {
            download_url: unrestricted.download,
            streamable: unrestricted.streamable == 1,
            stream_id: unrestricted.id,
            filename: unrestricted.filename,
        })
    }

    /// Account details; doubles as a connection test
    pub async fn user(&self) -> Result<DebridUser, ResolveError> {
        self.json(self.client.get(self.url("/user"))).await
    }
}
