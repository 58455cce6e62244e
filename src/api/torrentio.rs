//! Torrentio addon client
//!
//! Looks up torrent streams for a movie or episode by IMDB ID. Each result
//! carries an info hash that becomes the magnet handed to the resolver.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::models::{Quality, StreamSource};

/// Public Torrentio instance
pub const DEFAULT_BASE_URL: &str = "https://torrentio.strem.fun";

/// Stremio addon stream response
#[derive(Debug, Deserialize)]
struct StreamsResponse {
    #[serde(default)]
    streams: Vec<AddonStream>,
}

#[derive(Debug, Deserialize)]
struct AddonStream {
    #[serde(default)]
    name: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "infoHash")]
    info_hash: Option<String>,
    #[serde(rename = "fileIdx")]
    file_idx: Option<u32>,
}

impl AddonStream {
    /// Streams without an info hash (direct links) are dropped
    fn into_stream_source(self) -> Option<StreamSource> {
        let info_hash = self.info_hash?;
        Some(StreamSource {
            quality: Quality::from_str_loose(&self.name),
            seeds: StreamSource::parse_seeds(&self.title),
            size_bytes: StreamSource::parse_size(&self.title),
            name: self.name,
            title: self.title,
            info_hash,
            file_idx: self.file_idx,
        })
    }
}

/// What to look up: a movie, or one episode of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamQuery<'a> {
    Movie(&'a str),
    Episode {
        imdb_id: &'a str,
        season: u16,
        episode: u16,
    },
}

impl StreamQuery<'_> {
    /// Addon path: `movie/tt123` or `series/tt123:1:2`
    fn path(&self) -> String {
        match self {
            StreamQuery::Movie(id) => format!("movie/{}", id),
            StreamQuery::Episode {
                imdb_id,
                season,
                episode,
            } => format!("series/{}:{}:{}", imdb_id, season, episode),
        }
    }
}

/// Torrentio addon client
pub struct TorrentioClient {
    base_url: String,
    client: reqwest::Client,
}

impl TorrentioClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn movie_streams(&self, imdb_id: &str) -> Result<Vec<StreamSource>> {
        self.streams(StreamQuery::Movie(imdb_id)).await
    }

    pub async fn episode_streams(
        &self,
        imdb_id: &str,
        season: u16,
        episode: u16,
    ) -> Result<Vec<StreamSource>> {
        self.streams(StreamQuery::Episode {
            imdb_id,
            season,
            episode,
        })
        .await
    }

    /// Fetch streams sorted by quality, then seeds, best first
    pub async fn streams(&self, query: StreamQuery<'_>) -> Result<Vec<StreamSource>> {
        let url = format!("{}/stream/{}.json", self.base_url, query.path());
        debug!(%url, "fetching torrentio streams");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch from Torrentio")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Torrentio returned HTTP {}", status);
        }

        let text = response
            .text()
            .await
            .context("Failed to read response body")?;
        let data: StreamsResponse =
            serde_json::from_str(&text).context("Failed to parse JSON response")?;

        let mut streams: Vec<StreamSource> = data
            .streams
            .into_iter()
            .filter_map(AddonStream::into_stream_source)
            .collect();

        streams.sort_by(|a, b| b.quality.cmp(&a.quality).then_with(|| b.seeds.cmp(&a.seeds)));

        Ok(streams)
    }
}

impl Default for TorrentioClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
