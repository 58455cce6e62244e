//! Error taxonomy for the debrid resolution workflow
//!
//! Every client in `api` returns `ResolveError`. The orchestrator attaches the
//! action name when it reports a failure; the CLI maps kinds to exit codes.

use thiserror::Error;

/// Remediation hint for an unreachable RDT Client
pub const RDT_NETWORK_HINT: &str =
    "check the RDT Client URL, or enable CORS / configure a reverse proxy in front of it";

/// Remediation hint for an unreachable debrid provider
pub const DEBRID_NETWORK_HINT: &str = "check your network connection and the Real-Debrid API URL";

/// Errors raised while resolving a magnet through the debrid provider or
/// the self-hosted download client
#[derive(Error, Debug)]
pub enum ResolveError {
    /// A required URL or credential is missing; raised before any request
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Login rejected (or credentials absent) at the download client
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Non-2xx response from an upstream API, body kept verbatim
    #[error("Upstream returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Transport failure (unreachable host, refused connection, TLS, ...)
    #[error("Network error: {source} ({hint})")]
    Network {
        #[source]
        source: reqwest::Error,
        hint: &'static str,
    },

    /// The provider did not produce links within the poll budget
    #[error("Timed out waiting for the provider after {attempts} attempts")]
    Timeout { attempts: u32 },

    /// The provider marked the torrent as failed
    #[error("Torrent {id} failed on the provider (status: {status})")]
    TorrentFailed { id: String, status: String },

    /// The provider finished but produced no downloadable links
    #[error("No links available for torrent {id}. It may still be processing, try again shortly")]
    NoLinks { id: String },

    /// The HTTP client itself could not be built (TLS backend, cookie jar)
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid magnet link: {0}")]
    InvalidMagnet(String),
}

impl ResolveError {
    /// Wrap a transport error with a remediation hint
    pub fn network(source: reqwest::Error, hint: &'static str) -> Self {
        ResolveError::Network { source, hint }
    }

    /// Stable snake_case name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::Configuration(_) => "configuration",
            ResolveError::Auth(_) => "auth",
            ResolveError::Upstream { .. } => "upstream",
            ResolveError::Network { .. } => "network",
            ResolveError::Timeout { .. } => "timeout",
            ResolveError::TorrentFailed { .. } => "torrent_failed",
            ResolveError::NoLinks { .. } => "no_links",
            ResolveError::InvalidResponse(_) => "invalid_response",
            ResolveError::InvalidMagnet(_) => "invalid_magnet",
            ResolveError::Client(_) => "client",
        }
    }

    /// True for 401/403 upstream responses
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ResolveError::Upstream { status: 401 | 403, .. })
    }
}
