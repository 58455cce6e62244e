//! Resolution Workflow Tests
//!
//! Drives the orchestrator end to end against mock Real-Debrid and RDT
//! Client servers, with a fast poll policy.

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::time::Duration;
use ted::api::rdtclient::{DownloadClient, RdtSettings};
use ted::api::realdebrid::DebridClient;
use ted::error::ResolveError;
use ted::models::{DownloadTask, MagnetReference, MediaType};
use ted::resolve::{Action, Orchestrator, PollPolicy, Resolution, WorkflowState};

fn fast_poll(max_attempts: u32) -> PollPolicy {
    PollPolicy {
        initial_delay: Duration::from_millis(1),
        max_attempts,
        max_delay: Duration::from_millis(4),
    }
}

fn magnet() -> MagnetReference {
    "magnet:?xt=urn:btih:feedface&dn=Movie".parse().unwrap()
}

fn debrid_orchestrator(server: &ServerGuard, max_attempts: u32) -> Orchestrator {
    let debrid = DebridClient::with_base_url("token", server.url()).unwrap();
    Orchestrator::new(Some(debrid), None, fast_poll(max_attempts))
}

/// addMagnet + selectFiles for torrent T1
async fn mock_add_and_select(server: &mut ServerGuard) -> (mockito::Mock, mockito::Mock) {
    let add = server
        .mock("POST", "/torrents/addMagnet")
        .with_status(201)
        .with_body(r#"{"id": "T1", "uri": "https://api.real-debrid.com/rest/1.0/torrents/info/T1"}"#)
        .create_async()
        .await;
    let select = server
        .mock("POST", "/torrents/selectFiles/T1")
        .match_body(Matcher::UrlEncoded("files".into(), "all".into()))
        .with_status(204)
        .create_async()
        .await;
    (add, select)
}

fn info_body(status: &str, links: &[&str]) -> String {
    json!({
        "id": "T1",
        "filename": "Movie.2024.1080p",
        "status": status,
        "files": [{"id": 1, "path": "/Movie.2024.1080p.mkv", "bytes": 2147483648u64, "selected": 1}],
        "links": links,
    })
    .to_string()
}

// =============================================================================
// Watch Now
// =============================================================================

#[tokio::test]
async fn test_watch_now_returns_download_url() {
    let mut server = Server::new_async().await;
    let (add, select) = mock_add_and_select(&mut server).await;
    let _info = server
        .mock("GET", "/torrents/info/T1")
        .with_status(200)
        .with_body(info_body("downloaded", &["https://debrid/dl/1"]))
        .create_async()
        .await;
    let unrestrict = server
        .mock("POST", "/unrestrict/link")
        .match_body(Matcher::UrlEncoded("link".into(), "https://debrid/dl/1".into()))
        .with_status(200)
        .with_body(r#"{"id": "S1", "download": "https://cdn.debrid/Movie.mkv", "streamable": 0}"#)
        .create_async()
        .await;

    let mut orchestrator = debrid_orchestrator(&server, 5);
    let state = orchestrator.run(&magnet(), Action::WatchNow).await.clone();

    add.assert_async().await;
    select.assert_async().await;
    unrestrict.assert_async().await;
    match state {
        WorkflowState::Done {
            resolution: Resolution::Playable { url, streamable },
        } => {
            assert_eq!(url, "https://cdn.debrid/Movie.mkv");
            assert!(!streamable);
        }
        other => panic!("expected Playable, got {:?}", other),
    }
    assert!(matches!(orchestrator.state(), WorkflowState::Done { .. }));
}

#[tokio::test]
async fn test_watch_now_streamable_uses_streaming_page() {
    let mut server = Server::new_async().await;
    let _add = mock_add_and_select(&mut server).await;
    let _info = server
        .mock("GET", "/torrents/info/T1")
        .with_status(200)
        .with_body(info_body("downloaded", &["https://debrid/dl/1"]))
        .create_async()
        .await;
    let _unrestrict = server
        .mock("POST", "/unrestrict/link")
        .with_status(200)
        .with_body(r#"{"id": "S1", "download": "https://cdn.debrid/Movie.mkv", "streamable": 1}"#)
        .create_async()
        .await;

    let orchestrator = debrid_orchestrator(&server, 5);
    let resolution = orchestrator
        .resolve(&magnet(), &Action::WatchNow)
        .await
        .unwrap();

    match resolution {
        Resolution::Playable { url, streamable } => {
            assert_eq!(url, "https://real-debrid.com/streaming-S1");
            assert!(streamable);
        }
        other => panic!("expected Playable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_watch_now_polls_until_links_appear() {
    let mut server = Server::new_async().await;
    let _add = mock_add_and_select(&mut server).await;
    // first two polls: still downloading; then links
    let pending = server
        .mock("GET", "/torrents/info/T1")
        .with_status(200)
        .with_body(info_body("downloading", &[]))
        .expect(2)
        .create_async()
        .await;
    let ready = server
        .mock("GET", "/torrents/info/T1")
        .with_status(200)
        .with_body(info_body("downloaded", &["https://debrid/dl/1"]))
        .expect(1)
        .create_async()
        .await;
    let _unrestrict = server
        .mock("POST", "/unrestrict/link")
        .with_status(200)
        .with_body(r#"{"id": "S1", "download": "https://cdn.debrid/Movie.mkv", "streamable": 0}"#)
        .create_async()
        .await;

    let orchestrator = debrid_orchestrator(&server, 5);
    let resolution = orchestrator
        .resolve(&magnet(), &Action::WatchNow)
        .await
        .unwrap();

    pending.assert_async().await;
    ready.assert_async().await;
    assert!(matches!(resolution, Resolution::Playable { .. }));
}

#[tokio::test]
async fn test_watch_now_times_out() {
    let mut server = Server::new_async().await;
    let _add = mock_add_and_select(&mut server).await;
    let info = server
        .mock("GET", "/torrents/info/T1")
        .with_status(200)
        .with_body(info_body("queued", &[]))
        .expect(3)
        .create_async()
        .await;

    let mut orchestrator = debrid_orchestrator(&server, 3);
    let state = orchestrator.run(&magnet(), Action::WatchNow).await.clone();

    info.assert_async().await;
    match state {
        WorkflowState::Failed { kind, message, .. } => {
            assert_eq!(kind, "timeout");
            assert!(message.starts_with("watch failed:"), "got {}", message);
        }
        other => panic!("expected Failed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_watch_now_provider_error_stops_polling() {
    let mut server = Server::new_async().await;
    let _add = mock_add_and_select(&mut server).await;
    let info = server
        .mock("GET", "/torrents/info/T1")
        .with_status(200)
        .with_body(info_body("magnet_error", &[]))
        .expect(1)
        .create_async()
        .await;

    let orchestrator = debrid_orchestrator(&server, 5);
    let err = orchestrator
        .resolve(&magnet(), &Action::WatchNow)
        .await
        .unwrap_err();

    info.assert_async().await;
    match err {
        ResolveError::TorrentFailed { id, status } => {
            assert_eq!(id, "T1");
            assert_eq!(status, "magnet_error");
        }
        other => panic!("expected TorrentFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_watch_now_ready_without_links() {
    let mut server = Server::new_async().await;
    let _add = mock_add_and_select(&mut server).await;
    let _info = server
        .mock("GET", "/torrents/info/T1")
        .with_status(200)
        .with_body(info_body("downloaded", &[]))
        .create_async()
        .await;

    let orchestrator = debrid_orchestrator(&server, 5);
    let err = orchestrator
        .resolve(&magnet(), &Action::WatchNow)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "no_links");
    assert!(err.to_string().contains("try again"));
}

#[tokio::test]
async fn test_add_magnet_failure_reports_action_and_body() {
    let mut server = Server::new_async().await;
    let _add = server
        .mock("POST", "/torrents/addMagnet")
        .with_status(503)
        .with_body("service_unavailable")
        .create_async()
        .await;
    let select = server
        .mock("POST", Matcher::Regex("^/torrents/selectFiles/".into()))
        .expect(0)
        .create_async()
        .await;

    let mut orchestrator = debrid_orchestrator(&server, 5);
    let state = orchestrator.run(&magnet(), Action::WatchNow).await.clone();

    // first failure aborts the sequence
    select.assert_async().await;
    match state {
        WorkflowState::Failed {
            action,
            kind,
            message,
        } => {
            assert_eq!(action, "watch");
            assert_eq!(kind, "upstream");
            assert!(message.contains("watch"));
            assert!(message.contains("service_unavailable"));
        }
        other => panic!("expected Failed, got {:?}", other),
    }
}

// =============================================================================
// Add To Debrid
// =============================================================================

#[tokio::test]
async fn test_add_to_debrid_registers_and_selects() {
    let mut server = Server::new_async().await;
    let (add, select) = mock_add_and_select(&mut server).await;
    let info = server
        .mock("GET", "/torrents/info/T1")
        .expect(0)
        .create_async()
        .await;

    let mut orchestrator = debrid_orchestrator(&server, 5);
    let state = orchestrator.run(&magnet(), Action::AddToDebrid).await.clone();

    add.assert_async().await;
    select.assert_async().await;
    // no polling for a plain add
    info.assert_async().await;
    match state {
        WorkflowState::Done {
            resolution: Resolution::AddedToDebrid { id },
        } => assert_eq!(id, "T1"),
        other => panic!("expected AddedToDebrid, got {:?}", other),
    }
}

#[tokio::test]
async fn test_debrid_action_without_client_is_configuration_error() {
    let mut orchestrator = Orchestrator::new(None, None, fast_poll(1));
    let state = orchestrator.run(&magnet(), Action::AddToDebrid).await;

    match state {
        WorkflowState::Failed { kind, message, .. } => {
            assert_eq!(*kind, "configuration");
            assert!(message.starts_with("debrid failed:"));
        }
        other => panic!("expected Failed, got {:?}", other),
    }
}

// =============================================================================
// Download
// =============================================================================

#[tokio::test]
async fn test_download_queues_on_rdt_client() {
    let mut server = Server::new_async().await;
    let _session_check = server
        .mock("GET", "/Api/Authentication/IsLoggedIn")
        .with_status(200)
        .create_async()
        .await;
    let upload = server
        .mock("POST", "/Api/Torrents/UploadMagnet")
        .match_body(Matcher::PartialJson(json!({
            "magnetLink": "magnet:?xt=urn:btih:feedface&dn=Movie",
            "torrent": {"category": "TV Shows"}
        })))
        .with_status(200)
        .create_async()
        .await;

    let downloads = DownloadClient::new(RdtSettings::new(server.url(), "admin", "pw")).unwrap();
    let mut orchestrator = Orchestrator::new(None, Some(downloads), fast_poll(1));
    let action = Action::Download {
        media_type: MediaType::Series,
        task: DownloadTask::default(),
    };
    let state = orchestrator.run(&magnet(), action).await.clone();

    upload.assert_async().await;
    match state {
        WorkflowState::Done {
            resolution: Resolution::Queued { receipt },
        } => {
            assert_eq!(receipt.category, "TV Shows");
            assert_eq!(receipt.media_type, MediaType::Series);
        }
        other => panic!("expected Queued, got {:?}", other),
    }
}

// =============================================================================
// File Preview / Play File
// =============================================================================

#[tokio::test]
async fn test_preview_files_waits_for_file_list() {
    let mut server = Server::new_async().await;
    let _add = mock_add_and_select(&mut server).await;
    let converting = server
        .mock("GET", "/torrents/info/T1")
        .with_status(200)
        .with_body(r#"{"id": "T1", "status": "magnet_conversion", "files": [], "links": []}"#)
        .expect(1)
        .create_async()
        .await;
    let _listed = server
        .mock("GET", "/torrents/info/T1")
        .with_status(200)
        .with_body(info_body("downloading", &[]))
        .create_async()
        .await;

    let orchestrator = debrid_orchestrator(&server, 5);
    let handle = orchestrator.preview_files(&magnet()).await.unwrap();

    converting.assert_async().await;
    assert_eq!(handle.files.len(), 1);
    assert_eq!(handle.files[0].path, "/Movie.2024.1080p.mkv");
}

#[tokio::test]
async fn test_play_file_unrestricts_chosen_link() {
    let mut server = Server::new_async().await;
    let _info = server
        .mock("GET", "/torrents/info/T1")
        .with_status(200)
        .with_body(info_body(
            "downloaded",
            &["https://debrid/dl/1", "https://debrid/dl/2"],
        ))
        .create_async()
        .await;
    let unrestrict = server
        .mock("POST", "/unrestrict/link")
        .match_body(Matcher::UrlEncoded("link".into(), "https://debrid/dl/2".into()))
        .with_status(200)
        .with_body(r#"{"id": "S2", "download": "https://cdn.debrid/E02.mkv", "streamable": 0}"#)
        .create_async()
        .await;

    let orchestrator = debrid_orchestrator(&server, 5);
    let resolution = orchestrator.play_file("T1", 1).await.unwrap();
    unrestrict.assert_async().await;
    assert!(matches!(
        resolution,
        Resolution::Playable { ref url, .. } if url == "https://cdn.debrid/E02.mkv"
    ));

    let err = orchestrator.play_file("T1", 5).await.unwrap_err();
    assert_eq!(err.kind(), "no_links");
}

#[tokio::test]
async fn test_filtered_listing_index_plays_matching_file() {
    let mut server = Server::new_async().await;
    let _add = mock_add_and_select(&mut server).await;
    let _info = server
        .mock("GET", "/torrents/info/T1")
        .with_status(200)
        .with_body(
            json!({
                "id": "T1",
                "status": "downloaded",
                "files": [
                    {"id": 1, "path": "/sample.txt", "bytes": 10, "selected": 1},
                    {"id": 2, "path": "/Movie.mkv", "bytes": 2048, "selected": 1}
                ],
                "links": ["https://debrid/dl/sample", "https://debrid/dl/movie"]
            })
            .to_string(),
        )
        .create_async()
        .await;
    let unrestrict = server
        .mock("POST", "/unrestrict/link")
        .match_body(Matcher::UrlEncoded("link".into(), "https://debrid/dl/movie".into()))
        .with_status(200)
        .with_body(r#"{"id": "S2", "download": "https://cdn.debrid/Movie.mkv", "streamable": 0}"#)
        .create_async()
        .await;

    let orchestrator = debrid_orchestrator(&server, 5);
    let handle = orchestrator.preview_files(&magnet()).await.unwrap();
    let task = DownloadTask {
        include_regex: Some(r"\.mkv$".into()),
        ..Default::default()
    };
    let listed = task.filter().apply(&handle.files);
    assert_eq!(listed.len(), 1);
    let (index, file) = listed[0];
    assert_eq!(file.path, "/Movie.mkv");
    assert_eq!(index, 1);

    let resolution = orchestrator.play_file(&handle.id, index).await.unwrap();
    unrestrict.assert_async().await;
    assert!(matches!(
        resolution,
        Resolution::Playable { ref url, .. } if url == "https://cdn.debrid/Movie.mkv"
    ));
}
