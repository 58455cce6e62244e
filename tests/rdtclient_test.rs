//! RDT Client Tests
//!
//! Session handling (cookie login, re-login on 401) and the torrent
//! endpoints, against a mock RDT Client. The mock only answers
//! authenticated routes when the request carries the session cookie set by
//! the login endpoint.

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;
use ted::api::rdtclient::{DownloadClient, RdtSettings, SessionManager};
use ted::error::ResolveError;
use ted::models::{DownloadTask, MagnetReference, MediaType};

const SESSION: &str = "session=abc";

fn settings(server: &ServerGuard) -> RdtSettings {
    RdtSettings::new(server.url(), "admin", "hunter2")
}

fn magnet() -> MagnetReference {
    "magnet:?xt=urn:btih:abc123".parse().unwrap()
}

/// Login endpoint that accepts the test credentials and sets the cookie
async fn mock_login(server: &mut ServerGuard, hits: usize) -> Mock {
    server
        .mock("POST", "/Api/Authentication/Login")
        .match_body(Matcher::Json(json!({"username": "admin", "password": "hunter2"})))
        .with_status(200)
        .with_header("set-cookie", "session=abc; Path=/")
        .expect(hits)
        .create_async()
        .await
}

/// Session check: 200 with the cookie, 401 without
async fn mock_is_logged_in(server: &mut ServerGuard) -> (Mock, Mock) {
    let logged_in = server
        .mock("GET", "/Api/Authentication/IsLoggedIn")
        .match_header("cookie", SESSION)
        .with_status(200)
        .create_async()
        .await;
    let logged_out = server
        .mock("GET", "/Api/Authentication/IsLoggedIn")
        .match_header("cookie", Matcher::Missing)
        .with_status(401)
        .create_async()
        .await;
    (logged_in, logged_out)
}

// =============================================================================
// Session Manager
// =============================================================================

#[tokio::test]
async fn test_ensure_authenticated_logs_in_once() {
    let mut server = Server::new_async().await;
    let login = mock_login(&mut server, 1).await;
    let _session_check = mock_is_logged_in(&mut server).await;

    let session = SessionManager::new(&settings(&server)).unwrap();
    assert!(!session.check_login().await);

    session.ensure_authenticated().await.unwrap();
    assert!(session.check_login().await);
    // valid session: no second login
    session.ensure_authenticated().await.unwrap();

    login.assert_async().await;
}

#[tokio::test]
async fn test_rejected_login_is_auth_error() {
    let mut server = Server::new_async().await;
    let _login = server
        .mock("POST", "/Api/Authentication/Login")
        .with_status(400)
        .with_body("Invalid credentials")
        .create_async()
        .await;

    let session = SessionManager::new(&settings(&server)).unwrap();
    let err = session.authenticate().await.unwrap_err();

    match err {
        ResolveError::Auth(msg) => assert!(msg.contains("400"), "got {}", msg),
        other => panic!("expected Auth, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_credentials_is_auth_error() {
    let mut server = Server::new_async().await;
    let login = mock_login(&mut server, 0).await;
    let _session_check = mock_is_logged_in(&mut server).await;

    let mut no_creds = settings(&server);
    no_creds.username = None;
    let client = DownloadClient::new(no_creds).unwrap();

    let err = client
        .add_torrent(&magnet(), MediaType::Movie, &DownloadTask::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::Auth(_)), "got {:?}", err);
    login.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let client = DownloadClient::new(RdtSettings::new("http://127.0.0.1:9", "admin", "pw")).unwrap();
    let err = client.list_torrents().await.unwrap_err();

    assert_eq!(err.kind(), "network");
    assert!(err.to_string().contains("reverse proxy"));
}

// =============================================================================
// Download Client
// =============================================================================

#[tokio::test]
async fn test_add_torrent_defaults_category_by_media_type() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server, 1).await;
    let _session_check = mock_is_logged_in(&mut server).await;

    let upload_series = server
        .mock("POST", "/Api/Torrents/UploadMagnet")
        .match_header("cookie", SESSION)
        .match_body(Matcher::PartialJson(json!({
            "magnetLink": "magnet:?xt=urn:btih:abc123",
            "torrent": {"category": "TV Shows", "downloadAction": 1}
        })))
        .with_status(200)
        .create_async()
        .await;
    let upload_movie = server
        .mock("POST", "/Api/Torrents/UploadMagnet")
        .match_header("cookie", SESSION)
        .match_body(Matcher::PartialJson(json!({"torrent": {"category": "Movies"}})))
        .with_status(200)
        .create_async()
        .await;

    let client = DownloadClient::new(settings(&server)).unwrap();

    let receipt = client
        .add_torrent(&magnet(), MediaType::Series, &DownloadTask::default())
        .await
        .unwrap();
    assert_eq!(receipt.category, "TV Shows");
    assert_eq!(receipt.media_type, MediaType::Series);

    let receipt = client
        .add_torrent(&magnet(), MediaType::Movie, &DownloadTask::default())
        .await
        .unwrap();
    assert_eq!(receipt.category, "Movies");

    upload_series.assert_async().await;
    upload_movie.assert_async().await;
}

#[tokio::test]
async fn test_add_torrent_custom_folder_and_filters() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server, 1).await;
    let _session_check = mock_is_logged_in(&mut server).await;

    let upload = server
        .mock("POST", "/Api/Torrents/UploadMagnet")
        .match_body(Matcher::PartialJson(json!({
            "torrent": {
                "category": "Documentaries",
                "includeRegex": null,
                "excludeRegex": "(?i)sample"
            }
        })))
        .with_status(200)
        .with_body(r#"{"ok": true}"#)
        .create_async()
        .await;

    let client = DownloadClient::new(settings(&server)).unwrap();
    let task = DownloadTask {
        category: "Documentaries".into(),
        include_regex: Some(String::new()),
        exclude_regex: Some("(?i)sample".into()),
    };
    let receipt = client
        .add_torrent(&magnet(), MediaType::Movie, &task)
        .await
        .unwrap();

    upload.assert_async().await;
    assert_eq!(receipt.category, "Documentaries");
    assert_eq!(receipt.response, Some(json!({"ok": true})));
}

#[tokio::test]
async fn test_unauthorized_triggers_one_relogin_and_retry() {
    let mut server = Server::new_async().await;
    // session check says yes, so the first request goes out without a cookie
    let _session_check = server
        .mock("GET", "/Api/Authentication/IsLoggedIn")
        .with_status(200)
        .create_async()
        .await;
    let login = mock_login(&mut server, 1).await;

    let rejected = server
        .mock("GET", "/Api/Torrents")
        .match_header("cookie", Matcher::Missing)
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let accepted = server
        .mock("GET", "/Api/Torrents")
        .match_header("cookie", SESSION)
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;

    let client = DownloadClient::new(settings(&server)).unwrap();
    let torrents = client.list_torrents().await.unwrap();

    assert!(torrents.is_empty());
    login.assert_async().await;
    rejected.assert_async().await;
    accepted.assert_async().await;
}

#[tokio::test]
async fn test_second_unauthorized_is_auth_error() {
    let mut server = Server::new_async().await;
    let _session_check = server
        .mock("GET", "/Api/Authentication/IsLoggedIn")
        .with_status(200)
        .create_async()
        .await;
    let login = mock_login(&mut server, 1).await;
    let torrents = server
        .mock("GET", "/Api/Torrents")
        .with_status(403)
        .expect(2)
        .create_async()
        .await;

    let client = DownloadClient::new(settings(&server)).unwrap();
    let err = client.list_torrents().await.unwrap_err();

    assert!(matches!(err, ResolveError::Auth(_)), "got {:?}", err);
    login.assert_async().await;
    torrents.assert_async().await;
}

#[tokio::test]
async fn test_server_error_is_upstream() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server, 1).await;
    let _session_check = mock_is_logged_in(&mut server).await;
    let _upload = server
        .mock("POST", "/Api/Torrents/UploadMagnet")
        .with_status(500)
        .with_body("Magnet already added")
        .create_async()
        .await;

    let client = DownloadClient::new(settings(&server)).unwrap();
    let err = client
        .add_torrent(&magnet(), MediaType::Movie, &DownloadTask::default())
        .await
        .unwrap_err();

    match err {
        ResolveError::Upstream { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "Magnet already added");
        }
        other => panic!("expected Upstream, got {:?}", other),
    }
}

#[tokio::test]
async fn test_list_torrents_aggregates_progress() {
    let mut server = Server::new_async().await;
    let _login = mock_login(&mut server, 1).await;
    let _session_check = mock_is_logged_in(&mut server).await;
    let _list = server
        .mock("GET", "/Api/Torrents")
        .match_header("cookie", SESSION)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[
            {
                "torrentId": "t1",
                "rdName": "Show.S01.1080p",
                "category": "TV Shows",
                "downloads": [
                    {"bytesDone": 1000, "bytesTotal": 1000, "speed": 0, "downloadFinished": "2024-05-01T10:00:00Z"},
                    {"bytesDone": 500, "bytesTotal": 3000, "speed": 2048.5, "downloadFinished": null}
                ]
            },
            {"torrentId": "t2", "rdName": null, "downloads": null}
        ]"#,
        )
        .create_async()
        .await;

    let client = DownloadClient::new(settings(&server)).unwrap();
    let torrents = client.list_torrents().await.unwrap();

    assert_eq!(torrents.len(), 2);
    let show = &torrents[0];
    assert_eq!(show.name, "Show.S01.1080p");
    assert_eq!(show.category.as_deref(), Some("TV Shows"));
    assert_eq!(show.downloaded_bytes, 1500);
    assert_eq!(show.total_bytes, 4000);
    assert_eq!(show.speed_bytes_per_sec, 2048);
    assert_eq!(show.file_counts.finished, 1);
    assert_eq!(show.file_counts.total, 2);
    assert_eq!(show.progress_percent(), 38);

    assert_eq!(torrents[1].name, "Unknown Torrent");
    assert_eq!(torrents[1].file_counts.total, 0);
}
