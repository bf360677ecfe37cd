use std::sync::Arc;

use jfr_client::{
    BackendConfig, ClientError, MonotonicIds, SharedSession, Target,
};
use jfr_operator::controller::ReconcileErr;
use jfr_operator::controller::lifecycle::{Mutation, run_cycle};
use jfr_operator::crd::{RecordingSpec, RecordingState, RecordingStatus};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string, body_string_contains, method, path},
};

const TOKEN: &str = "operator-sa-token";
const RECORDINGS: &str = "/api/v1/targets/10.0.0.7%3A9091/recordings";
const DOWNLOAD_URL: &str =
    "https://jfr/api/v1/recordings/saved-test-recording.jfr";

fn session(server: &MockServer) -> SharedSession {
    SharedSession::new(
        BackendConfig::new(server.uri()).with_token(TOKEN),
        Arc::new(MonotonicIds::new()),
        CancellationToken::new(),
    )
}

async fn mount_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/clienturl"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "clientUrl": server.uri() })),
        )
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, state: &str) {
    Mock::given(method("GET"))
        .and(path(RECORDINGS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 3,
            "name": "test-recording",
            "state": state,
            "startTime": 1_600_000_000_000i64,
            "duration": 30000
        }])))
        .mount(server)
        .await;
}

fn spec(archive: bool) -> RecordingSpec {
    RecordingSpec {
        name: "test-recording".into(),
        event_options: vec![
            "jdk.socketRead:enabled=true".into(),
            "jdk.socketWrite:enabled=true".into(),
        ],
        duration: Some("30s".into()),
        archive,
        ..Default::default()
    }
}

fn target() -> Target {
    Target::new("10.0.0.7", 9091)
}

#[test_log::test(tokio::test)]
async fn new_recording_is_dumped_over_http() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path(RECORDINGS))
        .and(body_string_contains("recordingName=test-recording"))
        .and(body_string_contains("duration=30"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    mount_listing(&server, "RUNNING").await;

    let session = session(&server);
    let mut guard = session.acquire().await.unwrap();
    let out = run_cycle(guard.channel().unwrap(), &target(), &spec(false), None)
        .await
        .unwrap();

    assert_eq!(out.mutations, vec![Mutation::Dumped { seconds: 30 }]);
    assert_eq!(out.status.state, Some(RecordingState::Running));
    assert_eq!(out.status.duration.as_deref(), Some("30s"));
}

#[test_log::test(tokio::test)]
async fn stopped_recording_is_archived_over_http() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_listing(&server, "STOPPED").await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/test-recording", RECORDINGS)))
        .and(body_string("save"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("saved-test-recording.jfr"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/recordings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "name": "saved-test-recording.jfr",
            "downloadUrl": DOWNLOAD_URL,
            "reportUrl": "https://jfr/api/v1/reports/saved-test-recording.jfr"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let current = RecordingStatus {
        state: Some(RecordingState::Stopped),
        ..Default::default()
    };
    let session = session(&server);
    let mut guard = session.acquire().await.unwrap();
    let out = run_cycle(
        guard.channel().unwrap(),
        &target(),
        &spec(true),
        Some(&current),
    )
    .await
    .unwrap();

    assert_eq!(
        out.status.download_url.as_deref(),
        Some(DOWNLOAD_URL)
    );
    assert_eq!(
        out.mutations,
        vec![Mutation::Saved {
            filename: "saved-test-recording.jfr".into()
        }]
    );
}

#[test_log::test(tokio::test)]
async fn backend_refusal_aborts_but_keeps_session() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path(RECORDINGS))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_string("recording already exists"),
        )
        .mount(&server)
        .await;

    let session = session(&server);
    {
        let mut guard = session.acquire().await.unwrap();
        let err =
            run_cycle(guard.channel().unwrap(), &target(), &spec(false), None)
                .await
                .unwrap_err();
        let e = match err {
            ReconcileErr::Client(e) => e,
            other => panic!("expected a client error, got {other:?}"),
        };
        assert!(matches!(
            e,
            ClientError::Application { status: -409, .. }
        ));
        guard.settle(&e).await;
    }
    assert!(session.is_connected().await);
}
