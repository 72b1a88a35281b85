use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Router,
};
use bucketd_http::{
    BucketdClient, BucketdError, ClientOptions, ErrorKind, ListParams, RequestContext,
    REQUEST_UIDS_HEADER,
};

/// Endpoints that refuse connections; nothing listens on these ports.
const DEAD_1: &str = "127.0.0.1:1";
const DEAD_2: &str = "127.0.0.1:2";

#[derive(Clone, Debug)]
struct RecordedCall {
    method: String,
    target: String,
    uids: Option<String>,
    content_type: Option<String>,
    content_length: Option<String>,
    body: Vec<u8>,
}

#[derive(Clone)]
struct MockState {
    responses: Arc<Mutex<VecDeque<(StatusCode, String)>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

async fn record_call(State(state): State<MockState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
    };
    state
        .calls
        .lock()
        .expect("call log mutex must not be poisoned")
        .push(RecordedCall {
            method: parts.method.to_string(),
            target: parts
                .uri
                .path_and_query()
                .map(|pq| pq.to_string())
                .unwrap_or_default(),
            uids: header(REQUEST_UIDS_HEADER),
            content_type: header("content-type"),
            content_length: header("content-length"),
            body: bytes.to_vec(),
        });
    let (status, body) = state
        .responses
        .lock()
        .expect("response queue mutex must not be poisoned")
        .pop_front()
        .unwrap_or((StatusCode::OK, "{}".to_owned()));
    if status.is_redirection() {
        // For scripted 3xx responses the body doubles as the Location.
        return (status, [("location", body)], "").into_response();
    }
    (status, body).into_response()
}

struct TestServer {
    address: String,
    state: MockState,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn hits(&self) -> usize {
        self.state
            .calls
            .lock()
            .expect("call log mutex must not be poisoned")
            .len()
    }

    fn calls(&self) -> Vec<RecordedCall> {
        self.state
            .calls
            .lock()
            .expect("call log mutex must not be poisoned")
            .clone()
    }
}

async fn spawn_server(responses: Vec<(StatusCode, &str)>) -> TestServer {
    let state = MockState {
        responses: Arc::new(Mutex::new(
            responses
                .into_iter()
                .map(|(status, body)| (status, body.to_owned()))
                .collect(),
        )),
        calls: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new().fallback(record_call).with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server must run");
    });

    TestServer {
        address: format!("127.0.0.1:{}", address.port()),
        state,
        task,
    }
}

#[tokio::test]
async fn create_bucket_succeeds_without_rotation() {
    let server = spawn_server(vec![(StatusCode::OK, "{}")]).await;
    let client = BucketdClient::new_ordered(&[server.address.clone()]).expect("client must build");
    let ctx = RequestContext::new();

    client
        .create_bucket("journal", r#"{"owner":"svc-ingest"}"#, &ctx)
        .await
        .expect("create must succeed");

    let calls = server.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, "POST");
    assert_eq!(calls[0].target, "/default/bucket/journal");
    assert_eq!(
        calls[0].content_type.as_deref(),
        Some("application/octet-stream")
    );
    assert_eq!(
        calls[0].content_length.as_deref(),
        Some(r#"{"owner":"svc-ingest"}"#.len().to_string().as_str())
    );
    assert_eq!(calls[0].body, br#"{"owner":"svc-ingest"}"#.to_vec());
}

#[tokio::test]
async fn expected_error_does_not_fail_over() {
    let primary = spawn_server(vec![(StatusCode::CONFLICT, "BucketAlreadyExists")]).await;
    let fallback = spawn_server(vec![]).await;
    let client =
        BucketdClient::new_ordered(&[primary.address.clone(), fallback.address.clone()])
            .expect("client must build");
    let ctx = RequestContext::new();

    let err = client
        .create_bucket("journal", "{}", &ctx)
        .await
        .expect_err("create must report the conflict");

    assert_eq!(err.kind(), Some(ErrorKind::BucketAlreadyExists));
    assert!(err.is_expected());
    assert_eq!(primary.hits(), 1);
    assert_eq!(fallback.hits(), 0);
}

#[tokio::test]
async fn transport_error_surfaces_after_every_endpoint() {
    let client =
        BucketdClient::new_ordered(&[DEAD_1, DEAD_2, "127.0.0.1:3"]).expect("client must build");
    let ctx = RequestContext::new();

    let err = client
        .get_bucket_attributes("journal", &ctx)
        .await
        .expect_err("all endpoints are dead");

    match err {
        BucketdError::Transport { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn failover_reaches_live_host_and_head_sticks() {
    let server = spawn_server(vec![
        (StatusCode::OK, r#"{"status":"alive"}"#),
        (StatusCode::OK, r#"{"status":"alive"}"#),
    ])
    .await;
    let client = BucketdClient::new_ordered(&[DEAD_1, DEAD_2, server.address.as_str()])
        .expect("client must build");
    let ctx = RequestContext::new();

    let body = client
        .get_bucket_attributes("journal", &ctx)
        .await
        .expect("third endpoint is alive");
    assert_eq!(body, br#"{"status":"alive"}"#.to_vec());
    assert_eq!(server.hits(), 1);

    // The rotation head stays on the live host: the next call hits it
    // directly instead of walking the dead endpoints again.
    client
        .get_bucket_attributes("journal", &RequestContext::new())
        .await
        .expect("head must point at the live endpoint");
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn object_key_with_separator_round_trips() {
    let server = spawn_server(vec![(StatusCode::OK, "{}"), (StatusCode::OK, "v1")]).await;
    let client = BucketdClient::new_ordered(&[server.address.clone()]).expect("client must build");

    client
        .put_object("b", "a/b", b"v1", &RequestContext::new())
        .await
        .expect("put must succeed");
    let value = client
        .get_object("b", "a/b", &RequestContext::new())
        .await
        .expect("get must succeed");

    assert_eq!(value, b"v1".to_vec());
    let calls = server.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].target, "/default/bucket/b/a%2Fb");
    assert_eq!(calls[1].target, calls[0].target);
    assert_eq!(calls[0].method, "POST");
    assert_eq!(calls[1].method, "GET");
}

#[tokio::test]
async fn list_filters_are_forwarded_verbatim() {
    let server = spawn_server(vec![(StatusCode::OK, "[]")]).await;
    let client = BucketdClient::new_ordered(&[server.address.clone()]).expect("client must build");

    let params = ListParams::new()
        .prefix("logs")
        .marker("m42")
        .max_keys(50)
        .param("newFilter", "x");
    client
        .list_object("journal", &params, &RequestContext::new())
        .await
        .expect("list must succeed");

    let calls = server.calls();
    assert_eq!(
        calls[0].target,
        "/default/bucket/journal?prefix=logs&marker=m42&maxKeys=50&newFilter=x"
    );
}

#[tokio::test]
async fn correlation_uid_is_stable_across_retries() {
    let server = spawn_server(vec![(StatusCode::OK, "{}")]).await;
    let client = BucketdClient::new_ordered(&[DEAD_1, server.address.as_str()])
        .expect("client must build");
    let ctx = RequestContext::with_uid("req-uid-42");

    client
        .get_bucket_attributes("journal", &ctx)
        .await
        .expect("second endpoint is alive");

    let calls = server.calls();
    assert_eq!(calls[0].uids.as_deref(), Some("req-uid-42"));
}

#[tokio::test]
async fn raft_log_request_assembles_query() {
    let server = spawn_server(vec![(StatusCode::OK, "{}")]).await;
    let client = BucketdClient::new_ordered(&[server.address.clone()]).expect("client must build");

    client
        .get_raft_log("1", Some(1), Some(128), true, &RequestContext::new())
        .await
        .expect("raft log fetch must succeed");

    let calls = server.calls();
    assert_eq!(
        calls[0].target,
        "/_/raft_sessions/1/log?begin=1&limit=128&targetLeader=true"
    );
}

#[tokio::test]
async fn health_and_live_checks_use_admin_paths() {
    let server = spawn_server(vec![(StatusCode::OK, "{}"), (StatusCode::OK, "{}")]).await;
    let client = BucketdClient::new_ordered(&[server.address.clone()]).expect("client must build");

    client
        .healthcheck(&RequestContext::new())
        .await
        .expect("healthcheck must succeed");
    client
        .livecheck(&RequestContext::new())
        .await
        .expect("livecheck must succeed");

    let calls = server.calls();
    assert_eq!(calls[0].method, "GET");
    assert_eq!(calls[0].target, "/_/healthcheck");
    assert_eq!(calls[1].method, "POST");
    assert_eq!(calls[1].target, "/_/livecheck");
}

#[tokio::test]
async fn error_name_in_json_body_maps_to_domain_kind() {
    let server = spawn_server(vec![(
        StatusCode::NOT_FOUND,
        r#"{"code":"DBNotFound","message":"database does not exist"}"#,
    )])
    .await;
    let client = BucketdClient::new_ordered(&[server.address.clone()]).expect("client must build");

    let err = client
        .get_bucket_attributes("missing", &RequestContext::new())
        .await
        .expect_err("lookup must fail");

    assert_eq!(err.kind(), Some(ErrorKind::NoSuchBucket));
    assert!(err.is_expected());
    match err {
        BucketdError::Api { status, .. } => assert_eq!(status, 404),
        other => panic!("expected api error, got {other:?}"),
    }
}

/// Accepts connections and then never answers, so an attempt against it
/// can only end by timing out.
async fn spawn_stalled_listener() -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind stalled listener");
    let address = format!(
        "127.0.0.1:{}",
        listener.local_addr().expect("must have local addr").port()
    );
    let task = tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            if let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        }
    });
    (address, task)
}

#[tokio::test]
async fn redirect_status_is_classified_not_followed() {
    let target = spawn_server(vec![(StatusCode::OK, "followed")]).await;
    // The mock hands the scripted body back as the Location header.
    let location = format!("http://{}/default/attributes/journal", target.address);
    let origin = spawn_server(vec![(StatusCode::FOUND, location.as_str())]).await;
    let client = BucketdClient::new_ordered(&[origin.address.clone()]).expect("client must build");

    let err = client
        .get_bucket_attributes("journal", &RequestContext::new())
        .await
        .expect_err("redirect must surface as a status error");

    match err {
        BucketdError::Api { status, kind, .. } => {
            assert_eq!(status, 302);
            assert_eq!(kind, ErrorKind::InternalError);
        }
        other => panic!("expected api error, got {other:?}"),
    }
    assert_eq!(origin.hits(), 1);
    assert_eq!(target.hits(), 0);
}

#[tokio::test]
async fn attempt_timeout_is_a_transport_failure_that_rotates() {
    let (stalled, holder) = spawn_stalled_listener().await;
    let live = spawn_server(vec![(StatusCode::OK, "{}")]).await;
    let client = BucketdClient::new_ordered(&[stalled.as_str(), live.address.as_str()])
        .expect("client must build")
        .with_options(ClientOptions {
            request_timeout_ms: 200,
            operation_timeout_ms: None,
        });

    client
        .get_bucket_attributes("journal", &RequestContext::new())
        .await
        .expect("second endpoint must answer after the first stalls");

    assert_eq!(live.hits(), 1);
    holder.abort();
}

#[tokio::test]
async fn operation_deadline_bounds_a_stalled_call() {
    let (stalled, holder) = spawn_stalled_listener().await;
    let client = BucketdClient::new_ordered(&[stalled.as_str()])
        .expect("client must build")
        .with_options(ClientOptions {
            request_timeout_ms: 10_000,
            operation_timeout_ms: Some(300),
        });

    let err = client
        .get_bucket_attributes("journal", &RequestContext::new())
        .await
        .expect_err("deadline must cut the stalled call short");

    match err {
        BucketdError::OperationTimeout { timeout_ms } => assert_eq!(timeout_ms, 300),
        other => panic!("expected operation timeout, got {other:?}"),
    }
    holder.abort();
}

#[tokio::test]
async fn validation_error_is_synchronous_and_offline() {
    let server = spawn_server(vec![]).await;
    let client = BucketdClient::new_ordered(&[server.address.clone()]).expect("client must build");

    let err = client
        .put_object("journal", "", b"v", &RequestContext::new())
        .await
        .expect_err("empty key must be rejected");

    assert!(matches!(err, BucketdError::Validation(_)));
    assert_eq!(server.hits(), 0);
}
