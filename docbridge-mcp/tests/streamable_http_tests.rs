//! HTTP-level tests for session classification, reuse and teardown

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, HeaderValue, Method, Request, StatusCode},
    response::Response,
    Router,
};
use docbridge_mcp::{
    handler_fn, mcp_routes, JsonRpcNotification, McpRouterConfig, McpRouterState, SessionConfig,
    ToolContext, ToolRegistry, ToolsCallResult, DEFAULT_SESSION_HEADER,
};
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tower::ServiceExt;

const NO_LIBRARIES: &str = "No documentation libraries available";

fn tools(calls: Arc<AtomicUsize>) -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(
            "search",
            "Search documentation libraries",
            json!({
                "type": "object",
                "properties": { "libraryName": { "type": "string" } },
                "required": ["libraryName"]
            }),
            handler_fn(move |_args: Value, _ctx: ToolContext| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(ToolsCallResult::text(NO_LIBRARIES))
                }
            }),
        )
        .unwrap()
        .with_tool(
            "explode",
            "Handler that panics",
            json!({ "type": "object" }),
            handler_fn(|_args: Value, _ctx: ToolContext| async move {
                if true {
                    panic!("handler blew up");
                }
                Ok(ToolsCallResult::text("unreachable"))
            }),
        )
        .unwrap()
}

fn test_app_with(config: McpRouterConfig) -> (Router, McpRouterState, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let state = McpRouterState::new(config, tools(Arc::clone(&calls))).unwrap();
    (mcp_routes(state.clone()), state, calls)
}

fn test_app() -> (Router, McpRouterState, Arc<AtomicUsize>) {
    test_app_with(McpRouterConfig::default())
}

fn initialize_body() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": { "name": "test-client", "version": "1.0.0" }
        }
    })
}

fn request(method: Method, session: Option<&str>, body: Option<&Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri("/mcp");
    if let Some(session) = session {
        builder = builder.header(DEFAULT_SESSION_HEADER, session);
    }
    match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn session_header(response: &Response) -> String {
    response
        .headers()
        .get(DEFAULT_SESSION_HEADER)
        .expect("session header")
        .to_str()
        .unwrap()
        .to_string()
}

async fn open_session(app: &Router) -> String {
    let response = send(app, request(Method::POST, None, Some(&initialize_body()))).await;
    assert_eq!(response.status(), StatusCode::OK);
    session_header(&response)
}

#[tokio::test]
async fn test_initialize_opens_session() {
    let (app, state, _) = test_app();

    let response = send(&app, request(Method::POST, None, Some(&initialize_body()))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let session_id = session_header(&response);
    assert_eq!(session_id.len(), 36);

    let body = body_json(response).await;
    assert_eq!(body["id"], json!(1));
    assert_eq!(body["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(body["result"]["serverInfo"]["name"], "docbridge");
    assert!(body["result"]["capabilities"]["tools"].is_object());

    assert_eq!(state.session_count().await, 1);
    assert!(state.sessions().lookup(&session_id).await.is_some());
}

#[tokio::test]
async fn test_tool_call_on_session() {
    let (app, _state, calls) = test_app();
    let session_id = open_session(&app).await;

    let call = json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": { "name": "search", "arguments": { "libraryName": "acme" } }
    });
    let response = send(&app, request(Method::POST, Some(&session_id), Some(&call))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(session_header(&response), session_id);

    let body = body_json(response).await;
    assert_eq!(body["id"], json!(2));
    assert_eq!(body["result"]["content"][0]["text"], NO_LIBRARIES);
    assert_eq!(body["result"]["isError"], json!(false));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_method_never_reaches_handlers() {
    let (app, _state, calls) = test_app();
    let session_id = open_session(&app).await;

    let unknown = json!({ "jsonrpc": "2.0", "id": 3, "method": "doesNotExist" });
    let response = send(&app, request(Method::POST, Some(&session_id), Some(&unknown))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32601);
    assert_eq!(body["id"], json!(3));

    let unknown_tool = json!({
        "jsonrpc": "2.0",
        "id": 4,
        "method": "tools/call",
        "params": { "name": "doesNotExist", "arguments": {} }
    });
    let response = send(&app, request(Method::POST, Some(&session_id), Some(&unknown_tool))).await;
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32601);

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_get_with_unissued_session_is_405() {
    let (app, _state, _) = test_app();

    let response = send(
        &app,
        request(Method::GET, Some("00000000-0000-4000-8000-000000000000"), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = body_json(response).await;
    assert_eq!(body["id"], Value::Null);
    assert_eq!(body["error"]["code"], -32000);
}

#[tokio::test]
async fn test_stale_session_is_rejected_after_delete() {
    let (app, state, calls) = test_app();
    let session_id = open_session(&app).await;

    let response = send(&app, request(Method::DELETE, Some(&session_id), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.session_count().await, 0);

    let call = json!({
        "jsonrpc": "2.0",
        "id": 5,
        "method": "tools/call",
        "params": { "name": "search", "arguments": { "libraryName": "acme" } }
    });
    let response = send(&app, request(Method::POST, Some(&session_id), Some(&call))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32000);
    assert_eq!(body["id"], json!(5));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_second_delete_is_unknown_session() {
    let (app, _state, _) = test_app();
    let session_id = open_session(&app).await;

    let first = send(&app, request(Method::DELETE, Some(&session_id), None)).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = send(&app, request(Method::DELETE, Some(&session_id), None)).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(second).await, "Invalid or missing session ID");
}

#[tokio::test]
async fn test_classification_without_session() {
    let (app, state, _) = test_app();

    let ping = json!({ "jsonrpc": "2.0", "id": 9, "method": "ping" });
    let response = send(&app, request(Method::POST, None, Some(&ping))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32000);
    assert_eq!(
        body["error"]["message"],
        "Bad Request: No valid session ID provided or not an initialization request."
    );
    assert_eq!(body["id"], json!(9));

    let mut no_params = initialize_body();
    no_params.as_object_mut().unwrap().remove("params");
    let response = send(&app, request(Method::POST, None, Some(&no_params))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let garbage = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .body(Body::from("{not json"))
        .unwrap();
    let response = send(&app, garbage).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["id"], Value::Null);

    assert_eq!(state.session_count().await, 0);
}

#[tokio::test]
async fn test_unusable_session_header_is_rejected() {
    let (app, state, _) = test_app();
    let unusable = HeaderValue::from_bytes(b"stale\xe9id").unwrap();

    let response = send(
        &app,
        Request::builder()
            .method(Method::POST)
            .uri("/mcp")
            .header(DEFAULT_SESSION_HEADER, unusable.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(initialize_body().to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(DEFAULT_SESSION_HEADER).is_none());
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32000);
    assert_eq!(body["id"], json!(1));
    assert_eq!(state.session_count().await, 0);

    let response = send(
        &app,
        Request::builder()
            .method(Method::DELETE)
            .uri("/mcp")
            .header(DEFAULT_SESSION_HEADER, unusable)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // an empty header still counts as no session
    let response = send(&app, request(Method::POST, Some(""), Some(&initialize_body()))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.session_count().await, 1);
}

#[tokio::test]
async fn test_missing_session_verb_asymmetry() {
    let (app, _state, _) = test_app();

    let get = send(&app, request(Method::GET, None, None)).await;
    assert_eq!(get.status(), StatusCode::METHOD_NOT_ALLOWED);

    let delete = send(&app, request(Method::DELETE, None, None)).await;
    assert_eq!(delete.status(), StatusCode::BAD_REQUEST);
    assert!(delete
        .headers()
        .get(CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}

#[tokio::test]
async fn test_strict_mode_answers_get_with_400() {
    let (app, _state, _) = test_app_with(McpRouterConfig::default().with_strict_unknown_session(true));

    let get = send(&app, request(Method::GET, None, None)).await;
    assert_eq!(get.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_notification_is_accepted_without_body() {
    let (app, _state, _) = test_app();
    let session_id = open_session(&app).await;

    let initialized = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    let response = send(&app, request(Method::POST, Some(&session_id), Some(&initialized))).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(body_text(response).await.is_empty());
}

#[tokio::test]
async fn test_reinitialize_is_rejected_and_session_survives() {
    let (app, state, _) = test_app();
    let session_id = open_session(&app).await;

    let response = send(
        &app,
        request(Method::POST, Some(&session_id), Some(&initialize_body())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(body["id"], json!(1));

    assert!(state.sessions().lookup(&session_id).await.is_some());
    let ping = json!({ "jsonrpc": "2.0", "id": 2, "method": "ping" });
    let response = send(&app, request(Method::POST, Some(&session_id), Some(&ping))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_undecodable_body_on_session() {
    let (app, _state, _) = test_app();
    let session_id = open_session(&app).await;

    let garbage = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .header(DEFAULT_SESSION_HEADER, session_id.as_str())
        .body(Body::from("{not json"))
        .unwrap();
    let response = send(&app, garbage).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], -32700);

    let not_a_request = json!({ "jsonrpc": "2.0", "id": 7 });
    let response = send(&app, request(Method::POST, Some(&session_id), Some(&not_a_request))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32600);
    assert_eq!(body["id"], json!(7));
}

#[tokio::test]
async fn test_handler_panic_is_500_and_session_stays_open() {
    let (app, _state, _) = test_app();
    let session_id = open_session(&app).await;

    let call = json!({
        "jsonrpc": "2.0",
        "id": 11,
        "method": "tools/call",
        "params": { "name": "explode", "arguments": {} }
    });
    let response = send(&app, request(Method::POST, Some(&session_id), Some(&call))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32603);
    assert_eq!(body["id"], json!(11));
    assert!(!body["error"]["message"].as_str().unwrap().contains("blew up"));

    let ping = json!({ "jsonrpc": "2.0", "id": 12, "method": "ping" });
    let response = send(&app, request(Method::POST, Some(&session_id), Some(&ping))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_session_capacity_is_connection_failure() {
    let config = McpRouterConfig::default().with_session(SessionConfig::default().with_max_sessions(1));
    let (app, state, _) = test_app_with(config);
    open_session(&app).await;

    let response = send(&app, request(Method::POST, None, Some(&initialize_body()))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(DEFAULT_SESSION_HEADER).is_none());
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32001);
    assert_eq!(body["error"]["message"], "Server connection failed");
    assert_eq!(state.session_count().await, 1);
}

#[tokio::test]
async fn test_push_stream_delivers_and_rejects_second_stream() {
    let (app, state, _) = test_app();
    let session_id = open_session(&app).await;

    // queued before any stream exists
    let channel = state.sessions().lookup(&session_id).await.unwrap();
    channel.push(JsonRpcNotification::new(
        "notifications/message",
        Some(json!({ "level": "info", "data": "queued" })),
    ));

    let first = send(&app, request(Method::GET, Some(&session_id), None)).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert!(first
        .headers()
        .get(CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    assert_eq!(session_header(&first), session_id);

    let second = send(&app, request(Method::GET, Some(&session_id), None)).await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(second).await["error"]["code"], -32000);

    let mut frames = first.into_body().into_data_stream();
    let frame = tokio::time::timeout(Duration::from_secs(5), frames.next())
        .await
        .expect("push frame")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.contains("event: message"));
    assert!(text.contains("queued"));

    // client goes away; the session stays open and a new stream may attach
    drop(frames);
    assert!(!channel.has_live_stream());
    let again = send(&app, request(Method::GET, Some(&session_id), None)).await;
    assert_eq!(again.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_delete_ends_push_stream() {
    let (app, _state, _) = test_app();
    let session_id = open_session(&app).await;

    let stream = send(&app, request(Method::GET, Some(&session_id), None)).await;
    assert_eq!(stream.status(), StatusCode::OK);

    let response = send(&app, request(Method::DELETE, Some(&session_id), None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut frames = stream.into_body().into_data_stream();
    let end = tokio::time::timeout(Duration::from_secs(5), frames.next())
        .await
        .expect("stream should end after delete");
    assert!(end.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_on_one_session_keep_their_ids() {
    const CALLS: u64 = 24;

    let (app, state, calls) = test_app();
    let session_id = open_session(&app).await;

    let mut tasks = Vec::new();
    for id in 100..100 + CALLS {
        let app = app.clone();
        let session_id = session_id.clone();
        tasks.push(tokio::spawn(async move {
            let call = json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": "tools/call",
                "params": { "name": "search", "arguments": { "libraryName": format!("lib-{}", id) } }
            });
            let response = send(&app, request(Method::POST, Some(&session_id), Some(&call))).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(session_header(&response), session_id);
            (id, body_json(response).await)
        }));
    }

    for task in tasks {
        let (id, body) = task.await.unwrap();
        assert_eq!(body["id"], json!(id));
        assert_eq!(body["result"]["content"][0]["text"], NO_LIBRARIES);
    }
    assert_eq!(calls.load(Ordering::SeqCst), CALLS as usize);

    let channel = state.sessions().lookup(&session_id).await.unwrap();
    assert_eq!(channel.in_flight(), 0);
    assert_eq!(state.session_count().await, 1);
}

#[tokio::test]
async fn test_sweeper_disabled_by_zero_durations() {
    let session = SessionConfig::default().with_idle_timeout(Duration::ZERO, Duration::ZERO);
    let (_app, state, _) = test_app_with(McpRouterConfig::default().with_session(session));
    assert!(state.spawn_sweeper().is_none());

    let session = SessionConfig::default()
        .with_idle_timeout(Duration::from_secs(60), Duration::from_secs(1));
    let (_app, state, _) = test_app_with(McpRouterConfig::default().with_session(session));
    let sweeper = state.spawn_sweeper().unwrap();
    sweeper.abort();
}

#[tokio::test]
async fn test_distinct_ids_across_handshakes() {
    let (app, state, _) = test_app();
    let mut ids = std::collections::HashSet::new();
    for _ in 0..25 {
        assert!(ids.insert(open_session(&app).await));
    }
    assert_eq!(state.session_count().await, 25);
}
