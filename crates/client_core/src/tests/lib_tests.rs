use super::*;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use axum::{
    body::Body,
    extract::{Multipart, State},
    http::header,
    response::Response,
    routing::post,
    Router,
};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
struct CapturedPart {
    field: String,
    filename: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

#[derive(Clone)]
struct RelayState {
    hits: Arc<AtomicUsize>,
    captured: Arc<Mutex<Vec<CapturedPart>>>,
    reply_status: u16,
    reply_content_type: &'static str,
    reply_body: &'static str,
}

async fn relay_handler(State(state): State<RelayState>, mut multipart: Multipart) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.expect("relay field") {
        parts.push(CapturedPart {
            field: field.name().unwrap_or_default().to_string(),
            filename: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            bytes: field.bytes().await.expect("relay bytes").to_vec(),
        });
    }
    *state.captured.lock().await = parts;

    Response::builder()
        .status(state.reply_status)
        .header(header::CONTENT_TYPE, state.reply_content_type)
        .body(Body::from(state.reply_body))
        .expect("relay response")
}

async fn spawn_relay(
    reply_status: u16,
    reply_content_type: &'static str,
    reply_body: &'static str,
) -> (String, RelayState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = RelayState {
        hits: Arc::new(AtomicUsize::new(0)),
        captured: Arc::new(Mutex::new(Vec::new())),
        reply_status,
        reply_content_type,
        reply_body,
    };
    let app = Router::new()
        .route(DENOISE_ROUTE, post(relay_handler))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

fn staged_candidate() -> UploadCandidate {
    UploadCandidate::new(b"noisy-bytes".to_vec(), "image/jpeg", "face.jpg")
}

#[tokio::test]
async fn select_then_submit_resolves_with_data_uri() {
    let (relay_url, relay) =
        spawn_relay(200, "application/json", r#"{"image_base64":"Zm9v"}"#).await;
    let mut session = UploadSession::new(relay_url);

    session.select_files(vec![staged_candidate()]);
    assert!(matches!(session.state(), SessionState::FileStaged { .. }));
    assert!(session.can_submit());

    session.submit().await;

    assert!(!session.is_submitting());
    assert_eq!(session.result_image(), Some("data:image/png;base64,Zm9v"));
    assert_eq!(session.error_message(), None);

    let captured = relay.captured.lock().await;
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].field, "image");
    assert_eq!(captured[0].filename.as_deref(), Some("face.jpg"));
    assert_eq!(captured[0].content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(captured[0].bytes, b"noisy-bytes");
}

#[tokio::test]
async fn failure_message_embeds_status_and_body() {
    let (relay_url, _relay) = spawn_relay(500, "text/plain", "internal error").await;
    let mut session = UploadSession::new(relay_url);

    session.select_files(vec![staged_candidate()]);
    session.submit().await;

    assert!(!session.is_submitting());
    let message = session.error_message().expect("failed state");
    assert!(message.contains("500"), "missing status in: {message}");
    assert!(
        message.contains("internal error"),
        "missing body text in: {message}"
    );
}

#[tokio::test]
async fn transport_failure_settles_into_failed() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    // Bind then drop so the port is known to refuse connections.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let mut session = UploadSession::new(format!("http://{addr}"));
    session.select_files(vec![staged_candidate()]);
    session.submit().await;

    assert!(!session.is_submitting(), "in-flight flag must clear on error");
    let message = session.error_message().expect("failed state");
    assert!(!message.trim().is_empty());
}

#[tokio::test]
async fn malformed_success_body_settles_into_failed() {
    let (relay_url, _relay) = spawn_relay(200, "text/plain", "not json at all").await;
    let mut session = UploadSession::new(relay_url);

    session.select_files(vec![staged_candidate()]);
    session.submit().await;

    assert!(!session.is_submitting());
    assert!(session.error_message().is_some());
    assert_eq!(session.result_image(), None);
}

#[tokio::test]
async fn submit_without_staged_file_is_inert() {
    let (relay_url, relay) =
        spawn_relay(200, "application/json", r#"{"image_base64":"Zm9v"}"#).await;
    let mut session = UploadSession::new(relay_url);

    assert!(!session.can_submit());
    session.submit().await;

    assert_eq!(*session.state(), SessionState::Idle);
    assert_eq!(relay.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn resubmitting_the_same_file_makes_independent_relay_calls() {
    let (relay_url, relay) =
        spawn_relay(200, "application/json", r#"{"image_base64":"Zm9v"}"#).await;
    let mut session = UploadSession::new(relay_url);

    session.select_files(vec![staged_candidate()]);
    session.submit().await;
    assert!(session.can_submit(), "resolved session keeps its staged file");
    session.submit().await;

    assert_eq!(relay.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn selecting_a_new_file_clears_previous_result() {
    let (relay_url, _relay) =
        spawn_relay(200, "application/json", r#"{"image_base64":"Zm9v"}"#).await;
    let mut session = UploadSession::new(relay_url);

    session.select_files(vec![staged_candidate()]);
    session.submit().await;
    assert!(session.result_image().is_some());

    session.select_files(vec![UploadCandidate::new(
        b"other-bytes".to_vec(),
        "image/png",
        "other.png",
    )]);

    assert!(matches!(session.state(), SessionState::FileStaged { .. }));
    assert_eq!(session.result_image(), None);
    assert_eq!(session.error_message(), None);
    assert_eq!(
        session.staged_file().map(|f| f.display_name.as_str()),
        Some("other.png")
    );
}

#[tokio::test]
async fn multi_file_drop_behaves_like_single_file_drop_of_the_first() {
    let mut session = UploadSession::new("http://127.0.0.1:1");
    session.drag_entered();

    session.drop_files(vec![
        staged_candidate(),
        UploadCandidate::new(b"second".to_vec(), "image/png", "second.png"),
    ]);

    assert!(!session.drag_active(), "drop must clear the drag flag");
    assert_eq!(
        session.staged_file().map(|f| f.display_name.as_str()),
        Some("face.jpg")
    );
}

#[tokio::test]
async fn drag_flag_follows_enter_over_leave() {
    let mut session = UploadSession::new("http://127.0.0.1:1");

    assert!(!session.drag_active());
    session.drag_entered();
    assert!(session.drag_active());
    session.drag_over();
    assert!(session.drag_active());
    session.drag_left();
    assert!(!session.drag_active());
}

#[tokio::test]
async fn result_png_bytes_decodes_the_resolved_image() {
    let (relay_url, _relay) =
        spawn_relay(200, "application/json", r#"{"image_base64":"Zm9v"}"#).await;
    let mut session = UploadSession::new(relay_url);

    assert_eq!(session.result_png_bytes().expect("decode"), None);

    session.select_files(vec![staged_candidate()]);
    session.submit().await;

    assert_eq!(
        session.result_png_bytes().expect("decode"),
        Some(b"foo".to_vec())
    );
}
