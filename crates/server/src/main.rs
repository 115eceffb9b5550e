use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use shared::{
    error::{ProxyErrorBody, RelayError},
    protocol::{BackendBody, DENOISE_ROUTE, IMAGE_FIELD},
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info};

mod config;
mod relay;

use config::{load_settings, normalize_backend_url};
use relay::{BackendReply, RelayContext};

const MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    relay: RelayContext,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let backend_url = normalize_backend_url(&settings.backend_url);
    info!(%backend_url, "forwarding uploads to denoising backend");

    let state = AppState {
        relay: RelayContext::new(backend_url),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "relay listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(DENOISE_ROUTE, post(submit_image))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Accepts a single-field multipart upload, forwards it to the backend, and
/// answers with JSON on every path regardless of what the backend returned.
async fn submit_image(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    match handle_submit(&state.relay, multipart).await {
        Ok(reply) => backend_response(reply),
        Err(err) => error_response(err),
    }
}

async fn handle_submit(
    relay: &RelayContext,
    mut multipart: Multipart,
) -> Result<BackendReply, RelayError> {
    let field = loop {
        let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| RelayError::Upload(e.to_string()))?
        else {
            return Err(RelayError::MissingImage);
        };
        if field.name() == Some(IMAGE_FIELD) {
            break field;
        }
    };

    // A plain text field carries neither a filename nor a content type; only
    // real file parts are forwarded.
    if field.file_name().is_none() && field.content_type().is_none() {
        return Err(RelayError::MissingImage);
    }

    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| RelayError::Upload(e.to_string()))?;

    relay.forward_image(bytes.to_vec(), &content_type).await
}

fn backend_response(reply: BackendReply) -> Response {
    // An unmappable status code degrades to 500, like the transport path.
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match reply.body {
        BackendBody::Json(value) => (status, Json(value)).into_response(),
        BackendBody::Raw(text) => {
            error!(status = status.as_u16(), raw = %text, "backend returned non-JSON body");
            (status, Json(ProxyErrorBody::proxy_error(text))).into_response()
        }
    }
}

fn error_response(err: RelayError) -> Response {
    match err {
        RelayError::MissingImage => {
            (StatusCode::BAD_REQUEST, Json(ProxyErrorBody::no_image())).into_response()
        }
        RelayError::Upload(detail) | RelayError::Transport(detail) => {
            error!(%detail, "relay round trip failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ProxyErrorBody::proxy_error(detail)),
            )
                .into_response()
        }
    }
}
