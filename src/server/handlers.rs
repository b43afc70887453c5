use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, header};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::OverlayError;
use crate::fetch::HttpFetcher;
use crate::overlay::{FontRegistry, OverlayRenderer};
use crate::settings;

use super::models::{ErrorResponse, RenderRequest};
use super::state::ServerState;

pub const FONT_SIZE_HEADER: &str = "x-overlay-font-size";
pub const TRUNCATED_HEADER: &str = "x-overlay-truncated";

pub async fn run_server(settings: settings::Settings, addr: String) -> Result<()> {
    let registry = if settings.system_fonts {
        FontRegistry::with_system_fonts(&settings.font_dir)
    } else {
        FontRegistry::new(&settings.font_dir)
    };
    let renderer = OverlayRenderer::new(Arc::new(registry), settings.profile());
    let fetcher = HttpFetcher::new().with_context(|| "failed to create image fetcher")?;
    let state = ServerState::new(renderer, Arc::new(fetcher), settings.api_key.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!("listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub fn router(state: ServerState) -> Router {
    let state = Arc::new(state);
    Router::new()
        .route("/health", get(health))
        .route("/render", post(render))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization,x-api-key"),
    );
    headers.insert(
        "access-control-expose-headers",
        HeaderValue::from_static("x-overlay-font-size,x-overlay-truncated"),
    );
}

async fn auth_middleware(
    State(state): State<Arc<ServerState>>,
    req: Request<Body>,
    next: Next,
) -> Response<Body> {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(req).await;
    };
    if req.uri().path() == "/health" || is_authorized(req.headers(), expected) {
        return next.run(req).await;
    }
    warn!("rejected unauthenticated request to {}", req.uri().path());
    ServerError::new(StatusCode::UNAUTHORIZED, "unauthorized", "missing or invalid API key")
        .into_response()
}

pub(crate) fn is_authorized(headers: &HeaderMap, expected: &str) -> bool {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);
    let api_key = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .map(str::trim);
    bearer == Some(expected) || api_key == Some(expected)
}

#[derive(Debug)]
pub(crate) struct ServerError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ServerError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }
}

impl From<OverlayError> for ServerError {
    fn from(err: OverlayError) -> Self {
        let status = match &err {
            OverlayError::UnknownFontFamily(_) => StatusCode::BAD_REQUEST,
            OverlayError::FontFileUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            OverlayError::FetchFailed(_) => StatusCode::BAD_GATEWAY,
            OverlayError::DecodeFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            OverlayError::RenderFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.kind(), err.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                kind: self.kind.to_string(),
            }),
        )
            .into_response()
    }
}

async fn render(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<Response<Body>, ServerError> {
    let Json(payload) = payload.map_err(|err| ServerError::invalid_request(err.body_text()))?;
    let request = payload.validate().map_err(ServerError::invalid_request)?;

    let image_bytes = state.fetcher.fetch_bytes(&request.image_url).await?;

    let renderer = state.renderer.clone();
    let rendered = tokio::task::spawn_blocking(move || {
        renderer.render_overlay(&image_bytes, &request.text, &request.style)
    })
    .await
    .map_err(|err| {
        ServerError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "render_failed",
            format!("server task failed: {}", err),
        )
    })??;

    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static("image/png"))],
        rendered.png,
    )
        .into_response();
    let headers = response.headers_mut();
    headers.insert(
        FONT_SIZE_HEADER,
        HeaderValue::from(rendered.layout.font_size),
    );
    if rendered.layout.is_truncated() {
        headers.insert(TRUNCATED_HEADER, HeaderValue::from_static("true"));
    }
    Ok(response)
}
