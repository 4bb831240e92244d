//! HTTP serving: the derivative middleware and the server loop.
//!
//! Originals are served by `tower-http`'s [`ServeDir`] nested under the
//! media prefix. [`serve_derivative`] sits in front of it and intercepts
//! requests that ask for a transformation:
//!
//! ```text
//! GET /uploads/photo.jpg?w=400
//!   → image? transformation requested? original exists?
//!       no  → ServeDir (original bytes, or 404)
//!       yes → cache hit  → cached bytes
//!             cache miss → read original → TransformPool → cache put → bytes
//!   any error → ServeDir (original bytes)
//! ```
//!
//! The middleware never produces an error response of its own. Every failure
//! on the derivative path is logged, counted in [`CacheStats`], and answered
//! with the unmodified original.

use crate::cache::{CacheError, CacheStats, DerivativeCache};
use crate::config::{self, ConfigError, ServerConfig};
use crate::format::{MediaKind, OutputCodec, classify};
use crate::imaging::{RequestLimits, RustBackend, TransformQuery, TransformRequest};
use crate::naming::media_filename;
use crate::process::{ProcessError, TransformPool};
use axum::Router;
use axum::extract::{OriginalUri, Query, Request, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Marks a derivative response as served from the cache (`hit`) or freshly
/// encoded (`miss`).
pub const X_DERIVATIVE_CACHE: HeaderName = HeaderName::from_static("x-derivative-cache");

/// Derivatives are addressed by every parameter that produced them and
/// originals never change, so a response is valid forever.
const IMMUTABLE: &str = "public, max-age=31536000, immutable";

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("{0}")]
    Process(#[from] ProcessError),
    #[error("{0}")]
    Config(#[from] ConfigError),
}

/// Everything a request handler needs, shared by all requests.
#[derive(Clone)]
pub struct MediaState {
    pub cache: DerivativeCache,
    pub pool: TransformPool,
    pub stats: Arc<CacheStats>,
    pub limits: RequestLimits,
    pub originals_dir: PathBuf,
    pub media_prefix: String,
}

impl MediaState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            cache: DerivativeCache::new(&config.storage.cache_dir),
            pool: TransformPool::new(
                RustBackend::new(),
                config::effective_workers(&config.processing),
            ),
            stats: Arc::new(CacheStats::default()),
            limits: config.images.limits(),
            originals_dir: config.storage.originals_dir.clone(),
            media_prefix: config.server.media_prefix.trim_end_matches('/').to_string(),
        }
    }
}

/// Assemble the application router: originals under the media prefix,
/// with the derivative middleware and request tracing in front.
pub fn router(state: MediaState) -> Router {
    let originals = ServeDir::new(&state.originals_dir);
    let prefix = state.media_prefix.clone();

    Router::new()
        .nest_service(&prefix, originals)
        .layer(middleware::from_fn_with_state(state, serve_derivative))
        .layer(TraceLayer::new_for_http())
}

/// Bind, serve until Ctrl-C, and hand back the request statistics.
pub async fn run(config: &ServerConfig) -> Result<Arc<CacheStats>, ServeError> {
    let state = MediaState::new(config);
    state.cache.ensure_dir().await?;
    let stats = Arc::clone(&state.stats);

    let addr = config.server.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        addr = %listener.local_addr()?,
        prefix = %state.media_prefix,
        workers = state.pool.workers(),
        "listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shut down");
    Ok(stats)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
}

/// Middleware entry point. Answers with a derivative when one applies,
/// otherwise passes the request on to the static-file layer.
pub async fn serve_derivative(
    State(state): State<MediaState>,
    request: Request,
    next: Next,
) -> Response {
    // Nested services see a stripped URI; the prefix is part of what we match
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| request.uri().clone());

    match try_serve_derivative(&state, request.method(), &uri).await {
        Ok(Some(response)) => response,
        Ok(None) => next.run(request).await,
        Err(e) => {
            warn!(path = %uri.path(), error = %e, "derivative failed, serving original");
            state.stats.fallback();
            next.run(request).await
        }
    }
}

/// `Ok(None)` means "not ours": no transformation applies to this request.
async fn try_serve_derivative(
    state: &MediaState,
    method: &Method,
    uri: &Uri,
) -> Result<Option<Response>, ServeError> {
    if method != Method::GET && method != Method::HEAD {
        return Ok(None);
    }
    let Some(filename) = media_filename(uri.path(), &state.media_prefix) else {
        return Ok(None);
    };
    if classify(&filename) != MediaKind::Image {
        return Ok(None);
    }

    let query = Query::<TransformQuery>::try_from_uri(uri)
        .map(|Query(q)| q)
        .unwrap_or_default();
    let request = TransformRequest::from_query(&filename, &query, &state.limits);
    if !request.wants_transform(state.limits.default_quality) {
        return Ok(None);
    }

    let original_path = state.originals_dir.join(&*filename);
    match tokio::fs::metadata(&original_path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return Ok(None),
    }

    let key = request.key();
    if let Some(bytes) = state.cache.get(&key).await? {
        debug!(%key, bytes = bytes.len(), "cache hit");
        state.stats.hit();
        let content_type = OutputCodec::sniff(&bytes)
            .map(OutputCodec::content_type)
            .unwrap_or("application/octet-stream");
        return Ok(Some(derivative_response(bytes, content_type, "hit")));
    }

    debug!(%key, "cache miss");
    let original = tokio::fs::read(&original_path).await?;
    let derivative = state.pool.run(original, request).await?;
    state.stats.miss();

    if let Err(e) = state.cache.put(&key, &derivative.bytes).await {
        warn!(%key, error = %e, "could not store derivative");
    }
    info!(
        %key,
        codec = %derivative.codec,
        quality = derivative.quality.value(),
        attempts = derivative.ladder_attempts,
        bytes = derivative.len(),
        "encoded derivative"
    );

    let content_type = derivative.codec.content_type();
    Ok(Some(derivative_response(derivative.bytes, content_type, "miss")))
}

fn derivative_response(
    bytes: Vec<u8>,
    content_type: &'static str,
    cache: &'static str,
) -> Response {
    (
        [
            (CONTENT_TYPE, content_type),
            (CACHE_CONTROL, IMMUTABLE),
            (X_DERIVATIVE_CACHE, cache),
        ],
        bytes,
    )
        .into_response()
}
