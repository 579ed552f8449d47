//! HTTP server implementation using Hyper 1.0
//!
//! Decodes each request into a [`Request`] (query string, headers, JSON body),
//! hands it to the [`App`] and writes back the committed response.
//! - One task per connection, HTTP/1.1 with keep-alive
//! - Body size limit, checked before JSON parsing
//! - Graceful shutdown via signals

use std::convert::Infallible;
use std::future::Future;
use std::net::{AddrParseError, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::StatusCode;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request as HyperRequest, Response as HyperResponse};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::error::{ApiError, ApiResult};
use crate::request::{HttpMethod, Request};
use crate::response::SentResponse;

pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid bind address: {0}")]
    Addr(#[from] AddrParseError),

    #[error("Failed to bind: {0}")]
    Bind(#[from] std::io::Error),
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:3000")
    pub bind_addr: String,
    /// Maximum request body size in bytes (default: 1 MiB)
    pub max_body_size: usize,
    /// Enable request logging
    pub enable_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            enable_logging: true,
        }
    }
}

impl ServerConfig {
    /// Create a new server config with bind address
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            ..Default::default()
        }
    }

    /// Set maximum request body size
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Enable or disable request logging
    pub fn logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }
}

/// Accept connections until `shutdown` resolves.
pub(crate) async fn serve<S>(listener: TcpListener, app: Arc<App>, config: ServerConfig, shutdown: S)
where
    S: Future<Output = ()> + Send + 'static,
{
    let config = Arc::new(config);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote_addr) = match accepted {
                    Ok(conn) => conn,
                    Err(err) => {
                        warn!("Failed to accept connection: {}", err);
                        continue;
                    }
                };

                if let Err(e) = stream.set_nodelay(true) {
                    warn!("Failed to set TCP_NODELAY: {}", e);
                }

                let io = TokioIo::new(stream);
                let app = app.clone();
                let config = config.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        handle_request(req, app.clone(), config.clone(), remote_addr)
                    });

                    if let Err(err) = http1::Builder::new()
                        .keep_alive(true)
                        .serve_connection(io, service)
                        .await
                    {
                        debug!("Error serving connection: {:?}", err);
                    }
                });
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping server");
                break;
            }
        }
    }
}

/// Handle a single HTTP request
async fn handle_request(
    hyper_req: HyperRequest<Incoming>,
    app: Arc<App>,
    config: Arc<ServerConfig>,
    remote_addr: SocketAddr,
) -> Result<HyperResponse<Full<Bytes>>, Infallible> {
    let (parts, body) = hyper_req.into_parts();

    if config.enable_logging {
        info!("{} {} - from {}", parts.method, parts.uri.path(), remote_addr);
    }

    let request = match decode_request(&parts, body, config.max_body_size).await {
        Ok(request) => request,
        Err(err) => {
            warn!("Rejected request: {}", err);
            return Ok(error_response(&err));
        }
    };

    let sent = app.dispatch(request).await;
    Ok(convert_response(sent))
}

async fn decode_request(
    parts: &http::request::Parts,
    body: Incoming,
    max_body_size: usize,
) -> ApiResult<Request> {
    let method = HttpMethod::from_str(parts.method.as_str())
        .map_err(|_| ApiError::NotFound(format!("Cannot {} {}", parts.method, parts.uri.path())))?;

    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let mut request = Request::new(method, target);

    for (name, value) in parts.headers.iter() {
        if let Ok(value) = value.to_str() {
            request
                .headers
                .insert(name.as_str().to_ascii_lowercase(), value.to_string());
        }
    }

    if let Some(declared) = request
        .header("content-length")
        .and_then(|v| v.parse::<usize>().ok())
    {
        if declared > max_body_size {
            return Err(ApiError::PayloadTooLarge {
                size: declared,
                max: max_body_size,
            });
        }
    }

    let bytes = collect_body(body, max_body_size).await?;
    decode_body(&mut request, &bytes)?;
    Ok(request)
}

/// Collect request body with size limit
async fn collect_body(body: Incoming, max_size: usize) -> ApiResult<Bytes> {
    use http_body_util::BodyExt;

    let collected = body
        .collect()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read request body: {}", e)))?;
    let bytes = collected.to_bytes();

    if bytes.len() > max_size {
        return Err(ApiError::PayloadTooLarge {
            size: bytes.len(),
            max: max_size,
        });
    }

    Ok(bytes)
}

/// Parse a JSON body onto `request`. Bodies of other content types are
/// ignored.
pub(crate) fn decode_body(request: &mut Request, bytes: &[u8]) -> ApiResult<()> {
    if bytes.is_empty() {
        return Ok(());
    }

    if !request.is_json() {
        debug!(
            content_type = request.content_type().unwrap_or(""),
            "Ignoring non-JSON request body"
        );
        return Ok(());
    }

    request.body = serde_json::from_slice(bytes)
        .map_err(|err| ApiError::BadRequest(format!("Invalid JSON body: {}", err)))?;
    Ok(())
}

/// Convert a committed response to Hyper format
fn convert_response(sent: SentResponse) -> HyperResponse<Full<Bytes>> {
    let status = StatusCode::from_u16(sent.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let length = sent.body.len();

    let mut builder = HyperResponse::builder().status(status);
    for (name, value) in &sent.headers {
        builder = builder.header(name, value);
    }
    // 204 and 304 carry no body and no length
    let bodiless = matches!(status, StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED);
    if !bodiless && !sent.headers.contains_key("content-length") {
        builder = builder.header(CONTENT_LENGTH, length);
    }

    builder.body(Full::new(sent.body)).unwrap_or_else(|err| {
        error!("Failed to build response: {}", err);
        let mut fallback = HyperResponse::new(Full::new(Bytes::from_static(b"Internal Server Error")));
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

fn error_response(error: &ApiError) -> HyperResponse<Full<Bytes>> {
    let body = Bytes::from(error.to_body().to_string());
    convert_response(SentResponse {
        status: error.status_code(),
        headers: [("content-type".to_string(), "application/json".to_string())].into(),
        body,
    })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
