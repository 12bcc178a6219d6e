use anyhow::{bail, Context, Result};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// The page the game itself lives on; "/" falls back to it when present.
const GAME_PAGE: &str = "heretical-game.html";

pub struct ServeConfig {
    pub root: PathBuf,
    pub port: u16,
}

/// Serve the game directory until Ctrl+C. Every response carries the
/// permissive CORS headers the game page expects and headers disabling
/// client caching.
pub async fn run(config: ServeConfig) -> Result<()> {
    if !config.root.is_dir() {
        bail!("Serve root {} is not a directory", config.root.display());
    }

    let port = config.port;
    let app = router(Arc::new(config));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to port {port}"))?;

    info!("Server running at http://localhost:{port}/{GAME_PAGE}");
    info!("Press Ctrl+C to stop the server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Preview server failed")?;

    info!("Server stopped");
    Ok(())
}

fn router(state: Arc<ServeConfig>) -> Router {
    Router::new()
        .fallback(serve_file)
        .layer(middleware::from_fn(preview_headers))
        .with_state(state)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn preview_headers(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_headers(response.headers_mut());
        return response;
    }
    let mut response = next.run(request).await;
    apply_headers(response.headers_mut());
    response
}

fn apply_headers(headers: &mut HeaderMap) {
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(
        "Cache-Control",
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
}

async fn serve_file(State(config): State<Arc<ServeConfig>>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let rel = uri.path().trim_start_matches('/');
    let path = if rel.is_empty() {
        let game = config.root.join(GAME_PAGE);
        if tokio::fs::try_exists(&game).await.unwrap_or(false) {
            game
        } else {
            config.root.join("index.html")
        }
    } else {
        let decoded = match percent_decode(rel) {
            Some(decoded) => decoded,
            None => return StatusCode::NOT_FOUND.into_response(),
        };
        match resolve(&config.root, &decoded) {
            Some(path) => path,
            None => return StatusCode::NOT_FOUND.into_response(),
        }
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type(&path))], bytes).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

// Browsers send asset names with %XX escapes; decode them before the
// path is resolved. Malformed escapes and non-UTF-8 results are None.
fn percent_decode(rel: &str) -> Option<String> {
    let bytes = rel.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = std::str::from_utf8(bytes.get(i + 1..i + 3)?).ok()?;
            if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return None;
            }
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

// Resolve a decoded request path under the serve root, refusing
// anything that could climb out of it.
fn resolve(root: &Path, rel: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for part in rel.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." || part.contains('\\') {
            return None;
        }
        path.push(part);
    }
    Some(path)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("wasm") => "application/wasm",
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
}
