/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Static file serving for exported frontend builds.
//!
//! Each static deployment gets its own listener on the project port.
//! Hashed assets are immutable for a year; HTML and anything else is
//! revalidated on every request. Unknown paths fall back to the root
//! `index.html` so client-side routers keep working.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use std::path::{Component, Path, PathBuf};
use tokio::task::JoinHandle;

const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";
const NO_CACHE: &str = "no-cache";

const STATIC_EXTENSIONS: [&str; 16] = [
    "js", "css", "woff", "woff2", "ttf", "eot", "svg", "png", "jpg", "jpeg", "gif", "ico",
    "webp", "avif", "mp4", "webm",
];

/// Binds the port and serves `root` until the returned task is aborted.
pub async fn serve_static_site(root: PathBuf, port: i32) -> std::io::Result<JoinHandle<()>> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port as u16)).await?;

    let app = Router::new()
        .route("/", any(handle_request))
        .route("/*path", any(handle_request))
        .with_state(root);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(port, error = %e, "Static server exited");
        }
    });

    Ok(handle)
}

async fn handle_request(State(root): State<PathBuf>, uri: Uri) -> Response {
    let Some(relative) = sanitize_path(uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let mut full_path = root.join(&relative);

    if tokio::fs::metadata(&full_path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        full_path = full_path.join("index.html");
    }

    match tokio::fs::read(&full_path).await {
        Ok(bytes) => serve_bytes(uri.path(), &full_path, bytes),
        Err(_) => {
            // SPA fallback: any unknown route resolves to the root index.
            let index = root.join("index.html");
            match tokio::fs::read(&index).await {
                Ok(bytes) => serve_bytes("/index.html", &index, bytes),
                Err(_) => StatusCode::NOT_FOUND.into_response(),
            }
        }
    }
}

fn serve_bytes(request_path: &str, file_path: &Path, bytes: Vec<u8>) -> Response {
    let cache_control = if is_static_asset(request_path) {
        IMMUTABLE_CACHE
    } else {
        NO_CACHE
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(file_path))
        .header(header::CACHE_CONTROL, cache_control)
        .body(Body::from(bytes))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Normalizes a request path into a repository-relative path, rejecting
/// anything that would escape the root.
pub fn sanitize_path(request_path: &str) -> Option<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');

    if trimmed.is_empty() {
        return Some(PathBuf::from("index.html"));
    }

    let mut clean = PathBuf::new();

    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }

    Some(clean)
}

pub fn is_static_asset(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| STATIC_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "text/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Serving root inside an extracted build: `out/` for exported Next.js,
/// `dist/` for Vite.
pub fn static_root(extract_dir: &Path, framework: entity::project::Framework) -> PathBuf {
    match framework {
        entity::project::Framework::NextJs => extract_dir.join("out"),
        _ => extract_dir.join("dist"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_classification() {
        for asset in [
            "/assets/app.3f9a.js",
            "/styles/main.css",
            "/fonts/inter.woff2",
            "/img/logo.svg",
            "/img/photo.JPEG",
            "/media/intro.mp4",
        ] {
            assert!(is_static_asset(asset), "{} should be immutable", asset);
        }

        for page in ["/", "/index.html", "/about", "/api/data.json"] {
            assert!(!is_static_asset(page), "{} should be no-cache", page);
        }
    }

    #[test]
    fn sanitize_maps_root_to_index() {
        assert_eq!(sanitize_path("/"), Some(PathBuf::from("index.html")));
        assert_eq!(sanitize_path(""), Some(PathBuf::from("index.html")));
    }

    #[test]
    fn sanitize_keeps_normal_paths() {
        assert_eq!(
            sanitize_path("/assets/app.js"),
            Some(PathBuf::from("assets/app.js"))
        );
        assert_eq!(sanitize_path("/about"), Some(PathBuf::from("about")));
    }

    #[test]
    fn sanitize_rejects_traversal() {
        assert_eq!(sanitize_path("/../etc/passwd"), None);
        assert_eq!(sanitize_path("/assets/../../secret"), None);
    }

    #[test]
    fn static_roots_per_framework() {
        use entity::project::Framework;

        let extract = Path::new("/apps/p/builds/b");
        assert_eq!(static_root(extract, Framework::NextJs), extract.join("out"));
        assert_eq!(static_root(extract, Framework::Vite), extract.join("dist"));
    }
}
