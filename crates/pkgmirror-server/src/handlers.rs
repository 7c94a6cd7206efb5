//! Route handlers implementing the HTTP surface of spec.md §6.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use pkgmirror_core::error::PkgError;
use pkgmirror_core::RepoPath;
use pkgmirror_download::DownloadReader;
use tracing::warn;

use crate::error::HttpError;
use crate::state::AppState;
use crate::stream::{parse_range, range_stream, reader_total_size};

/// `GET /<matched-file>`: serve from cache, falling back to the repository
/// database and finally to an upstream passthrough.
pub async fn get_file(State(state): State<AppState>, Path(path): Path<String>, headers: HeaderMap) -> Response {
    match state.cache.get_packet(&path).await {
        Ok(reader) => return serve_reader(reader, &headers),
        Err(PkgError::InvalidFilename { .. }) => {}
        Err(err) => return HttpError::from(err).into_response(),
    }

    let repo_path = RepoPath::new(dir(&path));
    match state.cache.get_db_file(&repo_path).await {
        Ok((reader, _mtime)) => return serve_reader(reader, &headers),
        Err(err) => {
            warn!(repo = %repo_path, error = %err, "database not cached, proxying to upstream");
        }
    }

    proxy_repo(&state, repo_path.as_str(), &headers).await
}

/// `HEAD /<matched-file>?bg`: enqueue a background pre-warm and return 200
/// immediately, without waiting for it to finish.
pub async fn head_bg(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> StatusCode {
    if params.contains_key("bg") {
        let cache = state.cache.clone();
        tokio::spawn(async move { cache.add_packet(&path).await });
    }
    StatusCode::OK
}

fn serve_reader(reader: DownloadReader, headers: &HeaderMap) -> Response {
    let total_size = match reader_total_size(&reader) {
        Ok(size) => size,
        Err(err) => return HttpError::from(PkgError::io(std::path::PathBuf::new(), err)).into_response(),
    };

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range);

    let (status, start, end) = match range {
        Some((start, end)) if start < total_size => {
            let end = end.map_or(total_size, |e| (e + 1).min(total_size));
            (StatusCode::PARTIAL_CONTENT, start, end)
        }
        Some(_) => return StatusCode::RANGE_NOT_SATISFIABLE.into_response(),
        None => (StatusCode::OK, 0, total_size),
    };

    let body = Body::from_stream(range_stream(reader, start, end));

    let mut builder = Response::builder()
        .status(status)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, (end - start).to_string());

    if status == StatusCode::PARTIAL_CONTENT {
        builder = builder.header(
            header::CONTENT_RANGE,
            format!("bytes {start}-{}/{total_size}", end.saturating_sub(1)),
        );
    }

    builder
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Proxies the client's request to the first responsive upstream without
/// caching the response. Used when the repository database itself isn't
/// cached yet.
async fn proxy_repo(state: &AppState, repo_path: &str, headers: &HeaderMap) -> Response {
    let upstream_urls = match state.router.match_path(repo_path) {
        Ok(m) => m.upstream_urls,
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    };

    for url in &upstream_urls {
        let mut req = state.http_client.get(url);
        for (name, value) in headers {
            if name == header::HOST {
                continue;
            }
            req = req.header(name, value);
        }

        let response = match req.send().await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(url, error = %err, "upstream unreachable during proxy passthrough");
                continue;
            }
        };

        if !(response.status().is_success() || response.status() == StatusCode::NOT_MODIFIED) {
            continue;
        }

        let status = response.status();
        let mut builder = Response::builder().status(status);
        for (name, value) in response.headers() {
            builder = builder.header(name, value);
        }
        let body = Body::from_stream(response.bytes_stream());
        return builder
            .body(body)
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response());
    }

    StatusCode::NOT_FOUND.into_response()
}

/// The directory component of a slash-separated path, mirroring `path.Dir`.
fn dir(path: &str) -> &str {
    path.trim_end_matches('/').rsplit_once('/').map_or("", |(d, _)| d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_strips_trailing_filename() {
        assert_eq!(dir("core/os/x86_64/acl-1.0-1-x86_64.pkg.tar.xz"), "core/os/x86_64");
    }

    #[test]
    fn dir_of_bare_segment_is_empty() {
        assert_eq!(dir("core"), "");
    }
}
