//! End-to-end scenarios from spec.md §8 ("Testable properties"), driven
//! against a real fake upstream mirror the way `gglib-axum`'s own
//! integration tests boot a real listener instead of mocking at the
//! transport layer.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{read_all_blocking, spawn_upstream, test_router, test_router_multi_upstream, MockResponse};
use pkgmirror_cache::CacheRegistry;
use pkgmirror_core::error::PkgError;
use pkgmirror_core::RepoPath;
use pkgmirror_download::DownloadManager;
use reqwest::Client;
use tempfile::TempDir;

fn http_client() -> Client {
    Client::builder().build().expect("building test http client")
}

async fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while !predicate() {
        if Instant::now() > deadline {
            panic!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// S1 — cold fetch, 50 concurrent clients: upstream is hit exactly once,
/// every client reads the full body, and the file lands at its canonical
/// cache path.
#[tokio::test]
async fn cold_fetch_deduplicates_fifty_concurrent_clients() {
    let filename = "linux-5.2.arch2-1-x86_64.pkg.tar.xz";
    let body: &'static [u8] = Box::leak("heyoo".repeat(100).into_bytes().into_boxed_slice());
    let request_path = format!("/x86_64/core/{filename}");

    let upstream = spawn_upstream(HashMap::from([(request_path.as_str(), vec![MockResponse::ok(body)])])).await;

    let cache_dir = TempDir::new().unwrap();
    let router = Arc::new(test_router(&upstream.base_url()));
    let downloads = Arc::new(DownloadManager::new(http_client()));
    let cache = Arc::new(CacheRegistry::new(cache_dir.path().to_path_buf(), router, downloads).unwrap());

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..50 {
        let cache = cache.clone();
        let path = format!("x86_64/core/{filename}");
        tasks.spawn(async move {
            let reader = cache.get_packet(&path).await.expect("get_packet succeeds");
            tokio::task::spawn_blocking(move || read_all_blocking(reader, body.len())).await.unwrap()
        });
    }

    while let Some(result) = tasks.join_next().await {
        assert_eq!(result.unwrap(), body);
    }

    assert_eq!(upstream.hit_count(&request_path), 1, "upstream must be hit exactly once");

    let final_path = cache_dir.path().join("x86_64/core").join(filename);
    wait_until(|| final_path.exists(), Duration::from_secs(2)).await;
    assert_eq!(std::fs::read(&final_path).unwrap(), body);
}

/// S2 — existing cache survives scan: a pre-populated package stays
/// known, and an abandoned `.part` file is removed.
#[tokio::test]
async fn existing_cache_survives_startup_scan() {
    let cache_dir = TempDir::new().unwrap();
    let repo_dir = cache_dir.path().join("x86_64/core");
    std::fs::create_dir_all(&repo_dir).unwrap();
    std::fs::write(repo_dir.join("xorg-xinit-1.4.1-1-x86_64.pkg.tar.xz"), [0u8; 13]).unwrap();
    std::fs::write(repo_dir.join("zbar-0.23-1-x86_64.pkg.tar.xz.part"), b"partial").unwrap();

    // No upstream registered for the cached file: if the scan had missed
    // it, `get_packet` would try (and fail) to reach this mirror instead
    // of serving straight from disk.
    let upstream = spawn_upstream(HashMap::new()).await;
    let router = Arc::new(test_router(&upstream.base_url()));
    let downloads = Arc::new(DownloadManager::new(http_client()));
    let cache = Arc::new(CacheRegistry::new(cache_dir.path().to_path_buf(), router, downloads).unwrap());

    assert!(!repo_dir.join("zbar-0.23-1-x86_64.pkg.tar.xz.part").exists());

    let reader = cache
        .get_packet("x86_64/core/xorg-xinit-1.4.1-1-x86_64.pkg.tar.xz")
        .await
        .expect("already-cached package served without touching upstream");
    let bytes = tokio::task::spawn_blocking(move || read_all_blocking(reader, 13)).await.unwrap();
    assert_eq!(bytes, vec![0u8; 13]);
}

/// S3 — obsolete version rejected: requesting an older version than the
/// one already cached fails with `NewerVersionAvailable`.
#[tokio::test]
async fn obsolete_version_request_is_rejected() {
    let cache_dir = TempDir::new().unwrap();
    let repo_dir = cache_dir.path().join("x86_64/core");
    std::fs::create_dir_all(&repo_dir).unwrap();
    std::fs::write(repo_dir.join("acl-2.2.53-1-x86_64.pkg.tar.xz"), b"cached").unwrap();

    let upstream = spawn_upstream(HashMap::new()).await;
    let router = Arc::new(test_router(&upstream.base_url()));
    let downloads = Arc::new(DownloadManager::new(http_client()));
    let cache = Arc::new(CacheRegistry::new(cache_dir.path().to_path_buf(), router, downloads).unwrap());

    let err = cache
        .get_packet("x86_64/core/acl-2.2.53-0-x86_64.pkg.tar.xz")
        .await
        .expect_err("older version must be rejected");
    assert!(matches!(err, PkgError::NewerVersionAvailable { .. }), "got {err:?}");
}

/// S4 — newer version GCs old: completing a download of a newer package
/// deletes the superseded file and its set entry.
#[tokio::test]
async fn newer_version_garbage_collects_old_file() {
    let cache_dir = TempDir::new().unwrap();
    let repo_dir = cache_dir.path().join("x86_64/core");
    std::fs::create_dir_all(&repo_dir).unwrap();
    let old_path = repo_dir.join("linux-5.1-1-x86_64.pkg.tar.xz");
    std::fs::write(&old_path, b"old kernel").unwrap();

    let new_filename = "linux-5.2-1-x86_64.pkg.tar.xz";
    let body: &'static [u8] = b"new kernel bytes";
    let request_path = format!("/x86_64/core/{new_filename}");
    let upstream = spawn_upstream(HashMap::from([(request_path.as_str(), vec![MockResponse::ok(body)])])).await;

    let router = Arc::new(test_router(&upstream.base_url()));
    let downloads = Arc::new(DownloadManager::new(http_client()));
    let cache = Arc::new(CacheRegistry::new(cache_dir.path().to_path_buf(), router, downloads).unwrap());

    let reader = cache
        .get_packet(&format!("x86_64/core/{new_filename}"))
        .await
        .expect("newer version accepted");
    let bytes = tokio::task::spawn_blocking(move || read_all_blocking(reader, body.len())).await.unwrap();
    assert_eq!(bytes, body);

    wait_until(|| !old_path.exists(), Duration::from_secs(2)).await;
    assert!(repo_dir.join(new_filename).exists());
}

/// S5 — DB refresh 304: a conditional GET answered with `304 Not
/// Modified` leaves the cached database and its mtime untouched, and
/// creates no `.part` file.
#[tokio::test]
async fn database_refresh_not_modified_is_a_no_op() {
    let cache_dir = TempDir::new().unwrap();
    let repo_dir = cache_dir.path().join("x86_64/core");
    std::fs::create_dir_all(&repo_dir).unwrap();
    let db_path = repo_dir.join("core.db");
    std::fs::write(&db_path, b"stale db bytes").unwrap();

    let db_request_path = "/x86_64/core/core.db";
    let upstream =
        spawn_upstream(HashMap::from([(db_request_path, vec![MockResponse::Status(reqwest::StatusCode::NOT_MODIFIED)])]))
            .await;

    let router = Arc::new(test_router(&upstream.base_url()));
    let downloads = Arc::new(DownloadManager::new(http_client()));
    let cache = Arc::new(CacheRegistry::new(cache_dir.path().to_path_buf(), router, downloads).unwrap());

    let before_mtime = std::fs::metadata(&db_path).unwrap().modified().unwrap();

    cache
        .download_repo(&RepoPath::new("x86_64/core"))
        .await
        .expect("304 response is treated as success");

    assert_eq!(upstream.hit_count(db_request_path), 1);
    assert_eq!(std::fs::metadata(&db_path).unwrap().modified().unwrap(), before_mtime);
    assert!(!repo_dir.join("core.db.part").exists());
}

/// S6 — upstream failover: when the first mirror is unavailable, the
/// download manager falls through to the next, creating exactly one
/// `.part` file for the destination.
#[tokio::test]
async fn upstream_failover_to_second_mirror() {
    let filename = "acl-2.2.53-1-x86_64.pkg.tar.xz";
    let request_path = format!("/x86_64/core/{filename}");
    let body: &'static [u8] = b"acl package bytes";

    let failing = spawn_upstream(HashMap::from([(
        request_path.as_str(),
        vec![MockResponse::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE)],
    )]))
    .await;
    let healthy = spawn_upstream(HashMap::from([(request_path.as_str(), vec![MockResponse::ok(body)])])).await;

    let router = test_router_multi_upstream(&[&failing.base_url(), &healthy.base_url()]);
    let m = router.match_path(&format!("x86_64/core/{filename}")).expect("router matches");
    assert_eq!(m.upstream_urls.len(), 2);

    let downloads = DownloadManager::new(http_client());
    let cache_dir = TempDir::new().unwrap();
    let dest = cache_dir.path().join("x86_64/core").join(filename);

    let (reader, is_new) = downloads
        .get_file(dest.clone(), &m.upstream_urls, None, false)
        .await
        .expect("second mirror serves the file");
    assert!(is_new);

    let bytes = tokio::task::spawn_blocking(move || read_all_blocking(reader, body.len())).await.unwrap();
    assert_eq!(bytes, body);

    assert_eq!(failing.hit_count(&request_path), 1);
    assert_eq!(healthy.hit_count(&request_path), 1);

    let part_path = {
        let mut os = dest.as_os_str().to_os_string();
        os.push(".part");
        std::path::PathBuf::from(os)
    };
    wait_until(|| !part_path.exists() && dest.exists(), Duration::from_secs(2)).await;
}
