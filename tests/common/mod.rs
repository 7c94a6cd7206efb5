//! Shared test scaffolding: a scriptable fake upstream mirror, bound to a
//! random local port, the way `gglib-axum`'s own tests boot a real listener
//! (`embedded.rs`) instead of mocking at the HTTP layer.

use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router as AxumRouter;
use indexmap::IndexMap;
use pkgmirror_core::ports::registry::ImplementationRegistry;
use pkgmirror_router::config::{RepoEntry, RouterConfig};
use pkgmirror_router::Router;
use tokio::net::TcpListener;

/// One scripted reply for a single request to a mocked path.
#[derive(Clone)]
pub enum MockResponse {
    Status(StatusCode),
    Body {
        status: StatusCode,
        body: &'static [u8],
        headers: Vec<(&'static str, String)>,
    },
}

impl MockResponse {
    pub fn ok(body: &'static [u8]) -> Self {
        Self::Body {
            status: StatusCode::OK,
            body,
            headers: Vec::new(),
        }
    }

    pub fn ok_with(body: &'static [u8], headers: Vec<(&'static str, String)>) -> Self {
        Self::Body {
            status: StatusCode::OK,
            body,
            headers,
        }
    }
}

type Scripts = Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>;
type Hits = Arc<Mutex<HashMap<String, u32>>>;

/// A fake upstream mirror whose replies per request path are scripted up
/// front. Once a path's queue is drained, its last reply repeats, so tests
/// don't need to pad sequences to an exact call count.
pub struct MockUpstream {
    pub addr: SocketAddr,
    hits: Hits,
}

impl MockUpstream {
    /// Number of requests this path has received so far.
    pub fn hit_count(&self, path: &str) -> u32 {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Starts a fake upstream serving the given scripted responses, keyed by
/// request path (e.g. `"/x86_64/core/linux-5.2.arch2-1-x86_64.pkg.tar.xz"`).
pub async fn spawn_upstream(routes: HashMap<&str, Vec<MockResponse>>) -> MockUpstream {
    let scripts: Scripts = Arc::new(Mutex::new(
        routes
            .into_iter()
            .map(|(path, responses)| (path.to_string(), responses.into_iter().collect()))
            .collect(),
    ));
    let hits: Hits = Arc::new(Mutex::new(HashMap::new()));

    let app = AxumRouter::new()
        .fallback(handle_any)
        .with_state((scripts, hits.clone()));

    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockUpstream { addr, hits }
}

async fn handle_any(State((scripts, hits)): State<(Scripts, Hits)>, req: Request<Body>) -> Response {
    let path = req.uri().path().to_string();
    *hits.lock().unwrap().entry(path.clone()).or_insert(0) += 1;

    let reply = {
        let mut scripts = scripts.lock().unwrap();
        match scripts.get_mut(&path) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        }
    };

    match reply {
        None => StatusCode::NOT_FOUND.into_response(),
        Some(MockResponse::Status(status)) => status.into_response(),
        Some(MockResponse::Body { status, body, headers }) => {
            let mut builder = Response::builder().status(status);
            for (name, value) in headers {
                builder = builder.header(name, value);
            }
            builder.body(Body::from(body)).unwrap()
        }
    }
}

/// Builds a router with the pacman implementation registered and a single
/// `$arch/$repo` template pointed at `upstream_base`, matching the
/// `x86_64/core/...` layout used throughout spec.md's test scenarios.
pub fn test_router(upstream_base: &str) -> Router {
    test_router_multi_upstream(&[upstream_base])
}

/// Builds a router with one or more upstreams for the same template, for
/// failover tests.
pub fn test_router_multi_upstream(upstream_bases: &[&str]) -> Router {
    let mut registry = ImplementationRegistry::new();
    pkgmirror_pacman::register(&mut registry);

    let mut cfg: RouterConfig = IndexMap::new();
    cfg.insert(
        "$arch/$repo".to_string(),
        RepoEntry {
            implementation: "pacman".to_string(),
            upstreams: upstream_bases.iter().map(|b| format!("{b}/$arch/$repo")).collect(),
            args: HashMap::from([("reponame".to_string(), "$repo".to_string())]),
        },
    );

    Router::new(&cfg, Arc::new(registry))
}

/// Reads a `DownloadReader`/`LiveReader`-backed stream to completion off
/// the async executor, retrying short reads of zero the way the HTTP
/// range server does (spec.md §4.5.2).
pub fn read_all_blocking(mut reader: impl std::io::Read, expected_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(expected_len);
    let mut buf = [0u8; 4096];
    while out.len() < expected_len {
        match reader.read(&mut buf) {
            Ok(0) => std::thread::sleep(std::time::Duration::from_millis(10)),
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(err) => panic!("read error: {err}"),
        }
    }
    out
}
