//! Composition root: loads configuration, wires the router, download
//! manager and cache registry together, and serves them over HTTP.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use indexmap::IndexMap;
use pkgmirror_cache::CacheRegistry;
use pkgmirror_core::ports::registry::ImplementationRegistry;
use pkgmirror_download::DownloadManager;
use pkgmirror_router::config::{RepoEntry, RouterConfig};
use pkgmirror_router::Router;
use pkgmirror_server::{AppState, PRODUCT_TOKEN};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::info;

/// Caching reverse proxy for Linux package repositories (pacman, apk).
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    /// Overrides the `listen` address from the configuration file.
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[derive(Debug, Deserialize)]
struct Config {
    cache_dir: PathBuf,
    listen: SocketAddr,
    repos: IndexMap<String, RepoConfig>,
}

#[derive(Debug, Deserialize)]
struct RepoConfig {
    implementation: String,
    upstreams: Vec<String>,
    #[serde(default)]
    args: HashMap<String, String>,
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading configuration file {}", path.display()))?;
    serde_norway::from_str(&raw).with_context(|| format!("parsing configuration file {}", path.display()))
}

fn build_registry() -> ImplementationRegistry {
    let mut registry = ImplementationRegistry::new();
    pkgmirror_pacman::register(&mut registry);
    pkgmirror_apk::register(&mut registry);
    registry
}

fn build_router_config(repos: IndexMap<String, RepoConfig>) -> RouterConfig {
    repos
        .into_iter()
        .map(|(template, repo)| {
            (
                template,
                RepoEntry {
                    implementation: repo.implementation,
                    upstreams: repo.upstreams,
                    args: repo.args,
                },
            )
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let listen = cli.listen.unwrap_or(config.listen);

    let registry = Arc::new(build_registry());
    let router_config = build_router_config(config.repos);
    let router = Arc::new(Router::new(&router_config, registry));

    let http_client = reqwest::Client::builder()
        .user_agent(PRODUCT_TOKEN)
        .build()
        .context("building upstream HTTP client")?;

    let downloads = Arc::new(DownloadManager::new(http_client.clone()));

    let cache_dir = config.cache_dir.clone();
    let scan_router = router.clone();
    let scan_downloads = downloads.clone();
    let cache = tokio::task::spawn_blocking(move || CacheRegistry::new(cache_dir, scan_router, scan_downloads))
        .await
        .context("startup cache scan panicked")?
        .context("scanning cache directory")?;
    let cache = Arc::new(cache);

    tokio::spawn(pkgmirror_cache::periodic_refresh(cache.clone()));

    let state = AppState::new(cache, router, http_client);
    let app = pkgmirror_server::build_router(state);

    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("binding listen address {listen}"))?;
    info!("pkgmirror listening on http://{listen}");

    axum::serve(listener, app).await.context("axum server exited")?;
    Ok(())
}
