//! Path router: maps a slash-normalized request path to a configured
//! repository, its upstream mirrors, and the `PackageImpl` that owns it.
//!
//! Grounded on `examples/original_source/database/router.go`.

pub mod config;

use std::collections::HashMap;
use std::sync::Arc;

use pkgmirror_core::error::PkgError;
use pkgmirror_core::ports::registry::ImplementationRegistry;
use pkgmirror_core::ports::PackageImpl;
use pkgmirror_core::{Package, RepoPath};

use config::RouterConfig;

struct Template {
    parts: Vec<String>,
    entry: config::RepoEntry,
}

/// A router built from a snapshotted, deterministically-ordered set of
/// path templates.
pub struct Router {
    templates: Vec<Template>,
    registry: Arc<ImplementationRegistry>,
}

/// The result of a successful [`Router::match_path`] call.
pub struct RouterMatch {
    pub upstream_urls: Vec<String>,
    pub implementation: Arc<dyn PackageImpl>,
    pub matched_path: RepoPath,
    pub filename: Option<String>,
    /// The matched template's `args`, after `$var` substitution (e.g.
    /// `reponame` resolved to the matched repo name). This is the same map
    /// used to construct `implementation`.
    pub args: HashMap<String, String>,
}

impl RouterMatch {
    /// The repository database's path relative to the repository
    /// directory.
    #[must_use]
    pub fn db_path(&self) -> String {
        self.implementation.db_file_name(self.matched_path.as_str())
    }

    /// The canonical matched path to the matched file, including the
    /// trailing filename if this match carried one.
    #[must_use]
    pub fn path(&self) -> String {
        match &self.filename {
            Some(filename) => format!("{}/{filename}", self.matched_path),
            None => self.matched_path.to_string(),
        }
    }

    /// Parses the matched file's name into a package identity via the
    /// matched implementation.
    pub fn package(&self) -> Result<Box<dyn Package>, PkgError> {
        let filename = self.filename.as_deref().ok_or_else(|| PkgError::InvalidFilename {
            filename: String::new(),
        })?;
        self.implementation.package_from_filename(filename)
    }
}

impl Router {
    /// Builds a router from configuration, snapshotting template part
    /// splits up front so matching never re-parses them.
    ///
    /// # Panics
    /// Panics if a template references an implementation that isn't
    /// registered — this is a startup-time configuration error, not a
    /// per-request condition.
    #[must_use]
    pub fn new(cfg: &RouterConfig, registry: Arc<ImplementationRegistry>) -> Self {
        let templates = cfg
            .iter()
            .map(|(template, entry)| Template {
                parts: template.split('/').map(str::to_string).collect(),
                entry: entry.clone(),
            })
            .collect();
        Self {
            templates,
            registry,
        }
    }

    /// Matches `request_path` against every configured template in
    /// insertion order, returning the first hit.
    pub fn match_path(&self, request_path: &str) -> Result<RouterMatch, PkgError> {
        let cleaned = request_path.trim_start_matches('/');
        let request_parts: Vec<&str> = cleaned.split('/').filter(|s| !s.is_empty()).collect();

        for template in &self.templates {
            let Some(m) = try_match(template, &request_parts) else {
                continue;
            };
            let implementation = self
                .registry
                .get(&template.entry.implementation, &m.args)
                .ok_or_else(|| PkgError::NoMatch {
                    path: request_path.to_string(),
                })?;
            return Ok(RouterMatch {
                upstream_urls: m.upstream_urls,
                implementation,
                matched_path: RepoPath::new(m.matched_path),
                filename: m.filename,
                args: m.args,
            });
        }

        Err(PkgError::NoMatch {
            path: request_path.to_string(),
        })
    }
}

struct RawMatch {
    upstream_urls: Vec<String>,
    matched_path: String,
    filename: Option<String>,
    args: HashMap<String, String>,
}

fn try_match(template: &Template, request_parts: &[&str]) -> Option<RawMatch> {
    let t_len = template.parts.len();
    let r_len = request_parts.len();
    if t_len != r_len && t_len + 1 != r_len {
        return None;
    }

    let mut vars: Vec<(&str, &str)> = Vec::new();
    for (part, req_part) in template.parts.iter().zip(request_parts.iter()) {
        if part.starts_with('$') {
            vars.push((part.as_str(), req_part));
        } else if part != req_part {
            return None;
        }
    }

    let replace_vars = |s: &str| -> String {
        let mut out = s.to_string();
        for (key, val) in &vars {
            out = out.replace(key, val);
        }
        out
    };

    let filename = if t_len < r_len {
        Some(request_parts[r_len - 1].to_string())
    } else {
        None
    };

    let matched_path = request_parts[..t_len].join("/");

    let mut upstream_urls: Vec<String> = template
        .entry
        .upstreams
        .iter()
        .map(|u| replace_vars(u))
        .collect();
    if let Some(filename) = &filename {
        for url in &mut upstream_urls {
            *url = format!("{}/{filename}", url.trim_end_matches('/'));
        }
    }

    let args: HashMap<String, String> = template
        .entry
        .args
        .iter()
        .map(|(key, val)| (key.clone(), replace_vars(val)))
        .collect();

    Some(RawMatch {
        upstream_urls,
        matched_path,
        filename,
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::RepoEntry;
    use std::cmp::Ordering;
    use std::collections::HashMap as StdHashMap;
    use std::io::Read;

    struct StubImpl(&'static str);
    impl PackageImpl for StubImpl {
        fn name(&self) -> &str {
            self.0
        }
        fn compare_versions(&self, _a: &str, _b: &str) -> Ordering {
            Ordering::Equal
        }
        fn package_from_filename(&self, filename: &str) -> Result<Box<dyn Package>, PkgError> {
            Err(PkgError::InvalidFilename {
                filename: filename.to_string(),
            })
        }
        fn parse_db(
            &self,
            _reader: &mut dyn Read,
            _callback: &mut pkgmirror_core::ports::PackageCallback<'_>,
        ) -> Result<(), PkgError> {
            Ok(())
        }
        fn db_file_name(&self, repo_path: &str) -> String {
            format!("{repo_path}/stub.db")
        }
    }

    fn registry() -> Arc<ImplementationRegistry> {
        let mut r = ImplementationRegistry::new();
        r.register("pacman", |_args| Arc::new(StubImpl("pacman")));
        Arc::new(r)
    }

    fn sample_config() -> RouterConfig {
        let mut cfg = RouterConfig::new();
        cfg.insert(
            "$repo/os/$arch".to_string(),
            RepoEntry {
                implementation: "pacman".to_string(),
                upstreams: vec!["https://mirror.example/$repo/os/$arch".to_string()],
                args: StdHashMap::from([("reponame".to_string(), "$repo".to_string())]),
            },
        );
        cfg
    }

    #[test]
    fn matches_repo_only_path() {
        let router = Router::new(&sample_config(), registry());
        let m = router.match_path("core/os/x86_64").expect("matches");
        assert_eq!(m.matched_path.as_str(), "core/os/x86_64");
        assert!(m.filename.is_none());
        assert_eq!(m.upstream_urls, vec!["https://mirror.example/core/os/x86_64"]);
    }

    #[test]
    fn matches_repo_plus_file_and_appends_filename_to_upstream() {
        let router = Router::new(&sample_config(), registry());
        let m = router
            .match_path("/core/os/x86_64/acl-2.2.53-1-x86_64.pkg.tar.xz")
            .expect("matches");
        assert_eq!(m.filename.as_deref(), Some("acl-2.2.53-1-x86_64.pkg.tar.xz"));
        assert_eq!(
            m.upstream_urls,
            vec!["https://mirror.example/core/os/x86_64/acl-2.2.53-1-x86_64.pkg.tar.xz"]
        );
    }

    #[test]
    fn no_match_for_unrelated_path() {
        let router = Router::new(&sample_config(), registry());
        assert!(router.match_path("totally/unrelated").is_err());
    }

    #[test]
    fn args_are_var_substituted_and_exposed_on_the_match() {
        let router = Router::new(&sample_config(), registry());
        let m = router.match_path("core/os/x86_64").expect("matches");
        assert_eq!(m.args.get("reponame").map(String::as_str), Some("core"));
    }
}
