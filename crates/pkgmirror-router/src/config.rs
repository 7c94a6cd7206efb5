//! Router configuration: the `repos` section of the YAML config, keyed by
//! path template.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Deserialize;

/// One configured repository template, e.g. `"$repo/os/$arch"`.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoEntry {
    /// Name of the registered `PackageImpl` to use for this repository,
    /// e.g. `"pacman"` or `"apk"`.
    pub implementation: String,
    /// Upstream mirror base URLs, tried in order.
    pub upstreams: Vec<String>,
    /// Extra arguments passed to the implementation factory after `$var`
    /// substitution, e.g. `{reponame: "$repo"}` for pacman, which needs the
    /// matched repo name to derive its database file name.
    #[serde(default)]
    pub args: HashMap<String, String>,
}

/// `IndexMap` preserves insertion order, which the router snapshots at
/// construction to guarantee deterministic tie-breaking between
/// overlapping templates (spec §4.4 "Tie-breaking").
pub type RouterConfig = IndexMap<String, RepoEntry>;
