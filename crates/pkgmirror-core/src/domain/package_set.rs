//! Package set: an indexed collection of packages keyed by filename.
//!
//! Grounded on `examples/original_source/packet/packetset.go`: a plain
//! `map[filename]Packet` with `Insert`/`Delete`/`ByFilename`/`ByName`/
//! `FindOtherVersions`. Insertion order is not preserved.

use std::collections::HashMap;

use crate::domain::package::Package;

/// A set of packages indexed by filename, scoped to one repository.
#[derive(Debug, Default, Clone)]
pub struct PackageSet {
    by_filename: HashMap<String, Box<dyn Package>>,
}

impl PackageSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of packages currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_filename.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_filename.is_empty()
    }

    /// Inserts a package, overwriting any existing entry with the same
    /// filename.
    pub fn insert(&mut self, p: Box<dyn Package>) {
        self.by_filename.insert(p.filename(), p);
    }

    /// Removes a package by filename. No-op if absent.
    pub fn delete(&mut self, filename: &str) {
        self.by_filename.remove(filename);
    }

    /// Looks up a package by its exact filename.
    #[must_use]
    pub fn by_filename(&self, filename: &str) -> Option<&dyn Package> {
        self.by_filename.get(filename).map(AsRef::as_ref)
    }

    /// Returns every package in the set with the given name, in no
    /// particular order.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Vec<&dyn Package> {
        self.by_filename
            .values()
            .filter(|p| p.name() == name)
            .map(AsRef::as_ref)
            .collect()
    }

    /// Returns every package in the set sharing `p`'s name, including `p`
    /// itself if it is already present. Used by `finalize` to find versions
    /// to garbage-collect and by `UpdatePackets` to check for staleness.
    #[must_use]
    pub fn find_other_versions(&self, p: &dyn Package) -> Vec<&dyn Package> {
        self.by_name(p.name())
    }

    /// Iterates over all packages in the set.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Package> {
        self.by_filename.values().map(AsRef::as_ref)
    }
}
