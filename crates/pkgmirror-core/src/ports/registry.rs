//! Global registry of known `PackageImpl` implementations.
//!
//! The original Go program relies on package-level `init()` to
//! self-register each implementation before `main` runs. Rust has no
//! equivalent implicit hook in this stack, so registration here is
//! explicit: each implementation crate exposes a `register(registry)`
//! function, and the composition root calls them all during startup
//! (see `register_builtins` callers in the binary crate).

use std::collections::HashMap;
use std::sync::Arc;

use crate::ports::PackageImpl;

/// Constructs a fresh `PackageImpl` instance parameterized by a match's
/// resolved `args` (post `$var` substitution), e.g. a pacman template's
/// `reponame`.
pub type ImplementationFactory = fn(&HashMap<String, String>) -> Arc<dyn PackageImpl>;

/// Maps implementation names (`"pacman"`, `"apk"`, ...) to their factories.
#[derive(Default)]
pub struct ImplementationRegistry {
    factories: HashMap<String, ImplementationFactory>,
}

impl ImplementationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an implementation under `name`, overwriting any prior
    /// registration with the same name.
    pub fn register(&mut self, name: impl Into<String>, factory: ImplementationFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Looks up and instantiates the implementation registered under
    /// `name`, parameterized by `args`. A fresh instance is built on every
    /// call rather than cached, matching the original's `impl.Get(name,
    /// args)` being invoked anew on every router match so that two
    /// differently-parameterized templates sharing one implementation name
    /// never share state.
    #[must_use]
    pub fn get(&self, name: &str, args: &HashMap<String, String>) -> Option<Arc<dyn PackageImpl>> {
        self.factories.get(name).map(|factory| factory(args))
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}
