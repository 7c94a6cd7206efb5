//! Cache registry: the in-memory index of cached packages and repository
//! databases, backed by a cache directory on disk, plus the periodic
//! database refresher.

mod registry;
mod scan;

pub use registry::{periodic_refresh, CacheRegistry};
