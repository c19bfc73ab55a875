//! Fingerprinting and persistent result caching for deterministic sweeps.

mod cache;
mod fingerprint;
mod flight;

pub use cache::{CacheBackend, CacheEntry, ResultCache, CACHE_SCHEMA};
pub use fingerprint::{fingerprint, Fingerprint, FingerprintGenerator, ScopeMode};
pub use flight::FlightGuard;
