use std::env;

/// Records per round of concurrent writes when no override is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 50;
/// Upper bound on candidates accepted by a single import call.
pub const DEFAULT_MAX_CANDIDATES: usize = 10_000;

pub(crate) fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

/// Runtime configuration for contact imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportConfig {
    /// Bounds concurrent in-flight store writes per round. Chunks run one
    /// after another; every record of a chunk is written concurrently.
    pub chunk_size: usize,
    /// Imports larger than this are rejected before any work starts.
    pub max_candidates: usize,
}

impl ImportConfig {
    pub fn new(chunk_size: usize, max_candidates: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            max_candidates,
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            env_usize("IMPORT_CHUNK_SIZE", DEFAULT_CHUNK_SIZE),
            env_usize("IMPORT_MAX_CANDIDATES", DEFAULT_MAX_CANDIDATES),
        )
    }

    pub fn with_chunk_size(self, chunk_size: usize) -> Self {
        Self::new(chunk_size, self.max_candidates)
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
