//! Resolved engine configuration (spec.md §6.3, SPEC_FULL.md §3.1/§6.5).
//!
//! Built once at orchestrator construction and passed by reference from
//! there on — never read ad hoc from `std::env` deep in the call stack
//! (teacher convention: "Logger, metrics sink, event publisher... passed
//! explicitly via a context object", spec.md §9; pattern grounded on
//! `dashflow-registry::cache::CacheConfig::from_env`).

use std::path::{Path, PathBuf};

const ENV_CACHE_DIR: &str = "BUILDER_CACHE_DIR";
const ENV_PARALLELISM: &str = "BUILDER_PARALLELISM";
const ENV_REMOTE_CACHE_URL: &str = "BUILDER_REMOTE_CACHE_URL";
const ENV_DETERMINISM_STRICT: &str = "BUILDER_DETERMINISM_STRICT";

const DEFAULT_CACHE_DIR_NAME: &str = ".builder-cache";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub cache_root: PathBuf,
    pub parallelism: usize,
    /// `None` disables the remote CAS backend (spec.md §6.3).
    pub remote_cache_url: Option<String>,
    /// Treat a determinism cross-check mismatch as a build failure rather
    /// than a logged warning (spec.md §6.3, §7 propagation policy).
    pub determinism_strict: bool,
}

/// Explicit overrides applied on top of environment defaults. Every field
/// left `None` keeps whatever `from_env` resolved.
#[derive(Debug, Clone, Default)]
pub struct EngineConfigOverrides {
    pub cache_root: Option<PathBuf>,
    pub parallelism: Option<usize>,
    pub remote_cache_url: Option<Option<String>>,
    pub determinism_strict: Option<bool>,
}

impl EngineConfig {
    pub fn from_env(workspace_root: &Path) -> Self {
        let cache_root = std::env::var(ENV_CACHE_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| workspace_root.join(DEFAULT_CACHE_DIR_NAME));

        let parallelism = std::env::var(ENV_PARALLELISM)
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            });

        let remote_cache_url = std::env::var(ENV_REMOTE_CACHE_URL)
            .ok()
            .filter(|v| !v.is_empty());

        let determinism_strict = std::env::var(ENV_DETERMINISM_STRICT)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            cache_root,
            parallelism,
            remote_cache_url,
            determinism_strict,
        }
    }

    /// Reads the environment, then applies `overrides` on top (spec.md
    /// §6.5: "env defaults, explicit overrides win").
    pub fn from_env_and_overrides(workspace_root: &Path, overrides: EngineConfigOverrides) -> Self {
        let mut config = Self::from_env(workspace_root);
        if let Some(cache_root) = overrides.cache_root {
            config.cache_root = cache_root;
        }
        if let Some(parallelism) = overrides.parallelism {
            config.parallelism = parallelism;
        }
        if let Some(remote_cache_url) = overrides.remote_cache_url {
            config.remote_cache_url = remote_cache_url;
        }
        if let Some(determinism_strict) = overrides.determinism_strict {
            config.determinism_strict = determinism_strict;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize the tests that
    // touch them so they don't race each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_place_cache_under_workspace_root() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var(ENV_CACHE_DIR);
        let config = EngineConfig::from_env(Path::new("/tmp/ws"));
        assert_eq!(config.cache_root, Path::new("/tmp/ws/.builder-cache"));
        assert!(config.remote_cache_url.is_none());
        assert!(!config.determinism_strict);
    }

    #[test]
    fn overrides_win_over_environment() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var(ENV_PARALLELISM, "4");
        let overrides = EngineConfigOverrides {
            parallelism: Some(16),
            ..Default::default()
        };
        let config = EngineConfig::from_env_and_overrides(Path::new("/tmp/ws"), overrides);
        assert_eq!(config.parallelism, 16);
        std::env::remove_var(ENV_PARALLELISM);
    }

    #[test]
    fn zero_parallelism_env_value_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var(ENV_PARALLELISM, "0");
        let config = EngineConfig::from_env(Path::new("/tmp/ws"));
        assert!(config.parallelism >= 1);
        std::env::remove_var(ENV_PARALLELISM);
    }
}
