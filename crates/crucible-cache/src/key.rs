//! Per-workspace MAC key for ActionEntry integrity (spec.md §4.4).

use crate::error::{CacheError, Result};
use std::path::Path;

/// Loads the workspace's MAC key from `<cache-root>/actions/cache.key`,
/// generating and persisting a fresh one on first use. The key never
/// leaves the local cache root and is not derived from any secret the
/// cache would need to protect against — it only needs to be stable
/// across builds and absent from the shared/synced parts of the cache.
pub fn load_or_create(actions_dir: &Path) -> Result<[u8; 32]> {
    let key_path = actions_dir.join("cache.key");
    match std::fs::read(&key_path) {
        Ok(bytes) if bytes.len() == 32 => {
            let mut key = [0u8; 32];
            key.copy_from_slice(&bytes);
            return Ok(key);
        }
        Ok(_) => {
            // Wrong length; fall through and regenerate.
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(CacheError::Io {
                path: key_path,
                source,
            })
        }
    }

    std::fs::create_dir_all(actions_dir).map_err(|source| CacheError::Io {
        path: actions_dir.to_path_buf(),
        source,
    })?;

    let mut key = [0u8; 32];
    let a = uuid::Uuid::new_v4();
    let b = uuid::Uuid::new_v4();
    key[0..16].copy_from_slice(a.as_bytes());
    key[16..32].copy_from_slice(b.as_bytes());

    std::fs::write(&key_path, key).map_err(|source| CacheError::Io {
        path: key_path.clone(),
        source,
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600));
    }
    Ok(key)
}
