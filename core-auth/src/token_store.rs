//! Token Cache
//!
//! In-memory token map keyed by client id, optionally mirrored to
//! `<token_dir>/<client_id>_token.json` so tokens survive process restarts.
//!
//! ## Expiry
//!
//! Every lookup checks the token against the clock with a 60 second safety
//! offset. Expired tokens are purged from memory and their file is deleted
//! before `None` is returned, so an expired token is never handed out.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{AuthToken, TokenCache};
//! use chrono::{Duration, Utc};
//!
//! # fn example() -> core_auth::Result<()> {
//! let cache = TokenCache::new(Some("./tokens".into()));
//! let token = AuthToken::new("abc", "Bearer", Utc::now() + Duration::hours(1));
//!
//! cache.put("client-id", &token)?;
//! assert!(cache.get("client-id")?.is_some());
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{token_expired, AuthToken, DEFAULT_EXPIRY_OFFSET_SECS};
use bridge_traits::time::{Clock, SystemClock};
use chrono::Duration;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Token cache with optional file persistence
pub struct TokenCache {
    memory: RwLock<HashMap<String, AuthToken>>,
    token_dir: Option<PathBuf>,
    expiry_offset: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenCache {
    /// Create a cache. Pass `None` to keep tokens in memory only.
    pub fn new(token_dir: Option<PathBuf>) -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
            token_dir,
            expiry_offset: Duration::seconds(DEFAULT_EXPIRY_OFFSET_SECS),
            clock: Arc::new(SystemClock),
        }
    }

    /// Memory-only cache
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_expiry_offset(mut self, offset: Duration) -> Self {
        self.expiry_offset = offset;
        self
    }

    /// File backing `client_id`, if file caching is enabled.
    pub fn token_path(&self, client_id: &str) -> Option<PathBuf> {
        self.token_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}_token.json", client_id)))
    }

    /// Fetch a valid token for `client_id`.
    ///
    /// Memory is consulted first, then the file. Expired tokens are purged
    /// from both places. A file that cannot be parsed is treated as a miss
    /// and deleted.
    pub fn get(&self, client_id: &str) -> Result<Option<AuthToken>> {
        let now = self.clock.now();

        let cached = self.read_memory().get(client_id).cloned();
        if let Some(token) = cached {
            if token_expired(&token, self.expiry_offset, now) {
                debug!(client_id = %client_id, "Cached token expired, purging");
                self.remove(client_id)?;
                return Ok(None);
            }
            return Ok(Some(token));
        }

        let Some(path) = self.token_path(client_id) else {
            return Ok(None);
        };
        let Some(token) = self.read_file(client_id, &path)? else {
            return Ok(None);
        };

        if token_expired(&token, self.expiry_offset, now) {
            debug!(client_id = %client_id, "Token file expired, deleting");
            remove_file(&path)?;
            return Ok(None);
        }

        self.write_memory().insert(client_id.to_string(), token.clone());
        Ok(Some(token))
    }

    /// Store a token in memory and, when enabled, on disk.
    pub fn put(&self, client_id: &str, token: &AuthToken) -> Result<()> {
        self.write_memory()
            .insert(client_id.to_string(), token.clone());

        if let Some(path) = self.token_path(client_id) {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).map_err(|e| cache_io(dir, e))?;
            }
            let json = serde_json::to_vec(token).map_err(|e| {
                AuthError::InvalidTokenResponse(format!("Token serialization failed: {}", e))
            })?;
            fs::write(&path, json).map_err(|e| cache_io(&path, e))?;
            debug!(client_id = %client_id, "Token written to cache file");
        }

        Ok(())
    }

    /// Forget the token for `client_id`.
    pub fn remove(&self, client_id: &str) -> Result<()> {
        self.write_memory().remove(client_id);
        if let Some(path) = self.token_path(client_id) {
            remove_file(&path)?;
        }
        Ok(())
    }

    /// Forget every token held in memory, deleting their files.
    pub fn clear(&self) -> Result<()> {
        let ids: Vec<String> = self.write_memory().drain().map(|(id, _)| id).collect();
        for id in ids {
            if let Some(path) = self.token_path(&id) {
                remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn read_file(&self, client_id: &str, path: &Path) -> Result<Option<AuthToken>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(cache_io(path, e)),
        };

        match serde_json::from_slice::<AuthToken>(&bytes) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(
                    client_id = %client_id,
                    error = %e,
                    "Corrupted token cache file, deleting"
                );
                remove_file(path)?;
                Ok(None)
            }
        }
    }

    fn read_memory(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, AuthToken>> {
        self.memory.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_memory(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, AuthToken>> {
        self.memory.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCache")
            .field("token_dir", &self.token_dir)
            .field("expiry_offset", &self.expiry_offset)
            .field("entries", &self.read_memory().len())
            .finish()
    }
}

fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(cache_io(path, e)),
    }
}

fn cache_io(path: &Path, source: std::io::Error) -> AuthError {
    AuthError::CacheIo {
        path: path.display().to_string(),
        source,
    }
}
