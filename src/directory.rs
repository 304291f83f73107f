//! Install directory resolution
//!
//! Directory names and paths come from the plugin hook and are memoized per
//! `(server_name, pid)` in two [`ExpiringCache`]s. Only non-empty results are
//! cached, so a failed lookup is retried next cycle.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{Clock, ExpiringCache};
use crate::hook::PluginHook;

/// Cache key for one process of one server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirKey {
    pub server_name: String,
    pub pid: u32,
}

impl DirKey {
    pub fn new(server_name: impl Into<String>, pid: u32) -> Self {
        Self {
            server_name: server_name.into(),
            pid,
        }
    }
}

/// The directory-name and directory-path caches
pub struct DirectoryCaches {
    names: ExpiringCache<DirKey, String>,
    paths: ExpiringCache<DirKey, String>,
    ttl: Duration,
}

impl DirectoryCaches {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            names: ExpiringCache::new(clock.clone()),
            paths: ExpiringCache::new(clock),
            ttl,
        }
    }

    pub fn names(&self) -> &ExpiringCache<DirKey, String> {
        &self.names
    }

    pub fn paths(&self) -> &ExpiringCache<DirKey, String> {
        &self.paths
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sweep both caches
    pub fn evict_expired(&self) -> usize {
        self.names.evict_expired(self.ttl) + self.paths.evict_expired(self.ttl)
    }

    /// Drop every entry sharing the value cached under `key`, in both caches
    pub fn evict_key(&self, key: &DirKey) -> usize {
        let mut removed = 0;
        for cache in [&self.names, &self.paths] {
            if let Some(value) = cache.get(key) {
                removed += cache.evict_by_value(&value);
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.names.len() + self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.paths.is_empty()
    }
}

/// Memoizing front of the plugin hook's directory lookups
pub struct DirectoryResolver {
    caches: Arc<DirectoryCaches>,
    hook: Arc<dyn PluginHook>,
}

impl DirectoryResolver {
    pub fn new(caches: Arc<DirectoryCaches>, hook: Arc<dyn PluginHook>) -> Self {
        Self { caches, hook }
    }

    pub fn caches(&self) -> &DirectoryCaches {
        &self.caches
    }

    /// Short directory name, or empty when the hook has none
    pub fn resolve_dir_name(&self, pid: u32, server_name: &str) -> String {
        let key = DirKey::new(server_name, pid);
        if let Some(name) = self.caches.names.get(&key) {
            return name;
        }

        let name = self.hook.server_dir_name(pid).unwrap_or_default();
        if !name.is_empty() {
            debug!(server = %server_name, pid, dir_name = %name, "Resolved directory name");
            self.caches.names.put(key, name.clone());
        }
        name
    }

    /// Install directory path, or empty when the hook has none
    ///
    /// A path containing a space is reported on every call, cached or not.
    pub fn resolve_dir_path(&self, pid: u32, server_name: &str) -> String {
        let key = DirKey::new(server_name, pid);
        let path = match self.caches.paths.get(&key) {
            Some(path) => path,
            None => {
                let path = self.hook.server_dir_path(pid, server_name).unwrap_or_default();
                if !path.is_empty() {
                    debug!(server = %server_name, pid, dir_path = %path, "Resolved directory path");
                    self.caches.paths.put(key, path.clone());
                }
                path
            }
        };

        if path.contains(' ') {
            warn!(
                server = %server_name,
                pid,
                path = %path,
                "Install directory path contains a space"
            );
        }
        path
    }
}
