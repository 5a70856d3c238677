//! Best-effort participant display-name resolution.
//!
//! The upstream directory lookup is slow and can fail; names are
//! prefetched in the background when a participant first speaks and read
//! from a cache at commit time. An unresolved participant is logged
//! under its raw id.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

/// Directory lookup capability. Implemented by the platform integration;
/// sessions without one use [`NoopResolver`].
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Resolves a participant id to a display name, or `None` if unknown.
    async fn resolve(&self, participant_id: &str) -> Option<String>;
}

/// Resolver that never finds anything; every entry falls back to the id.
pub struct NoopResolver;

#[async_trait]
impl NameResolver for NoopResolver {
    async fn resolve(&self, _participant_id: &str) -> Option<String> {
        None
    }
}

/// Read-mostly name cache shared between the coordinator and the
/// background resolution tasks.
#[derive(Clone, Default)]
pub struct NameCache {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, participant_id: &str) -> Option<String> {
        self.inner.read().await.get(participant_id).cloned()
    }

    /// Cached name, or the raw id when resolution has not landed.
    pub async fn resolve_or_id(&self, participant_id: &str) -> String {
        self.get(participant_id)
            .await
            .unwrap_or_else(|| participant_id.to_string())
    }

    /// Kicks off a background resolution if the id is not cached yet.
    /// Failures are swallowed; a duplicate in-flight lookup is harmless.
    pub fn prefetch(&self, resolver: Arc<dyn NameResolver>, participant_id: String) {
        let cache = self.clone();
        tokio::spawn(async move {
            if cache.inner.read().await.contains_key(&participant_id) {
                return;
            }
            match resolver.resolve(&participant_id).await {
                Some(name) => {
                    debug!(id = %participant_id, %name, "display name resolved");
                    cache.inner.write().await.insert(participant_id, name);
                }
                None => debug!(id = %participant_id, "display name unresolved"),
            }
        });
    }
}
