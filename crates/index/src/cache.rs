//! Repository configuration lookup with a bounded, expiring cache.

use crate::error::{ErrorKind, Result};
use crate::models::RepoKey;
use async_trait::async_trait;
use moka::future::Cache;
use repomd_config::{CacheConfig, Config, RepositoryConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Where repository settings ultimately come from.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Settings of `repo`, or `None` if the repository is not configured.
    async fn repository(&self, repo: &RepoKey) -> Result<Option<RepositoryConfig>>;
}

/// Settings fixed at start-up, taken from the engine configuration file.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigs {
    repositories: HashMap<RepoKey, RepositoryConfig>,
}

impl StaticConfigs {
    pub fn from_config(config: &Config) -> Self {
        let repositories = config
            .repositories
            .iter()
            .filter_map(|(key, settings)| {
                let (project, repo) = key.split_once('/')?;
                Some((RepoKey::new(project, repo), settings.clone()))
            })
            .collect();
        Self { repositories }
    }

    pub fn with(mut self, repo: RepoKey, settings: RepositoryConfig) -> Self {
        self.repositories.insert(repo, settings);
        self
    }
}

#[async_trait]
impl ConfigSource for StaticConfigs {
    async fn repository(&self, repo: &RepoKey) -> Result<Option<RepositoryConfig>> {
        Ok(self.repositories.get(repo).cloned())
    }
}

/// Caches [`ConfigSource`] answers for a fixed time.
///
/// Unknown repositories are not cached, so a repository configured after a
/// failed lookup is picked up by the next request.
#[derive(Clone)]
pub struct ConfigCache {
    source: Arc<dyn ConfigSource>,
    cache: Cache<RepoKey, Arc<RepositoryConfig>>,
}

impl ConfigCache {
    pub fn new(source: Arc<dyn ConfigSource>, capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(capacity).time_to_live(ttl).build();
        Self { source, cache }
    }

    pub fn from_config(source: Arc<dyn ConfigSource>, config: &CacheConfig) -> Self {
        Self::new(source, config.capacity, config.ttl())
    }

    /// Settings of `repo`.
    ///
    /// # Errors
    /// [`ErrorKind::UnknownRepository`] when the source has no settings for
    /// `repo`; the source's own failures are passed through.
    pub async fn get(&self, repo: &RepoKey) -> Result<Arc<RepositoryConfig>> {
        if let Some(settings) = self.cache.get(repo).await {
            return Ok(settings);
        }
        let Some(settings) = self.source.repository(repo).await? else {
            exn::bail!(ErrorKind::UnknownRepository(repo.to_string()));
        };
        tracing::debug!(%repo, "loaded repository configuration");
        let settings = Arc::new(settings);
        self.cache.insert(repo.clone(), settings.clone()).await;
        Ok(settings)
    }

    /// Drop the cached settings of `repo`.
    pub async fn invalidate(&self, repo: &RepoKey) {
        self.cache.invalidate(repo).await;
    }
}
