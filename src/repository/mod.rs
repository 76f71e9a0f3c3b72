//! # Repository Synchronizer
//!
//! Keeps the local chart repository registry and index cache consistent with
//! the remote sources while several reconciliations (and several operator
//! processes on the same host) touch them at once.
//!
//! The shared repository file is only ever mutated under [`RepositoryLock`].
//! Network fetches always happen outside the lock.

mod fetch;
mod file;
mod lock;

pub use fetch::{index_url, validate_index, HttpIndexFetcher, IndexFetcher};
pub use file::{RepositoryEntry, RepositoryFile};
pub use lock::RepositoryLock;

use crate::config::ControllerConfig;
use crate::constants::REPOSITORY_LOCK_POLL_INTERVAL_MS;
use crate::observability::metrics;
use futures::future::join_all;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Errors raised while synchronizing chart repositories
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("repository {name} ({url}) is unreachable: {reason}")]
    RepositoryUnreachable {
        name: String,
        url: String,
        reason: String,
    },

    #[error("timed out after {timeout:?} waiting for repository lock {}", path.display())]
    RepositoryLockTimeout { path: PathBuf, timeout: Duration },

    #[error("no repositories registered in {}", .0.display())]
    NoRepositories(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl RepositoryError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result of [`RepositorySynchronizer::ensure_repository`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The repository was added to the shared file by this call
    Registered,
    /// The repository was already present; nothing was fetched or written
    AlreadyRegistered,
}

/// Per-repository result of [`RepositorySynchronizer::refresh_all`]
#[derive(Debug)]
pub struct RefreshOutcome {
    pub name: String,
    pub result: Result<RefreshStatus, RepositoryError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    /// Cached index was rewritten with new content
    Updated,
    /// Remote index matched the cached copy
    Unchanged,
}

impl RefreshStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Registry of chart repositories backed by the shared repository file
///
/// Built once at startup and shared behind an `Arc`.
pub struct RepositorySynchronizer {
    repository_config: PathBuf,
    repository_cache: PathBuf,
    lock_timeout: Duration,
    poll_interval: Duration,
    fetcher: Arc<dyn IndexFetcher>,
}

impl std::fmt::Debug for RepositorySynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositorySynchronizer")
            .field("repository_config", &self.repository_config)
            .field("repository_cache", &self.repository_cache)
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}

impl RepositorySynchronizer {
    #[must_use]
    pub fn new(
        repository_config: PathBuf,
        repository_cache: PathBuf,
        lock_timeout: Duration,
        fetcher: Arc<dyn IndexFetcher>,
    ) -> Self {
        Self {
            repository_config,
            repository_cache,
            lock_timeout,
            poll_interval: Duration::from_millis(REPOSITORY_LOCK_POLL_INTERVAL_MS),
            fetcher,
        }
    }

    #[must_use]
    pub fn from_config(config: &ControllerConfig, fetcher: Arc<dyn IndexFetcher>) -> Self {
        Self::new(
            config.repository_config.clone(),
            config.repository_cache.clone(),
            config.repository_lock_timeout(),
            fetcher,
        )
    }

    /// Path of the shared repository file
    #[must_use]
    pub fn repository_config(&self) -> &Path {
        &self.repository_config
    }

    /// Cached index location for a repository
    #[must_use]
    pub fn index_path(&self, name: &str) -> PathBuf {
        self.repository_cache.join(format!("{name}-index.yaml"))
    }

    async fn lock(&self) -> Result<RepositoryLock, RepositoryError> {
        RepositoryLock::acquire(
            &RepositoryLock::lock_path_for(&self.repository_config),
            self.lock_timeout,
            self.poll_interval,
        )
        .await
    }

    /// Snapshot of the shared repository file, read under the lock
    ///
    /// # Errors
    ///
    /// Returns `RepositoryLockTimeout`, `Io` or `Parse`.
    pub async fn registered(&self) -> Result<RepositoryFile, RepositoryError> {
        let _guard = self.lock().await?;
        RepositoryFile::load(&self.repository_config)
    }

    /// Register `name` → `url` unless it is already present
    ///
    /// # Errors
    ///
    /// Returns `RepositoryUnreachable` if the index cannot be downloaded or is
    /// not a chart repository index; the shared file is untouched in that case.
    pub async fn ensure_repository(
        &self,
        name: &str,
        url: &str,
    ) -> Result<EnsureOutcome, RepositoryError> {
        let span = info_span!("repository.ensure", repository.name = name, repository.url = url);
        async move {
            if self.registered().await?.has(name) {
                debug!("Repository {} already registered", name);
                return Ok(EnsureOutcome::AlreadyRegistered);
            }

            let body = self.download(name, url).await?;
            file::write_atomic(&self.index_path(name), &body)?;

            let _guard = self.lock().await?;
            let mut registry = RepositoryFile::load(&self.repository_config)?;
            if registry.has(name) {
                debug!("Repository {} registered concurrently", name);
                return Ok(EnsureOutcome::AlreadyRegistered);
            }
            registry.update(RepositoryEntry::new(name, url));
            registry.write_atomic(&self.repository_config)?;

            info!("Registered chart repository {} ({})", name, url);
            Ok(EnsureOutcome::Registered)
        }
        .instrument(span)
        .await
    }

    /// Re-download every registered index concurrently
    ///
    /// Every repository gets its own outcome; one failure never affects the
    /// others and the call returns after all fetches complete.
    ///
    /// # Errors
    ///
    /// Returns `NoRepositories` when the shared file lists nothing, or a lock
    /// or parse error reading it.
    pub async fn refresh_all(&self) -> Result<Vec<RefreshOutcome>, RepositoryError> {
        let registry = self.registered().await?;
        if registry.repositories.is_empty() {
            return Err(RepositoryError::NoRepositories(
                self.repository_config.clone(),
            ));
        }

        let fetches = registry.repositories.iter().map(|entry| async move {
            let result = self.refresh_one(&entry.name, &entry.url).await;
            match &result {
                Ok(status) => {
                    debug!("Repository {} refresh: {}", entry.name, status.as_str());
                    metrics::increment_repository_refresh(&entry.name, status.as_str());
                }
                Err(e) => {
                    warn!("Failed to refresh repository {}: {}", entry.name, e);
                    metrics::increment_repository_refresh(&entry.name, "failed");
                }
            }
            RefreshOutcome {
                name: entry.name.clone(),
                result,
            }
        });

        let outcomes = join_all(fetches).await;
        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        if failed > 0 {
            error!(
                "{} of {} repositories failed to refresh",
                failed,
                outcomes.len()
            );
        } else {
            info!("Refreshed {} chart repositories", outcomes.len());
        }
        Ok(outcomes)
    }

    async fn refresh_one(&self, name: &str, url: &str) -> Result<RefreshStatus, RepositoryError> {
        let body = self.download(name, url).await?;
        let path = self.index_path(name);

        let current = match std::fs::read(&path) {
            Ok(bytes) => Some(Sha256::digest(&bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(RepositoryError::io(&path, e)),
        };
        if current.is_some_and(|digest| digest == Sha256::digest(&body)) {
            return Ok(RefreshStatus::Unchanged);
        }

        file::write_atomic(&path, &body)?;
        Ok(RefreshStatus::Updated)
    }

    async fn download(&self, name: &str, url: &str) -> Result<Vec<u8>, RepositoryError> {
        let unreachable = |reason: String| RepositoryError::RepositoryUnreachable {
            name: name.to_string(),
            url: url.to_string(),
            reason,
        };
        let body = self
            .fetcher
            .fetch_index(url)
            .await
            .map_err(|e| unreachable(format!("{e:#}")))?;
        validate_index(&body)
            .map_err(|e| unreachable(format!("not a valid chart repository: {e:#}")))?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const INDEX: &[u8] = b"apiVersion: v1\nentries: {}\n";

    #[derive(Default)]
    struct StubFetcher {
        bodies: Mutex<HashMap<String, Vec<u8>>>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn serve(&self, url: &str, body: &[u8]) {
            self.bodies
                .lock()
                .unwrap()
                .insert(url.to_string(), body.to_vec());
        }
    }

    #[async_trait]
    impl IndexFetcher for StubFetcher {
        async fn fetch_index(&self, url: &str) -> anyhow::Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bodies
                .lock()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("404 Not Found"))
        }
    }

    fn synchronizer(dir: &Path, fetcher: Arc<StubFetcher>) -> RepositorySynchronizer {
        RepositorySynchronizer::new(
            dir.join("repositories.yaml"),
            dir.join("repository"),
            Duration::from_secs(5),
            fetcher,
        )
    }

    #[tokio::test]
    async fn test_ensure_registers_then_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.serve("https://charts.example.com", INDEX);
        let sync = synchronizer(dir.path(), Arc::clone(&fetcher));

        let first = sync
            .ensure_repository("example", "https://charts.example.com")
            .await
            .unwrap();
        assert_eq!(first, EnsureOutcome::Registered);
        assert!(sync.index_path("example").exists());

        let second = sync
            .ensure_repository("example", "https://charts.example.com")
            .await
            .unwrap();
        assert_eq!(second, EnsureOutcome::AlreadyRegistered);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(StubFetcher::default());
        let sync = synchronizer(dir.path(), fetcher);

        let err = sync
            .ensure_repository("missing", "https://nowhere.example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::RepositoryUnreachable { .. }));
        assert!(!dir.path().join("repositories.yaml").exists());
    }

    #[tokio::test]
    async fn test_invalid_index_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.serve("https://html.example.com", b"<html></html>");
        let sync = synchronizer(dir.path(), fetcher);

        let err = sync
            .ensure_repository("html", "https://html.example.com")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a valid chart repository"));
    }

    #[tokio::test]
    async fn test_refresh_all_requires_repositories() {
        let dir = tempfile::tempdir().unwrap();
        let sync = synchronizer(dir.path(), Arc::new(StubFetcher::default()));
        assert!(matches!(
            sync.refresh_all().await,
            Err(RepositoryError::NoRepositories(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_all_isolates_failures_and_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(StubFetcher::default());
        fetcher.serve("https://a.example.com", INDEX);
        fetcher.serve("https://b.example.com", INDEX);
        let sync = synchronizer(dir.path(), Arc::clone(&fetcher));
        sync.ensure_repository("a", "https://a.example.com").await.unwrap();
        sync.ensure_repository("b", "https://b.example.com").await.unwrap();

        fetcher.serve(
            "https://a.example.com",
            b"apiVersion: v1\nentries:\n  redis: []\n",
        );
        fetcher.bodies.lock().unwrap().remove("https://b.example.com");

        let outcomes = sync.refresh_all().await.unwrap();
        assert_eq!(outcomes.len(), 2);
        let by_name: HashMap<_, _> = outcomes
            .iter()
            .map(|o| (o.name.as_str(), &o.result))
            .collect();
        assert!(matches!(by_name["a"], Ok(RefreshStatus::Updated)));
        assert!(matches!(
            by_name["b"],
            Err(RepositoryError::RepositoryUnreachable { .. })
        ));

        let again = sync.refresh_all().await.unwrap();
        let a = again.iter().find(|o| o.name == "a").unwrap();
        assert!(matches!(a.result, Ok(RefreshStatus::Unchanged)));
    }
}
