//! # Release Manager
//!
//! Per-release state machine. [`ReleaseManager::sync`] only classifies the
//! release; installing and upgrading are separate explicit calls.
//!
//! ```text
//! Unknown ──sync──► NotInstalled ──install──► Installed
//!    │                                           ▲
//!    └──sync──► Installed ──(manifest drift)──► UpgradeRequired ──upgrade──┘
//!
//! any failure ──► Failed
//! ```

use crate::observability::metrics;
use crate::release::{
    merge_values, ChartRuntime, DependencyStrategy, HistoryStatus, ReleaseError, ReleaseRecord,
    ReleaseRequest,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// Classification of a release after the last operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseState {
    #[default]
    Unknown,
    NotInstalled,
    Installed,
    UpgradeRequired,
    Failed,
}

impl ReleaseState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::NotInstalled => "NotInstalled",
            Self::Installed => "Installed",
            Self::UpgradeRequired => "UpgradeRequired",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ReleaseManager {
    runtime: Arc<dyn ChartRuntime>,
    strategy: DependencyStrategy,
    release_name: String,
    namespace: String,
    values: Value,
    state: ReleaseState,
    deployed: Option<ReleaseRecord>,
}

impl fmt::Debug for ReleaseManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseManager")
            .field("kind", &self.strategy.kind)
            .field("release_name", &self.release_name)
            .field("namespace", &self.namespace)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ReleaseManager {
    /// Manager for `release_name` in `namespace`; `overrides` are merged over
    /// the strategy's default values
    #[must_use]
    pub fn new(
        runtime: Arc<dyn ChartRuntime>,
        strategy: DependencyStrategy,
        release_name: String,
        namespace: String,
        overrides: &Value,
    ) -> Self {
        let values = merge_values(&strategy.default_values, overrides);
        Self {
            runtime,
            strategy,
            release_name,
            namespace,
            values,
            state: ReleaseState::Unknown,
            deployed: None,
        }
    }

    #[must_use]
    pub fn release_name(&self) -> &str {
        &self.release_name
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn strategy(&self) -> &DependencyStrategy {
        &self.strategy
    }

    #[must_use]
    pub fn state(&self) -> ReleaseState {
        self.state
    }

    #[must_use]
    pub fn values(&self) -> &Value {
        &self.values
    }

    /// Entry recorded by the last sync, install or upgrade
    #[must_use]
    pub fn deployed(&self) -> Option<&ReleaseRecord> {
        self.deployed.as_ref()
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        matches!(
            self.state,
            ReleaseState::Installed | ReleaseState::UpgradeRequired
        )
    }

    #[must_use]
    pub fn is_upgrade_required(&self) -> bool {
        self.state == ReleaseState::UpgradeRequired
    }

    fn request(&self) -> ReleaseRequest {
        ReleaseRequest {
            name: self.release_name.clone(),
            namespace: self.namespace.clone(),
            chart: self.strategy.chart.clone(),
            values: self.values.clone(),
        }
    }

    fn fail(&mut self, operation: &str, error: ReleaseError) -> ReleaseError {
        self.state = ReleaseState::Failed;
        metrics::increment_release_operation_errors(self.strategy.kind.as_str(), operation);
        warn!(
            "Release {}/{} {} failed: {}",
            self.namespace, self.release_name, operation, error
        );
        error
    }

    /// Reap stale history, then classify the release
    ///
    /// # Errors
    ///
    /// `HistoryCleanupFailed`, `DeployedReleaseUnreadable` or `RenderFailed`;
    /// the state is `Failed` afterwards.
    pub async fn sync(&mut self) -> Result<ReleaseState, ReleaseError> {
        let span = info_span!(
            "release.sync",
            release.name = %self.release_name,
            release.namespace = %self.namespace,
            dependency = %self.strategy.kind,
        );
        async move {
            self.state = ReleaseState::Unknown;
            self.deployed = None;

            let result = self.classify().await;
            match result {
                Ok(state) => {
                    self.state = state;
                    metrics::increment_release_syncs(self.strategy.kind.as_str(), state.as_str());
                    debug!("Release {}/{} is {}", self.namespace, self.release_name, state);
                    Ok(state)
                }
                Err(e) => Err(self.fail("sync", e)),
            }
        }
        .instrument(span)
        .await
    }

    async fn classify(&mut self) -> Result<ReleaseState, ReleaseError> {
        let history = match self
            .runtime
            .history(&self.namespace, &self.release_name)
            .await
        {
            Ok(history) => history,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        for stale in history
            .iter()
            .filter(|r| r.status != HistoryStatus::Deployed)
        {
            debug!(
                "Deleting {} revision {} of release {}",
                stale.status, stale.revision, self.release_name
            );
            match self
                .runtime
                .delete_revision(&self.namespace, &self.release_name, stale.revision)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(source) => {
                    return Err(ReleaseError::HistoryCleanupFailed {
                        release: self.release_name.clone(),
                        revision: stale.revision,
                        source,
                    })
                }
            }
        }

        let deployed = match self
            .runtime
            .deployed(&self.namespace, &self.release_name)
            .await
        {
            Ok(Some(deployed)) => deployed,
            Ok(None) => return Ok(ReleaseState::NotInstalled),
            Err(e) if e.is_not_found() => return Ok(ReleaseState::NotInstalled),
            Err(e) => {
                return Err(ReleaseError::DeployedReleaseUnreadable {
                    release: self.release_name.clone(),
                    reason: e.to_string(),
                })
            }
        };

        let candidate = self
            .runtime
            .render_upgrade(&self.request())
            .await
            .map_err(|source| ReleaseError::RenderFailed {
                release: self.release_name.clone(),
                source,
            })?;

        let state = if deployed.manifest == candidate {
            ReleaseState::Installed
        } else {
            ReleaseState::UpgradeRequired
        };
        self.deployed = Some(deployed);
        Ok(state)
    }

    /// Install the release with the manager's chart and values
    ///
    /// # Errors
    ///
    /// Returns `InstallFailed`; the state is `Failed` afterwards.
    pub async fn install(&mut self) -> Result<ReleaseRecord, ReleaseError> {
        let request = self.request();
        let span = info_span!(
            "release.install",
            release.name = %self.release_name,
            release.namespace = %self.namespace,
            chart = %request.chart.reference(),
            chart.version = %request.chart.version,
        );
        match self.runtime.install(&request).instrument(span).await {
            Ok(record) => {
                info!(
                    "Installed release {}/{} ({} {}) revision {}",
                    self.namespace,
                    self.release_name,
                    request.chart.chart,
                    request.chart.version,
                    record.revision
                );
                metrics::increment_release_installs(self.strategy.kind.as_str());
                self.state = ReleaseState::Installed;
                self.deployed = Some(record.clone());
                Ok(record)
            }
            Err(source) => Err(self.fail(
                "install",
                ReleaseError::InstallFailed {
                    release: self.release_name.clone(),
                    source,
                },
            )),
        }
    }

    /// Upgrade the deployed release to the manager's chart and values
    ///
    /// # Errors
    ///
    /// Returns `UpgradeFailed`; the state is `Failed` afterwards.
    pub async fn upgrade(&mut self) -> Result<ReleaseRecord, ReleaseError> {
        let request = self.request();
        let span = info_span!(
            "release.upgrade",
            release.name = %self.release_name,
            release.namespace = %self.namespace,
            chart = %request.chart.reference(),
            chart.version = %request.chart.version,
        );
        match self.runtime.upgrade(&request).instrument(span).await {
            Ok(record) => {
                info!(
                    "Upgraded release {}/{} to revision {}",
                    self.namespace, self.release_name, record.revision
                );
                metrics::increment_release_upgrades(self.strategy.kind.as_str());
                self.state = ReleaseState::Installed;
                self.deployed = Some(record.clone());
                Ok(record)
            }
            Err(source) => Err(self.fail(
                "upgrade",
                ReleaseError::UpgradeFailed {
                    release: self.release_name.clone(),
                    source,
                },
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChartCatalog;
    use crate::release::{DependencyKind, InMemoryRuntime, Operation};
    use serde_json::json;

    fn manager(runtime: &Arc<InMemoryRuntime>, kind: DependencyKind, overrides: &Value) -> ReleaseManager {
        let strategy = ChartCatalog::default().strategy(kind).unwrap().clone();
        let name = strategy.release_name.clone();
        ReleaseManager::new(
            Arc::clone(runtime) as Arc<dyn ChartRuntime>,
            strategy,
            name,
            "shop".to_string(),
            overrides,
        )
    }

    fn stale(revision: u32, status: HistoryStatus) -> ReleaseRecord {
        ReleaseRecord {
            name: "cache-redis".to_string(),
            namespace: "shop".to_string(),
            revision,
            status,
            chart_name: Some("redis".to_string()),
            chart_version: Some("12.8.3".to_string()),
            manifest: String::new(),
        }
    }

    #[tokio::test]
    async fn test_no_history_is_not_installed() {
        let runtime = Arc::new(InMemoryRuntime::new());
        let mut manager = manager(&runtime, DependencyKind::Redis, &json!({}));
        assert_eq!(manager.sync().await.unwrap(), ReleaseState::NotInstalled);
        assert!(!manager.is_installed());
        assert!(runtime.records("shop", "cache-redis").is_empty());
    }

    #[tokio::test]
    async fn test_install_then_sync_is_installed() {
        let runtime = Arc::new(InMemoryRuntime::new());
        let mut manager = manager(&runtime, DependencyKind::Redis, &json!({}));
        manager.sync().await.unwrap();
        manager.install().await.unwrap();
        assert_eq!(manager.sync().await.unwrap(), ReleaseState::Installed);
        assert!(!manager.is_upgrade_required());
    }

    #[tokio::test]
    async fn test_changed_values_require_upgrade() {
        let runtime = Arc::new(InMemoryRuntime::new());
        manager(&runtime, DependencyKind::Redis, &json!({}))
            .install()
            .await
            .unwrap();

        let mut drifted = manager(&runtime, DependencyKind::Redis, &json!({"cluster": {"enabled": false}}));
        assert_eq!(drifted.sync().await.unwrap(), ReleaseState::UpgradeRequired);
        assert!(drifted.is_installed());

        drifted.upgrade().await.unwrap();
        assert_eq!(drifted.sync().await.unwrap(), ReleaseState::Installed);
    }

    #[tokio::test]
    async fn test_sync_reaps_non_deployed_history() {
        let runtime = Arc::new(InMemoryRuntime::new());
        runtime.seed(stale(1, HistoryStatus::Failed));
        runtime.seed(stale(2, HistoryStatus::PendingInstall));

        let mut manager = manager(&runtime, DependencyKind::Redis, &json!({}));
        assert_eq!(manager.sync().await.unwrap(), ReleaseState::NotInstalled);
        assert!(runtime.records("shop", "cache-redis").is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_failure_aborts_sync() {
        let runtime = Arc::new(InMemoryRuntime::new());
        runtime.seed(stale(1, HistoryStatus::Failed));
        runtime.fail(Operation::DeleteRevision);

        let mut manager = manager(&runtime, DependencyKind::Redis, &json!({}));
        assert!(matches!(
            manager.sync().await,
            Err(ReleaseError::HistoryCleanupFailed { revision: 1, .. })
        ));
        assert_eq!(manager.state(), ReleaseState::Failed);
    }

    #[tokio::test]
    async fn test_render_failure_is_reported() {
        let runtime = Arc::new(InMemoryRuntime::new());
        let mut manager = manager(&runtime, DependencyKind::Redis, &json!({}));
        manager.install().await.unwrap();
        runtime.fail(Operation::Render);
        assert!(matches!(
            manager.sync().await,
            Err(ReleaseError::RenderFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_install_moves_to_failed() {
        let runtime = Arc::new(InMemoryRuntime::new());
        runtime.fail(Operation::Install);
        let mut manager = manager(&runtime, DependencyKind::MySQL, &json!({}));
        assert!(matches!(
            manager.install().await,
            Err(ReleaseError::InstallFailed { .. })
        ));
        assert_eq!(manager.state(), ReleaseState::Failed);
    }

    #[test]
    fn test_overrides_merge_over_defaults() {
        let runtime = Arc::new(InMemoryRuntime::new());
        let manager = manager(
            &runtime,
            DependencyKind::RabbitMQ,
            &json!({"auth": {"password": "changed"}}),
        );
        assert_eq!(
            manager.values(),
            &json!({"auth": {"username": "user", "password": "changed", "erlangCookie": "1234567890"}})
        );
    }
}
