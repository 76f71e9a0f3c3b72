//! # Dependency Releases
//!
//! Drives one declared dependency to its installed state: resolve a manager,
//! sync, then install or upgrade as the sync result demands.

use crate::controller::reconciler::ReconcilerError;
use crate::crd::DependencyReleaseStatus;
use crate::release::{parse_overrides, DependencyKind, ManagerFactory, ReleaseState};
use tracing::{debug, info};

/// State recorded for kinds the operator declares but does not install
pub const SKIPPED_STATE: &str = "Skipped";

/// Reconcile the release for `kind` in `namespace`
///
/// `values` are `key.path=value` overrides applied over the chart defaults.
///
/// # Errors
///
/// `UnsupportedDependency` when the catalog has no strategy for `kind`,
/// `InvalidValues` for a malformed override, otherwise the release error.
pub async fn reconcile_dependency(
    factory: &ManagerFactory,
    kind: DependencyKind,
    namespace: &str,
    values: &[String],
) -> Result<DependencyReleaseStatus, ReconcilerError> {
    let strategy = factory
        .strategy(kind)
        .cloned()
        .ok_or_else(|| ReconcilerError::UnsupportedDependency(kind.to_string()))?;

    if !strategy.installs {
        debug!("{} releases are not managed, skipping", kind);
        return Ok(DependencyReleaseStatus {
            kind: kind.to_string(),
            release_name: strategy.release_name.clone(),
            chart: strategy.chart.chart.clone(),
            chart_version: strategy.chart.version.clone(),
            state: SKIPPED_STATE.to_string(),
            message: Some(format!("{kind} releases are not installed by the operator")),
        });
    }

    let overrides = parse_overrides(values.iter().map(String::as_str))
        .map_err(ReconcilerError::InvalidValues)?;

    let mut manager = factory.build(&strategy, namespace, &overrides).await?;
    match manager.sync().await? {
        ReleaseState::NotInstalled => {
            manager.install().await?;
        }
        ReleaseState::UpgradeRequired => {
            info!(
                "Release {}/{} drifted from its chart, upgrading",
                namespace,
                manager.release_name()
            );
            manager.upgrade().await?;
        }
        _ => {}
    }

    let chart_version = manager
        .deployed()
        .and_then(|record| record.chart_version.clone())
        .unwrap_or_else(|| strategy.chart.version.clone());

    Ok(DependencyReleaseStatus {
        kind: kind.to_string(),
        release_name: manager.release_name().to_string(),
        chart: strategy.chart.chart.clone(),
        chart_version,
        state: manager.state().to_string(),
        message: None,
    })
}

/// Status entry for a dependency whose reconciliation failed
#[must_use]
pub fn failed_release_status(
    factory: &ManagerFactory,
    kind: DependencyKind,
    error: &ReconcilerError,
) -> DependencyReleaseStatus {
    let (release_name, chart, chart_version) = factory.strategy(kind).map_or_else(
        || (String::new(), String::new(), String::new()),
        |s| {
            (
                s.release_name.clone(),
                s.chart.chart.clone(),
                s.chart.version.clone(),
            )
        },
    );
    DependencyReleaseStatus {
        kind: kind.to_string(),
        release_name,
        chart,
        chart_version,
        state: ReleaseState::Failed.to_string(),
        message: Some(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChartCatalog;
    use crate::release::{InMemoryRuntime, Operation};
    use crate::repository::{IndexFetcher, RepositorySynchronizer};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    const INDEX: &[u8] = b"apiVersion: v1\nentries: {}\n";

    #[derive(Debug)]
    struct StaticIndex;

    #[async_trait]
    impl IndexFetcher for StaticIndex {
        async fn fetch_index(&self, _url: &str) -> anyhow::Result<Vec<u8>> {
            Ok(INDEX.to_vec())
        }
    }

    fn factory(dir: &Path, runtime: Arc<InMemoryRuntime>) -> ManagerFactory {
        let synchronizer = RepositorySynchronizer::new(
            dir.join("repositories.yaml"),
            dir.join("repository"),
            Duration::from_secs(5),
            Arc::new(StaticIndex),
        );
        ManagerFactory::new(
            Arc::new(synchronizer),
            runtime,
            Arc::new(ChartCatalog::default()),
        )
    }

    #[tokio::test]
    async fn test_first_pass_installs_then_second_pass_is_steady() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(InMemoryRuntime::new());
        let factory = factory(dir.path(), Arc::clone(&runtime));

        let first = reconcile_dependency(&factory, DependencyKind::Redis, "shop", &[])
            .await
            .unwrap();
        assert_eq!(first.state, "Installed");
        assert_eq!(first.release_name, "cache-redis");
        assert_eq!(runtime.records("shop", "cache-redis").len(), 1);

        let second = reconcile_dependency(&factory, DependencyKind::Redis, "shop", &[])
            .await
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(runtime.records("shop", "cache-redis").len(), 1);
    }

    #[tokio::test]
    async fn test_changed_values_trigger_upgrade() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(InMemoryRuntime::new());
        let factory = factory(dir.path(), Arc::clone(&runtime));

        reconcile_dependency(&factory, DependencyKind::Redis, "shop", &[])
            .await
            .unwrap();
        let status = reconcile_dependency(
            &factory,
            DependencyKind::Redis,
            "shop",
            &["cluster.enabled=false".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(status.state, "Installed");
        assert_eq!(runtime.records("shop", "cache-redis").len(), 2);
    }

    #[tokio::test]
    async fn test_event_stream_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(InMemoryRuntime::new());
        let factory = factory(dir.path(), Arc::clone(&runtime));

        let status = reconcile_dependency(&factory, DependencyKind::Kafka, "shop", &[])
            .await
            .unwrap();
        assert_eq!(status.state, SKIPPED_STATE);
        assert!(runtime.records("shop", &status.release_name).is_empty());
    }

    #[tokio::test]
    async fn test_malformed_override_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(dir.path(), Arc::new(InMemoryRuntime::new()));

        let err = reconcile_dependency(
            &factory,
            DependencyKind::Redis,
            "shop",
            &["no-equals-sign".to_string()],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReconcilerError::InvalidValues(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_install_failure_reports_failed_status() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(InMemoryRuntime::new());
        runtime.fail(Operation::Install);
        let factory = factory(dir.path(), Arc::clone(&runtime));

        let err = reconcile_dependency(&factory, DependencyKind::Memcached, "shop", &[])
            .await
            .unwrap_err();
        assert!(!err.is_fatal());

        let status = failed_release_status(&factory, DependencyKind::Memcached, &err);
        assert_eq!(status.state, "Failed");
        assert!(status.message.is_some());
    }
}
