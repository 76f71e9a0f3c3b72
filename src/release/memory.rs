//! # In-Memory Runtime
//!
//! A process-local [`ChartRuntime`] that keeps release history in a map and
//! renders manifests deterministically from the chart coordinates and values.
//! Used by tests and local dry runs; nothing leaves the process.

use crate::release::{
    ChartRuntime, HistoryStatus, ReleaseRecord, ReleaseRequest, RuntimeError,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

/// Operations that can be made to fail on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    History,
    Deployed,
    DeleteRevision,
    Render,
    Install,
    Upgrade,
}

type ReleaseKey = (String, String);

#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    releases: Mutex<BTreeMap<ReleaseKey, Vec<ReleaseRecord>>>,
    failing: Mutex<HashSet<Operation>>,
}

impl InMemoryRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a history entry as-is
    pub fn seed(&self, record: ReleaseRecord) {
        let mut releases = lock(&self.releases);
        releases
            .entry((record.namespace.clone(), record.name.clone()))
            .or_default()
            .push(record);
    }

    /// History entries of one release, sorted by revision
    #[must_use]
    pub fn records(&self, namespace: &str, name: &str) -> Vec<ReleaseRecord> {
        let releases = lock(&self.releases);
        let mut records = releases
            .get(&key(namespace, name))
            .cloned()
            .unwrap_or_default();
        records.sort_by_key(|r| r.revision);
        records
    }

    /// Make every later call of `operation` fail until [`Self::recover`]
    pub fn fail(&self, operation: Operation) {
        lock(&self.failing).insert(operation);
    }

    pub fn recover(&self, operation: Operation) {
        lock(&self.failing).remove(&operation);
    }

    fn check(&self, operation: Operation) -> Result<(), RuntimeError> {
        if lock(&self.failing).contains(&operation) {
            return Err(RuntimeError::Command {
                command: format!("{operation:?}").to_lowercase(),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn record_for(request: &ReleaseRequest, revision: u32) -> ReleaseRecord {
        ReleaseRecord {
            name: request.name.clone(),
            namespace: request.namespace.clone(),
            revision,
            status: HistoryStatus::Deployed,
            chart_name: Some(request.chart.chart.clone()),
            chart_version: Some(request.chart.version.clone()),
            manifest: render_manifest(request),
        }
    }
}

/// Deterministic stand-in for a chart render
///
/// Equal requests render byte-identical manifests; any change to the chart,
/// version, namespace or values changes the output.
#[must_use]
pub fn render_manifest(request: &ReleaseRequest) -> String {
    format!(
        "---\n# Source: {chart}/templates/release.yaml\nchart: {chart}-{version}\nrelease: {name}\nnamespace: {namespace}\nvalues: {values}\n",
        chart = request.chart.chart,
        version = request.chart.version,
        name = request.name,
        namespace = request.namespace,
        values = request.values,
    )
}

fn key(namespace: &str, name: &str) -> ReleaseKey {
    (namespace.to_string(), name.to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl ChartRuntime for InMemoryRuntime {
    async fn history(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<ReleaseRecord>, RuntimeError> {
        self.check(Operation::History)?;
        let releases = lock(&self.releases);
        match releases.get(&key(namespace, name)) {
            Some(records) if !records.is_empty() => Ok(records.clone()),
            _ => Err(RuntimeError::NotFound(name.to_string())),
        }
    }

    async fn deployed(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ReleaseRecord>, RuntimeError> {
        self.check(Operation::Deployed)?;
        let releases = lock(&self.releases);
        Ok(releases.get(&key(namespace, name)).and_then(|records| {
            records
                .iter()
                .filter(|r| r.status == HistoryStatus::Deployed)
                .max_by_key(|r| r.revision)
                .cloned()
        }))
    }

    async fn delete_revision(
        &self,
        namespace: &str,
        name: &str,
        revision: u32,
    ) -> Result<(), RuntimeError> {
        self.check(Operation::DeleteRevision)?;
        let mut releases = lock(&self.releases);
        let records = releases
            .get_mut(&key(namespace, name))
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        let before = records.len();
        records.retain(|r| r.revision != revision);
        if records.len() == before {
            return Err(RuntimeError::NotFound(format!("{name}.v{revision}")));
        }
        Ok(())
    }

    async fn render_upgrade(&self, request: &ReleaseRequest) -> Result<String, RuntimeError> {
        self.check(Operation::Render)?;
        Ok(render_manifest(request))
    }

    async fn install(&self, request: &ReleaseRequest) -> Result<ReleaseRecord, RuntimeError> {
        self.check(Operation::Install)?;
        let mut releases = lock(&self.releases);
        let records = releases
            .entry(key(&request.namespace, &request.name))
            .or_default();
        if records.iter().any(|r| r.status == HistoryStatus::Deployed) {
            return Err(RuntimeError::Command {
                command: "install".to_string(),
                stderr: "cannot re-use a name that is still in use".to_string(),
            });
        }
        let revision = records.iter().map(|r| r.revision).max().unwrap_or(0) + 1;
        let record = Self::record_for(request, revision);
        records.push(record.clone());
        Ok(record)
    }

    async fn upgrade(&self, request: &ReleaseRequest) -> Result<ReleaseRecord, RuntimeError> {
        self.check(Operation::Upgrade)?;
        let mut releases = lock(&self.releases);
        let records = releases
            .get_mut(&key(&request.namespace, &request.name))
            .filter(|records| records.iter().any(|r| r.status == HistoryStatus::Deployed))
            .ok_or_else(|| RuntimeError::NotFound(request.name.clone()))?;
        for record in records.iter_mut() {
            if record.status == HistoryStatus::Deployed {
                record.status = HistoryStatus::Superseded;
            }
        }
        let revision = records.iter().map(|r| r.revision).max().unwrap_or(0) + 1;
        let record = Self::record_for(request, revision);
        records.push(record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::ChartCoordinates;
    use serde_json::json;

    fn request() -> ReleaseRequest {
        ReleaseRequest {
            name: "cache-redis".to_string(),
            namespace: "shop".to_string(),
            chart: ChartCoordinates {
                repository_name: "bitnami".to_string(),
                repository_url: "https://charts.bitnami.com/bitnami".to_string(),
                chart: "redis".to_string(),
                version: "12.8.3".to_string(),
            },
            values: json!({}),
        }
    }

    #[tokio::test]
    async fn test_history_of_unknown_release_is_not_found() {
        let runtime = InMemoryRuntime::new();
        let err = runtime.history("shop", "cache-redis").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_upgrade_supersedes_previous_revision() {
        let runtime = InMemoryRuntime::new();
        runtime.install(&request()).await.unwrap();
        let upgraded = runtime.upgrade(&request()).await.unwrap();
        assert_eq!(upgraded.revision, 2);

        let records = runtime.records("shop", "cache-redis");
        assert_eq!(records[0].status, HistoryStatus::Superseded);
        assert_eq!(records[1].status, HistoryStatus::Deployed);
    }

    #[tokio::test]
    async fn test_install_over_deployed_release_fails() {
        let runtime = InMemoryRuntime::new();
        runtime.install(&request()).await.unwrap();
        assert!(runtime.install(&request()).await.is_err());
    }

    #[tokio::test]
    async fn test_render_tracks_values() {
        let mut changed = request();
        changed.values = json!({"architecture": "standalone"});
        assert_ne!(render_manifest(&request()), render_manifest(&changed));
        assert_eq!(render_manifest(&request()), render_manifest(&request()));
    }

    #[tokio::test]
    async fn test_injected_failure_until_recovered() {
        let runtime = InMemoryRuntime::new();
        runtime.fail(Operation::Install);
        assert!(runtime.install(&request()).await.is_err());
        runtime.recover(Operation::Install);
        assert!(runtime.install(&request()).await.is_ok());
    }
}
