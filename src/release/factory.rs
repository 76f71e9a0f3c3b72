//! # Manager Factory
//!
//! Builds a [`ReleaseManager`] for one dependency: makes sure its chart
//! repository is registered and fresh, resolves the release name, then hands
//! back a manager ready for `sync`.

use crate::config::ChartCatalog;
use crate::release::{
    ChartRuntime, DependencyKind, DependencyStrategy, ReleaseError, ReleaseManager,
    ReleaseResolver,
};
use crate::repository::RepositorySynchronizer;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ManagerFactory {
    synchronizer: Arc<RepositorySynchronizer>,
    runtime: Arc<dyn ChartRuntime>,
    resolver: ReleaseResolver,
    catalog: Arc<ChartCatalog>,
}

impl std::fmt::Debug for ManagerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerFactory")
            .field("synchronizer", &self.synchronizer)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl ManagerFactory {
    #[must_use]
    pub fn new(
        synchronizer: Arc<RepositorySynchronizer>,
        runtime: Arc<dyn ChartRuntime>,
        catalog: Arc<ChartCatalog>,
    ) -> Self {
        Self {
            synchronizer,
            resolver: ReleaseResolver::new(Arc::clone(&runtime)),
            runtime,
            catalog,
        }
    }

    #[must_use]
    pub fn strategy(&self, kind: DependencyKind) -> Option<&DependencyStrategy> {
        self.catalog.strategy(kind)
    }

    /// Prepare a manager for `strategy` in `namespace`
    ///
    /// Per-repository refresh failures are logged and do not fail the build;
    /// the index cached by `ensure_repository` is still usable.
    ///
    /// # Errors
    ///
    /// Repository registration and lock errors, plus every resolver error.
    pub async fn build(
        &self,
        strategy: &DependencyStrategy,
        namespace: &str,
        overrides: &Value,
    ) -> Result<ReleaseManager, ReleaseError> {
        let chart = &strategy.chart;
        self.synchronizer
            .ensure_repository(&chart.repository_name, &chart.repository_url)
            .await?;

        for outcome in self.synchronizer.refresh_all().await? {
            if let Err(e) = outcome.result {
                warn!(
                    "Continuing with cached index for {} after refresh failure: {}",
                    outcome.name, e
                );
            }
        }

        let release_name = self
            .resolver
            .resolve(namespace, &strategy.release_name, &chart.chart)
            .await?;
        debug!(
            "Resolved {} release {}/{}",
            strategy.kind, namespace, release_name
        );

        Ok(ReleaseManager::new(
            Arc::clone(&self.runtime),
            strategy.clone(),
            release_name,
            namespace.to_string(),
            overrides,
        ))
    }
}
