//! # Release Resolver
//!
//! Maps a (namespace, dependency kind) pair to its release name and refuses to
//! hand out a name that another chart already owns.

use crate::release::{ChartRuntime, ReleaseError};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::debug;

/// Longest release name the package manager accepts
pub const MAX_RELEASE_NAME_LEN: usize = 53;

static RELEASE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("Failed to compile RELEASE_NAME pattern - this should never happen")
});

/// Reject names the package manager would refuse
///
/// # Errors
///
/// Returns `InvalidReleaseName` for empty, over-long or non DNS-1123 names.
pub fn validate_release_name(name: &str) -> Result<(), ReleaseError> {
    let invalid = |reason: &str| ReleaseError::InvalidReleaseName {
        release: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.len() > MAX_RELEASE_NAME_LEN {
        return Err(invalid("name is longer than 53 characters"));
    }
    if !RELEASE_NAME.is_match(name) {
        return Err(invalid(
            "name must consist of lower case alphanumeric characters, '-' or '.'",
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ReleaseResolver {
    runtime: Arc<dyn ChartRuntime>,
}

impl std::fmt::Debug for ReleaseResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseResolver").finish_non_exhaustive()
    }
}

impl ReleaseResolver {
    #[must_use]
    pub fn new(runtime: Arc<dyn ChartRuntime>) -> Self {
        Self { runtime }
    }

    /// Return `desired` if it is free or already owned by `expected_chart`
    ///
    /// # Errors
    ///
    /// `InvalidReleaseName` before any lookup, `ReleaseNameCollision` when the
    /// newest history entry belongs to another chart, `DeployedReleaseUnreadable`
    /// when that entry carries no chart metadata.
    pub async fn resolve(
        &self,
        namespace: &str,
        desired: &str,
        expected_chart: &str,
    ) -> Result<String, ReleaseError> {
        validate_release_name(desired)?;

        let history = match self.runtime.history(namespace, desired).await {
            Ok(history) => history,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let Some(latest) = history.iter().max_by_key(|r| r.revision) else {
            debug!("Release name {}/{} is free", namespace, desired);
            return Ok(desired.to_string());
        };

        match latest.chart_name.as_deref() {
            Some(chart) if chart == expected_chart => Ok(desired.to_string()),
            Some(chart) => Err(ReleaseError::ReleaseNameCollision {
                release: desired.to_string(),
                namespace: namespace.to_string(),
                existing_chart: chart.to_string(),
            }),
            None => Err(ReleaseError::DeployedReleaseUnreadable {
                release: desired.to_string(),
                reason: format!("revision {} has no chart metadata", latest.revision),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::{HistoryStatus, InMemoryRuntime, ReleaseRecord};

    fn record(revision: u32, chart: Option<&str>) -> ReleaseRecord {
        ReleaseRecord {
            name: "cache-redis".to_string(),
            namespace: "shop".to_string(),
            revision,
            status: HistoryStatus::Superseded,
            chart_name: chart.map(str::to_string),
            chart_version: Some("1.0.0".to_string()),
            manifest: String::new(),
        }
    }

    mod validate_release_name_tests {
        use super::*;

        #[test]
        fn test_accepts_builtin_names() {
            for name in ["cache-redis", "cache-memcached", "stream-kafka", "db-mysql", "db"] {
                assert!(validate_release_name(name).is_ok(), "{name}");
            }
        }

        #[test]
        fn test_rejects_bad_names() {
            let long = "a".repeat(54);
            for name in ["", "Cache", "-db", "db-", "db_mysql", long.as_str()] {
                assert!(
                    matches!(
                        validate_release_name(name),
                        Err(ReleaseError::InvalidReleaseName { .. })
                    ),
                    "{name}"
                );
            }
        }
    }

    mod resolve_tests {
        use super::*;

        #[tokio::test]
        async fn test_free_name_is_returned() {
            let resolver = ReleaseResolver::new(Arc::new(InMemoryRuntime::new()));
            let name = resolver.resolve("shop", "cache-redis", "redis").await.unwrap();
            assert_eq!(name, "cache-redis");
        }

        #[tokio::test]
        async fn test_same_chart_is_reused() {
            let runtime = Arc::new(InMemoryRuntime::new());
            runtime.seed(record(1, Some("redis")));
            let resolver = ReleaseResolver::new(runtime);
            let name = resolver.resolve("shop", "cache-redis", "redis").await.unwrap();
            assert_eq!(name, "cache-redis");
        }

        #[tokio::test]
        async fn test_newest_entry_decides() {
            let runtime = Arc::new(InMemoryRuntime::new());
            runtime.seed(record(1, Some("redis")));
            runtime.seed(record(2, Some("memcached")));
            let resolver = ReleaseResolver::new(runtime);
            let err = resolver
                .resolve("shop", "cache-redis", "redis")
                .await
                .unwrap_err();
            match err {
                ReleaseError::ReleaseNameCollision { existing_chart, .. } => {
                    assert_eq!(existing_chart, "memcached");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test]
        async fn test_missing_chart_metadata_is_unreadable() {
            let runtime = Arc::new(InMemoryRuntime::new());
            runtime.seed(record(1, None));
            let resolver = ReleaseResolver::new(runtime);
            assert!(matches!(
                resolver.resolve("shop", "cache-redis", "redis").await,
                Err(ReleaseError::DeployedReleaseUnreadable { .. })
            ));
        }

        #[tokio::test]
        async fn test_other_namespace_does_not_collide() {
            let runtime = Arc::new(InMemoryRuntime::new());
            runtime.seed(record(1, Some("memcached")));
            let resolver = ReleaseResolver::new(runtime);
            let name = resolver.resolve("other", "cache-redis", "redis").await.unwrap();
            assert_eq!(name, "cache-redis");
        }
    }
}
