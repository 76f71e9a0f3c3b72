//! # Chart Catalog
//!
//! The strategy table: chart coordinates, release names, default values and
//! injected environment for every dependency kind.
//!
//! Versions can be pinned per kind with `CHART_VERSION_<KIND>` (for example
//! `CHART_VERSION_REDIS=12.8.3`), and `CHART_REPOSITORY_URL` points every kind
//! at a mirror of the default repository.

use crate::release::{ChartCoordinates, DependencyKind, DependencyStrategy};
use serde_json::json;
use std::collections::BTreeMap;

/// Default chart repository name
pub const DEFAULT_REPOSITORY_NAME: &str = "bitnami";

/// Default chart repository URL
pub const DEFAULT_REPOSITORY_URL: &str = "https://charts.bitnami.com/bitnami";

/// Strategy table keyed by dependency kind
#[derive(Debug, Clone)]
pub struct ChartCatalog {
    strategies: BTreeMap<DependencyKind, DependencyStrategy>,
}

impl Default for ChartCatalog {
    fn default() -> Self {
        Self::with_repository(DEFAULT_REPOSITORY_URL)
    }
}

impl ChartCatalog {
    /// Built-in table served from `repository_url`
    #[must_use]
    pub fn with_repository(repository_url: &str) -> Self {
        let strategies = DependencyKind::ALL
            .into_iter()
            .map(|kind| (kind, builtin(kind, repository_url)))
            .collect();
        Self { strategies }
    }

    /// Built-in table with environment overrides applied
    #[must_use]
    pub fn from_env() -> Self {
        let url = super::controller::env_var_or_default_str(
            "CHART_REPOSITORY_URL",
            DEFAULT_REPOSITORY_URL,
        );
        let mut catalog = Self::with_repository(&url);
        for (kind, strategy) in &mut catalog.strategies {
            let key = format!("CHART_VERSION_{}", kind.as_str().to_uppercase());
            if let Ok(version) = std::env::var(&key) {
                strategy.chart.version = version;
            }
        }
        catalog
    }

    /// Strategy for a kind; every kind has one
    #[must_use]
    pub fn strategy(&self, kind: DependencyKind) -> Option<&DependencyStrategy> {
        self.strategies.get(&kind)
    }

    /// Replace the strategy for its kind
    pub fn set(&mut self, strategy: DependencyStrategy) {
        self.strategies.insert(strategy.kind, strategy);
    }
}

fn builtin(kind: DependencyKind, repository_url: &str) -> DependencyStrategy {
    let (chart, version, release_name) = match kind {
        DependencyKind::Redis => ("redis", "12.8.3", "cache-redis"),
        DependencyKind::Memcached => ("memcached", "5.8.0", "cache-memcached"),
        DependencyKind::Kafka => ("kafka", "12.13.2", "stream-kafka"),
        DependencyKind::RabbitMQ => ("rabbitmq", "8.11.4", "stream-rabbitmq"),
        DependencyKind::MySQL => ("mysql", "8.5.1", "db-mysql"),
        DependencyKind::PostgreSQL => ("postgresql", "10.3.13", "db"),
    };

    let default_values = match kind {
        DependencyKind::RabbitMQ => json!({
            "auth": {
                "username": "user",
                "password": "clouldship",
                "erlangCookie": "1234567890",
            }
        }),
        DependencyKind::PostgreSQL => json!({
            "postgresqlPassword": "123456",
            "postgresqlDatabase": "cloudship",
            "postgresqlUsername": "cloudship",
        }),
        _ => json!({}),
    };

    let env: &[(&str, &str)] = match kind {
        DependencyKind::Redis => &[
            ("REDIS_HOST", "{release}-master.{namespace}.svc.cluster.local"),
            ("REDIS_PORT", "6379"),
        ],
        DependencyKind::Memcached => &[
            ("MEMCACHED_HOST", "{release}.{namespace}.svc.cluster.local"),
            ("MEMCACHED_PORT", "11211"),
        ],
        DependencyKind::MySQL => &[
            ("DATABASE_HOST", "{release}.{namespace}.svc.cluster.local"),
            ("DATABASE_PORT", "3306"),
        ],
        DependencyKind::PostgreSQL => &[
            ("DATABASE_HOST", "{release}-postgresql.{namespace}.svc.cluster.local"),
            ("DATABASE_PORT", "5432"),
            ("DATABASE_NAME", "cloudship"),
            ("DATABASE_USER", "cloudship"),
        ],
        DependencyKind::Kafka | DependencyKind::RabbitMQ => &[],
    };

    DependencyStrategy {
        kind,
        chart: ChartCoordinates {
            repository_name: DEFAULT_REPOSITORY_NAME.to_string(),
            repository_url: repository_url.to_string(),
            chart: chart.to_string(),
            version: version.to_string(),
        },
        release_name: release_name.to_string(),
        default_values,
        env: env
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
        installs: !matches!(kind, DependencyKind::Kafka | DependencyKind::RabbitMQ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_a_strategy() {
        let catalog = ChartCatalog::default();
        for kind in DependencyKind::ALL {
            let strategy = catalog.strategy(kind).unwrap();
            assert_eq!(strategy.kind, kind);
            assert_eq!(strategy.chart.repository_name, "bitnami");
        }
    }

    #[test]
    fn test_builtin_coordinates() {
        let catalog = ChartCatalog::default();
        let redis = catalog.strategy(DependencyKind::Redis).unwrap();
        assert_eq!(redis.chart.chart, "redis");
        assert_eq!(redis.chart.version, "12.8.3");
        assert_eq!(redis.release_name, "cache-redis");

        let postgres = catalog.strategy(DependencyKind::PostgreSQL).unwrap();
        assert_eq!(postgres.release_name, "db");
        assert_eq!(postgres.default_values["postgresqlUsername"], "cloudship");
    }

    #[test]
    fn test_event_streams_do_not_install() {
        let catalog = ChartCatalog::default();
        assert!(!catalog.strategy(DependencyKind::Kafka).unwrap().installs);
        assert!(!catalog.strategy(DependencyKind::RabbitMQ).unwrap().installs);
        assert!(catalog.strategy(DependencyKind::Memcached).unwrap().installs);
    }

    #[test]
    fn test_mirror_repository_applies_to_all_kinds() {
        let catalog = ChartCatalog::with_repository("https://mirror.example.com/bitnami");
        for kind in DependencyKind::ALL {
            assert_eq!(
                catalog.strategy(kind).unwrap().chart.repository_url,
                "https://mirror.example.com/bitnami"
            );
        }
    }
}
