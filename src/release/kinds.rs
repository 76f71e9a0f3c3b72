//! # Dependency Kinds
//!
//! Every dependency an Application or AppService can declare maps to one
//! [`DependencyStrategy`]: where its chart lives, what the release is called,
//! which values it starts from, and which environment variables it hands to
//! consuming workloads.

use crate::crd::{CacheType, DatabaseType, EventStreamType};
use k8s_openapi::api::core::v1::EnvVar;
use serde_json::Value;
use std::fmt;

/// A concrete dependency backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependencyKind {
    Redis,
    Memcached,
    Kafka,
    RabbitMQ,
    MySQL,
    PostgreSQL,
}

/// Which reference slot a dependency is declared in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyCategory {
    Cache,
    EventStream,
    Database,
}

impl DependencyKind {
    pub const ALL: [Self; 6] = [
        Self::Redis,
        Self::Memcached,
        Self::Kafka,
        Self::RabbitMQ,
        Self::MySQL,
        Self::PostgreSQL,
    ];

    #[must_use]
    pub fn category(self) -> DependencyCategory {
        match self {
            Self::Redis | Self::Memcached => DependencyCategory::Cache,
            Self::Kafka | Self::RabbitMQ => DependencyCategory::EventStream,
            Self::MySQL | Self::PostgreSQL => DependencyCategory::Database,
        }
    }

    /// Lowercase label used in metrics and environment variable names
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Redis => "redis",
            Self::Memcached => "memcached",
            Self::Kafka => "kafka",
            Self::RabbitMQ => "rabbitmq",
            Self::MySQL => "mysql",
            Self::PostgreSQL => "postgresql",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Redis => "Redis",
            Self::Memcached => "Memcached",
            Self::Kafka => "Kafka",
            Self::RabbitMQ => "RabbitMQ",
            Self::MySQL => "MySQL",
            Self::PostgreSQL => "PostgreSQL",
        };
        f.write_str(name)
    }
}

impl From<CacheType> for DependencyKind {
    fn from(value: CacheType) -> Self {
        match value {
            CacheType::Redis => Self::Redis,
            CacheType::Memcached => Self::Memcached,
        }
    }
}

impl From<EventStreamType> for DependencyKind {
    fn from(value: EventStreamType) -> Self {
        match value {
            EventStreamType::Kafka => Self::Kafka,
            EventStreamType::RabbitMQ => Self::RabbitMQ,
        }
    }
}

impl From<DatabaseType> for DependencyKind {
    fn from(value: DatabaseType) -> Self {
        match value {
            DatabaseType::MySQL => Self::MySQL,
            DatabaseType::PostgreSQL => Self::PostgreSQL,
        }
    }
}

/// Where a chart is fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartCoordinates {
    pub repository_name: String,
    pub repository_url: String,
    pub chart: String,
    pub version: String,
}

impl ChartCoordinates {
    /// `<repository>/<chart>` reference understood by the package manager
    #[must_use]
    pub fn reference(&self) -> String {
        format!("{}/{}", self.repository_name, self.chart)
    }
}

/// How one dependency kind is installed and consumed
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyStrategy {
    pub kind: DependencyKind,
    pub chart: ChartCoordinates,
    /// Fixed release name; one release of this kind per namespace
    pub release_name: String,
    pub default_values: Value,
    /// Environment variables handed to consuming containers.
    /// `{release}` and `{namespace}` are substituted in values.
    pub env: Vec<(String, String)>,
    /// Event-stream backends are declared but not yet installed
    pub installs: bool,
}

impl DependencyStrategy {
    /// Environment variables for workloads consuming this release
    #[must_use]
    pub fn env_vars(&self, namespace: &str) -> Vec<EnvVar> {
        self.env
            .iter()
            .map(|(name, template)| EnvVar {
                name: name.clone(),
                value: Some(
                    template
                        .replace("{release}", &self.release_name)
                        .replace("{namespace}", namespace),
                ),
                value_from: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_crd_types() {
        assert_eq!(DependencyKind::from(CacheType::Redis), DependencyKind::Redis);
        assert_eq!(
            DependencyKind::from(EventStreamType::RabbitMQ),
            DependencyKind::RabbitMQ
        );
        assert_eq!(
            DependencyKind::from(DatabaseType::PostgreSQL),
            DependencyKind::PostgreSQL
        );
    }

    #[test]
    fn test_categories() {
        assert_eq!(DependencyKind::Memcached.category(), DependencyCategory::Cache);
        assert_eq!(DependencyKind::Kafka.category(), DependencyCategory::EventStream);
        assert_eq!(DependencyKind::MySQL.category(), DependencyCategory::Database);
    }

    #[test]
    fn test_env_vars_substitute_placeholders() {
        let strategy = DependencyStrategy {
            kind: DependencyKind::PostgreSQL,
            chart: ChartCoordinates {
                repository_name: "bitnami".to_string(),
                repository_url: "https://charts.bitnami.com/bitnami".to_string(),
                chart: "postgresql".to_string(),
                version: "10.3.13".to_string(),
            },
            release_name: "db".to_string(),
            default_values: Value::Null,
            env: vec![(
                "DATABASE_HOST".to_string(),
                "{release}-postgresql.{namespace}.svc.cluster.local".to_string(),
            )],
            installs: true,
        };
        let env = strategy.env_vars("shop");
        assert_eq!(env.len(), 1);
        assert_eq!(
            env[0].value.as_deref(),
            Some("db-postgresql.shop.svc.cluster.local")
        );
        assert_eq!(strategy.chart.reference(), "bitnami/postgresql");
    }
}
