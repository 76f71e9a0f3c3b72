//! # Dependency References
//!
//! Kind selectors for the packaged dependencies an application can declare.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
pub enum CacheType {
    /// Redis
    // Early manifests spelled it "Reddis"
    #[serde(alias = "Reddis")]
    Redis,
    /// Memcached
    Memcached,
}

/// Event-stream backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
pub enum EventStreamType {
    /// Apache Kafka
    Kafka,
    /// RabbitMQ
    RabbitMQ,
}

/// Database backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
pub enum DatabaseType {
    /// MySQL
    MySQL,
    /// PostgreSQL
    PostgreSQL,
}

/// Cache dependency declared by an `Application`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheRef {
    pub r#type: CacheType,
    /// Chart value overrides as `key.path=value`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// Event-stream dependency declared by an `Application`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventStreamRef {
    pub r#type: EventStreamType,
    /// Chart value overrides as `key.path=value`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// Database dependency declared by an `AppService`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseRef {
    pub r#type: DatabaseType,
    /// Chart value overrides as `key.path=value`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheType::Redis => f.write_str("Redis"),
            CacheType::Memcached => f.write_str("Memcached"),
        }
    }
}

impl fmt::Display for EventStreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStreamType::Kafka => f.write_str("Kafka"),
            EventStreamType::RabbitMQ => f.write_str("RabbitMQ"),
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseType::MySQL => f.write_str("MySQL"),
            DatabaseType::PostgreSQL => f.write_str("PostgreSQL"),
        }
    }
}
