//! # Status Types
//!
//! Status sub-resources for `Application` and `AppService`.

use serde::{Deserialize, Serialize};

/// Status of the Application resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStatus {
    /// Installed cache kind (e.g. "Redis")
    #[serde(default)]
    pub cache: Option<String>,
    /// Declared event-stream kind (e.g. "Kafka")
    #[serde(default)]
    pub event_stream: Option<String>,
    /// Namespace rendered for the application
    #[serde(default)]
    pub namespace: Option<String>,
    /// One entry per declared dependency
    #[serde(default)]
    pub releases: Vec<DependencyReleaseStatus>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Observed generation
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Last reconciliation time
    #[serde(default)]
    pub last_reconcile_time: Option<String>,
}

/// Status of the AppService resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppServiceStatus {
    /// Name of the applied Deployment
    #[serde(default)]
    pub deployment: Option<String>,
    /// Name of the applied Service, when one is exposed
    #[serde(default)]
    pub service: Option<String>,
    /// Database release, when a database is declared
    #[serde(default)]
    pub database: Option<DependencyReleaseStatus>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Observed generation
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Last reconciliation time
    #[serde(default)]
    pub last_reconcile_time: Option<String>,
}

/// State of one dependency release
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DependencyReleaseStatus {
    /// Dependency kind (e.g. "Redis", "PostgreSQL")
    pub kind: String,
    /// Release name
    pub release_name: String,
    /// Chart name recorded for the release
    pub chart: String,
    /// Chart version
    pub chart_version: String,
    /// Release state: Unknown, NotInstalled, Installed, UpgradeRequired, Failed, Skipped
    pub state: String,
    /// Detail for failed or skipped releases
    #[serde(default)]
    pub message: Option<String>,
}

/// Condition represents a status condition for the resource
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing condition
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    /// Build the `Ready` condition from the outcome of a reconciliation
    #[must_use]
    pub fn ready(succeeded: bool, message: Option<String>) -> Self {
        let (status, reason) = if succeeded {
            ("True", "ReconciliationSucceeded")
        } else {
            ("False", "ReconciliationFailed")
        };
        Self {
            r#type: "Ready".to_string(),
            status: status.to_string(),
            last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
            reason: Some(reason.to_string()),
            message,
        }
    }
}
