//! # Chart Runtime
//!
//! The seam between release management and the package manager that actually
//! renders and installs charts.

use crate::release::ChartCoordinates;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Status of one release history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryStatus {
    Deployed,
    Failed,
    Superseded,
    PendingInstall,
    PendingUpgrade,
    PendingRollback,
    Uninstalling,
    Uninstalled,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Deployed => "deployed",
            Self::Failed => "failed",
            Self::Superseded => "superseded",
            Self::PendingInstall => "pending-install",
            Self::PendingUpgrade => "pending-upgrade",
            Self::PendingRollback => "pending-rollback",
            Self::Uninstalling => "uninstalling",
            Self::Uninstalled => "uninstalled",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One entry of a release's history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRecord {
    pub name: String,
    pub namespace: String,
    pub revision: u32,
    pub status: HistoryStatus,
    /// Absent when the stored chart metadata could not be read
    pub chart_name: Option<String>,
    pub chart_version: Option<String>,
    pub manifest: String,
}

/// Everything needed to render, install or upgrade a release
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseRequest {
    pub name: String,
    pub namespace: String,
    pub chart: ChartCoordinates,
    pub values: Value,
}

/// Errors reported by a [`ChartRuntime`]
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("release {0} not found")]
    NotFound(String),

    #[error("helm {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("failed to decode helm {command} output: {reason}")]
    Decode { command: String, reason: String },

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RuntimeError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Package manager operations used by release management
///
/// Implementations never mutate cluster state from `history`, `deployed` or
/// `render_upgrade`.
#[async_trait]
pub trait ChartRuntime: Send + Sync {
    /// Full history of a release, any order; `NotFound` when it never existed
    async fn history(&self, namespace: &str, name: &str)
        -> Result<Vec<ReleaseRecord>, RuntimeError>;

    /// The currently deployed entry, if any
    async fn deployed(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ReleaseRecord>, RuntimeError>;

    /// Remove one history entry; `NotFound` when it is already gone
    async fn delete_revision(
        &self,
        namespace: &str,
        name: &str,
        revision: u32,
    ) -> Result<(), RuntimeError>;

    /// Manifest a dry-run upgrade would produce
    async fn render_upgrade(&self, request: &ReleaseRequest) -> Result<String, RuntimeError>;

    async fn install(&self, request: &ReleaseRequest) -> Result<ReleaseRecord, RuntimeError>;

    async fn upgrade(&self, request: &ReleaseRequest) -> Result<ReleaseRecord, RuntimeError>;
}
