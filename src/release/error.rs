use crate::release::RuntimeError;
use crate::repository::RepositoryError;
use thiserror::Error;

/// Errors raised while resolving or managing a release
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("release {release} in {namespace} already belongs to chart {existing_chart}")]
    ReleaseNameCollision {
        release: String,
        namespace: String,
        existing_chart: String,
    },

    #[error("invalid release name {release:?}: {reason}")]
    InvalidReleaseName { release: String, reason: String },

    #[error("failed to delete revision {revision} of release {release}: {source}")]
    HistoryCleanupFailed {
        release: String,
        revision: u32,
        #[source]
        source: RuntimeError,
    },

    #[error("failed to render candidate manifest for release {release}: {source}")]
    RenderFailed {
        release: String,
        #[source]
        source: RuntimeError,
    },

    #[error("deployed release {release} is unreadable: {reason}")]
    DeployedReleaseUnreadable { release: String, reason: String },

    #[error("failed to install release {release}: {source}")]
    InstallFailed {
        release: String,
        #[source]
        source: RuntimeError,
    },

    #[error("failed to upgrade release {release}: {source}")]
    UpgradeFailed {
        release: String,
        #[source]
        source: RuntimeError,
    },

    #[error("chart runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl ReleaseError {
    /// Input errors that will fail the same way until the resource changes
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidReleaseName { .. })
    }

    /// Short label for metrics and status reasons
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ReleaseNameCollision { .. } => "ReleaseNameCollision",
            Self::InvalidReleaseName { .. } => "InvalidReleaseName",
            Self::HistoryCleanupFailed { .. } => "HistoryCleanupFailed",
            Self::RenderFailed { .. } => "RenderFailed",
            Self::DeployedReleaseUnreadable { .. } => "DeployedReleaseUnreadable",
            Self::InstallFailed { .. } => "InstallFailed",
            Self::UpgradeFailed { .. } => "UpgradeFailed",
            Self::Runtime(_) => "RuntimeError",
            Self::Repository(RepositoryError::RepositoryUnreachable { .. }) => {
                "RepositoryUnreachable"
            }
            Self::Repository(RepositoryError::RepositoryLockTimeout { .. }) => {
                "RepositoryLockTimeout"
            }
            Self::Repository(_) => "RepositoryError",
        }
    }
}
