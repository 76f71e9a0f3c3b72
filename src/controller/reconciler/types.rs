//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::release::{ManagerFactory, ReleaseError};
use crate::translate::TranslateError;
use kube::Client;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Server-side apply of {kind} {name} conflicted: {message}")]
    ApplyConflict {
        kind: String,
        name: String,
        message: String,
    },

    #[error("Release error: {0}")]
    Release(#[from] ReleaseError),

    #[error("Translation failed: {0}")]
    Translate(#[from] TranslateError),

    #[error("No release strategy for dependency {0}")]
    UnsupportedDependency(String),

    #[error("Invalid chart values: {0}")]
    InvalidValues(String),

    #[error("Reconciliation exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Reconciliation failed: {0}")]
    ReconciliationFailed(#[from] anyhow::Error),
}

impl ReconcilerError {
    /// Errors caused by the resource itself; retrying before it changes is pointless
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Release(e) => e.is_fatal(),
            Self::UnsupportedDependency(_)
            | Self::InvalidValues(_)
            | Self::Translate(TranslateError::NoContainers(_)) => true,
            _ => false,
        }
    }

    /// Condition reason recorded in status
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Kube(_) => "KubernetesError",
            Self::ApplyConflict { .. } => "ApplyConflict",
            Self::Release(e) => e.reason(),
            Self::Translate(_) => "TranslateFailed",
            Self::UnsupportedDependency(_) => "UnsupportedDependency",
            Self::InvalidValues(_) => "InvalidValues",
            Self::DeadlineExceeded(_) => "DeadlineExceeded",
            Self::ReconciliationFailed(_) => "ReconciliationFailed",
        }
    }
}

/// Shared context handed to every reconciliation
#[derive(Clone)]
pub struct Reconciler {
    pub client: Client,
    pub config: ControllerConfig,
    pub releases: ManagerFactory,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("releases", &self.releases)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(client: Client, config: ControllerConfig, releases: ManagerFactory) -> Self {
        Self {
            client,
            config,
            releases,
        }
    }
}
