//! # Prelude
//!
//! Re-exports commonly used types.
//!
//! ```rust
//! use cloudship_operator::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Reconciler types
pub use crate::controller::reconciler::{Reconciler, ReconcilerError};

// Release machinery
pub use crate::release::{
    ChartRuntime, DependencyKind, DependencyStrategy, ManagerFactory, ReleaseError,
    ReleaseManager, ReleaseState,
};

// Repository synchronization
pub use crate::repository::{IndexFetcher, RepositoryError, RepositorySynchronizer};

// Config types
pub use crate::config::{ChartCatalog, ControllerConfig};
