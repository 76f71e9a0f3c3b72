//! # Releases
//!
//! Lifecycle of the chart releases backing declared dependencies.
//!
//! - [`kinds`]: the dependency strategy table types
//! - [`resolver`]: stable release names and collision detection
//! - [`manager`]: the sync / install / upgrade state machine
//! - [`factory`]: wires the synchronizer, resolver and manager together
//! - [`runtime`]: the package manager seam, with [`HelmCli`] and [`InMemoryRuntime`]

mod error;
pub mod factory;
mod helm;
pub mod kinds;
pub mod manager;
mod memory;
pub mod resolver;
pub mod runtime;
mod values;

pub use error::ReleaseError;
pub use factory::ManagerFactory;
pub use helm::{release_secret_name, HelmCli};
pub use kinds::{ChartCoordinates, DependencyCategory, DependencyKind, DependencyStrategy};
pub use manager::{ReleaseManager, ReleaseState};
pub use memory::{render_manifest, InMemoryRuntime, Operation};
pub use resolver::{validate_release_name, ReleaseResolver, MAX_RELEASE_NAME_LEN};
pub use runtime::{ChartRuntime, HistoryStatus, ReleaseRecord, ReleaseRequest, RuntimeError};
pub use values::{merge_values, parse_overrides};
