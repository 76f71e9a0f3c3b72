//! # Cloudship Operator
//!
//! A Kubernetes operator that turns two custom resources into running
//! infrastructure:
//!
//! - **`Application`** owns a namespace and the shared dependencies installed
//!   into it (a cache, and an event stream that is recorded but not installed).
//! - **`AppService`** describes a container workload. It becomes a Deployment,
//!   a ClusterIP Service when its first container exposes a port, and an
//!   optional database release whose connection settings are injected into the
//!   workload's environment.
//!
//! Dependencies are Helm chart releases. The operator keeps the shared chart
//! repository file in sync under a file lock, resolves release names, and
//! drives each release through install, drift detection and upgrade.
//!
//! ## Modules
//!
//! - [`repository`] - Chart repository file, index downloads and locking
//! - [`release`] - Release resolution, state machine and the helm runtime
//! - [`translate`] - Custom resource to Kubernetes object mapping
//! - [`controller`] - Reconcilers for both custom resources
//! - [`runtime`] - Startup, watch loops and error policy

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod release;
pub mod repository;
pub mod runtime;
pub mod server;
pub mod translate;
