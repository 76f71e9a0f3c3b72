//! # Configuration
//!
//! Operator configuration loaded from environment variables.
//!
//! - `controller`: reconcile timing, chart storage paths, helm binary, server port
//! - `charts`: per-dependency chart coordinates and default values

pub mod charts;
pub mod controller;

pub use charts::ChartCatalog;
pub use controller::ControllerConfig;
