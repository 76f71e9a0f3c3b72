//! # Reconciler
//!
//! Reconciles `Application` and `AppService` resources.
//!
//! ## Module Structure
//!
//! - `types.rs` - Shared context and error type
//! - `application.rs` - Namespace plus cache / event-stream releases
//! - `app_service.rs` - Deployment, Service and database release
//! - `dependency.rs` - Drives one dependency release to its installed state
//! - `apply.rs` - Server-side apply of generated objects
//! - `status.rs` - Status patches

pub mod app_service;
pub mod application;
pub mod apply;
pub mod dependency;
pub mod status;
pub mod types;

pub use app_service::reconcile_app_service;
pub use application::reconcile_application;
pub use dependency::reconcile_dependency;
pub use types::{Reconciler, ReconcilerError};
