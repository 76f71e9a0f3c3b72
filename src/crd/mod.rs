//! # Custom Resource Definitions
//!
//! CRD types for the Cloudship operator.
//!
//! ## Module Structure
//!
//! - `application.rs` - `Application`: namespace plus cache / event-stream dependencies
//! - `app_service.rs` - `AppService`: container workload plus optional database dependency
//! - `dependency.rs` - Dependency kind references shared by both resources
//! - `status.rs` - Status types for tracking reconciliation state

mod app_service;
mod application;
mod dependency;
mod status;

pub use app_service::{AppService, AppServiceSpec, Container, ContainerPort};
pub use application::{Application, ApplicationSpec};
pub use dependency::{
    CacheRef, CacheType, DatabaseRef, DatabaseType, EventStreamRef, EventStreamType,
};
pub use status::{AppServiceStatus, ApplicationStatus, Condition, DependencyReleaseStatus};

use kube::core::CustomResourceExt;

/// Render every CRD owned by the operator as a multi-document YAML stream
///
/// # Errors
///
/// Returns an error if a CRD fails to serialize.
pub fn render_crds() -> Result<String, serde_yaml::Error> {
    let application = serde_yaml::to_string(&Application::crd())?;
    let app_service = serde_yaml::to_string(&AppService::crd())?;
    Ok(format!("---\n{application}---\n{app_service}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_crds_contains_both_kinds() {
        let yaml = render_crds().unwrap();
        assert!(yaml.contains("applications.cloudship.toucansoft.io"));
        assert!(yaml.contains("appservices.cloudship.toucansoft.io"));
        assert_eq!(yaml.matches("---\n").count(), 2);
    }
}
