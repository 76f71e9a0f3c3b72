//! # Application Spec
//!
//! The top-level application: owns a namespace and the shared dependencies
//! (cache, event stream) installed into it.

use serde::{Deserialize, Serialize};

/// Application Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: cloudship.toucansoft.io/v1alpha1
/// kind: Application
/// metadata:
///   name: shop
///   namespace: default
/// spec:
///   description: Online shop
///   cacheRef:
///     type: Redis
///   eventStreamRef:
///     type: Kafka
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Application",
    group = "cloudship.toucansoft.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::ApplicationStatus",
    shortname = "app",
    printcolumn = r#"{"name":"Cache", "type":"string", "jsonPath":".status.cache"}, {"name":"EventStream", "type":"string", "jsonPath":".status.eventStream"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Cache backend installed into the application namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ref: Option<crate::crd::CacheRef>,
    /// Event-stream backend
    /// Accepted and recorded, but not installed yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_stream_ref: Option<crate::crd::EventStreamRef>,
}
