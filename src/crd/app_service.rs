//! # AppService Spec
//!
//! A containerized workload, translated into a Deployment and (optionally) a Service.

use serde::{Deserialize, Serialize};

/// AppService Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: cloudship.toucansoft.io/v1alpha1
/// kind: AppService
/// metadata:
///   name: web
///   namespace: shop
/// spec:
///   containers:
///     - name: web
///       image: nginx:1.25
///       ports:
///         - name: http
///           portNumber: 80
///   databaseRef:
///     type: PostgreSQL
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "AppService",
    group = "cloudship.toucansoft.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::AppServiceStatus",
    shortname = "as",
    printcolumn = r#"{"name":"Deployment", "type":"string", "jsonPath":".status.deployment"}, {"name":"Service", "type":"string", "jsonPath":".status.service"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AppServiceSpec {
    /// Ordered container list; the first container's first port is exposed
    pub containers: Vec<Container>,
    /// Database backend installed into the service namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_ref: Option<crate::crd::DatabaseRef>,
}

/// A single container of the workload
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub ports: Vec<ContainerPort>,
}

/// A named container port
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub name: String,
    #[serde(rename = "portNumber")]
    pub port: i32,
    /// Transport protocol; TCP when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_number_field_name() {
        let port: ContainerPort =
            serde_json::from_str(r#"{"name":"http","portNumber":8080}"#).unwrap();
        assert_eq!(port.port, 8080);
        assert!(port.protocol.is_none());
    }

    #[test]
    fn test_container_ports_default_to_empty() {
        let container: Container =
            serde_json::from_str(r#"{"name":"worker","image":"busybox"}"#).unwrap();
        assert!(container.ports.is_empty());
    }
}
