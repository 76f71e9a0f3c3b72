//! # Resource Translator
//!
//! Pure mapping from custom resources to the Kubernetes objects that realize
//! them:
//!
//! - `AppService` → one `apps/v1 Deployment`, plus one `v1 Service` when the
//!   first container declares a port
//! - `Application` → its `v1 Namespace`
//!
//! Every object carries a controller owner reference back to its source so the
//! garbage collector removes it with the resource. Translating the same input
//! twice yields equal objects, which keeps server-side apply a no-op on
//! unchanged resources.
//!
//! `replicas` is never set. Leaving it out means this controller does not own
//! the field, so scaling done by someone else survives every apply.

use crate::constants::APP_SERVICE_LABEL_KEY;
use crate::crd::{AppService, Application, ContainerPort};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, Namespace, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use thiserror::Error;

/// Protocol applied to ports that do not name one
pub const DEFAULT_PROTOCOL: &str = "TCP";

/// Service type forced on every generated Service
pub const SERVICE_TYPE: &str = "ClusterIP";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error("{kind} {name} has no uid yet")]
    MissingUid { kind: &'static str, name: String },

    #[error("{kind} {name} has no namespace")]
    MissingNamespace { kind: &'static str, name: String },

    #[error("AppService {0} declares no containers")]
    NoContainers(String),
}

/// Objects produced for one `AppService`
#[derive(Debug, Clone, PartialEq)]
pub struct Translated {
    pub deployment: Deployment,
    pub service: Option<Service>,
}

/// Translate an `AppService`; `extra_env` is appended to every container
///
/// # Errors
///
/// Fails when the resource has no uid or namespace yet, or no containers.
pub fn translate_app_service(
    app_service: &AppService,
    extra_env: &[EnvVar],
) -> Result<Translated, TranslateError> {
    let name = app_service.name_any();
    let uid = app_service
        .uid()
        .ok_or_else(|| TranslateError::MissingUid {
            kind: "AppService",
            name: name.clone(),
        })?;
    let namespace = app_service
        .namespace()
        .ok_or_else(|| TranslateError::MissingNamespace {
            kind: "AppService",
            name: name.clone(),
        })?;
    if app_service.spec.containers.is_empty() {
        return Err(TranslateError::NoContainers(name));
    }

    let labels = BTreeMap::from([(APP_SERVICE_LABEL_KEY.to_string(), uid)]);
    let owner = app_service.controller_owner_ref(&()).into_iter().collect::<Vec<_>>();

    let mut env = extra_env.to_vec();
    env.sort_by(|a, b| a.name.cmp(&b.name));
    env.dedup_by(|a, b| a.name == b.name);

    let containers: Vec<Container> = app_service
        .spec
        .containers
        .iter()
        .map(|c| Container {
            name: c.name.clone(),
            image: Some(c.image.clone()),
            ports: (!c.ports.is_empty()).then(|| c.ports.iter().map(container_port).collect()),
            env: (!env.is_empty()).then(|| env.clone()),
            ..Container::default()
        })
        .collect();

    let deployment = Deployment {
        metadata: ObjectMeta {
            name: Some(name.clone()),
            namespace: Some(namespace.clone()),
            labels: Some(labels.clone()),
            owner_references: Some(owner.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(DeploymentSpec {
            replicas: None,
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels.clone()),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers,
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    };

    // Only the first port of the first container is exposed.
    let service = app_service.spec.containers[0]
        .ports
        .first()
        .map(|port| Service {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(namespace.clone()),
                labels: Some(labels.clone()),
                owner_references: Some(owner.clone()),
                ..ObjectMeta::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(labels.clone()),
                type_: Some(SERVICE_TYPE.to_string()),
                ports: Some(vec![ServicePort {
                    name: Some(name.clone()),
                    port: port.port,
                    target_port: Some(IntOrString::Int(port.port)),
                    protocol: Some(protocol(port)),
                    ..ServicePort::default()
                }]),
                ..ServiceSpec::default()
            }),
            ..Service::default()
        });

    Ok(Translated {
        deployment,
        service,
    })
}

/// Namespace named after the `Application`, owned by it
///
/// # Errors
///
/// Fails when the Application has no uid yet.
pub fn render_namespace(application: &Application) -> Result<Namespace, TranslateError> {
    let name = application.name_any();
    let owner = application
        .controller_owner_ref(&())
        .ok_or_else(|| TranslateError::MissingUid {
            kind: "Application",
            name: name.clone(),
        })?;
    Ok(Namespace {
        metadata: ObjectMeta {
            name: Some(name),
            owner_references: Some(vec![owner]),
            ..ObjectMeta::default()
        },
        ..Namespace::default()
    })
}

fn protocol(port: &ContainerPort) -> String {
    port.protocol
        .clone()
        .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string())
}

fn container_port(port: &ContainerPort) -> k8s_openapi::api::core::v1::ContainerPort {
    k8s_openapi::api::core::v1::ContainerPort {
        name: Some(port.name.clone()),
        container_port: port.port,
        protocol: Some(protocol(port)),
        ..k8s_openapi::api::core::v1::ContainerPort::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{AppServiceSpec, ApplicationSpec, Container as SpecContainer};

    fn app_service(containers: Vec<SpecContainer>) -> AppService {
        let mut svc = AppService::new("web", AppServiceSpec {
            containers,
            database_ref: None,
        });
        svc.metadata.namespace = Some("shop".to_string());
        svc.metadata.uid = Some("0b6c7a39-uid".to_string());
        svc
    }

    fn container(name: &str, ports: Vec<ContainerPort>) -> SpecContainer {
        SpecContainer {
            name: name.to_string(),
            image: format!("registry.example.com/{name}:1.0"),
            ports,
        }
    }

    fn port(name: &str, number: i32, protocol: Option<&str>) -> ContainerPort {
        ContainerPort {
            name: name.to_string(),
            port: number,
            protocol: protocol.map(str::to_string),
        }
    }

    #[test]
    fn test_labels_and_owner_references() {
        let svc = app_service(vec![container("web", vec![port("http", 8080, None)])]);
        let out = translate_app_service(&svc, &[]).unwrap();

        let spec = out.deployment.spec.as_ref().unwrap();
        let expected = BTreeMap::from([(
            APP_SERVICE_LABEL_KEY.to_string(),
            "0b6c7a39-uid".to_string(),
        )]);
        assert_eq!(spec.selector.match_labels.as_ref(), Some(&expected));
        assert_eq!(
            spec.template.metadata.as_ref().unwrap().labels.as_ref(),
            Some(&expected)
        );

        let service = out.service.unwrap();
        assert_eq!(service.metadata.labels.as_ref(), Some(&expected));
        assert_eq!(
            service.spec.as_ref().unwrap().selector.as_ref(),
            Some(&expected)
        );

        for owners in [
            out.deployment.metadata.owner_references.unwrap(),
            service.metadata.owner_references.unwrap(),
        ] {
            assert_eq!(owners.len(), 1);
            assert_eq!(owners[0].kind, "AppService");
            assert_eq!(owners[0].controller, Some(true));
        }
    }

    #[test]
    fn test_replicas_never_set() {
        let svc = app_service(vec![container("web", vec![])]);
        let out = translate_app_service(&svc, &[]).unwrap();
        assert_eq!(out.deployment.spec.unwrap().replicas, None);
    }

    #[test]
    fn test_translation_is_idempotent() {
        let svc = app_service(vec![
            container("web", vec![port("http", 8080, None)]),
            container("sidecar", vec![port("metrics", 9090, Some("UDP"))]),
        ]);
        let env = vec![
            EnvVar {
                name: "REDIS_PORT".to_string(),
                value: Some("6379".to_string()),
                value_from: None,
            },
            EnvVar {
                name: "DATABASE_HOST".to_string(),
                value: Some("db".to_string()),
                value_from: None,
            },
        ];
        assert_eq!(
            translate_app_service(&svc, &env).unwrap(),
            translate_app_service(&svc, &env).unwrap()
        );
    }

    #[test]
    fn test_only_first_port_of_first_container_is_exposed() {
        let svc = app_service(vec![
            container("web", vec![port("http", 8080, None), port("admin", 8081, None)]),
            container("sidecar", vec![port("metrics", 9090, None)]),
        ]);
        let service = translate_app_service(&svc, &[]).unwrap().service.unwrap();
        let spec = service.spec.unwrap();
        let ports = spec.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, 8080);
        assert_eq!(ports[0].target_port, Some(IntOrString::Int(8080)));
        assert_eq!(ports[0].protocol.as_deref(), Some("TCP"));
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
    }

    #[test]
    fn test_no_service_without_first_container_port() {
        let svc = app_service(vec![
            container("worker", vec![]),
            container("sidecar", vec![port("metrics", 9090, None)]),
        ]);
        assert!(translate_app_service(&svc, &[]).unwrap().service.is_none());
    }

    #[test]
    fn test_protocol_defaults_and_is_preserved() {
        let svc = app_service(vec![container(
            "web",
            vec![port("http", 80, None), port("dns", 53, Some("UDP"))],
        )]);
        let deployment = translate_app_service(&svc, &[]).unwrap().deployment;
        let ports = deployment.spec.unwrap().template.spec.unwrap().containers[0]
            .ports
            .clone()
            .unwrap();
        assert_eq!(ports[0].protocol.as_deref(), Some("TCP"));
        assert_eq!(ports[1].protocol.as_deref(), Some("UDP"));
    }

    #[test]
    fn test_env_is_sorted_and_applied_to_every_container() {
        let svc = app_service(vec![container("web", vec![]), container("worker", vec![])]);
        let env = vec![
            EnvVar {
                name: "DATABASE_PORT".to_string(),
                value: Some("5432".to_string()),
                value_from: None,
            },
            EnvVar {
                name: "DATABASE_HOST".to_string(),
                value: Some("db-postgresql".to_string()),
                value_from: None,
            },
        ];
        let containers = translate_app_service(&svc, &env)
            .unwrap()
            .deployment
            .spec
            .unwrap()
            .template
            .spec
            .unwrap()
            .containers;
        for c in containers {
            let names: Vec<_> = c.env.unwrap().into_iter().map(|e| e.name).collect();
            assert_eq!(names, vec!["DATABASE_HOST", "DATABASE_PORT"]);
        }
    }

    #[test]
    fn test_missing_uid_is_rejected() {
        let mut svc = app_service(vec![container("web", vec![])]);
        svc.metadata.uid = None;
        assert!(matches!(
            translate_app_service(&svc, &[]),
            Err(TranslateError::MissingUid { .. })
        ));
    }

    #[test]
    fn test_render_namespace_is_owned_by_application() {
        let mut app = Application::new("shop", ApplicationSpec::default());
        app.metadata.namespace = Some("default".to_string());
        app.metadata.uid = Some("app-uid".to_string());

        let ns = render_namespace(&app).unwrap();
        assert_eq!(ns.metadata.name.as_deref(), Some("shop"));
        let owners = ns.metadata.owner_references.unwrap();
        assert_eq!(owners[0].kind, "Application");
        assert_eq!(owners[0].uid, "app-uid");
    }
}
