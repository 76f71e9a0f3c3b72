//! # Application Reconciliation
//!
//! Applies the application's namespace, then installs its cache release and
//! records its event-stream release inside that namespace.

use crate::controller::reconciler::apply::server_side_apply;
use crate::controller::reconciler::dependency::{failed_release_status, reconcile_dependency};
use crate::controller::reconciler::status::update_application_status;
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::{Application, ApplicationStatus, Condition};
use crate::release::DependencyKind;
use crate::translate::render_namespace;
use k8s_openapi::api::core::v1::Namespace;
use kube::{Api, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reconcile one `Application`
///
/// # Errors
///
/// Returns the first error met; the remaining dependencies are still
/// attempted and the status reflects every one of them.
pub async fn reconcile_application(
    application: Arc<Application>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = application.name_any();
    info!("🔄 Reconciling Application: {}", name);

    let api: Api<Application> = Api::namespaced(
        ctx.client.clone(),
        &application.namespace().unwrap_or_default(),
    );
    let Some(application) = api.get_opt(&name).await? else {
        debug!("Application {} is gone, nothing to do", name);
        return Ok(Action::await_change());
    };

    let mut status = ApplicationStatus {
        observed_generation: application.metadata.generation,
        last_reconcile_time: Some(chrono::Utc::now().to_rfc3339()),
        ..Default::default()
    };
    let mut first_error: Option<ReconcilerError> = None;

    match apply_namespace(&ctx, &application).await {
        Ok(namespace) => {
            status.namespace = Some(namespace.clone());
            for (kind, values) in declared_dependencies(&application) {
                match reconcile_dependency(&ctx.releases, kind, &namespace, values).await {
                    Ok(release) => status.releases.push(release),
                    Err(e) => {
                        warn!("Dependency {} of Application {} failed: {}", kind, name, e);
                        status
                            .releases
                            .push(failed_release_status(&ctx.releases, kind, &e));
                        first_error.get_or_insert(e);
                    }
                }
            }
        }
        Err(e) => {
            first_error = Some(e);
        }
    }

    status.cache = application
        .spec
        .cache_ref
        .as_ref()
        .map(|c| c.r#type.to_string());
    status.event_stream = application
        .spec
        .event_stream_ref
        .as_ref()
        .map(|e| e.r#type.to_string());
    status.conditions = vec![ready_condition(first_error.as_ref())];

    if let Err(e) = update_application_status(&ctx, &application, status).await {
        warn!("Failed to update status for Application {}: {}", name, e);
        first_error.get_or_insert(e);
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            info!("✅ Application {} reconciled", name);
            Ok(Action::requeue(ctx.config.reconcile_wait()))
        }
    }
}

async fn apply_namespace(
    ctx: &Reconciler,
    application: &Application,
) -> Result<String, ReconcilerError> {
    let namespace = render_namespace(application)?;
    let api: Api<Namespace> = Api::all(ctx.client.clone());
    let applied = server_side_apply(&api, &ctx.config.field_manager, &namespace).await?;
    Ok(applied.name_any())
}

/// Dependencies in reconcile order: cache first, then event stream
pub(crate) fn declared_dependencies(
    application: &Application,
) -> Vec<(DependencyKind, &[String])> {
    let mut dependencies = Vec::new();
    if let Some(cache) = &application.spec.cache_ref {
        dependencies.push((DependencyKind::from(cache.r#type), cache.values.as_slice()));
    }
    if let Some(stream) = &application.spec.event_stream_ref {
        dependencies.push((DependencyKind::from(stream.r#type), stream.values.as_slice()));
    }
    dependencies
}

/// `Ready` condition for a finished pass
pub(crate) fn ready_condition(error: Option<&ReconcilerError>) -> Condition {
    let mut condition = Condition::ready(error.is_none(), error.map(ToString::to_string));
    if let Some(e) = error {
        condition.reason = Some(e.reason().to_string());
    }
    condition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ApplicationSpec, CacheRef, CacheType, EventStreamRef, EventStreamType};

    fn application(spec: ApplicationSpec) -> Application {
        Application::new("shop", spec)
    }

    #[test]
    fn test_cache_precedes_event_stream() {
        let app = application(ApplicationSpec {
            description: None,
            cache_ref: Some(CacheRef {
                r#type: CacheType::Redis,
                values: vec!["auth.enabled=false".to_string()],
            }),
            event_stream_ref: Some(EventStreamRef {
                r#type: EventStreamType::Kafka,
                values: Vec::new(),
            }),
        });
        let deps = declared_dependencies(&app);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].0, DependencyKind::Redis);
        assert_eq!(deps[0].1, ["auth.enabled=false".to_string()]);
        assert_eq!(deps[1].0, DependencyKind::Kafka);
    }

    #[test]
    fn test_no_dependencies_declared() {
        let app = application(ApplicationSpec {
            description: Some("empty".to_string()),
            cache_ref: None,
            event_stream_ref: None,
        });
        assert!(declared_dependencies(&app).is_empty());
    }

    #[test]
    fn test_ready_condition_carries_error_reason() {
        let err = ReconcilerError::UnsupportedDependency("Cassandra".to_string());
        let condition = ready_condition(Some(&err));
        assert_eq!(condition.status, "False");
        assert_eq!(condition.reason.as_deref(), Some("UnsupportedDependency"));

        let ok = ready_condition(None);
        assert_eq!(ok.status, "True");
        assert_eq!(ok.message, None);
    }
}
