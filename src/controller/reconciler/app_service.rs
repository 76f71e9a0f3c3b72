//! # AppService Reconciliation
//!
//! Applies the translated Deployment and Service, then installs the declared
//! database release next to the workload.

use crate::controller::reconciler::apply::server_side_apply;
use crate::controller::reconciler::application::ready_condition;
use crate::controller::reconciler::dependency::{failed_release_status, reconcile_dependency};
use crate::controller::reconciler::status::update_app_service_status;
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::{AppService, AppServiceStatus};
use crate::release::DependencyKind;
use crate::translate::translate_app_service;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{EnvVar, Service};
use kube::{Api, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reconcile one `AppService`
///
/// # Errors
///
/// Returns the first error met. A failed workload apply stops the pass before
/// the database release is touched.
pub async fn reconcile_app_service(
    app_service: Arc<AppService>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = app_service.name_any();
    let namespace = app_service.namespace().unwrap_or_default();
    info!("🔄 Reconciling AppService: {}/{}", namespace, name);

    let api: Api<AppService> = Api::namespaced(ctx.client.clone(), &namespace);
    let Some(app_service) = api.get_opt(&name).await? else {
        debug!("AppService {}/{} is gone, nothing to do", namespace, name);
        return Ok(Action::await_change());
    };

    let mut status = AppServiceStatus {
        observed_generation: app_service.metadata.generation,
        last_reconcile_time: Some(chrono::Utc::now().to_rfc3339()),
        ..Default::default()
    };
    let mut first_error: Option<ReconcilerError> = None;

    match apply_workload(&ctx, &app_service, &namespace, &mut status).await {
        Ok(()) => {
            if let Some(database) = &app_service.spec.database_ref {
                let kind = DependencyKind::from(database.r#type);
                match reconcile_dependency(&ctx.releases, kind, &namespace, &database.values)
                    .await
                {
                    Ok(release) => status.database = Some(release),
                    Err(e) => {
                        warn!(
                            "Database {} of AppService {}/{} failed: {}",
                            kind, namespace, name, e
                        );
                        status.database = Some(failed_release_status(&ctx.releases, kind, &e));
                        first_error = Some(e);
                    }
                }
            }
        }
        Err(e) => first_error = Some(e),
    }

    status.conditions = vec![ready_condition(first_error.as_ref())];

    if let Err(e) = update_app_service_status(&ctx, &app_service, status).await {
        warn!(
            "Failed to update status for AppService {}/{}: {}",
            namespace, name, e
        );
        first_error.get_or_insert(e);
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            info!("✅ AppService {}/{} reconciled", namespace, name);
            Ok(Action::requeue(ctx.config.reconcile_wait()))
        }
    }
}

async fn apply_workload(
    ctx: &Reconciler,
    app_service: &AppService,
    namespace: &str,
    status: &mut AppServiceStatus,
) -> Result<(), ReconcilerError> {
    let env = database_env(ctx, app_service, namespace)?;
    let translated = translate_app_service(app_service, &env)?;

    let deployments: Api<Deployment> = Api::namespaced(ctx.client.clone(), namespace);
    let deployment =
        server_side_apply(&deployments, &ctx.config.field_manager, &translated.deployment).await?;
    status.deployment = Some(deployment.name_any());

    if let Some(service) = &translated.service {
        let services: Api<Service> = Api::namespaced(ctx.client.clone(), namespace);
        let service = server_side_apply(&services, &ctx.config.field_manager, service).await?;
        status.service = Some(service.name_any());
    }
    Ok(())
}

/// Connection variables for the declared database, empty when none is declared
fn database_env(
    ctx: &Reconciler,
    app_service: &AppService,
    namespace: &str,
) -> Result<Vec<EnvVar>, ReconcilerError> {
    let Some(database) = &app_service.spec.database_ref else {
        return Ok(Vec::new());
    };
    let kind = DependencyKind::from(database.r#type);
    let strategy = ctx
        .releases
        .strategy(kind)
        .ok_or_else(|| ReconcilerError::UnsupportedDependency(kind.to_string()))?;
    Ok(strategy.env_vars(namespace))
}
