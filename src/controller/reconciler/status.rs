//! # Status Management
//!
//! Writes `Application` and `AppService` status after each pass.
//!
//! A patch is skipped when nothing but timestamps would change, so a steady
//! resource does not generate a watch event every requeue.

use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::{AppService, AppServiceStatus, Application, ApplicationStatus, Condition};
use kube::api::{Patch, PatchParams};
use kube::{Api, ResourceExt};
use serde_json::json;
use tracing::debug;

/// Keep the previous transition time for conditions whose status did not flip
pub(crate) fn carry_transition_times(previous: &[Condition], next: &mut [Condition]) {
    for condition in next.iter_mut() {
        if let Some(old) = previous
            .iter()
            .find(|c| c.r#type == condition.r#type && c.status == condition.status)
        {
            condition.last_transition_time.clone_from(&old.last_transition_time);
        }
    }
}

fn strip_condition_times(conditions: &mut [Condition]) {
    for condition in conditions {
        condition.last_transition_time = None;
    }
}

pub(crate) fn application_status_changed(
    current: Option<&ApplicationStatus>,
    next: &ApplicationStatus,
) -> bool {
    let Some(current) = current else {
        return true;
    };
    let mut a = current.clone();
    let mut b = next.clone();
    a.last_reconcile_time = None;
    b.last_reconcile_time = None;
    strip_condition_times(&mut a.conditions);
    strip_condition_times(&mut b.conditions);
    a != b
}

pub(crate) fn app_service_status_changed(
    current: Option<&AppServiceStatus>,
    next: &AppServiceStatus,
) -> bool {
    let Some(current) = current else {
        return true;
    };
    let mut a = current.clone();
    let mut b = next.clone();
    a.last_reconcile_time = None;
    b.last_reconcile_time = None;
    strip_condition_times(&mut a.conditions);
    strip_condition_times(&mut b.conditions);
    a != b
}

/// Patch the status of an `Application`
///
/// # Errors
///
/// Returns the API error when the patch is rejected.
pub async fn update_application_status(
    reconciler: &Reconciler,
    application: &Application,
    mut status: ApplicationStatus,
) -> Result<(), ReconcilerError> {
    let previous = application.status.as_ref();
    if let Some(previous) = previous {
        carry_transition_times(&previous.conditions, &mut status.conditions);
    }
    if !application_status_changed(previous, &status) {
        debug!(
            "Skipping status update for Application {} - unchanged",
            application.name_any()
        );
        return Ok(());
    }

    let namespace = application.namespace().unwrap_or_default();
    let api: Api<Application> = Api::namespaced(reconciler.client.clone(), &namespace);
    api.patch_status(
        &application.name_any(),
        &PatchParams::apply(&reconciler.config.field_manager),
        &Patch::Merge(json!({ "status": status })),
    )
    .await?;
    Ok(())
}

/// Patch the status of an `AppService`
///
/// # Errors
///
/// Returns the API error when the patch is rejected.
pub async fn update_app_service_status(
    reconciler: &Reconciler,
    app_service: &AppService,
    mut status: AppServiceStatus,
) -> Result<(), ReconcilerError> {
    let previous = app_service.status.as_ref();
    if let Some(previous) = previous {
        carry_transition_times(&previous.conditions, &mut status.conditions);
    }
    if !app_service_status_changed(previous, &status) {
        debug!(
            "Skipping status update for AppService {} - unchanged",
            app_service.name_any()
        );
        return Ok(());
    }

    let namespace = app_service.namespace().unwrap_or_default();
    let api: Api<AppService> = Api::namespaced(reconciler.client.clone(), &namespace);
    api.patch_status(
        &app_service.name_any(),
        &PatchParams::apply(&reconciler.config.field_manager),
        &Patch::Merge(json!({ "status": status })),
    )
    .await?;
    Ok(())
}
