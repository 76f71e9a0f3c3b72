//! # Watch Loop
//!
//! Runs one controller per custom resource kind. `AppService` also watches
//! the Deployments and Services it owns, so edits to those objects are
//! reverted on the next pass.

use crate::controller::reconciler::{
    reconcile_app_service, reconcile_application, Reconciler, ReconcilerError,
};
use crate::crd::{AppService, Application};
use crate::observability::metrics;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use crate::server::ServerState;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::Api;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::{self, Action};
use kube_runtime::{watcher, Controller};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Instrument};

/// Run both controllers until a shutdown signal arrives
///
/// # Errors
///
/// Currently infallible; the signature leaves room for startup checks.
pub async fn run_watch_loop(
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal, initiating graceful shutdown...");
        shutdown_state.set_ready(false);
    });

    let client = reconciler.client.clone();
    let controller_config = controller::Config::default()
        .concurrency(reconciler.config.max_concurrent_reconciliations);

    loop {
        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );

        let applications = Controller::new(
            Api::<Application>::all(client.clone()),
            watcher::Config::default().any_semantic(),
        )
        .with_config(controller_config.clone());

        let app_services = Controller::new(
            Api::<AppService>::all(client.clone()),
            watcher::Config::default().any_semantic(),
        )
        .owns(
            Api::<Deployment>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(
            Api::<Service>::all(client.clone()),
            watcher::Config::default(),
        )
        .with_config(controller_config.clone());

        info!("Starting Application and AppService controllers...");
        tokio::join!(
            run_controller(
                applications,
                "Application",
                reconcile_application,
                Arc::clone(&reconciler),
            ),
            run_controller(
                app_services,
                "AppService",
                reconcile_app_service,
                Arc::clone(&reconciler),
            ),
        );
        drop(watch_span);

        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let delay = reconciler.config.watch_restart_delay();
        warn!("Controller watch streams ended, restarting in {:?}...", delay);
        tokio::time::sleep(delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

async fn run_controller<K, R, Fut>(
    controller: Controller<K>,
    kind: &'static str,
    mut reconcile: R,
    reconciler: Arc<Reconciler>,
) where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    R: FnMut(Arc<K>, Arc<Reconciler>) -> Fut,
    Fut: Future<Output = Result<Action, ReconcilerError>> + Send + 'static,
{
    let deadline = reconciler.config.reconcile_deadline();
    let restart_delay = reconciler.config.watch_restart_delay();

    controller
        .shutdown_on_signal()
        .run(
            move |obj, ctx| {
                let span = tracing::span!(
                    tracing::Level::INFO,
                    "controller.watch.reconcile",
                    resource.kind = kind,
                    resource.name = %obj.name_any(),
                    resource.namespace = %obj.namespace().unwrap_or_default(),
                    resource.generation = obj.meta().generation.unwrap_or(0),
                );
                with_deadline(kind, deadline, reconcile(obj, ctx)).instrument(span)
            },
            handle_reconciliation_error::<K>,
            reconciler,
        )
        .for_each(|result| async move {
            match result {
                Ok((object, action)) => {
                    debug!(resource = %object, action = ?action, "watch.event.reconciled");
                }
                Err(controller::Error::ReconcilerFailed(e, object)) => {
                    debug!(resource = %object, error = %e, "watch.event.reconciliation_failed");
                }
                Err(e) => handle_watch_stream_error(&format!("{e:?}"), restart_delay).await,
            }
        })
        .await;
}

/// Bound one reconciliation by `deadline` and record its metrics
pub(crate) async fn with_deadline<F>(
    kind: &'static str,
    deadline: Duration,
    reconcile: F,
) -> Result<Action, ReconcilerError>
where
    F: Future<Output = Result<Action, ReconcilerError>>,
{
    metrics::increment_reconciliations(kind);
    let start = Instant::now();
    let result = match tokio::time::timeout(deadline, reconcile).await {
        Ok(result) => result,
        Err(_elapsed) => Err(ReconcilerError::DeadlineExceeded(deadline)),
    };
    metrics::observe_reconciliation_duration(kind, start.elapsed().as_secs_f64());
    if result.is_ok() {
        metrics::increment_requeues("scheduled");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_exceeded_is_reported() {
        let result = with_deadline("Application", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Action::await_change())
        })
        .await;
        assert!(matches!(
            result,
            Err(ReconcilerError::DeadlineExceeded(d)) if d == Duration::from_millis(10)
        ));
    }

    #[tokio::test]
    async fn test_fast_reconcile_passes_through() {
        let result = with_deadline("AppService", Duration::from_secs(5), async {
            Ok(Action::requeue(Duration::from_secs(30)))
        })
        .await;
        assert_eq!(result.unwrap(), Action::requeue(Duration::from_secs(30)));
    }
}
