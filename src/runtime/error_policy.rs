//! # Error Policy
//!
//! Requeue decisions for failed reconciliations and classification of watch
//! stream errors.
//!
//! Failed passes are retried after the same fixed wait as successful ones.
//! Errors caused by the resource itself wait for the next change instead.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::observability::metrics;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Handle a reconciliation error for any watched kind
pub fn handle_reconciliation_error<K>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action
where
    K: Resource<DynamicType = ()>,
{
    let kind = K::kind(&());
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.kind = %kind,
        resource.name = %name,
        resource.namespace = %namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {} {}/{}: {}", kind, namespace, name, error);
    metrics::increment_reconciliation_errors(&kind);

    let (action, reason) = requeue_for(error, ctx.config.reconcile_wait());
    metrics::increment_requeues(reason);
    action
}

/// Action and requeue reason for `error`
pub(crate) fn requeue_for(error: &ReconcilerError, wait: Duration) -> (Action, &'static str) {
    if error.is_fatal() {
        warn!("Not retrying until the resource changes: {}", error.reason());
        (Action::await_change(), "fatal")
    } else {
        (Action::requeue(wait), "error")
    }
}

/// Kind of watch stream failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorClass {
    Unauthorized,
    Expired,
    Throttled,
    NotFound,
    Other,
}

impl WatchErrorClass {
    #[must_use]
    pub fn classify(error: &str) -> Self {
        // 404 first: a plain-text 404 body surfaces as a WatchFailed decode error
        let not_found = error.contains("ObjectNotFound")
            || error.contains("404")
            || error.contains("not found");
        if (error.contains("401") || error.contains("Unauthorized")) && !not_found {
            Self::Unauthorized
        } else if error.contains("410")
            || error.contains("too old resource version")
            || error.contains("Expired")
            || error.contains("Gone")
        {
            Self::Expired
        } else if error.contains("429")
            || error.contains("storage is (re)initializing")
            || error.contains("TooManyRequests")
        {
            Self::Throttled
        } else if not_found {
            Self::NotFound
        } else {
            Self::Other
        }
    }
}

/// Log a controller stream error, pausing when the API server needs room
pub async fn handle_watch_stream_error(error: &str, restart_delay: Duration) {
    match WatchErrorClass::classify(error) {
        WatchErrorClass::Unauthorized => {
            error!("❌ Watch authentication failed (401) - check the operator's RBAC bindings");
            tokio::time::sleep(restart_delay).await;
        }
        WatchErrorClass::Expired => {
            warn!("Watch resource version expired (410), watch will restart");
        }
        WatchErrorClass::Throttled => {
            warn!(
                "API server throttling watches (429), backing off {:?}",
                restart_delay
            );
            tokio::time::sleep(restart_delay).await;
        }
        WatchErrorClass::NotFound => {
            warn!("Watched resource not found (404) - is the CRD installed? {}", error);
        }
        WatchErrorClass::Other => {
            error!("Controller stream error: {}", error);
        }
    }
}
