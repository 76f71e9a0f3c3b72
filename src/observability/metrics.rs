//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `cloudship_reconciliations_total` - Total number of reconciliations by resource kind
//! - `cloudship_reconciliation_errors_total` - Total number of reconciliation errors by resource kind
//! - `cloudship_reconciliation_duration_seconds` - Duration of reconciliation passes
//! - `cloudship_requeues_total` - Requeues scheduled, by reason
//! - `cloudship_release_syncs_total` - Release syncs by dependency kind and resulting state
//! - `cloudship_release_installs_total` - Release installs by dependency kind
//! - `cloudship_release_upgrades_total` - Release upgrades by dependency kind
//! - `cloudship_release_operation_errors_total` - Failed release operations by kind and operation
//! - `cloudship_helm_command_duration_seconds` - Duration of helm invocations
//! - `cloudship_repository_refresh_total` - Repository index refreshes by outcome
//! - `cloudship_repository_lock_timeouts_total` - Repository lock acquisition timeouts

use anyhow::Result;
use prometheus::{HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloudship_reconciliations_total",
            "Total number of reconciliations",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloudship_reconciliation_errors_total",
            "Total number of reconciliation errors",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "cloudship_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new("cloudship_requeues_total", "Total number of requeues scheduled"),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static RELEASE_SYNCS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloudship_release_syncs_total",
            "Total number of release syncs by resulting state",
        ),
        &["dependency", "state"],
    )
    .expect("Failed to create RELEASE_SYNCS_TOTAL metric - this should never happen")
});

static RELEASE_INSTALLS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloudship_release_installs_total",
            "Total number of release installs",
        ),
        &["dependency"],
    )
    .expect("Failed to create RELEASE_INSTALLS_TOTAL metric - this should never happen")
});

static RELEASE_UPGRADES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloudship_release_upgrades_total",
            "Total number of release upgrades",
        ),
        &["dependency"],
    )
    .expect("Failed to create RELEASE_UPGRADES_TOTAL metric - this should never happen")
});

static RELEASE_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloudship_release_operation_errors_total",
            "Total number of failed release operations",
        ),
        &["dependency", "operation"],
    )
    .expect("Failed to create RELEASE_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static HELM_COMMAND_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "cloudship_helm_command_duration_seconds",
            "Duration of helm invocations in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["command"],
    )
    .expect("Failed to create HELM_COMMAND_DURATION metric - this should never happen")
});

static REPOSITORY_REFRESH_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloudship_repository_refresh_total",
            "Total number of repository index refreshes by outcome",
        ),
        &["repository", "outcome"],
    )
    .expect("Failed to create REPOSITORY_REFRESH_TOTAL metric - this should never happen")
});

static REPOSITORY_LOCK_TIMEOUTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cloudship_repository_lock_timeouts_total",
        "Total number of repository lock acquisition timeouts",
    )
    .expect("Failed to create REPOSITORY_LOCK_TIMEOUTS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RELEASE_SYNCS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RELEASE_INSTALLS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RELEASE_UPGRADES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RELEASE_OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(HELM_COMMAND_DURATION.clone()))?;
    REGISTRY.register(Box::new(REPOSITORY_REFRESH_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REPOSITORY_LOCK_TIMEOUTS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(kind: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[kind])
        .observe(duration);
}

pub fn increment_requeues(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_release_syncs(dependency: &str, state: &str) {
    RELEASE_SYNCS_TOTAL
        .with_label_values(&[dependency, state])
        .inc();
}

pub fn increment_release_installs(dependency: &str) {
    RELEASE_INSTALLS_TOTAL.with_label_values(&[dependency]).inc();
}

pub fn increment_release_upgrades(dependency: &str) {
    RELEASE_UPGRADES_TOTAL.with_label_values(&[dependency]).inc();
}

/// Increment release operation errors counter
pub fn increment_release_operation_errors(dependency: &str, operation: &str) {
    RELEASE_OPERATION_ERRORS_TOTAL
        .with_label_values(&[dependency, operation])
        .inc();
}

pub fn observe_helm_command_duration(command: &str, duration: f64) {
    HELM_COMMAND_DURATION
        .with_label_values(&[command])
        .observe(duration);
}

pub fn increment_repository_refresh(repository: &str, outcome: &str) {
    REPOSITORY_REFRESH_TOTAL
        .with_label_values(&[repository, outcome])
        .inc();
}

pub fn increment_repository_lock_timeouts() {
    REPOSITORY_LOCK_TIMEOUTS_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        // This should not panic - metrics should register successfully
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_increment_reconciliations() {
        let before = RECONCILIATIONS_TOTAL.with_label_values(&["Application"]).get();
        increment_reconciliations("Application");
        let after = RECONCILIATIONS_TOTAL.with_label_values(&["Application"]).get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_increment_reconciliation_errors() {
        let before = RECONCILIATION_ERRORS_TOTAL
            .with_label_values(&["AppService"])
            .get();
        increment_reconciliation_errors("AppService");
        let after = RECONCILIATION_ERRORS_TOTAL
            .with_label_values(&["AppService"])
            .get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_observe_reconciliation_duration() {
        observe_reconciliation_duration("Application", 1.5);
        // Just verify it doesn't panic - histogram observation doesn't return a value
    }

    #[test]
    fn test_release_sync_labels_are_independent() {
        let installed = RELEASE_SYNCS_TOTAL
            .with_label_values(&["redis", "Installed"])
            .get();
        let drifted = RELEASE_SYNCS_TOTAL
            .with_label_values(&["redis", "UpgradeRequired"])
            .get();
        increment_release_syncs("redis", "Installed");
        assert_eq!(
            RELEASE_SYNCS_TOTAL
                .with_label_values(&["redis", "Installed"])
                .get(),
            installed + 1
        );
        assert_eq!(
            RELEASE_SYNCS_TOTAL
                .with_label_values(&["redis", "UpgradeRequired"])
                .get(),
            drifted
        );
    }

    #[test]
    fn test_increment_release_installs_and_upgrades() {
        let installs = RELEASE_INSTALLS_TOTAL.with_label_values(&["mysql"]).get();
        let upgrades = RELEASE_UPGRADES_TOTAL.with_label_values(&["mysql"]).get();
        increment_release_installs("mysql");
        increment_release_upgrades("mysql");
        assert_eq!(
            RELEASE_INSTALLS_TOTAL.with_label_values(&["mysql"]).get(),
            installs + 1
        );
        assert_eq!(
            RELEASE_UPGRADES_TOTAL.with_label_values(&["mysql"]).get(),
            upgrades + 1
        );
    }

    #[test]
    fn test_increment_repository_lock_timeouts() {
        let before = REPOSITORY_LOCK_TIMEOUTS_TOTAL.get();
        increment_repository_lock_timeouts();
        assert!(REPOSITORY_LOCK_TIMEOUTS_TOTAL.get() > before);
    }
}
