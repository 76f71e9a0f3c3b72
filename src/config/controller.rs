//! # Controller Configuration
//!
//! Operator-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_CHART_STORAGE_PATH, DEFAULT_FIELD_MANAGER, DEFAULT_HELM_BINARY,
    DEFAULT_MAX_CONCURRENT_RECONCILIATIONS, DEFAULT_METRICS_PORT, DEFAULT_RECONCILE_DEADLINE_SECS,
    DEFAULT_RECONCILE_WAIT_SECS, DEFAULT_REPOSITORY_LOCK_TIMEOUT_SECS,
    DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
    DEFAULT_WATCH_RESTART_DELAY_SECS, REPOSITORY_CACHE_DIR, REPOSITORY_FILE_NAME,
};
use std::path::PathBuf;
use std::time::Duration;

/// Operator-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Fixed wait between reconciliations (seconds)
    /// Used both after a successful pass and after an error
    pub reconcile_wait_secs: u64,
    /// Deadline for a single reconciliation pass (seconds)
    pub reconcile_deadline_secs: u64,
    /// Repository file lock acquisition timeout (seconds)
    pub repository_lock_timeout_secs: u64,
    /// Shared repository file (Helm `repositories.yaml` schema)
    pub repository_config: PathBuf,
    /// Directory holding downloaded repository indexes
    pub repository_cache: PathBuf,
    /// Helm binary name or path
    pub helm_binary: String,
    /// Field manager for server-side apply
    pub field_manager: String,
    /// Port for metrics and probes
    pub metrics_port: u16,
    /// HTTP server startup timeout (seconds)
    pub server_startup_timeout_secs: u64,
    /// HTTP server readiness poll interval (milliseconds)
    pub server_poll_interval_ms: u64,
    /// Maximum concurrent reconciliations per controller
    pub max_concurrent_reconciliations: u16,
    /// Watch stream restart delay after it ends (seconds)
    pub watch_restart_delay_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let prefix = PathBuf::from(DEFAULT_CHART_STORAGE_PATH);
        Self {
            reconcile_wait_secs: DEFAULT_RECONCILE_WAIT_SECS,
            reconcile_deadline_secs: DEFAULT_RECONCILE_DEADLINE_SECS,
            repository_lock_timeout_secs: DEFAULT_REPOSITORY_LOCK_TIMEOUT_SECS,
            repository_config: prefix.join(REPOSITORY_FILE_NAME),
            repository_cache: prefix.join(REPOSITORY_CACHE_DIR),
            helm_binary: DEFAULT_HELM_BINARY.to_string(),
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            metrics_port: DEFAULT_METRICS_PORT,
            server_startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            server_poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    ///
    /// `CHART_STORAGE_PATH` moves both the repository file and the index cache;
    /// `HELM_REPOSITORY_CONFIG` and `HELM_REPOSITORY_CACHE` override each one individually.
    #[must_use]
    pub fn from_env() -> Self {
        let prefix = PathBuf::from(env_var_or_default_str(
            "CHART_STORAGE_PATH",
            DEFAULT_CHART_STORAGE_PATH,
        ));
        let repository_config = std::env::var("HELM_REPOSITORY_CONFIG")
            .map_or_else(|_| prefix.join(REPOSITORY_FILE_NAME), PathBuf::from);
        let repository_cache = std::env::var("HELM_REPOSITORY_CACHE")
            .map_or_else(|_| prefix.join(REPOSITORY_CACHE_DIR), PathBuf::from);

        Self {
            reconcile_wait_secs: env_var_or_default(
                "RECONCILE_WAIT_SECS",
                DEFAULT_RECONCILE_WAIT_SECS,
            ),
            reconcile_deadline_secs: env_var_or_default(
                "RECONCILE_DEADLINE_SECS",
                DEFAULT_RECONCILE_DEADLINE_SECS,
            ),
            repository_lock_timeout_secs: env_var_or_default(
                "REPOSITORY_LOCK_TIMEOUT_SECS",
                DEFAULT_REPOSITORY_LOCK_TIMEOUT_SECS,
            ),
            repository_config,
            repository_cache,
            helm_binary: env_var_or_default_str("HELM_BINARY", DEFAULT_HELM_BINARY),
            field_manager: env_var_or_default_str("FIELD_MANAGER", DEFAULT_FIELD_MANAGER),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            server_startup_timeout_secs: env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            ),
            server_poll_interval_ms: env_var_or_default(
                "SERVER_POLL_INTERVAL_MS",
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
        }
    }

    /// Get the fixed requeue duration
    #[must_use]
    pub fn reconcile_wait(&self) -> Duration {
        Duration::from_secs(self.reconcile_wait_secs)
    }

    /// Get the per-reconciliation deadline
    #[must_use]
    pub fn reconcile_deadline(&self) -> Duration {
        Duration::from_secs(self.reconcile_deadline_secs)
    }

    /// Get the repository lock acquisition timeout
    #[must_use]
    pub fn repository_lock_timeout(&self) -> Duration {
        Duration::from_secs(self.repository_lock_timeout_secs)
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
pub(crate) fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths_share_prefix() {
        let config = ControllerConfig::default();
        assert_eq!(
            config.repository_config,
            PathBuf::from("/tmp/cloudship/helm/repositories.yaml")
        );
        assert_eq!(
            config.repository_cache,
            PathBuf::from("/tmp/cloudship/helm/repository")
        );
    }

    #[test]
    fn test_default_durations() {
        let config = ControllerConfig::default();
        assert_eq!(config.reconcile_wait(), Duration::from_secs(30));
        assert_eq!(config.repository_lock_timeout(), Duration::from_secs(30));
        assert!(config.reconcile_deadline() > config.reconcile_wait());
    }

    #[test]
    fn test_env_var_or_default_falls_back_on_garbage() {
        assert_eq!(
            env_var_or_default("CLOUDSHIP_TEST_UNSET_VARIABLE", 42_u64),
            42
        );
    }
}
