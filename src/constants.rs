//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group of the Cloudship custom resources
pub const API_GROUP: &str = "cloudship.toucansoft.io";

/// Field manager used for server-side apply and status patches
pub const DEFAULT_FIELD_MANAGER: &str = "cloudship-operator";

/// Label injected on workloads and services, valued with the owning AppService UID
pub const APP_SERVICE_LABEL_KEY: &str = "appservice.toucansoft.io";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Fixed wait between reconciliations, applied on success and on error alike
pub const DEFAULT_RECONCILE_WAIT_SECS: u64 = 30;

/// Deadline for a single reconciliation pass
pub const DEFAULT_RECONCILE_DEADLINE_SECS: u64 = 120;

/// Bounded acquisition timeout for the repository file lock
pub const DEFAULT_REPOSITORY_LOCK_TIMEOUT_SECS: u64 = 30;

/// Poll interval while waiting for the repository file lock
pub const REPOSITORY_LOCK_POLL_INTERVAL_MS: u64 = 100;

/// Default prefix for chart storage (repository file and index cache)
pub const DEFAULT_CHART_STORAGE_PATH: &str = "/tmp/cloudship/helm";

/// File name of the shared repository file under the storage prefix
pub const REPOSITORY_FILE_NAME: &str = "repositories.yaml";

/// Directory name of the index cache under the storage prefix
pub const REPOSITORY_CACHE_DIR: &str = "repository";

/// Default helm binary name, resolved on `PATH`
pub const DEFAULT_HELM_BINARY: &str = "helm";

/// Default number of reconciliations processed concurrently
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Timeout for a single index download
pub const INDEX_DOWNLOAD_TIMEOUT_SECS: u64 = 60;
