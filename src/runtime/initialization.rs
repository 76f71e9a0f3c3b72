//! # Initialization
//!
//! Operator startup: rustls, tracing, metrics, the probe server, the
//! Kubernetes client and the release machinery shared by both controllers.

use crate::config::{ChartCatalog, ControllerConfig};
use crate::controller::reconciler::Reconciler;
use crate::crd::{AppService, Application};
use crate::observability;
use crate::observability::otel::TracerProviderHandle;
use crate::release::{HelmCli, ManagerFactory};
use crate::repository::{HttpIndexFetcher, RepositorySynchronizer};
use crate::server::{start_server, ServerState};
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
    pub otel_tracer_provider: Option<TracerProviderHandle>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

/// Initialize the operator runtime
///
/// # Errors
///
/// Fails when the probe server cannot start, the cluster is unreachable or
/// the helm binary is missing.
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before anything opens a TLS connection
    rustls::crypto::ring::default_provider()
        .install_default()
        .unwrap_or_else(|_| panic!("Failed to install rustls crypto provider"));

    let otel_tracer_provider =
        observability::otel::init_otel().context("Failed to initialize OpenTelemetry")?;
    init_tracing(otel_tracer_provider.is_some());

    info!("Starting Cloudship operator v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let config = ControllerConfig::from_env();
    info!(
        "Repository file {}, index cache {}",
        config.repository_config.display(),
        config.repository_cache.display()
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());
    let server_handle = {
        let state = Arc::clone(&server_state);
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_server(port, state).await {
                error!("HTTP server error: {}", e);
            }
        })
    };
    wait_for_server_ready(&server_state, &server_handle, &config).await?;

    let client = Client::try_default().await?;

    let fetcher = Arc::new(HttpIndexFetcher::new()?);
    let synchronizer = Arc::new(RepositorySynchronizer::from_config(&config, fetcher));
    let runtime = Arc::new(HelmCli::new(&config, client.clone())?);
    let catalog = Arc::new(ChartCatalog::from_env());
    let releases = ManagerFactory::new(synchronizer, runtime, catalog);

    let reconciler = Arc::new(Reconciler::new(client.clone(), config, releases));

    check_crds_queryable(&client).await;

    info!("Operator initialized, starting watch loop...");
    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
        otel_tracer_provider,
    })
}

fn init_tracing(otel_enabled: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cloudship_operator=info".into());
    let result = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    if let Err(e) = result {
        if otel_enabled {
            // datadog-opentelemetry may have installed its own subscriber
            warn!("Tracing subscriber already initialized: {}", e);
        } else {
            eprintln!("Failed to initialize tracing subscriber: {e}");
        }
    }
}

async fn wait_for_server_ready(
    server_state: &ServerState,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ControllerConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(config.server_startup_timeout_secs);
    let poll_interval = Duration::from_millis(config.server_poll_interval_ms);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        if server_state.ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }
        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Log whether both CRDs are installed; the controllers retry on their own
async fn check_crds_queryable(client: &Client) {
    let params = ListParams::default().limit(1);
    match Api::<Application>::all(client.clone()).list(&params).await {
        Ok(_) => info!("Application CRD is queryable"),
        Err(e) => {
            error!("Application CRD is not queryable: {}. Is the CRD installed?", e);
            error!("Installation: cloudship-operator crd | kubectl apply -f -");
        }
    }
    match Api::<AppService>::all(client.clone()).list(&params).await {
        Ok(_) => info!("AppService CRD is queryable"),
        Err(e) => {
            error!("AppService CRD is not queryable: {}. Is the CRD installed?", e);
            error!("Installation: cloudship-operator crd | kubectl apply -f -");
        }
    }
}
