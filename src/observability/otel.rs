//! # OpenTelemetry Support
//!
//! Datadog APM export through `datadog-opentelemetry`, enabled when
//! `DD_API_KEY` is present in the environment. Without it the operator logs to
//! stdout only.

use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};

/// Default `DD_SERVICE` when none is set
pub const DEFAULT_SERVICE_NAME: &str = "cloudship-operator";

/// Tracer provider handle for graceful shutdown
#[derive(Debug)]
pub enum TracerProviderHandle {
    Datadog(opentelemetry_sdk::trace::SdkTracerProvider),
}

/// Settings read from `DD_*` variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatadogSettings {
    pub service: Option<String>,
    pub version: Option<String>,
    pub environment: Option<String>,
    pub site: Option<String>,
    pub agent_url: Option<String>,
}

impl DatadogSettings {
    /// `None` unless `DD_API_KEY` is set
    #[must_use]
    pub fn from_env() -> Option<Self> {
        if std::env::var_os("DD_API_KEY").is_none() {
            return None;
        }
        Some(Self {
            service: std::env::var("DD_SERVICE").ok(),
            version: std::env::var("DD_VERSION").ok(),
            environment: std::env::var("DD_ENV").ok(),
            site: std::env::var("DD_SITE").ok(),
            agent_url: std::env::var("DD_TRACE_AGENT_URL").ok(),
        })
    }

    /// Fill unset values with the operator defaults
    #[must_use]
    pub fn with_defaults(self) -> Self {
        Self {
            service: Some(
                self.service
                    .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            ),
            version: Some(self.version.unwrap_or_else(|| {
                format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("BUILD_GIT_HASH"))
            })),
            environment: self.environment,
            site: Some(self.site.unwrap_or_else(|| "datadoghq.com".to_string())),
            agent_url: Some(
                self.agent_url
                    .unwrap_or_else(|| "http://localhost:8126".to_string()),
            ),
        }
    }
}

/// Initialize tracing export when Datadog is configured
///
/// Returns `Ok(None)` when no `DD_API_KEY` is present.
///
/// # Errors
///
/// Reserved for exporter setup failures.
pub fn init_otel() -> Result<Option<TracerProviderHandle>> {
    let Some(settings) = DatadogSettings::from_env() else {
        if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
            warn!("OTEL_EXPORTER_OTLP_ENDPOINT is set but only Datadog export is supported");
        }
        return Ok(None);
    };
    Ok(Some(init_datadog(settings.with_defaults())))
}

fn init_datadog(settings: DatadogSettings) -> TracerProviderHandle {
    // datadog-opentelemetry reads its configuration from DD_* variables
    let pairs = [
        ("DD_SERVICE", &settings.service),
        ("DD_VERSION", &settings.version),
        ("DD_ENV", &settings.environment),
        ("DD_SITE", &settings.site),
        ("DD_TRACE_AGENT_URL", &settings.agent_url),
    ];
    for (key, value) in pairs {
        if let Some(value) = value {
            std::env::set_var(key, value);
        }
    }

    info!(
        "Initializing Datadog OpenTelemetry tracing: service={:?}, version={:?}, env={:?}",
        settings.service, settings.version, settings.environment
    );
    let tracer_provider = datadog_opentelemetry::tracing().init();
    info!("✅ Datadog OpenTelemetry tracing initialized");

    TracerProviderHandle::Datadog(tracer_provider)
}

/// Flush pending spans and shut the tracer provider down
pub fn shutdown_otel(tracer_provider: Option<TracerProviderHandle>) {
    if let Some(TracerProviderHandle::Datadog(provider)) = tracer_provider {
        info!("Shutting down Datadog tracer provider...");
        if let Err(e) = provider.shutdown_with_timeout(Duration::from_secs(5)) {
            warn!("Error shutting down Datadog tracer provider: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_only_missing_values() {
        let settings = DatadogSettings {
            service: Some("shop-operator".to_string()),
            ..Default::default()
        }
        .with_defaults();
        assert_eq!(settings.service.as_deref(), Some("shop-operator"));
        assert_eq!(settings.site.as_deref(), Some("datadoghq.com"));
        assert_eq!(
            settings.agent_url.as_deref(),
            Some("http://localhost:8126")
        );
        assert!(settings
            .version
            .as_deref()
            .is_some_and(|v| v.starts_with(env!("CARGO_PKG_VERSION"))));
        assert_eq!(settings.environment, None);
    }
}
