//! # Helm CLI Runtime
//!
//! [`ChartRuntime`] backed by the `helm` binary.
//!
//! Reads and renders go through `helm ... -o json`; history revisions are
//! removed directly from the secrets storage driver
//! (`sh.helm.release.v1.<name>.v<revision>`), which is what the package
//! manager would do itself when pruning history.

use crate::config::ControllerConfig;
use crate::observability::metrics;
use crate::release::{ChartRuntime, HistoryStatus, ReleaseRecord, ReleaseRequest, RuntimeError};
use anyhow::Context;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams};
use regex::Regex;
use serde::Deserialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, error, info_span, Instrument};

static CHART_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>.+)-(?P<version>v?\d+\.\d+\.\d+\S*)$")
        .expect("Failed to compile CHART_LABEL pattern - this should never happen")
});

#[derive(Clone)]
pub struct HelmCli {
    binary: PathBuf,
    repository_config: PathBuf,
    repository_cache: PathBuf,
    client: kube::Client,
}

impl std::fmt::Debug for HelmCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelmCli")
            .field("binary", &self.binary)
            .field("repository_config", &self.repository_config)
            .field("repository_cache", &self.repository_cache)
            .finish_non_exhaustive()
    }
}

/// `helm history -o json` entry
#[derive(Debug, Deserialize)]
struct HistoryEntry {
    revision: u32,
    status: HistoryStatus,
    #[serde(default)]
    chart: String,
}

/// `helm install|upgrade -o json` release
#[derive(Debug, Deserialize)]
struct HelmRelease {
    name: String,
    namespace: String,
    version: u32,
    info: HelmReleaseInfo,
    chart: Option<HelmChart>,
    #[serde(default)]
    manifest: String,
}

#[derive(Debug, Deserialize)]
struct HelmReleaseInfo {
    status: HistoryStatus,
}

#[derive(Debug, Deserialize)]
struct HelmChart {
    metadata: Option<HelmChartMetadata>,
}

#[derive(Debug, Deserialize)]
struct HelmChartMetadata {
    name: String,
    version: String,
}

impl From<HelmRelease> for ReleaseRecord {
    fn from(release: HelmRelease) -> Self {
        let metadata = release.chart.and_then(|c| c.metadata);
        Self {
            name: release.name,
            namespace: release.namespace,
            revision: release.version,
            status: release.info.status,
            chart_name: metadata.as_ref().map(|m| m.name.clone()),
            chart_version: metadata.map(|m| m.version),
            manifest: release.manifest,
        }
    }
}

/// Split a history `chart` label (`redis-12.8.3`) into name and version
fn split_chart_label(label: &str) -> Option<(String, String)> {
    let captures = CHART_LABEL.captures(label)?;
    Some((captures["name"].to_string(), captures["version"].to_string()))
}

/// Secret holding one revision in the secrets storage driver
#[must_use]
pub fn release_secret_name(name: &str, revision: u32) -> String {
    format!("sh.helm.release.v1.{name}.v{revision}")
}

fn is_not_found(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    stderr.contains("not found") || stderr.contains("has no deployed releases")
}

impl HelmCli {
    /// Locate the helm binary and bind it to the shared repository file
    ///
    /// # Errors
    ///
    /// Returns an error if the binary cannot be found on `PATH`.
    pub fn new(config: &ControllerConfig, client: kube::Client) -> anyhow::Result<Self> {
        let binary = which::which(&config.helm_binary)
            .with_context(|| format!("helm binary {:?} not found", config.helm_binary))?;
        debug!("Using helm binary {}", binary.display());
        Ok(Self {
            binary,
            repository_config: config.repository_config.clone(),
            repository_cache: config.repository_cache.clone(),
            client,
        })
    }

    async fn run(&self, command: &str, args: &[&str]) -> Result<Vec<u8>, RuntimeError> {
        let start = Instant::now();
        let output = Command::new(&self.binary)
            .arg(command)
            .args(args)
            .arg("--repository-config")
            .arg(&self.repository_config)
            .arg("--repository-cache")
            .arg(&self.repository_cache)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to execute helm {command}"))?;
        metrics::observe_helm_command_duration(command, start.elapsed().as_secs_f64());

        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if is_not_found(&stderr) {
            return Err(RuntimeError::NotFound(stderr));
        }
        error!("helm {} failed: {}", command, stderr);
        Err(RuntimeError::Command {
            command: command.to_string(),
            stderr,
        })
    }

    /// Install or upgrade (optionally dry-run) and decode the resulting release
    async fn apply(
        &self,
        command: &'static str,
        request: &ReleaseRequest,
        dry_run: bool,
    ) -> Result<HelmRelease, RuntimeError> {
        let values = values_file(request)?;
        let values_path = values.path().to_string_lossy().into_owned();
        let reference = request.chart.reference();

        let mut args = vec![
            request.name.as_str(),
            reference.as_str(),
            "--version",
            request.chart.version.as_str(),
            "--namespace",
            request.namespace.as_str(),
            "--values",
            values_path.as_str(),
            "--output",
            "json",
        ];
        if dry_run {
            args.push("--dry-run");
        }

        let span = info_span!(
            "helm.command",
            helm.command = command,
            helm.dry_run = dry_run,
            release.name = %request.name,
            release.namespace = %request.namespace,
        );
        let stdout = self.run(command, &args).instrument(span).await?;
        serde_json::from_slice(&stdout).map_err(|e| RuntimeError::Decode {
            command: command.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Values go through a file so nested structures survive intact; JSON is valid YAML
fn values_file(request: &ReleaseRequest) -> Result<tempfile::NamedTempFile, RuntimeError> {
    let mut file = tempfile::Builder::new()
        .prefix("values-")
        .suffix(".json")
        .tempfile()
        .context("Failed to create values file")?;
    serde_json::to_writer(&mut file, &request.values).context("Failed to write values file")?;
    file.flush().context("Failed to flush values file")?;
    Ok(file)
}

#[async_trait]
impl ChartRuntime for HelmCli {
    async fn history(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<ReleaseRecord>, RuntimeError> {
        let span = info_span!("helm.command", helm.command = "history", release.name = name);
        let stdout = self
            .run("history", &[name, "--namespace", namespace, "--output", "json"])
            .instrument(span)
            .await?;
        let entries: Vec<HistoryEntry> =
            serde_json::from_slice(&stdout).map_err(|e| RuntimeError::Decode {
                command: "history".to_string(),
                reason: e.to_string(),
            })?;

        Ok(entries
            .into_iter()
            .map(|entry| {
                let (chart_name, chart_version) = split_chart_label(&entry.chart).unzip();
                ReleaseRecord {
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                    revision: entry.revision,
                    status: entry.status,
                    chart_name,
                    chart_version,
                    manifest: String::new(),
                }
            })
            .collect())
    }

    async fn deployed(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ReleaseRecord>, RuntimeError> {
        let history = match self.history(namespace, name).await {
            Ok(history) => history,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let Some(mut deployed) = history
            .into_iter()
            .filter(|r| r.status == HistoryStatus::Deployed)
            .max_by_key(|r| r.revision)
        else {
            return Ok(None);
        };

        let revision = deployed.revision.to_string();
        let span = info_span!("helm.command", helm.command = "get manifest", release.name = name);
        let stdout = self
            .run(
                "get",
                &["manifest", name, "--namespace", namespace, "--revision", &revision],
            )
            .instrument(span)
            .await?;
        deployed.manifest = String::from_utf8(stdout).map_err(|e| RuntimeError::Decode {
            command: "get manifest".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(deployed))
    }

    async fn delete_revision(
        &self,
        namespace: &str,
        name: &str,
        revision: u32,
    ) -> Result<(), RuntimeError> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret_name = release_secret_name(name, revision);
        match secrets.delete(&secret_name, &DeleteParams::default()).await {
            Ok(_) => {
                debug!("Deleted release revision {}/{}", namespace, secret_name);
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => Err(RuntimeError::NotFound(secret_name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn render_upgrade(&self, request: &ReleaseRequest) -> Result<String, RuntimeError> {
        Ok(self.apply("upgrade", request, true).await?.manifest)
    }

    async fn install(&self, request: &ReleaseRequest) -> Result<ReleaseRecord, RuntimeError> {
        Ok(self.apply("install", request, false).await?.into())
    }

    async fn upgrade(&self, request: &ReleaseRequest) -> Result<ReleaseRecord, RuntimeError> {
        Ok(self.apply("upgrade", request, false).await?.into())
    }
}
