//! Shared fixtures for the integration tests: a chart index fetcher that never
//! touches the network, and helpers wiring it into the release machinery.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use cloudship_operator::config::ChartCatalog;
use cloudship_operator::release::{InMemoryRuntime, ManagerFactory};
use cloudship_operator::repository::{IndexFetcher, RepositorySynchronizer};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const INDEX: &[u8] = b"apiVersion: v1\nentries:\n  redis:\n    - version: 12.8.3\n";

/// Serves a valid index for every URL except the ones marked unreachable
#[derive(Debug, Default)]
pub struct StubFetcher {
    unreachable: Mutex<HashSet<String>>,
    pub calls: AtomicUsize,
}

impl StubFetcher {
    pub fn unreachable(&self, url: &str) {
        self.unreachable.lock().unwrap().insert(url.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexFetcher for StubFetcher {
    async fn fetch_index(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.lock().unwrap().iter().any(|u| url.starts_with(u)) {
            anyhow::bail!("connection refused");
        }
        Ok(INDEX.to_vec())
    }
}

pub fn synchronizer(dir: &Path, fetcher: Arc<StubFetcher>) -> RepositorySynchronizer {
    RepositorySynchronizer::new(
        dir.join("repositories.yaml"),
        dir.join("repository"),
        Duration::from_secs(10),
        fetcher,
    )
}

pub fn factory(dir: &Path, runtime: Arc<InMemoryRuntime>) -> ManagerFactory {
    ManagerFactory::new(
        Arc::new(synchronizer(dir, Arc::new(StubFetcher::default()))),
        runtime,
        Arc::new(ChartCatalog::default()),
    )
}
