//! # Node Runtime
//!
//! Owns the subsystem container and the background tasks that drive it.
//!
//! ## Background Tasks
//!
//! - `[ql-04]` ledger loop: seals on batch threshold and flush interval
//! - `[ql-03]` periodic incremental audit (if `audit.interval_ms > 0`)
//! - `[node]` alert logger
//!
//! All stop on the shutdown watch; the ledger flushes and announces closure
//! on its way out.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use ql_04_ledger_core::LedgerApi;
use shared_types::{AlgorithmId, IdentityId};

use crate::adapters::AlertLogger;
use crate::container::{NodeConfig, SubsystemContainer};

/// How long shutdown waits for background tasks.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct NodeRuntime {
    container: Arc<SubsystemContainer>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl NodeRuntime {
    pub fn new(config: NodeConfig) -> Result<Self> {
        Ok(Self::from_container(SubsystemContainer::new(config)?))
    }

    pub fn from_container(container: SubsystemContainer) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            container: Arc::new(container),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the background tasks.
    pub fn start(&self) {
        info!("===========================================");
        info!("  Quantum-Ledger Node Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let container = &self.container;
        let mut tasks = self.tasks.lock();

        let alerts = AlertLogger::subscribe(container.event_bus.as_ref());
        tasks.push(("alerts", tokio::spawn(alerts.run(self.shutdown_tx.subscribe()))));

        let ledger = container.ledger.clone();
        let shutdown = self.shutdown_tx.subscribe();
        tasks.push((
            "ledger",
            tokio::spawn(async move { ledger.run(shutdown).await }),
        ));

        if container.verifier.config().interval().is_some() {
            let verifier = container.verifier.clone();
            tasks.push((
                "audit",
                tokio::spawn(verifier.run_periodic(self.shutdown_tx.subscribe())),
            ));
        }

        info!(
            backend = ?container.config.storage.backend,
            data_dir = %container.config.storage.data_dir.display(),
            head = container.ledger.head_sequence(),
            signer = %container.ledger.signer(),
            "[node] Node running"
        );
    }

    /// Rotate to a new signing key and re-drive blocks parked under the old one.
    pub async fn rotate_signer(&self, algorithm: AlgorithmId) -> Result<IdentityId> {
        let id = self.container.rotate_signer(algorithm)?;
        match self.container.ledger.redrive_pending().await {
            Ok(0) => {}
            Ok(n) => info!(recovered = n, "[node] Parked blocks committed under new signer"),
            Err(e) => warn!(error = %e, "[node] Parked blocks still pending after rotation"),
        }
        Ok(id)
    }

    /// Signal shutdown and wait for the background tasks.
    pub async fn shutdown(&self) {
        info!("[node] Initiating graceful shutdown...");
        self.shutdown_tx.send_replace(true);

        let tasks = std::mem::take(&mut *self.tasks.lock());
        if tasks.is_empty() {
            // Never started: nothing else will flush the ledger.
            if let Err(e) = self.container.ledger.shutdown().await {
                warn!(error = %e, "[node] Final flush incomplete");
            }
        }
        for (name, handle) in tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(task = name, error = %e, "[node] Task failed"),
                Err(_) => error!(task = name, "[node] Task did not stop in time"),
            }
        }

        let head = self.container.ledger.head_sequence();
        info!(head, "[node] Shutdown complete");
    }

    pub fn container(&self) -> Arc<SubsystemContainer> {
        Arc::clone(&self.container)
    }
}
