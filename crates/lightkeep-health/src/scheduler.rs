//! Background health scheduler.
//!
//! One long-lived task sweeps every registered service on a fixed interval:
//! resolve the probe target (migrating legacy records on the way), probe
//! it, and write the outcome back through the store. The same check path
//! serves on-demand checks triggered by the API, so a slow probe only ever
//! delays the path that issued it — the store is touched before and after
//! the network call, never across it.

use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use lightkeep_registry::{
    HealthStatus, RegistryResult, RegistryStore, ServiceId, ServiceRecord,
};

use crate::probe::{http_probe, probe_client};
use crate::target::{migrate_legacy_url, resolve_target};

/// Outcome of an on-demand check requested through the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The probe ran and the resulting status was persisted.
    Checked(HealthStatus),
    /// The record exists but has no resolvable probe target; nothing was
    /// probed or written.
    NoTarget,
    /// No record with that id.
    NotFound,
}

/// Periodic health checker with an explicit start/stop lifecycle.
pub struct HealthScheduler {
    store: RegistryStore,
    client: reqwest::Client,
    interval: Duration,
    slot: Mutex<Option<LoopSlot>>,
}

struct LoopSlot {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl HealthScheduler {
    /// Create a scheduler. Fails only if the probe client cannot be built.
    pub fn new(
        store: RegistryStore,
        interval: Duration,
        probe_timeout: Duration,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            store,
            client: probe_client(probe_timeout)?,
            interval,
            slot: Mutex::new(None),
        })
    }

    /// Spawn the sweep loop. Starting again replaces a running loop.
    pub async fn start(&self) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let store = self.store.clone();
        let client = self.client.clone();
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "health sweep loop starting");
            loop {
                sweep(&store, &client).await;
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown_rx.changed() => {
                        debug!("health sweep loop shutting down");
                        break;
                    }
                }
            }
        });

        let mut slot = self.slot.lock().await;
        if let Some(old) = slot.replace(LoopSlot {
            handle,
            shutdown_tx,
        }) {
            let _ = old.shutdown_tx.send(true);
            old.handle.abort();
        }
    }

    /// Stop the sweep loop if one is running.
    pub async fn stop(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(old) = slot.take() {
            let _ = old.shutdown_tx.send(true);
            old.handle.abort();
            info!("health sweep loop stopped");
        }
    }

    /// Whether the sweep loop is currently running.
    pub async fn is_running(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Check one record now and persist the outcome. Returns `None` when
    /// the record has no resolvable target (no probe, no write).
    pub async fn check_service(
        &self,
        record: &ServiceRecord,
    ) -> RegistryResult<Option<HealthStatus>> {
        check_record(&self.store, &self.client, record).await
    }

    /// On-demand check by id, distinguishing a missing record from one
    /// with no usable target.
    pub async fn check_by_id(&self, id: ServiceId) -> RegistryResult<CheckOutcome> {
        match self.store.find(id)? {
            Some(record) => match check_record(&self.store, &self.client, &record).await? {
                Some(status) => Ok(CheckOutcome::Checked(status)),
                None => Ok(CheckOutcome::NoTarget),
            },
            None => Ok(CheckOutcome::NotFound),
        }
    }
}

/// One pass across every registered service. A failure on one record is
/// logged and never aborts the rest of the sweep.
async fn sweep(store: &RegistryStore, client: &reqwest::Client) {
    let services = match store.list() {
        Ok(services) => services,
        Err(e) => {
            error!(error = %e, "health sweep could not list services");
            return;
        }
    };
    debug!(count = services.len(), "health sweep starting");
    for record in services {
        let id = record.id;
        match check_record(store, client, &record).await {
            Ok(Some(status)) => {
                debug!(id, name = %record.name, status = ?status, "service checked");
            }
            Ok(None) => {
                debug!(id, name = %record.name, "service has no probe target, skipped");
            }
            Err(e) => {
                warn!(id, error = %e, "health check failed for service, continuing sweep");
            }
        }
    }
}

/// Shared resolve → migrate → probe → persist path. The store lock is
/// only held inside the store calls, never across the network probe.
async fn check_record(
    store: &RegistryStore,
    client: &reqwest::Client,
    record: &ServiceRecord,
) -> RegistryResult<Option<HealthStatus>> {
    let record = migrate_legacy_url(store, record)?;
    let Some(target) = resolve_target(&record) else {
        return Ok(None);
    };
    let status: HealthStatus = http_probe(client, &target).await.into();
    store.update_health(record.id, status)?;
    Ok(Some(status))
}
