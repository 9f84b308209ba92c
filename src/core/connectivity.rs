//! Connectivity monitor
//!
//! Probes every endpoint directly, independent of the reconciliation loop and
//! the suppression tracker. The first round also tells the user whether the
//! expected network is reachable at all.

use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use super::{
    catalog::SharedCatalog,
    task_manager::spawn_task,
    transport::RelayTransport,
    view::{EndpointStatus, SharedView, StatusKind},
};

pub struct ConnectivityMonitor {
    catalog: SharedCatalog,
    view: SharedView,
    transport: Arc<dyn RelayTransport>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityMonitor {
    pub fn new(
        catalog: SharedCatalog,
        view: SharedView,
        transport: Arc<dyn RelayTransport>,
        interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            catalog,
            view,
            transport,
            interval,
            task: Mutex::new(None),
        })
    }

    /// Probe every endpoint concurrently and record Connected/Offline.
    ///
    /// # Returns
    /// Number of reachable endpoints.
    pub async fn check_all(&self) -> usize {
        let addresses: Vec<String> = self
            .catalog
            .read()
            .endpoints()
            .iter()
            .map(|e| e.address.clone())
            .collect();

        let results =
            futures::future::join_all(addresses.iter().map(|a| self.transport.probe(a))).await;

        let mut reachable = 0;
        let mut view = self.view.write();
        for (address, result) in addresses.iter().zip(results) {
            let status = match result {
                Ok(()) => {
                    reachable += 1;
                    EndpointStatus::Connected
                }
                Err(err) => {
                    log::debug!("Cannot reach {address}: {err:#}");
                    EndpointStatus::Offline
                }
            };
            let previous = view.endpoint_status(address);
            if view.set_endpoint_status(address, status) && previous != EndpointStatus::Checking {
                log::info!("{address} is now {status}");
            }
        }
        reachable
    }

    fn expected_network(&self) -> Option<String> {
        self.catalog
            .read()
            .endpoints()
            .first()
            .and_then(|e| e.network.clone())
    }

    /// Report the expected network on the status line after the first round.
    fn report_network(&self, reachable: usize) {
        let Some(network) = self.expected_network() else {
            return;
        };

        let mut view = self.view.write();
        if reachable == 0 {
            log::warn!("No endpoint reachable, expected network is {network}");
            view.set_status(
                format!("Warning: Please connect to WiFi network \"{network}\""),
                StatusKind::Error,
            );
        } else {
            view.set_status(
                format!("Connected to {network} - Devices reachable"),
                StatusKind::Success,
            );
        }
    }

    /// Start probing: one round now, then one per interval. Restarting
    /// cancels the previous schedule.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if let Some(previous) = task.take() {
            previous.abort();
        }

        let this = Arc::clone(self);
        *task = Some(spawn_task(async move {
            let mut ticker = tokio::time::interval(this.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            if let Some(network) = this.expected_network() {
                this.view.write().set_status(
                    format!("Checking connectivity to {network}..."),
                    StatusKind::Info,
                );
            }
            let reachable = this.check_all().await;
            this.report_network(reachable);
            loop {
                ticker.tick().await;
                this.check_all().await;
            }
        }));
    }

    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }
}
