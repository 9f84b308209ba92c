//! Dashboard session
//!
//! A [`Session`] is the one context object of a running dashboard. It owns
//! the catalog, the view, the suppression tracker, the transport and both
//! background loops, and routes [`Intent`]s to the dispatcher or the catalog.

use anyhow::{ensure, Context, Result};
use parking_lot::RwLock;
use std::{path::Path, sync::Arc};
use tokio::time::Instant;

use super::{
    catalog::{DeviceCatalog, IdentityKey, SharedCatalog, MAX_INPUT_NUMBER},
    connectivity::ConnectivityMonitor,
    dispatcher::Dispatcher,
    intent::Intent,
    persistence::{load_catalog, ConfigFile},
    reconciler::{Reconciler, ReconciliationLoop},
    render::render_dashboard,
    settings::DashboardSettings,
    suppression::SuppressionTracker,
    timings::Timings,
    transport::RelayTransport,
    view::{DashboardView, SharedView, StatusKind},
};
use crate::protocol::{codec::decode_matrix_report, matrix::Matrix};

pub struct Session {
    catalog: SharedCatalog,
    settings: RwLock<DashboardSettings>,
    view: SharedView,
    tracker: Arc<SuppressionTracker>,
    transport: Arc<dyn RelayTransport>,
    poll: Arc<ReconciliationLoop>,
    monitor: Arc<ConnectivityMonitor>,
    dispatcher: Dispatcher,
}

impl Session {
    pub fn new(
        catalog: DeviceCatalog,
        settings: DashboardSettings,
        transport: Arc<dyn RelayTransport>,
        timings: Timings,
    ) -> Self {
        let view = DashboardView::for_catalog(&catalog).shared();
        let catalog: SharedCatalog = Arc::new(RwLock::new(catalog));
        let tracker = SuppressionTracker::new();

        let reconciler = Arc::new(Reconciler::new(
            catalog.clone(),
            view.clone(),
            tracker.clone(),
            transport.clone(),
            timings.input_highlight,
        ));
        let poll = ReconciliationLoop::new(reconciler, timings.poll_interval);
        let monitor = ConnectivityMonitor::new(
            catalog.clone(),
            view.clone(),
            transport.clone(),
            timings.connectivity_interval,
        );
        let dispatcher = Dispatcher::new(
            catalog.clone(),
            view.clone(),
            tracker.clone(),
            transport.clone(),
            poll.clone(),
            timings,
        );

        Self {
            catalog,
            settings: RwLock::new(settings),
            view,
            tracker,
            transport,
            poll,
            monitor,
            dispatcher,
        }
    }

    /// Read every configuration file of `data_dir`. Only `devices.json` is
    /// required.
    pub fn load(data_dir: &Path, transport: Arc<dyn RelayTransport>, timings: Timings) -> Result<Self> {
        let catalog = load_catalog(data_dir)
            .with_context(|| format!("Failed to load devices from {data_dir:?}"))?;
        let settings = DashboardSettings::load(data_dir);
        log::info!(
            "Loaded {} devices on {} endpoints",
            catalog.devices().len(),
            catalog.endpoints().len()
        );
        Ok(Self::new(catalog, settings, transport, timings))
    }

    pub fn start(&self) {
        self.poll.start();
        self.monitor.start();
    }

    pub fn shutdown(&self) {
        self.poll.stop();
        self.monitor.stop();
    }

    pub fn view(&self) -> &SharedView {
        &self.view
    }

    pub fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    pub fn tracker(&self) -> &Arc<SuppressionTracker> {
        &self.tracker
    }

    pub fn poll(&self) -> &Arc<ReconciliationLoop> {
        &self.poll
    }

    pub fn monitor(&self) -> &Arc<ConnectivityMonitor> {
        &self.monitor
    }

    pub fn settings(&self) -> &RwLock<DashboardSettings> {
        &self.settings
    }

    pub fn render(&self, now: Instant) -> String {
        let catalog = self.catalog.read();
        let settings = self.settings.read();
        let view = self.view.read();
        render_dashboard(&catalog, &settings, &view, &self.tracker, now)
    }

    /// Carry out one intent.
    ///
    /// # Returns
    /// `true` when the action fully succeeded. Failures are reported on the
    /// status line, never as an error.
    pub async fn handle(&self, intent: Intent) -> bool {
        log::debug!("Handling {intent:?}");
        match intent {
            Intent::Toggle {
                address,
                number,
                on,
            } => self.dispatcher.send_single(&address, number, on).await,
            Intent::Trigger { address, number } => {
                self.dispatcher.send_trigger(&address, number).await
            }
            Intent::ToggleGroup { address, group, on } => {
                self.dispatcher.send_group(&address, &group, on).await
            }
            Intent::ToggleAll { on } => self.dispatcher.send_all(on).await,
            Intent::ToggleCustomGroup { name, on } => {
                let group = self.settings.read().custom_group(&name).cloned();
                match group {
                    Some(group) => self.dispatcher.send_custom_group(&group, on).await,
                    None => {
                        self.status(format!("No custom group named \"{name}\""), StatusKind::Error);
                        false
                    }
                }
            }
            Intent::Renumber {
                address,
                number,
                new_number,
            } => self.renumber(&address, number, new_number).await,
            Intent::Rename {
                address,
                number,
                name,
            } => self.rename(&address, number, &name).await,
            Intent::RefreshMatrix { address } => self.refresh_matrix(&address).await,
            Intent::RenameInput {
                address,
                number,
                name,
            } => self.rename_input(&address, number, &name).await,
            Intent::SetGroupIcon {
                address,
                group,
                icon,
            } => self.set_group_icon(&address, &group, &icon).await,
        }
    }

    fn status(&self, message: impl Into<String>, kind: StatusKind) {
        self.view.write().set_status(message, kind);
    }

    async fn renumber(&self, address: &str, number: u8, new_number: u8) -> bool {
        let result = self.catalog.write().renumber(address, number, new_number);
        if let Err(err) = result {
            // The catalog is untouched, so the displayed number stays as it was.
            self.status(err.to_string(), StatusKind::Error);
            return false;
        }
        self.view.write().rekey_device(address, number, new_number);
        self.save_devices().await
    }

    async fn rename(&self, address: &str, number: u8, name: &str) -> bool {
        let result = self.catalog.write().rename(address, number, name);
        if let Err(err) = result {
            self.status(err.to_string(), StatusKind::Error);
            return false;
        }
        self.view.write().bump_layout();
        self.save_devices().await
    }

    /// POST one configuration file through the transport and report the
    /// outcome on the status line.
    async fn persist(
        &self,
        file: ConfigFile,
        body: serde_json::Result<serde_json::Value>,
        saved: &str,
        failed: &str,
    ) -> bool {
        let result = match body {
            Ok(body) => self.transport.save_config(file, body).await,
            Err(err) => Err(err.into()),
        };
        match result {
            Ok(()) => {
                self.status(saved, StatusKind::Success);
                true
            }
            Err(err) => {
                log::error!("Error saving {file}: {err:#}");
                self.status(failed, StatusKind::Error);
                false
            }
        }
    }

    async fn save_devices(&self) -> bool {
        let body = serde_json::to_value(self.catalog.read().to_records());
        self.persist(
            ConfigFile::Devices,
            body,
            "Device name saved!",
            "Failed to save device name",
        )
        .await
    }

    async fn rename_input(&self, address: &str, number: u8, name: &str) -> bool {
        let checked = self.check_endpoint(address).and_then(|()| {
            ensure!(
                number <= MAX_INPUT_NUMBER,
                "Input number must be between 0 and {MAX_INPUT_NUMBER}"
            );
            Ok(())
        });
        if let Err(err) = checked {
            self.status(err.to_string(), StatusKind::Error);
            return false;
        }

        let body = {
            let mut settings = self.settings.write();
            if !settings.set_input_name(address, number, name) {
                return true;
            }
            serde_json::to_value(&settings.input_names)
        };
        self.view.write().bump_layout();
        self.persist(
            ConfigFile::InputNames,
            body,
            "Input names saved!",
            "Failed to save input names",
        )
        .await
    }

    async fn set_group_icon(&self, address: &str, group: &str, icon: &str) -> bool {
        let known = self.catalog.read().groups_on(address).contains_key(group);
        if !known {
            self.status(format!("No group {group} on {address}"), StatusKind::Error);
            return false;
        }

        let key = IdentityKey::group(address, group).to_string();
        let body = {
            let mut settings = self.settings.write();
            if !settings.set_group_icon(&key, icon) {
                return true;
            }
            serde_json::to_value(&settings.group_settings)
        };
        self.view.write().bump_layout();
        self.persist(
            ConfigFile::GroupSettings,
            body,
            "Group icon saved!",
            "Failed to save group icon",
        )
        .await
    }

    fn check_endpoint(&self, address: &str) -> Result<()> {
        ensure!(
            self.catalog.read().endpoint(address).is_some(),
            "Unknown endpoint {address}"
        );
        Ok(())
    }

    async fn refresh_matrix(&self, address: &str) -> bool {
        if let Err(err) = self.check_endpoint(address) {
            self.status(err.to_string(), StatusKind::Error);
            return false;
        }
        match self.transport.fetch_matrix(address).await {
            Ok(raw) => {
                let matrix = Matrix::from_rows(&decode_matrix_report(&raw));
                let mut view = self.view.write();
                if matrix.is_empty() {
                    view.set_status(format!("No matrix data from {address}"), StatusKind::Error);
                } else {
                    view.set_status(format!("Matrix loaded from {address}"), StatusKind::Success);
                }
                view.set_matrix(address, matrix);
                true
            }
            Err(err) => {
                log::error!("Failed to fetch matrix from {address}: {err:#}");
                self.status(format!("Failed to load matrix: {err}"), StatusKind::Error);
                false
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
