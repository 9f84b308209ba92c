//! State reconciliation
//!
//! [`Reconciler`] turns one states report into view updates; the
//! [`ReconciliationLoop`] runs it for every endpoint on a fixed period and is
//! paused by the dispatcher while commands are in flight.

use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use strum::Display;
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use super::{
    catalog::{IdentityKey, SharedCatalog, MAX_INPUT_NUMBER},
    suppression::SuppressionTracker,
    task_manager::{spawn_delayed_task, spawn_task},
    transport::RelayTransport,
    view::SharedView,
};
use crate::protocol::codec::{decode_states_report, find_section, SectionKind};

pub struct Reconciler {
    catalog: SharedCatalog,
    view: SharedView,
    tracker: Arc<SuppressionTracker>,
    transport: Arc<dyn RelayTransport>,
    input_highlight: Duration,
}

impl Reconciler {
    pub fn new(
        catalog: SharedCatalog,
        view: SharedView,
        tracker: Arc<SuppressionTracker>,
        transport: Arc<dyn RelayTransport>,
        input_highlight: Duration,
    ) -> Self {
        Self {
            catalog,
            view,
            tracker,
            transport,
            input_highlight,
        }
    }

    /// Apply one raw states report of `address` to the view.
    ///
    /// Suppressed devices and groups are skipped, devices missing from the
    /// report keep their last value, and nothing is written unless it differs.
    /// A report without an output section still updates inputs.
    ///
    /// # Returns
    /// Number of view entries that actually changed.
    pub fn apply_report(&self, address: &str, raw: &str, now: Instant) -> usize {
        let catalog = self.catalog.read();
        let mut view = self.view.write();
        let mut changed = 0;

        if find_section(raw, SectionKind::Input).is_some() {
            for (number, on) in decode_states_report(raw, SectionKind::Input) {
                if number > MAX_INPUT_NUMBER {
                    continue;
                }
                if view.observe_input(address, number, on, now, self.input_highlight) {
                    changed += 1;
                }
            }
        }

        if find_section(raw, SectionKind::Output).is_none() {
            log::debug!("Could not parse output section from states for {address}");
            return changed;
        }
        let outputs = decode_states_report(raw, SectionKind::Output);

        for device in catalog.devices_on(address) {
            let Some(on) = outputs.get(&device.number) else {
                continue;
            };
            let key = device.key();
            if self.tracker.is_suppressed(&key) {
                continue;
            }
            if view.set_on(&key, *on) {
                changed += 1;
            }
        }

        for (group, members) in catalog.groups_on(address) {
            let key = IdentityKey::group(address, &group);
            if self.tracker.is_suppressed(&key) {
                continue;
            }
            let any_on = members
                .iter()
                .any(|device| outputs.get(&device.number).copied().unwrap_or(false));
            if view.set_on(&key, any_on) {
                changed += 1;
            }
        }

        changed
    }

    /// Fetch and apply the states report of one endpoint. Failures leave the
    /// previous view in place.
    pub async fn reconcile_endpoint(&self, address: &str) {
        match self.transport.fetch_states(address).await {
            Ok(raw) => {
                let changed = self.apply_report(address, &raw, Instant::now());
                if changed > 0 {
                    log::debug!("Applied {changed} state changes from {address}");
                }
            }
            Err(err) => log::debug!("Failed to get states from {address}: {err:#}"),
        }
    }

    /// One reconciliation cycle over every endpoint, endpoints in parallel.
    pub async fn run_cycle(&self) {
        let addresses: Vec<String> = self
            .catalog
            .read()
            .endpoints()
            .iter()
            .map(|e| e.address.clone())
            .collect();
        futures::future::join_all(addresses.iter().map(|a| self.reconcile_endpoint(a))).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LoopPhase {
    Stopped,
    Running,
}

#[derive(Default)]
struct LoopState {
    task: Option<JoinHandle<()>>,
    pause_depth: usize,
    resume_pending: bool,
}

impl LoopState {
    fn cancel(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

/// Periodic driver of [`Reconciler::run_cycle`].
///
/// `pause`/`resume` nest: the loop restarts when the last outstanding pause
/// is resumed, and only if it was running when the first pause arrived.
pub struct ReconciliationLoop {
    reconciler: Arc<Reconciler>,
    interval: Duration,
    state: Mutex<LoopState>,
}

impl ReconciliationLoop {
    pub fn new(reconciler: Arc<Reconciler>, interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            reconciler,
            interval,
            state: Mutex::new(LoopState::default()),
        })
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn phase(&self) -> LoopPhase {
        match self.state.lock().task {
            Some(_) => LoopPhase::Running,
            None => LoopPhase::Stopped,
        }
    }

    /// Cancel any running schedule, run one cycle immediately, then one
    /// cycle per interval.
    pub fn start(&self) {
        let mut state = self.state.lock();
        state.cancel();
        state.resume_pending = false;

        let reconciler = Arc::clone(&self.reconciler);
        let period = self.interval;
        state.task = Some(spawn_task(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                reconciler.run_cycle().await;
            }
        }));
        log::debug!("State polling started ({} ms)", period.as_millis());
    }

    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.resume_pending = false;
        if state.cancel() {
            log::debug!("State polling stopped");
        }
    }

    pub fn pause(&self) {
        let mut state = self.state.lock();
        state.pause_depth += 1;
        if state.cancel() {
            state.resume_pending = true;
        }
    }

    pub fn resume(&self) {
        let restart = {
            let mut state = self.state.lock();
            state.pause_depth = state.pause_depth.saturating_sub(1);
            state.pause_depth == 0 && state.resume_pending
        };
        if restart {
            self.start();
        }
    }

    pub fn resume_after(self: &Arc<Self>, delay: Duration) -> JoinHandle<()> {
        let this = Arc::clone(self);
        spawn_delayed_task(delay, move || this.resume())
    }
}

impl Drop for ReconciliationLoop {
    fn drop(&mut self) {
        self.state.get_mut().cancel();
    }
}
