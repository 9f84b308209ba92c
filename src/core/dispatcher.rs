//! Command dispatcher
//!
//! Every user action goes through the same bracket:
//!
//! 1. mark the affected identities in the suppression tracker
//! 2. disable the control that triggered the action and pause polling
//! 3. send the requests (fan-outs run concurrently)
//! 4. update view and status line, re-enable the control
//! 5. resume polling after the resume delay, release identities after the
//!    suppression window
//!
//! Dispatch methods never fail: transport errors end up in the status line,
//! the response pane and the log. They return whether every request went
//! through so the CLI can pick an exit code.

use anyhow::{ensure, Result};
use futures::future::join_all;
use std::sync::Arc;

use super::{
    catalog::{IdentityKey, SharedCatalog},
    reconciler::ReconciliationLoop,
    settings::CustomGroup,
    suppression::SuppressionTracker,
    timings::Timings,
    transport::{CommandReply, RelayTransport},
    view::{SharedView, StatusKind},
};
use crate::{protocol::codec::encode_command, utils::sleep::sleep_for};

const REACHABILITY_NOTE: &str = "Note: Make sure the device is reachable on your local network.";

/// Control disabled while its action is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Control {
    Toggle(IdentityKey),
    Master,
    None,
}

/// One output a fan-out addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    address: String,
    number: u8,
    name: String,
}

impl Target {
    fn key(&self) -> IdentityKey {
        IdentityKey::device(&self.address, self.number)
    }
}

fn on_off(turn_on: bool) -> &'static str {
    if turn_on {
        "ON"
    } else {
        "OFF"
    }
}

pub struct Dispatcher {
    catalog: SharedCatalog,
    view: SharedView,
    tracker: Arc<SuppressionTracker>,
    transport: Arc<dyn RelayTransport>,
    poll: Arc<ReconciliationLoop>,
    timings: Timings,
}

impl Dispatcher {
    pub fn new(
        catalog: SharedCatalog,
        view: SharedView,
        tracker: Arc<SuppressionTracker>,
        transport: Arc<dyn RelayTransport>,
        poll: Arc<ReconciliationLoop>,
        timings: Timings,
    ) -> Self {
        Self {
            catalog,
            view,
            tracker,
            transport,
            poll,
            timings,
        }
    }

    fn begin(&self, keys: &[IdentityKey], control: &Control, message: &str) {
        self.tracker.mark_active(keys);
        {
            let mut view = self.view.write();
            match control {
                Control::Toggle(key) => {
                    view.set_enabled(key, false);
                }
                Control::Master => {
                    view.set_master_enabled(false);
                }
                Control::None => {}
            }
            view.set_status(message, StatusKind::Info);
        }
        self.poll.pause();
    }

    fn finish(&self, keys: Vec<IdentityKey>, control: &Control) {
        {
            let mut view = self.view.write();
            match control {
                Control::Toggle(key) => {
                    view.set_enabled(key, true);
                }
                Control::Master => {
                    view.set_master_enabled(true);
                }
                Control::None => {}
            }
        }
        self.poll.resume_after(self.timings.resume_delay);
        self.tracker
            .release_after(keys, self.timings.suppression_window);
    }

    fn report_error(&self, status: &str, response: String) {
        let mut view = self.view.write();
        view.set_response(response);
        view.set_status(status, StatusKind::Error);
    }

    fn target(&self, address: &str, number: u8) -> Option<Target> {
        self.catalog.read().device(address, number).map(|d| Target {
            address: d.address.clone(),
            number: d.number,
            name: d.name.clone(),
        })
    }

    async fn send(&self, target: &Target, turn_on: bool) -> Result<CommandReply> {
        self.transport
            .send_command(&target.address, &encode_command(target.number, turn_on))
            .await
    }

    /// Send to every target concurrently. Each successful target's toggle is
    /// moved to `turn_on`; failures are logged and do not affect siblings.
    async fn fan_out(&self, targets: &[Target], turn_on: bool) -> bool {
        let results = join_all(targets.iter().map(|target| async move {
            let reply = self.send(target, turn_on).await?;
            ensure!(reply.is_success(), "HTTP status {}", reply.status);
            Ok::<_, anyhow::Error>(())
        }))
        .await;

        let mut all_ok = true;
        let mut view = self.view.write();
        for (target, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => {
                    view.set_on(&target.key(), turn_on);
                }
                Err(err) => {
                    all_ok = false;
                    log::error!(
                        "Failed to toggle {} on {}: {err:#}",
                        target.name,
                        target.address
                    );
                }
            }
        }
        all_ok
    }

    /// Drive one toggle device on or off.
    pub async fn send_single(&self, address: &str, number: u8, turn_on: bool) -> bool {
        let Some(target) = self.target(address, number) else {
            self.view
                .write()
                .set_status(format!("No device {number} on {address}"), StatusKind::Error);
            return false;
        };
        let key = target.key();
        let control = Control::Toggle(key.clone());

        self.view.write().set_on(&key, turn_on);
        self.begin(&[key.clone()], &control, "Sending command...");

        let ok = match self.send(&target, turn_on).await {
            Ok(reply) if reply.is_success() => {
                let mut view = self.view.write();
                view.set_response(reply.display_body());
                view.set_status(format!("Command sent to {}!", target.name), StatusKind::Success);
                true
            }
            Ok(reply) => {
                self.report_error(
                    &format!("Failed: {}", reply.status),
                    format!("Error: {}", reply.status),
                );
                false
            }
            Err(err) => {
                log::warn!("Command to {} failed: {err:#}", target.address);
                self.report_error(
                    "Connection failed",
                    format!("Error: {err:#}\n\n{REACHABILITY_NOTE}"),
                );
                false
            }
        };

        self.finish(vec![key], &control);
        ok
    }

    /// Drive every device of one group on one endpoint.
    pub async fn send_group(&self, address: &str, group: &str, turn_on: bool) -> bool {
        let targets: Vec<Target> = {
            let catalog = self.catalog.read();
            catalog
                .groups_on(address)
                .get(group)
                .map(|members| {
                    members
                        .iter()
                        .map(|d| Target {
                            address: d.address.clone(),
                            number: d.number,
                            name: d.name.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default()
        };
        if targets.is_empty() {
            self.view
                .write()
                .set_status(format!("No group {group} on {address}"), StatusKind::Error);
            return false;
        }

        let group_key = IdentityKey::group(address, group);
        let control = Control::Toggle(group_key.clone());
        let mut keys: Vec<IdentityKey> = targets.iter().map(Target::key).collect();
        keys.push(group_key.clone());

        self.view.write().set_on(&group_key, turn_on);
        self.begin(&keys, &control, &format!("Toggling {group}..."));

        let ok = self.fan_out(&targets, turn_on).await;
        {
            let mut view = self.view.write();
            view.set_on(&group_key, turn_on);
            view.set_status(format!("{group} {}", on_off(turn_on)), StatusKind::Success);
        }

        self.finish(keys, &control);
        ok
    }

    /// Drive every device of every endpoint.
    pub async fn send_all(&self, turn_on: bool) -> bool {
        let (targets, group_keys): (Vec<Target>, Vec<IdentityKey>) = {
            let catalog = self.catalog.read();
            let targets = catalog
                .devices()
                .iter()
                .map(|d| Target {
                    address: d.address.clone(),
                    number: d.number,
                    name: d.name.clone(),
                })
                .collect();
            let group_keys = catalog
                .endpoints()
                .iter()
                .flat_map(|e| {
                    catalog
                        .groups_on(&e.address)
                        .into_keys()
                        .map(|g| IdentityKey::group(&e.address, &g))
                        .collect::<Vec<_>>()
                })
                .collect();
            (targets, group_keys)
        };

        let mut keys: Vec<IdentityKey> = targets.iter().map(Target::key).collect();
        keys.extend(group_keys);

        self.view.write().set_master_on(turn_on);
        self.begin(&keys, &Control::Master, "Toggling all devices...");

        let ok = self.fan_out(&targets, turn_on).await;
        {
            let mut view = self.view.write();
            view.set_all_groups(turn_on);
            view.set_master_on(turn_on);
            view.set_status(format!("All devices {}", on_off(turn_on)), StatusKind::Success);
        }

        self.finish(keys, &Control::Master);
        ok
    }

    /// Drive the members of a custom group, which may span endpoints.
    /// References to devices missing from the catalog are still sent.
    pub async fn send_custom_group(&self, group: &CustomGroup, turn_on: bool) -> bool {
        let targets: Vec<Target> = group
            .devices
            .iter()
            .map(|r| {
                self.target(&r.ip, r.number).unwrap_or_else(|| Target {
                    address: r.ip.clone(),
                    number: r.number,
                    name: format!("Device {}", r.number),
                })
            })
            .collect();
        let keys: Vec<IdentityKey> = targets.iter().map(Target::key).collect();

        self.begin(&keys, &Control::None, &format!("Toggling {}...", group.name));
        let ok = self.fan_out(&targets, turn_on).await;
        self.view.write().set_status(
            format!("{} {}", group.name, on_off(turn_on)),
            StatusKind::Success,
        );
        self.finish(keys, &Control::None);
        ok
    }

    /// Pulse a momentary output: on, settle, off.
    ///
    /// The off command is only sent after the on command succeeded. A failed
    /// off command is not retried; the error names the relay so the user knows
    /// it may still be asserted.
    pub async fn send_trigger(&self, address: &str, number: u8) -> bool {
        let Some(target) = self.target(address, number) else {
            self.view
                .write()
                .set_status(format!("No device {number} on {address}"), StatusKind::Error);
            return false;
        };
        let key = target.key();
        let control = Control::Toggle(key.clone());
        self.begin(&[key.clone()], &control, "Triggering...");

        let ok = match self.pulse(&target).await {
            Ok(reply) => {
                let mut view = self.view.write();
                view.set_response(reply.display_body());
                view.set_status(format!("{} triggered!", target.name), StatusKind::Success);
                true
            }
            Err(err) => {
                log::error!("Trigger of {} on {} failed: {err:#}", target.name, target.address);
                self.report_error(
                    "Trigger failed",
                    format!("Error: {err:#}\n\n{REACHABILITY_NOTE}"),
                );
                false
            }
        };

        self.finish(vec![key], &control);
        ok
    }

    async fn pulse(&self, target: &Target) -> Result<CommandReply> {
        let on = self.send(target, true).await?;
        ensure!(on.is_success(), "ON command failed: {}", on.status);

        sleep_for(self.timings.trigger_settle).await;

        let asserted = || {
            format!(
                "relay {} on {} may still be asserted",
                target.number, target.address
            )
        };
        let off = match self.send(target, false).await {
            Ok(reply) => reply,
            Err(err) => return Err(err.context(format!("OFF command failed, {}", asserted()))),
        };
        ensure!(
            off.is_success(),
            "OFF command failed: {}, {}",
            off.status,
            asserted()
        );
        Ok(off)
    }
}
