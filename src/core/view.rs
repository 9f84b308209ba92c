//! Dashboard view model
//!
//! Everything the console renders lives here: toggle positions, enabled
//! flags, input lamps, endpoint reachability, the status line and the
//! response pane. Writers report whether they changed anything and the
//! `revision` counter only moves on a real change, so the renderer can skip
//! redundant redraws.

use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};
use strum::Display;
use tokio::time::Instant;

use super::catalog::{DeviceCatalog, IdentityKey};
use crate::protocol::matrix::Matrix;

pub type SharedView = Arc<RwLock<DashboardView>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleView {
    pub on: bool,
    pub enabled: bool,
}

impl Default for ToggleView {
    fn default() -> Self {
        Self {
            on: false,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputView {
    pub on: bool,
    pub flash_until: Option<Instant>,
}

impl InputView {
    pub fn is_flashing(&self, now: Instant) -> bool {
        self.flash_until.is_some_and(|until| now < until)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum EndpointStatus {
    #[default]
    #[strum(to_string = "checking")]
    Checking,
    #[strum(to_string = "connected")]
    Connected,
    #[strum(to_string = "offline")]
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub message: String,
    pub kind: StatusKind,
}

#[derive(Debug, Clone, Default)]
pub struct DashboardView {
    devices: HashMap<IdentityKey, ToggleView>,
    groups: HashMap<IdentityKey, ToggleView>,
    inputs: BTreeMap<(String, u8), InputView>,
    endpoints: BTreeMap<String, EndpointStatus>,
    matrices: BTreeMap<String, Matrix>,
    master: ToggleView,
    status: Option<StatusLine>,
    response: String,
    revision: u64,
}

impl DashboardView {
    /// Build the initial view: every toggle off and enabled, every endpoint
    /// still being checked.
    pub fn for_catalog(catalog: &DeviceCatalog) -> Self {
        let mut view = Self::default();
        for endpoint in catalog.endpoints() {
            view.endpoints
                .insert(endpoint.address.clone(), EndpointStatus::Checking);
            for group in catalog.groups_on(&endpoint.address).keys() {
                view.groups
                    .insert(IdentityKey::group(&endpoint.address, group), ToggleView::default());
            }
        }
        for device in catalog.devices() {
            view.devices.insert(device.key(), ToggleView::default());
        }
        view
    }

    pub fn shared(self) -> SharedView {
        Arc::new(RwLock::new(self))
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump(&mut self) -> bool {
        self.revision += 1;
        true
    }

    /// Record a catalog edit (names, numbers) so the next redraw picks it up.
    pub fn bump_layout(&mut self) {
        self.bump();
    }

    fn toggle_map(&self, key: &IdentityKey) -> &HashMap<IdentityKey, ToggleView> {
        match key {
            IdentityKey::Device { .. } => &self.devices,
            IdentityKey::Group { .. } => &self.groups,
        }
    }

    fn toggle_map_mut(&mut self, key: &IdentityKey) -> &mut HashMap<IdentityKey, ToggleView> {
        match key {
            IdentityKey::Device { .. } => &mut self.devices,
            IdentityKey::Group { .. } => &mut self.groups,
        }
    }

    pub fn toggle(&self, key: &IdentityKey) -> Option<ToggleView> {
        self.toggle_map(key).get(key).copied()
    }

    pub fn is_on(&self, key: &IdentityKey) -> bool {
        self.toggle(key).is_some_and(|t| t.on)
    }

    /// Move a device toggle to `on`. Unknown keys and unchanged values are
    /// left alone and reported as `false`.
    pub fn set_on(&mut self, key: &IdentityKey, on: bool) -> bool {
        match self.toggle_map_mut(key).get_mut(key) {
            Some(toggle) if toggle.on != on => {
                toggle.on = on;
                self.bump()
            }
            _ => false,
        }
    }

    pub fn set_enabled(&mut self, key: &IdentityKey, enabled: bool) -> bool {
        match self.toggle_map_mut(key).get_mut(key) {
            Some(toggle) if toggle.enabled != enabled => {
                toggle.enabled = enabled;
                self.bump()
            }
            _ => false,
        }
    }

    /// Set every group toggle at once (the master toggle drives all groups).
    pub fn set_all_groups(&mut self, on: bool) -> bool {
        let mut changed = false;
        for toggle in self.groups.values_mut() {
            if toggle.on != on {
                toggle.on = on;
                changed = true;
            }
        }
        changed && self.bump()
    }

    pub fn master(&self) -> ToggleView {
        self.master
    }

    pub fn set_master_on(&mut self, on: bool) -> bool {
        if self.master.on == on {
            return false;
        }
        self.master.on = on;
        self.bump()
    }

    pub fn set_master_enabled(&mut self, enabled: bool) -> bool {
        if self.master.enabled == enabled {
            return false;
        }
        self.master.enabled = enabled;
        self.bump()
    }

    /// Carry a device's toggle over to its new number after renumbering.
    pub fn rekey_device(&mut self, address: &str, number: u8, new_number: u8) -> bool {
        if number == new_number {
            return false;
        }
        let Some(toggle) = self.devices.remove(&IdentityKey::device(address, number)) else {
            return false;
        };
        self.devices
            .insert(IdentityKey::device(address, new_number), toggle);
        self.bump()
    }

    pub fn input(&self, address: &str, number: u8) -> Option<InputView> {
        self.inputs.get(&(address.to_string(), number)).copied()
    }

    pub fn inputs_on<'a>(&'a self, address: &'a str) -> impl Iterator<Item = (u8, InputView)> + 'a {
        self.inputs
            .iter()
            .filter(move |((addr, _), _)| addr == address)
            .map(|((_, number), input)| (*number, *input))
    }

    /// Record an observed input value. A transition from a previously
    /// observed value starts a highlight lasting `highlight`; the first
    /// observation never does.
    pub fn observe_input(
        &mut self,
        address: &str,
        number: u8,
        on: bool,
        now: Instant,
        highlight: Duration,
    ) -> bool {
        match self.inputs.get_mut(&(address.to_string(), number)) {
            Some(input) if input.on == on => false,
            Some(input) => {
                input.on = on;
                input.flash_until = Some(now + highlight);
                self.bump()
            }
            None => {
                self.inputs.insert(
                    (address.to_string(), number),
                    InputView {
                        on,
                        flash_until: None,
                    },
                );
                self.bump()
            }
        }
    }

    pub fn endpoint_status(&self, address: &str) -> EndpointStatus {
        self.endpoints.get(address).copied().unwrap_or_default()
    }

    pub fn set_endpoint_status(&mut self, address: &str, status: EndpointStatus) -> bool {
        if self.endpoints.get(address) == Some(&status) {
            return false;
        }
        self.endpoints.insert(address.to_string(), status);
        self.bump()
    }

    pub fn matrix(&self, address: &str) -> Option<&Matrix> {
        self.matrices.get(address)
    }

    pub fn set_matrix(&mut self, address: &str, matrix: Matrix) -> bool {
        if self.matrices.get(address) == Some(&matrix) {
            return false;
        }
        self.matrices.insert(address.to_string(), matrix);
        self.bump()
    }

    pub fn status(&self) -> Option<&StatusLine> {
        self.status.as_ref()
    }

    pub fn set_status(&mut self, message: impl Into<String>, kind: StatusKind) -> bool {
        let line = StatusLine {
            message: message.into(),
            kind,
        };
        if self.status.as_ref() == Some(&line) {
            return false;
        }
        self.status = Some(line);
        self.bump()
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn set_response(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.response == text {
            return false;
        }
        self.response = text;
        self.bump()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::tests::sample_catalog;

    #[test]
    fn test_initial_view_covers_catalog() {
        let view = DashboardView::for_catalog(&sample_catalog());
        assert_eq!(view.revision(), 0);
        let lamp = view.toggle(&IdentityKey::device("192.168.4.1", 0)).unwrap();
        assert!(!lamp.on && lamp.enabled);
        assert!(view.toggle(&IdentityKey::group("192.168.4.2", "Water")).is_some());
        assert_eq!(view.endpoint_status("192.168.4.2"), EndpointStatus::Checking);
    }

    #[test]
    fn test_revision_moves_only_on_change() {
        let mut view = DashboardView::for_catalog(&sample_catalog());
        let lamp = IdentityKey::device("192.168.4.1", 0);

        assert!(view.set_on(&lamp, true));
        assert!(!view.set_on(&lamp, true));
        assert!(!view.set_on(&IdentityKey::device("192.168.4.1", 9), true));
        assert!(view.set_status("Sending command...", StatusKind::Info));
        assert!(!view.set_status("Sending command...", StatusKind::Info));
        assert_eq!(view.revision(), 2);
    }

    #[test]
    fn test_input_highlight_skips_first_observation() {
        let mut view = DashboardView::default();
        let now = Instant::now();
        let highlight = Duration::from_millis(4000);

        view.observe_input("a", 2, true, now, highlight);
        assert!(!view.input("a", 2).unwrap().is_flashing(now));

        assert!(!view.observe_input("a", 2, true, now, highlight));
        view.observe_input("a", 2, false, now, highlight);
        let input = view.input("a", 2).unwrap();
        assert!(input.is_flashing(now + Duration::from_millis(3999)));
        assert!(!input.is_flashing(now + highlight));
    }

    #[test]
    fn test_rekey_keeps_toggle_state() {
        let mut view = DashboardView::for_catalog(&sample_catalog());
        view.set_on(&IdentityKey::device("192.168.4.1", 5), true);
        assert!(view.rekey_device("192.168.4.1", 5, 7));
        assert!(view.is_on(&IdentityKey::device("192.168.4.1", 7)));
        assert!(view.toggle(&IdentityKey::device("192.168.4.1", 5)).is_none());
    }
}
