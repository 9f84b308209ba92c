//! Device catalog
//!
//! The catalog is loaded from `devices.json`, which groups devices under the
//! relay controller (endpoint) they are wired to. It is the single source of
//! truth for identity and naming; live state never flows back into it.

use anyhow::{bail, ensure, Result};
use derive_more::Display;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};
use strum::Display as StrumDisplay;

/// Highest output number a relay controller exposes.
pub const MAX_DEVICE_NUMBER: u8 = 23;
/// Highest input number a relay controller exposes.
pub const MAX_INPUT_NUMBER: u8 = 23;

pub type SharedCatalog = Arc<RwLock<DeviceCatalog>>;
/// Group assigned to devices without one.
pub const DEFAULT_GROUP: &str = "Other";

/// Identity of something the dispatcher can act on.
///
/// Renders as `<address>:<number>` or `<address>:<group>`, the same keys
/// `groupSettings.json` uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum IdentityKey {
    #[display("{address}:{number}")]
    Device { address: String, number: u8 },
    #[display("{address}:{group}")]
    Group { address: String, group: String },
}

impl IdentityKey {
    pub fn device(address: &str, number: u8) -> Self {
        IdentityKey::Device {
            address: address.to_string(),
            number,
        }
    }

    pub fn group(address: &str, group: &str) -> Self {
        IdentityKey::Group {
            address: address.to_string(),
            group: group.to_string(),
        }
    }
}

/// One endpoint entry of `devices.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointRecord {
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_name: Option<String>,
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
    /// Fields this crate does not interpret, written back untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One device entry of `devices.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub name: String,
    pub number: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub trigger_button: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum DeviceKind {
    /// Latching output driven on/off by a switch.
    Toggle,
    /// Momentary output pulsed on then off.
    Trigger,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub address: String,
    /// Display name, falls back to the address.
    pub name: String,
    /// Network the endpoint is expected to be reachable on (informational).
    pub network: Option<String>,
    raw_name: Option<String>,
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub address: String,
    pub number: u8,
    pub name: String,
    pub group: String,
    pub endpoint_name: String,
    pub kind: DeviceKind,
    raw_group: Option<String>,
    extra: serde_json::Map<String, serde_json::Value>,
}

impl Device {
    pub fn key(&self) -> IdentityKey {
        IdentityKey::device(&self.address, self.number)
    }

    pub fn group_key(&self) -> IdentityKey {
        IdentityKey::group(&self.address, &self.group)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceCatalog {
    endpoints: Vec<Endpoint>,
    devices: Vec<Device>,
}

impl DeviceCatalog {
    /// Flatten `devices.json` records, rejecting out-of-range or duplicate numbers.
    pub fn from_records(records: Vec<EndpointRecord>) -> Result<Self> {
        let mut endpoints = Vec::with_capacity(records.len());
        let mut devices = Vec::new();
        let mut seen = HashSet::new();

        for record in records {
            let endpoint_name = record
                .name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| record.ip.clone());

            for device in record.devices {
                ensure!(
                    device.number <= MAX_DEVICE_NUMBER,
                    "Device \"{}\" on {} has number {} (must be between 0 and {MAX_DEVICE_NUMBER})",
                    device.name,
                    record.ip,
                    device.number
                );
                if !seen.insert((record.ip.clone(), device.number)) {
                    bail!(
                        "Device number {} is used twice on {}",
                        device.number,
                        record.ip
                    );
                }
                devices.push(Device {
                    address: record.ip.clone(),
                    number: device.number,
                    name: device.name,
                    group: device
                        .group
                        .clone()
                        .filter(|g| !g.is_empty())
                        .unwrap_or_else(|| DEFAULT_GROUP.to_string()),
                    endpoint_name: endpoint_name.clone(),
                    kind: if device.trigger_button {
                        DeviceKind::Trigger
                    } else {
                        DeviceKind::Toggle
                    },
                    raw_group: device.group,
                    extra: device.extra,
                });
            }

            endpoints.push(Endpoint {
                address: record.ip,
                name: endpoint_name,
                network: record.wifi_name,
                raw_name: record.name,
                extra: record.extra,
            });
        }

        Ok(Self { endpoints, devices })
    }

    /// Rebuild the `devices.json` structure, edits included.
    pub fn to_records(&self) -> Vec<EndpointRecord> {
        self.endpoints
            .iter()
            .map(|endpoint| EndpointRecord {
                ip: endpoint.address.clone(),
                name: endpoint.raw_name.clone(),
                wifi_name: endpoint.network.clone(),
                devices: self
                    .devices_on(&endpoint.address)
                    .map(|device| DeviceRecord {
                        name: device.name.clone(),
                        number: device.number,
                        group: device.raw_group.clone(),
                        trigger_button: device.kind == DeviceKind::Trigger,
                        extra: device.extra.clone(),
                    })
                    .collect(),
                extra: endpoint.extra.clone(),
            })
            .collect()
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn endpoint(&self, address: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.address == address)
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn devices_on<'a>(&'a self, address: &'a str) -> impl Iterator<Item = &'a Device> + 'a {
        self.devices.iter().filter(move |d| d.address == address)
    }

    pub fn device(&self, address: &str, number: u8) -> Option<&Device> {
        self.devices
            .iter()
            .find(|d| d.address == address && d.number == number)
    }

    /// Groups of one endpoint, sorted by name.
    pub fn groups_on(&self, address: &str) -> BTreeMap<String, Vec<&Device>> {
        let mut groups: BTreeMap<String, Vec<&Device>> = BTreeMap::new();
        for device in self.devices.iter().filter(|d| d.address == address) {
            groups.entry(device.group.clone()).or_default().push(device);
        }
        groups
    }

    /// Reassign a device number after checking range and uniqueness.
    pub fn renumber(&mut self, address: &str, number: u8, new_number: u8) -> Result<()> {
        ensure!(
            new_number <= MAX_DEVICE_NUMBER,
            "Device number must be between 0 and {MAX_DEVICE_NUMBER}"
        );
        if new_number == number {
            return Ok(());
        }
        if let Some(conflict) = self.device(address, new_number) {
            bail!(
                "Number {new_number} is already assigned to \"{}\"",
                conflict.name
            );
        }
        let Some(device) = self
            .devices
            .iter_mut()
            .find(|d| d.address == address && d.number == number)
        else {
            bail!("No device {number} on {address}");
        };
        device.number = new_number;
        Ok(())
    }

    pub fn rename(&mut self, address: &str, number: u8, name: &str) -> Result<()> {
        let name = name.trim();
        ensure!(!name.is_empty(), "Device name cannot be empty");
        let Some(device) = self
            .devices
            .iter_mut()
            .find(|d| d.address == address && d.number == number)
        else {
            bail!("No device {number} on {address}");
        };
        device.name = name.to_string();
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE_DEVICES: &str = r#"[
        {
            "ip": "192.168.4.1",
            "name": "Workshop",
            "wifiName": "relay-net",
            "devices": [
                { "name": "Lamp", "number": 0, "group": "Lights" },
                { "name": "Strip", "number": 1, "group": "Lights" },
                { "name": "Gate", "number": 5, "triggerButton": true, "note": "north" }
            ]
        },
        {
            "ip": "192.168.4.2",
            "devices": [
                { "name": "Pump", "number": 0, "group": "Water" }
            ]
        }
    ]"#;

    pub(crate) fn sample_catalog() -> DeviceCatalog {
        let records: Vec<EndpointRecord> =
            serde_json::from_str(SAMPLE_DEVICES).expect("sample parses");
        DeviceCatalog::from_records(records).expect("sample is valid")
    }

    #[test]
    fn test_flatten_records() {
        let catalog = sample_catalog();
        assert_eq!(catalog.endpoints().len(), 2);
        assert_eq!(catalog.devices().len(), 4);

        let gate = catalog.device("192.168.4.1", 5).unwrap();
        assert_eq!(gate.kind, DeviceKind::Trigger);
        assert_eq!(gate.group, DEFAULT_GROUP);
        assert_eq!(gate.endpoint_name, "Workshop");

        // Unnamed endpoints are shown by address.
        assert_eq!(catalog.endpoint("192.168.4.2").unwrap().name, "192.168.4.2");

        let groups = catalog.groups_on("192.168.4.1");
        assert_eq!(
            groups.keys().cloned().collect::<Vec<_>>(),
            vec!["Lights".to_string(), "Other".to_string()]
        );
        assert_eq!(groups["Lights"].len(), 2);
    }

    #[test]
    fn test_groups_outlive_address_argument() {
        let catalog = sample_catalog();
        let groups = {
            let address = format!("192.168.4.{}", 2);
            catalog.groups_on(&address)
        };
        assert_eq!(groups["Water"][0].name, "Pump");
        assert!(catalog.groups_on("10.9.9.9").is_empty());
    }

    #[test]
    fn test_identity_keys_render_like_settings_keys() {
        assert_eq!(IdentityKey::device("10.0.0.7", 3).to_string(), "10.0.0.7:3");
        assert_eq!(
            IdentityKey::group("10.0.0.7", "Lights").to_string(),
            "10.0.0.7:Lights"
        );
        assert_ne!(IdentityKey::device("a", 3), IdentityKey::group("a", "3"));
    }

    #[test]
    fn test_duplicate_numbers_rejected_on_load() {
        let records: Vec<EndpointRecord> = serde_json::from_str(
            r#"[{ "ip": "a", "devices": [
                { "name": "x", "number": 2 }, { "name": "y", "number": 2 }
            ]}]"#,
        )
        .unwrap();
        assert!(DeviceCatalog::from_records(records).is_err());
    }

    #[test]
    fn test_renumber_rejects_conflict_and_range() {
        let mut catalog = sample_catalog();

        let err = catalog.renumber("192.168.4.1", 0, 1).unwrap_err();
        assert_eq!(err.to_string(), "Number 1 is already assigned to \"Strip\"");
        assert!(catalog.device("192.168.4.1", 0).is_some());

        let err = catalog.renumber("192.168.4.1", 0, 24).unwrap_err();
        assert_eq!(err.to_string(), "Device number must be between 0 and 23");

        // Same number on another endpoint is fine.
        catalog.renumber("192.168.4.2", 0, 1).unwrap();
        assert_eq!(catalog.device("192.168.4.2", 1).unwrap().name, "Pump");
    }

    #[test]
    fn test_records_round_trip_keeps_unknown_fields() {
        let mut catalog = sample_catalog();
        catalog.rename("192.168.4.1", 0, "  Desk lamp ").unwrap();
        catalog.renumber("192.168.4.1", 5, 7).unwrap();

        let value = serde_json::to_value(catalog.to_records()).unwrap();
        let first = &value[0];
        assert_eq!(first["wifiName"], "relay-net");
        assert_eq!(first["devices"][0]["name"], "Desk lamp");
        assert_eq!(first["devices"][2]["number"], 7);
        assert_eq!(first["devices"][2]["note"], "north");
        assert_eq!(first["devices"][2]["triggerButton"], true);
        assert!(first["devices"][2].get("group").is_none());
        assert!(value[1].get("name").is_none());
    }
}
