use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

use super::persistence::{load_or_default, ConfigFile};

/// Icon shown for groups without an entry in `groupSettings.json`.
pub const DEFAULT_GROUP_ICON: &str = "🎨";

/// `inputNames.json`: endpoint address → input number → display name.
pub type InputNames = BTreeMap<String, BTreeMap<u8, String>>;

/// `groupSettings.json`: group key (`<address>:<group>`) → icon.
pub type GroupSettings = BTreeMap<String, String>;

/// Reference to one device by endpoint address and number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRef {
    pub ip: String,
    pub number: u8,
}

/// User-defined set of devices that may span endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomGroup {
    pub name: String,
    #[serde(default)]
    pub devices: Vec<DeviceRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRef {
    pub ip: String,
    pub group_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

/// `bookmarks.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmarks {
    #[serde(default)]
    pub devices: Vec<DeviceRef>,
    #[serde(default)]
    pub groups: Vec<GroupRef>,
    #[serde(default)]
    pub custom_groups: Vec<NamedRef>,
}

impl Bookmarks {
    pub fn has_device(&self, ip: &str, number: u8) -> bool {
        self.devices.iter().any(|d| d.ip == ip && d.number == number)
    }

    pub fn has_group(&self, ip: &str, group: &str) -> bool {
        self.groups.iter().any(|g| g.ip == ip && g.group_name == group)
    }
}

/// The optional configuration files, loaded together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardSettings {
    pub input_names: InputNames,
    pub group_settings: GroupSettings,
    pub bookmarks: Bookmarks,
    pub custom_groups: Vec<CustomGroup>,
}

impl DashboardSettings {
    /// Missing or broken files fall back to empty values.
    pub fn load(data_dir: &Path) -> Self {
        Self {
            input_names: load_or_default(data_dir, ConfigFile::InputNames),
            group_settings: load_or_default(data_dir, ConfigFile::GroupSettings),
            bookmarks: load_or_default(data_dir, ConfigFile::Bookmarks),
            custom_groups: load_or_default(data_dir, ConfigFile::CustomGroups),
        }
    }

    pub fn custom_group(&self, name: &str) -> Option<&CustomGroup> {
        self.custom_groups.iter().find(|g| g.name == name)
    }

    /// Assign a display name to an input. A blank name, or the default
    /// `Input N`, removes the entry.
    ///
    /// # Returns
    /// `true` when the stored names changed.
    pub fn set_input_name(&mut self, address: &str, number: u8, name: &str) -> bool {
        let name = name.trim();
        let names = self.input_names.entry(address.to_string()).or_default();
        if name.is_empty() || name == format!("Input {number}") {
            return names.remove(&number).is_some();
        }
        names.insert(number, name.to_string()).as_deref() != Some(name)
    }

    /// Set the icon of a group; an empty icon removes the entry.
    pub fn set_group_icon(&mut self, group_key: &str, icon: &str) -> bool {
        let icon = icon.trim();
        if icon.is_empty() {
            return self.group_settings.remove(group_key).is_some();
        }
        self.group_settings
            .insert(group_key.to_string(), icon.to_string())
            .as_deref()
            != Some(icon)
    }
}

/// Display name of an input, `Input N` when none was assigned.
pub fn input_display_name(names: &InputNames, address: &str, number: u8) -> String {
    names
        .get(address)
        .and_then(|m| m.get(&number))
        .cloned()
        .unwrap_or_else(|| format!("Input {number}"))
}

pub fn group_icon<'a>(settings: &'a GroupSettings, group_key: &str) -> &'a str {
    settings
        .get(group_key)
        .map(String::as_str)
        .unwrap_or(DEFAULT_GROUP_ICON)
}
