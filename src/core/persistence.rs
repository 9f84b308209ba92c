//! Configuration persistence module
//!
//! The dashboard keeps its configuration in a handful of JSON files inside one
//! data directory (the same directory the proxy server serves static files
//! from). Files are written pretty-printed with 4-space indentation so they
//! stay pleasant to edit by hand.
//!
//! Optional files that are missing or unreadable load as empty values; only
//! `devices.json` is required to bring a session up.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use strum::Display;

use super::catalog::{DeviceCatalog, EndpointRecord};

/// The configuration files the dashboard reads and the server writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ConfigFile {
    #[strum(to_string = "devices")]
    Devices,
    #[strum(to_string = "input names")]
    InputNames,
    #[strum(to_string = "group settings")]
    GroupSettings,
    #[strum(to_string = "bookmarks")]
    Bookmarks,
    #[strum(to_string = "custom groups")]
    CustomGroups,
}

impl ConfigFile {
    pub const ALL: [ConfigFile; 5] = [
        ConfigFile::Devices,
        ConfigFile::InputNames,
        ConfigFile::GroupSettings,
        ConfigFile::Bookmarks,
        ConfigFile::CustomGroups,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            ConfigFile::Devices => "devices.json",
            ConfigFile::InputNames => "inputNames.json",
            ConfigFile::GroupSettings => "groupSettings.json",
            ConfigFile::Bookmarks => "bookmarks.json",
            ConfigFile::CustomGroups => "customGroups.json",
        }
    }

    /// Proxy server route that persists this file.
    pub fn save_route(self) -> &'static str {
        match self {
            ConfigFile::Devices => "/save-devices",
            ConfigFile::InputNames => "/save-input-names",
            ConfigFile::GroupSettings => "/save-group-settings",
            ConfigFile::Bookmarks => "/save-bookmarks",
            ConfigFile::CustomGroups => "/save-custom-groups",
        }
    }
}

pub fn config_path(data_dir: &Path, file: ConfigFile) -> PathBuf {
    data_dir.join(file.file_name())
}

/// Read and parse one configuration file.
///
/// # Returns
/// - `Ok(None)` if the file does not exist
/// - `Err` if it exists but cannot be read or parsed
pub fn load_config<T: DeserializeOwned>(data_dir: &Path, file: ConfigFile) -> Result<Option<T>> {
    let path = config_path(data_dir, file);
    if !path.exists() {
        log::debug!("📂 No {file} file at {path:?}");
        return Ok(None);
    }

    let json =
        fs::read_to_string(&path).with_context(|| format!("Failed to read {file} from {path:?}"))?;
    let value = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse {file} from {path:?}"))?;
    log::info!("📂 Loaded {file} from {path:?}");
    Ok(Some(value))
}

/// Like [`load_config`] but falls back to the default value on any problem.
pub fn load_or_default<T: DeserializeOwned + Default>(data_dir: &Path, file: ConfigFile) -> T {
    match load_config(data_dir, file) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(err) => {
            log::warn!("Error loading {file}: {err:#}");
            T::default()
        }
    }
}

pub fn load_catalog(data_dir: &Path) -> Result<DeviceCatalog> {
    let records: Vec<EndpointRecord> = load_config(data_dir, ConfigFile::Devices)?
        .with_context(|| {
            format!(
                "No {} found in {data_dir:?}",
                ConfigFile::Devices.file_name()
            )
        })?;
    DeviceCatalog::from_records(records)
}

/// Serialise with 4-space indentation.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .context("Failed to serialize configuration")?;
    String::from_utf8(buf).context("Serialized configuration is not UTF-8")
}

pub fn save_config<T: Serialize + ?Sized>(
    data_dir: &Path,
    file: ConfigFile,
    value: &T,
) -> Result<()> {
    let path = config_path(data_dir, file);
    let json = to_pretty_json(value)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {file} to {path:?}"))?;
    log::debug!("💾 Saved {file} to {path:?}");
    Ok(())
}
