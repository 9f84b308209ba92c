#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::time::Instant;

use relaydeck::core::{
    catalog::{DeviceCatalog, EndpointRecord},
    persistence::ConfigFile,
    settings::{CustomGroup, DashboardSettings, DeviceRef},
    CommandReply, RelayTransport, Session, Timings,
};

pub const WORKSHOP: &str = "192.168.4.1";
pub const PUMPHOUSE: &str = "192.168.4.2";

pub const DEVICES_JSON: &str = r#"[
    {
        "ip": "192.168.4.1",
        "name": "Workshop",
        "wifiName": "relay-net",
        "devices": [
            { "name": "Lamp", "number": 0, "group": "Lights" },
            { "name": "Strip", "number": 1, "group": "Lights" },
            { "name": "Gate", "number": 5, "triggerButton": true }
        ]
    },
    {
        "ip": "192.168.4.2",
        "name": "Pump house",
        "devices": [
            { "name": "Pump", "number": 0, "group": "Water" }
        ]
    }
]"#;

pub fn catalog() -> DeviceCatalog {
    let records: Vec<EndpointRecord> = serde_json::from_str(DEVICES_JSON).unwrap();
    DeviceCatalog::from_records(records).unwrap()
}

pub fn settings() -> DashboardSettings {
    DashboardSettings {
        custom_groups: vec![CustomGroup {
            name: "Night".to_string(),
            devices: vec![
                DeviceRef {
                    ip: WORKSHOP.to_string(),
                    number: 0,
                },
                DeviceRef {
                    ip: PUMPHOUSE.to_string(),
                    number: 0,
                },
            ],
        }],
        ..DashboardSettings::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCommand {
    pub address: String,
    pub command: String,
    pub at: Instant,
}

/// Transport double that records every command and answers from canned data.
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<SentCommand>>,
    states: Mutex<HashMap<String, String>>,
    matrices: Mutex<HashMap<String, String>>,
    broken_commands: Mutex<HashSet<String>>,
    command_status: Mutex<HashMap<String, u16>>,
    reachable: Mutex<HashSet<String>>,
    saved: Mutex<Vec<(ConfigFile, serde_json::Value)>>,
    state_fetches: Mutex<usize>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_states(&self, address: &str, report: &str) {
        self.states
            .lock()
            .insert(address.to_string(), report.to_string());
    }

    pub fn set_matrix(&self, address: &str, report: &str) {
        self.matrices
            .lock()
            .insert(address.to_string(), report.to_string());
    }

    /// Make `command` fail at the transport level.
    pub fn break_command(&self, command: &str) {
        self.broken_commands.lock().insert(command.to_string());
    }

    /// Make `command` answer with an HTTP status.
    pub fn answer_with_status(&self, command: &str, status: u16) {
        self.command_status
            .lock()
            .insert(command.to_string(), status);
    }

    pub fn set_reachable(&self, address: &str) {
        self.reachable.lock().insert(address.to_string());
    }

    pub fn sent(&self) -> Vec<SentCommand> {
        self.sent.lock().clone()
    }

    pub fn sent_commands(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .iter()
            .map(|s| (s.address.clone(), s.command.clone()))
            .collect()
    }

    pub fn saved(&self) -> Vec<(ConfigFile, serde_json::Value)> {
        self.saved.lock().clone()
    }

    pub fn state_fetches(&self) -> usize {
        *self.state_fetches.lock()
    }
}

#[async_trait]
impl RelayTransport for MockTransport {
    async fn send_command(&self, address: &str, command: &str) -> Result<CommandReply> {
        self.sent.lock().push(SentCommand {
            address: address.to_string(),
            command: command.to_string(),
            at: Instant::now(),
        });
        if self.broken_commands.lock().contains(command) {
            bail!("connection refused");
        }
        let status = self
            .command_status
            .lock()
            .get(command)
            .copied()
            .unwrap_or(200);
        Ok(CommandReply {
            status,
            ..CommandReply::ok(format!("ack {command}"))
        })
    }

    async fn fetch_states(&self, address: &str) -> Result<String> {
        *self.state_fetches.lock() += 1;
        match self.states.lock().get(address) {
            Some(report) => Ok(report.clone()),
            None => bail!("no states for {address}"),
        }
    }

    async fn fetch_matrix(&self, address: &str) -> Result<String> {
        match self.matrices.lock().get(address) {
            Some(report) => Ok(report.clone()),
            None => bail!("no matrix for {address}"),
        }
    }

    async fn probe(&self, address: &str) -> Result<()> {
        if self.reachable.lock().contains(address) {
            Ok(())
        } else {
            bail!("timed out")
        }
    }

    async fn save_config(&self, file: ConfigFile, body: serde_json::Value) -> Result<()> {
        self.saved.lock().push((file, body));
        Ok(())
    }
}

pub fn session(transport: Arc<MockTransport>) -> Session {
    Session::new(catalog(), settings(), transport, Timings::default())
}

/// Let spawned tasks run without moving the paused clock far.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
}
