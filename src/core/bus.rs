use anyhow::Result;
use flume::{Receiver, Sender};

use super::intent::{parse_intent, Intent};

/// Messages sent from the console reader thread to the session task.
#[derive(Debug, Clone, PartialEq)]
pub enum UiToCore {
    /// Carry out a user action.
    Intent(Intent),
    /// Redraw the dashboard even if nothing changed.
    Refresh,
    /// Print the command list.
    Help,
    /// Graceful shutdown request.
    Quit,
}

/// Simple holder for both ends of the console channel.
#[derive(Debug, Clone)]
pub struct Bus {
    pub ui_tx: Sender<UiToCore>,
    pub core_rx: Receiver<UiToCore>,
}

impl Bus {
    pub fn new() -> Self {
        let (ui_tx, core_rx) = flume::unbounded();
        Self { ui_tx, core_rx }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate one console line. Blank lines are ignored.
pub fn console_message(line: &str) -> Result<Option<UiToCore>> {
    let message = match line.trim().to_lowercase().as_str() {
        "" => return Ok(None),
        "show" | "refresh" => UiToCore::Refresh,
        "help" | "?" => UiToCore::Help,
        "quit" | "exit" | "q" => UiToCore::Quit,
        _ => UiToCore::Intent(parse_intent(line)?),
    };
    Ok(Some(message))
}
