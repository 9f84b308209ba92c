//! relaydeck: local dashboard and same-origin proxy for HTTP relay boards
//!
//! The core of the crate keeps a live view of every configured board in sync
//! with the hardware: a reconciliation loop polls the boards' states reports,
//! a dispatcher sends user commands, and a suppression tracker keeps polled
//! state from fighting freshly issued commands. The proxy server forwards
//! requests to the boards and persists the JSON configuration files.
//!
//! The internal boot helpers are placed in a separate, hidden module to keep
//! implementation details out of the generated documentation.

#[doc(hidden)]
pub mod boot;
#[doc(hidden)]
pub mod cli;
pub mod core;
pub mod protocol;
pub mod server;
#[doc(hidden)]
pub mod utils;
