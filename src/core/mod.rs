/// Core business logic for relaydeck
///
/// This package contains UI-independent logic:
/// - Device catalog and configuration persistence
/// - Suppression tracking, state reconciliation and connectivity probing
/// - Command dispatch through the proxy transport
/// - The session context, intents and the text renderer
/// - Message bus between the console reader and the session task
///
/// The console front-end and the CLI subcommands share everything here.
pub mod bus;
pub mod catalog;
pub mod connectivity;
pub mod dispatcher;
pub mod intent;
pub mod persistence;
pub mod reconciler;
pub mod render;
pub mod session;
pub mod settings;
pub mod suppression;
pub mod task_manager;
pub mod timings;
pub mod transport;
pub mod view;

// Re-export commonly used types
pub use bus::{Bus, UiToCore};
pub use catalog::{DeviceCatalog, IdentityKey};
pub use intent::{parse_intent, Intent};
pub use session::Session;
pub use timings::Timings;
pub use transport::{CommandReply, HttpProxyTransport, RelayTransport};
