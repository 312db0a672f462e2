//! Module Exports
//!
//! Radio link to the remote controller.
//!
//! # Modules
//! - `packets`: fixed-layout command and telemetry records.
//! - `channel`: the shared command slot, its receive handle, and the
//!   control-loop side that sends telemetry.

pub mod channel;
pub mod packets;

pub use channel::{CommandChannel, CommandReceiver, CommandSlot, LinkSnapshot, RadioTransport, SendError};
pub use packets::{Command, PeerAddress, Telemetry};
