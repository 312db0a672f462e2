//! Safety policy.
//!
//! - `freshness`: link liveness from the last command arrival.
//! - `drive`: joystick command to drive action, with fail-safe and deadzone.

pub mod drive;
pub mod freshness;

pub use drive::{DriveAction, DrivePolicy, SpeedMode};
pub use freshness::is_alive;
