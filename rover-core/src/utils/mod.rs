//! Utility re-exports and helper macros for the rover.
//!
//! - `config`: tunables for the policy, freshness window and telemetry cadence
//! - `connection`: wire records and the radio command channel
//! - `controllers`: ranging engine, motor actuator and the control loop
//! - `policy`: link freshness and the drive decision
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod config;
pub mod connection;
pub mod controllers;
pub mod policy;

pub use config::RoverConfig;
pub use connection::{CommandChannel, CommandReceiver, CommandSlot};
pub use controllers::RoverController;
pub use embassy_time::{Duration, Instant};
#[doc(hidden)]
pub use static_cell;

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// Used for objects the radio context and the control loop must both see for
/// the whole program, such as the `CommandSlot`. Returns a mutable
/// reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static CELL: $crate::utils::static_cell::StaticCell<$t> =
            $crate::utils::static_cell::StaticCell::new();
        CELL.uninit().write($val)
    }};
}
