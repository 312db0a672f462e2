//! Control core for a radio-driven rover on no-std embedded platforms.
//!
//! Radio packets land in a shared command slot; a single control loop reads
//! them, gates them on link freshness and ranging, and drives the motors.
//! For a host-side run against simulated hardware, see `rover-app/mock-rover`.
#![cfg_attr(not(test), no_std)]

pub mod utils;
