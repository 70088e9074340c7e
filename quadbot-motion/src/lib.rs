//! Portable motion core for the quadbot walking robot.
//!
//! Re-exports the main modules: [`kinematics`], [`robot`], and [`tasks`].
//! Everything in here is hardware-free so the kinematics and gait logic can
//! be exercised on the host; the firmware binary wires the tasks to the
//! board peripherals.
#![cfg_attr(not(test), no_std)]

pub mod kinematics;
pub mod robot;
pub mod tasks;

pub const GAIT_CMD_CHANNEL_SIZE: usize = 5;
pub const SERVO_CMD_CHANNEL_SIZE: usize = 4;
