//! Kinematics algorithms and gait sequencing.
//!
//! - [`conversion`] maps between leg-local Cartesian coordinates, polar
//!   joint angles and servo angles.
//! - [`gait_engine`] sequences coordinated leg movements on top of the
//!   shared state store.
pub mod conversion;
pub mod gait_engine;
