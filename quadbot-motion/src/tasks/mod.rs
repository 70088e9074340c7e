//! Asynchronous tasks of the motion core.
//!
//! - [`motion_task`]: the gait sequencer, driven by incoming commands.
//! - [`motor_task`]: the fixed-rate motor update loop that interpolates leg
//!   positions and feeds the actuator driver.
//!
//! Both are spawned by the firmware and share one [`SharedState`]
//! reference.
//!
//! [`SharedState`]: crate::robot::state::SharedState
pub mod motion_task;
pub mod motor_task;
