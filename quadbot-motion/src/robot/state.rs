//! The shared kinematic state store and its completion handoff.
//!
//! [`MotionState`] holds the per-leg position, target and velocity tables.
//! Two tasks co-own it through [`SharedState`] for the whole process
//! lifetime: the gait sequencer writes targets and velocities, the motor
//! update loop advances the current positions. Every access goes through
//! the single mutex; nothing is read or written outside it.
//!
//! Completion is tracked with a motion epoch: every armed target batch
//! bumps the epoch, the motor loop signals the epoch it finished, and a
//! waiter ignores any signal older than the epoch it armed. A stale signal
//! from a previous motion can therefore never release a new wait.
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use libm::sqrtf;

use super::config::{
    Geometry, EPSILON, SPEED_MULTIPLE, X_DEFAULT, X_OFFSET, Y_START, Y_STEP, Z_BOOT,
};
use super::leg::NB_LEGS;

/// One coordinate of a target request. `Keep` leaves that axis where it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coord {
    Keep,
    At(f32),
}

#[derive(Debug)]
pub struct MotionState {
    pub geom: Geometry,
    /// Real-time foot coordinates, advanced only by the motor loop.
    pub site_now: [[f32; 3]; 4],
    /// Target foot coordinates, written only by the gait sequencer.
    pub site_expect: [[f32; 3]; 4],
    /// Per-axis step taken each motor tick towards the target.
    pub temp_speed: [[f32; 3]; 4],
    /// Speed scale for the next target batch, set by the sequencer.
    pub move_speed: f32,
    motion_epoch: u32,
    completed_epoch: u32,
}

impl MotionState {
    pub fn new(geom: Geometry) -> Self {
        Self {
            geom,
            site_now: [[0.0; 3]; 4],
            site_expect: [[0.0; 3]; 4],
            temp_speed: [[0.0; 3]; 4],
            move_speed: 1.0,
            motion_epoch: 0,
            completed_epoch: 0,
        }
    }

    /// Seeds current and expected positions to the boot stance.
    pub fn init_stance(&mut self) {
        let boot = [
            [X_DEFAULT - X_OFFSET, Y_START + Y_STEP, Z_BOOT],
            [X_DEFAULT - X_OFFSET, Y_START + Y_STEP, Z_BOOT],
            [X_DEFAULT + X_OFFSET, Y_START, Z_BOOT],
            [X_DEFAULT + X_OFFSET, Y_START, Z_BOOT],
        ];
        self.site_expect = boot;
        self.site_now = boot;
        self.temp_speed = [[0.0; 3]; 4];
    }

    /// Updates one leg's expected site and derives the velocity to reach it.
    ///
    /// The velocity is a unit direction scaled by `move_speed *
    /// SPEED_MULTIPLE`, so every move runs at constant speed regardless of
    /// distance. A request whose total displacement is below [`EPSILON`]
    /// gets a zero velocity instead of a division by zero; such requests
    /// are legitimate (holding axes with `Keep` while the rest already
    /// matches).
    pub fn set_target(&mut self, leg: usize, x: Coord, y: Coord, z: Coord) {
        let request = [x, y, z];
        let mut delta = [0.0f32; 3];

        for (axis, coord) in request.iter().enumerate() {
            if let Coord::At(value) = coord {
                delta[axis] = value - self.site_now[leg][axis];
            }
        }

        let length = sqrtf(delta[0] * delta[0] + delta[1] * delta[1] + delta[2] * delta[2]);
        if length < EPSILON {
            self.temp_speed[leg] = [0.0; 3];
        } else {
            let speed_factor = self.move_speed * SPEED_MULTIPLE / length;
            for axis in 0..3 {
                self.temp_speed[leg][axis] = delta[axis] * speed_factor;
            }
        }

        for (axis, coord) in request.iter().enumerate() {
            if let Coord::At(value) = coord {
                self.site_expect[leg][axis] = *value;
            }
        }
    }

    /// Marks the current target tables as a new motion batch and returns
    /// its epoch. Must be called under the same lock acquisition as the
    /// `set_target` calls it covers.
    pub fn arm(&mut self) -> u32 {
        self.motion_epoch += 1;
        self.motion_epoch
    }

    /// True once every axis of every leg has reached its target.
    pub fn all_reached(&self) -> bool {
        for leg in 0..NB_LEGS {
            for axis in 0..3 {
                if (self.site_now[leg][axis] - self.site_expect[leg][axis]).abs() >= EPSILON {
                    return false;
                }
            }
        }
        true
    }

    /// Phase discriminator for the walking and turning gaits: is this leg
    /// at its home Y coordinate? Tolerance-based so interpolation drift
    /// cannot flip the phase.
    pub fn leg_is_home(&self, leg: usize) -> bool {
        (self.site_now[leg][1] - Y_START).abs() < EPSILON
    }

    /// Aborts the motion in place: targets collapse onto the current
    /// positions and all velocities drop to zero. The pending epoch then
    /// completes on the next tick, releasing any waiter.
    pub fn freeze(&mut self) {
        self.site_expect = self.site_now;
        self.temp_speed = [[0.0; 3]; 4];
    }

    /// Reports the epoch to signal, at most once per armed batch.
    pub fn completion(&mut self) -> Option<u32> {
        if self.completed_epoch != self.motion_epoch && self.all_reached() {
            self.completed_epoch = self.motion_epoch;
            Some(self.motion_epoch)
        } else {
            None
        }
    }
}

/// The state store plus the completion signal, passed by reference to both
/// execution contexts at construction.
pub struct SharedState {
    pub state: Mutex<CriticalSectionRawMutex, MotionState>,
    reached: Signal<CriticalSectionRawMutex, u32>,
}

impl SharedState {
    pub fn new(geom: Geometry) -> Self {
        Self {
            state: Mutex::new(MotionState::new(geom)),
            reached: Signal::new(),
        }
    }

    pub fn notify_reached(&self, epoch: u32) {
        self.reached.signal(epoch);
    }

    /// Blocks until the motor loop has completed `epoch` (or a later one).
    /// Leftover signals from earlier motions carry smaller epochs and are
    /// discarded.
    pub async fn wait_reached(&self, epoch: u32) {
        loop {
            let done = self.reached.wait().await;
            if done >= epoch {
                return;
            }
        }
    }
}
