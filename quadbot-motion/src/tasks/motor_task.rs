//! The fixed-rate motor update loop.
//!
//! Every tick advances each leg towards its target by one velocity step,
//! converts the new position through the IK solver and emits the leg's
//! servo frame right away, so actuator latency is bounded by one leg's
//! processing and not a whole tick. When every axis has reached its target
//! the pending motion epoch is signalled, exactly once.
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Duration, Ticker};
use log::{debug, error, warn};

use crate::kinematics::conversion::{cartesian_to_polar, polar_to_servo};
use crate::robot::commands::ServoCommand;
use crate::robot::config::UPDATE_PERIOD_MS;
use crate::robot::leg::{Leg, NB_LEGS};
use crate::robot::state::{MotionState, SharedState};
use crate::SERVO_CMD_CHANNEL_SIZE;

/// Runs one update tick over the whole state. Returns the motion epoch to
/// signal if this tick completed it.
///
/// An unreachable interpolated position is fatal to the motion: the error
/// is logged, the remaining targets collapse onto the current positions and
/// no further angles are emitted this tick. The frozen state then counts as
/// reached, so the sequencer is released into a stance it can re-derive
/// phase from.
pub fn run_motor_tick(st: &mut MotionState, mut emit: impl FnMut(ServoCommand)) -> Option<u32> {
    for leg in 0..NB_LEGS {
        for axis in 0..3 {
            let now = st.site_now[leg][axis];
            let target = st.site_expect[leg][axis];
            let step = st.temp_speed[leg][axis];

            if (target - now).abs() < step.abs() {
                // a full step would overshoot, land on the target
                st.site_now[leg][axis] = target;
            } else {
                st.site_now[leg][axis] = now + step;
            }
        }

        let [x, y, z] = st.site_now[leg];
        match cartesian_to_polar(x, y, z) {
            Ok((alpha, beta, gamma)) => {
                let leg = Leg::from(leg);
                emit(ServoCommand {
                    leg,
                    angles: polar_to_servo(leg, alpha, beta, gamma),
                });
            }
            Err(e) => {
                error!("[MOTOR_TASK] leg {leg}: {e}, aborting motion");
                st.freeze();
                break;
            }
        }
    }
    st.completion()
}

#[embassy_executor::task]
pub async fn motor_task(
    shared: &'static SharedState,
    servo_sender: Sender<'static, CriticalSectionRawMutex, ServoCommand, SERVO_CMD_CHANNEL_SIZE>,
) {
    let mut ticker = Ticker::every(Duration::from_millis(UPDATE_PERIOD_MS));

    loop {
        // Never block on the state store: a missed acquisition only costs
        // one tick of staleness and is worth logging.
        let completed = match shared.state.try_lock() {
            Ok(mut st) => run_motor_tick(&mut st, |cmd| {
                if servo_sender.try_send(cmd).is_err() {
                    debug!("[MOTOR_TASK] servo queue full, frame dropped");
                }
            }),
            Err(_) => {
                warn!("[MOTOR_TASK] state store busy, skipping tick");
                ticker.next().await;
                continue;
            }
        };

        if let Some(epoch) = completed {
            shared.notify_reached(epoch);
        }
        ticker.next().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::config::{Geometry, LEG_MOVE_SPEED, STAND_SEAT_SPEED, Z_DEFAULT};
    use crate::robot::state::Coord::{At, Keep};

    fn state_at_boot() -> MotionState {
        let mut st = MotionState::new(Geometry::new());
        st.init_stance();
        st
    }

    #[test]
    fn emits_one_frame_per_leg_in_range() {
        let mut st = state_at_boot();
        st.move_speed = STAND_SEAT_SPEED;
        for leg in 0..NB_LEGS {
            st.set_target(leg, Keep, Keep, At(Z_DEFAULT));
        }
        st.arm();

        let mut frames = Vec::new();
        run_motor_tick(&mut st, |cmd| frames.push(cmd));

        assert_eq!(frames.len(), NB_LEGS);
        for (idx, frame) in frames.iter().enumerate() {
            assert_eq!(frame.leg, Leg::from(idx));
            for angle in frame.angles {
                assert!((0.0..=180.0).contains(&angle), "angle {angle} out of range");
            }
        }
    }

    #[test]
    fn completes_exactly_once() {
        let mut st = state_at_boot();
        st.move_speed = STAND_SEAT_SPEED;
        for leg in 0..NB_LEGS {
            st.set_target(leg, Keep, Keep, At(Z_DEFAULT));
        }
        let epoch = st.arm();

        let mut completions = Vec::new();
        for _ in 0..40 {
            if let Some(e) = run_motor_tick(&mut st, |_| {}) {
                completions.push(e);
            }
        }
        assert_eq!(completions, [epoch]);
        assert!(st.all_reached());
    }

    #[test]
    fn never_overshoots_the_target() {
        let mut st = state_at_boot();
        st.move_speed = LEG_MOVE_SPEED;
        let start = st.site_now[0][2];
        st.set_target(0, Keep, Keep, At(Z_DEFAULT));

        for _ in 0..40 {
            run_motor_tick(&mut st, |_| {});
            let z = st.site_now[0][2];
            assert!(z <= start + 1e-4 && z >= Z_DEFAULT - 1e-4);
        }
        assert!((st.site_now[0][2] - Z_DEFAULT).abs() < 1e-4);
    }

    #[test]
    fn unreachable_interpolation_freezes_the_motion() {
        let mut st = state_at_boot();
        st.move_speed = LEG_MOVE_SPEED;
        // way beyond the leg's annulus; the interpolated position leaves
        // the reachable region long before arriving
        st.set_target(0, At(300.0), Keep, Keep);
        let epoch = st.arm();

        let mut completed = None;
        for _ in 0..200 {
            if let Some(e) = run_motor_tick(&mut st, |_| {}) {
                completed = Some(e);
                break;
            }
        }

        assert_eq!(completed, Some(epoch));
        assert!(st.all_reached());
        assert!(st.site_now[0][0] < 300.0, "motion should stop short");
        assert_eq!(st.temp_speed[0], [0.0; 3]);
    }
}
