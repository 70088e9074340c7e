//! Gait sequencing over the shared state store.
//!
//! Every behavior is an ordered sequence of target batches. A batch locks
//! the store, optionally adjusts `move_speed`, writes per-leg targets, arms
//! a new motion epoch under that same lock, then awaits the motor loop's
//! completion signal for that epoch before the next batch.
//!
//! There is no stored phase variable: each walking or turning iteration
//! re-derives its phase from the current leg positions, so a behavior can
//! be restarted safely from whatever stance a previous one left behind.
use crate::robot::commands::GaitCommand;
use crate::robot::config::{
    BODY_MOVE_SPEED, LEG_MOVE_SPEED, SPOT_TURN_SPEED, STAND_SEAT_SPEED, X_DEFAULT, X_OFFSET,
    Y_START, Y_STEP, Z_BOOT, Z_DEFAULT, Z_UP,
};
use crate::robot::leg::NB_LEGS;
use crate::robot::state::{
    Coord::{At, Keep},
    MotionState, SharedState,
};

pub struct GaitEngine<'a> {
    shared: &'a SharedState,
}

impl<'a> GaitEngine<'a> {
    pub fn new(shared: &'a SharedState) -> Self {
        Self { shared }
    }

    pub async fn run(&self, cmd: GaitCommand) {
        match cmd {
            GaitCommand::Sit => self.sit().await,
            GaitCommand::Stand => self.stand().await,
            GaitCommand::StepForward(times) => self.step_forward(times).await,
            GaitCommand::StepBack(times) => self.step_back(times).await,
            GaitCommand::TurnLeft(times) => self.turn_left(times).await,
            GaitCommand::TurnRight(times) => self.turn_right(times).await,
            GaitCommand::HandWave(times) => self.hand_wave(times).await,
            GaitCommand::HandShake(times) => self.hand_shake(times).await,
        }
    }

    async fn with_state<R>(&self, f: impl FnOnce(&mut MotionState) -> R) -> R {
        let mut st = self.shared.state.lock().await;
        f(&mut st)
    }

    /// Runs one target batch: everything in `f` happens under a single lock
    /// acquisition together with arming the epoch, then the batch's
    /// completion is awaited.
    async fn move_and_wait(&self, f: impl FnOnce(&mut MotionState)) {
        let epoch = {
            let mut st = self.shared.state.lock().await;
            f(&mut st);
            st.arm()
        };
        self.shared.wait_reached(epoch).await;
    }

    pub async fn sit(&self) {
        self.move_and_wait(|st| {
            st.move_speed = STAND_SEAT_SPEED;
            for leg in 0..NB_LEGS {
                st.set_target(leg, Keep, Keep, At(Z_BOOT));
            }
        })
        .await;
    }

    pub async fn stand(&self) {
        self.move_and_wait(|st| {
            st.move_speed = STAND_SEAT_SPEED;
            for leg in 0..NB_LEGS {
                st.set_target(leg, Keep, Keep, At(Z_DEFAULT));
            }
        })
        .await;
    }

    pub async fn step_forward(&self, times: u8) {
        for _ in 0..times {
            if self.with_state(|st| st.leg_is_home(2)).await {
                // leg 2 swings first: lift, reach forward, place
                self.move_and_wait(|st| {
                    st.move_speed = LEG_MOVE_SPEED;
                    st.set_target(2, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(2, At(X_DEFAULT + X_OFFSET), At(Y_START + 2.0 * Y_STEP), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(
                        2,
                        At(X_DEFAULT + X_OFFSET),
                        At(Y_START + 2.0 * Y_STEP),
                        At(Z_DEFAULT),
                    );
                })
                .await;

                // shift the body over the new support polygon
                self.move_and_wait(|st| {
                    st.move_speed = BODY_MOVE_SPEED;
                    st.set_target(0, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_DEFAULT));
                    st.set_target(
                        1,
                        At(X_DEFAULT + X_OFFSET),
                        At(Y_START + 2.0 * Y_STEP),
                        At(Z_DEFAULT),
                    );
                    st.set_target(
                        2,
                        At(X_DEFAULT - X_OFFSET),
                        At(Y_START + Y_STEP),
                        At(Z_DEFAULT),
                    );
                    st.set_target(
                        3,
                        At(X_DEFAULT - X_OFFSET),
                        At(Y_START + Y_STEP),
                        At(Z_DEFAULT),
                    );
                })
                .await;

                // diagonal partner leg 1 swings back home
                self.move_and_wait(|st| {
                    st.move_speed = LEG_MOVE_SPEED;
                    st.set_target(1, At(X_DEFAULT + X_OFFSET), At(Y_START + 2.0 * Y_STEP), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(1, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(1, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_DEFAULT));
                })
                .await;
            } else {
                // mirrored phase: leg 0 swings, then leg 3
                self.move_and_wait(|st| {
                    st.move_speed = LEG_MOVE_SPEED;
                    st.set_target(0, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(0, At(X_DEFAULT + X_OFFSET), At(Y_START + 2.0 * Y_STEP), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(
                        0,
                        At(X_DEFAULT + X_OFFSET),
                        At(Y_START + 2.0 * Y_STEP),
                        At(Z_DEFAULT),
                    );
                })
                .await;

                self.move_and_wait(|st| {
                    st.move_speed = BODY_MOVE_SPEED;
                    st.set_target(
                        0,
                        At(X_DEFAULT - X_OFFSET),
                        At(Y_START + Y_STEP),
                        At(Z_DEFAULT),
                    );
                    st.set_target(
                        1,
                        At(X_DEFAULT - X_OFFSET),
                        At(Y_START + Y_STEP),
                        At(Z_DEFAULT),
                    );
                    st.set_target(2, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_DEFAULT));
                    st.set_target(
                        3,
                        At(X_DEFAULT + X_OFFSET),
                        At(Y_START + 2.0 * Y_STEP),
                        At(Z_DEFAULT),
                    );
                })
                .await;

                self.move_and_wait(|st| {
                    st.move_speed = LEG_MOVE_SPEED;
                    st.set_target(3, At(X_DEFAULT + X_OFFSET), At(Y_START + 2.0 * Y_STEP), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(3, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(3, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_DEFAULT));
                })
                .await;
            }
        }
    }

    pub async fn step_back(&self, times: u8) {
        for _ in 0..times {
            if self.with_state(|st| st.leg_is_home(3)).await {
                self.move_and_wait(|st| {
                    st.move_speed = LEG_MOVE_SPEED;
                    st.set_target(3, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(3, At(X_DEFAULT + X_OFFSET), At(Y_START + 2.0 * Y_STEP), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(
                        3,
                        At(X_DEFAULT + X_OFFSET),
                        At(Y_START + 2.0 * Y_STEP),
                        At(Z_DEFAULT),
                    );
                })
                .await;

                self.move_and_wait(|st| {
                    st.move_speed = BODY_MOVE_SPEED;
                    st.set_target(
                        0,
                        At(X_DEFAULT + X_OFFSET),
                        At(Y_START + 2.0 * Y_STEP),
                        At(Z_DEFAULT),
                    );
                    st.set_target(1, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_DEFAULT));
                    st.set_target(
                        2,
                        At(X_DEFAULT - X_OFFSET),
                        At(Y_START + Y_STEP),
                        At(Z_DEFAULT),
                    );
                    st.set_target(
                        3,
                        At(X_DEFAULT - X_OFFSET),
                        At(Y_START + Y_STEP),
                        At(Z_DEFAULT),
                    );
                })
                .await;

                self.move_and_wait(|st| {
                    st.move_speed = LEG_MOVE_SPEED;
                    st.set_target(0, At(X_DEFAULT + X_OFFSET), At(Y_START + 2.0 * Y_STEP), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(0, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(0, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_DEFAULT));
                })
                .await;
            } else {
                self.move_and_wait(|st| {
                    st.move_speed = LEG_MOVE_SPEED;
                    st.set_target(1, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(1, At(X_DEFAULT + X_OFFSET), At(Y_START + 2.0 * Y_STEP), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(
                        1,
                        At(X_DEFAULT + X_OFFSET),
                        At(Y_START + 2.0 * Y_STEP),
                        At(Z_DEFAULT),
                    );
                })
                .await;

                self.move_and_wait(|st| {
                    st.move_speed = BODY_MOVE_SPEED;
                    st.set_target(
                        0,
                        At(X_DEFAULT - X_OFFSET),
                        At(Y_START + Y_STEP),
                        At(Z_DEFAULT),
                    );
                    st.set_target(
                        1,
                        At(X_DEFAULT - X_OFFSET),
                        At(Y_START + Y_STEP),
                        At(Z_DEFAULT),
                    );
                    st.set_target(
                        2,
                        At(X_DEFAULT + X_OFFSET),
                        At(Y_START + 2.0 * Y_STEP),
                        At(Z_DEFAULT),
                    );
                    st.set_target(3, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_DEFAULT));
                })
                .await;

                self.move_and_wait(|st| {
                    st.move_speed = LEG_MOVE_SPEED;
                    st.set_target(2, At(X_DEFAULT + X_OFFSET), At(Y_START + 2.0 * Y_STEP), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(2, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(2, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_DEFAULT));
                })
                .await;
            }
        }
    }

    pub async fn turn_left(&self, times: u8) {
        for _ in 0..times {
            if self.with_state(|st| st.leg_is_home(3)).await {
                // legs 3 and 1 swing this phase
                self.move_and_wait(|st| {
                    st.move_speed = SPOT_TURN_SPEED;
                    st.set_target(3, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(0, At(g.turn_x1 - X_OFFSET), At(g.turn_y1), At(Z_DEFAULT));
                    st.set_target(1, At(g.turn_x0 - X_OFFSET), At(g.turn_y0), At(Z_DEFAULT));
                    st.set_target(2, At(g.turn_x1 + X_OFFSET), At(g.turn_y1), At(Z_DEFAULT));
                    st.set_target(3, At(g.turn_x0 + X_OFFSET), At(g.turn_y0), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(3, At(g.turn_x0 + X_OFFSET), At(g.turn_y0), At(Z_DEFAULT));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(0, At(g.turn_x1 + X_OFFSET), At(g.turn_y1), At(Z_DEFAULT));
                    st.set_target(1, At(g.turn_x0 + X_OFFSET), At(g.turn_y0), At(Z_DEFAULT));
                    st.set_target(2, At(g.turn_x1 - X_OFFSET), At(g.turn_y1), At(Z_DEFAULT));
                    st.set_target(3, At(g.turn_x0 - X_OFFSET), At(g.turn_y0), At(Z_DEFAULT));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(1, At(g.turn_x0 + X_OFFSET), At(g.turn_y0), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(0, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_DEFAULT));
                    st.set_target(1, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_UP));
                    st.set_target(
                        2,
                        At(X_DEFAULT - X_OFFSET),
                        At(Y_START + Y_STEP),
                        At(Z_DEFAULT),
                    );
                    st.set_target(
                        3,
                        At(X_DEFAULT - X_OFFSET),
                        At(Y_START + Y_STEP),
                        At(Z_DEFAULT),
                    );
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(1, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_DEFAULT));
                })
                .await;
            } else {
                // legs 0 and 2 swing this phase
                self.move_and_wait(|st| {
                    st.move_speed = SPOT_TURN_SPEED;
                    st.set_target(0, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(0, At(g.turn_x0 + X_OFFSET), At(g.turn_y0), At(Z_UP));
                    st.set_target(1, At(g.turn_x1 + X_OFFSET), At(g.turn_y1), At(Z_DEFAULT));
                    st.set_target(2, At(g.turn_x0 - X_OFFSET), At(g.turn_y0), At(Z_DEFAULT));
                    st.set_target(3, At(g.turn_x1 - X_OFFSET), At(g.turn_y1), At(Z_DEFAULT));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(0, At(g.turn_x0 + X_OFFSET), At(g.turn_y0), At(Z_DEFAULT));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(0, At(g.turn_x0 - X_OFFSET), At(g.turn_y0), At(Z_DEFAULT));
                    st.set_target(1, At(g.turn_x1 - X_OFFSET), At(g.turn_y1), At(Z_DEFAULT));
                    st.set_target(2, At(g.turn_x0 + X_OFFSET), At(g.turn_y0), At(Z_DEFAULT));
                    st.set_target(3, At(g.turn_x1 + X_OFFSET), At(g.turn_y1), At(Z_DEFAULT));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(2, At(g.turn_x0 + X_OFFSET), At(g.turn_y0), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(
                        0,
                        At(X_DEFAULT - X_OFFSET),
                        At(Y_START + Y_STEP),
                        At(Z_DEFAULT),
                    );
                    st.set_target(
                        1,
                        At(X_DEFAULT - X_OFFSET),
                        At(Y_START + Y_STEP),
                        At(Z_DEFAULT),
                    );
                    st.set_target(2, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_UP));
                    st.set_target(3, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_DEFAULT));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(2, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_DEFAULT));
                })
                .await;
            }
        }
    }

    pub async fn turn_right(&self, times: u8) {
        for _ in 0..times {
            if self.with_state(|st| st.leg_is_home(2)).await {
                // legs 2 and 0 swing this phase
                self.move_and_wait(|st| {
                    st.move_speed = SPOT_TURN_SPEED;
                    st.set_target(2, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(0, At(g.turn_x0 - X_OFFSET), At(g.turn_y0), At(Z_DEFAULT));
                    st.set_target(1, At(g.turn_x1 - X_OFFSET), At(g.turn_y1), At(Z_DEFAULT));
                    st.set_target(2, At(g.turn_x0 + X_OFFSET), At(g.turn_y0), At(Z_UP));
                    st.set_target(3, At(g.turn_x1 + X_OFFSET), At(g.turn_y1), At(Z_DEFAULT));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(2, At(g.turn_x0 + X_OFFSET), At(g.turn_y0), At(Z_DEFAULT));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(0, At(g.turn_x0 + X_OFFSET), At(g.turn_y0), At(Z_DEFAULT));
                    st.set_target(1, At(g.turn_x1 + X_OFFSET), At(g.turn_y1), At(Z_DEFAULT));
                    st.set_target(2, At(g.turn_x0 - X_OFFSET), At(g.turn_y0), At(Z_DEFAULT));
                    st.set_target(3, At(g.turn_x1 - X_OFFSET), At(g.turn_y1), At(Z_DEFAULT));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(0, At(g.turn_x0 + X_OFFSET), At(g.turn_y0), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(0, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_UP));
                    st.set_target(1, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_DEFAULT));
                    st.set_target(
                        2,
                        At(X_DEFAULT - X_OFFSET),
                        At(Y_START + Y_STEP),
                        At(Z_DEFAULT),
                    );
                    st.set_target(
                        3,
                        At(X_DEFAULT - X_OFFSET),
                        At(Y_START + Y_STEP),
                        At(Z_DEFAULT),
                    );
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(0, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_DEFAULT));
                })
                .await;
            } else {
                // legs 1 and 3 swing this phase
                self.move_and_wait(|st| {
                    st.move_speed = SPOT_TURN_SPEED;
                    st.set_target(1, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(0, At(g.turn_x1 + X_OFFSET), At(g.turn_y1), At(Z_DEFAULT));
                    st.set_target(1, At(g.turn_x0 + X_OFFSET), At(g.turn_y0), At(Z_UP));
                    st.set_target(2, At(g.turn_x1 - X_OFFSET), At(g.turn_y1), At(Z_DEFAULT));
                    st.set_target(3, At(g.turn_x0 - X_OFFSET), At(g.turn_y0), At(Z_DEFAULT));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(1, At(g.turn_x0 + X_OFFSET), At(g.turn_y0), At(Z_DEFAULT));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(0, At(g.turn_x1 - X_OFFSET), At(g.turn_y1), At(Z_DEFAULT));
                    st.set_target(1, At(g.turn_x0 - X_OFFSET), At(g.turn_y0), At(Z_DEFAULT));
                    st.set_target(2, At(g.turn_x1 + X_OFFSET), At(g.turn_y1), At(Z_DEFAULT));
                    st.set_target(3, At(g.turn_x0 + X_OFFSET), At(g.turn_y0), At(Z_DEFAULT));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(3, At(g.turn_x0 + X_OFFSET), At(g.turn_y0), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(
                        0,
                        At(X_DEFAULT - X_OFFSET),
                        At(Y_START + Y_STEP),
                        At(Z_DEFAULT),
                    );
                    st.set_target(
                        1,
                        At(X_DEFAULT - X_OFFSET),
                        At(Y_START + Y_STEP),
                        At(Z_DEFAULT),
                    );
                    st.set_target(2, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_DEFAULT));
                    st.set_target(3, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_UP));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(3, At(X_DEFAULT + X_OFFSET), At(Y_START), At(Z_DEFAULT));
                })
                .await;
            }
        }
    }

    /// Waves one front leg. The body first leans away so the waving leg is
    /// unloaded; which leg waves depends on the current stance phase.
    pub async fn hand_wave(&self, times: u8) {
        if self.with_state(|st| st.leg_is_home(3)).await {
            self.body_right(15.0).await;
            let saved = self.with_state(|st| st.site_now[2]).await;
            self.with_state(|st| st.move_speed = BODY_MOVE_SPEED).await;
            for _ in 0..times {
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(2, At(g.turn_x1), At(g.turn_y1), At(50.0));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(2, At(g.turn_x0), At(g.turn_y0), At(50.0));
                })
                .await;
            }
            self.move_and_wait(|st| {
                st.set_target(2, At(saved[0]), At(saved[1]), At(saved[2]));
            })
            .await;
            self.body_left(15.0).await;
        } else {
            self.body_left(15.0).await;
            let saved = self.with_state(|st| st.site_now[0]).await;
            self.with_state(|st| st.move_speed = BODY_MOVE_SPEED).await;
            for _ in 0..times {
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(0, At(g.turn_x1), At(g.turn_y1), At(50.0));
                })
                .await;
                self.move_and_wait(|st| {
                    let g = st.geom;
                    st.set_target(0, At(g.turn_x0), At(g.turn_y0), At(50.0));
                })
                .await;
            }
            self.move_and_wait(|st| {
                st.set_target(0, At(saved[0]), At(saved[1]), At(saved[2]));
            })
            .await;
            self.body_right(15.0).await;
        }
    }

    /// Bobs one front leg up and down between two raised poses.
    pub async fn hand_shake(&self, times: u8) {
        if self.with_state(|st| st.leg_is_home(3)).await {
            self.body_right(15.0).await;
            let saved = self.with_state(|st| st.site_now[2]).await;
            self.with_state(|st| st.move_speed = BODY_MOVE_SPEED).await;
            for _ in 0..times {
                self.move_and_wait(|st| {
                    st.set_target(2, At(X_DEFAULT - 30.0), At(Y_START + 2.0 * Y_STEP), At(55.0));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(2, At(X_DEFAULT - 30.0), At(Y_START + 2.0 * Y_STEP), At(10.0));
                })
                .await;
            }
            self.move_and_wait(|st| {
                st.set_target(2, At(saved[0]), At(saved[1]), At(saved[2]));
            })
            .await;
            self.body_left(15.0).await;
        } else {
            self.body_left(15.0).await;
            let saved = self.with_state(|st| st.site_now[0]).await;
            self.with_state(|st| st.move_speed = BODY_MOVE_SPEED).await;
            for _ in 0..times {
                self.move_and_wait(|st| {
                    st.set_target(0, At(X_DEFAULT - 30.0), At(Y_START + 2.0 * Y_STEP), At(55.0));
                })
                .await;
                self.move_and_wait(|st| {
                    st.set_target(0, At(X_DEFAULT - 30.0), At(Y_START + 2.0 * Y_STEP), At(10.0));
                })
                .await;
            }
            self.move_and_wait(|st| {
                st.set_target(0, At(saved[0]), At(saved[1]), At(saved[2]));
            })
            .await;
            self.body_right(15.0).await;
        }
    }

    /// Leans the body towards the left legs by `shift` millimetres.
    async fn body_left(&self, shift: f32) {
        self.move_and_wait(|st| {
            st.move_speed = STAND_SEAT_SPEED;
            st.set_target(0, At(st.site_now[0][0] + shift), Keep, Keep);
            st.set_target(1, At(st.site_now[1][0] + shift), Keep, Keep);
            st.set_target(2, At(st.site_now[2][0] - shift), Keep, Keep);
            st.set_target(3, At(st.site_now[3][0] - shift), Keep, Keep);
        })
        .await;
    }

    async fn body_right(&self, shift: f32) {
        self.move_and_wait(|st| {
            st.move_speed = STAND_SEAT_SPEED;
            st.set_target(0, At(st.site_now[0][0] - shift), Keep, Keep);
            st.set_target(1, At(st.site_now[1][0] - shift), Keep, Keep);
            st.set_target(2, At(st.site_now[2][0] + shift), Keep, Keep);
            st.set_target(3, At(st.site_now[3][0] + shift), Keep, Keep);
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::config::{Geometry, EPSILON};
    use crate::tasks::motor_task::run_motor_tick;
    use approx::assert_abs_diff_eq;
    use core::future::Future;
    use core::task::{Context, RawWaker, RawWakerVTable, Waker};

    fn noop_waker() -> Waker {
        fn clone(_: *const ()) -> RawWaker {
            RawWaker::new(core::ptr::null(), &VTABLE)
        }
        fn noop(_: *const ()) {}
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        unsafe { Waker::from_raw(RawWaker::new(core::ptr::null(), &VTABLE)) }
    }

    fn shared_at_boot() -> &'static SharedState {
        let shared = Box::leak(Box::new(SharedState::new(Geometry::new())));
        shared.state.try_lock().unwrap().init_stance();
        shared
    }

    /// Co-drives a gait future with motor ticks: polls the future, and
    /// while it is suspended runs one motor tick, signalling completions.
    /// Returns the expected-site snapshot at every completed sub-move and
    /// the number of ticks it took.
    fn drive<F: Future>(
        shared: &SharedState,
        fut: F,
        max_ticks: usize,
    ) -> (Vec<[[f32; 3]; 4]>, usize) {
        let mut fut = Box::pin(fut);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut snapshots = Vec::new();
        let mut ticks = 0;

        loop {
            if fut.as_mut().poll(&mut cx).is_ready() {
                return (snapshots, ticks);
            }
            let completed = {
                let mut st = shared
                    .state
                    .try_lock()
                    .expect("gait future must not hold the lock across a suspension");
                let done = run_motor_tick(&mut st, |_| {});
                if done.is_some() {
                    snapshots.push(st.site_expect);
                }
                done
            };
            if let Some(epoch) = completed {
                shared.notify_reached(epoch);
            }
            ticks += 1;
            assert!(ticks < max_ticks, "gait did not finish in {max_ticks} ticks");
        }
    }

    #[test]
    fn stand_from_boot_takes_the_expected_ticks() {
        let shared = shared_at_boot();
        let engine = GaitEngine::new(shared);

        let (snapshots, ticks) = drive(shared, engine.stand(), 1000);

        // 22 mm of travel at 1 mm per tick, completion on the final tick
        assert_eq!(ticks, 22);
        assert_eq!(snapshots.len(), 1);

        let st = shared.state.try_lock().unwrap();
        for leg in 0..NB_LEGS {
            assert_abs_diff_eq!(st.site_now[leg][2], Z_DEFAULT, epsilon = EPSILON);
        }
        assert!(st.all_reached());
    }

    #[test]
    fn repeated_stand_is_a_no_op() {
        let shared = shared_at_boot();
        let engine = GaitEngine::new(shared);
        drive(shared, engine.stand(), 1000);

        let before = shared.state.try_lock().unwrap().site_now;
        let (_, ticks) = drive(shared, engine.stand(), 1000);

        // nothing to move: the motor loop only confirms the fresh epoch
        assert_eq!(ticks, 1);
        let after = shared.state.try_lock().unwrap().site_now;
        assert_eq!(before, after);
    }

    #[test]
    fn step_forward_alternates_stance_phases() {
        let shared = shared_at_boot();
        let engine = GaitEngine::new(shared);
        drive(shared, engine.stand(), 1000);

        let (snapshots, _) = drive(shared, engine.step_forward(1), 20_000);
        assert_eq!(snapshots.len(), 7);

        let st = shared.state.try_lock().unwrap();
        let ys: Vec<f32> = (0..NB_LEGS).map(|leg| st.site_expect[leg][1]).collect();
        assert_abs_diff_eq!(ys[0], Y_START, epsilon = EPSILON);
        assert_abs_diff_eq!(ys[1], Y_START, epsilon = EPSILON);
        assert_abs_diff_eq!(ys[2], Y_START + Y_STEP, epsilon = EPSILON);
        assert_abs_diff_eq!(ys[3], Y_START + Y_STEP, epsilon = EPSILON);
        drop(st);

        // a second iteration runs the mirrored phase and restores the
        // original stance pattern
        let (snapshots, _) = drive(shared, engine.step_forward(1), 20_000);
        assert_eq!(snapshots.len(), 7);
        let st = shared.state.try_lock().unwrap();
        assert_abs_diff_eq!(st.site_expect[0][1], Y_START + Y_STEP, epsilon = EPSILON);
        assert_abs_diff_eq!(st.site_expect[1][1], Y_START + Y_STEP, epsilon = EPSILON);
        assert_abs_diff_eq!(st.site_expect[2][1], Y_START, epsilon = EPSILON);
        assert_abs_diff_eq!(st.site_expect[3][1], Y_START, epsilon = EPSILON);
    }

    #[test]
    fn at_most_one_leg_airborne_per_sub_step() {
        let shared = shared_at_boot();
        let engine = GaitEngine::new(shared);
        drive(shared, engine.stand(), 1000);

        let (snapshots, _) = drive(shared, engine.step_forward(2), 40_000);
        for stance in &snapshots {
            let airborne = stance
                .iter()
                .filter(|site| site[2] > Z_DEFAULT + 0.5)
                .count();
            assert!(airborne <= 1, "two legs airborne in {stance:?}");
        }
    }

    #[test]
    fn turn_left_round_trip_returns_home() {
        let shared = shared_at_boot();
        let engine = GaitEngine::new(shared);
        drive(shared, engine.stand(), 1000);

        // two iterations run both phases and end back on a home stance
        let (snapshots, _) = drive(shared, engine.turn_left(2), 40_000);
        assert_eq!(snapshots.len(), 14);

        let st = shared.state.try_lock().unwrap();
        for leg in 0..NB_LEGS {
            assert_abs_diff_eq!(st.site_now[leg][2], Z_DEFAULT, epsilon = EPSILON);
        }
        assert!(st.leg_is_home(1) || st.leg_is_home(2));
    }

    #[test]
    fn hand_wave_restores_the_working_leg() {
        let shared = shared_at_boot();
        let engine = GaitEngine::new(shared);
        drive(shared, engine.stand(), 1000);

        let before = shared.state.try_lock().unwrap().site_now;
        drive(shared, engine.hand_wave(2), 40_000);
        let after = shared.state.try_lock().unwrap().site_now;

        // the waving leg comes back to where it started and the body shift
        // is undone
        for leg in 0..NB_LEGS {
            for axis in 0..3 {
                assert_abs_diff_eq!(after[leg][axis], before[leg][axis], epsilon = 0.1);
            }
        }
    }

    #[test]
    fn stale_completion_signal_never_releases_a_new_wait() {
        let shared = shared_at_boot();
        let engine = GaitEngine::new(shared);
        drive(shared, engine.stand(), 1000);

        // leave a stale signal behind, as if a previous motion had just
        // been confirmed
        shared.notify_reached(1);

        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut fut = Box::pin(engine.sit());

        // the stale epoch must not satisfy the new wait, no matter how
        // often it is polled
        for _ in 0..5 {
            assert!(fut.as_mut().poll(&mut cx).is_pending());
        }
        {
            let st = shared.state.try_lock().unwrap();
            assert!(!st.all_reached(), "sit targets should still be pending");
        }

        // only real motor progress releases it
        let mut ticks = 0;
        loop {
            if fut.as_mut().poll(&mut cx).is_ready() {
                break;
            }
            let completed = {
                let mut st = shared.state.try_lock().unwrap();
                run_motor_tick(&mut st, |_| {})
            };
            if let Some(epoch) = completed {
                shared.notify_reached(epoch);
            }
            ticks += 1;
            assert!(ticks < 1000);
        }
        assert_eq!(ticks, 22);
    }
}
