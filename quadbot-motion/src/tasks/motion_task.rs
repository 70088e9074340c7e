//! The gait sequencer task.
//!
//! Seeds the boot stance, performs the initial stand, then executes
//! commands from the bounded command queue one at a time. A long gait runs
//! to completion before the next command is taken; producers feel
//! backpressure through the queue instead of having commands dropped.
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_time::Timer;
use log::{debug, info};

use crate::kinematics::gait_engine::GaitEngine;
use crate::robot::commands::GaitCommand;
use crate::robot::state::SharedState;
use crate::GAIT_CMD_CHANNEL_SIZE;

#[embassy_executor::task]
pub async fn motion_task(
    shared: &'static SharedState,
    cmd_receiver: Receiver<'static, CriticalSectionRawMutex, GaitCommand, GAIT_CMD_CHANNEL_SIZE>,
) {
    let engine = GaitEngine::new(shared);

    {
        let mut st = shared.state.lock().await;
        st.init_stance();
        debug!("[MOTION_TASK] turn geometry: {:?}", st.geom);
    }
    info!("[MOTION_TASK] boot stance seeded, all legs ready");

    // let the servos settle on the boot stance before standing up
    Timer::after_millis(1000).await;
    engine.stand().await;

    loop {
        let cmd = cmd_receiver.receive().await;
        info!("[MOTION_TASK] received {cmd:?}");
        engine.run(cmd).await;
        info!("[MOTION_TASK] {cmd:?} done");
    }
}
