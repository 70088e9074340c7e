//! Actuator task: configures the LEDC peripheral and drives the 12-servo
//! bank from the frames the motor loop emits.
extern crate alloc;

use alloc::boxed::Box;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_time::Timer;
use embedded_hal::pwm::SetDutyCycle;
use esp_hal::gpio::AnyPin;
use esp_hal::ledc::channel::{self, Channel, ChannelIFace, Number};
use esp_hal::ledc::timer::{self, LSClockSource, TimerIFace};
use esp_hal::ledc::{HighSpeed, LSGlobalClkSource, Ledc, LowSpeed};
use esp_hal::peripherals::LEDC;
use esp_hal::time::Rate;
use fugit::HertzU32;
use heapless::Vec;
use log::{debug, info};

use quadbot_motion::robot::commands::ServoCommand;
use quadbot_motion::robot::joint::JOINTS_PER_LEG;
use quadbot_motion::SERVO_CMD_CHANNEL_SIZE;

use crate::servo::{AnyServo, Servo};

const SERVO_FREQ_HZ: u32 = 50;

async fn create_configure_timers(
    ledc: &mut Ledc<'static>,
) -> (
    timer::Timer<'static, LowSpeed>,
    timer::Timer<'static, HighSpeed>,
) {
    let mut timer_low = ledc.timer::<LowSpeed>(timer::Number::Timer0);
    let mut timer_high = ledc.timer::<HighSpeed>(timer::Number::Timer0);
    Timer::after_millis(500).await;

    timer_low
        .configure(timer::config::Config {
            duty: timer::config::Duty::Duty8Bit,
            clock_source: LSClockSource::APBClk,
            frequency: Rate::from_hz(SERVO_FREQ_HZ),
        })
        .expect("Fail configuring low speed ledc timer");
    Timer::after_millis(500).await;

    timer_high
        .configure(timer::config::Config {
            duty: timer::config::Duty::Duty8Bit,
            clock_source: timer::HSClockSource::APBClk,
            frequency: Rate::from_hz(SERVO_FREQ_HZ),
        })
        .expect("Fail configuring high speed ledc timer");

    (timer_low, timer_high)
}

/// The servo bank is laid out leg-major, `[femur, tibia, coxa]` per leg,
/// matching the frame layout coming from the motor loop.
#[embassy_executor::task]
pub async fn servo_task(
    servo_pins: [AnyPin<'static>; 12],
    ledc: LEDC<'static>,
    frames: Receiver<'static, CriticalSectionRawMutex, ServoCommand, SERVO_CMD_CHANNEL_SIZE>,
) {
    info!("[SERVO_TASK] starting");
    let mut ledc = Ledc::new(ledc);
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);

    // Leak the timers to get the static lifetime the channels need.
    let (timer_low, timer_high) = create_configure_timers(&mut ledc).await;
    let timer_low: &'static timer::Timer<'static, LowSpeed> = Box::leak(Box::new(timer_low));
    let timer_high: &'static timer::Timer<'static, HighSpeed> = Box::leak(Box::new(timer_high));
    let [p0, p1, p2, p3, p4, p5, p6, p7, p8, p9, p10, p11] = servo_pins;

    let mut servos: Vec<AnyServo, 12> = Vec::new();

    let low_speed_channels: [Channel<'_, LowSpeed>; 8] = [
        ledc.channel(Number::Channel0, p0),
        ledc.channel(Number::Channel1, p1),
        ledc.channel(Number::Channel2, p2),
        ledc.channel(Number::Channel3, p3),
        ledc.channel(Number::Channel4, p4),
        ledc.channel(Number::Channel5, p5),
        ledc.channel(Number::Channel6, p6),
        ledc.channel(Number::Channel7, p7),
    ];
    for mut channel in low_speed_channels {
        channel
            .configure(channel::config::Config {
                timer: timer_low,
                duty_pct: 7,
                pin_config: channel::config::PinConfig::PushPull,
            })
            .expect("Fail configuring low speed channels");
        let max_duty = channel.max_duty_cycle() as u32;
        let idx = servos.len();
        let servo = Servo::new(
            channel,
            max_duty,
            HertzU32::from_raw(SERVO_FREQ_HZ),
            (idx / JOINTS_PER_LEG).into(),
            (idx % JOINTS_PER_LEG).into(),
        );
        let _ = servos.push(AnyServo::Low(servo));
    }

    let high_speed_channels: [Channel<'_, HighSpeed>; 4] = [
        ledc.channel(Number::Channel0, p8),
        ledc.channel(Number::Channel1, p9),
        ledc.channel(Number::Channel2, p10),
        ledc.channel(Number::Channel3, p11),
    ];
    for mut channel in high_speed_channels {
        channel
            .configure(channel::config::Config {
                timer: timer_high,
                duty_pct: 7,
                pin_config: channel::config::PinConfig::PushPull,
            })
            .expect("Fail configuring high speed channels");
        let max_duty = channel.max_duty_cycle() as u32;
        let idx = servos.len();
        let servo = Servo::new(
            channel,
            max_duty,
            HertzU32::from_raw(SERVO_FREQ_HZ),
            (idx / JOINTS_PER_LEG).into(),
            (idx % JOINTS_PER_LEG).into(),
        );
        let _ = servos.push(AnyServo::High(servo));
    }

    info!("[SERVO_TASK] {} servos configured", servos.len());

    loop {
        let cmd = frames.receive().await;
        debug!("[SERVO_TASK] {}: {:?}", cmd.leg, cmd.angles);
        let base = cmd.leg as usize * JOINTS_PER_LEG;
        for (joint, angle) in cmd.angles.iter().enumerate() {
            let angle = angle.clamp(0.0, 180.0) + 0.5;
            if let Some(servo) = servos.get_mut(base + joint) {
                servo.set_angle(angle as u8);
            }
        }
    }
}
