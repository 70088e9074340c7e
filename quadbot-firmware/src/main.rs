#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

extern crate alloc;

mod net_task;
mod servo;
mod servo_task;

use alloc::boxed::Box;
use core::future::pending;

use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, StackResources};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{AnyPin, Pin};
use esp_hal::timer::timg::TimerGroup;
use log::info;

use quadbot_motion::robot::commands::{GaitCommand, ServoCommand};
use quadbot_motion::robot::config::Geometry;
use quadbot_motion::robot::state::SharedState;
use quadbot_motion::tasks::motion_task::motion_task;
use quadbot_motion::tasks::motor_task::motor_task;
use quadbot_motion::{GAIT_CMD_CHANNEL_SIZE, SERVO_CMD_CHANNEL_SIZE};

use net_task::{configure_and_start_wifi, net_task, runner_task};
use servo_task::servo_task;

esp_bootloader_esp_idf::esp_app_desc!();

//LEGS: [femur, tibia, coxa]
//FRONT_L: [32, 33, 25]
//BOTTOM_L: [26, 27, 14]
//FRONT_R: [12, 13, 19]
//BOTTOM_R: [18, 5, 17]

macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.init_with(|| $val)
    }};
}

static CMD_CHANNEL: Channel<CriticalSectionRawMutex, GaitCommand, GAIT_CMD_CHANNEL_SIZE> =
    Channel::new();
static SERVO_CHANNEL: Channel<CriticalSectionRawMutex, ServoCommand, SERVO_CMD_CHANNEL_SIZE> =
    Channel::new();

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let p = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 32 * 1024);
    esp_alloc::heap_allocator!(#[unsafe(link_section = ".dram2_uninit")] size: 96 * 1024);

    let timer0 = TimerGroup::new(p.TIMG1);
    esp_hal_embassy::init(timer0.timer0);

    // take important peripherals
    let mut rng = esp_hal::rng::Rng::new(p.RNG);
    let timer1 = TimerGroup::new(p.TIMG0);
    let wifi_init = esp_wifi::init(timer1.timer0, rng, p.RADIO_CLK)
        .expect("Failed to initialize WIFI controller");
    let wifi_init = Box::leak(Box::new(wifi_init));
    let (mut wifi_controller, interfaces) =
        esp_wifi::wifi::new(wifi_init, p.WIFI).expect("Failed to initialize WIFI controller");

    configure_and_start_wifi(&mut wifi_controller)
        .await
        .expect("Failed to bring wifi up");

    let servo_pins: [AnyPin<'static>; 12] = [
        p.GPIO32.degrade(),
        p.GPIO33.degrade(),
        p.GPIO25.degrade(),
        p.GPIO26.degrade(),
        p.GPIO27.degrade(),
        p.GPIO14.degrade(),
        p.GPIO12.degrade(),
        p.GPIO13.degrade(),
        p.GPIO19.degrade(),
        p.GPIO18.degrade(),
        p.GPIO5.degrade(),
        p.GPIO17.degrade(),
    ];

    // Get the embassy net stack up and working.
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let net_config = NetConfig::dhcpv4(Default::default());
    let device = interfaces.sta;
    let (stack, runner) = embassy_net::new(
        device,
        net_config,
        mk_static!(StackResources<3>, StackResources::new()),
        seed,
    );

    // One shared state store, co-owned by the sequencer and the motor loop.
    let shared = mk_static!(SharedState, SharedState::new(Geometry::new()));

    info!("Starting quadbot...");
    spawner
        .spawn(servo_task(servo_pins, p.LEDC, SERVO_CHANNEL.receiver()))
        .expect("Fail spawning servo task");
    spawner
        .spawn(motor_task(shared, SERVO_CHANNEL.sender()))
        .expect("Fail spawning motor task");
    spawner
        .spawn(motion_task(shared, CMD_CHANNEL.receiver()))
        .expect("Fail spawning motion task");
    spawner
        .spawn(runner_task(runner))
        .expect("Fail spawning runner task");
    spawner
        .spawn(net_task(stack, CMD_CHANNEL.sender()))
        .expect("Fail spawning net task");

    loop {
        pending::<()>().await;
    }
}
