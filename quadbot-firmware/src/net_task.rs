//! Networking and TCP command server.
//!
//! Brings the WiFi interface up, listens for TCP clients and forwards every
//! parsed gait command into the bounded command queue. When the queue is
//! full the send blocks, so a flooding client is held back instead of
//! having commands silently dropped.
extern crate alloc;

use alloc::string::String;
use core::str::FromStr;

use anyhow::{anyhow, Result};
use embassy_net::{tcp::TcpSocket, IpListenEndpoint, Stack};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::Timer;
use esp_wifi::wifi::{ClientConfiguration, WifiController, WifiDevice};
use log::{error, info, warn};

use quadbot_motion::robot::commands::GaitCommand;
use quadbot_motion::GAIT_CMD_CHANNEL_SIZE;

const PORT: u16 = 5000;
const RX_BUF_SIZE: usize = 512;
const TX_BUF_SIZE: usize = 512;

#[embassy_executor::task]
pub async fn runner_task(mut runner: embassy_net::Runner<'static, WifiDevice<'static>>) {
    runner.run().await;
}

#[embassy_executor::task]
pub async fn net_task(
    stack: Stack<'static>,
    cmd_sender: Sender<'static, CriticalSectionRawMutex, GaitCommand, GAIT_CMD_CHANNEL_SIZE>,
) {
    let mut rx_buf = [0u8; RX_BUF_SIZE];
    let mut tx_buf = [0u8; TX_BUF_SIZE];

    while !stack.is_link_up() {
        Timer::after_millis(500).await;
    }

    if let Some(config) = stack.config_v4() {
        info!(
            "[NET_TASK] command server listening at {}:{}",
            config.address, PORT
        );
    }

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx_buf, &mut tx_buf);

        match socket
            .accept(IpListenEndpoint {
                port: PORT,
                addr: None,
            })
            .await
        {
            Ok(_) => {
                info!("[NET_TASK] client connected");
                handle_connection(&mut socket, &cmd_sender).await;
            }
            Err(e) => {
                error!("[NET_TASK] accept failed: {e:?}");
                Timer::after_millis(500).await; // backoff delay
                continue;
            }
        }
    }
}

async fn handle_connection(
    socket: &mut TcpSocket<'_>,
    cmd_sender: &Sender<'static, CriticalSectionRawMutex, GaitCommand, GAIT_CMD_CHANNEL_SIZE>,
) {
    let mut rx_buf = [0u8; RX_BUF_SIZE];
    loop {
        match socket.read(&mut rx_buf).await {
            Ok(0) => break,
            Ok(n) => {
                let received = core::str::from_utf8(&rx_buf[..n]).unwrap_or_default().trim();
                match GaitCommand::try_from(received) {
                    Ok(cmd) => cmd_sender.send(cmd).await,
                    Err(_) => warn!("[NET_TASK] unrecognised command: {received}"),
                }
            }
            Err(e) => {
                error!("[NET_TASK] read error: {e:?}");
                break;
            }
        }
    }
}

pub async fn configure_and_start_wifi(wifi_controller: &mut WifiController<'_>) -> Result<()> {
    let ssid = env!("WIFI_SSID");
    let password = env!("WIFI_PASS");
    let config = esp_wifi::wifi::Configuration::Client(ClientConfiguration {
        ssid: String::from_str(ssid).unwrap(),
        password: String::from_str(password).unwrap(),
        ..Default::default()
    });

    info!("[NET_TASK] connecting to wifi: {ssid}");
    wifi_controller
        .set_configuration(&config)
        .map_err(|e| anyhow!("failed setting wifi configuration: {e:?}"))?;

    wifi_controller
        .set_power_saving(esp_wifi::config::PowerSaveMode::None)
        .map_err(|e| anyhow!("failed setting wifi power mode: {e:?}"))?;

    wifi_controller
        .start()
        .map_err(|e| anyhow!("failed starting wifi: {e:?}"))?;
    wifi_controller
        .connect_async()
        .await
        .map_err(|e| anyhow!("failed connecting to wifi: {e:?}"))?;

    if let Ok(rssi) = wifi_controller.rssi() {
        info!("[NET_TASK] wifi connected, signal: {rssi}");
    }
    Ok(())
}
