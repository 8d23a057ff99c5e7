//! Connectivity bring-up entry point.
//!
//! Runs on both platforms:
//! - **ESP32**: `cargo espflash flash --bin firmware --features esp32 --release`
//! - **Host**: `cargo run --bin firmware` (replays a synthetic event
//!   sequence through the supervisor; no radio involved)
//!
//! Network parameters come from the environment at build time
//! (`WIFI_STA_SSID`, `WIFI_STA_PASSWORD`, `WIFI_AP_SSID`, `WIFI_AP_PASSWORD`),
//! with placeholders for bench use. The operating mode is fixed per build:
//! station by default, soft-AP with `--features mode-softap`.

use log::info;
use wifi_supervisor_esp32::{
    AccessPointSettings, ConfigError, NetworkConfig, StationSettings, WifiMode,
};

const STA_SSID: &str = match option_env!("WIFI_STA_SSID") {
    Some(v) => v,
    None => "myssid",
};
const STA_PASSWORD: &str = match option_env!("WIFI_STA_PASSWORD") {
    Some(v) => v,
    None => "mypassword",
};
const AP_SSID: &str = match option_env!("WIFI_AP_SSID") {
    Some(v) => v,
    None => "myap",
};
const AP_PASSWORD: &str = match option_env!("WIFI_AP_PASSWORD") {
    Some(v) => v,
    None => "myappassword",
};

/// Soft-AP channel.
const AP_CHANNEL: u8 = 1;

/// Soft-AP peer limit.
const AP_MAX_CONNECTIONS: u16 = 4;

/// Reconnect attempts before the station connection is declared failed.
const MAX_RETRIES: u32 = 5;

// ESP32: route the log facade through the IDF logger
#[cfg(feature = "esp32")]
fn platform_init() {
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    info!("ESP-IDF initialized");
}

// Host: just initialize env_logger
#[cfg(not(feature = "esp32"))]
fn platform_init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

fn network_config() -> Result<NetworkConfig, ConfigError> {
    let mode = if cfg!(feature = "mode-softap") {
        WifiMode::AccessPoint
    } else {
        WifiMode::Station
    };
    Ok(NetworkConfig {
        mode,
        station: StationSettings::new(STA_SSID, STA_PASSWORD)?,
        access_point: AccessPointSettings::new(AP_SSID, AP_PASSWORD, AP_CHANNEL, AP_MAX_CONNECTIONS)?,
        max_retries: MAX_RETRIES,
    })
}

fn main() {
    platform_init();

    info!("=== connectivity bring-up starting ===");

    let config = network_config().expect("invalid network configuration");
    run(config);
}

#[cfg(feature = "esp32")]
fn run(config: NetworkConfig) {
    use std::time::Duration;

    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;

    let peripherals = Peripherals::take().expect("peripherals already taken");
    let sysloop = EspSystemEventLoop::take().expect("system event loop unavailable");

    let session = wifi_supervisor_esp32::wifi_start(peripherals.modem, sysloop, &config)
        .expect("network startup failed");

    match config.mode {
        WifiMode::Station => loop {
            // Re-sample live association state, independent of the cached
            // startup outcome.
            std::thread::sleep(Duration::from_secs(30));
            if session.is_connected() {
                if let Ok(ip_info) = session.wifi().sta_netif().get_ip_info() {
                    info!("IP: {}", ip_info.ip);
                }
            }
        },
        WifiMode::AccessPoint => loop {
            std::thread::sleep(Duration::from_secs(3600));
        },
    }
}

// No radio on the host: replay the bring-up of a flaky AP that accepts the
// third attempt, so the supervisor logic can be watched end to end.
#[cfg(not(feature = "esp32"))]
fn run(config: NetworkConfig) {
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::time::Duration;

    use log::{error, warn};
    use wifi_supervisor_esp32::{ConnectionSupervisor, LinkEvent, Outcome, StationControl};

    struct ScriptedStation;

    impl StationControl for ScriptedStation {
        fn request_connect(&self) {
            info!("connect requested");
        }
    }

    info!("platform: host, replaying synthetic station bring-up");

    let supervisor = Arc::new(ConnectionSupervisor::new(config.max_retries));
    let dispatch = {
        let supervisor = supervisor.clone();
        std::thread::spawn(move || {
            let script = [
                LinkEvent::InterfaceStarted,
                LinkEvent::Disconnected,
                LinkEvent::Disconnected,
                LinkEvent::IpAcquired(Ipv4Addr::new(192, 168, 4, 2)),
            ];
            for event in script {
                std::thread::sleep(Duration::from_millis(200));
                supervisor.handle_event(&event, &ScriptedStation);
            }
        })
    };

    match supervisor.wait_outcome(None) {
        Some(Outcome::Connected) => info!("connected to AP SSID: {}", config.station.ssid),
        Some(Outcome::Failed) => warn!("failed to connect to SSID: {}", config.station.ssid),
        None => error!("woke without a terminal outcome"),
    }

    let _ = dispatch.join();
}
