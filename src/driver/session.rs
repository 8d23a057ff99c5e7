//! Startup orchestration against the ESP-IDF stack.
//!
//! [`wifi_start`] wires the platform pieces together: NVS, the WiFi driver,
//! and two system event loop subscriptions that translate the stack's
//! link- and IP-layer events into [`LinkEvent`]s for the supervisor. In
//! station mode it then blocks until the supervisor publishes a terminal
//! outcome; a soft-AP is up as soon as the stack start call returns.

use std::fmt;
use std::sync::Arc;

use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::netif::IpEvent;
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent,
};
use esp_idf_sys::{self as sys, esp, EspError};
use log::{error, info, warn};

use super::nvs::init_nvs_flash;
use crate::config::{
    AccessPointSettings, AuthThreshold, NetworkConfig, SaePasswordElement, SaeSettings,
    StationSettings, WifiMode,
};
use crate::supervisor::{ConnectionSupervisor, LinkEvent, Outcome, StationControl};

/// Issues connect requests against the stack's station interface.
///
/// The dispatch context cannot borrow the driver, so requests go through the
/// stack's process-global entry point.
struct StackStationControl;

impl StationControl for StackStationControl {
    fn request_connect(&self) {
        if let Err(err) = esp!(unsafe { sys::esp_wifi_connect() }) {
            warn!("connect request rejected by stack: {}", err);
        }
    }
}

/// A started WiFi session.
///
/// Owns the driver and the event subscriptions; dropping it tears the
/// connection down (RAII), so keep it alive for as long as the network is
/// needed.
pub struct WifiSession {
    wifi: EspWifi<'static>,
    supervisor: Arc<ConnectionSupervisor>,
    _wifi_events: EspSubscription<'static, System>,
    _ip_events: EspSubscription<'static, System>,
}

impl WifiSession {
    /// Terminal outcome of the startup connection attempt, if one has been
    /// published. Re-readable; never reset within a boot session.
    pub fn outcome(&self) -> Option<Outcome> {
        self.supervisor.outcome()
    }

    /// Point-in-time association check against the stack's live AP record.
    ///
    /// Independent of the startup outcome: reflects the state right now,
    /// however many disconnect/reconnect cycles have happened since boot.
    pub fn is_connected(&self) -> bool {
        match self.connected_ssid() {
            Some(ssid) => {
                info!("connected to AP SSID: {}", ssid);
                true
            }
            None => {
                error!("not associated with any AP");
                false
            }
        }
    }

    /// SSID of the currently associated AP, if any.
    pub fn connected_ssid(&self) -> Option<String> {
        let mut record: sys::wifi_ap_record_t = unsafe { core::mem::zeroed() };
        esp!(unsafe { sys::esp_wifi_sta_get_ap_info(&mut record) }).ok()?;
        let len = record
            .ssid
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(record.ssid.len());
        Some(String::from_utf8_lossy(&record.ssid[..len]).into_owned())
    }

    /// Access to the underlying driver (netif queries and the like).
    pub fn wifi(&self) -> &EspWifi<'static> {
        &self.wifi
    }
}

/// Bring the network up according to `config` and, in station mode, block
/// until the connection attempt reaches a terminal outcome.
///
/// Initialization failures (NVS beyond recovery, driver creation, rejected
/// configuration) abort startup with an error. An exhausted retry budget is
/// not an error: it is reported through the logs and [`WifiSession::outcome`],
/// and the caller decides what happens next.
pub fn wifi_start(
    modem: Modem,
    sysloop: EspSystemEventLoop,
    config: &NetworkConfig,
) -> Result<WifiSession, WifiError> {
    let nvs = init_nvs_flash().map_err(WifiError::Nvs)?;
    let mut wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;

    let supervisor = Arc::new(ConnectionSupervisor::new(config.max_retries));

    // Subscribe before starting the stack so the interface-start event
    // cannot be missed. Subscriptions unregister when the session drops.
    let wifi_events = {
        let supervisor = supervisor.clone();
        sysloop.subscribe::<WifiEvent, _>(move |event| {
            if let Some(link_event) = translate_wifi_event(&event) {
                supervisor.handle_event(&link_event, &StackStationControl);
            }
        })?
    };
    let ip_events = {
        let supervisor = supervisor.clone();
        sysloop.subscribe::<IpEvent, _>(move |event| {
            if let Some(link_event) = translate_ip_event(&event) {
                supervisor.handle_event(&link_event, &StackStationControl);
            }
        })?
    };

    match config.mode {
        WifiMode::Station => {
            wifi.set_configuration(&station_configuration(&config.station)?)
                .map_err(WifiError::ConfigRejected)?;
            apply_sae_settings(&config.station.sae).map_err(WifiError::ConfigRejected)?;
            info!("station mode configured, SSID: {}", config.station.ssid);
        }
        WifiMode::AccessPoint => {
            wifi.set_configuration(&access_point_configuration(&config.access_point)?)
                .map_err(WifiError::ConfigRejected)?;
            info!(
                "softap mode configured, SSID: {} channel: {}",
                config.access_point.ssid, config.access_point.channel
            );
        }
    }

    wifi.start()?;

    let session = WifiSession {
        wifi,
        supervisor,
        _wifi_events: wifi_events,
        _ip_events: ip_events,
    };

    if config.mode == WifiMode::Station {
        // Park until the event handler publishes an outcome. Termination is
        // guaranteed by the bounded retry policy, so the wait is unbounded.
        match session.supervisor.wait_outcome(None) {
            Some(Outcome::Connected) => {
                info!("connected to AP SSID: {}", config.station.ssid);
            }
            Some(Outcome::Failed) => {
                warn!("failed to connect to SSID: {}", config.station.ssid);
            }
            None => error!("woke without a terminal outcome"),
        }
    }

    Ok(session)
}

fn translate_wifi_event(event: &WifiEvent<'_>) -> Option<LinkEvent> {
    match event {
        WifiEvent::StaStarted => Some(LinkEvent::InterfaceStarted),
        WifiEvent::StaDisconnected(_) => Some(LinkEvent::Disconnected),
        WifiEvent::ApStaConnected(peer) => Some(LinkEvent::PeerJoined {
            mac: peer.mac(),
            aid: u16::from(peer.aid()),
        }),
        WifiEvent::ApStaDisconnected(peer) => Some(LinkEvent::PeerLeft {
            mac: peer.mac(),
            aid: u16::from(peer.aid()),
        }),
        _ => None,
    }
}

fn translate_ip_event(event: &IpEvent<'_>) -> Option<LinkEvent> {
    match event {
        IpEvent::DhcpIpAssigned(assignment) => Some(LinkEvent::IpAcquired(assignment.ip())),
        _ => None,
    }
}

fn station_configuration(settings: &StationSettings) -> Result<Configuration, WifiError> {
    Ok(Configuration::Client(ClientConfiguration {
        ssid: settings
            .ssid
            .as_str()
            .try_into()
            .map_err(|_| WifiError::InvalidSsid)?,
        password: settings
            .password
            .as_str()
            .try_into()
            .map_err(|_| WifiError::InvalidPassword)?,
        auth_method: auth_method(settings.auth_threshold),
        ..Default::default()
    }))
}

fn access_point_configuration(settings: &AccessPointSettings) -> Result<Configuration, WifiError> {
    Ok(Configuration::AccessPoint(AccessPointConfiguration {
        ssid: settings
            .ssid
            .as_str()
            .try_into()
            .map_err(|_| WifiError::InvalidSsid)?,
        password: settings
            .password
            .as_str()
            .try_into()
            .map_err(|_| WifiError::InvalidPassword)?,
        channel: settings.channel,
        max_connections: settings.max_connections,
        auth_method: auth_method(settings.effective_auth()),
        ..Default::default()
    }))
}

fn auth_method(threshold: AuthThreshold) -> AuthMethod {
    match threshold {
        AuthThreshold::Open => AuthMethod::None,
        AuthThreshold::Wep => AuthMethod::WEP,
        AuthThreshold::WpaPersonal => AuthMethod::WPA,
        AuthThreshold::Wpa2Personal => AuthMethod::WPA2Personal,
        AuthThreshold::WpaWpa2Personal => AuthMethod::WPAWPA2Personal,
        AuthThreshold::Wpa3Personal => AuthMethod::WPA3Personal,
        AuthThreshold::Wpa2Wpa3Personal => AuthMethod::WPA2WPA3Personal,
        AuthThreshold::WapiPersonal => AuthMethod::WAPIPersonal,
    }
}

/// Patch the SAE fields into the station config slot.
///
/// The safe configuration type does not carry the SAE password-element
/// fields, so the already-applied station config is read back, patched and
/// rewritten through the raw API.
fn apply_sae_settings(sae: &SaeSettings) -> Result<(), EspError> {
    let mut raw: sys::wifi_config_t = unsafe { core::mem::zeroed() };
    esp!(unsafe { sys::esp_wifi_get_config(sys::wifi_interface_t_WIFI_IF_STA, &mut raw) })?;

    unsafe {
        raw.sta.sae_pwe_h2e = match sae.mode {
            SaePasswordElement::HuntAndPeck => sys::wifi_sae_pwe_method_t_WPA3_SAE_PWE_HUNT_AND_PECK,
            SaePasswordElement::HashToElement => {
                sys::wifi_sae_pwe_method_t_WPA3_SAE_PWE_HASH_TO_ELEMENT
            }
            SaePasswordElement::Both => sys::wifi_sae_pwe_method_t_WPA3_SAE_PWE_BOTH,
        };

        let field = &mut raw.sta.sae_h2e_identifier;
        field.fill(0);
        let identifier = sae.h2e_identifier.as_bytes();
        // Keep the trailing NUL the stack expects.
        let len = identifier.len().min(field.len().saturating_sub(1));
        field[..len].copy_from_slice(&identifier[..len]);
    }

    esp!(unsafe { sys::esp_wifi_set_config(sys::wifi_interface_t_WIFI_IF_STA, &mut raw) })
}

/// Errors that abort network startup.
#[derive(Debug)]
pub enum WifiError {
    /// SSID does not fit the stack's fixed-size field.
    InvalidSsid,
    /// Password does not fit the stack's fixed-size field.
    InvalidPassword,
    /// NVS flash unusable even after the erase-and-retry step.
    Nvs(EspError),
    /// The stack rejected the mode configuration.
    ConfigRejected(EspError),
    /// Any other ESP-IDF failure.
    Esp(EspError),
}

impl From<EspError> for WifiError {
    fn from(e: EspError) -> Self {
        Self::Esp(e)
    }
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "invalid SSID"),
            Self::InvalidPassword => write!(f, "invalid password"),
            Self::Nvs(e) => write!(f, "NVS initialization failed: {}", e),
            Self::ConfigRejected(e) => write!(f, "stack rejected configuration: {}", e),
            Self::Esp(e) => write!(f, "ESP error: {}", e),
        }
    }
}

impl std::error::Error for WifiError {}
