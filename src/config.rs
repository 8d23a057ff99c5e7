//! Static network configuration.
//!
//! Value types handed to the stack once at startup. Both operating modes are
//! plain data here so they can be built and tested on the host; the active
//! mode is picked by [`NetworkConfig::mode`] and nothing switches at runtime.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum SSID length per IEEE 802.11.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum password length the stack's credential field can hold.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Operating mode for one boot session. Mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiMode {
    /// Join an existing access point as a client.
    Station,
    /// Bring up a local soft-AP.
    AccessPoint,
}

/// Minimum acceptable authentication mode when scanning for the target AP.
///
/// Aligned with the stack's auth-mode ladder. `Wpa2Personal` is the sane
/// default; anything weaker exists only for legacy networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthThreshold {
    Open,
    Wep,
    WpaPersonal,
    #[default]
    Wpa2Personal,
    WpaWpa2Personal,
    Wpa3Personal,
    Wpa2Wpa3Personal,
    WapiPersonal,
}

/// WPA3 SAE password-element derivation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaePasswordElement {
    /// Classic hunt-and-peck loop.
    #[default]
    HuntAndPeck,
    /// Hash-to-element, requires an identifier.
    HashToElement,
    /// Accept either method.
    Both,
}

/// WPA3/SAE parameters for station mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaeSettings {
    pub mode: SaePasswordElement,
    /// H2E password identifier; empty for hunt-and-peck.
    pub h2e_identifier: String,
}

/// Credentials and thresholds for joining an AP as a station.
///
/// Immutable once built; the stack keeps its own copy after configuration is
/// applied.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct StationSettings {
    pub ssid: String,
    /// Empty for open networks.
    pub password: String,
    #[zeroize(skip)]
    pub auth_threshold: AuthThreshold,
    #[zeroize(skip)]
    pub sae: SaeSettings,
}

impl StationSettings {
    /// Build station settings with the default WPA2 threshold and SAE
    /// hunt-and-peck.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Result<Self, ConfigError> {
        let settings = Self {
            ssid: ssid.into(),
            password: password.into(),
            auth_threshold: AuthThreshold::default(),
            sae: SaeSettings::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Lower (or raise) the scan auth-mode threshold.
    ///
    /// Deprecated WEP/WPA1 networks need `Wep`/`WpaPersonal` here, with a
    /// password already in the format that mode expects. Password format is
    /// the operator's responsibility and is not checked against the
    /// threshold.
    pub fn with_auth_threshold(mut self, threshold: AuthThreshold) -> Self {
        self.auth_threshold = threshold;
        self
    }

    /// Override the WPA3/SAE parameters.
    pub fn with_sae(mut self, sae: SaeSettings) -> Self {
        self.sae = sae;
        self
    }

    /// True when no password is configured.
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_lengths(&self.ssid, &self.password)
    }
}

impl fmt::Debug for StationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StationSettings")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .field("auth_threshold", &self.auth_threshold)
            .field("sae", &self.sae)
            .finish()
    }
}

/// Soft-AP parameters.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessPointSettings {
    pub ssid: String,
    /// Empty makes the AP open, see [`effective_auth`](Self::effective_auth).
    pub password: String,
    #[zeroize(skip)]
    pub channel: u8,
    /// Maximum number of simultaneously associated peers.
    #[zeroize(skip)]
    pub max_connections: u16,
    /// Requested auth mode for non-empty passwords.
    #[zeroize(skip)]
    pub auth: AuthThreshold,
}

impl AccessPointSettings {
    /// Build soft-AP settings with the default WPA2-PSK auth mode.
    pub fn new(
        ssid: impl Into<String>,
        password: impl Into<String>,
        channel: u8,
        max_connections: u16,
    ) -> Result<Self, ConfigError> {
        let settings = Self {
            ssid: ssid.into(),
            password: password.into(),
            channel,
            max_connections,
            auth: AuthThreshold::default(),
        };
        validate_lengths(&settings.ssid, &settings.password)?;
        Ok(settings)
    }

    /// Override the auth mode used when a password is configured.
    pub fn with_auth(mut self, auth: AuthThreshold) -> Self {
        self.auth = auth;
        self
    }

    /// Auth mode actually applied to the stack.
    ///
    /// An empty password always yields an open AP, whatever the configured
    /// default says. Usability fallback, documented behavior.
    pub fn effective_auth(&self) -> AuthThreshold {
        if self.password.is_empty() {
            AuthThreshold::Open
        } else {
            self.auth
        }
    }
}

impl fmt::Debug for AccessPointSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessPointSettings")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .field("channel", &self.channel)
            .field("max_connections", &self.max_connections)
            .field("auth", &self.auth)
            .finish()
    }
}

/// Everything the startup routine needs, resolved before the stack comes up.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub mode: WifiMode,
    pub station: StationSettings,
    pub access_point: AccessPointSettings,
    /// Reconnect attempts allowed before the connection is declared failed.
    pub max_retries: u32,
}

fn validate_lengths(ssid: &str, password: &str) -> Result<(), ConfigError> {
    if ssid.is_empty() {
        return Err(ConfigError::SsidEmpty);
    }
    if ssid.len() > MAX_SSID_LEN {
        return Err(ConfigError::SsidTooLong {
            len: ssid.len(),
            max: MAX_SSID_LEN,
        });
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(ConfigError::PasswordTooLong {
            len: password.len(),
            max: MAX_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Errors from building configuration values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// SSID is empty.
    SsidEmpty,
    /// SSID exceeds the stack's fixed-size field.
    SsidTooLong { len: usize, max: usize },
    /// Password exceeds the stack's fixed-size field.
    PasswordTooLong { len: usize, max: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidEmpty => write!(f, "SSID cannot be empty"),
            Self::SsidTooLong { len, max } => {
                write!(f, "SSID too long: {} bytes (max {})", len, max)
            }
            Self::PasswordTooLong { len, max } => {
                write!(f, "password too long: {} bytes (max {})", len, max)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_defaults() {
        let settings = StationSettings::new("HomeNet", "hunter2hunter2").unwrap();
        assert_eq!(settings.auth_threshold, AuthThreshold::Wpa2Personal);
        assert_eq!(settings.sae.mode, SaePasswordElement::HuntAndPeck);
        assert!(settings.sae.h2e_identifier.is_empty());
        assert!(!settings.is_open());
    }

    #[test]
    fn test_station_open_network() {
        let settings = StationSettings::new("CafeGuest", "").unwrap();
        assert!(settings.is_open());
    }

    #[test]
    fn test_station_legacy_threshold() {
        let settings = StationSettings::new("OldRouter", "13charsecret")
            .unwrap()
            .with_auth_threshold(AuthThreshold::Wep);
        assert_eq!(settings.auth_threshold, AuthThreshold::Wep);
    }

    #[test]
    fn test_station_sae_override() {
        let settings = StationSettings::new("Wpa3Net", "supersecret").unwrap().with_sae(SaeSettings {
            mode: SaePasswordElement::HashToElement,
            h2e_identifier: "device-7".to_string(),
        });
        assert_eq!(settings.sae.mode, SaePasswordElement::HashToElement);
        assert_eq!(settings.sae.h2e_identifier, "device-7");
    }

    #[test]
    fn test_empty_ssid_rejected() {
        assert_eq!(
            StationSettings::new("", "password").unwrap_err(),
            ConfigError::SsidEmpty
        );
    }

    #[test]
    fn test_ssid_length_boundary() {
        assert!(StationSettings::new("a".repeat(32), "pw").is_ok());
        assert!(matches!(
            StationSettings::new("a".repeat(33), "pw"),
            Err(ConfigError::SsidTooLong { len: 33, max: 32 })
        ));
    }

    #[test]
    fn test_password_length_boundary() {
        assert!(StationSettings::new("Net", "p".repeat(64)).is_ok());
        assert!(matches!(
            StationSettings::new("Net", "p".repeat(65)),
            Err(ConfigError::PasswordTooLong { len: 65, max: 64 })
        ));
    }

    #[test]
    fn test_ap_empty_password_forces_open() {
        let settings = AccessPointSettings::new("SetupPortal", "", 1, 4)
            .unwrap()
            .with_auth(AuthThreshold::Wpa2Personal);
        assert_eq!(settings.effective_auth(), AuthThreshold::Open);
    }

    #[test]
    fn test_ap_password_keeps_configured_auth() {
        let settings = AccessPointSettings::new("SetupPortal", "letmein42", 6, 8).unwrap();
        assert_eq!(settings.effective_auth(), AuthThreshold::Wpa2Personal);

        let wpa3 = settings.clone().with_auth(AuthThreshold::Wpa3Personal);
        assert_eq!(wpa3.effective_auth(), AuthThreshold::Wpa3Personal);
    }

    #[test]
    fn test_ap_validates_lengths_too() {
        assert_eq!(
            AccessPointSettings::new("", "pw", 1, 4).unwrap_err(),
            ConfigError::SsidEmpty
        );
    }

    #[test]
    fn test_debug_never_shows_passwords() {
        let station = StationSettings::new("Net", "topsecretpw").unwrap();
        let ap = AccessPointSettings::new("Portal", "alsosecret", 1, 4).unwrap();
        assert!(!format!("{:?}", station).contains("topsecretpw"));
        assert!(!format!("{:?}", ap).contains("alsosecret"));
    }
}
