//! Wi-Fi connectivity lifecycle for ESP32 firmware.
//!
//! Brings up either a station link to an access point or a local soft-AP and
//! supervises the connection attempt through the stack's event stream with a
//! bounded retry policy. Live association state can be queried at any point
//! afterwards, independent of the cached startup outcome.
//!
//! The core (connection supervisor, signal primitive, configuration types)
//! is platform-independent and tested on the host; everything touching
//! ESP-IDF lives behind the `esp32` feature.

pub mod config;
pub mod signal;
pub mod supervisor;

#[cfg(feature = "esp32")]
pub mod driver;

// Re-export commonly used items
pub use config::{
    AccessPointSettings, AuthThreshold, ConfigError, NetworkConfig, SaePasswordElement,
    SaeSettings, StationSettings, WifiMode,
};
pub use signal::EventFlags;
pub use supervisor::{ConnectionSupervisor, LinkEvent, Outcome, StationControl};

#[cfg(feature = "esp32")]
pub use driver::{wifi_start, WifiError, WifiSession};
