//! ESP-IDF integration (ESP32 only).
//!
//! - [`nvs`] - NVS flash bring-up with the one-shot erase-and-retry step
//! - [`session`] - startup orchestration, event bridging, status queries

mod nvs;
mod session;

pub use nvs::init_nvs_flash;
pub use session::{wifi_start, WifiError, WifiSession};
