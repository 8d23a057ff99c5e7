//! NVS flash bring-up.
//!
//! The network stack stores PHY calibration data in NVS, so the partition
//! must be usable before the driver is created. A partition left behind by
//! an older firmware (format version bump, or no free pages) gets erased
//! once and reinitialized; anything else is fatal to startup.

use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_sys::{self as sys, esp, EspError};
use log::warn;

/// Initialize the default NVS partition, erasing it once if unusable.
pub fn init_nvs_flash() -> Result<EspDefaultNvsPartition, EspError> {
    let ret = unsafe { sys::nvs_flash_init() };
    if ret == sys::ESP_ERR_NVS_NO_FREE_PAGES as i32
        || ret == sys::ESP_ERR_NVS_NEW_VERSION_FOUND as i32
    {
        warn!("NVS partition unusable, erasing and reinitializing");
        esp!(unsafe { sys::nvs_flash_erase() })?;
        esp!(unsafe { sys::nvs_flash_init() })?;
    } else {
        esp!(ret)?;
    }

    // take() re-runs init, which is a no-op once the partition is valid.
    EspDefaultNvsPartition::take()
}
