//! Configuration page in XIP flash
//!
//! The USB configurator writes one page into the last erase sector of the
//! 2 MB flash; the recorder only ever reads it back, straight out of the
//! XIP window.

use recorder::config::{ConfigBlock, ConfigError, CONFIG_PAGE_BYTES};

/// Base of the XIP window.
const XIP_BASE: u32 = 0x1000_0000;
/// Total external flash, matching the Pico-class module.
const FLASH_SIZE_BYTES: u32 = 2 * 1024 * 1024;
/// One erase sector.
const FLASH_SECTOR_SIZE: u32 = 4096;
/// Where the configuration page lives: the start of the last sector.
const CONFIG_FLASH_ADDR: u32 = XIP_BASE + FLASH_SIZE_BYTES - FLASH_SECTOR_SIZE;

/// Copy the raw configuration page out of flash.
#[must_use]
pub fn read_config_page() -> [u8; CONFIG_PAGE_BYTES] {
    let mut page = [0u8; CONFIG_PAGE_BYTES];
    for (offset, byte) in page.iter_mut().enumerate() {
        // SAFETY: CONFIG_FLASH_ADDR..+CONFIG_PAGE_BYTES lies inside the
        // always-mapped XIP window, is 1-byte aligned, and is never written
        // at runtime (the configurator runs before the recorder and resets
        // the core afterwards). Volatile keeps the XIP reads ordered.
        *byte = unsafe {
            core::ptr::read_volatile(
                (CONFIG_FLASH_ADDR as usize + offset) as *const u8,
            )
        };
    }
    page
}

/// Read and validate the persisted configuration.
pub fn load_config() -> Result<ConfigBlock, ConfigError> {
    ConfigBlock::from_bytes(&read_config_page())
}
