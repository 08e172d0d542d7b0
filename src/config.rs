//! Board-level settings of the gauge.

use crate::bmp280::registers::BMP280_ADDR_PRIMARY;
use crate::controller::ButtonTiming;
use crate::smp3011::calibration::{DEFAULT_MAX_KPA, DEFAULT_MIN_KPA};
use crate::smp3011::registers::SMP3011_ADDR;

/// Everything the firmware needs to wire up and run the gauge.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GaugeConfig {
    pub bmp280_addr: u8,
    pub smp3011_addr: u8,
    pub display_addr: u8,
    /// Period of the sensor task.
    pub read_interval_ms: u64,
    /// Polling period of the button task; also the debounce window.
    pub button_poll_ms: u64,
    pub button_timing: ButtonTiming,
    /// Range the linear model falls back to when nothing is stored.
    pub default_min_kpa: f32,
    pub default_max_kpa: f32,
    /// Offset change per Up/Down press while calibrating.
    pub calibration_step_kpa: f32,
    /// Flash offset of the stored calibration record.
    pub calibration_flash_offset: u32,
}

impl GaugeConfig {
    pub const fn new() -> Self {
        Self {
            bmp280_addr: BMP280_ADDR_PRIMARY,
            smp3011_addr: SMP3011_ADDR,
            display_addr: 0x3C,
            read_interval_ms: 2000,
            button_poll_ms: 50,
            button_timing: ButtonTiming::new(),
            default_min_kpa: DEFAULT_MIN_KPA,
            default_max_kpa: DEFAULT_MAX_KPA,
            calibration_step_kpa: 10.0,
            // first 4 KiB sector of the NVS partition
            calibration_flash_offset: 0x9000,
        }
    }

    pub const fn with_read_interval_ms(mut self, ms: u64) -> Self {
        self.read_interval_ms = ms;
        self
    }

    pub const fn with_calibration_step_kpa(mut self, step: f32) -> Self {
        self.calibration_step_kpa = step;
        self
    }
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self::new()
    }
}
