//! Operating modes and the calibration workflow.
//!
//! The controller is pure state: button events and sensor readings go in,
//! [`Effect`]s and [`Screen`]s come out. The firmware tasks do the I/O.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::config::GaugeConfig;
use crate::smp3011::calibration::{LinearCalibration, SharedCalibration};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperationMode {
    #[default]
    QuickRead,
    DetailedRead,
    Calibration,
    Settings,
}

impl OperationMode {
    pub const fn next(self) -> Self {
        match self {
            Self::QuickRead => Self::DetailedRead,
            Self::DetailedRead => Self::Calibration,
            Self::Calibration => Self::Settings,
            Self::Settings => Self::QuickRead,
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::QuickRead => "QUICK READ",
            Self::DetailedRead => "DETAILED",
            Self::Calibration => "CALIBRATION",
            Self::Settings => "SETTINGS",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonType {
    Up,
    Down,
    Mode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PressType {
    Short,
    Long,
    VeryLong,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonEvent {
    pub button: ButtonType,
    pub press: PressType,
    /// Time of release.
    pub timestamp_ms: u64,
}

/// Hold-time thresholds used to classify a press on release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonTiming {
    pub long_press_ms: u64,
    pub very_long_press_ms: u64,
}

impl ButtonTiming {
    pub const fn new() -> Self {
        Self {
            long_press_ms: 1000,
            very_long_press_ms: 3000,
        }
    }

    pub const fn classify(&self, held_ms: u64) -> PressType {
        if held_ms >= self.very_long_press_ms {
            PressType::VeryLong
        } else if held_ms >= self.long_press_ms {
            PressType::Long
        } else {
            PressType::Short
        }
    }
}

impl Default for ButtonTiming {
    fn default() -> Self {
        Self::new()
    }
}

/// Latest readings. `None` marks a failed read.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorData {
    pub temperature_c: Option<f32>,
    pub atmospheric_hpa: Option<f32>,
    pub tire_kpa: Option<f32>,
    pub tire_raw: Option<u32>,
    pub timestamp_ms: u64,
}

/// What the caller should do after an event.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Effect {
    None,
    Redraw,
    /// Redraw and write this model to flash.
    SaveCalibration(LinearCalibration),
}

/// Content of the display, independent of its layout.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Screen {
    QuickRead {
        tire_kpa: Option<f32>,
    },
    Detailed(SensorData),
    Calibration {
        active: bool,
        offset_kpa: f32,
        tire_kpa: Option<f32>,
    },
    Settings {
        min_kpa: f32,
        max_kpa: f32,
        offset_kpa: f32,
        read_interval_ms: u64,
    },
}

pub struct SystemController<'a, M: RawMutex> {
    mode: OperationMode,
    calibrating: bool,
    offset_kpa: f32,
    readings: SensorData,
    calibration: &'a SharedCalibration<M>,
    step_kpa: f32,
    read_interval_ms: u64,
}

impl<'a, M: RawMutex> SystemController<'a, M> {
    pub fn new(config: &GaugeConfig, calibration: &'a SharedCalibration<M>) -> Self {
        Self {
            mode: OperationMode::default(),
            calibrating: false,
            offset_kpa: calibration.snapshot().offset(),
            readings: SensorData::default(),
            calibration,
            step_kpa: config.calibration_step_kpa,
            read_interval_ms: config.read_interval_ms,
        }
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    pub fn readings(&self) -> &SensorData {
        &self.readings
    }

    pub fn handle_event(&mut self, event: ButtonEvent) -> Effect {
        debug!("Button {} {}", event.button, event.press);
        match (event.button, event.press) {
            (ButtonType::Mode, PressType::Short) => {
                self.mode = self.mode.next();
                info!("Mode: {}", self.mode.title());
                Effect::Redraw
            }
            (ButtonType::Mode, PressType::Long) => {
                if self.calibrating {
                    self.stop_calibration()
                } else {
                    self.start_calibration()
                }
            }
            (ButtonType::Mode, PressType::VeryLong) => {
                self.calibrating = false;
                self.apply_offset(0.0);
                info!("Calibration offset reset");
                Effect::SaveCalibration(self.calibration.snapshot())
            }
            (ButtonType::Up, _) if self.calibrating => {
                self.apply_offset(self.offset_kpa + self.step_kpa);
                Effect::Redraw
            }
            (ButtonType::Down, _) if self.calibrating => {
                self.apply_offset(self.offset_kpa - self.step_kpa);
                Effect::Redraw
            }
            _ => Effect::None,
        }
    }

    pub fn update_readings(&mut self, data: SensorData) {
        if data.temperature_c.is_none() || data.atmospheric_hpa.is_none() {
            warn!("BMP280 reading missing");
        }
        if data.tire_kpa.is_none() {
            warn!("SMP3011 reading missing");
        }
        self.readings = data;
    }

    pub fn screen(&self) -> Screen {
        if self.calibrating {
            return Screen::Calibration {
                active: true,
                offset_kpa: self.offset_kpa,
                tire_kpa: self.readings.tire_kpa,
            };
        }
        match self.mode {
            OperationMode::QuickRead => Screen::QuickRead {
                tire_kpa: self.readings.tire_kpa,
            },
            OperationMode::DetailedRead => Screen::Detailed(self.readings),
            OperationMode::Calibration => Screen::Calibration {
                active: false,
                offset_kpa: self.offset_kpa,
                tire_kpa: self.readings.tire_kpa,
            },
            OperationMode::Settings => {
                let model = self.calibration.snapshot();
                Screen::Settings {
                    min_kpa: model.minimum(),
                    max_kpa: model.maximum(),
                    offset_kpa: model.offset(),
                    read_interval_ms: self.read_interval_ms,
                }
            }
        }
    }

    fn start_calibration(&mut self) -> Effect {
        self.calibrating = true;
        self.offset_kpa = self.calibration.snapshot().offset();
        info!("Calibration started at offset {} kPa", self.offset_kpa);
        Effect::Redraw
    }

    fn stop_calibration(&mut self) -> Effect {
        self.calibrating = false;
        info!("Calibration finished, offset {} kPa", self.offset_kpa);
        Effect::SaveCalibration(self.calibration.snapshot())
    }

    fn apply_offset(&mut self, offset_kpa: f32) {
        self.offset_kpa = offset_kpa;
        self.calibration.set_offset(offset_kpa);
        debug!("Offset now {} kPa", offset_kpa);
    }
}
