//! Linear calibration model for the SMP3011 tire-pressure sensor.
//!
//! The sensor's 19-bit code maps linearly onto a configured pressure span.
//! A separate offset absorbs the bias found after installation, so the
//! operator can nudge it in the field without touching the span.

use core::cell::Cell;

use embassy_sync::blocking_mutex::{Mutex, raw::RawMutex};

use crate::sample::RawSample;

/// Full-scale raw code of the 19-bit sensor.
pub const RAW_FULL_SCALE: f32 = RawSample::SMP3011_MAX as f32;

/// Default span: 0–1000 kPa (~145 psi).
pub const DEFAULT_MIN_KPA: f32 = 0.0;
pub const DEFAULT_MAX_KPA: f32 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    /// `min` must be strictly below `max`
    InvalidRange { min: f32, max: f32 },
}

/// Range + offset conversion from raw code to kPa.
///
/// `scale_factor` is always derived from the range; there is no way to set it
/// on its own.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinearCalibration {
    minimum: f32,
    maximum: f32,
    scale_factor: f32,
    offset: f32,
}

impl LinearCalibration {
    pub fn new(min: f32, max: f32) -> Result<Self, CalibrationError> {
        let mut model = Self::default();
        model.set_range(min, max)?;
        Ok(model)
    }

    /// Sets the measurement span and recomputes the scale factor.
    ///
    /// Rejects `min >= max` (and NaN bounds) without modifying `self`. The
    /// offset is left alone.
    pub fn set_range(&mut self, min: f32, max: f32) -> Result<(), CalibrationError> {
        if min.is_nan() || max.is_nan() || min >= max {
            return Err(CalibrationError::InvalidRange { min, max });
        }
        self.minimum = min;
        self.maximum = max;
        self.scale_factor = (max - min) / RAW_FULL_SCALE;
        Ok(())
    }

    /// Stores the offset as given; clamping happens in [`Self::convert`].
    pub fn set_offset(&mut self, offset: f32) {
        self.offset = offset;
    }

    /// Converts a raw code to kPa, clamped to `[minimum, maximum]`.
    ///
    /// A NaN result (NaN offset) maps to `minimum`.
    pub fn convert(&self, raw: u32) -> f32 {
        let pressure = self.minimum + raw as f32 * self.scale_factor + self.offset;
        if pressure.is_nan() || pressure < self.minimum {
            self.minimum
        } else if pressure > self.maximum {
            self.maximum
        } else {
            pressure
        }
    }

    pub fn minimum(&self) -> f32 {
        self.minimum
    }

    pub fn maximum(&self) -> f32 {
        self.maximum
    }

    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }
}

impl Default for LinearCalibration {
    fn default() -> Self {
        Self {
            minimum: DEFAULT_MIN_KPA,
            maximum: DEFAULT_MAX_KPA,
            scale_factor: (DEFAULT_MAX_KPA - DEFAULT_MIN_KPA) / RAW_FULL_SCALE,
            offset: 0.0,
        }
    }
}

/// A [`LinearCalibration`] shared between the calibration UI and the reader.
///
/// Every access copies or replaces the whole model inside one critical
/// section, so a conversion never sees half of an update.
pub struct SharedCalibration<M: RawMutex> {
    inner: Mutex<M, Cell<LinearCalibration>>,
}

impl<M: RawMutex> SharedCalibration<M> {
    pub const fn new(model: LinearCalibration) -> Self {
        Self {
            inner: Mutex::new(Cell::new(model)),
        }
    }

    /// Copy of the current model.
    pub fn snapshot(&self) -> LinearCalibration {
        self.inner.lock(|cell| cell.get())
    }

    /// Replaces the whole model.
    pub fn replace(&self, model: LinearCalibration) {
        self.inner.lock(|cell| cell.set(model));
    }

    pub fn set_range(&self, min: f32, max: f32) -> Result<(), CalibrationError> {
        self.inner.lock(|cell| {
            let mut model = cell.get();
            model.set_range(min, max)?;
            cell.set(model);
            Ok(())
        })
    }

    pub fn set_offset(&self, offset: f32) {
        self.inner.lock(|cell| {
            let mut model = cell.get();
            model.set_offset(offset);
            cell.set(model);
        });
    }

    /// Adds `delta` to the offset and returns the new value.
    pub fn adjust_offset(&self, delta: f32) -> f32 {
        self.inner.lock(|cell| {
            let mut model = cell.get();
            model.set_offset(model.offset() + delta);
            cell.set(model);
            model.offset()
        })
    }

    pub fn convert(&self, raw: u32) -> f32 {
        self.snapshot().convert(raw)
    }
}

impl<M: RawMutex> Default for SharedCalibration<M> {
    fn default() -> Self {
        Self::new(LinearCalibration::default())
    }
}
