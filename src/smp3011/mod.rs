pub mod calibration;
pub mod registers;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::{delay::DelayNs, i2c::I2c};

use crate::sample::RawSample;
use crate::smp3011::{
    calibration::{CalibrationError, SharedCalibration},
    registers::{
        CONTROL_IDLE, CONVERSION_DELAY_MS, DATA_LEN, DUMP_LEN, SMP3011_WHO_AM_I, START_MEASUREMENT,
        Smp3011Register,
    },
};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Smp3011Error {
    /// Sensor did not answer the control register read
    CommunicationFailed,
    /// Failed to write the control register during init
    ConfigureFailed,
    /// Start-measurement command was not acknowledged
    StartMeasurementFailed,
    /// Failed to read the data registers
    ReadFailed,
    NotInitialized,
    Calibration(CalibrationError),
}

impl From<CalibrationError> for Smp3011Error {
    fn from(e: CalibrationError) -> Self {
        Self::Calibration(e)
    }
}

/// SMP3011 driver (blocking I²C).
///
/// Conversion to kPa goes through a [`SharedCalibration`] that other tasks
/// may adjust while the driver is running.
pub struct Smp3011<'a, I2C, D, M: RawMutex> {
    i2c: I2C,
    delay: D,
    haddr: u8,
    calibration: &'a SharedCalibration<M>,
    initialized: bool,
}

impl<'a, I2C: I2c, D: DelayNs, M: RawMutex> Smp3011<'a, I2C, D, M> {
    pub fn new(i2c: I2C, delay: D, haddr: u8, calibration: &'a SharedCalibration<M>) -> Self {
        Self {
            i2c,
            delay,
            haddr,
            calibration,
            initialized: false,
        }
    }

    /// Reads the control register and puts the sensor in its idle state.
    pub fn init(&mut self) -> Result<(), Smp3011Error> {
        info!("Initializing SMP3011 at {=u8:#x}", self.haddr);
        self.initialized = false;

        let mut control = [0u8];
        self.i2c
            .write_read(self.haddr, &[Smp3011Register::Control.addr()], &mut control)
            .map_err(|_| {
                error!("SMP3011 not responding");
                Smp3011Error::CommunicationFailed
            })?;
        debug!("SMP3011 control register: {=u8:#x}", control[0]);

        self.i2c
            .write(self.haddr, &[Smp3011Register::Control.addr(), CONTROL_IDLE])
            .map_err(|_| {
                error!("Failed to configure SMP3011");
                Smp3011Error::ConfigureFailed
            })?;

        self.initialized = true;
        let model = self.calibration.snapshot();
        info!(
            "SMP3011 initialized, range {}..{} kPa",
            model.minimum(),
            model.maximum()
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Runs [`Smp3011::init`] unless it already succeeded.
    pub fn ensure_initialized(&mut self) -> Result<(), Smp3011Error> {
        if self.initialized {
            return Ok(());
        }
        self.init()
    }

    /// Triggers one conversion and returns the 19-bit result.
    ///
    /// Blocks on the delay provider for the conversion time. Async callers
    /// use [`Smp3011::start_measurement`] and [`Smp3011::fetch_raw`] with a
    /// timer in between.
    pub fn read_raw(&mut self) -> Result<RawSample, Smp3011Error> {
        self.start_measurement()?;
        self.delay.delay_ms(CONVERSION_DELAY_MS);
        self.fetch_raw()
    }

    /// Starts a conversion. The result is ready after
    /// [`CONVERSION_DELAY_MS`](registers::CONVERSION_DELAY_MS).
    pub fn start_measurement(&mut self) -> Result<(), Smp3011Error> {
        if !self.initialized {
            return Err(Smp3011Error::NotInitialized);
        }
        self.i2c
            .write(
                self.haddr,
                &[Smp3011Register::Control.addr(), START_MEASUREMENT],
            )
            .map_err(|_| {
                error!("Failed to start SMP3011 measurement");
                Smp3011Error::StartMeasurementFailed
            })
    }

    /// Reads the result of the last conversion.
    pub fn fetch_raw(&mut self) -> Result<RawSample, Smp3011Error> {
        if !self.initialized {
            return Err(Smp3011Error::NotInitialized);
        }
        let mut data = [0u8; DATA_LEN];
        self.i2c
            .write_read(self.haddr, &[Smp3011Register::DataMsb.addr()], &mut data)
            .map_err(|_| {
                error!("SMP3011 data read failed");
                Smp3011Error::ReadFailed
            })?;
        Ok(RawSample::from_smp3011_bytes(data[0], data[1], data[2]))
    }

    /// Tire pressure in kPa.
    pub fn read_pressure(&mut self) -> Result<f32, Smp3011Error> {
        self.read_pressure_detailed().map(|(kpa, _)| kpa)
    }

    /// Tire pressure in kPa together with the raw code it came from.
    pub fn read_pressure_detailed(&mut self) -> Result<(f32, u32), Smp3011Error> {
        let raw = self.read_raw()?;
        Ok(self.convert(raw))
    }

    /// Like [`Smp3011::read_pressure_detailed`] for a conversion started
    /// earlier with [`Smp3011::start_measurement`].
    pub fn fetch_pressure_detailed(&mut self) -> Result<(f32, u32), Smp3011Error> {
        let raw = self.fetch_raw()?;
        Ok(self.convert(raw))
    }

    fn convert(&self, raw: RawSample) -> (f32, u32) {
        let kpa = self.calibration.convert(raw.value());
        trace!("SMP3011 raw {} -> {} kPa", raw.value(), kpa);
        (kpa, raw.value())
    }

    pub fn set_pressure_range(&self, min_kpa: f32, max_kpa: f32) -> Result<(), Smp3011Error> {
        self.calibration.set_range(min_kpa, max_kpa).map_err(|e| {
            error!("Rejected pressure range {}..{}", min_kpa, max_kpa);
            Smp3011Error::from(e)
        })?;
        info!("Pressure range set to {}..{} kPa", min_kpa, max_kpa);
        Ok(())
    }

    pub fn set_pressure_offset(&self, offset_kpa: f32) {
        self.calibration.set_offset(offset_kpa);
        info!("Pressure offset set to {} kPa", offset_kpa);
    }

    /// Reads registers `0x00..=0x0F` one by one and logs them.
    pub fn dump_registers(&mut self) -> Result<[u8; DUMP_LEN], Smp3011Error> {
        let mut regs = [0u8; DUMP_LEN];
        for (reg, value) in regs.iter_mut().enumerate() {
            let mut byte = [0u8];
            self.i2c
                .write_read(self.haddr, &[reg as u8], &mut byte)
                .map_err(|_| Smp3011Error::CommunicationFailed)?;
            *value = byte[0];
            debug!("SMP3011 reg {=u8:#x} = {=u8:#x}", reg as u8, byte[0]);
        }

        let who_am_i = regs[Smp3011Register::WhoAmI.addr() as usize];
        if who_am_i != SMP3011_WHO_AM_I {
            warn!(
                "SMP3011 WHO_AM_I is {=u8:#x}, expected {=u8:#x}",
                who_am_i, SMP3011_WHO_AM_I
            );
        }
        Ok(regs)
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
}
