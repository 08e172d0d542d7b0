pub mod calibration;
pub mod config;
pub mod registers;

use embedded_hal::{delay::DelayNs, i2c::I2c};

use crate::bmp280::{
    calibration::{Bmp280Calib, pa_q24_8_to_hpa},
    config::{Bmp280Config, PowerMode},
    registers::{
        BMP280_ADDR_PRIMARY, BMP280_ADDR_SECONDARY, BMP280_CHIP_ID, Bmp280Register, CALIB_LEN,
        DATA_LEN, STATUS_MEASURING,
    },
};
use crate::sample::RawSample;

/// Time the chip needs after a soft reset before its registers are readable.
const RESET_DELAY_MS: u32 = 10;
/// Status poll period and attempts while a forced conversion runs.
const FORCED_POLL_MS: u32 = 1;
const FORCED_POLL_LIMIT: u32 = 50;

/// Possible errors while talking to the BMP280.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bmp280Error {
    /// Soft reset command failed
    ResetFailed,
    /// Failed to read chip ID register
    ReadChipIdFailed,
    /// Chip ID is not 0x58 (not a BMP280)
    ReadChipIdMismatch,
    /// Failed to read calibration coefficients
    ReadCalibrationRegFailed,
    /// Failed to write configuration register (0xF5)
    SetConfFailed,
    /// Failed to write measurement control register (0xF4)
    SetMeasConfFailed,
    /// Failed to bulk read starting from register (0xF7)
    ReadFailed,
    /// `init` has not completed successfully
    NotInitialized,
    /// Forced conversion still running after the poll limit
    MeasurementTimeout,
}

/// One compensated BMP280 reading.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bmp280Measurement {
    pub temperature_c: f32,
    /// `None` when the calibration makes pressure compensation undefined.
    pub pressure_hpa: Option<f32>,
}

/// BMP280 driver (blocking I²C).
///
/// Owns the bus handle, the delay provider and, after [`Bmp280::init`], the
/// calibration coefficients read from the chip.
pub struct Bmp280<I2C, D> {
    i2c: I2C,
    delay: D,
    haddr: u8,
    calib: Option<Bmp280Calib>,
    config: Bmp280Config,
}

impl<I2C: I2c, D: DelayNs> Bmp280<I2C, D> {
    /// Creates a driver for the sensor on `i2c`.
    ///
    /// `sdo_gnd` selects address 0x76 (SDO tied to GND) or 0x77.
    pub fn new(i2c: I2C, delay: D, sdo_gnd: bool) -> Self {
        Self {
            i2c,
            delay,
            haddr: if sdo_gnd {
                BMP280_ADDR_PRIMARY
            } else {
                BMP280_ADDR_SECONDARY
            },
            calib: None,
            config: Bmp280Config::default(),
        }
    }

    /// Replaces the acquisition settings applied by [`Bmp280::init`].
    pub fn with_initial_config(mut self, config: Bmp280Config) -> Self {
        self.config = config;
        self
    }

    /// Initializes the sensor.
    ///
    /// 1. Soft reset (0xE0 ← 0xB6) and wait 10 ms
    /// 2. Verify chip ID (0xD0 == 0x58)
    /// 3. Read calibration coefficients
    /// 4. Write `config` and `ctrl_meas`
    pub fn init(&mut self) -> Result<(), Bmp280Error> {
        info!("Initializing BMP280 at {=u8:#x}", self.haddr);
        self.calib = None;

        self.i2c
            .write(self.haddr, &Bmp280Config::reset_write())
            .map_err(|_| {
                error!("Failed to perform soft reset");
                Bmp280Error::ResetFailed
            })?;
        self.delay.delay_ms(RESET_DELAY_MS);

        let mut chip_id = [0u8];
        self.i2c
            .write_read(self.haddr, &[Bmp280Register::Id.addr()], &mut chip_id)
            .map_err(|_| {
                error!("Failed to read chip ID");
                Bmp280Error::ReadChipIdFailed
            })?;
        if chip_id[0] != BMP280_CHIP_ID {
            error!(
                "Chip ID mismatch: expected {=u8:#x}, got {=u8:#x}",
                BMP280_CHIP_ID, chip_id[0]
            );
            return Err(Bmp280Error::ReadChipIdMismatch);
        }

        let calib = self.read_calib_data()?;
        debug!("Calibration coefficients: {:?}", calib);

        self.write_config(self.config)?;
        self.calib = Some(calib);
        info!("BMP280 initialized");
        Ok(())
    }

    /// Applies new acquisition settings to a running sensor.
    pub fn with_config(&mut self, config: Bmp280Config) -> Result<(), Bmp280Error> {
        self.write_config(config)?;
        self.config = config;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.calib.is_some()
    }

    /// Runs [`Bmp280::init`] unless it already succeeded.
    pub fn ensure_initialized(&mut self) -> Result<(), Bmp280Error> {
        if self.is_initialized() {
            return Ok(());
        }
        self.init()
    }

    pub fn calibration(&self) -> Option<&Bmp280Calib> {
        self.calib.as_ref()
    }

    /// Reads the 6 data bytes (pressure then temperature, MSB first).
    pub fn read_raw(&mut self) -> Result<[u8; DATA_LEN], Bmp280Error> {
        let mut raw = [0u8; DATA_LEN];
        self.i2c
            .write_read(self.haddr, &[Bmp280Register::PressMsb.addr()], &mut raw)
            .map_err(|_| {
                error!("BMP280 data read failed");
                Bmp280Error::ReadFailed
            })?;
        Ok(raw)
    }

    /// Reads and compensates one temperature/pressure pair.
    ///
    /// Both values come from the same burst so the fine temperature used for
    /// pressure matches the pressure sample. In forced mode a new conversion is
    /// started first and awaited through the `Status` register.
    pub fn read_data(&mut self) -> Result<Bmp280Measurement, Bmp280Error> {
        let calib = self.calib.ok_or(Bmp280Error::NotInitialized)?;
        if self.config.pmode == PowerMode::Forced {
            self.trigger_forced()?;
        }
        let raw = self.read_raw()?;

        let adc_p = RawSample::from_bmp280_bytes(raw[0], raw[1], raw[2]);
        let adc_t = RawSample::from_bmp280_bytes(raw[3], raw[4], raw[5]);

        let temp = calib.compensate_t_i32(adc_t.as_i32());
        let pressure = calib.compensate_p_i64(adc_p.as_i32(), temp.t_fine);
        if pressure.is_none() {
            warn!("Pressure compensation undefined for these coefficients");
        }

        let measurement = Bmp280Measurement {
            temperature_c: temp.celsius(),
            pressure_hpa: pressure.map(pa_q24_8_to_hpa),
        };
        trace!(
            "BMP280 raw T={} P={} -> {}",
            adc_t.value(),
            adc_p.value(),
            measurement
        );
        Ok(measurement)
    }

    /// Gives back the bus and delay provider.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn read_calib_data(&mut self) -> Result<Bmp280Calib, Bmp280Error> {
        let mut buffer = [0u8; CALIB_LEN];
        self.i2c
            .write_read(
                self.haddr,
                &[Bmp280Register::CalibStart.addr()],
                &mut buffer,
            )
            .map_err(|_| {
                error!("Failed to read calibration data");
                Bmp280Error::ReadCalibrationRegFailed
            })?;
        Ok(Bmp280Calib::from_bytes(&buffer))
    }

    /// The chip returns to sleep after each forced conversion, so every read
    /// rewrites `ctrl_meas` and waits for the measuring bit to clear.
    fn trigger_forced(&mut self) -> Result<(), Bmp280Error> {
        self.i2c
            .write(self.haddr, &self.config.ctrl_meas_write())
            .map_err(|_| {
                error!("Failed to start forced conversion");
                Bmp280Error::SetMeasConfFailed
            })?;

        let mut status = [0u8];
        for _ in 0..FORCED_POLL_LIMIT {
            self.delay.delay_ms(FORCED_POLL_MS);
            self.i2c
                .write_read(self.haddr, &[Bmp280Register::Status.addr()], &mut status)
                .map_err(|_| {
                    error!("BMP280 status read failed");
                    Bmp280Error::ReadFailed
                })?;
            if status[0] & STATUS_MEASURING == 0 {
                return Ok(());
            }
        }
        warn!("Forced conversion did not finish");
        Err(Bmp280Error::MeasurementTimeout)
    }

    fn write_config(&mut self, config: Bmp280Config) -> Result<(), Bmp280Error> {
        self.i2c
            .write(self.haddr, &config.config_write())
            .map_err(|_| {
                error!("Failed to set configuration setting");
                Bmp280Error::SetConfFailed
            })?;
        self.i2c
            .write(self.haddr, &config.ctrl_meas_write())
            .map_err(|_| {
                error!("Failed to set measurement setting");
                Bmp280Error::SetMeasConfFailed
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::{
        delay::NoopDelay,
        i2c::{Mock as I2cMock, Transaction as I2cTransaction},
    };

    const ADDR: u8 = BMP280_ADDR_PRIMARY;

    const CALIB: [u8; CALIB_LEN] = [
        0x70, 0x6B, 0x43, 0x67, 0x18, 0xFC, 0x7D, 0x8E, 0x43, 0xD6, 0xD0, 0x0B, 0x27, 0x0B, 0x8C,
        0x00, 0xF9, 0xFF, 0x8C, 0x3C, 0xF8, 0xC6, 0x70, 0x17,
    ];

    fn init_transactions() -> Vec<I2cTransaction> {
        vec![
            I2cTransaction::write(ADDR, vec![0xE0, 0xB6]),
            I2cTransaction::write_read(ADDR, vec![0xD0], vec![0x58]),
            I2cTransaction::write_read(ADDR, vec![0x88], CALIB.to_vec()),
            I2cTransaction::write(ADDR, vec![0xF5, 0x00]),
            I2cTransaction::write(ADDR, vec![0xF4, 0x57]),
        ]
    }

    #[test]
    fn init_reads_calibration_and_configures() {
        let i2c = I2cMock::new(&init_transactions());
        let mut bmp = Bmp280::new(i2c, NoopDelay::new(), true);
        bmp.init().unwrap();
        assert!(bmp.is_initialized());
        assert_eq!(bmp.calibration().unwrap().dig_t1, 27504);
        assert_eq!(bmp.calibration().unwrap().dig_p9, 6000);

        let (mut i2c, _) = bmp.release();
        i2c.done();
    }

    #[test]
    fn init_rejects_foreign_chip() {
        let i2c = I2cMock::new(&[
            I2cTransaction::write(ADDR, vec![0xE0, 0xB6]),
            // BME280 answers 0x60
            I2cTransaction::write_read(ADDR, vec![0xD0], vec![0x60]),
        ]);
        let mut bmp = Bmp280::new(i2c, NoopDelay::new(), true);
        assert_eq!(bmp.init(), Err(Bmp280Error::ReadChipIdMismatch));
        assert!(!bmp.is_initialized());

        let (mut i2c, _) = bmp.release();
        i2c.done();
    }

    #[test]
    fn init_maps_bus_errors_per_step() {
        let i2c = I2cMock::new(&[
            I2cTransaction::write(ADDR, vec![0xE0, 0xB6]).with_error(ErrorKind::Other)
        ]);
        let mut bmp = Bmp280::new(i2c, NoopDelay::new(), true);
        assert_eq!(bmp.init(), Err(Bmp280Error::ResetFailed));
        let (mut i2c, _) = bmp.release();
        i2c.done();

        let i2c = I2cMock::new(&[
            I2cTransaction::write(ADDR, vec![0xE0, 0xB6]),
            I2cTransaction::write_read(ADDR, vec![0xD0], vec![0x58]),
            I2cTransaction::write_read(ADDR, vec![0x88], CALIB.to_vec())
                .with_error(ErrorKind::Other),
        ]);
        let mut bmp = Bmp280::new(i2c, NoopDelay::new(), true);
        assert_eq!(bmp.init(), Err(Bmp280Error::ReadCalibrationRegFailed));
        let (mut i2c, _) = bmp.release();
        i2c.done();
    }

    #[test]
    fn read_before_init_is_refused() {
        let i2c = I2cMock::new(&[]);
        let mut bmp = Bmp280::new(i2c, NoopDelay::new(), false);
        assert_eq!(bmp.read_data(), Err(Bmp280Error::NotInitialized));
        let (mut i2c, _) = bmp.release();
        i2c.done();
    }

    #[test]
    fn read_data_compensates_datasheet_sample() {
        let mut expectations = init_transactions();
        // adc_P = 415148 (0x655AC), adc_T = 519888 (0x7EED0)
        expectations.push(I2cTransaction::write_read(
            ADDR,
            vec![0xF7],
            vec![0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00],
        ));
        let i2c = I2cMock::new(&expectations);
        let mut bmp = Bmp280::new(i2c, NoopDelay::new(), true);
        bmp.init().unwrap();

        let m = bmp.read_data().unwrap();
        assert_eq!(m.temperature_c, 25.08);
        let hpa = m.pressure_hpa.unwrap();
        assert!((hpa - 1006.5325).abs() < 0.001);

        let (mut i2c, _) = bmp.release();
        i2c.done();
    }

    #[test]
    fn failed_read_leaves_driver_usable() {
        let mut expectations = init_transactions();
        expectations.push(
            I2cTransaction::write_read(ADDR, vec![0xF7], vec![0; 6]).with_error(ErrorKind::Other),
        );
        expectations.push(I2cTransaction::write_read(
            ADDR,
            vec![0xF7],
            vec![0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00],
        ));
        let i2c = I2cMock::new(&expectations);
        let mut bmp = Bmp280::new(i2c, NoopDelay::new(), true);
        bmp.init().unwrap();

        assert_eq!(bmp.read_data(), Err(Bmp280Error::ReadFailed));
        assert_eq!(bmp.read_data().unwrap().temperature_c, 25.08);

        let (mut i2c, _) = bmp.release();
        i2c.done();
    }

    fn weather_init_transactions() -> Vec<I2cTransaction> {
        let mut t = init_transactions();
        t.truncate(3);
        t.push(I2cTransaction::write(ADDR, vec![0xF5, 0x00]));
        // Tx1 | Px1 | forced
        t.push(I2cTransaction::write(ADDR, vec![0xF4, 0x25]));
        t
    }

    fn weather_sensor(i2c: I2cMock) -> Bmp280<I2cMock, NoopDelay> {
        Bmp280::new(i2c, NoopDelay::new(), true).with_initial_config(Bmp280Config::from_preset(
            config::Bmp280ConfigPreset::Weather,
            config::StdByTime::StdBy0_5,
        ))
    }

    #[test]
    fn forced_mode_triggers_a_conversion_per_read() {
        let mut expectations = weather_init_transactions();
        for _ in 0..2 {
            expectations.extend([
                I2cTransaction::write(ADDR, vec![0xF4, 0x25]),
                I2cTransaction::write_read(ADDR, vec![0xF3], vec![0x08]),
                I2cTransaction::write_read(ADDR, vec![0xF3], vec![0x00]),
                I2cTransaction::write_read(
                    ADDR,
                    vec![0xF7],
                    vec![0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00],
                ),
            ]);
        }
        let i2c = I2cMock::new(&expectations);
        let mut bmp = weather_sensor(i2c);
        bmp.init().unwrap();

        assert_eq!(bmp.read_data().unwrap().temperature_c, 25.08);
        assert_eq!(bmp.read_data().unwrap().temperature_c, 25.08);

        let (mut i2c, _) = bmp.release();
        i2c.done();
    }

    #[test]
    fn forced_conversion_that_never_ends_times_out() {
        let mut expectations = weather_init_transactions();
        expectations.push(I2cTransaction::write(ADDR, vec![0xF4, 0x25]));
        for _ in 0..FORCED_POLL_LIMIT {
            // im_update set as well, only bit 3 matters
            expectations.push(I2cTransaction::write_read(ADDR, vec![0xF3], vec![0x09]));
        }
        let i2c = I2cMock::new(&expectations);
        let mut bmp = weather_sensor(i2c);
        bmp.init().unwrap();

        assert_eq!(bmp.read_data(), Err(Bmp280Error::MeasurementTimeout));

        let (mut i2c, _) = bmp.release();
        i2c.done();
    }

    #[test]
    fn forced_trigger_failure_is_reported() {
        let mut expectations = weather_init_transactions();
        expectations
            .push(I2cTransaction::write(ADDR, vec![0xF4, 0x25]).with_error(ErrorKind::Other));
        let i2c = I2cMock::new(&expectations);
        let mut bmp = weather_sensor(i2c);
        bmp.init().unwrap();

        assert_eq!(bmp.read_data(), Err(Bmp280Error::SetMeasConfFailed));

        let (mut i2c, _) = bmp.release();
        i2c.done();
    }

    #[test]
    fn ensure_initialized_retries_after_failure() {
        let mut expectations = vec![
            I2cTransaction::write(ADDR, vec![0xE0, 0xB6]).with_error(ErrorKind::Other),
        ];
        expectations.extend(init_transactions());
        let i2c = I2cMock::new(&expectations);
        let mut bmp = Bmp280::new(i2c, NoopDelay::new(), true);

        assert_eq!(bmp.ensure_initialized(), Err(Bmp280Error::ResetFailed));
        assert!(!bmp.is_initialized());
        bmp.ensure_initialized().unwrap();
        assert!(bmp.is_initialized());
        // No bus traffic once initialized
        bmp.ensure_initialized().unwrap();

        let (mut i2c, _) = bmp.release();
        i2c.done();
    }

    #[test]
    fn with_config_rewrites_registers() {
        let i2c = I2cMock::new(&[
            I2cTransaction::write(ADDR, vec![0xF5, 0xA0 | 0x10]),
            I2cTransaction::write(ADDR, vec![0xF4, 0x40 | 0x14 | 0x03]),
        ]);
        let mut bmp = Bmp280::new(i2c, NoopDelay::new(), true);
        let cfg = Bmp280Config::from_preset(
            config::Bmp280ConfigPreset::Indoor,
            config::StdByTime::StdBy1000,
        );
        bmp.with_config(cfg).unwrap();
        let (mut i2c, _) = bmp.release();
        i2c.done();
    }
}
