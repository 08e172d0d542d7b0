//! BMP280 calibration coefficients and compensation formulas.
//!
//! The factory trimming block (registers 0x88–0xA1) holds twelve 16-bit words
//! that turn the raw 20-bit ADC codes into physical values. The integer
//! formulas below follow the Bosch BMP280 datasheet (BST-BMP280-DS001,
//! section 3.11.3) operation for operation: the shifts stand in for the
//! divisions of the floating-point polynomial, so any reordering changes the
//! rounding and the result.

use crate::bmp280::registers::CALIB_LEN;

/// Factory-trimmed calibration coefficients (`dig_T*` and `dig_P*`).
///
/// Decoded once from the little-endian calibration block and never changed
/// afterwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bmp280Calib {
    /// Temperature coefficient 1 (unsigned, typically ~27000–28000)
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    /// Pressure coefficient 1 (unsigned, typically ~30000–37000)
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
}

/// Result of the temperature compensation step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CompensatedTemperature {
    /// Fine temperature carried into pressure compensation.
    pub t_fine: i32,
    /// Temperature in 1/100 °C (2508 = 25.08 °C).
    pub centi_celsius: i32,
}

impl CompensatedTemperature {
    pub fn celsius(&self) -> f32 {
        self.centi_celsius as f32 / 100.0
    }
}

impl Bmp280Calib {
    /// Decodes the 24-byte block read from `CalibStart`.
    pub fn from_bytes(buffer: &[u8; CALIB_LEN]) -> Self {
        let u = |i: usize| u16::from_le_bytes([buffer[i], buffer[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([buffer[i], buffer[i + 1]]);
        Self {
            dig_t1: u(0),
            dig_t2: s(2),
            dig_t3: s(4),
            dig_p1: u(6),
            dig_p2: s(8),
            dig_p3: s(10),
            dig_p4: s(12),
            dig_p5: s(14),
            dig_p6: s(16),
            dig_p7: s(18),
            dig_p8: s(20),
            dig_p9: s(22),
        }
    }

    /// Compensates a raw 20-bit temperature code (`adc_T`).
    ///
    /// 32-bit signed arithmetic throughout; `>>` on `i32` is arithmetic, so
    /// the negative intermediates seen below ~15 °C keep their sign. Products
    /// wrap in two's complement like the datasheet's C code, so out-of-range
    /// codes give a defined value instead of an overflow.
    pub fn compensate_t_i32(&self, adc_t: i32) -> CompensatedTemperature {
        let t1 = self.dig_t1 as i32;
        let t2 = self.dig_t2 as i32;
        let t3 = self.dig_t3 as i32;

        let var1 = (adc_t >> 3).wrapping_sub(t1 << 1).wrapping_mul(t2) >> 11;
        let d = (adc_t >> 4).wrapping_sub(t1);
        let var2 = (d.wrapping_mul(d) >> 12).wrapping_mul(t3) >> 14;

        let t_fine = var1.wrapping_add(var2);
        CompensatedTemperature {
            t_fine,
            centi_celsius: t_fine.wrapping_mul(5).wrapping_add(128) >> 8,
        }
    }

    /// Compensates a raw 20-bit pressure code (`adc_P`) using the fine
    /// temperature from the same measurement.
    ///
    /// Returns pressure in Pa as unsigned Q24.8 (`25767233` = 100653.25 Pa),
    /// or `None` when the coefficients drive the divisor to zero. The datasheet
    /// returns 0 in that case; `unwrap_or(0)` gives the same value.
    pub fn compensate_p_i64(&self, adc_p: i32, t_fine: i32) -> Option<u32> {
        let p1 = self.dig_p1 as i64;
        let p2 = self.dig_p2 as i64;
        let p3 = self.dig_p3 as i64;
        let p4 = self.dig_p4 as i64;
        let p5 = self.dig_p5 as i64;
        let p6 = self.dig_p6 as i64;
        let p7 = self.dig_p7 as i64;
        let p8 = self.dig_p8 as i64;
        let p9 = self.dig_p9 as i64;

        let mut var1 = t_fine as i64 - 128_000;
        let mut var2 = var1.wrapping_mul(var1).wrapping_mul(p6);
        var2 = var2.wrapping_add(var1.wrapping_mul(p5) << 17);
        var2 = var2.wrapping_add(p4 << 35);
        var1 = (var1.wrapping_mul(var1).wrapping_mul(p3) >> 8)
            .wrapping_add(var1.wrapping_mul(p2) << 12);
        var1 = (1_i64 << 47).wrapping_add(var1).wrapping_mul(p1) >> 33;

        if var1 == 0 {
            return None;
        }

        let mut p = 1_048_576 - adc_p as i64;
        // Integer division truncates toward zero, as in C.
        p = (p << 31).wrapping_sub(var2).wrapping_mul(3125).wrapping_div(var1);
        var1 = p9.wrapping_mul(p >> 13).wrapping_mul(p >> 13) >> 25;
        var2 = p8.wrapping_mul(p) >> 19;
        p = (p.wrapping_add(var1).wrapping_add(var2) >> 8).wrapping_add(p7 << 4);

        Some(p as u32)
    }
}

/// Converts a Q24.8 pascal value to hectopascal.
pub fn pa_q24_8_to_hpa(pressure: u32) -> f32 {
    pressure as f32 / 25600.0
}
