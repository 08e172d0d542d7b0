//! Raw ADC sample assembly.
//!
//! Both sensors deliver their conversion result as three consecutive data
//! registers (MSB, LSB, XLSB). Only the upper bits are significant.

/// Uncompensated ADC code as read from a sensor's data registers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample(pub u32);

impl RawSample {
    /// Largest value of a 20-bit BMP280 sample.
    pub const BMP280_MAX: u32 = (1 << 20) - 1;
    /// Largest value of a 19-bit SMP3011 sample.
    pub const SMP3011_MAX: u32 = (1 << 19) - 1;

    /// Assembles a 20-bit BMP280 sample (`xlsb[7:4]` are the low bits).
    pub const fn from_bmp280_bytes(msb: u8, lsb: u8, xlsb: u8) -> Self {
        Self((msb as u32) << 12 | (lsb as u32) << 4 | (xlsb as u32) >> 4)
    }

    /// Assembles a 19-bit SMP3011 sample from a 24-bit register triple.
    pub const fn from_smp3011_bytes(msb: u8, lsb: u8, xlsb: u8) -> Self {
        Self(((msb as u32) << 16 | (lsb as u32) << 8 | xlsb as u32) >> 5)
    }

    /// The sample as the signed operand the BMP280 formulas expect.
    pub const fn as_i32(self) -> i32 {
        self.0 as i32
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bmp280_sample_drops_low_nibble() {
        // Datasheet example temperature code 519888 = 0x7EED0.
        assert_eq!(RawSample::from_bmp280_bytes(0x7E, 0xED, 0x00).value(), 519_888);
        assert_eq!(RawSample::from_bmp280_bytes(0x7E, 0xED, 0x0F).value(), 519_888);
        assert_eq!(
            RawSample::from_bmp280_bytes(0xFF, 0xFF, 0xFF).value(),
            RawSample::BMP280_MAX
        );
    }

    #[test]
    fn smp3011_sample_is_19_bits() {
        assert_eq!(
            RawSample::from_smp3011_bytes(0xFF, 0xFF, 0xFF).value(),
            RawSample::SMP3011_MAX
        );
        assert_eq!(RawSample::from_smp3011_bytes(0x00, 0x00, 0x1F).value(), 0);
        assert_eq!(RawSample::from_smp3011_bytes(0x00, 0x00, 0x20).value(), 1);
        assert_eq!(RawSample::from_smp3011_bytes(0x80, 0x00, 0x00).value(), 1 << 18);
    }
}
