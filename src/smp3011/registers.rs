/// SMP3011 register map.
///
/// The data registers hold one 24-bit conversion result, MSB first, of which
/// the top 19 bits are significant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Smp3011Register {
    DataMsb = 0x00,
    DataLsb = 0x01,
    DataXlsb = 0x02,
    Status = 0x07,
    // writing START_MEASUREMENT triggers one conversion
    Control = 0x08,
    WhoAmI = 0x0F,
}

impl Smp3011Register {
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

/// Default 7-bit bus address.
pub const SMP3011_ADDR: u8 = 0x78;
/// Expected `WhoAmI` content. Only checked in the diagnostic dump.
pub const SMP3011_WHO_AM_I: u8 = 0x30;

/// Idle control value written during init.
pub const CONTROL_IDLE: u8 = 0x00;
pub const START_MEASUREMENT: u8 = 0x01;

/// Conversion time after `START_MEASUREMENT`.
pub const CONVERSION_DELAY_MS: u32 = 15;

pub const DATA_LEN: usize = 3;
/// Registers covered by a diagnostic dump (`0x00..=0x0F`).
pub const DUMP_LEN: usize = 16;
