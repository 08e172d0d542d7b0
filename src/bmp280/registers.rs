/// BMP280 register map (Bosch BMP280 datasheet, section 4.3).
///
/// Only the registers the gauge touches are listed. The data registers
/// auto-increment, so a burst read from `PressMsb` returns pressure followed by
/// temperature (6 bytes) and a burst from `CalibStart` returns all 24
/// calibration bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Bmp280Register {
    TempXlsb = 0xFC,
    TempLsb = 0xFB,
    TempMsb = 0xFA,
    PressXlsb = 0xF9,
    PressLsb = 0xF8,
    PressMsb = 0xF7,
    // t_sb[7:5], filter[4:2], spi3w_en[0]
    Config = 0xF5,
    // osrs_t[7:5], osrs_p[4:2], mode[1:0]
    CtrlMeas = 0xF4,
    // bit 3 - measuring, bit 0 - im_update
    Status = 0xF3,
    Reset = 0xE0,
    Id = 0xD0,
    // dig_T1 LSB; the block runs to 0xA1
    CalibStart = 0x88,
}

impl Bmp280Register {
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

/// Writing this to `Reset` triggers the power-on-reset sequence.
pub const BMP280_RESET_REG_VALUE: u8 = 0xB6;
/// Expected content of the `Id` register.
pub const BMP280_CHIP_ID: u8 = 0x58;
/// Address with SDO tied to GND.
pub const BMP280_ADDR_PRIMARY: u8 = 0x76;
/// Address with SDO tied to VDDIO.
pub const BMP280_ADDR_SECONDARY: u8 = 0x77;

pub const CALIB_LEN: usize = 24;
pub const DATA_LEN: usize = 6;

/// `Status` bit set while a conversion is running.
pub const STATUS_MEASURING: u8 = 0x08;
