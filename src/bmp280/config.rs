use crate::bmp280::registers::{BMP280_RESET_REG_VALUE, Bmp280Register};

/// Pressure oversampling (`osrs_p`, ctrl_meas bits 4:2), pre-shifted.
///
/// | Variant | Resolution | Typ. conversion |
/// |---------|------------|-----------------|
/// | Px1UL   | 16 bit     | ~5.5 ms         |
/// | Px2L    | 17 bit     | ~7.5 ms         |
/// | Px4STD  | 18 bit     | ~11.5 ms        |
/// | Px8H    | 19 bit     | ~19.5 ms        |
/// | Px16UH  | 20 bit     | ~37.5 ms        |
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PressOversampling {
    Skipped = 0x00,
    Px1UL = 0x04,
    Px2L = 0x08,
    Px4STD = 0x0C,
    Px8H = 0x10,
    Px16UH = 0x14,
}

/// Temperature oversampling (`osrs_t`, ctrl_meas bits 7:5), pre-shifted.
///
/// Temperature is always converted before pressure; ×2 is enough for the
/// fine temperature used in pressure compensation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TempOversampling {
    Skipped = 0x00,
    Tx1UL = 0x20,
    Tx2L = 0x40,
    Tx4STD = 0x60,
    Tx8H = 0x80,
    Tx16UH = 0xA0,
}

/// Power mode (ctrl_meas bits 1:0).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PowerMode {
    Sleep = 0x0,
    Forced = 0x1,
    Normal = 0x3,
}

/// IIR filter coefficient (config bits 4:2), pre-shifted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum IIRFilter {
    IIROff = 0x00,
    IIRx2 = 0x04,
    IIRx4 = 0x08,
    IIRx8 = 0x0C,
    IIRx16 = 0x10,
}

/// Normal-mode standby between conversions (config bits 7:5), pre-shifted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StdByTime {
    StdBy0_5 = 0x00,
    StdBy62_5 = 0x20,
    StdBy125 = 0x40,
    StdBy250 = 0x60,
    StdBy500 = 0x80,
    StdBy1000 = 0xA0,
    StdBy2000 = 0xC0,
    StdBy4000 = 0xE0,
}

/// Use-case presets from datasheet section 3.4, table 7.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bmp280ConfigPreset {
    /// Handheld, low power: ×2 / ×16, normal, IIR ×4.
    HandheldLowPower,
    /// Handheld, dynamic: ×1 / ×4, normal, IIR ×16.
    HandheldDynamic,
    /// Weather monitoring: ×1 / ×1, forced, no filter.
    Weather,
    /// Indoor navigation: ×2 / ×16, normal, IIR ×16.
    Indoor,
}

/// Sensor acquisition settings, written to `config` and `ctrl_meas`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Bmp280Config {
    pub tovrs: TempOversampling,
    pub povrs: PressOversampling,
    pub pmode: PowerMode,
    pub iir: IIRFilter,
    pub stdby: StdByTime,
}

impl Bmp280Config {
    pub const fn new(
        tovrs: TempOversampling,
        povrs: PressOversampling,
        pmode: PowerMode,
        iir: IIRFilter,
        stdby: StdByTime,
    ) -> Self {
        Self {
            tovrs,
            povrs,
            pmode,
            iir,
            stdby,
        }
    }

    /// Gauge default: temperature ×2, pressure ×16, normal mode, no filter,
    /// 0.5 ms standby. The display only refreshes every two seconds, so the
    /// sensor simply free-runs at its highest rate.
    pub const fn gauge_default() -> Self {
        Self::new(
            TempOversampling::Tx2L,
            PressOversampling::Px16UH,
            PowerMode::Normal,
            IIRFilter::IIROff,
            StdByTime::StdBy0_5,
        )
    }

    pub const fn from_preset(preset: Bmp280ConfigPreset, stdby: StdByTime) -> Self {
        match preset {
            Bmp280ConfigPreset::HandheldLowPower => Self::new(
                TempOversampling::Tx2L,
                PressOversampling::Px16UH,
                PowerMode::Normal,
                IIRFilter::IIRx4,
                stdby,
            ),
            Bmp280ConfigPreset::HandheldDynamic => Self::new(
                TempOversampling::Tx1UL,
                PressOversampling::Px4STD,
                PowerMode::Normal,
                IIRFilter::IIRx16,
                stdby,
            ),
            Bmp280ConfigPreset::Weather => Self::new(
                TempOversampling::Tx1UL,
                PressOversampling::Px1UL,
                PowerMode::Forced,
                IIRFilter::IIROff,
                stdby,
            ),
            Bmp280ConfigPreset::Indoor => Self::new(
                TempOversampling::Tx2L,
                PressOversampling::Px16UH,
                PowerMode::Normal,
                IIRFilter::IIRx16,
                stdby,
            ),
        }
    }

    pub const fn with_povrs(mut self, povrs: PressOversampling) -> Self {
        self.povrs = povrs;
        self
    }

    pub const fn with_tovrs(mut self, tovrs: TempOversampling) -> Self {
        self.tovrs = tovrs;
        self
    }

    pub const fn with_pmode(mut self, pmode: PowerMode) -> Self {
        self.pmode = pmode;
        self
    }

    pub const fn with_filter(mut self, iir: IIRFilter) -> Self {
        self.iir = iir;
        self
    }

    pub const fn with_stdby_time(mut self, stdby: StdByTime) -> Self {
        self.stdby = stdby;
        self
    }

    /// `[register, value]` for the `config` register (0xF5).
    pub const fn config_write(&self) -> [u8; 2] {
        [
            Bmp280Register::Config.addr(),
            self.stdby as u8 | self.iir as u8,
        ]
    }

    /// `[register, value]` for the `ctrl_meas` register (0xF4).
    pub const fn ctrl_meas_write(&self) -> [u8; 2] {
        [
            Bmp280Register::CtrlMeas.addr(),
            self.tovrs as u8 | self.povrs as u8 | self.pmode as u8,
        ]
    }

    /// `[register, value]` for a soft reset.
    pub const fn reset_write() -> [u8; 2] {
        [Bmp280Register::Reset.addr(), BMP280_RESET_REG_VALUE]
    }
}

impl Default for Bmp280Config {
    fn default() -> Self {
        Self::gauge_default()
    }
}
