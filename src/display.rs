//! Text rendering of controller screens.
//!
//! 128x64 panel, four lines of `FONT_6X10` (21 columns).

use core::fmt::Write;

use embedded_graphics::{
    mono_font::{MonoTextStyle, ascii::FONT_6X10},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use heapless::String;

use crate::controller::Screen;

pub const LINE_COUNT: usize = 4;
pub const LINE_WIDTH: usize = 24;
const LINE_PITCH: i32 = 16;

const KPA_TO_PSI: f32 = 0.145_037_74;

pub type Line = String<LINE_WIDTH>;

/// Formats `screen` as four text lines.
///
/// Text that does not fit a line is cut off.
pub fn lines(screen: &Screen) -> [Line; LINE_COUNT] {
    let mut out: [Line; LINE_COUNT] = Default::default();
    // Overflow only truncates, so write errors are dropped.
    match *screen {
        Screen::QuickRead { tire_kpa } => {
            let _ = out[0].push_str("TIRE PRESSURE");
            match tire_kpa {
                Some(kpa) => {
                    let _ = write!(out[2], "{:.1} kPa", kpa);
                    let _ = write!(out[3], "{:.1} psi", kpa * KPA_TO_PSI);
                }
                None => {
                    let _ = out[2].push_str("--- kPa");
                }
            }
        }
        Screen::Detailed(data) => {
            let _ = out[0].push_str("DETAILED");
            let _ = out[1].push_str("Tire ");
            push_value(&mut out[1], data.tire_kpa, "kPa");
            let _ = out[2].push_str("Atm ");
            push_value(&mut out[2], data.atmospheric_hpa, "hPa");
            let _ = out[3].push_str("Temp ");
            push_value(&mut out[3], data.temperature_c, "C");
        }
        Screen::Calibration {
            active,
            offset_kpa,
            tire_kpa,
        } => {
            let _ = out[0].push_str(if active {
                "CALIBRATION ON"
            } else {
                "CALIBRATION"
            });
            let _ = write!(out[1], "Offset {:+.1} kPa", offset_kpa);
            let _ = out[2].push_str("Tire ");
            push_value(&mut out[2], tire_kpa, "kPa");
            let _ = out[3].push_str(if active {
                "UP/DOWN adjust"
            } else {
                "Hold MODE to start"
            });
        }
        Screen::Settings {
            min_kpa,
            max_kpa,
            offset_kpa,
            read_interval_ms,
        } => {
            let _ = out[0].push_str("SETTINGS");
            let _ = write!(out[1], "Range {:.0}-{:.0} kPa", min_kpa, max_kpa);
            let _ = write!(out[2], "Offset {:+.1} kPa", offset_kpa);
            let _ = write!(out[3], "Every {} ms", read_interval_ms);
        }
    }
    out
}

fn push_value(line: &mut Line, value: Option<f32>, unit: &str) {
    let _ = match value {
        Some(v) => write!(line, "{:.1} {}", v, unit),
        None => write!(line, "--- {}", unit),
    };
}

/// Clears `target` and draws the lines for `screen`.
pub fn draw<D>(target: &mut D, screen: &Screen) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
    target.clear(BinaryColor::Off)?;

    let mut y = 0;
    for line in lines(screen).iter() {
        Text::with_baseline(line.as_str(), Point::new(0, y), style, Baseline::Top).draw(target)?;
        y += LINE_PITCH;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::SensorData;
    use core::convert::Infallible;

    /// Counts lit pixels on a 128x64 panel.
    struct Panel {
        lit: usize,
        out_of_bounds: usize,
    }

    impl OriginDimensions for Panel {
        fn size(&self) -> Size {
            Size::new(128, 64)
        }
    }

    impl DrawTarget for Panel {
        type Color = BinaryColor;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            for Pixel(p, color) in pixels {
                if p.x < 0 || p.y < 0 || p.x >= 128 || p.y >= 64 {
                    self.out_of_bounds += 1;
                } else if color.is_on() {
                    self.lit += 1;
                }
            }
            Ok(())
        }
    }

    #[test]
    fn quick_read_shows_kpa_and_psi() {
        let l = lines(&Screen::QuickRead {
            tire_kpa: Some(220.0),
        });
        assert_eq!(l[0].as_str(), "TIRE PRESSURE");
        assert_eq!(l[2].as_str(), "220.0 kPa");
        assert_eq!(l[3].as_str(), "31.9 psi");
    }

    #[test]
    fn missing_values_are_not_zero() {
        let l = lines(&Screen::Detailed(SensorData {
            temperature_c: Some(-4.3),
            ..SensorData::default()
        }));
        assert_eq!(l[1].as_str(), "Tire --- kPa");
        assert_eq!(l[2].as_str(), "Atm --- hPa");
        assert_eq!(l[3].as_str(), "Temp -4.3 C");

        let l = lines(&Screen::QuickRead { tire_kpa: None });
        assert_eq!(l[2].as_str(), "--- kPa");
        assert!(l[3].is_empty());
    }

    #[test]
    fn calibration_and_settings_text() {
        let l = lines(&Screen::Calibration {
            active: true,
            offset_kpa: -10.0,
            tire_kpa: Some(190.0),
        });
        assert_eq!(l[0].as_str(), "CALIBRATION ON");
        assert_eq!(l[1].as_str(), "Offset -10.0 kPa");
        assert_eq!(l[2].as_str(), "Tire 190.0 kPa");

        let l = lines(&Screen::Settings {
            min_kpa: 0.0,
            max_kpa: 1000.0,
            offset_kpa: 5.0,
            read_interval_ms: 2000,
        });
        assert_eq!(l[1].as_str(), "Range 0-1000 kPa");
        assert_eq!(l[2].as_str(), "Offset +5.0 kPa");
        assert_eq!(l[3].as_str(), "Every 2000 ms");
    }

    #[test]
    fn draw_stays_on_panel() {
        let mut panel = Panel {
            lit: 0,
            out_of_bounds: 0,
        };
        draw(
            &mut panel,
            &Screen::Calibration {
                active: false,
                offset_kpa: 0.0,
                tire_kpa: None,
            },
        )
        .unwrap();
        assert!(panel.lit > 0);
        assert_eq!(panel.out_of_bounds, 0);
    }
}
