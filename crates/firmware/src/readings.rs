//! Sensor datastring formatting
//!
//! The on-card record format joins fixed-shape datastrings with `_`; the
//! shapes live here, next to the drivers that fill them, and are
//! host-tested. Fixed-point rendering only — no floating point on the M0+.

use core::fmt::Write;

use platform::sensors::{EnvDatastring, LightDatastring};

/// Render one signed tenths value as `-?int.frac` with one decimal.
fn write_tenths(out: &mut EnvDatastring, tenths: i32) {
    let sign = if tenths < 0 { "-" } else { "" };
    let magnitude = tenths.unsigned_abs();
    let _ = write!(out, "{}{}.{}", sign, magnitude / 10, magnitude % 10);
}

/// `humidity_pressure_temperature`, e.g. `45.8_101325_18.4`.
///
/// - `humidity_q10`: relative humidity in 1/1024 %RH (Q22.10 compensation
///   output)
/// - `pressure_pa`: pressure in Pa
/// - `temp_centi`: temperature in 1/100 °C
pub fn format_env_datastring(humidity_q10: u32, pressure_pa: u32, temp_centi: i32) -> EnvDatastring {
    let mut s = EnvDatastring::new();
    // %RH in tenths: q10 * 10 / 1024.
    #[allow(clippy::cast_possible_wrap)] // humidity tops out at 100% << i32::MAX
    let humidity_tenths = (humidity_q10.saturating_mul(10) / 1024) as i32;
    write_tenths(&mut s, humidity_tenths);
    let _ = write!(s, "_{pressure_pa}_");
    write_tenths(&mut s, temp_centi / 10);
    s
}

/// `R_G_B_W_sensitivity`, e.g. `1024_996_870_2101_40`.
pub fn format_light_datastring(r: u16, g: u16, b: u16, w: u16, sensitivity: u8) -> LightDatastring {
    let mut s = LightDatastring::new();
    let _ = write!(s, "{r}_{g}_{b}_{w}_{sensitivity}");
    s
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn env_datastring_shape() {
        // 46899 /1024 % = 45.8%, 1842 centi-deg = 18.4 C.
        let s = format_env_datastring(46_899, 101_325, 1_842);
        assert_eq!(s.as_str(), "45.8_101325_18.4");
    }

    #[test]
    fn env_datastring_negative_temperature() {
        let s = format_env_datastring(0, 99_000, -501);
        assert_eq!(s.as_str(), "0.0_99000_-5.0");
    }

    #[test]
    fn env_datastring_worst_case_fits_the_cap() {
        // 100.0% RH, 6-digit pressure, -20.0 C: the documented maximum.
        let s = format_env_datastring(102_400, 120_000, -2_000);
        assert_eq!(s.as_str(), "100.0_120000_-20.0");
        assert!(s.len() <= platform::sensors::ENV_DATASTRING_CAP);
    }

    #[test]
    fn light_datastring_shape_and_cap() {
        let s = format_light_datastring(65_535, 65_535, 65_535, 65_535, 160);
        assert_eq!(s.as_str(), "65535_65535_65535_65535_160");
        assert!(s.len() <= platform::sensors::LIGHT_DATASTRING_CAP);
    }
}
