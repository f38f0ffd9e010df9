//! Environmental and ambient-light sensor abstractions
//!
//! Each sensor exposes exactly one operation: read the current values into a
//! fixed-maximum-length formatted datastring. The string formats are part of
//! the on-card record contract (see the recorder's environmental buffer);
//! register-level access stays inside the drivers.

/// Maximum length of an environmental datastring.
///
/// `humidity_pressure_temperature`: `100.0` (5) + `_` + `120000` (6) + `_` +
/// `-20.0` (5) — 19 characters, rounded up.
pub const ENV_DATASTRING_CAP: usize = 20;

/// Maximum length of a light datastring.
///
/// `R_G_B_W_sensitivity`: four 5-digit raw counts, four separators and a
/// 4-digit sensitivity code.
pub const LIGHT_DATASTRING_CAP: usize = 29;

/// Formatted environmental reading, e.g. `45.2_101325_18.4`.
pub type EnvDatastring = heapless::String<ENV_DATASTRING_CAP>;

/// Formatted light reading, e.g. `1024_996_870_2101_40`.
pub type LightDatastring = heapless::String<LIGHT_DATASTRING_CAP>;

/// Humidity/pressure/temperature sensor.
pub trait EnvironmentalSensor {
    /// Error type
    type Error: core::fmt::Debug;

    /// One-time configuration before the first read.
    fn setup(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Read and format the current values.
    fn read_datastring(
        &mut self,
    ) -> impl core::future::Future<Output = Result<EnvDatastring, Self::Error>>;
}

/// Ambient-light (RGBW) sensor.
pub trait LightSensor {
    /// Error type
    type Error: core::fmt::Debug;

    /// One-time configuration before the first read.
    fn setup(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Read and format the current values.
    fn read_datastring(
        &mut self,
    ) -> impl core::future::Future<Output = Result<LightDatastring, Self::Error>>;
}
