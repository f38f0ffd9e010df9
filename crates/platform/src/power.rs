//! Power rails, status LED, gain control and pacing abstractions
//!
//! Rail switching is infallible GPIO on every supported board, so the rail
//! trait returns nothing; sequencing policy (what to switch when) lives in
//! the recorder's schedule controller.

/// Switched power rails.
///
/// The digital rail carries the RTC/I²C pull-ups and must stay up across
/// deep sleep; the analog rail feeds the microphone front end and is only up
/// while a session records.
pub trait PowerRails {
    /// Raise the digital assembly rail (RTC pull-ups, card, sensors).
    fn digital_enable(&mut self);

    /// Drop the digital assembly rail.
    fn digital_disable(&mut self);

    /// Raise the analog front-end rail.
    fn analog_enable(&mut self);

    /// Drop the analog front-end rail.
    fn analog_disable(&mut self);
}

/// Onboard indicator LED.
///
/// Coarse status only: slow repeated flash = normal milestone, rapid
/// sustained flash = configuration or fatal failure.
pub trait StatusLed {
    /// Flash `count` times with `period_ms` on and `period_ms` off.
    fn flash(
        &mut self,
        count: u32,
        period_ms: u32,
    ) -> impl core::future::Future<Output = ()>;
}

/// Capture-gain control (digital potentiometer in the analog front end).
pub trait GainControl {
    /// Error type
    type Error: core::fmt::Debug;

    /// Set the gain in wiper steps.
    fn set_gain(
        &mut self,
        steps: u8,
    ) -> impl core::future::Future<Output = Result<(), Self::Error>>;
}

/// Inter-sample pacing for the sampler task.
///
/// A trait rather than a direct timer dependency so the sampler loop runs
/// instantly under host tests; hardware supplies an Embassy timer.
pub trait Pacer {
    /// Pause the calling task for `ms` milliseconds.
    fn pause_ms(&mut self, ms: u32) -> impl core::future::Future<Output = ()>;
}
