//! External real-time clock abstraction
//!
//! The RTC keeps wall-clock time across deep sleep and drives the wake alarm
//! pin. All time fields are plain integers on this side of the boundary;
//! packed BCD exists only inside the hardware register driver.

use core::fmt::Write;

/// Capacity of a rendered timestring.
///
/// Worst case is `59_59_23_31_12_99` — 17 characters; 22 leaves headroom for
/// the fixed filename suffixes appended downstream.
pub const TIMESTRING_CAP: usize = 22;

/// A wall-clock instant, decoded from the RTC registers.
///
/// `year` is the two-digit year (0–99), as the hardware stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp {
    /// Seconds, 0–59.
    pub seconds: u8,
    /// Minutes, 0–59.
    pub minutes: u8,
    /// Hours, 0–23.
    pub hours: u8,
    /// Day of month, 1–31.
    pub day: u8,
    /// Month, 1–12.
    pub month: u8,
    /// Two-digit year, 0–99.
    pub year: u8,
}

impl Timestamp {
    /// Render the fixed-format timestring `SEC_MIN_HOUR_DAY_MONTH_YEAR`.
    ///
    /// Fields are plain decimal with no zero padding, joined by `_`. This is
    /// the string that prefixes every produced filename and environmental
    /// record, so its format is part of the on-card contract.
    pub fn timestring(&self) -> heapless::String<TIMESTRING_CAP> {
        let mut s = heapless::String::new();
        // 17 characters worst case against a 22-byte capacity; cannot fail.
        let _ = write!(
            s,
            "{}_{}_{}_{}_{}_{}",
            self.seconds, self.minutes, self.hours, self.day, self.month, self.year
        );
        s
    }
}

/// Alarm register contents: fire at `hour:minute:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmSpec {
    /// Minute to fire at, 0–59.
    pub minute: u8,
    /// Hour to fire at, 0–23.
    pub hour: u8,
    /// Fire every day at the same time instead of on a specific date.
    pub repeat_daily: bool,
}

impl AlarmSpec {
    /// A daily-repeating alarm at `hour:minute`.
    pub const fn daily(minute: u8, hour: u8) -> Self {
        Self {
            minute,
            hour,
            repeat_daily: true,
        }
    }
}

/// External RTC interface.
pub trait Rtc {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read the current time.
    fn now(&mut self) -> impl core::future::Future<Output = Result<Timestamp, Self::Error>>;

    /// Program the wake alarm.
    fn set_alarm(
        &mut self,
        alarm: AlarmSpec,
    ) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Write the default status register, clearing a pending alarm flag so
    /// the interrupt pin releases.
    fn clear_alarm_status(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Halt execution in the lowest-power state until the alarm pin asserts.
    ///
    /// On hardware this powers down most clocks (dormant mode); resuming
    /// re-establishes them before returning.
    fn sleep_until_alarm(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn timestring_joins_fields_with_underscores() {
        let ts = Timestamp {
            seconds: 7,
            minutes: 30,
            hours: 4,
            day: 12,
            month: 11,
            year: 25,
        };
        assert_eq!(ts.timestring().as_str(), "7_30_4_12_11_25");
    }

    #[test]
    fn timestring_worst_case_fits_capacity() {
        let ts = Timestamp {
            seconds: 59,
            minutes: 59,
            hours: 23,
            day: 31,
            month: 12,
            year: 99,
        };
        let s = ts.timestring();
        assert_eq!(s.as_str(), "59_59_23_31_12_99");
        assert!(s.len() <= TIMESTRING_CAP);
    }
}
