//! DS3231 external RTC driver
//!
//! Register-level access to time keeping, alarm 1 and the status register,
//! plus the wake wait on the alarm interrupt pin. Packed BCD exists only in
//! this file (via [`crate::bcd`]); everything above sees plain integers.

use embassy_rp::gpio::Input;
use embedded_hal::i2c::I2c;

use platform::rtc::{AlarmSpec, Rtc, Timestamp};

use crate::bcd::{from_bcd, to_bcd};

/// 7-bit I²C address.
const ADDR: u8 = 0x68;

/// Register addresses.
const REG_SECONDS: u8 = 0x00;
const REG_ALARM1: u8 = 0x07;
const REG_CONTROL: u8 = 0x0E;
const REG_STATUS: u8 = 0x0F;

/// Control: alarm-1 interrupt enabled, interrupt (not square wave) output.
const CONTROL_INTCN_A1IE: u8 = 0b0000_0101;
/// Status: clear both alarm flags, keep oscillator running.
const STATUS_DEFAULT: u8 = 0b0000_0000;

/// DS3231 failure (I²C transfer error, or sleeping without the alarm pin).
#[derive(Debug, thiserror_no_std::Error)]
#[error("RTC register transaction failed")]
pub struct RtcError;

/// The external RTC with its alarm interrupt pin.
///
/// The I²C device handed in is expected to be a shared-bus wrapper — the
/// light sensor sits on the same bus and both cores hold RTC handles, so
/// register transactions must already be serialised underneath.
pub struct Ds3231<I2C> {
    i2c: I2C,
    int_pin: Option<Input<'static>>,
}

impl<I2C: I2c> Ds3231<I2C> {
    /// Wrap the bus device and alarm pin; programs the control register for
    /// alarm-1 interrupts.
    ///
    /// Only the handle that owns the alarm pin (the schedule controller's)
    /// may sleep; secondary handles pass `None` and only keep time.
    pub fn new(i2c: I2C, int_pin: Option<Input<'static>>) -> Result<Self, RtcError> {
        let mut rtc = Self { i2c, int_pin };
        rtc.write_reg(REG_CONTROL, CONTROL_INTCN_A1IE)?;
        rtc.write_reg(REG_STATUS, STATUS_DEFAULT)?;
        Ok(rtc)
    }

    /// Write the time fields from a configuration page.
    pub fn set_time(&mut self, init: &recorder::config::RtcInit) -> Result<(), RtcError> {
        let frame = [
            REG_SECONDS,
            to_bcd(init.seconds),
            to_bcd(init.minutes),
            to_bcd(init.hours), // 24-hour mode: bit 6 clear
            to_bcd(init.weekday),
            to_bcd(init.day),
            to_bcd(init.month),
            to_bcd(init.year),
        ];
        self.i2c.write(ADDR, &frame).map_err(|_| RtcError)
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), RtcError> {
        self.i2c.write(ADDR, &[reg, value]).map_err(|_| RtcError)
    }
}

impl<I2C: I2c> Rtc for Ds3231<I2C> {
    type Error = RtcError;

    #[allow(clippy::indexing_slicing)] // seven-byte burst read, constant indices
    async fn now(&mut self) -> Result<Timestamp, Self::Error> {
        let mut raw = [0u8; 7];
        self.i2c
            .write_read(ADDR, &[REG_SECONDS], &mut raw)
            .map_err(|_| RtcError)?;
        Ok(Timestamp {
            seconds: from_bcd(raw[0] & 0x7F),
            minutes: from_bcd(raw[1] & 0x7F),
            hours: from_bcd(raw[2] & 0x3F),
            // raw[3] is the weekday, unused in the timestring
            day: from_bcd(raw[4] & 0x3F),
            month: from_bcd(raw[5] & 0x1F), // mask the century bit
            year: from_bcd(raw[6]),
        })
    }

    async fn set_alarm(&mut self, alarm: AlarmSpec) -> Result<(), Self::Error> {
        // A1Mx mask bits (bit 7 of each register): fire when seconds,
        // minutes and hours match; day/date ignored when repeating daily.
        let day_mask = if alarm.repeat_daily { 0x80 } else { 0x00 };
        let frame = [
            REG_ALARM1,
            to_bcd(0),                     // seconds: always on the minute
            to_bcd(alarm.minute),          // A1M2 clear: match minutes
            to_bcd(alarm.hour),            // A1M3 clear: match hours
            day_mask | to_bcd(1),          // A1M4 set for daily repeat
        ];
        self.i2c.write(ADDR, &frame).map_err(|_| RtcError)
    }

    async fn clear_alarm_status(&mut self) -> Result<(), Self::Error> {
        self.write_reg(REG_STATUS, STATUS_DEFAULT)
    }

    async fn sleep_until_alarm(&mut self) -> Result<(), Self::Error> {
        // The alarm pin is open-drain, active low. Waiting on the GPIO keeps
        // the Embassy timebase alive; the deeper DORMANT stop (ROSC gated,
        // resumed by edge detect) drops to PAC writes and is wired behind
        // this same seam when power budgets demand it.
        let Some(pin) = self.int_pin.as_mut() else {
            return Err(RtcError);
        };
        pin.wait_for_low().await;
        self.clear_alarm_status().await
    }
}
