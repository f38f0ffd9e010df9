//! Board plumbing: power rails, status LED, pacing, gain control
//!
//! # Pin assignments
//!
//! These constants document the target PCB assignment; change them to match
//! your board before flashing.
//!
//! | Signal            | RP2040 pin | Notes                              |
//! |-------------------|------------|------------------------------------|
//! | DIGI_ENABLE       | GPIO2      | digital assembly rail (RTC pull-ups)|
//! | ANA_ENABLE        | GPIO3      | analog front-end rail              |
//! | Status LED        | GPIO25     | onboard LED                        |
//! | MCP4131 CS        | GPIO13     | gain digipot, SPI1                 |
//! | ADC input         | GPIO26     | microphone front end, ADC0         |
//! | RTC INT           | GPIO22     | DS3231 alarm pin, active low       |

use embassy_rp::gpio::Output;
use embassy_time::{Duration, Timer};
use embedded_hal::spi::SpiDevice;

use platform::power::{GainControl, Pacer, PowerRails, StatusLed};

/// Switched rail pair.
pub struct Rails {
    digital: Output<'static>,
    analog: Output<'static>,
}

impl Rails {
    /// Wrap the two rail-enable pins (active high).
    pub fn new(digital: Output<'static>, analog: Output<'static>) -> Self {
        Self { digital, analog }
    }
}

impl PowerRails for Rails {
    fn digital_enable(&mut self) {
        self.digital.set_high();
    }

    fn digital_disable(&mut self) {
        self.digital.set_low();
    }

    fn analog_enable(&mut self) {
        self.analog.set_high();
    }

    fn analog_disable(&mut self) {
        self.analog.set_low();
    }
}

/// Onboard status LED.
pub struct Led {
    pin: Output<'static>,
}

impl Led {
    /// Wrap the LED pin.
    pub fn new(pin: Output<'static>) -> Self {
        Self { pin }
    }
}

impl StatusLed for Led {
    async fn flash(&mut self, count: u32, period_ms: u32) {
        for _ in 0..count {
            self.pin.set_high();
            Timer::after(Duration::from_millis(u64::from(period_ms))).await;
            self.pin.set_low();
            Timer::after(Duration::from_millis(u64::from(period_ms))).await;
        }
    }
}

/// Embassy-timer pacing for the sampler task.
#[derive(Default)]
pub struct TimerPacer;

impl Pacer for TimerPacer {
    async fn pause_ms(&mut self, ms: u32) {
        Timer::after(Duration::from_millis(u64::from(ms))).await;
    }
}

/// MCP4131 digital potentiometer in the analog front end.
///
/// One register matters: wiper 0. Writing it is a two-byte SPI command —
/// the wiper address (0x00) with the write command bits, then the step.
pub struct Mcp4131<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> Mcp4131<SPI> {
    /// Wrap the digipot's SPI device.
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }
}

/// Gain-control failure (SPI transfer error).
#[derive(Debug, thiserror_no_std::Error)]
#[error("digipot SPI write failed")]
pub struct GainError;

impl<SPI: SpiDevice> GainControl for Mcp4131<SPI> {
    type Error = GainError;

    async fn set_gain(&mut self, steps: u8) -> Result<(), Self::Error> {
        // Command byte: wiper-0 address 0x0, write command 0b00 in bits 5:4.
        let frame = [0x00, steps.min(128)];
        self.spi.write(&frame).map_err(|_| GainError)
    }
}
