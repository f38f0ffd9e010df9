//! Derived session parameters
//!
//! The configuration page carries independent variables only; everything the
//! pipeline needs is derived here, once per session, into an explicit
//! [`SessionParams`] value that is passed by reference to every component.
//! Derivation is also where configuration-class invariants are enforced —
//! alignment and timing violations are rejected before any file is opened,
//! never handled mid-capture.

use crate::capture::CaptureStrategy;
use crate::config::{Independent, SessionWindow};
use crate::envlog::{ENV_MAX_RECORDS, ENV_RECORD_STRIDE};

/// The ADC clock the divisor formula is anchored to.
pub const ADC_CLOCK_HZ: u32 = 48_000_000;

/// Extra environmental records of slack on top of the per-file expectation.
///
/// The sampler can squeeze one extra reading into a file boundary (it reads
/// immediately on start and again on period edges), so a margin of zero
/// overruns; see the buffer-bound tests.
pub const ENV_CAPACITY_MARGIN: u32 = 5;

/// Why derivation rejected a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeriveError {
    /// Sample rate is zero or above the ADC clock.
    RateOutOfRange(u32),
    /// File length of zero seconds.
    ZeroFileSeconds,
    /// Environmental sampling enabled with a zero period.
    ZeroEnvPeriod,
    /// `target_bytes` is not an exact multiple of the slot size.
    UnalignedTarget {
        /// Bytes each file must contain.
        target_bytes: u32,
        /// Bytes per capture slot.
        slot_bytes: u32,
    },
    /// The chained strategy's timing precondition fails: draining one slot
    /// to storage takes at least as long as capturing one.
    ChainedTooSlow {
        /// Measured storage write time per slot, µs.
        write_us: u32,
        /// Capture time per slot at the configured rate, µs.
        capture_us: u32,
    },
    /// A file would accumulate more environmental records than the buffer
    /// can hold.
    EnvBufferTooSmall {
        /// Records required (including margin).
        required: u32,
    },
}

impl core::fmt::Display for DeriveError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::RateOutOfRange(hz) => write!(f, "sample rate {hz} Hz out of range"),
            Self::ZeroFileSeconds => f.write_str("file length is zero seconds"),
            Self::ZeroEnvPeriod => f.write_str("environmental period is zero"),
            Self::UnalignedTarget {
                target_bytes,
                slot_bytes,
            } => write!(f, "{target_bytes} B target not a multiple of {slot_bytes} B slots"),
            Self::ChainedTooSlow {
                write_us,
                capture_us,
            } => write!(f, "chained drain {write_us} µs >= capture {capture_us} µs"),
            Self::EnvBufferTooSmall { required } => {
                write!(f, "env buffer cannot hold {required} records")
            }
        }
    }
}

/// Everything the pipeline, sampler and orchestrator need for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionParams {
    /// ADC sample rate in Hz.
    pub sample_rate_hz: u32,
    /// Length of each audio file in seconds.
    pub file_seconds: u32,
    /// Audio bytes per second (16-bit mono).
    pub byte_rate: u32,
    /// Exact data-chunk size of each audio file.
    pub target_bytes: u32,
    /// Files recorded this session: `floor(session_minutes*60 / file_seconds)`.
    pub file_count: u32,
    /// ADC clock divisor: `(48 MHz - rate) / rate`.
    pub adc_clock_divisor: u32,
    /// Bytes per capture slot.
    pub slot_bytes: u32,
    /// Buffer drain cycles per file: `target_bytes / slot_bytes`.
    pub cycles: u32,
    /// Whether environmental sampling runs this session.
    pub env_enabled: bool,
    /// Seconds between environmental samples.
    pub env_period_seconds: u32,
    /// Environmental records one file may accumulate (including margin).
    pub env_capacity_records: u32,
    /// Session length in minutes.
    pub session_minutes: u32,
    /// Buffer-drain strategy for this session.
    pub strategy: CaptureStrategy,
}

impl SessionParams {
    /// Derive and validate the parameters for one session.
    ///
    /// `slot_samples` is the capture arena's per-slot sample count.
    pub fn derive(
        ind: &Independent,
        window: &SessionWindow,
        slot_samples: usize,
        strategy: CaptureStrategy,
    ) -> Result<Self, DeriveError> {
        if ind.sample_rate_hz == 0 || ind.sample_rate_hz > ADC_CLOCK_HZ {
            return Err(DeriveError::RateOutOfRange(ind.sample_rate_hz));
        }
        if ind.file_seconds == 0 {
            return Err(DeriveError::ZeroFileSeconds);
        }

        let byte_rate = ind
            .sample_rate_hz
            .checked_mul(2)
            .ok_or(DeriveError::RateOutOfRange(ind.sample_rate_hz))?;
        let target_bytes = byte_rate
            .checked_mul(ind.file_seconds)
            .ok_or(DeriveError::ZeroFileSeconds)?;

        let file_count = window
            .session_minutes
            .saturating_mul(60)
            .checked_div(ind.file_seconds)
            .unwrap_or(0);

        let adc_clock_divisor = ADC_CLOCK_HZ
            .saturating_sub(ind.sample_rate_hz)
            .checked_div(ind.sample_rate_hz)
            .unwrap_or(0);

        #[allow(clippy::cast_possible_truncation)] // slot sizes are small compile-time constants
        let slot_bytes = (slot_samples.saturating_mul(2)) as u32;
        if slot_bytes == 0 || target_bytes.checked_rem(slot_bytes) != Some(0) {
            return Err(DeriveError::UnalignedTarget {
                target_bytes,
                slot_bytes,
            });
        }
        let cycles = target_bytes
            .checked_div(slot_bytes)
            .ok_or(DeriveError::UnalignedTarget {
                target_bytes,
                slot_bytes,
            })?;

        if let CaptureStrategy::Chained { slot_write_us } = strategy {
            let capture_us = Self::slot_capture_us(slot_samples, ind.sample_rate_hz);
            if slot_write_us >= capture_us {
                return Err(DeriveError::ChainedTooSlow {
                    write_us: slot_write_us,
                    capture_us,
                });
            }
        }

        let env_capacity_records = if ind.env_enabled {
            if ind.env_period_seconds == 0 {
                return Err(DeriveError::ZeroEnvPeriod);
            }
            let required = ind
                .file_seconds
                .checked_div(ind.env_period_seconds)
                .unwrap_or(0)
                .saturating_add(ENV_CAPACITY_MARGIN);
            #[allow(clippy::cast_possible_truncation)] // ENV_MAX_RECORDS is a small constant
            if required > ENV_MAX_RECORDS as u32 {
                return Err(DeriveError::EnvBufferTooSmall { required });
            }
            required
        } else {
            0
        };

        Ok(Self {
            sample_rate_hz: ind.sample_rate_hz,
            file_seconds: ind.file_seconds,
            byte_rate,
            target_bytes,
            file_count,
            adc_clock_divisor,
            slot_bytes,
            cycles,
            env_enabled: ind.env_enabled,
            env_period_seconds: ind.env_period_seconds,
            env_capacity_records,
            session_minutes: window.session_minutes,
            strategy,
        })
    }

    /// Time to fill one slot at `rate`, in microseconds.
    fn slot_capture_us(slot_samples: usize, rate: u32) -> u32 {
        let us = (slot_samples as u64)
            .saturating_mul(1_000_000)
            .checked_div(u64::from(rate))
            .unwrap_or(0);
        u32::try_from(us).unwrap_or(u32::MAX)
    }

    /// Bytes the environmental buffer must hold this session.
    pub fn env_capacity_bytes(&self) -> usize {
        (self.env_capacity_records as usize).saturating_mul(ENV_RECORD_STRIDE)
    }
}
