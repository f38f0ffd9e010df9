//! Gap-free capture pipeline
//!
//! Drains the ADC's DMA slot pair to an open audio file for exactly
//! `target_bytes`. While one slot is the armed DMA target the other is being
//! written out; the two roles never coincide because the next slot is armed
//! before the completed one is borrowed, and slot handles — not addresses —
//! are what changes hands.

use platform::capture::{BufferSlot, CaptureChannel};
use platform::storage::Storage;

use crate::session::SessionParams;

/// How buffers are re-armed during a file.
///
/// Selected once at session setup; a closed set rather than pluggable
/// callbacks so the two timing models stay auditable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureStrategy {
    /// The driver re-arms the peer slot itself immediately after each
    /// completion. Correct at any storage speed: a slow drain stalls the
    /// file (and trips the byte-count check) rather than corrupting it.
    PingPong,
    /// Hardware channel-chaining re-arms the peer slot with no core
    /// involvement; the driver only waits and drains. Valid only while one
    /// slot drains faster than one slot captures — carry the measured drain
    /// time here so session derivation can check that bound.
    Chained {
        /// Measured storage write time for one slot, in microseconds,
        /// against the specific card in use.
        slot_write_us: u32,
    },
}

/// Capture-pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFault<CE, SE> {
    /// The DMA channel failed; the stream is no longer trustworthy.
    Channel(CE),
    /// A storage write failed outright.
    Storage(SE),
    /// The card accepted fewer bytes than one slot holds.
    ShortWrite {
        /// Bytes offered.
        expected: usize,
        /// Bytes the card reported written.
        written: usize,
    },
}

#[cfg(not(target_endian = "little"))]
compile_error!("the PCM drain reinterprets i16 slots as little-endian wire bytes");

/// View a slot's samples as wire bytes.
fn sample_bytes(samples: &[i16]) -> &[u8] {
    // SAFETY: u8 has no alignment requirement and every byte of an i16 is
    // initialised, so reinterpreting the slot as bytes of twice the length
    // is sound. Little-endian layout equals the WAV wire format; the
    // compile_error above rejects targets where it would not.
    unsafe {
        core::slice::from_raw_parts(
            samples.as_ptr().cast::<u8>(),
            samples.len().saturating_mul(2),
        )
    }
}

/// Capture exactly `params.target_bytes` of PCM into `file`.
///
/// Returns the byte count written (always `target_bytes` on success). On
/// return no DMA transfer is in flight, whatever the outcome: the last
/// drained cycle is never followed by a re-arm, and the error paths stop
/// the channel before surfacing.
pub async fn capture_file<C: CaptureChannel, S: Storage>(
    chan: &mut C,
    storage: &mut S,
    file: &mut S::File,
    params: &SessionParams,
) -> Result<u32, CaptureFault<C::Error, S::Error>> {
    let result = run_cycles(chan, storage, file, params).await;
    // Covers both the chained tail transfer and error-path exits.
    chan.stop();
    result
}

async fn run_cycles<C: CaptureChannel, S: Storage>(
    chan: &mut C,
    storage: &mut S,
    file: &mut S::File,
    params: &SessionParams,
) -> Result<u32, CaptureFault<C::Error, S::Error>> {
    let chained = matches!(params.strategy, CaptureStrategy::Chained { .. });
    let mut total: u32 = 0;
    let mut active = BufferSlot::A;

    chan.set_clock_divisor(params.adc_clock_divisor);
    chan.drain_fifo();
    if chained {
        chan.arm_chained(active).map_err(CaptureFault::Channel)?;
    } else {
        chan.arm(active).map_err(CaptureFault::Channel)?;
    }

    for cycle in 0..params.cycles {
        chan.wait_complete(active).await.map_err(CaptureFault::Channel)?;

        // Hand the ADC its next slot before borrowing the full one. Under
        // chaining the hardware has already done this.
        let last = cycle.saturating_add(1) == params.cycles;
        if !chained && !last {
            chan.arm(active.other()).map_err(CaptureFault::Channel)?;
        }

        let bytes = sample_bytes(chan.slot_samples(active));
        let written = storage
            .write(file, bytes)
            .await
            .map_err(CaptureFault::Storage)?;
        if written != bytes.len() {
            return Err(CaptureFault::ShortWrite {
                expected: bytes.len(),
                written,
            });
        }
        #[allow(clippy::cast_possible_truncation)] // one slot is far below u32::MAX
        {
            total = total.saturating_add(written as u32);
        }
        active = active.other();
    }

    debug_assert_eq!(total, params.target_bytes);
    Ok(total)
}
