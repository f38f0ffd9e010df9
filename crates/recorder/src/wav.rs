//! Canonical 44-byte PCM WAV header
//!
//! Mono, 16-bit, little-endian throughout. The header is written once at
//! file open with the final data size already known — the capture pipeline
//! guarantees exactly `data_bytes` of samples follow, so no header patching
//! pass is needed at close.

/// Length of the canonical PCM header.
pub const WAV_HEADER_LEN: usize = 44;

/// Bits per sample. The ADC delivers 12-bit samples left-justified into
/// 16-bit words; the container is 16-bit PCM.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Channel count (the front end is mono).
pub const CHANNELS: u16 = 1;

/// Parameters of one WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WavSpec {
    /// Sample rate in Hz.
    pub sample_rate_hz: u32,
    /// Size of the data chunk in bytes.
    pub data_bytes: u32,
}

impl WavSpec {
    /// Bytes per second of audio: `sample_rate * channels * bytes-per-sample`.
    pub const fn byte_rate(&self) -> u32 {
        self.sample_rate_hz.saturating_mul(2)
    }

    /// Render the 44-byte header.
    #[allow(clippy::indexing_slicing)] // offsets are compile-time constants inside the 44-byte array
    #[allow(clippy::arithmetic_side_effects)] // 36 + data_bytes checked against u32 by the config layer
    pub fn header(&self) -> [u8; WAV_HEADER_LEN] {
        let mut h = [0u8; WAV_HEADER_LEN];
        h[0..4].copy_from_slice(b"RIFF");
        // Overall file size minus the 8-byte RIFF preamble.
        h[4..8].copy_from_slice(&(36u32.wrapping_add(self.data_bytes)).to_le_bytes());
        h[8..16].copy_from_slice(b"WAVEfmt ");
        // Length of the fmt chunk.
        h[16..20].copy_from_slice(&16u32.to_le_bytes());
        // Format tag: 1 = integer PCM.
        h[20..22].copy_from_slice(&1u16.to_le_bytes());
        h[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
        h[24..28].copy_from_slice(&self.sample_rate_hz.to_le_bytes());
        h[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        // Block align: channels * bits-per-sample / 8.
        h[32..34].copy_from_slice(&2u16.to_le_bytes());
        h[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
        h[36..40].copy_from_slice(b"data");
        h[40..44].copy_from_slice(&self.data_bytes.to_le_bytes());
        h
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn header_is_bit_exact_for_reference_file() {
        // 192 kHz, 30 s of mono 16-bit audio.
        let spec = WavSpec {
            sample_rate_hz: 192_000,
            data_bytes: 11_520_000,
        };
        let h = spec.header();

        let mut expected = Vec::new();
        expected.extend_from_slice(b"RIFF");
        expected.extend_from_slice(&(36u32 + 11_520_000).to_le_bytes());
        expected.extend_from_slice(b"WAVEfmt ");
        expected.extend_from_slice(&16u32.to_le_bytes());
        expected.extend_from_slice(&1u16.to_le_bytes()); // PCM
        expected.extend_from_slice(&1u16.to_le_bytes()); // mono
        expected.extend_from_slice(&192_000u32.to_le_bytes());
        expected.extend_from_slice(&384_000u32.to_le_bytes());
        expected.extend_from_slice(&2u16.to_le_bytes()); // block align
        expected.extend_from_slice(&16u16.to_le_bytes()); // bits
        expected.extend_from_slice(b"data");
        expected.extend_from_slice(&11_520_000u32.to_le_bytes());

        assert_eq!(h.len(), WAV_HEADER_LEN);
        assert_eq!(&h[..], &expected[..]);
    }

    #[test]
    fn chunk_markers_sit_at_canonical_offsets() {
        let h = WavSpec {
            sample_rate_hz: 48_000,
            data_bytes: 96_000,
        }
        .header();
        assert_eq!(&h[0..4], b"RIFF");
        assert_eq!(&h[8..12], b"WAVE");
        assert_eq!(&h[12..16], b"fmt ");
        assert_eq!(&h[36..40], b"data");
    }

    #[test]
    fn byte_rate_is_twice_the_sample_rate() {
        let spec = WavSpec {
            sample_rate_hz: 384_000,
            data_bytes: 0,
        };
        assert_eq!(spec.byte_rate(), 768_000);
    }
}
