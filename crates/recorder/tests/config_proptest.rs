//! Property-based tests for the configuration codec and derived-variable
//! arithmetic. Invariants must hold for ALL valid inputs, not just fixed
//! examples.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::arithmetic_side_effects)]

use recorder::capture::CaptureStrategy;
use recorder::config::{pack_words, unpack_words, Independent, SessionWindow, CONFIG_SLOTS};
use recorder::session::{SessionParams, ENV_CAPACITY_MARGIN};

proptest::proptest! {
    /// Packing a full-size page to bytes and back yields the original
    /// words, including negative values (sign extension on unpack).
    #[test]
    fn page_codec_round_trips(words in proptest::collection::vec(
        proptest::num::i32::ANY, CONFIG_SLOTS)) {
        let mut bytes = vec![0u8; CONFIG_SLOTS * 4];
        pack_words(&words, &mut bytes).unwrap();
        let mut back = vec![0i32; CONFIG_SLOTS];
        unpack_words(&bytes, &mut back).unwrap();
        assert_eq!(words, back);
    }

    /// The packed form is MSB-first per word: byte 0 of each group carries
    /// the sign bit.
    #[test]
    fn packed_sign_bit_leads_each_group(word in proptest::num::i32::ANY) {
        let mut bytes = [0u8; 4];
        pack_words(&[word], &mut bytes).unwrap();
        assert_eq!(bytes[0] & 0x80 != 0, word < 0);
    }

    /// target_bytes == rate * 2 * seconds and the cycle count tiles it
    /// exactly, for every aligned configuration.
    #[test]
    fn derived_sizes_are_exact(
        rate in 1u32..=384_000,
        file_seconds in 1u32..=300,
        minutes in 1u32..=600,
    ) {
        let ind = Independent {
            sample_rate_hz: rate,
            file_seconds,
            env_enabled: false,
            env_period_seconds: 1,
        };
        let window = SessionWindow {
            alarm_hour: 0,
            alarm_minute: 0,
            session_minutes: minutes,
        };
        // One slot = one second of audio, so alignment always holds.
        let p = SessionParams::derive(&ind, &window, rate as usize,
            CaptureStrategy::PingPong).unwrap();
        assert_eq!(p.target_bytes, rate * 2 * file_seconds);
        assert_eq!(p.cycles * p.slot_bytes, p.target_bytes);
        assert_eq!(p.byte_rate, rate * 2);
    }

    /// file_count uses floor division: it never overshoots the session
    /// length and undershoots by less than one file.
    #[test]
    fn file_count_floors(
        file_seconds in 1u32..=300,
        minutes in 1u32..=600,
    ) {
        let ind = Independent {
            sample_rate_hz: 1000,
            file_seconds,
            env_enabled: false,
            env_period_seconds: 1,
        };
        let window = SessionWindow {
            alarm_hour: 0,
            alarm_minute: 0,
            session_minutes: minutes,
        };
        let p = SessionParams::derive(&ind, &window, 1000,
            CaptureStrategy::PingPong).unwrap();
        let session_seconds = minutes * 60;
        assert!(p.file_count * file_seconds <= session_seconds);
        assert!((p.file_count + 1) * file_seconds > session_seconds);
    }

    /// The environmental capacity formula and its bound: every supported
    /// (file length, period) pair fits the buffer, margin included.
    #[test]
    fn env_capacity_is_formula_and_fits(
        file_seconds in 1u32..=300,
        period in 5u32..=60,
    ) {
        let ind = Independent {
            sample_rate_hz: 1000,
            file_seconds,
            env_enabled: true,
            env_period_seconds: period,
        };
        let window = SessionWindow {
            alarm_hour: 0,
            alarm_minute: 0,
            session_minutes: 1,
        };
        let p = SessionParams::derive(&ind, &window, 1000,
            CaptureStrategy::PingPong).unwrap();
        assert_eq!(p.env_capacity_records, file_seconds / period + ENV_CAPACITY_MARGIN);
        assert!(p.env_capacity_bytes()
            <= recorder::envlog::ENV_MAX_RECORDS * recorder::ENV_RECORD_STRIDE);
    }

    /// The ADC divisor formula tracks the rate.
    #[test]
    fn adc_divisor_formula(rate in 8_000u32..=480_000) {
        let ind = Independent {
            sample_rate_hz: rate,
            file_seconds: 1,
            env_enabled: false,
            env_period_seconds: 1,
        };
        let window = SessionWindow {
            alarm_hour: 0,
            alarm_minute: 0,
            session_minutes: 1,
        };
        let p = SessionParams::derive(&ind, &window, rate as usize,
            CaptureStrategy::PingPong).unwrap();
        assert_eq!(p.adc_clock_divisor, (48_000_000 - rate) / rate);
    }
}
