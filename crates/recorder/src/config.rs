//! Configuration page codec
//!
//! The host (or a previous USB configuration pass) leaves one flash page of
//! 64 big-endian `i32` slots:
//!
//! | slots      | contents                                            |
//! |------------|-----------------------------------------------------|
//! | 0..=3      | sample rate, file seconds, env enabled, env period  |
//! | 4..=10     | RTC initialisation (sec min hour weekday day mo yr) |
//! | 11         | session count `N`                                   |
//! | 12..12+3N  | per session: alarm hour, alarm minute, minutes      |
//! | ..62       | zero padding                                        |
//! | 63         | success terminator, must be `1`                     |
//!
//! Packing between the `i32` view and the byte-addressable page is a pure,
//! order-preserving byte split: four bytes per word, most-significant byte
//! first.

/// Total 32-bit slots in one configuration page (256 bytes).
pub const CONFIG_SLOTS: usize = 64;

/// Leading slots holding session-independent recording parameters.
pub const INDEPENDENT_SLOTS: usize = 4;

/// Slots holding the RTC initialisation fields.
pub const RTC_INIT_SLOTS: usize = 7;

/// Highest representable session count: the windows for 17 sessions end at
/// slot 62, leaving exactly the terminator slot.
pub const MAX_SESSIONS: usize = 17;

const SESSION_COUNT_SLOT: usize = INDEPENDENT_SLOTS + RTC_INIT_SLOTS;
const FIRST_WINDOW_SLOT: usize = SESSION_COUNT_SLOT + 1;
const TERMINATOR_SLOT: usize = CONFIG_SLOTS - 1;

/// Configuration-page bytes (64 slots × 4 bytes).
pub const CONFIG_PAGE_BYTES: usize = CONFIG_SLOTS * 4;

// ── Word/byte codec ─────────────────────────────────────────────────────────

/// Length mismatch between a word slice and its byte representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecLenMismatch {
    /// Word count offered.
    pub words: usize,
    /// Byte count offered.
    pub bytes: usize,
}

/// Pack words into bytes, most-significant byte first.
///
/// `out` must be exactly four bytes per word.
pub fn pack_words(words: &[i32], out: &mut [u8]) -> Result<(), CodecLenMismatch> {
    if words.len().checked_mul(4) != Some(out.len()) {
        return Err(CodecLenMismatch {
            words: words.len(),
            bytes: out.len(),
        });
    }
    for (word, chunk) in words.iter().zip(out.chunks_exact_mut(4)) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
    Ok(())
}

/// Unpack bytes into words, reversing [`pack_words`].
///
/// `bytes` must be exactly four bytes per word. Sign bits survive the round
/// trip: the top byte of each word is the first byte of its group.
pub fn unpack_words(bytes: &[u8], out: &mut [i32]) -> Result<(), CodecLenMismatch> {
    if out.len().checked_mul(4) != Some(bytes.len()) {
        return Err(CodecLenMismatch {
            words: out.len(),
            bytes: bytes.len(),
        });
    }
    for (slot, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        let mut word = [0u8; 4];
        word.copy_from_slice(chunk);
        *slot = i32::from_be_bytes(word);
    }
    Ok(())
}

// ── Decoded views ───────────────────────────────────────────────────────────

/// Session-independent recording parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Independent {
    /// ADC sample rate in Hz.
    pub sample_rate_hz: u32,
    /// Length of each audio file in seconds.
    pub file_seconds: u32,
    /// Whether environmental sampling runs alongside audio capture.
    pub env_enabled: bool,
    /// Seconds between environmental samples.
    pub env_period_seconds: u32,
}

impl Independent {
    /// Bench-test defaults used when no configuration page is present.
    pub const fn debug_defaults() -> Self {
        Self {
            sample_rate_hz: 192_000,
            file_seconds: 300,
            env_enabled: false,
            env_period_seconds: 10,
        }
    }
}

/// RTC initialisation fields written once at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RtcInit {
    /// Seconds, 0–59.
    pub seconds: u8,
    /// Minutes, 0–59.
    pub minutes: u8,
    /// Hours, 0–23.
    pub hours: u8,
    /// Day of week, 1–7 (1 = Sunday).
    pub weekday: u8,
    /// Day of month, 1–31.
    pub day: u8,
    /// Month, 1–12.
    pub month: u8,
    /// Two-digit year, 0–99.
    pub year: u8,
}

/// One session's alarm window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionWindow {
    /// Hour the wake alarm fires, 0–23.
    pub alarm_hour: u8,
    /// Minute the wake alarm fires, 0–59.
    pub alarm_minute: u8,
    /// Session length in minutes.
    pub session_minutes: u32,
}

/// Validation failures for a configuration page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The success terminator in the last slot is not `1`.
    MissingTerminator,
    /// The session count is zero, negative or exceeds [`MAX_SESSIONS`].
    BadSessionCount(i32),
    /// A slot value is outside its documented range.
    FieldOutOfRange {
        /// Zero-based slot index of the offending value.
        slot: usize,
    },
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingTerminator => f.write_str("configuration terminator missing"),
            Self::BadSessionCount(n) => write!(f, "bad session count {n}"),
            Self::FieldOutOfRange { slot } => write!(f, "slot {slot} out of range"),
        }
    }
}

/// A validated configuration page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBlock {
    slots: [i32; CONFIG_SLOTS],
}

impl ConfigBlock {
    /// Validate a slot array into a configuration block.
    pub fn from_slots(slots: [i32; CONFIG_SLOTS]) -> Result<Self, ConfigError> {
        let block = Self { slots };
        if block.slot(TERMINATOR_SLOT) != 1 {
            return Err(ConfigError::MissingTerminator);
        }
        let count = block.slot(SESSION_COUNT_SLOT);
        if count < 1 || count > MAX_SESSIONS as i32 {
            return Err(ConfigError::BadSessionCount(count));
        }

        block.check_range(0, 1, 48_000_000)?; // sample rate
        block.check_range(1, 1, i32::MAX)?; // file seconds
        block.check_range(2, 0, 1)?; // env flag
        if block.slot(2) == 1 {
            block.check_range(3, 1, i32::MAX)?; // env period
        }

        // RTC initialisation fields.
        let rtc_ranges: [(i32, i32); RTC_INIT_SLOTS] = [
            (0, 59),
            (0, 59),
            (0, 23),
            (1, 7),
            (1, 31),
            (1, 12),
            (0, 99),
        ];
        for (offset, (lo, hi)) in rtc_ranges.iter().enumerate() {
            block.check_range(INDEPENDENT_SLOTS.saturating_add(offset), *lo, *hi)?;
        }

        // Session windows.
        for i in 1..=count as usize {
            let base = Self::window_base(i);
            block.check_range(base, 0, 23)?; // alarm hour
            block.check_range(base.saturating_add(1), 0, 59)?; // alarm minute
            block.check_range(base.saturating_add(2), 1, i32::MAX)?; // minutes
        }
        Ok(block)
    }

    /// Decode and validate a configuration page from its byte form.
    pub fn from_bytes(bytes: &[u8; CONFIG_PAGE_BYTES]) -> Result<Self, ConfigError> {
        let mut slots = [0i32; CONFIG_SLOTS];
        // Lengths match by construction; the codec cannot fail here.
        let _ = unpack_words(bytes, &mut slots);
        Self::from_slots(slots)
    }

    /// Render the page back to its byte form.
    pub fn to_bytes(&self) -> [u8; CONFIG_PAGE_BYTES] {
        let mut bytes = [0u8; CONFIG_PAGE_BYTES];
        // Lengths match by construction; the codec cannot fail here.
        let _ = pack_words(&self.slots, &mut bytes);
        bytes
    }

    /// The session-independent recording parameters.
    #[allow(clippy::cast_sign_loss)] // ranges validated non-negative in from_slots
    pub fn independent(&self) -> Independent {
        Independent {
            sample_rate_hz: self.slot(0) as u32,
            file_seconds: self.slot(1) as u32,
            env_enabled: self.slot(2) == 1,
            env_period_seconds: self.slot(3).max(1) as u32,
        }
    }

    /// The RTC initialisation fields.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)] // validated in from_slots
    pub fn rtc_init(&self) -> RtcInit {
        let f = |offset: usize| self.slot(INDEPENDENT_SLOTS.saturating_add(offset)) as u8;
        RtcInit {
            seconds: f(0),
            minutes: f(1),
            hours: f(2),
            weekday: f(3),
            day: f(4),
            month: f(5),
            year: f(6),
        }
    }

    /// Number of configured sessions.
    #[allow(clippy::cast_sign_loss)] // validated in from_slots
    pub fn session_count(&self) -> usize {
        self.slot(SESSION_COUNT_SLOT) as usize
    }

    /// The alarm window for one-based session index `i`.
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)] // validated in from_slots
    pub fn session(&self, i: usize) -> Option<SessionWindow> {
        if i < 1 || i > self.session_count() {
            return None;
        }
        let base = Self::window_base(i);
        Some(SessionWindow {
            alarm_hour: self.slot(base) as u8,
            alarm_minute: self.slot(base.saturating_add(1)) as u8,
            session_minutes: self.slot(base.saturating_add(2)) as u32,
        })
    }

    fn window_base(i: usize) -> usize {
        FIRST_WINDOW_SLOT.saturating_add(i.saturating_sub(1).saturating_mul(3))
    }

    fn slot(&self, i: usize) -> i32 {
        self.slots.get(i).copied().unwrap_or(0)
    }

    fn check_range(&self, i: usize, lo: i32, hi: i32) -> Result<(), ConfigError> {
        let v = self.slot(i);
        if v < lo || v > hi {
            return Err(ConfigError::FieldOutOfRange { slot: i });
        }
        Ok(())
    }
}
