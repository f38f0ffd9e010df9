//! Rotating fault log
//!
//! Field units run unattended; every retry and fatal event is recorded with
//! an RTC timestring so a session's `.log` file carries the trail for
//! post-hoc inspection. Records carry a CRC32 so a store backed by
//! non-volatile memory can reject torn writes.

use crate::rtc::TIMESTRING_CAP;

/// Maximum length of a fault message.
pub const FAULT_MESSAGE_CAP: usize = 64;

/// How severe a logged event was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultSeverity {
    /// A non-fatal condition worth a trail entry (e.g. a failed close after
    /// a complete capture).
    Warning,
    /// A transient fault that the orchestrator retried.
    Retry,
    /// A fatal fault; the system halted after logging it.
    Fatal,
}

impl FaultSeverity {
    fn tag(self) -> u8 {
        match self {
            Self::Warning => b'W',
            Self::Retry => b'R',
            Self::Fatal => b'F',
        }
    }
}

/// One timestamped fault event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultRecord {
    /// RTC timestring at the moment of logging.
    pub timestring: heapless::String<TIMESTRING_CAP>,
    /// Event severity.
    pub severity: FaultSeverity,
    /// Short human-readable description.
    pub message: heapless::String<FAULT_MESSAGE_CAP>,
    /// CRC32 over severity, timestring and message.
    pub crc: u32,
}

impl FaultRecord {
    /// Build a record, computing its CRC.
    ///
    /// `message` is truncated to [`FAULT_MESSAGE_CAP`] bytes if longer.
    pub fn new(
        timestring: heapless::String<TIMESTRING_CAP>,
        severity: FaultSeverity,
        message: &str,
    ) -> Self {
        let mut msg = heapless::String::new();
        let take = message.len().min(FAULT_MESSAGE_CAP);
        // Truncation above makes push_str infallible.
        let _ = msg.push_str(message.get(..take).unwrap_or(""));
        let crc = Self::compute_crc(&timestring, severity, &msg);
        Self {
            timestring,
            severity,
            message: msg,
            crc,
        }
    }

    /// Recompute the CRC and compare with the stored one.
    pub fn verify(&self) -> bool {
        Self::compute_crc(&self.timestring, self.severity, &self.message) == self.crc
    }

    fn compute_crc(
        timestring: &str,
        severity: FaultSeverity,
        message: &str,
    ) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&[severity.tag()]);
        hasher.update(timestring.as_bytes());
        hasher.update(message.as_bytes());
        hasher.finalize()
    }
}

/// Persistent rotating fault log.
pub trait FaultLog {
    /// Append a record, evicting the oldest if the store is full.
    fn append(&mut self, record: FaultRecord);

    /// Iterate the stored records, oldest first.
    fn records(&self) -> impl Iterator<Item = &FaultRecord>;

    /// Drop all stored records (called after draining into a session log).
    fn clear(&mut self);
}

/// Depth of the in-RAM fault ring.
pub const RAM_FAULT_DEPTH: usize = 16;

/// RAM-backed rotating fault log.
///
/// The default store; a non-volatile backend is a drop-in replacement behind
/// the same trait.
#[derive(Debug, Default)]
pub struct RamFaultLog {
    ring: heapless::Deque<FaultRecord, RAM_FAULT_DEPTH>,
}

impl RamFaultLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ring: heapless::Deque::new(),
        }
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Whether the log holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl FaultLog for RamFaultLog {
    fn append(&mut self, record: FaultRecord) {
        if self.ring.is_full() {
            let _ = self.ring.pop_front();
        }
        // Full case handled above; push cannot fail.
        let _ = self.ring.push_back(record);
    }

    fn records(&self) -> impl Iterator<Item = &FaultRecord> {
        self.ring.iter()
    }

    fn clear(&mut self) {
        self.ring.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn ts() -> heapless::String<TIMESTRING_CAP> {
        let mut s = heapless::String::new();
        s.push_str("0_30_4_12_11_25").unwrap();
        s
    }

    #[test]
    fn record_crc_round_trips() {
        let rec = FaultRecord::new(ts(), FaultSeverity::Retry, "card write failed");
        assert!(rec.verify());
    }

    #[test]
    fn tampered_record_fails_verification() {
        let mut rec = FaultRecord::new(ts(), FaultSeverity::Retry, "card write failed");
        rec.severity = FaultSeverity::Fatal;
        assert!(!rec.verify());
    }

    #[test]
    fn ring_rotates_out_oldest() {
        let mut log = RamFaultLog::new();
        for i in 0..(RAM_FAULT_DEPTH + 3) {
            let msg = if i < 3 { "old" } else { "new" };
            log.append(FaultRecord::new(ts(), FaultSeverity::Retry, msg));
        }
        assert_eq!(log.len(), RAM_FAULT_DEPTH);
        assert!(log.records().all(|r| r.message.as_str() == "new"));
    }

    #[test]
    fn clear_empties_the_ring() {
        let mut log = RamFaultLog::new();
        log.append(FaultRecord::new(ts(), FaultSeverity::Fatal, "halt"));
        log.clear();
        assert!(log.is_empty());
    }
}
