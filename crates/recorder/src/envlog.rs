//! Environmental record buffer
//!
//! Records accumulate in RAM for one audio file's duration and are flushed
//! to the card in one burst between files, so the sampler never touches the
//! card while audio is draining. Cells are fixed-stride so the flush can
//! recover record boundaries without a length prefix: text first, zero
//! padding to the stride.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

/// Bytes per buffered record cell.
///
/// 22-byte timestring + `_` + 20-byte environmental datastring + `_` +
/// 29-byte light datastring + newline is 74 bytes worst case; 76 is the
/// canonical stride.
pub const ENV_RECORD_STRIDE: usize = 76;

/// Hard cap on records per file, sized for the longest supported file at the
/// shortest supported period plus margin (300 s / 5 s + 5).
pub const ENV_MAX_RECORDS: usize = 65;

/// Backing capacity in bytes.
pub const ENV_BUFFER_CAP: usize = ENV_RECORD_STRIDE * ENV_MAX_RECORDS;

/// The buffer shared between the sampler task (appends) and the orchestrator
/// (drains). Mutual exclusion is structural — the orchestrator only drains
/// after the sampler has acknowledged its stop request — but every access
/// still goes through the blocking mutex so torn reads are impossible even
/// across cores.
pub type SharedEnvBuffer = Mutex<CriticalSectionRawMutex, RefCell<EnvRecordBuffer>>;

/// Error: a file accumulated more records than its derived capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvBufferFull;

/// One formatted record, `<timestring>_<env>_<light>\n`.
pub type EnvRecord = heapless::String<ENV_RECORD_STRIDE>;

/// Format one record from its three datastrings.
pub fn build_record(timestring: &str, env: &str, light: &str) -> EnvRecord {
    use core::fmt::Write;
    let mut s = EnvRecord::new();
    // 74 bytes worst case against a 76-byte capacity; cannot fail.
    let _ = write!(s, "{timestring}_{env}_{light}\n");
    s
}

/// Append-only fixed-stride record buffer.
#[derive(Debug)]
pub struct EnvRecordBuffer {
    buf: heapless::Vec<u8, ENV_BUFFER_CAP>,
    limit_records: usize,
}

impl EnvRecordBuffer {
    /// Create an empty buffer holding at most `limit_records` records.
    ///
    /// The limit is clamped to [`ENV_MAX_RECORDS`]; session derivation
    /// rejects configurations that would need more.
    #[must_use]
    pub fn new(limit_records: usize) -> Self {
        Self {
            buf: heapless::Vec::new(),
            limit_records: limit_records.min(ENV_MAX_RECORDS),
        }
    }

    /// A zero-capacity buffer, usable in `static` initialisers; give it a
    /// real limit with [`reset`](Self::reset) at the start of each file.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            buf: heapless::Vec::new(),
            limit_records: 0,
        }
    }

    /// Reset to empty with a new per-file record limit.
    pub fn reset(&mut self, limit_records: usize) {
        self.buf.clear();
        self.limit_records = limit_records.min(ENV_MAX_RECORDS);
    }

    /// Append one record, zero-padded to the stride.
    pub fn append(&mut self, record: &str) -> Result<(), EnvBufferFull> {
        if self.record_count() >= self.limit_records {
            return Err(EnvBufferFull);
        }
        let text = record.as_bytes();
        let take = text.len().min(ENV_RECORD_STRIDE);
        // Capacity: limit_records <= ENV_MAX_RECORDS, so one more full
        // stride always fits; the extends cannot fail.
        let _ = self.buf.extend_from_slice(text.get(..take).unwrap_or(text));
        for _ in take..ENV_RECORD_STRIDE {
            let _ = self.buf.push(0);
        }
        Ok(())
    }

    /// Number of buffered records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.buf.len() / ENV_RECORD_STRIDE
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The per-file record limit currently in force.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit_records
    }

    /// Iterate the buffered records as text slices (padding trimmed).
    pub fn records(&self) -> impl Iterator<Item = &[u8]> {
        self.buf.chunks_exact(ENV_RECORD_STRIDE).map(|cell| {
            let end = cell
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(ENV_RECORD_STRIDE);
            cell.get(..end).unwrap_or(cell)
        })
    }
}
