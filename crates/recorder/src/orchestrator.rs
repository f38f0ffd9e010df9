//! Session orchestrator
//!
//! Sequences one session's file lifecycle — `OPEN_AUDIO → CAPTURING →
//! CLOSE_AUDIO → FLUSH_ENV` per file, `file_count` times — and owns the only
//! retry boundary in the system: each file attempt may be retried exactly
//! once after a transient fault; a second consecutive failure, or any fatal
//! fault, aborts the session. The layer above sees "session complete" or
//! fatal, nothing in between.

use core::fmt::Write as _;

use platform::capture::CaptureChannel;
use platform::faultlog::{FaultLog, FaultRecord, FaultSeverity};
use platform::rtc::{Rtc, TIMESTRING_CAP};
use platform::storage::Storage;

use crate::capture::{capture_file, CaptureFault};
use crate::coordinator::{BoundedFlagLock, SamplerFlags, SamplerLink, BOUNDED_WAIT_POLLS};
use crate::envlog::{SharedEnvBuffer, ENV_RECORD_STRIDE};
use crate::error::{Fault, FaultKind};
use crate::session::SessionParams;
use crate::wav::{WavSpec, WAV_HEADER_LEN};

/// Capacity of a produced filename: a timestring plus the longest suffix.
pub const FILENAME_CAP: usize = TIMESTRING_CAP + 8;

/// A produced filename.
pub type Filename = heapless::String<FILENAME_CAP>;

fn filename(timestring: &str, suffix: &str) -> Filename {
    let mut s = Filename::new();
    // Suffixes are fixed and the timestring is capped; cannot overflow.
    let _ = write!(s, "{timestring}{suffix}");
    s
}

/// `<timestring>.wav`
pub fn wav_filename(timestring: &str) -> Filename {
    filename(timestring, ".wav")
}

/// `<timestring>.env.txt`
pub fn env_filename(timestring: &str) -> Filename {
    filename(timestring, ".env.txt")
}

/// `<timestring>.log`
pub fn log_filename(timestring: &str) -> Filename {
    filename(timestring, ".log")
}

/// Everything one session's files are made from.
///
/// An explicit context passed by reference — there is no process-wide
/// mutable state anywhere in the recording path.
pub struct SessionIo<'a, S, C, R, F>
where
    S: Storage,
    C: CaptureChannel,
    R: Rtc,
    F: FaultLog,
{
    /// Card filesystem.
    pub storage: &'a mut S,
    /// ADC capture channel.
    pub chan: &'a mut C,
    /// Shared external RTC.
    pub rtc: &'a mut R,
    /// Persistent fault trail.
    pub faults: &'a mut F,
    /// Single-writer gate on the card.
    pub storage_gate: &'a BoundedFlagLock,
    /// Sampler control flags (shared with core 1).
    pub flags: &'a SamplerFlags,
    /// Sampler pacing channel (shared with core 1).
    pub link: &'a SamplerLink,
    /// Environmental record buffer (shared with core 1).
    pub env_buffer: &'a SharedEnvBuffer,
}

/// What one successful file left on the card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    /// The audio filename.
    pub wav_name: Filename,
    /// Data bytes captured (exactly the session target).
    pub data_bytes: u32,
}

/// Run one complete session: `file_count` files with retry-once.
pub async fn run_session<S, C, R, F>(
    io: &mut SessionIo<'_, S, C, R, F>,
    params: &SessionParams,
) -> Result<(), Fault>
where
    S: Storage,
    C: CaptureChannel,
    R: Rtc,
    F: FaultLog,
{
    write_session_log(io).await;

    for _ in 0..params.file_count {
        if let Err(fault) = record_file(io, params).await {
            if fault.is_fatal() {
                log_fault(io, FaultSeverity::Fatal, fault).await;
                return Err(fault);
            }
            log_fault(io, FaultSeverity::Retry, fault).await;
            reset_sampler(io).await;
            if let Err(second) = record_file(io, params).await {
                let fatal = second.escalate();
                log_fault(io, FaultSeverity::Fatal, fatal).await;
                return Err(fatal);
            }
        }
    }

    // Session teardown: park the sampler before the core is reset.
    reset_sampler(io).await;
    Ok(())
}

/// Record one audio file (and flush its environmental records).
pub async fn record_file<S, C, R, F>(
    io: &mut SessionIo<'_, S, C, R, F>,
    params: &SessionParams,
) -> Result<FileOutcome, Fault>
where
    S: Storage,
    C: CaptureChannel,
    R: Rtc,
    F: FaultLog,
{
    let stamp = io
        .rtc
        .now()
        .await
        .map_err(|_| Fault::Transient(FaultKind::SensorRead))?;
    let timestring = stamp.timestring();

    // Wake the sampler first; it paces itself from here.
    if params.env_enabled {
        io.link.start(*params).await;
    }

    let wav_name = wav_filename(&timestring);
    let data_bytes = {
        let _guard = io
            .storage_gate
            .acquire(BOUNDED_WAIT_POLLS)
            .await
            .map_err(|_| Fault::Transient(FaultKind::LockTimeout))?;

        let mut file = open_fresh(io.storage, &wav_name).await?;

        let header = WavSpec {
            sample_rate_hz: params.sample_rate_hz,
            data_bytes: params.target_bytes,
        }
        .header();
        let written = io
            .storage
            .write(&mut file, &header)
            .await
            .map_err(|_| Fault::Transient(FaultKind::StorageWrite))?;
        if written != WAV_HEADER_LEN {
            return Err(Fault::Fatal(FaultKind::ShortWrite));
        }

        let data_bytes = capture_file(io.chan, io.storage, &mut file, params)
            .await
            .map_err(|fault| match fault {
                CaptureFault::Storage(_) => Fault::Transient(FaultKind::StorageWrite),
                CaptureFault::ShortWrite { .. } => Fault::Fatal(FaultKind::ShortWrite),
                CaptureFault::Channel(_) => Fault::Fatal(FaultKind::CaptureChannel),
            })?;

        // A close failure after a byte-exact capture does not invalidate the
        // data already on the card: log it and move on.
        if io.storage.close(file).await.is_err() {
            append_fault_record(
                io.faults,
                &timestring,
                FaultSeverity::Warning,
                "audio close failed",
            );
        }
        data_bytes
    };

    if params.env_enabled {
        flush_env(io).await?;
    }

    Ok(FileOutcome {
        wav_name,
        data_bytes,
    })
}

/// Stop the sampler and flush its accumulated records to `<ts>.env.txt`.
async fn flush_env<S, C, R, F>(io: &mut SessionIo<'_, S, C, R, F>) -> Result<(), Fault>
where
    S: Storage,
    C: CaptureChannel,
    R: Rtc,
    F: FaultLog,
{
    io.flags.request_stop();
    io.flags
        .wait_idle(BOUNDED_WAIT_POLLS)
        .await
        .map_err(|_| Fault::Transient(FaultKind::SamplerStuck))?;
    if io.flags.take_failed() {
        return Err(Fault::Transient(FaultKind::SensorRead));
    }

    let stamp = io
        .rtc
        .now()
        .await
        .map_err(|_| Fault::Transient(FaultKind::SensorRead))?;
    let name = env_filename(&stamp.timestring());

    let _guard = io
        .storage_gate
        .acquire(BOUNDED_WAIT_POLLS)
        .await
        .map_err(|_| Fault::Transient(FaultKind::LockTimeout))?;

    let mut file = open_fresh(io.storage, &name).await?;

    let count = io.env_buffer.lock(|b| b.borrow().record_count());
    for index in 0..count {
        // Copy one record out so no RefCell borrow is held across the
        // storage await.
        let mut cell = [0u8; ENV_RECORD_STRIDE];
        let len = io.env_buffer.lock(|b| {
            let b = b.borrow();
            let len = b
                .records()
                .nth(index)
                .map_or(0, |record| copy_record(&mut cell, record));
            len
        });
        let text = cell.get(..len).unwrap_or(&[]);
        let written = io
            .storage
            .write(&mut file, text)
            .await
            .map_err(|_| Fault::Transient(FaultKind::StorageWrite))?;
        if written != len {
            return Err(Fault::Fatal(FaultKind::ShortWrite));
        }
    }

    io.storage
        .close(file)
        .await
        .map_err(|_| Fault::Transient(FaultKind::StorageClose))?;
    Ok(())
}

fn copy_record(cell: &mut [u8; ENV_RECORD_STRIDE], record: &[u8]) -> usize {
    let len = record.len().min(ENV_RECORD_STRIDE);
    if let (Some(dst), Some(src)) = (cell.get_mut(..len), record.get(..len)) {
        dst.copy_from_slice(src);
    }
    len
}

/// Delete-then-create: a pre-existing file of the same name (a retry at a
/// frozen timestamp, or a clock reset) is replaced, never appended to.
async fn open_fresh<S: Storage>(storage: &mut S, name: &str) -> Result<S::File, Fault> {
    let exists = storage
        .exists(name)
        .await
        .map_err(|_| Fault::Transient(FaultKind::StorageOpen))?;
    if exists {
        storage
            .delete(name)
            .await
            .map_err(|_| Fault::Transient(FaultKind::StorageOpen))?;
    }
    storage
        .create(name)
        .await
        .map_err(|_| Fault::Transient(FaultKind::StorageOpen))
}

/// Bring the sampler to a known-parked state (used on retry and teardown).
async fn reset_sampler<S, C, R, F>(io: &mut SessionIo<'_, S, C, R, F>)
where
    S: Storage,
    C: CaptureChannel,
    R: Rtc,
    F: FaultLog,
{
    io.flags.request_stop();
    let _ = io.flags.wait_idle(BOUNDED_WAIT_POLLS).await;
    let _ = io.flags.take_failed();
}

/// Drain the persistent fault trail into `<ts>.log` at session start.
///
/// Best-effort: a unit that cannot write its log still records audio.
async fn write_session_log<S, C, R, F>(io: &mut SessionIo<'_, S, C, R, F>)
where
    S: Storage,
    C: CaptureChannel,
    R: Rtc,
    F: FaultLog,
{
    let has_records = io.faults.records().next().is_some();
    if !has_records {
        return;
    }
    let Ok(stamp) = io.rtc.now().await else { return };
    let name = log_filename(&stamp.timestring());

    let Ok(_guard) = io.storage_gate.acquire(BOUNDED_WAIT_POLLS).await else {
        return;
    };
    let Ok(mut file) = open_fresh(io.storage, &name).await else {
        return;
    };
    // Iterate by index so no borrow of the fault log outlives an await.
    let mut index = 0usize;
    loop {
        let line: Option<heapless::String<128>> =
            io.faults.records().nth(index).map(|record| {
                let tag = match record.severity {
                    FaultSeverity::Warning => 'W',
                    FaultSeverity::Retry => 'R',
                    FaultSeverity::Fatal => 'F',
                };
                let crc_note = if record.verify() { "" } else { "_CRC!" };
                let mut line = heapless::String::new();
                let _ = writeln!(
                    line,
                    "{}_{}_{}{}",
                    record.timestring, tag, record.message, crc_note
                );
                line
            });
        let Some(line) = line else { break };
        if io.storage.write(&mut file, line.as_bytes()).await.is_err() {
            break;
        }
        index = index.saturating_add(1);
    }
    let _ = io.storage.close(file).await;
    io.faults.clear();
}

async fn log_fault<S, C, R, F>(
    io: &mut SessionIo<'_, S, C, R, F>,
    severity: FaultSeverity,
    fault: Fault,
) where
    S: Storage,
    C: CaptureChannel,
    R: Rtc,
    F: FaultLog,
{
    let timestring = match io.rtc.now().await {
        Ok(stamp) => stamp.timestring(),
        Err(_) => heapless::String::new(),
    };
    let mut message = heapless::String::<64>::new();
    let _ = write!(message, "{fault}");
    append_fault_record(io.faults, &timestring, severity, &message);
}

fn append_fault_record<F: FaultLog>(
    faults: &mut F,
    timestring: &str,
    severity: FaultSeverity,
    message: &str,
) {
    let mut ts = heapless::String::new();
    let _ = ts.push_str(timestring);
    faults.append(FaultRecord::new(ts, severity, message));
}
