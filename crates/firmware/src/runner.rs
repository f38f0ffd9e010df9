//! Session runner: bundles the core-0 peripherals into the orchestrator's
//! per-session context.

use platform::capture::CaptureChannel;
use platform::faultlog::FaultLog;
use platform::rtc::Rtc;
use platform::storage::Storage;

use recorder::coordinator::{BoundedFlagLock, SamplerFlags, SamplerLink};
use recorder::envlog::SharedEnvBuffer;
use recorder::error::Fault;
use recorder::orchestrator::{run_session, SessionIo};
use recorder::error::FaultKind;
use recorder::schedule::SessionRunner;
use recorder::session::SessionParams;

use crate::sdcard::SharedClock;

/// Everything core 0 lends the orchestrator for the length of a session.
pub struct FieldRunner<'a, S, C, R, F>
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
    /// Orchestrator's RTC handle (no alarm pin).
    pub rtc: &'a mut R,
    /// Persistent fault trail.
    pub faults: &'a mut F,
    /// Single-writer card gate.
    pub storage_gate: &'a BoundedFlagLock,
    /// Sampler control flags.
    pub flags: &'a SamplerFlags,
    /// Sampler pacing channel.
    pub link: &'a SamplerLink,
    /// Environmental record buffer.
    pub env_buffer: &'a SharedEnvBuffer,
    /// FAT timestamp source, refreshed from the RTC each session.
    pub fat_clock: &'static SharedClock,
}

impl<S, C, R, F> SessionRunner for FieldRunner<'_, S, C, R, F>
where
    S: Storage,
    C: CaptureChannel,
    R: Rtc,
    F: FaultLog,
{
    async fn run(&mut self, params: &SessionParams) -> Result<(), Fault> {
        if let Ok(now) = self.rtc.now().await {
            self.fat_clock.refresh(&now);
        }
        // The card is mounted for the session, not per file.
        if self.storage.mount().await.is_err() {
            return Err(Fault::Fatal(FaultKind::StorageOpen));
        }
        let result = {
            let mut io = SessionIo {
                storage: &mut *self.storage,
                chan: &mut *self.chan,
                rtc: &mut *self.rtc,
                faults: &mut *self.faults,
                storage_gate: self.storage_gate,
                flags: self.flags,
                link: self.link,
                env_buffer: self.env_buffer,
            };
            run_session(&mut io, params).await
        };
        let _ = self.storage.unmount().await;
        result
    }
}
