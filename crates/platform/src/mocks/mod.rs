//! Mock implementations for testing
//!
//! This module provides mock implementations of all platform traits for use
//! in unit and integration tests. The storage and capture mocks support
//! failure injection (counters that make the next N operations fail) so the
//! orchestrator's retry policy can be exercised deterministically.

#![cfg(any(test, feature = "std"))]
#![allow(clippy::arithmetic_side_effects)] // test support code; counters bounded by test size
#![allow(clippy::indexing_slicing)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::string::String;
use std::vec::Vec;

use crate::capture::{BufferSlot, CaptureArena, CaptureChannel};
use crate::power::{GainControl, Pacer, PowerRails, StatusLed};
use crate::rtc::{AlarmSpec, Rtc, Timestamp};
use crate::sensors::{EnvDatastring, EnvironmentalSensor, LightDatastring, LightSensor};
use crate::storage::Storage;

// ── Storage ─────────────────────────────────────────────────────────────────

/// Errors produced by [`MockStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockStorageError {
    /// An injected failure fired.
    Injected,
    /// Operation attempted before `mount`.
    NotMounted,
    /// `delete` on a file that does not exist.
    Missing,
}

/// Open-file handle for [`MockStorage`].
#[derive(Debug)]
pub struct MockFile {
    name: String,
}

/// In-memory card filesystem with failure injection.
#[derive(Debug, Default)]
pub struct MockStorage {
    /// Files by name, visible to assertions after a run.
    pub files: BTreeMap<String, Vec<u8>>,
    /// Names passed to `delete`, in order.
    pub deleted: Vec<String>,
    /// Total `write` calls observed.
    pub write_calls: u32,
    mounted: bool,
    fail_create: u32,
    fail_write: u32,
    fail_close: u32,
    short_write_next: Option<usize>,
}

impl MockStorage {
    /// Create an unmounted, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` `create` calls fail.
    pub fn inject_create_failures(&mut self, n: u32) {
        self.fail_create = n;
    }

    /// Make the next `n` `write` calls fail.
    pub fn inject_write_failures(&mut self, n: u32) {
        self.fail_write = n;
    }

    /// Make the next `n` `close` calls fail.
    pub fn inject_close_failures(&mut self, n: u32) {
        self.fail_close = n;
    }

    /// Make the next `write` report only `bytes` bytes written.
    pub fn inject_short_write(&mut self, bytes: usize) {
        self.short_write_next = Some(bytes);
    }

    /// Bytes currently stored under `name`.
    pub fn file_len(&self, name: &str) -> Option<usize> {
        self.files.get(name).map(Vec::len)
    }
}

impl Storage for MockStorage {
    type Error = MockStorageError;
    type File = MockFile;

    async fn mount(&mut self) -> Result<(), Self::Error> {
        self.mounted = true;
        Ok(())
    }

    async fn unmount(&mut self) -> Result<(), Self::Error> {
        self.mounted = false;
        Ok(())
    }

    async fn create(&mut self, name: &str) -> Result<Self::File, Self::Error> {
        if !self.mounted {
            return Err(MockStorageError::NotMounted);
        }
        if self.fail_create > 0 {
            self.fail_create -= 1;
            return Err(MockStorageError::Injected);
        }
        self.files.insert(String::from(name), Vec::new());
        Ok(MockFile {
            name: String::from(name),
        })
    }

    async fn write(
        &mut self,
        file: &mut Self::File,
        buf: &[u8],
    ) -> Result<usize, Self::Error> {
        self.write_calls += 1;
        if self.fail_write > 0 {
            self.fail_write -= 1;
            return Err(MockStorageError::Injected);
        }
        let take = match self.short_write_next.take() {
            Some(n) => n.min(buf.len()),
            None => buf.len(),
        };
        let slot = self
            .files
            .get_mut(&file.name)
            .ok_or(MockStorageError::Missing)?;
        slot.extend_from_slice(&buf[..take]);
        Ok(take)
    }

    async fn close(&mut self, _file: Self::File) -> Result<(), Self::Error> {
        if self.fail_close > 0 {
            self.fail_close -= 1;
            return Err(MockStorageError::Injected);
        }
        Ok(())
    }

    async fn exists(&mut self, name: &str) -> Result<bool, Self::Error> {
        Ok(self.files.contains_key(name))
    }

    async fn delete(&mut self, name: &str) -> Result<(), Self::Error> {
        self.deleted.push(String::from(name));
        self.files
            .remove(name)
            .map(|_| ())
            .ok_or(MockStorageError::Missing)
    }
}

// ── RTC ─────────────────────────────────────────────────────────────────────

/// RTC mock with a settable clock that steps forward on every read.
#[derive(Debug)]
pub struct MockRtc {
    /// The time the next `now` call returns.
    pub current: Timestamp,
    /// Seconds added after each `now` call.
    pub step_seconds: u8,
    /// Alarms programmed, in order.
    pub alarms: Vec<AlarmSpec>,
    /// Number of `sleep_until_alarm` calls.
    pub sleeps: u32,
    /// Number of `clear_alarm_status` calls.
    pub status_clears: u32,
}

impl MockRtc {
    /// Start the clock at `current`, advancing `step_seconds` per read.
    pub fn new(current: Timestamp, step_seconds: u8) -> Self {
        Self {
            current,
            step_seconds,
            alarms: Vec::new(),
            sleeps: 0,
            status_clears: 0,
        }
    }

    fn advance(&mut self) {
        let total = u16::from(self.current.seconds) + u16::from(self.step_seconds);
        self.current.seconds = (total % 60) as u8;
        let mut carry = total / 60;
        while carry > 0 {
            let m = u16::from(self.current.minutes) + 1;
            self.current.minutes = (m % 60) as u8;
            if m >= 60 {
                self.current.hours = (self.current.hours + 1) % 24;
            }
            carry -= 1;
        }
    }
}

impl Rtc for MockRtc {
    type Error = core::convert::Infallible;

    async fn now(&mut self) -> Result<Timestamp, Self::Error> {
        let t = self.current;
        self.advance();
        Ok(t)
    }

    async fn set_alarm(&mut self, alarm: AlarmSpec) -> Result<(), Self::Error> {
        self.alarms.push(alarm);
        Ok(())
    }

    async fn clear_alarm_status(&mut self) -> Result<(), Self::Error> {
        self.status_clears += 1;
        Ok(())
    }

    async fn sleep_until_alarm(&mut self) -> Result<(), Self::Error> {
        self.sleeps += 1;
        Ok(())
    }
}

// ── Sensors ─────────────────────────────────────────────────────────────────

/// Error type shared by the sensor mocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockSensorError;

/// Environmental sensor returning a canned datastring.
#[derive(Debug, Default)]
pub struct MockEnvSensor {
    /// The datastring every read returns.
    pub value: EnvDatastring,
    /// Number of `setup` calls.
    pub setups: u32,
    /// Number of reads served.
    pub reads: u32,
    fail_reads: u32,
}

impl MockEnvSensor {
    /// Mock returning `value` on every read.
    pub fn new(value: &str) -> Self {
        let mut s = EnvDatastring::new();
        let _ = s.push_str(value);
        Self {
            value: s,
            ..Self::default()
        }
    }

    /// Make the next `n` reads fail.
    pub fn inject_read_failures(&mut self, n: u32) {
        self.fail_reads = n;
    }
}

impl EnvironmentalSensor for MockEnvSensor {
    type Error = MockSensorError;

    async fn setup(&mut self) -> Result<(), Self::Error> {
        self.setups += 1;
        Ok(())
    }

    async fn read_datastring(&mut self) -> Result<EnvDatastring, Self::Error> {
        if self.fail_reads > 0 {
            self.fail_reads -= 1;
            return Err(MockSensorError);
        }
        self.reads += 1;
        Ok(self.value.clone())
    }
}

/// Light sensor returning a canned datastring.
#[derive(Debug, Default)]
pub struct MockLightSensor {
    /// The datastring every read returns.
    pub value: LightDatastring,
    /// Number of `setup` calls.
    pub setups: u32,
}

impl MockLightSensor {
    /// Mock returning `value` on every read.
    pub fn new(value: &str) -> Self {
        let mut s = LightDatastring::new();
        let _ = s.push_str(value);
        Self { value: s, setups: 0 }
    }
}

impl LightSensor for MockLightSensor {
    type Error = MockSensorError;

    async fn setup(&mut self) -> Result<(), Self::Error> {
        self.setups += 1;
        Ok(())
    }

    async fn read_datastring(&mut self) -> Result<LightDatastring, Self::Error> {
        Ok(self.value.clone())
    }
}

// ── Capture channel ─────────────────────────────────────────────────────────

/// One observable capture-channel event, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A slot became the active DMA target.
    Armed(BufferSlot),
    /// A slot's transfer completed (it is no longer armed unless chained).
    Completed(BufferSlot),
    /// A slot's samples were borrowed by the storage drain.
    Read(BufferSlot),
}

/// Errors produced by [`MockCapture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCaptureError {
    /// `wait_complete` called for a slot that was never armed.
    NotArmed(BufferSlot),
    /// `arm` called while another transfer was still armed.
    DoubleArm(BufferSlot),
}

/// Deterministic capture channel.
///
/// "Captures" a continuous wrapping sample ramp: slot fills continue the
/// ramp where the previous transfer left off, so a drained file whose
/// samples are consecutive proves the pipeline dropped nothing and drained
/// buffers in capture order.
#[derive(Debug)]
pub struct MockCapture<const N: usize> {
    arena: CaptureArena<N>,
    armed: Option<BufferSlot>,
    chained: bool,
    next_sample: i16,
    /// Number of `drain_fifo` calls.
    pub drains: u32,
    /// Number of `stop` calls.
    pub stops: u32,
    /// Divisors programmed via `set_clock_divisor`, in order.
    pub divisors: Vec<u32>,
    events: RefCell<Vec<CaptureEvent>>,
}

impl<const N: usize> Default for MockCapture<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MockCapture<N> {
    /// Create an idle channel with a fresh arena.
    pub fn new() -> Self {
        Self {
            arena: CaptureArena::new(),
            armed: None,
            chained: false,
            next_sample: 0,
            drains: 0,
            stops: 0,
            divisors: Vec::new(),
            events: RefCell::new(Vec::new()),
        }
    }

    /// Snapshot of the observed event trace.
    pub fn events(&self) -> Vec<CaptureEvent> {
        self.events.borrow().clone()
    }

    /// Count handoff-protocol violations in the recorded trace: reads of a
    /// slot while that same slot was the armed DMA target.
    pub fn exclusivity_violations(&self) -> usize {
        let mut armed: Option<BufferSlot> = None;
        let mut violations = 0;
        for event in self.events.borrow().iter() {
            match *event {
                CaptureEvent::Armed(slot) => armed = Some(slot),
                CaptureEvent::Completed(slot) => {
                    if armed == Some(slot) {
                        armed = None;
                    }
                }
                CaptureEvent::Read(slot) => {
                    if armed == Some(slot) {
                        violations += 1;
                    }
                }
            }
        }
        violations
    }

    fn fill(&mut self, slot: BufferSlot) {
        let mut sample = self.next_sample;
        for s in self.arena.slot_mut(slot) {
            *s = sample;
            sample = sample.wrapping_add(1);
        }
        self.next_sample = sample;
    }
}

impl<const N: usize> CaptureChannel for MockCapture<N> {
    type Error = MockCaptureError;

    fn set_clock_divisor(&mut self, divisor: u32) {
        self.divisors.push(divisor);
    }

    fn drain_fifo(&mut self) {
        self.drains += 1;
    }

    fn arm(&mut self, slot: BufferSlot) -> Result<(), Self::Error> {
        if self.armed.is_some() {
            return Err(MockCaptureError::DoubleArm(slot));
        }
        self.chained = false;
        self.armed = Some(slot);
        self.events.borrow_mut().push(CaptureEvent::Armed(slot));
        Ok(())
    }

    fn arm_chained(&mut self, first: BufferSlot) -> Result<(), Self::Error> {
        if self.armed.is_some() {
            return Err(MockCaptureError::DoubleArm(first));
        }
        self.chained = true;
        self.armed = Some(first);
        self.events.borrow_mut().push(CaptureEvent::Armed(first));
        Ok(())
    }

    async fn wait_complete(&mut self, slot: BufferSlot) -> Result<(), Self::Error> {
        if self.armed != Some(slot) {
            return Err(MockCaptureError::NotArmed(slot));
        }
        embassy_futures::yield_now().await;
        self.fill(slot);
        self.events.borrow_mut().push(CaptureEvent::Completed(slot));
        if self.chained {
            let next = slot.other();
            self.armed = Some(next);
            self.events.borrow_mut().push(CaptureEvent::Armed(next));
        } else {
            self.armed = None;
        }
        Ok(())
    }

    fn slot_samples(&self, slot: BufferSlot) -> &[i16] {
        self.events.borrow_mut().push(CaptureEvent::Read(slot));
        self.arena.slot(slot)
    }

    fn slot_len(&self) -> usize {
        N
    }

    fn stop(&mut self) {
        self.stops += 1;
        self.armed = None;
        self.chained = false;
    }
}

// ── Power / LED / gain / pacing ─────────────────────────────────────────────

/// Power-rail mock recording the switching order.
#[derive(Debug, Default)]
pub struct MockRails {
    /// Whether the analog rail is currently up.
    pub analog: bool,
    /// Whether the digital rail is currently up.
    pub digital: bool,
    /// Transition log, e.g. `"ana+"`, `"digi-"`.
    pub transitions: Vec<&'static str>,
}

impl PowerRails for MockRails {
    fn digital_enable(&mut self) {
        self.digital = true;
        self.transitions.push("digi+");
    }

    fn digital_disable(&mut self) {
        self.digital = false;
        self.transitions.push("digi-");
    }

    fn analog_enable(&mut self) {
        self.analog = true;
        self.transitions.push("ana+");
    }

    fn analog_disable(&mut self) {
        self.analog = false;
        self.transitions.push("ana-");
    }
}

/// Status-LED mock recording flash patterns.
#[derive(Debug, Default)]
pub struct MockLed {
    /// `(count, period_ms)` per `flash` call.
    pub flashes: Vec<(u32, u32)>,
}

impl StatusLed for MockLed {
    async fn flash(&mut self, count: u32, period_ms: u32) {
        self.flashes.push((count, period_ms));
    }
}

/// Gain-control mock recording programmed wiper steps.
#[derive(Debug, Default)]
pub struct MockGain {
    /// Wiper steps per `set_gain` call.
    pub gains: Vec<u8>,
}

impl GainControl for MockGain {
    type Error = core::convert::Infallible;

    async fn set_gain(&mut self, steps: u8) -> Result<(), Self::Error> {
        self.gains.push(steps);
        Ok(())
    }
}

/// Pacer mock that returns immediately, recording requested pauses.
#[derive(Debug, Default)]
pub struct MockPacer {
    /// Milliseconds per `pause_ms` call.
    pub pauses: Vec<u32>,
}

impl Pacer for MockPacer {
    async fn pause_ms(&mut self, ms: u32) {
        self.pauses.push(ms);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_storage_truncates_on_create() {
        let mut storage = MockStorage::new();
        storage.mount().await.unwrap();

        let mut f = storage.create("a.wav").await.unwrap();
        storage.write(&mut f, b"stale").await.unwrap();
        storage.close(f).await.unwrap();

        let f2 = storage.create("a.wav").await.unwrap();
        storage.close(f2).await.unwrap();
        assert_eq!(storage.file_len("a.wav"), Some(0));
    }

    #[tokio::test]
    async fn mock_storage_injected_write_failure_fires_once() {
        let mut storage = MockStorage::new();
        storage.mount().await.unwrap();
        storage.inject_write_failures(1);

        let mut f = storage.create("a.wav").await.unwrap();
        assert_eq!(
            storage.write(&mut f, b"xy").await,
            Err(MockStorageError::Injected)
        );
        assert_eq!(storage.write(&mut f, b"xy").await, Ok(2));
    }

    #[tokio::test]
    async fn mock_rtc_steps_forward_per_read() {
        let start = Timestamp {
            seconds: 58,
            minutes: 59,
            hours: 3,
            day: 1,
            month: 6,
            year: 26,
        };
        let mut rtc = MockRtc::new(start, 4);
        assert_eq!(rtc.now().await.unwrap().seconds, 58);
        let next = rtc.now().await.unwrap();
        assert_eq!(next.seconds, 2);
        assert_eq!(next.minutes, 0);
        assert_eq!(next.hours, 4);
    }

    #[tokio::test]
    async fn mock_capture_ramp_continues_across_slots() {
        let mut chan: MockCapture<4> = MockCapture::new();
        chan.arm(BufferSlot::A).unwrap();
        chan.wait_complete(BufferSlot::A).await.unwrap();
        chan.arm(BufferSlot::B).unwrap();
        chan.wait_complete(BufferSlot::B).await.unwrap();
        assert_eq!(chan.slot_samples(BufferSlot::A), &[0, 1, 2, 3]);
        assert_eq!(chan.slot_samples(BufferSlot::B), &[4, 5, 6, 7]);
    }

    #[tokio::test]
    async fn mock_capture_flags_read_of_armed_slot() {
        let mut chan: MockCapture<4> = MockCapture::new();
        chan.arm(BufferSlot::A).unwrap();
        let _ = chan.slot_samples(BufferSlot::A);
        assert_eq!(chan.exclusivity_violations(), 1);
    }
}
