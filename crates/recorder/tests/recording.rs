//! End-to-end recording tests: orchestrator + capture pipeline + sampler
//! against the platform mocks, single-threaded like the target.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::arithmetic_side_effects)]

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use platform::mocks::{
    MockCapture, MockEnvSensor, MockLightSensor, MockRtc, MockStorage,
};
use platform::power::Pacer;
use platform::rtc::Timestamp;
use platform::{RamFaultLog, Storage};
use recorder::capture::CaptureStrategy;
use recorder::config::{Independent, SessionWindow};
use recorder::coordinator::{BoundedFlagLock, SamplerFlags, SamplerLink};
use recorder::envlog::{EnvRecordBuffer, SharedEnvBuffer};
use recorder::error::{Fault, FaultKind};
use recorder::orchestrator::{run_session, wav_filename, SessionIo};
use recorder::sampler::sampler_task;
use recorder::session::SessionParams;

const SLOT: usize = 64;

/// 1024 Hz, 30 s files, 1-minute session → two files of 61 440 data bytes.
fn params(env_enabled: bool) -> SessionParams {
    let ind = Independent {
        sample_rate_hz: 1024,
        file_seconds: 30,
        env_enabled,
        env_period_seconds: 1,
    };
    let window = SessionWindow {
        alarm_hour: 4,
        alarm_minute: 30,
        session_minutes: 1,
    };
    SessionParams::derive(&ind, &window, SLOT, CaptureStrategy::PingPong).unwrap()
}

fn frozen_rtc() -> MockRtc {
    MockRtc::new(
        Timestamp {
            seconds: 0,
            minutes: 30,
            hours: 4,
            day: 12,
            month: 11,
            year: 25,
        },
        0,
    )
}

/// Pacer whose "sleep" lasts until the orchestrator requests a stop, so each
/// file accumulates exactly one environmental record.
struct UntilStop(&'static SamplerFlags);

impl Pacer for UntilStop {
    async fn pause_ms(&mut self, _ms: u32) {
        while self.0.should_continue() {
            embassy_futures::yield_now().await;
        }
    }
}

struct Shared {
    flags: &'static SamplerFlags,
    link: &'static SamplerLink,
    buffer: &'static SharedEnvBuffer,
}

fn leak_shared() -> Shared {
    Shared {
        flags: Box::leak(Box::new(SamplerFlags::new())),
        link: Box::leak(Box::new(SamplerLink::new())),
        buffer: Box::leak(Box::new(Mutex::new(RefCell::new(EnvRecordBuffer::new(0))))),
    }
}

fn spawn_sampler(local: &tokio::task::LocalSet, shared: &Shared) {
    let flags = shared.flags;
    let link = shared.link;
    let buffer = shared.buffer;
    local.spawn_local(async move {
        let mut env = MockEnvSensor::new("45.2_101325_18.4");
        let mut light = MockLightSensor::new("1024_996_870_2101_40");
        let mut rtc = frozen_rtc();
        let mut pacer = UntilStop(flags);
        sampler_task(
            &mut env, &mut light, &mut rtc, &mut pacer, flags, link, buffer,
        )
        .await;
    });
}

#[tokio::test]
async fn session_records_every_file_byte_exactly() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let shared = leak_shared();
            let p = params(true);
            spawn_sampler(&local, &shared);

            let mut storage = MockStorage::new();
            storage.mount().await.unwrap();
            let mut chan: MockCapture<SLOT> = MockCapture::new();
            let mut rtc = frozen_rtc();
            let mut faults = RamFaultLog::new();
            let gate = BoundedFlagLock::new();

            let mut io = SessionIo {
                storage: &mut storage,
                chan: &mut chan,
                rtc: &mut rtc,
                faults: &mut faults,
                storage_gate: &gate,
                flags: shared.flags,
                link: shared.link,
                env_buffer: shared.buffer,
            };
            run_session(&mut io, &p).await.unwrap();

            // Both files exist with header + exactly target_bytes of data —
            // the no-drop invariant, observed at the card.
            let wav = storage.files.get("0_30_4_12_11_25.wav").unwrap();
            assert_eq!(wav.len() as u32, 44 + p.target_bytes);
            assert_eq!(&wav[..4], b"RIFF");
            assert_eq!(p.file_count, 2);

            // Environmental file carries the sampler's record.
            let env = storage.files.get("0_30_4_12_11_25.env.txt").unwrap();
            let text = String::from_utf8(env.clone()).unwrap();
            assert_eq!(
                text,
                "0_30_4_12_11_25_45.2_101325_18.4_1024_996_870_2101_40\n"
            );

            // The handoff protocol never drained an armed slot.
            assert_eq!(chan.exclusivity_violations(), 0);
        })
        .await;
}

#[tokio::test]
async fn one_transient_failure_retries_to_the_same_filename() {
    let p = params(false);

    // Reference run: no failures.
    let mut reference = MockStorage::new();
    reference.mount().await.unwrap();
    {
        let shared = leak_shared();
        let mut chan: MockCapture<SLOT> = MockCapture::new();
        let mut rtc = frozen_rtc();
        let mut faults = RamFaultLog::new();
        let gate = BoundedFlagLock::new();
        let mut io = SessionIo {
            storage: &mut reference,
            chan: &mut chan,
            rtc: &mut rtc,
            faults: &mut faults,
            storage_gate: &gate,
            flags: shared.flags,
            link: shared.link,
            env_buffer: shared.buffer,
        };
        run_session(&mut io, &p).await.unwrap();
    }

    // Faulted run: the first create fails once, then recovers.
    let mut storage = MockStorage::new();
    storage.mount().await.unwrap();
    storage.inject_create_failures(1);
    let shared = leak_shared();
    let mut chan: MockCapture<SLOT> = MockCapture::new();
    let mut rtc = frozen_rtc();
    let mut faults = RamFaultLog::new();
    let gate = BoundedFlagLock::new();
    let mut io = SessionIo {
        storage: &mut storage,
        chan: &mut chan,
        rtc: &mut rtc,
        faults: &mut faults,
        storage_gate: &gate,
        flags: shared.flags,
        link: shared.link,
        env_buffer: shared.buffer,
    };
    run_session(&mut io, &p).await.unwrap();

    // Same filenames, same sizes, as if nothing had happened.
    let names: Vec<_> = storage.files.keys().cloned().collect();
    let reference_names: Vec<_> = reference.files.keys().cloned().collect();
    assert_eq!(names, reference_names);
    for (name, bytes) in &storage.files {
        assert_eq!(bytes.len(), reference.files[name].len());
    }
    // The retry left a trail.
    assert_eq!(faults.len(), 1);
}

#[tokio::test]
async fn two_consecutive_failures_halt_the_session() {
    let p = params(false);
    let mut storage = MockStorage::new();
    storage.mount().await.unwrap();
    storage.inject_create_failures(2);

    let shared = leak_shared();
    let mut chan: MockCapture<SLOT> = MockCapture::new();
    let mut rtc = frozen_rtc();
    let mut faults = RamFaultLog::new();
    let gate = BoundedFlagLock::new();
    let mut io = SessionIo {
        storage: &mut storage,
        chan: &mut chan,
        rtc: &mut rtc,
        faults: &mut faults,
        storage_gate: &gate,
        flags: shared.flags,
        link: shared.link,
        env_buffer: shared.buffer,
    };
    let err = run_session(&mut io, &p).await.unwrap_err();

    // Escalated to fatal; the session did not proceed to later files.
    assert_eq!(err, Fault::Fatal(FaultKind::StorageOpen));
    assert!(storage.files.is_empty());
    // Retry then fatal were both recorded.
    assert_eq!(faults.len(), 2);
}

#[tokio::test]
async fn short_write_is_fatal_with_no_retry() {
    let p = params(false);
    let mut storage = MockStorage::new();
    storage.mount().await.unwrap();

    // The very first write (the header) lands short: integrity, not I/O.
    storage.inject_short_write(10);

    let shared = leak_shared();
    let mut chan: MockCapture<SLOT> = MockCapture::new();
    let mut rtc = frozen_rtc();
    let mut faults = RamFaultLog::new();
    let gate = BoundedFlagLock::new();
    let mut io = SessionIo {
        storage: &mut storage,
        chan: &mut chan,
        rtc: &mut rtc,
        faults: &mut faults,
        storage_gate: &gate,
        flags: shared.flags,
        link: shared.link,
        env_buffer: shared.buffer,
    };

    let err = run_session(&mut io, &p).await.unwrap_err();
    assert_eq!(err, Fault::Fatal(FaultKind::ShortWrite));
    // Exactly one attempt: a data-integrity fault is never retried.
    assert_eq!(storage.deleted.len(), 0);
}

#[tokio::test]
async fn rerunning_at_the_same_timestamp_replaces_the_file() {
    let p = params(false);
    let mut storage = MockStorage::new();
    storage.mount().await.unwrap();

    for _ in 0..2 {
        let shared = leak_shared();
        let mut chan: MockCapture<SLOT> = MockCapture::new();
        let mut rtc = frozen_rtc();
        let mut faults = RamFaultLog::new();
        let gate = BoundedFlagLock::new();
        let mut io = SessionIo {
            storage: &mut storage,
            chan: &mut chan,
            rtc: &mut rtc,
            faults: &mut faults,
            storage_gate: &gate,
            flags: shared.flags,
            link: shared.link,
            env_buffer: shared.buffer,
        };
        run_session(&mut io, &p).await.unwrap();
    }

    let name = wav_filename("0_30_4_12_11_25");
    // The second run deleted the first run's file before recreating it.
    assert!(storage.deleted.iter().any(|d| d == name.as_str()));
    let wav = storage.files.get(name.as_str()).unwrap();
    assert_eq!(wav.len() as u32, 44 + p.target_bytes);
}
