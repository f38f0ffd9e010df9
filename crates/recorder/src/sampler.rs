//! Environmental sampler task
//!
//! The persistent core-1 task body: launched once per session, parked on the
//! [`SamplerLink`] between files, and paced by the RTC-derived period while
//! a file records. It owns the sensor handles; everything it shares with
//! core 0 goes through [`SamplerFlags`] and the [`SharedEnvBuffer`].

use platform::power::Pacer;
use platform::rtc::Rtc;
use platform::sensors::{EnvironmentalSensor, LightSensor};

use crate::coordinator::{SamplerFlags, SamplerLink};
use crate::envlog::{build_record, SharedEnvBuffer};
use crate::session::SessionParams;

/// Milliseconds shaved off each pause to absorb the cost of the sample
/// itself, keeping the long-run period close to nominal.
const PACE_TRIM_MS: u32 = 5;

/// The persistent sampler task body. Never returns; it outlives files and
/// sessions alike (each `Start` carries its session's parameters), so the
/// pacing of the sample train is undisturbed by per-file audio bookkeeping.
pub async fn sampler_task<E, L, R, P>(
    env: &mut E,
    light: &mut L,
    rtc: &mut R,
    pacer: &mut P,
    flags: &SamplerFlags,
    link: &SamplerLink,
    buffer: &SharedEnvBuffer,
) where
    E: EnvironmentalSensor,
    L: LightSensor,
    R: Rtc,
    P: Pacer,
{
    if env.setup().await.is_err() || light.setup().await.is_err() {
        flags.mark_failed();
    }
    loop {
        let crate::coordinator::SamplerCommand::Start(params) = link.wait_start().await;
        flags.begin();
        sample_file_phase(env, light, rtc, pacer, flags, buffer, &params).await;
    }
}

/// One file's worth of sampling: loop until asked to stop.
///
/// The stop flag is polled once per sample, *after* the append, so
/// cancellation never lands mid-sample; the sleeping flag brackets the
/// inter-sample pause so the orchestrator can see "truly idle".
pub async fn sample_file_phase<E, L, R, P>(
    env: &mut E,
    light: &mut L,
    rtc: &mut R,
    pacer: &mut P,
    flags: &SamplerFlags,
    buffer: &SharedEnvBuffer,
    params: &SessionParams,
) where
    E: EnvironmentalSensor,
    L: LightSensor,
    R: Rtc,
    P: Pacer,
{
    buffer.lock(|b| {
        b.borrow_mut()
            .reset(params.env_capacity_records as usize);
    });

    while flags.should_continue() {
        flags.set_sleeping(false);

        let Ok(env_string) = env.read_datastring().await else {
            return fail(flags);
        };
        let Ok(light_string) = light.read_datastring().await else {
            return fail(flags);
        };
        let Ok(stamp) = rtc.now().await else {
            return fail(flags);
        };

        let record = build_record(&stamp.timestring(), &env_string, &light_string);
        let appended = buffer.lock(|b| b.borrow_mut().append(&record));
        if appended.is_err() {
            // Capacity is derived to make this unreachable; treat an
            // overrun like any other sampling fault.
            return fail(flags);
        }

        flags.set_sleeping(true);
        if !flags.should_continue() {
            break;
        }
        pacer
            .pause_ms(
                params
                    .env_period_seconds
                    .saturating_mul(1000)
                    .saturating_sub(PACE_TRIM_MS),
            )
            .await;
    }
    flags.set_sleeping(true);
}

fn fail(flags: &SamplerFlags) {
    flags.mark_failed();
    flags.set_sleeping(true);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use crate::capture::CaptureStrategy;
    use crate::config::{Independent, SessionWindow};
    use crate::envlog::EnvRecordBuffer;
    use core::cell::RefCell;
    use embassy_sync::blocking_mutex::Mutex;
    use platform::mocks::{MockEnvSensor, MockLightSensor, MockPacer, MockRtc};
    use platform::rtc::Timestamp;

    fn params() -> SessionParams {
        let ind = Independent {
            sample_rate_hz: 1024,
            file_seconds: 30,
            env_enabled: true,
            env_period_seconds: 5,
        };
        let window = SessionWindow {
            alarm_hour: 0,
            alarm_minute: 0,
            session_minutes: 1,
        };
        SessionParams::derive(&ind, &window, 64, CaptureStrategy::PingPong).unwrap()
    }

    fn stamp() -> Timestamp {
        Timestamp {
            seconds: 0,
            minutes: 30,
            hours: 4,
            day: 12,
            month: 11,
            year: 25,
        }
    }

    /// Pacer that requests a stop after `samples_before_stop` pauses, then
    /// yields until the phase observes it.
    struct StopAfter<'a> {
        flags: &'a SamplerFlags,
        remaining: u32,
    }

    impl Pacer for StopAfter<'_> {
        async fn pause_ms(&mut self, _ms: u32) {
            if self.remaining == 0 {
                self.flags.request_stop();
            } else {
                self.remaining -= 1;
            }
        }
    }

    #[tokio::test]
    async fn phase_appends_until_stop_is_requested() {
        let flags = SamplerFlags::new();
        flags.begin();
        let buffer: SharedEnvBuffer = Mutex::new(RefCell::new(EnvRecordBuffer::new(0)));
        let mut env = MockEnvSensor::new("45.2_101325_18.4");
        let mut light = MockLightSensor::new("1024_996_870_2101_40");
        let mut rtc = MockRtc::new(stamp(), 5);
        let mut pacer = StopAfter {
            flags: &flags,
            remaining: 2,
        };

        sample_file_phase(
            &mut env, &mut light, &mut rtc, &mut pacer, &flags, &buffer, &params(),
        )
        .await;

        assert!(flags.is_sleeping());
        assert!(!flags.take_failed());
        buffer.lock(|b| {
            let b = b.borrow();
            // Two full pauses plus the stopping one: three samples landed.
            assert_eq!(b.record_count(), 3);
            let first: Vec<u8> = b.records().next().unwrap().to_vec();
            assert_eq!(
                first,
                b"0_30_4_12_11_25_45.2_101325_18.4_1024_996_870_2101_40\n"
            );
        });
    }

    #[tokio::test]
    async fn phase_resets_the_buffer_before_sampling() {
        let flags = SamplerFlags::new();
        let buffer: SharedEnvBuffer = Mutex::new(RefCell::new(EnvRecordBuffer::new(5)));
        buffer.lock(|b| b.borrow_mut().append("stale\n").unwrap());
        // Stop already requested: the phase must still reset the buffer.
        let mut env = MockEnvSensor::new("e");
        let mut light = MockLightSensor::new("l");
        let mut rtc = MockRtc::new(stamp(), 0);
        let mut pacer = MockPacer::default();

        sample_file_phase(
            &mut env, &mut light, &mut rtc, &mut pacer, &flags, &buffer, &params(),
        )
        .await;

        buffer.lock(|b| assert!(b.borrow().is_empty()));
    }

    #[tokio::test]
    async fn sensor_fault_latches_and_leaves_idle() {
        let flags = SamplerFlags::new();
        flags.begin();
        let buffer: SharedEnvBuffer = Mutex::new(RefCell::new(EnvRecordBuffer::new(5)));
        let mut env = MockEnvSensor::new("e");
        env.inject_read_failures(1);
        let mut light = MockLightSensor::new("l");
        let mut rtc = MockRtc::new(stamp(), 0);
        let mut pacer = MockPacer::default();

        sample_file_phase(
            &mut env, &mut light, &mut rtc, &mut pacer, &flags, &buffer, &params(),
        )
        .await;

        assert!(flags.take_failed());
        assert!(flags.is_sleeping());
        buffer.lock(|b| assert!(b.borrow().is_empty()));
    }

    #[tokio::test]
    async fn pause_is_trimmed_below_the_nominal_period() {
        let flags = SamplerFlags::new();
        flags.begin();
        let buffer: SharedEnvBuffer = Mutex::new(RefCell::new(EnvRecordBuffer::new(5)));
        let mut env = MockEnvSensor::new("e");
        let mut light = MockLightSensor::new("l");
        let mut rtc = MockRtc::new(stamp(), 0);

        // One pause, then stop.
        struct OnePause<'a>(&'a SamplerFlags, MockPacer);
        impl Pacer for OnePause<'_> {
            async fn pause_ms(&mut self, ms: u32) {
                self.1.pause_ms(ms).await;
                self.0.request_stop();
            }
        }
        let mut pacer = OnePause(&flags, MockPacer::default());

        sample_file_phase(
            &mut env, &mut light, &mut rtc, &mut pacer, &flags, &buffer, &params(),
        )
        .await;

        assert_eq!(pacer.1.pauses, vec![5 * 1000 - PACE_TRIM_MS]);
    }
}
