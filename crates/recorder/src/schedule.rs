//! Schedule and power controller
//!
//! Walks the configured sessions in order: program the RTC alarm, power
//! down to dormant, wake on the alarm pin, bring the rails and gain up, run
//! the session, power back down. Terminal states are distinct and
//! inspectable — a configuration failure flashes the error pattern forever
//! rather than crashing, and a completed USB configuration pass holds idle
//! for a bounded period.
//!
//! ```text
//! IDLE → WAIT_FOR_ALARM(1) → ACTIVE_SESSION(1) → WAIT_FOR_ALARM(2) → … → IDLE
//! ```

use platform::power::{GainControl, Pacer, PowerRails, StatusLed};
use platform::rtc::{AlarmSpec, Rtc};

use crate::capture::CaptureStrategy;
use crate::config::ConfigBlock;
use crate::error::{Fault, FaultKind};
use crate::session::{DeriveError, SessionParams};

/// Milestone pattern: ten quick flashes on session wake.
pub const FLASH_MILESTONE_COUNT: u32 = 10;
/// Milestone flash period, ms.
pub const FLASH_MILESTONE_PERIOD_MS: u32 = 100;

/// Error pattern: sustained rapid flashing.
pub const FLASH_ERROR_COUNT: u32 = 1000;
/// Error flash period, ms.
pub const FLASH_ERROR_PERIOD_MS: u32 = 100;

/// Boot milestone: one long flash when proceeding without a host handshake.
pub const FLASH_BOOT_PERIOD_MS: u32 = 10_000;

/// Default capture gain in digipot wiper steps.
pub const DEFAULT_GAIN_STEPS: u8 = 20;

/// How long the device idles after a configuration pass before dormancy.
pub const CONFIGURED_IDLE_MS: u32 = 3_600_000;

/// Result of the boot-time host handshake attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootOutcome {
    /// No host present; proceed to the recording schedule.
    NoHandshake,
    /// A host rewrote the configuration; idle, do not record.
    Configured,
    /// A host was present but configuration failed.
    ConfigFailed,
}

/// Why the schedule aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScheduleError {
    /// Session derivation rejected the configuration.
    Config(DeriveError),
    /// The configuration names a session index it does not contain.
    MissingWindow(usize),
    /// The RTC failed while programming or waiting on an alarm.
    Rtc,
    /// A session aborted fatally.
    SessionFatal(FaultKind),
}

/// One session's execution, abstracted so the controller can be exercised
/// without the full orchestrator stack behind it.
pub trait SessionRunner {
    /// Run one session to completion.
    fn run(
        &mut self,
        params: &SessionParams,
    ) -> impl core::future::Future<Output = Result<(), Fault>>;
}

/// Act on the boot handshake outcome. Returns `true` when the schedule
/// should run.
pub async fn handle_boot_outcome<L, P>(outcome: BootOutcome, led: &mut L, pacer: &mut P) -> bool
where
    L: StatusLed,
    P: Pacer,
{
    match outcome {
        BootOutcome::NoHandshake => {
            led.flash(1, FLASH_BOOT_PERIOD_MS).await;
            true
        }
        BootOutcome::Configured => {
            pacer.pause_ms(CONFIGURED_IDLE_MS).await;
            false
        }
        BootOutcome::ConfigFailed => {
            led.flash(FLASH_ERROR_COUNT, FLASH_ERROR_PERIOD_MS).await;
            pacer.pause_ms(CONFIGURED_IDLE_MS).await;
            false
        }
    }
}

/// Flash the error pattern forever. The distinct, recoverable-by-inspection
/// terminal state for configuration faults; never returns.
pub async fn halt_config_error<L: StatusLed>(led: &mut L) {
    loop {
        led.flash(FLASH_ERROR_COUNT, FLASH_ERROR_PERIOD_MS).await;
    }
}

/// Run every configured session in order. Returns the number completed.
#[allow(clippy::too_many_arguments)] // one seam per peripheral, wired once in main
pub async fn run_schedule<R, W, L, G, RUN>(
    cfg: &ConfigBlock,
    slot_samples: usize,
    strategy: CaptureStrategy,
    rtc: &mut R,
    rails: &mut W,
    led: &mut L,
    gain: &mut G,
    runner: &mut RUN,
) -> Result<usize, ScheduleError>
where
    R: Rtc,
    W: PowerRails,
    L: StatusLed,
    G: GainControl,
    RUN: SessionRunner,
{
    let independent = cfg.independent();
    let mut completed = 0usize;

    for index in 1..=cfg.session_count() {
        let window = cfg
            .session(index)
            .ok_or(ScheduleError::MissingWindow(index))?;
        let params = SessionParams::derive(&independent, &window, slot_samples, strategy)
            .map_err(ScheduleError::Config)?;

        rtc.set_alarm(AlarmSpec::daily(window.alarm_minute, window.alarm_hour))
            .await
            .map_err(|_| ScheduleError::Rtc)?;
        rtc.clear_alarm_status()
            .await
            .map_err(|_| ScheduleError::Rtc)?;

        // Down to RTC pull-ups only for the wait.
        rails.analog_disable();
        rails.digital_disable();
        rtc.sleep_until_alarm().await.map_err(|_| ScheduleError::Rtc)?;
        rails.digital_enable();
        rails.analog_enable();

        led.flash(FLASH_MILESTONE_COUNT, FLASH_MILESTONE_PERIOD_MS).await;
        // A wrong gain degrades a session; it does not end one.
        let _ = gain.set_gain(DEFAULT_GAIN_STEPS).await;

        let outcome = runner.run(&params).await;
        rails.analog_disable();
        match outcome {
            Ok(()) => completed = completed.saturating_add(1),
            Err(fault) => return Err(ScheduleError::SessionFatal(fault.kind())),
        }
    }

    Ok(completed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::tests::valid_slots;
    use platform::mocks::{MockGain, MockLed, MockPacer, MockRails, MockRtc};
    use platform::rtc::Timestamp;

    struct ScriptedRunner {
        ran: Vec<SessionParams>,
        fail_on: Option<usize>,
    }

    impl SessionRunner for ScriptedRunner {
        async fn run(&mut self, params: &SessionParams) -> Result<(), Fault> {
            self.ran.push(*params);
            if self.fail_on == Some(self.ran.len()) {
                return Err(Fault::Fatal(FaultKind::ShortWrite));
            }
            Ok(())
        }
    }

    fn rtc() -> MockRtc {
        MockRtc::new(
            Timestamp {
                seconds: 0,
                minutes: 0,
                hours: 0,
                day: 1,
                month: 1,
                year: 26,
            },
            1,
        )
    }

    const SLOT: usize = 4800;

    #[tokio::test]
    async fn schedule_walks_every_session_in_order() {
        let cfg = ConfigBlock::from_slots(valid_slots()).unwrap();
        let mut rtc = rtc();
        let mut rails = MockRails::default();
        let mut led = MockLed::default();
        let mut gain = MockGain::default();
        let mut runner = ScriptedRunner {
            ran: Vec::new(),
            fail_on: None,
        };

        let completed = run_schedule(
            &cfg,
            SLOT,
            CaptureStrategy::PingPong,
            &mut rtc,
            &mut rails,
            &mut led,
            &mut gain,
            &mut runner,
        )
        .await
        .unwrap();

        assert_eq!(completed, 2);
        assert_eq!(rtc.sleeps, 2);
        // Alarms carry each window's (minute, hour).
        assert_eq!(rtc.alarms.len(), 2);
        assert_eq!((rtc.alarms[0].minute, rtc.alarms[0].hour), (30, 4));
        assert_eq!((rtc.alarms[1].minute, rtc.alarms[1].hour), (0, 21));
        assert!(rtc.alarms.iter().all(|a| a.repeat_daily));
        // Gain set once per session.
        assert_eq!(gain.gains, vec![DEFAULT_GAIN_STEPS, DEFAULT_GAIN_STEPS]);
        // Sessions derived from the page: 5 and 90 minutes of 30 s files.
        assert_eq!(runner.ran[0].file_count, 10);
        assert_eq!(runner.ran[1].file_count, 180);
    }

    #[tokio::test]
    async fn rails_cycle_down_for_the_wait_and_up_for_the_session() {
        let cfg = ConfigBlock::from_slots(valid_slots()).unwrap();
        let mut rtc = rtc();
        let mut rails = MockRails::default();
        let mut led = MockLed::default();
        let mut gain = MockGain::default();
        let mut runner = ScriptedRunner {
            ran: Vec::new(),
            fail_on: None,
        };

        run_schedule(
            &cfg,
            SLOT,
            CaptureStrategy::PingPong,
            &mut rtc,
            &mut rails,
            &mut led,
            &mut gain,
            &mut runner,
        )
        .await
        .unwrap();

        // Per session: ana-/digi- before the sleep, digi+/ana+ after the
        // wake, ana- at session end.
        let per_session = ["ana-", "digi-", "digi+", "ana+", "ana-"];
        let expected: Vec<&str> = per_session
            .iter()
            .chain(per_session.iter())
            .copied()
            .collect();
        assert_eq!(rails.transitions, expected);
        assert!(!rails.analog);
    }

    #[tokio::test]
    async fn fatal_session_stops_the_schedule_with_rails_down() {
        let cfg = ConfigBlock::from_slots(valid_slots()).unwrap();
        let mut rtc = rtc();
        let mut rails = MockRails::default();
        let mut led = MockLed::default();
        let mut gain = MockGain::default();
        let mut runner = ScriptedRunner {
            ran: Vec::new(),
            fail_on: Some(1),
        };

        let err = run_schedule(
            &cfg,
            SLOT,
            CaptureStrategy::PingPong,
            &mut rtc,
            &mut rails,
            &mut led,
            &mut gain,
            &mut runner,
        )
        .await
        .unwrap_err();

        assert_eq!(err, ScheduleError::SessionFatal(FaultKind::ShortWrite));
        assert_eq!(runner.ran.len(), 1);
        assert!(!rails.analog);
    }

    #[tokio::test]
    async fn misaligned_configuration_is_rejected_before_any_sleep() {
        let cfg = ConfigBlock::from_slots(valid_slots()).unwrap();
        let mut rtc = rtc();
        let mut rails = MockRails::default();
        let mut led = MockLed::default();
        let mut gain = MockGain::default();
        let mut runner = ScriptedRunner {
            ran: Vec::new(),
            fail_on: None,
        };

        let err = run_schedule(
            &cfg,
            4801, // does not divide the target
            CaptureStrategy::PingPong,
            &mut rtc,
            &mut rails,
            &mut led,
            &mut gain,
            &mut runner,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ScheduleError::Config(_)));
        assert_eq!(rtc.sleeps, 0);
    }

    #[tokio::test]
    async fn boot_outcomes_gate_the_schedule() {
        let mut led = MockLed::default();
        let mut pacer = MockPacer::default();
        assert!(handle_boot_outcome(BootOutcome::NoHandshake, &mut led, &mut pacer).await);
        assert!(!handle_boot_outcome(BootOutcome::Configured, &mut led, &mut pacer).await);
        assert!(!handle_boot_outcome(BootOutcome::ConfigFailed, &mut led, &mut pacer).await);
        // The failed pass flashed the error pattern and idled.
        assert_eq!(led.flashes.last(), Some(&(FLASH_ERROR_COUNT, FLASH_ERROR_PERIOD_MS)));
        assert_eq!(pacer.pauses, vec![CONFIGURED_IDLE_MS, CONFIGURED_IDLE_MS]);
    }
}
