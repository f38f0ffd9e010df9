//! Nightjar Firmware - Main Entry Point
//!
//! Hardware-only entry point for the RP2040 field recorder: brings up the
//! rails and buses, validates the flash configuration page, launches the
//! core-1 sampler executor and hands core 0 to the schedule controller.

#![no_std]
#![no_main]

use core::cell::RefCell;

use embassy_executor::{Executor, Spawner};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::i2c::{self, I2c};
use embassy_rp::multicore::{spawn_core1, Stack};
use embassy_rp::pac;
use embassy_rp::peripherals::{I2C0, SPI1};
use embassy_rp::spi::{self, Spi};
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Delay;
use embedded_hal_bus::i2c::CriticalSectionDevice as I2cDevice;
use embedded_hal_bus::spi::{CriticalSectionDevice as SpiSharedDevice, ExclusiveDevice};
use embedded_sdmmc::SdCard;
use static_cell::StaticCell;

use firmware::adc_capture::AdcCapture;
use firmware::board::{Led, Mcp4131, Rails, TimerPacer};
use firmware::flashcfg;
use firmware::rtc_ds3231::Ds3231;
use firmware::runner::FieldRunner;
use firmware::sdcard::{CardStorage, SharedClock};
use firmware::sensors::{Bme280, Veml6040};
use firmware::SLOT_SAMPLES;
use platform::capture::CaptureArena;
use platform::faultlog::RamFaultLog;
use platform::power::{Pacer as _, PowerRails as _, StatusLed as _};
use recorder::capture::CaptureStrategy;
use recorder::coordinator::{BoundedFlagLock, SamplerFlags, SamplerLink};
use recorder::envlog::{EnvRecordBuffer, SharedEnvBuffer};
use recorder::sampler::sampler_task;
use recorder::schedule::{
    halt_config_error, handle_boot_outcome, run_schedule, BootOutcome,
};

// Panic handler + RTT transport
use defmt_rtt as _;
use panic_probe as _;

/// Measured worst-case card write time for one 4800-byte slot, µs.
/// Re-characterise against the deployed card model before trusting the
/// chained strategy; the ping-pong strategy does not depend on it.
const SLOT_WRITE_US: u32 = 9_000;

/// ADC input for the microphone front end: GPIO26 = AIN0.
const MIC_ADC_INPUT: u8 = 0;
const MIC_ADC_GPIO: usize = 26;

/// Idle heartbeat after the schedule is exhausted: one short blink per hold.
const FLASH_IDLE_PERIOD_MS: u32 = 100;
const IDLE_HOLD_MS: u32 = 60_000;

// ── Cross-core shared state (all const-initialised) ─────────────────────────

static FLAGS: SamplerFlags = SamplerFlags::new();
static LINK: SamplerLink = SamplerLink::new();
static ENV_BUFFER: SharedEnvBuffer = Mutex::new(RefCell::new(EnvRecordBuffer::empty()));
static STORAGE_GATE: BoundedFlagLock = BoundedFlagLock::new();
static FAT_CLOCK: SharedClock = SharedClock::new();

// ── Static allocations ──────────────────────────────────────────────────────

static ARENA: StaticCell<CaptureArena<SLOT_SAMPLES>> = StaticCell::new();
static CORE1_STACK: StaticCell<Stack<8192>> = StaticCell::new();
static EXECUTOR1: StaticCell<Executor> = StaticCell::new();
static I2C_BUS: StaticCell<I2cBusMutex> = StaticCell::new();
static SPI1_BUS: StaticCell<Spi1BusMutex> = StaticCell::new();

type I2cBusMutex = critical_section::Mutex<RefCell<I2c<'static, I2C0, i2c::Blocking>>>;
type Spi1BusMutex = critical_section::Mutex<RefCell<Spi<'static, SPI1, spi::Blocking>>>;
type SharedI2c = I2cDevice<'static, I2c<'static, I2C0, i2c::Blocking>>;
type SharedSpi1 =
    SpiSharedDevice<'static, Spi<'static, SPI1, spi::Blocking>, Output<'static>, Delay>;

#[embassy_executor::task]
async fn core1_sampler(
    mut env: Bme280<SharedSpi1>,
    mut light: Veml6040<SharedI2c>,
    mut rtc: Ds3231<SharedI2c>,
) {
    let mut pacer = TimerPacer;
    sampler_task(
        &mut env,
        &mut light,
        &mut rtc,
        &mut pacer,
        &FLAGS,
        &LINK,
        &ENV_BUFFER,
    )
    .await;
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_rp::init(Default::default());
    defmt::info!("nightjar v{=str} — RP2040 @ 125 MHz", env!("CARGO_PKG_VERSION"));

    // Step 1: rails. The digital assembly (RTC pull-ups, card, sensors)
    // comes up first; the analog front end stays down until a session.
    let mut rails = Rails::new(
        Output::new(p.PIN_2, Level::Low),
        Output::new(p.PIN_3, Level::Low),
    );
    rails.digital_enable();
    rails.analog_disable();

    let mut led = Led::new(Output::new(p.PIN_25, Level::Low));
    let mut pacer = TimerPacer;

    // Step 2: configuration page. The USB configurator (a separate tool)
    // rewrites the page and resets the core; by the time this firmware
    // runs, the page is either valid or the unit must hold for inspection.
    let cfg = match flashcfg::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            defmt::error!("configuration page invalid: {}", e);
            halt_config_error(&mut led).await;
            return;
        }
    };
    defmt::info!(
        "configuration: {=u32} Hz, {=u32} s files, {=usize} session(s)",
        cfg.independent().sample_rate_hz,
        cfg.independent().file_seconds,
        cfg.session_count()
    );

    if !handle_boot_outcome(BootOutcome::NoHandshake, &mut led, &mut pacer).await {
        return;
    }

    // Step 3: microphone pin to analog mode (input + output disable).
    pac::PADS_BANK0.gpio(MIC_ADC_GPIO).modify(|w| {
        w.set_ie(false);
        w.set_od(true);
    });

    // Step 4: buses.
    //
    // SPI0: SD card (exclusive).
    // SPI1: BME280 (core 1) + MCP4131 digipot (core 0) — shared device per
    //       user, serialised by the hardware-spinlock critical section.
    // I2C0: DS3231 (three handles: schedule, orchestrator, sampler) +
    //       VEML6040 — same discipline.
    let mut spi0_config = spi::Config::default();
    spi0_config.frequency = 12_000_000;
    let spi0 = Spi::new_blocking(p.SPI0, p.PIN_18, p.PIN_19, p.PIN_16, spi0_config);
    let sd_cs = Output::new(p.PIN_17, Level::High);
    let sd_device = ExclusiveDevice::new(spi0, sd_cs, Delay).expect("SD CS init failed");

    let mut spi1_config = spi::Config::default();
    spi1_config.frequency = 4_000_000;
    let spi1 = Spi::new_blocking(p.SPI1, p.PIN_10, p.PIN_11, p.PIN_12, spi1_config);
    let spi1_bus = SPI1_BUS.init(critical_section::Mutex::new(RefCell::new(spi1)));
    let bme_cs = Output::new(p.PIN_9, Level::High);
    let bme_device =
        SpiSharedDevice::new(spi1_bus, bme_cs, Delay).expect("BME CS init failed");
    let dpot_cs = Output::new(p.PIN_13, Level::High);
    let dpot_device =
        SpiSharedDevice::new(spi1_bus, dpot_cs, Delay).expect("digipot CS init failed");

    let i2c = I2c::new_blocking(p.I2C0, p.PIN_5, p.PIN_4, i2c::Config::default());
    let i2c_bus = I2C_BUS.init(critical_section::Mutex::new(RefCell::new(i2c)));

    // Step 5: peripherals behind the platform seams.
    let rtc_int = Input::new(p.PIN_22, Pull::Up);
    let mut rtc_schedule = Ds3231::new(I2cDevice::new(i2c_bus), Some(rtc_int))
        .expect("DS3231 unreachable on I2C0");
    let mut rtc_orchestrator =
        Ds3231::new(I2cDevice::new(i2c_bus), None).expect("DS3231 unreachable on I2C0");
    let rtc_sampler =
        Ds3231::new(I2cDevice::new(i2c_bus), None).expect("DS3231 unreachable on I2C0");

    let sd_card = SdCard::new(sd_device, Delay);
    let mut storage = CardStorage::new(sd_card, &FAT_CLOCK);
    let mut gain = Mcp4131::new(dpot_device);
    let mut faults = RamFaultLog::new();

    let arena = ARENA.init(CaptureArena::new());
    let mut capture = AdcCapture::new(arena, 0, 1);
    capture.start_adc(MIC_ADC_INPUT);

    // Step 6: core 1 owns the sampler for the device's whole uptime; each
    // file's Start carries that session's parameters.
    let bme = Bme280::new(bme_device);
    let veml = Veml6040::new(I2cDevice::new(i2c_bus));
    let core1_stack = CORE1_STACK.init(Stack::new());
    spawn_core1(p.CORE1, core1_stack, move || {
        let executor1 = EXECUTOR1.init(Executor::new());
        executor1.run(|spawner| {
            spawner
                .spawn(core1_sampler(bme, veml, rtc_sampler))
                .expect("core1 sampler spawn failed");
        });
    });

    // Step 7: the schedule controller owns core 0 from here.
    let mut runner = FieldRunner {
        storage: &mut storage,
        chan: &mut capture,
        rtc: &mut rtc_orchestrator,
        faults: &mut faults,
        storage_gate: &STORAGE_GATE,
        flags: &FLAGS,
        link: &LINK,
        env_buffer: &ENV_BUFFER,
        fat_clock: &FAT_CLOCK,
    };

    let outcome = run_schedule(
        &cfg,
        SLOT_SAMPLES,
        CaptureStrategy::Chained {
            slot_write_us: SLOT_WRITE_US,
        },
        &mut rtc_schedule,
        &mut rails,
        &mut led,
        &mut gain,
        &mut runner,
    )
    .await;

    match outcome {
        Ok(sessions) => {
            defmt::info!("schedule complete: {=usize} session(s) recorded", sessions);
            // All sessions exhausted: hold dark until the batteries are
            // swapped and the unit is power cycled.
            rails.analog_disable();
            loop {
                led.flash(1, FLASH_IDLE_PERIOD_MS).await;
                pacer.pause_ms(IDLE_HOLD_MS).await;
            }
        }
        Err(e) => {
            defmt::error!("schedule aborted: {}", e);
            halt_config_error(&mut led).await;
        }
    }
}
