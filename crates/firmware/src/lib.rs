//! Nightjar firmware — RP2040 field recorder
//!
//! Hardware wiring for the recording core: ADC/DMA capture channel, SPI
//! card storage, DS3231 RTC, BME280 and VEML6040 sensor glue, MCP4131 gain
//! control, power rails and the dual-core task split.
//!
//! # Architecture
//!
//! ```text
//! main.rs (core 0) ── schedule controller + orchestrator + capture drain
//! core 1           ── persistent sampler task (launched per session)
//!         ↓
//! recorder crate   ── all policy and sequencing (host-tested)
//!         ↓
//! platform traits  ── implemented by the modules in this crate
//!         ↓
//! Embassy RP2040 HAL + PAC
//! ```
//!
//! # Features
//!
//! - `hardware` - Build for the RP2040 target (embassy, embedded HAL)
//!
//! ```bash
//! cargo build --release --target thumbv6m-none-eabi --features hardware
//! ```
//!
//! The library builds on the host so the register-free helpers (BCD
//! conversion, sensor datastring formatting) stay unit-testable.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::await_holding_lock)]
#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(async_fn_in_trait)]

pub mod bcd;
pub mod readings;

#[cfg(feature = "hardware")]
pub mod adc_capture;
#[cfg(feature = "hardware")]
pub mod board;
#[cfg(feature = "hardware")]
pub mod flashcfg;
#[cfg(feature = "hardware")]
pub mod rtc_ds3231;
#[cfg(feature = "hardware")]
pub mod runner;
#[cfg(feature = "hardware")]
pub mod sdcard;
#[cfg(feature = "hardware")]
pub mod sensors;

/// Samples per capture slot (4800 bytes, ~12.5 ms at 192 kHz).
///
/// Must divide every supported file's byte target; session derivation
/// rejects configurations where it does not. Divides all the standard
/// rates' one-second byte counts (48/96/192/384 kHz).
pub const SLOT_SAMPLES: usize = 2400;
