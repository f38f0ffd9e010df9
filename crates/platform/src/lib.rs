//! Hardware Abstraction Layer (HAL) for the Nightjar field recorder
//!
//! This crate provides trait-based abstractions for every hardware
//! collaborator the recording core touches, enabling development and testing
//! without physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (firmware crate)
//!         ↓
//! Recording Core (recorder crate)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (Embassy HAL + PAC)
//! ```
//!
//! # Abstraction Levels
//!
//! ## High-Level Peripherals
//! - [`Storage`] - removable-card file access (write side)
//! - [`Rtc`] - external real-time clock and wake alarm
//! - [`EnvironmentalSensor`] / [`LightSensor`] - formatted sensor readings
//! - [`CaptureChannel`] - ADC-to-memory DMA capture
//! - [`FaultLog`] - persistent rotating fault trail
//!
//! ## Mid-Level Peripherals
//! - [`power`] - power rails, status LED, gain control, pacing
//!
//! # Features
//!
//! - `std`: Enable the std-backed mocks (for testing)
//! - `hardware`: Physical hardware implementations marker
//! - `defmt`: Enable defmt logging derives
//!
//! # Example
//!
//! ```no_run
//! use platform::{Rtc, AlarmSpec};
//!
//! async fn example<R: Rtc>(rtc: &mut R) {
//!     rtc.set_alarm(AlarmSpec::daily(30, 4)).await.unwrap();
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // register and chip names in doc comments
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)] // hardware accessors — callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod capture;
pub mod faultlog;
pub mod power;
pub mod rtc;
pub mod sensors;
pub mod storage;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

// Re-export main high-level traits
pub use capture::{BufferSlot, CaptureArena, CaptureChannel};
pub use faultlog::{FaultLog, FaultRecord, FaultSeverity, RamFaultLog};
pub use rtc::{AlarmSpec, Rtc, Timestamp, TIMESTRING_CAP};
pub use sensors::{
    EnvDatastring, EnvironmentalSensor, LightDatastring, LightSensor, ENV_DATASTRING_CAP,
    LIGHT_DATASTRING_CAP,
};
pub use storage::Storage;

// Re-export power types
pub use power::{GainControl, Pacer, PowerRails, StatusLed};
