//! Recording core for the Nightjar field recorder
//!
//! Everything between the hardware seams and `main`: the WAV codec, the
//! configuration-page codec, derived session parameters, the gap-free
//! dual-buffer capture pipeline, the environmental record buffer and sampler
//! loop, the cross-core coordination primitives, the per-file session
//! orchestrator and the alarm-paced schedule controller.
//!
//! The crate is `no_std` and allocation-free. It performs **no** hardware
//! access — every peripheral arrives as a `platform` trait object, which is
//! what makes the whole recording path testable on the host against
//! `platform::mocks`.
//!
//! # Data flow
//!
//! ```text
//! schedule  ── wakes on RTC alarm, powers rails, derives SessionParams
//!     │
//! orchestrator ── per file: open WAV → capture → close → flush env records
//!     │                      │
//! capture ── ping-pong/chained DMA drain        sampler ── core-1 loop
//!     │                                              │
//! platform::Storage                         envlog (shared buffer)
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod capture;
pub mod config;
pub mod coordinator;
pub mod envlog;
pub mod error;
pub mod orchestrator;
pub mod sampler;
pub mod schedule;
pub mod session;
pub mod wav;

pub use capture::{capture_file, CaptureFault, CaptureStrategy};
pub use config::{ConfigBlock, ConfigError, Independent, RtcInit, SessionWindow};
pub use coordinator::{BoundedFlagLock, HandoffQueue, SamplerFlags, SamplerLink};
pub use envlog::{EnvRecordBuffer, SharedEnvBuffer, ENV_RECORD_STRIDE};
pub use error::{Fault, FaultKind};
pub use orchestrator::{run_session, SessionIo};
pub use schedule::{run_schedule, BootOutcome, ScheduleError, SessionRunner};
pub use session::{DeriveError, SessionParams};
pub use wav::{WavSpec, WAV_HEADER_LEN};
