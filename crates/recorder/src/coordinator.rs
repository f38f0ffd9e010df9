//! Cross-core coordination primitives
//!
//! Core 0 runs the schedule controller, orchestrator and capture driver;
//! core 1 runs the sampler. Everything they share crosses through this
//! module: the sampler's cooperative stop/idle flags, the bounded lock
//! serialising card access, and the depth-1 channels that pace the sampler
//! and hand buffer slots between cores.
//!
//! The RP2040 has no atomic read-modify-write instructions, so flag *claims*
//! (test-and-set) run inside a critical section — the hardware-spinlock
//! critical-section implementation is multicore-safe. Single-writer flags
//! use plain atomic load/store.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use platform::capture::BufferSlot;

/// Polls before a bounded wait gives up. Each poll yields to the executor,
/// so on hardware this is on the order of a second of card activity.
pub const BOUNDED_WAIT_POLLS: u32 = 500_000;

// ── Sampler flags ───────────────────────────────────────────────────────────

/// Error: the sampler never reached its idle point within the poll budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerStuck;

/// The sampler task's cooperative control flags.
///
/// `should_continue` is written by the orchestrator and polled by the
/// sampler once per sample, after the append — cancellation never lands
/// mid-sample. `sleeping` is written by the sampler around its inter-sample
/// pause so the orchestrator can distinguish "truly idle" from "mid-sample"
/// without a second blocking primitive. `failed` latches a sensor fault for
/// the orchestrator's retry boundary to collect.
#[derive(Debug)]
pub struct SamplerFlags {
    should_continue: AtomicBool,
    sleeping: AtomicBool,
    failed: AtomicBool,
}

impl SamplerFlags {
    /// New flags: stopped, idle, no fault.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            should_continue: AtomicBool::new(false),
            sleeping: AtomicBool::new(true),
            failed: AtomicBool::new(false),
        }
    }

    /// Begin a sampling phase (called by the sampler on start).
    pub fn begin(&self) {
        self.failed.store(false, Ordering::Release);
        self.should_continue.store(true, Ordering::Release);
    }

    /// Ask the sampler to stop after its current sample.
    pub fn request_stop(&self) {
        self.should_continue.store(false, Ordering::Release);
    }

    /// Whether the sampler should keep looping.
    pub fn should_continue(&self) -> bool {
        self.should_continue.load(Ordering::Acquire)
    }

    /// Sampler-side: mark entry/exit of the inter-sample pause.
    pub fn set_sleeping(&self, sleeping: bool) {
        self.sleeping.store(sleeping, Ordering::Release);
    }

    /// Whether the sampler is between samples.
    pub fn is_sleeping(&self) -> bool {
        self.sleeping.load(Ordering::Acquire)
    }

    /// Sampler-side: latch a sensor fault.
    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::Release);
    }

    /// Orchestrator-side: collect and clear a latched fault.
    pub fn take_failed(&self) -> bool {
        let failed = self.failed.load(Ordering::Acquire);
        self.failed.store(false, Ordering::Release);
        failed
    }

    /// Wait until the sampler reports idle, bounded by `max_polls`.
    pub async fn wait_idle(&self, max_polls: u32) -> Result<(), SamplerStuck> {
        for _ in 0..max_polls {
            if self.is_sleeping() {
                return Ok(());
            }
            embassy_futures::yield_now().await;
        }
        Err(SamplerStuck)
    }
}

impl Default for SamplerFlags {
    fn default() -> Self {
        Self::new()
    }
}

// ── Bounded flag lock ───────────────────────────────────────────────────────

/// Error: the lock stayed held for the whole poll budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeout;

/// Advisory mutual exclusion with bounded acquisition.
///
/// Serialises the two logical card writers (audio drain and environmental
/// flush) and the shared I²C bus. Waits are cooperative yield-polls and the
/// budget makes a wedged holder *observable* instead of a livelock: a
/// timeout surfaces as a distinguishable failure for the caller's fault
/// policy.
#[derive(Debug)]
pub struct BoundedFlagLock {
    busy: AtomicBool,
}

impl BoundedFlagLock {
    /// A released lock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Claim the lock if it is free.
    pub fn try_acquire(&self) -> Option<FlagGuard<'_>> {
        critical_section::with(|_| {
            if self.busy.load(Ordering::Relaxed) {
                None
            } else {
                self.busy.store(true, Ordering::Relaxed);
                Some(FlagGuard { lock: self })
            }
        })
    }

    /// Claim the lock, yielding between attempts, for at most `max_polls`.
    pub async fn acquire(&self, max_polls: u32) -> Result<FlagGuard<'_>, LockTimeout> {
        for _ in 0..max_polls {
            if let Some(guard) = self.try_acquire() {
                return Ok(guard);
            }
            embassy_futures::yield_now().await;
        }
        Err(LockTimeout)
    }

    /// Forcibly release a lock whose holder is gone.
    ///
    /// Recovery path for the fatal-error/log-panic route only: after a
    /// timeout that is itself being treated as fatal, the halt handler may
    /// reclaim the lock to write its final fault record. Never called in
    /// normal operation.
    pub fn force_reclaim(&self) {
        self.busy.store(false, Ordering::Release);
    }

    fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }
}

impl Default for BoundedFlagLock {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII claim on a [`BoundedFlagLock`].
#[derive(Debug)]
pub struct FlagGuard<'a> {
    lock: &'a BoundedFlagLock,
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

// ── Channels ────────────────────────────────────────────────────────────────

/// Commands pacing the persistent sampler task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerCommand {
    /// Begin the sampling phase for one file under the given parameters.
    Start(crate::session::SessionParams),
}

/// Depth-1 command channel from the orchestrator to the sampler task.
///
/// The sampler task persists across files (and sessions); one `Start` is
/// pushed per file, carrying that session's parameters. Depth 1 is
/// deliberate: a second start cannot pile up behind an unserviced one.
pub struct SamplerLink {
    commands: Channel<CriticalSectionRawMutex, SamplerCommand, 1>,
}

impl core::fmt::Debug for SamplerLink {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SamplerLink").finish_non_exhaustive()
    }
}

impl SamplerLink {
    /// A link with no pending command.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            commands: Channel::new(),
        }
    }

    /// Orchestrator-side: start the next sampling phase (blocks while the
    /// previous start is unserviced).
    pub async fn start(&self, params: crate::session::SessionParams) {
        self.commands.send(SamplerCommand::Start(params)).await;
    }

    /// Sampler-side: park until the next start.
    pub async fn wait_start(&self) -> SamplerCommand {
        self.commands.receive().await
    }
}

impl Default for SamplerLink {
    fn default() -> Self {
        Self::new()
    }
}

/// Blocking slot-handle exchange for the dual-core ping-pong strategy.
///
/// The capture driver pushes a slot the instant its transfer is (re)armed
/// on the peer core's channel; the peer pops (blocking) before touching the
/// slot, and symmetrically for completion. Ownership transfer is gated by
/// these handshakes, not by timing assumptions — each side holds a slot
/// only between a pop and its answering push.
pub struct HandoffQueue {
    fill_requests: Channel<CriticalSectionRawMutex, BufferSlot, 1>,
    fill_done: Channel<CriticalSectionRawMutex, BufferSlot, 1>,
}

impl core::fmt::Debug for HandoffQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandoffQueue").finish_non_exhaustive()
    }
}

impl HandoffQueue {
    /// An empty queue pair.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fill_requests: Channel::new(),
            fill_done: Channel::new(),
        }
    }

    /// Driver-side: hand `slot` to the peer for refilling.
    pub async fn request_fill(&self, slot: BufferSlot) {
        self.fill_requests.send(slot).await;
    }

    /// Driver-side: take back a slot the peer has refilled.
    pub async fn wait_filled(&self) -> BufferSlot {
        self.fill_done.receive().await
    }

    /// Peer-side: take the next slot to refill.
    pub async fn next_request(&self) -> BufferSlot {
        self.fill_requests.receive().await
    }

    /// Peer-side: return a refilled slot to the driver.
    pub async fn complete(&self, slot: BufferSlot) {
        self.fill_done.send(slot).await;
    }
}

impl Default for HandoffQueue {
    fn default() -> Self {
        Self::new()
    }
}
