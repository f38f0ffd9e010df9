//! ADC capture-channel abstraction
//!
//! Models the DMA engine that moves samples from the ADC FIFO into one of two
//! fixed slots. Buffer ownership crosses task and core boundaries as
//! [`BufferSlot`] handles only — addresses never leave the channel, so the
//! ping-pong exclusivity invariant is enforced by handle exchange rather than
//! timing assumptions.

/// Handle to one of the two capture slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferSlot {
    /// First slot.
    A,
    /// Second slot.
    B,
}

impl BufferSlot {
    /// The peer slot.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Backing storage for the capture slot pair.
///
/// Allocated once per session (statically on hardware) and lent to the
/// capture channel; `N` is the per-slot sample count.
#[derive(Debug)]
pub struct CaptureArena<const N: usize> {
    a: [i16; N],
    b: [i16; N],
}

impl<const N: usize> CaptureArena<N> {
    /// Create a zero-filled arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            a: [0; N],
            b: [0; N],
        }
    }

    /// Samples per slot.
    #[must_use]
    pub const fn slot_samples(&self) -> usize {
        N
    }

    /// Bytes per slot (16-bit samples).
    #[must_use]
    pub const fn slot_bytes(&self) -> usize {
        N * 2
    }

    /// Borrow a slot's samples.
    #[must_use]
    pub fn slot(&self, slot: BufferSlot) -> &[i16] {
        match slot {
            BufferSlot::A => &self.a,
            BufferSlot::B => &self.b,
        }
    }

    /// Mutably borrow a slot's samples.
    pub fn slot_mut(&mut self, slot: BufferSlot) -> &mut [i16] {
        match slot {
            BufferSlot::A => &mut self.a,
            BufferSlot::B => &mut self.b,
        }
    }
}

impl<const N: usize> Default for CaptureArena<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// DMA capture channel sourced from the free-running ADC.
///
/// # Protocol
///
/// One slot at most is armed at any instant. `arm` resets the slot's write
/// address to its base and triggers the transfer; `wait_complete` polls the
/// completion flag, yielding to the executor between polls. With hardware
/// chaining enabled ([`CaptureChannel::arm_chained`]) the completion of one
/// slot re-arms the other without core intervention, and the driver only ever
/// waits and drains.
pub trait CaptureChannel {
    /// Error type
    type Error: core::fmt::Debug;

    /// Program the ADC clock divisor: `(48 MHz - rate) / rate`.
    ///
    /// Must be re-applied whenever the sample rate changes; the pipeline
    /// calls it at the top of every file.
    fn set_clock_divisor(&mut self, divisor: u32);

    /// Discard stale samples sitting in the ADC FIFO.
    fn drain_fifo(&mut self);

    /// Reset `slot`'s write address to its base and start the transfer.
    fn arm(&mut self, slot: BufferSlot) -> Result<(), Self::Error>;

    /// Enable hardware chaining between the two slots and start with `first`.
    ///
    /// Each transfer's completion re-arms the peer slot at its base address.
    /// Only valid when the storage drain is faster than one slot's capture
    /// time; the session-derivation layer validates that bound.
    fn arm_chained(&mut self, first: BufferSlot) -> Result<(), Self::Error>;

    /// Wait until `slot`'s in-flight transfer completes.
    fn wait_complete(
        &mut self,
        slot: BufferSlot,
    ) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Borrow the samples captured into `slot`.
    ///
    /// Must only be called for a slot that is not armed; the ping-pong
    /// handshake guarantees this.
    fn slot_samples(&self, slot: BufferSlot) -> &[i16];

    /// Samples per slot.
    fn slot_len(&self) -> usize;

    /// Stop the ADC and abort any armed transfer.
    fn stop(&mut self);
}
