//! Free-running ADC capture over DMA
//!
//! The HAL has no safe API for DREQ-paced DMA out of the ADC FIFO, so this
//! channel programs the registers directly (the `unstable-pac` feature).
//! Two DMA channels are claimed for the slot pair; arming a slot resets its
//! channel's write address to the slot base and (re)triggers it, exactly
//! the discipline the capture pipeline's handshake assumes.

use embassy_rp::pac;

use platform::capture::{BufferSlot, CaptureArena, CaptureChannel};

use crate::SLOT_SAMPLES;

/// DREQ source number for the ADC FIFO.
const TREQ_ADC: u8 = 36;

/// ADC capture channel: the slot arena plus its two claimed DMA channels.
pub struct AdcCapture {
    arena: &'static mut CaptureArena<SLOT_SAMPLES>,
    dma_ch: [usize; 2],
    chained: bool,
}

impl AdcCapture {
    /// Take ownership of the arena and two DMA channel indices.
    ///
    /// The channel indices must not be claimed by the HAL elsewhere; this
    /// module owns their registers outright for the session.
    pub fn new(arena: &'static mut CaptureArena<SLOT_SAMPLES>, dma_a: usize, dma_b: usize) -> Self {
        Self {
            arena,
            dma_ch: [dma_a, dma_b],
            chained: false,
        }
    }

    /// One-time ADC bring-up: input select, FIFO thresholds, free-running
    /// conversion. The clock divisor is programmed per file through the
    /// trait, since a configuration change moves the rate.
    pub fn start_adc(&mut self, adc_input: u8) {
        pac::ADC.cs().write(|w| {
            w.set_en(true);
            w.set_ainsel(adc_input);
        });
        // FIFO enabled, DREQ enabled, threshold 1, no error bit, no byte shift.
        pac::ADC.fcs().write(|w| {
            w.set_en(true);
            w.set_dreq_en(true);
            w.set_thresh(1);
        });
        pac::ADC.cs().modify(|w| w.set_start_many(true));
    }

    fn channel_index(&self, slot: BufferSlot) -> usize {
        match slot {
            BufferSlot::A => self.dma_ch[0],
            BufferSlot::B => self.dma_ch[1],
        }
    }

    #[allow(clippy::cast_possible_truncation)] // RP2040 addresses are 32-bit
    fn slot_base(&mut self, slot: BufferSlot) -> u32 {
        self.arena.slot_mut(slot).as_mut_ptr() as u32
    }

    /// Program a channel's static half: source, length, control. The write
    /// address is set (and the transfer triggered) separately per arm.
    ///
    /// Control goes through the AL1_CTRL alias — a CTRL_TRIG write would
    /// start the transfer before the write address is in place.
    #[allow(clippy::cast_possible_truncation)] // channel indices and counts are tiny constants
    fn program_channel(&mut self, slot: BufferSlot, chain: bool) {
        let index = self.channel_index(slot);
        let peer = self.channel_index(slot.other());
        let ch = pac::DMA.ch(index);
        ch.read_addr().write_value(pac::ADC.fifo().as_ptr() as u32);
        ch.trans_count().write_value(SLOT_SAMPLES as u32);

        let mut ctrl = pac::dma::regs::CtrlTrig(0);
        ctrl.set_data_size(pac::dma::vals::DataSize::SIZE_HALFWORD);
        ctrl.set_incr_read(false);
        ctrl.set_incr_write(true);
        ctrl.set_treq_sel(pac::dma::vals::TreqSel::from_bits(TREQ_ADC));
        // A channel chaining to itself means "no chain".
        ctrl.set_chain_to(if chain { peer as u8 } else { index as u8 });
        ctrl.set_en(true);
        ch.al1_ctrl().write_value(ctrl.0);
    }

    fn busy(index: usize) -> bool {
        pac::DMA.ch(index).ctrl_trig().read().busy()
    }

    #[allow(clippy::cast_possible_truncation)] // two channel bits, low half of the mask
    fn abort_all(&self) {
        let mask = ((1u32 << self.dma_ch[0]) | (1u32 << self.dma_ch[1])) as u16;
        pac::DMA.chan_abort().write(|w| w.set_chan_abort(mask));
        while pac::DMA.chan_abort().read().chan_abort() != 0 {}
    }
}

impl CaptureChannel for AdcCapture {
    type Error = core::convert::Infallible;

    fn set_clock_divisor(&mut self, divisor: u32) {
        #[allow(clippy::cast_possible_truncation)] // divisor < 2^16 for all supported rates
        pac::ADC.div().write(|w| w.set_int(divisor as u16));
    }

    fn drain_fifo(&mut self) {
        while pac::ADC.fcs().read().level() > 0 {
            let _ = pac::ADC.fifo().read();
        }
    }

    fn arm(&mut self, slot: BufferSlot) -> Result<(), Self::Error> {
        self.chained = false;
        self.program_channel(slot, false);
        let base = self.slot_base(slot);
        let index = self.channel_index(slot);
        // Writing the AL2 write-address alias resets the destination to the
        // slot base and triggers the transfer in one go.
        pac::DMA.ch(index).al2_write_addr_trig().write_value(base);
        Ok(())
    }

    fn arm_chained(&mut self, first: BufferSlot) -> Result<(), Self::Error> {
        self.chained = true;
        self.program_channel(first, true);
        self.program_channel(first.other(), true);
        // Park the peer's write address at its base; the chain will trigger
        // it the instant `first` completes.
        let peer_base = self.slot_base(first.other());
        let peer_index = self.channel_index(first.other());
        pac::DMA.ch(peer_index).write_addr().write_value(peer_base);
        let base = self.slot_base(first);
        let index = self.channel_index(first);
        pac::DMA.ch(index).al2_write_addr_trig().write_value(base);
        Ok(())
    }

    async fn wait_complete(&mut self, slot: BufferSlot) -> Result<(), Self::Error> {
        let index = self.channel_index(slot);
        while Self::busy(index) {
            embassy_futures::yield_now().await;
        }
        if self.chained {
            // The chain has moved on to the peer; rewind this channel's
            // write address so its next (chained) turn lands at the base.
            let base = self.slot_base(slot);
            pac::DMA.ch(index).write_addr().write_value(base);
        }
        Ok(())
    }

    fn slot_samples(&self, slot: BufferSlot) -> &[i16] {
        self.arena.slot(slot)
    }

    fn slot_len(&self) -> usize {
        SLOT_SAMPLES
    }

    fn stop(&mut self) {
        pac::ADC.cs().modify(|w| w.set_start_many(false));
        self.abort_all();
        self.chained = false;
    }
}
