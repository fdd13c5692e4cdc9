//! Synchronous serial bit engine (spec.md §4.2, C2).
//!
//! Runs at twice the line bit rate: each [`SyncEngine::tick`] call is one
//! half-period, alternating between driving TX/sampling RX (the "rising"
//! half) and simply gating the clock low (the "falling" half) — the same
//! two-phase split as `SyncTimerCallback` in
//! `original_source/fw/v24/src/sync.c`.
//!
//! The RX side writes flag-delimited, still-escaped bytes into its output
//! FIFO: a data byte equal to [`HDLC_FLAG`] or [`HDLC_ESCAPE`] is re-encoded
//! as an escape pair before being queued, and each harvested message is
//! bracketed by a literal [`HDLC_FLAG`] byte at start and end. This mirrors
//! `RxBits()`/`RxMessageCallback()`: only bit-stuffing happens on the wire,
//! so the byte-level escaping HDLC needs for transparency is reconstructed
//! here rather than by the line itself.

use crate::consts::{HDLC_ESCAPE, HDLC_ESCAPE_7D, HDLC_ESCAPE_7E, HDLC_FLAG};
use crate::error::{FifoError, SyncError};
use crate::fifo::Fifo;
use crate::trace::{log_error, log_info, log_warn};

/// RX-side synchronization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRxState {
    /// Hunting for the first flag octet on the wire.
    Search,
    /// Flag found; processing bits into bytes.
    Synced,
}

/// What the caller should drive the line with for this half-period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Raise the TX clock and drive TXD to this value; RX was also sampled.
    Drive {
        /// Bit to present on TXD this period.
        txd: bool,
    },
    /// Lower the TX clock; no data movement this period.
    Gate,
}

/// Bit-level HDLC transceiver for one V.24 synchronous link.
///
/// `TXN`/`RXN` are the TX/RX byte-queue capacities.
#[derive(Debug)]
pub struct SyncEngine<const TXN: usize, const RXN: usize> {
    tx_fifo: Fifo<TXN>,
    rx_fifo: Fifo<RXN>,

    tx_byte: u8,
    tx_bit_pos: u8,
    tx_is_flag: bool,
    tx_ones_run: u8,

    rx_shift: u8,
    rx_bit_count: u8,
    rx_ones_run: u8,
    rx_stuffed_at: Option<u8>,
    rx_state: SyncRxState,
    rx_msg_in_progress: bool,

    falling: bool,
    rx_arm_tick_ms: u64,
    sync_rx_delay_ms: u64,
    rx_delay_elapsed_logged: bool,
}

impl<const TXN: usize, const RXN: usize> SyncEngine<TXN, RXN> {
    /// Creates a fresh engine, armed with the post-reset RX debounce window.
    pub fn new(sync_rx_delay_ms: u64) -> Self {
        Self {
            tx_fifo: Fifo::new(),
            rx_fifo: Fifo::new(),
            tx_byte: HDLC_FLAG,
            tx_bit_pos: 8,
            tx_is_flag: true,
            tx_ones_run: 0,
            rx_shift: 0,
            rx_bit_count: 0,
            rx_ones_run: 0,
            rx_stuffed_at: None,
            rx_state: SyncRxState::Search,
            rx_msg_in_progress: false,
            falling: true,
            rx_arm_tick_ms: 0,
            sync_rx_delay_ms,
            rx_delay_elapsed_logged: false,
        }
    }

    /// Current RX synchronization state.
    pub fn rx_state(&self) -> SyncRxState {
        self.rx_state
    }

    /// Queues raw octets (already HDLC-escaped by the framer) for transmission.
    ///
    /// # Errors
    /// Returns [`FifoError::Full`] if the TX queue cannot hold the slice.
    pub fn queue_tx(&mut self, bytes: &[u8]) -> Result<(), FifoError> {
        self.tx_fifo.push_slice(bytes).inspect_err(|_| {
            log_error!("Sync TX buffer out of space!");
        })
    }

    /// Free space in the TX queue, in octets.
    pub fn tx_free(&self) -> usize {
        self.tx_fifo.free()
    }

    /// Free space in the TX queue expressed in whole `frame_len`-byte units.
    ///
    /// If fewer than one frame's worth of space remains, the TX queue is
    /// cleared and a warning logged, mirroring `SyncGetTxFree`.
    pub fn tx_free_frames(&mut self, frame_len: usize) -> usize {
        let frames = self.tx_fifo.free() / frame_len.max(1);
        if frames < 1 {
            log_error!(
                "TX buffer low: {} / {} bytes used, resetting buffer",
                self.tx_fifo.len(),
                self.tx_fifo.capacity()
            );
            self.tx_fifo.clear();
        }
        frames
    }

    /// Free TX space expressed in whole `block_size`-byte blocks, as used by
    /// the DVM status reply's `free_space` field. Clears the TX queue and
    /// returns 0 if fewer than [`crate::consts::STATUS_LOW_BUFFER_BLOCKS`]
    /// blocks remain.
    pub fn tx_free_blocks(&mut self, block_size: u16) -> u16 {
        use crate::consts::STATUS_LOW_BUFFER_BLOCKS;
        let blocks = (self.tx_fifo.free() as u16) / block_size.max(1);
        if blocks < STATUS_LOW_BUFFER_BLOCKS {
            log_warn!(
                "TX buffer low: {} / {} bytes used, resetting buffer",
                self.tx_fifo.len(),
                self.tx_fifo.capacity()
            );
            self.tx_fifo.clear();
            return 0;
        }
        blocks
    }

    /// Pops one decoded, still-escaped RX octet, if any is ready.
    pub fn pop_rx(&mut self) -> Option<u8> {
        self.rx_fifo.pop().ok()
    }

    /// Drops synchronization: clears RX bit state and the RX queue, and
    /// rearms the startup debounce window. Does not touch the TX queue.
    pub fn drop_sync(&mut self, now_ms: u64) {
        self.rx_shift = 0;
        self.rx_bit_count = 0;
        self.rx_state = SyncRxState::Search;
        self.rx_msg_in_progress = false;
        self.rx_stuffed_at = None;
        self.rx_fifo.clear();
        self.rx_arm_tick_ms = now_ms;
        self.rx_delay_elapsed_logged = false;
        log_error!("Sync dropped");
    }

    /// Resets RX state without the error-level log `drop_sync` emits;
    /// used on startup and explicit link reset.
    pub fn reset_rx(&mut self, now_ms: u64) {
        self.rx_shift = 0;
        self.rx_bit_count = 0;
        self.rx_state = SyncRxState::Search;
        self.rx_msg_in_progress = false;
        self.rx_stuffed_at = None;
        self.rx_fifo.clear();
        self.rx_arm_tick_ms = now_ms;
        self.rx_delay_elapsed_logged = false;
        log_info!("Reset Sync RX");
    }

    /// Advances the engine by one half bit-period.
    ///
    /// Returns the line action for this half-period. On the active half,
    /// `rxd` is sampled and may yield [`SyncError::Abort`] or
    /// [`SyncError::BitOverrun`]; the caller should call [`Self::drop_sync`]
    /// when either is returned.
    pub fn tick(&mut self, rxd: bool, now_ms: u64) -> (TickAction, Result<(), SyncError>) {
        if self.falling {
            self.falling = false;
            let txd = self.next_tx_bit();
            let result = self.rx_bits(rxd, now_ms);
            (TickAction::Drive { txd }, result)
        } else {
            self.falling = true;
            (TickAction::Gate, Ok(()))
        }
    }

    fn next_tx_byte(&mut self) {
        self.tx_is_flag = false;
        match self.tx_fifo.pop() {
            Ok(b) => self.tx_byte = b,
            Err(_) => self.tx_byte = HDLC_FLAG,
        }
        if self.tx_byte == HDLC_FLAG {
            self.tx_is_flag = true;
        }
        if self.tx_byte == HDLC_ESCAPE {
            match self.tx_fifo.pop() {
                Err(_) => {
                    log_error!("Got escape character but nothing following!");
                }
                Ok(escaped) => {
                    if escaped == HDLC_ESCAPE_7D {
                        self.tx_byte = HDLC_ESCAPE;
                    } else if escaped == HDLC_ESCAPE_7E {
                        self.tx_byte = HDLC_FLAG;
                        self.tx_is_flag = false;
                    }
                }
            }
        }
    }

    fn next_tx_bit(&mut self) -> bool {
        if self.tx_ones_run == 5 && !self.tx_is_flag {
            self.tx_ones_run = 0;
            return false;
        }
        self.tx_bit_pos += 1;
        if self.tx_bit_pos >= 8 {
            self.tx_bit_pos = 0;
            self.next_tx_byte();
        }
        let bit = (self.tx_byte >> self.tx_bit_pos) & 1 != 0;
        if bit {
            self.tx_ones_run += 1;
        } else {
            self.tx_ones_run = 0;
        }
        bit
    }

    fn rx_bits(&mut self, rxd: bool, now_ms: u64) -> Result<(), SyncError> {
        if now_ms.wrapping_sub(self.rx_arm_tick_ms) < self.sync_rx_delay_ms {
            return Ok(());
        }
        if !self.rx_delay_elapsed_logged {
            log_info!("Sync RX starting");
            self.rx_delay_elapsed_logged = true;
        }

        self.rx_shift = (self.rx_shift >> 1) | ((rxd as u8) << 7);

        match self.rx_state {
            SyncRxState::Search => {
                if self.rx_shift == HDLC_FLAG {
                    self.rx_state = SyncRxState::Synced;
                    log_info!("HDLC RX now synced");
                    self.rx_shift = 0;
                    self.rx_bit_count = 0;
                }
                Ok(())
            }
            SyncRxState::Synced => self.rx_bits_synced(rxd),
        }
    }

    fn rx_bits_synced(&mut self, rxd: bool) -> Result<(), SyncError> {
        if self.rx_ones_run == 5 && !rxd {
            self.rx_stuffed_at = Some(self.rx_bit_count);
            self.rx_ones_run = 0;
            self.rx_shift <<= 1;
            return Ok(());
        }
        if self.rx_ones_run == 6 && rxd {
            log_error!("Received 7 consecutive 1s, this is bad, dropping sync!");
            return Err(SyncError::Abort);
        }

        if rxd {
            self.rx_ones_run += 1;
        } else {
            self.rx_ones_run = 0;
        }
        self.rx_bit_count += 1;

        if self.rx_bit_count == 8 {
            self.harvest_rx_byte();
            self.rx_stuffed_at = None;
            self.rx_shift = 0;
            self.rx_bit_count = 0;
            Ok(())
        } else if self.rx_bit_count > 8 {
            log_error!("RX bit counter exceeded, dropping sync");
            Err(SyncError::BitOverrun)
        } else {
            Ok(())
        }
    }

    fn harvest_rx_byte(&mut self) {
        let byte = self.rx_shift;
        if byte == HDLC_FLAG {
            if self.rx_msg_in_progress {
                if self.rx_stuffed_at == Some(6) {
                    self.push_rx_pair(HDLC_ESCAPE, HDLC_ESCAPE_7E);
                } else {
                    self.rx_msg_in_progress = false;
                    self.push_rx_byte(HDLC_FLAG);
                }
            }
        } else {
            if !self.rx_msg_in_progress {
                self.rx_msg_in_progress = true;
                self.push_rx_byte(HDLC_FLAG);
            }
            if byte == HDLC_ESCAPE {
                self.push_rx_pair(HDLC_ESCAPE, HDLC_ESCAPE_7D);
            } else {
                self.push_rx_byte(byte);
            }
        }
    }

    fn push_rx_byte(&mut self, byte: u8) {
        if self.rx_fifo.push(byte).is_err() {
            log_warn!("syncRxFifo full!");
        }
    }

    fn push_rx_pair(&mut self, a: u8, b: u8) {
        if self.rx_fifo.push(a).is_err() || self.rx_fifo.push(b).is_err() {
            log_warn!("syncRxFifo full!");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_byte(engine: &mut SyncEngine<64, 64>, byte: u8, now_ms: &mut u64) {
        for i in 0..8 {
            let bit = (byte >> i) & 1 != 0;
            *now_ms += 1;
            let (_, result) = engine.tick(bit, *now_ms);
            result.unwrap();
            *now_ms += 1;
            let (_, result) = engine.tick(bit, *now_ms);
            result.unwrap();
        }
    }

    fn armed_engine() -> (SyncEngine<64, 64>, u64) {
        let mut e: SyncEngine<64, 64> = SyncEngine::new(0);
        e.reset_rx(0);
        (e, 0)
    }

    #[test]
    fn finds_sync_on_first_flag() {
        let (mut e, mut now) = armed_engine();
        assert_eq!(e.rx_state(), SyncRxState::Search);
        feed_byte(&mut e, HDLC_FLAG, &mut now);
        assert_eq!(e.rx_state(), SyncRxState::Synced);
    }

    #[test]
    fn harvests_a_simple_message_between_two_flags() {
        let (mut e, mut now) = armed_engine();
        feed_byte(&mut e, HDLC_FLAG, &mut now);
        feed_byte(&mut e, 0xAA, &mut now);
        feed_byte(&mut e, 0x55, &mut now);
        feed_byte(&mut e, HDLC_FLAG, &mut now);

        let mut out = Vec::new();
        while let Some(b) = e.pop_rx() {
            out.push(b);
        }
        assert_eq!(out, std::vec![HDLC_FLAG, 0xAA, 0x55, HDLC_FLAG]);
    }

    #[test]
    fn data_byte_equal_to_flag_is_escaped_when_stuffed() {
        // A literal 0x7E on the wire, when reached via a stuffed zero at bit
        // position 6, is data, not a frame boundary.
        let (mut e, mut now) = armed_engine();
        feed_byte(&mut e, HDLC_FLAG, &mut now);
        // Craft bits that land rx_ones_run==5 with the stuffed zero at
        // position 6, reconstructing a 0x7E byte: 0 1111110 with a stuffed
        // 0 inserted after the fifth one.
        e.rx_stuffed_at = Some(6);
        // Directly exercise harvest_rx_byte's flag-but-stuffed branch.
        e.rx_msg_in_progress = true;
        e.rx_shift = HDLC_FLAG;
        e.harvest_rx_byte();
        let mut out = Vec::new();
        while let Some(b) = e.pop_rx() {
            out.push(b);
        }
        assert_eq!(out, std::vec![HDLC_ESCAPE, HDLC_ESCAPE_7E]);
    }

    #[test]
    fn seven_ones_aborts() {
        let (mut e, mut now) = armed_engine();
        feed_byte(&mut e, HDLC_FLAG, &mut now);
        let mut saw_abort = false;
        for _ in 0..8 {
            now += 1;
            let (_, r1) = e.tick(true, now);
            if r1 == Err(SyncError::Abort) {
                saw_abort = true;
                break;
            }
            now += 1;
            let (_, r2) = e.tick(true, now);
            if r2 == Err(SyncError::Abort) {
                saw_abort = true;
                break;
            }
        }
        assert!(saw_abort);
    }

    #[test]
    fn queue_tx_roundtrips_through_next_tx_bit() {
        let mut e: SyncEngine<64, 64> = SyncEngine::new(0);
        e.queue_tx(&[0xAA]).unwrap();
        // Drain the idle flag byte currently loaded, then the queued byte's
        // bits should appear next; just assert no panics / queue drains.
        let mut now = 0u64;
        for _ in 0..64 {
            now += 1;
            let _ = e.tick(false, now);
        }
        assert_eq!(e.tx_free(), 64);
    }

    #[test]
    fn tx_free_frames_clears_queue_when_low() {
        let mut e: SyncEngine<16, 16> = SyncEngine::new(0);
        e.queue_tx(&[0u8; 15]).unwrap();
        let frames = e.tx_free_frames(4);
        assert_eq!(frames, 0);
        assert_eq!(e.tx_free(), 16);
    }
}
