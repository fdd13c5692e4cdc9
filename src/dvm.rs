//! DVM host protocol: short/long frame parsing, command dispatch, and
//! version/status/ACK/NAK replies (spec.md §4.4, C4).
//!
//! Grounded in `original_source/fw/v24/src/vcp.c`: `VCPCallback` parses one
//! complete inbound frame per call from a byte FIFO an ISR fills, dispatches
//! `CMD_P25_DATA` by stripping the DVM pad byte and handing the remainder to
//! HDLC, and separately drains one complete outbound frame per call via
//! `CDC_Transmit_FS`. The fixed per-call "one RX frame, one TX frame" shape
//! is carried into [`crate::bridge::Bridge::service`].

use crate::consts::{
    CMD_CAL_DATA, CMD_FLASH_READ, CMD_FLASH_WRITE, CMD_GET_STATUS, CMD_GET_VERSION, CMD_P25_CLEAR,
    CMD_P25_DATA, CMD_RESET_MCU, CMD_SET_CONFIG, CMD_SET_MODE, CMD_SET_RFPARAMS, DVM_CPU_KIND,
    DVM_FRAME_START_LONG, DVM_FRAME_START_SHORT, DVM_MAX_MESSAGE_LEN, DVM_PROTOCOL_VERSION,
    REPLY_ACK, REPLY_NAK, ReasonCode, STATUS_FLAG_BLOCKS, STATUS_FLAG_CONNECTED,
    STATUS_MODE_BASE, STATUS_STATE_IDLE, STATUS_STATE_P25,
};
use crate::error::DvmError;
use crate::fifo::Fifo;
use crate::io::ConfigFlash;
use crate::trace::{log_error, log_warn};
use heapless::Deque;

/// Byte capacity of the outbound (host-directed) reply FIFO.
pub const TX_FIFO_LEN: usize = 1024;
/// Maximum number of pending P25 payloads queued for HDLC transmission.
pub const UI_TX_QUEUE_DEPTH: usize = 4;

const MAX_MSG: usize = DVM_MAX_MESSAGE_LEN as usize;

/// One P25 payload received from the host via `CMD_P25_DATA`, queued for
/// the HDLC layer to send as a UI frame.
pub type P25Payload = heapless::Vec<u8, MAX_MSG>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Idle,
    HaveStartShort,
    HaveStartLong,
    HaveLenHigh,
    Accumulating,
}

/// Stop-and-wait DVM frame parser plus command dispatcher.
#[derive(Debug)]
pub struct DvmHost {
    state: ParseState,
    buf: heapless::Vec<u8, MAX_MSG>,
    declared_len: u16,
    last_byte_ms: u64,
    dvm_rx_timeout_ms: u64,

    tx_fifo: Fifo<TX_FIFO_LEN>,
    ui_tx_queue: Deque<P25Payload, UI_TX_QUEUE_DEPTH>,
    status_requested: bool,
}

impl DvmHost {
    /// Creates a fresh, idle parser.
    pub fn new(dvm_rx_timeout_ms: u64) -> Self {
        Self {
            state: ParseState::Idle,
            buf: heapless::Vec::new(),
            declared_len: 0,
            last_byte_ms: 0,
            dvm_rx_timeout_ms,
            tx_fifo: Fifo::new(),
            ui_tx_queue: Deque::new(),
            status_requested: false,
        }
    }

    fn reset_parser(&mut self) {
        self.state = ParseState::Idle;
        self.buf.clear();
        self.declared_len = 0;
    }

    /// Pops one P25 payload queued for HDLC transmission, if any.
    pub fn pop_ui_tx(&mut self) -> Option<P25Payload> {
        self.ui_tx_queue.pop_front()
    }

    /// Returns and clears whether a `GET_STATUS` request is waiting on a
    /// reply. The parser can't compose that reply itself: it needs the
    /// sync engine's remaining TX capacity, which only the bridge has, so
    /// the bridge must call [`Self::status_reply`] once this returns
    /// `true`.
    pub fn take_status_request(&mut self) -> bool {
        core::mem::take(&mut self.status_requested)
    }

    /// Writes as many queued reply bytes as the sink will accept.
    pub fn drain_tx<S: crate::io::ByteSink>(&mut self, sink: &mut S) {
        let mut scratch = [0u8; 64];
        loop {
            let mut n = 0;
            while n < scratch.len() {
                match self.tx_fifo.pop() {
                    Ok(b) => {
                        scratch[n] = b;
                        n += 1;
                    }
                    Err(_) => break,
                }
            }
            if n == 0 {
                break;
            }
            if sink.write(&scratch[..n]).is_err() {
                log_error!("DVM host write failed");
                break;
            }
        }
    }

    /// Feeds one byte received from the host into the parser. If the byte
    /// completes a frame, the command is dispatched and any reply is queued
    /// for [`Self::drain_tx`].
    pub fn feed_byte(&mut self, byte: u8, now_ms: u64, flash: &mut impl ConfigFlash) {
        if self.state != ParseState::Idle
            && now_ms.wrapping_sub(self.last_byte_ms) > self.dvm_rx_timeout_ms
        {
            log_warn!("DVM inter-byte timeout, resetting parser");
            self.reset_parser();
        }
        self.last_byte_ms = now_ms;

        match self.state {
            ParseState::Idle => match byte {
                DVM_FRAME_START_SHORT => {
                    self.buf.clear();
                    let _ = self.buf.push(byte);
                    self.state = ParseState::HaveStartShort;
                }
                DVM_FRAME_START_LONG => {
                    self.buf.clear();
                    let _ = self.buf.push(byte);
                    self.state = ParseState::HaveStartLong;
                }
                other => {
                    let _ = other;
                    log_warn!("invalid DVM start byte {:#04x}", other);
                }
            },
            ParseState::HaveStartShort => {
                let _ = self.buf.push(byte);
                self.declared_len = u16::from(byte);
                if self.finalize_length(now_ms, flash) {
                    self.state = ParseState::Accumulating;
                }
            }
            ParseState::HaveStartLong => {
                let _ = self.buf.push(byte);
                self.declared_len = u16::from(byte) << 8;
                self.state = ParseState::HaveLenHigh;
            }
            ParseState::HaveLenHigh => {
                let _ = self.buf.push(byte);
                self.declared_len |= u16::from(byte);
                if self.finalize_length(now_ms, flash) {
                    self.state = ParseState::Accumulating;
                }
            }
            ParseState::Accumulating => {
                let _ = self.buf.push(byte);
                if self.buf.len() as u16 >= self.declared_len {
                    self.dispatch(now_ms, flash);
                    self.reset_parser();
                }
            }
        }
    }

    /// Returns `true` if the declared length was accepted and accumulation
    /// should continue; on rejection the parser is reset and a NAK queued.
    fn finalize_length(&mut self, now_ms: u64, flash: &mut impl ConfigFlash) -> bool {
        if self.declared_len > DVM_MAX_MESSAGE_LEN {
            log_warn!("declared DVM length {} exceeds maximum", self.declared_len);
            let _ = flash;
            let _ = now_ms;
            let err = DvmError::LengthTooLarge(self.declared_len);
            self.nak(0x00, err.reason());
            self.reset_parser();
            return false;
        }
        if self.buf.len() as u16 >= self.declared_len {
            self.dispatch(now_ms, flash);
            self.reset_parser();
            return false;
        }
        true
    }

    fn dispatch(&mut self, now_ms: u64, flash: &mut impl ConfigFlash) {
        if self.buf.len() < 3 {
            return;
        }
        let cmd = self.buf[2];
        let payload = self.buf[3..].to_owned_heapless();

        match cmd {
            CMD_GET_VERSION => self.version_reply(),
            CMD_GET_STATUS => self.status_requested = true,
            CMD_SET_CONFIG | CMD_SET_RFPARAMS | CMD_CAL_DATA => self.ack(cmd),
            CMD_SET_MODE | CMD_P25_CLEAR => self.ack(cmd),
            CMD_P25_DATA => self.accept_p25_data(&payload),
            CMD_FLASH_READ => self.flash_read(flash),
            CMD_FLASH_WRITE => self.flash_write(flash, &payload),
            CMD_RESET_MCU => {
                if flash.request_bootloader_jump().is_err() {
                    self.nak(cmd, ReasonCode::Nak);
                } else {
                    self.ack(cmd);
                }
            }
            other => {
                log_warn!("unknown DVM command {:#04x}", other);
                let _ = now_ms;
                self.nak(other, DvmError::UnknownCommand(other).reason());
            }
        }
    }

    fn accept_p25_data(&mut self, payload: &[u8]) {
        if payload.is_empty() {
            log_warn!("P25_DATA frame missing pad byte");
            return;
        }
        let mut data: P25Payload = heapless::Vec::new();
        if data.extend_from_slice(&payload[1..]).is_err() || self.ui_tx_queue.push_back(data).is_err() {
            log_warn!("UI TX queue full, dropping host P25 frame");
        }
    }

    fn flash_read(&mut self, flash: &mut impl ConfigFlash) {
        let mut page = [0u8; 16];
        match flash.read_page(&mut page) {
            Ok(n) => {
                let mut reply: heapless::Vec<u8, 24> = heapless::Vec::new();
                let _ = reply.push(0xFE);
                let _ = reply.push(0); // patched below
                let _ = reply.push(CMD_FLASH_READ);
                let _ = reply.extend_from_slice(&page[..n]);
                let total = reply.len() as u8;
                reply[1] = total;
                self.queue_reply(&reply);
            }
            Err(e) => self.nak(CMD_FLASH_READ, e.reason()),
        }
    }

    fn flash_write(&mut self, flash: &mut impl ConfigFlash, payload: &[u8]) {
        match flash.write_page(payload) {
            Ok(()) => self.ack(CMD_FLASH_WRITE),
            Err(e) => self.nak(CMD_FLASH_WRITE, e.reason()),
        }
    }

    /// Composes and queues the `GET_VERSION` reply.
    pub fn version_reply(&mut self) {
        let mut reply: heapless::Vec<u8, 64> = heapless::Vec::new();
        let _ = reply.push(0xFE);
        let _ = reply.push(0); // patched below
        let _ = reply.push(CMD_GET_VERSION);
        let _ = reply.push(DVM_PROTOCOL_VERSION);
        let _ = reply.push(DVM_CPU_KIND);
        for _ in 0..16 {
            let _ = reply.push(0); // device UID: unknown without a platform collaborator
        }
        let desc = b"dvm-v24-bridge\0";
        let _ = reply.extend_from_slice(desc);
        let total = reply.len() as u8;
        reply[1] = total;
        self.queue_reply(&reply);
    }

    /// Composes and queues the `GET_STATUS` reply. `free_blocks` is the
    /// caller-supplied remaining capacity (in 16-byte blocks) for P25 data
    /// flowing toward the V.24 line; the caller is expected to have already
    /// applied the low-buffer clear-and-warn policy via
    /// [`crate::sync::SyncEngine::tx_free_blocks`].
    pub fn status_reply(&mut self, peer_connected: bool, free_blocks: u16) {
        let mut mode_flags = STATUS_MODE_BASE | STATUS_FLAG_BLOCKS;
        if peer_connected {
            mode_flags |= STATUS_FLAG_CONNECTED;
        }
        let state = if peer_connected {
            STATUS_STATE_P25
        } else {
            STATUS_STATE_IDLE
        };
        let reply = [
            0xFE,
            12,
            CMD_GET_STATUS,
            mode_flags,
            state,
            0,
            0,
            0,
            0,
            0,
            free_blocks.min(u16::from(u8::MAX)) as u8,
            0,
            0,
            0,
            0,
        ];
        self.queue_reply(&reply);
    }

    fn ack(&mut self, cmd: u8) {
        self.queue_reply(&[0xFE, 4, REPLY_ACK, cmd]);
    }

    fn nak(&mut self, cmd: u8, reason: ReasonCode) {
        self.queue_reply(&[0xFE, 5, REPLY_NAK, cmd, reason as u8]);
    }

    /// Composes the `P25_DATA` reply carrying a UI frame payload from HDLC
    /// out to the host.
    pub fn emit_p25_data(&mut self, payload: &[u8]) {
        let mut reply: heapless::Vec<u8, MAX_MSG> = heapless::Vec::new();
        let _ = reply.push(0xFE);
        let _ = reply.push((payload.len() + 4) as u8);
        let _ = reply.push(CMD_P25_DATA);
        let _ = reply.push(0x00);
        let _ = reply.extend_from_slice(payload);
        self.queue_reply(&reply);
    }

    fn queue_reply(&mut self, bytes: &[u8]) {
        if self.tx_fifo.push_slice(bytes).is_err() {
            log_warn!("DVM TX buffer full, dropping reply");
            self.tx_fifo.clear();
        }
    }
}

trait ToOwnedHeapless {
    fn to_owned_heapless(&self) -> heapless::Vec<u8, MAX_MSG>;
}

impl ToOwnedHeapless for [u8] {
    fn to_owned_heapless(&self) -> heapless::Vec<u8, MAX_MSG> {
        let mut v = heapless::Vec::new();
        let _ = v.extend_from_slice(self);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct NoFlash;
    impl ConfigFlash for NoFlash {
        fn read_page(&mut self, out: &mut [u8]) -> Result<usize, crate::error::FlashError> {
            out.fill(0);
            Ok(out.len())
        }
        fn write_page(&mut self, _data: &[u8]) -> Result<(), crate::error::FlashError> {
            Ok(())
        }
        fn request_bootloader_jump(&mut self) -> Result<(), crate::error::FlashError> {
            Ok(())
        }
    }

    fn feed(host: &mut DvmHost, bytes: &[u8]) {
        let mut flash = NoFlash;
        for (i, &b) in bytes.iter().enumerate() {
            host.feed_byte(b, i as u64, &mut flash);
        }
    }

    fn drained(host: &mut DvmHost) -> Vec<u8> {
        struct Collect(Vec<u8>);
        impl crate::io::ByteSink for Collect {
            type Error = core::convert::Infallible;
            fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
                self.0.extend_from_slice(data);
                Ok(data.len())
            }
        }
        let mut sink = Collect(Vec::new());
        host.drain_tx(&mut sink);
        sink.0
    }

    #[test]
    fn get_version_replies_with_protocol_fields() {
        let mut host = DvmHost::new(100);
        feed(&mut host, &[0xFE, 0x03, CMD_GET_VERSION]);
        let out = drained(&mut host);
        assert_eq!(out[0], 0xFE);
        assert_eq!(out[2], CMD_GET_VERSION);
        assert_eq!(out[3], DVM_PROTOCOL_VERSION);
        assert_eq!(out[4], DVM_CPU_KIND);
    }

    #[test]
    fn p25_data_strips_pad_byte_and_queues_for_hdlc() {
        let mut host = DvmHost::new(100);
        feed(&mut host, &[0xFE, 0x09, CMD_P25_DATA, 0x00, b'A', b'B', b'C', b'D', b'E']);
        let payload = host.pop_ui_tx().expect("payload queued");
        assert_eq!(payload.as_slice(), b"ABCDE");
    }

    #[test]
    fn long_frame_length_over_max_is_rejected_with_illegal_length() {
        let mut host = DvmHost::new(100);
        feed(&mut host, &[0xFD, 0x01, 0x00, 0x00]);
        let out = drained(&mut host);
        assert_eq!(out[0], 0xFE);
        assert_eq!(out[2], REPLY_NAK);
        assert_eq!(out[4], ReasonCode::IllegalLength as u8);
    }

    #[test]
    fn unknown_command_is_nakked() {
        let mut host = DvmHost::new(100);
        feed(&mut host, &[0xFE, 0x03, 0x99]);
        let out = drained(&mut host);
        assert_eq!(out[2], REPLY_NAK);
        assert_eq!(out[3], 0x99);
        assert_eq!(out[4], ReasonCode::InvalidRequest as u8);
    }

    #[test]
    fn status_reply_reflects_connection_state() {
        let mut host = DvmHost::new(100);
        host.status_reply(true, 20);
        let out = drained(&mut host);
        assert_eq!(out[3] & STATUS_FLAG_CONNECTED, STATUS_FLAG_CONNECTED);
        assert_eq!(out[4], STATUS_STATE_P25);
        assert_eq!(out[10], 20);
    }

    #[test]
    fn emits_p25_data_toward_host_with_pad_byte() {
        let mut host = DvmHost::new(100);
        host.emit_p25_data(b"XYZ");
        let out = drained(&mut host);
        assert_eq!(out, std::vec![0xFE, 0x07, CMD_P25_DATA, 0x00, b'X', b'Y', b'Z']);
    }

    #[test]
    fn inter_byte_timeout_resets_the_parser() {
        let mut host = DvmHost::new(50);
        let mut flash = NoFlash;
        host.feed_byte(0xFE, 0, &mut flash);
        host.feed_byte(0xFE, 200, &mut flash); // past the 50ms timeout, starts a fresh frame
        assert_eq!(host.state, ParseState::HaveStartShort);
    }
}
