//! Protocol constants for the V.24 synchronous link and the DVM host link.
//!
//! These values are fixed by the two wire protocols this crate bridges and
//! are not meant to be tuned at runtime; runtime-tunable timing lives in
//! [`crate::config::BridgeConfig`].

/// HDLC flag octet marking frame boundaries.
pub const HDLC_FLAG: u8 = 0x7E;
/// HDLC in-band escape octet.
pub const HDLC_ESCAPE: u8 = 0x7D;
/// Escaped form of a data 0x7E (follows [`HDLC_ESCAPE`]).
pub const HDLC_ESCAPE_7E: u8 = 0x5E;
/// Escaped form of a data 0x7D (follows [`HDLC_ESCAPE`]).
pub const HDLC_ESCAPE_7D: u8 = 0x5D;

/// HDLC control field: Set Asynchronous Balanced Mode.
pub const HDLC_CTRL_SABM: u8 = 0x3F;
/// HDLC control field: Unnumbered Acknowledge.
pub const HDLC_CTRL_UA: u8 = 0x73;
/// HDLC control field: Exchange Identification.
pub const HDLC_CTRL_XID: u8 = 0xBF;
/// HDLC control field: Receive Ready.
pub const HDLC_CTRL_RR: u8 = 0x01;
/// HDLC control field: Unnumbered Information.
pub const HDLC_CTRL_UI: u8 = 0x03;

/// This device's HDLC address, defaulting to the DIU-style address used by
/// the DVM-V24 bridge firmware.
pub const HDLC_ADDRESS: u8 = 0x0B;
/// Site ID reported in our XID reply.
pub const HDLC_SITE: u8 = 13;
/// Number of literal trailing flag octets pushed after each emitted frame.
pub const FRAME_SPACING: u8 = 2;

/// Sentinel meaning "no peer address has been learned yet".
pub const PEER_ADDRESS_UNKNOWN: u8 = 0x00;

/// Minimum on-wire frame length: address + control + 2-byte FCS.
pub const MIN_FRAME_LEN: usize = 4;

/// DVM host message preamble: short frame (1-byte length).
pub const DVM_FRAME_START_SHORT: u8 = 0xFE;
/// DVM host message preamble: long frame (2-byte length).
pub const DVM_FRAME_START_LONG: u8 = 0xFD;
/// Maximum DVM message size, including header.
pub const DVM_MAX_MESSAGE_LEN: u16 = 255;

/// DVM command: report firmware/protocol version.
pub const CMD_GET_VERSION: u8 = 0x00;
/// DVM command: report bridge/link status.
pub const CMD_GET_STATUS: u8 = 0x01;
/// DVM command: apply a configuration blob (ACK only).
pub const CMD_SET_CONFIG: u8 = 0x02;
/// DVM command: select operating mode (always P25; no-op).
pub const CMD_SET_MODE: u8 = 0x03;
/// DVM command: apply RF parameters (ACK only).
pub const CMD_SET_RFPARAMS: u8 = 0x06;
/// DVM command: calibration data (ACK only).
pub const CMD_CAL_DATA: u8 = 0x08;
/// DVM command: inbound/outbound P25 LDU payload.
pub const CMD_P25_DATA: u8 = 0x31;
/// DVM command: clear P25 state (no-op).
pub const CMD_P25_CLEAR: u8 = 0x33;
/// DVM command: read the configuration flash page.
pub const CMD_FLASH_READ: u8 = 0xE0;
/// DVM command: write the configuration flash page.
pub const CMD_FLASH_WRITE: u8 = 0xE1;
/// DVM command: reset into the system bootloader.
pub const CMD_RESET_MCU: u8 = 0xEA;

/// DVM reply opcode: acknowledge.
pub const REPLY_ACK: u8 = 0x70;
/// DVM reply opcode: negative-acknowledge.
pub const REPLY_NAK: u8 = 0x7F;

/// DVM protocol version reported in [`CMD_GET_VERSION`] replies.
pub const DVM_PROTOCOL_VERSION: u8 = 0x04;
/// CPU-kind byte reported in [`CMD_GET_VERSION`] replies (generic/host-bridge).
pub const DVM_CPU_KIND: u8 = 0x02;

/// `mode_flags` bit: free space is reported in 16-byte blocks.
pub const STATUS_FLAG_BLOCKS: u8 = 0x80;
/// `mode_flags` bit: the HDLC peer is connected.
pub const STATUS_FLAG_CONNECTED: u8 = 0x40;
/// Base `mode_flags` value (P25-only bridge).
pub const STATUS_MODE_BASE: u8 = 0x08;
/// `state` byte when the HDLC peer is connected (P25 active).
pub const STATUS_STATE_P25: u8 = 0x02;
/// `state` byte when idle.
pub const STATUS_STATE_IDLE: u8 = 0x00;
/// Block size (bytes) `free_space` is expressed in.
pub const STATUS_BLOCK_SIZE: u16 = 16;
/// Below this many free blocks, the RX FIFO is cleared and a warning issued.
pub const STATUS_LOW_BUFFER_BLOCKS: u16 = 16;

/// DVM reason code taxonomy (spec.md §7), fixed by the host protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReasonCode {
    /// No error.
    Ok = 0,
    /// Generic negative acknowledgement.
    Nak = 1,
    /// Declared length was illegal (e.g. exceeded the max message size).
    IllegalLength = 2,
    /// The request was malformed or unsupported.
    InvalidRequest = 4,
    /// A ring buffer was full.
    RingbuffFull = 8,
    /// Invalid FDMA preamble.
    InvalidFdmaPreamble = 10,
    /// Invalid mode requested.
    InvalidMode = 11,
    /// Invalid P25 correlation count.
    InvalidP25CorrCount = 16,
    /// No internal flash present.
    NoInternalFlash = 20,
    /// Flash erase failed.
    FailedEraseFlash = 21,
    /// Flash program failed.
    FailedWriteFlash = 22,
    /// The flash write payload was too large.
    FlashWriteTooBig = 23,
    /// Hotspot has no dual-mode support.
    HsNoDualMode = 32,
    /// DMR support is disabled.
    DmrDisabled = 63,
    /// P25 support is disabled.
    P25Disabled = 64,
    /// NXDN support is disabled.
    NxdnDisabled = 65,
}
