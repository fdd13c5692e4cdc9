//! Error taxonomy for the bridge (spec.md §7).
//!
//! Each layer gets its own error enum rather than a single flat one, since
//! the recovery action differs per layer (drop a frame vs. drop sync vs.
//! NAK the host). `thiserror`'s `no_std` derive keeps these on par with the
//! rest of the crate's `#![no_std]` posture.

use crate::consts::ReasonCode;
use thiserror::Error;

/// Buffer-layer failure: a FIFO could not accept or yield a byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FifoError {
    /// The ring is full; the push was rejected.
    #[error("fifo full")]
    Full,
    /// The ring is empty; the pop/peek was rejected.
    #[error("fifo empty")]
    Empty,
}

/// Frame-layer failure: a received HDLC frame was rejected.
///
/// Rejection drops the frame and logs; it never drops sync (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Frame shorter than address + control + 2-byte FCS.
    #[error("frame too short: {0} bytes")]
    TooShort(usize),
    /// Computed CRC did not match the trailing FCS.
    #[error("FCS mismatch: expected {expected:#06x}, got {actual:#06x}")]
    FcsMismatch {
        /// FCS computed over the frame.
        expected: u16,
        /// FCS carried in the frame trailer.
        actual: u16,
    },
    /// Control field did not match any recognized encoding.
    #[error("unknown control field {0:#04x}")]
    UnknownControl(u8),
}

/// Line-layer failure: the sync bit engine lost frame alignment.
///
/// Always results in a full reset: RX state cleared, HDLC link reset,
/// RX-arm debounce rearmed (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Seven consecutive one-bits observed while synced.
    #[error("abort pattern observed")]
    Abort,
    /// The receive bit counter advanced past a full byte without reset.
    #[error("RX bit counter overrun")]
    BitOverrun,
    /// No frame received within the RX timeout while synced.
    #[error("RX timeout")]
    RxTimeout,
}

/// Protocol-layer (host) failure: the DVM frame parser rejected input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DvmError {
    /// The first byte of a new frame was neither 0xFE nor 0xFD.
    #[error("invalid start byte {0:#04x}")]
    InvalidStart(u8),
    /// Declared length exceeded the maximum message size.
    #[error("declared length {0} exceeds maximum message size")]
    LengthTooLarge(u16),
    /// No byte arrived within the inter-byte timeout.
    #[error("inter-byte timeout")]
    Timeout,
    /// The command byte did not match any known command.
    #[error("unknown command {0:#04x}")]
    UnknownCommand(u8),
}

impl DvmError {
    /// Maps a parser failure onto the fixed host-visible reason taxonomy.
    pub fn reason(self) -> ReasonCode {
        match self {
            DvmError::InvalidStart(_) | DvmError::Timeout | DvmError::UnknownCommand(_) => {
                ReasonCode::InvalidRequest
            }
            DvmError::LengthTooLarge(_) => ReasonCode::IllegalLength,
        }
    }
}

/// Flash-layer failure reported back to the host as a NAK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlashError {
    /// The page could not be erased.
    #[error("flash erase failed")]
    EraseFailed,
    /// The page could not be programmed.
    #[error("flash write failed")]
    WriteFailed,
    /// The requested write payload exceeds the page size.
    #[error("flash write payload too large")]
    TooBig,
}

impl FlashError {
    /// Maps a flash failure onto the fixed host-visible reason taxonomy.
    pub fn reason(self) -> ReasonCode {
        match self {
            FlashError::EraseFailed => ReasonCode::FailedEraseFlash,
            FlashError::WriteFailed => ReasonCode::FailedWriteFlash,
            FlashError::TooBig => ReasonCode::FlashWriteTooBig,
        }
    }
}
