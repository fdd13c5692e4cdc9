//! Runtime-tunable bridge timing.
//!
//! Mirrors the `#define`s in the original firmware's `sync.h`/`hdlc.h`
//! (`SYNC_RX_DELAY`, `RX_TIMEOUT`, `RR_INTERVAL`) as a small config struct
//! instead of compile-time constants, so a host-side simulation or a
//! differently-clocked peer can adjust them without a rebuild.

use crate::consts::{HDLC_ADDRESS, HDLC_SITE};

/// Tunable timing and identity for one bridge instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Milliseconds between idle-mode RR heartbeats while connected.
    pub rr_interval_ms: u64,
    /// Milliseconds of silence from the peer before sync is dropped.
    pub rx_timeout_ms: u64,
    /// Milliseconds to suppress RX processing after startup/reset/drop.
    pub sync_rx_delay_ms: u64,
    /// Milliseconds allowed between DVM host bytes before the parser resets.
    pub dvm_rx_timeout_ms: u64,
    /// This device's HDLC address.
    pub hdlc_address: u8,
    /// Site ID reported in our XID reply.
    pub hdlc_site: u8,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            rr_interval_ms: 5_000,
            rx_timeout_ms: 10_000,
            sync_rx_delay_ms: 1_000,
            dvm_rx_timeout_ms: 100,
            hdlc_address: HDLC_ADDRESS,
            hdlc_site: HDLC_SITE,
        }
    }
}
