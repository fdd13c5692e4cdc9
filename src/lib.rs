//! # dvm-v24-bridge
//!
//! A portable, no_std Rust bridge between a P25 repeater's V.24 synchronous
//! serial port and the asynchronous DVM host protocol spoken by digital
//! voice modem software.
//!
//! This crate implements, in pure software:
//! - a synchronous HDLC bit engine (bit-stuffing, flag hunting, NRZ clocking)
//! - the HDLC link layer (SABM/UA/XID/RR/UI framing, FCS, peer tracking)
//! - the DVM host's stop-and-wait framed message protocol
//! - the glue that drains one side into the other in a fixed order
//!
//! ## Crate features
//! | Feature               | Description |
//! |-----------------------|-------------|
//! | `std`                 | Disables `#![no_std]` support and replaces `heapless::Vec`s with
//! `std::vec::Vec`s |
//! | `delay-loop`        | Uses `embedded_hal::blocking::delay::DelayUs` for bit timing |
//! | `timer-isr` (default) | Uses `critical_section::with` for bit timing |
//! | `defmt`               | Uses `defmt` logging |
//! | `log`                 | Uses `log` logging |
//!
//! ## Usage
//!
//! ```rust
//! use dvm_v24_bridge::bridge::Bridge;
//! use dvm_v24_bridge::config::BridgeConfig;
//! use dvm_v24_bridge::error::FlashError;
//! use dvm_v24_bridge::io::ConfigFlash;
//!
//! struct NoFlash;
//! impl ConfigFlash for NoFlash {
//!     fn read_page(&mut self, out: &mut [u8]) -> Result<usize, FlashError> {
//!         out.fill(0);
//!         Ok(out.len())
//!     }
//!     fn write_page(&mut self, _data: &[u8]) -> Result<(), FlashError> {
//!         Ok(())
//!     }
//!     fn request_bootloader_jump(&mut self) -> Result<(), FlashError> {
//!         Ok(())
//!     }
//! }
//!
//! fn main() {
//!     let mut bridge: Bridge<256, 256> = Bridge::new(BridgeConfig::default(), 0);
//!     let mut flash = NoFlash;
//!     bridge.feed_host_byte(0xFE, 0, &mut flash);
//!     let _action = bridge.tick_line(false, 0); // call at twice the line bit rate
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `timer-isr`: Use a hardware timer ISR to call `tick_line()` (requires platform-specific ISR setup)
//! - `delay-loop`: Use a blocking loop to drive `tick_line()` with `embedded_hal::blocking::delay::DelayUs`
//!
//! ## Integration Notes
//!
//! - The synchronous link runs at twice the line bit rate (rising/falling half-periods)
//! - Timing precision is critical; hardware timer configuration is recommended for reliability
//! - Only one bridge instance should be active at a time in interrupt-driven mode
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "timer-isr")]
pub use critical_section;

#[cfg(all(feature = "timer-isr", not(feature = "std")))]
pub use heapless;

mod trace;

pub mod bridge;
pub mod config;
pub mod consts;
pub(crate) mod crc;
pub mod dvm;
pub mod error;
pub mod fifo;
pub mod hdlc;
pub mod io;
pub mod sync;
pub mod timer;
