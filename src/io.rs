//! External I/O adapter boundary (spec.md §4.6, C6).
//!
//! The bridge core never names a concrete clock, USB stack, or flash driver;
//! it is generic over these narrow traits, the same way [`crate::driver`] is
//! generic over `embedded-hal` pin types rather than a specific MCU HAL.

/// A monotonic millisecond clock, used for debounce, timeout, and heartbeat
/// scheduling throughout the bridge.
pub trait MonotonicClock {
    /// Milliseconds elapsed since an arbitrary, implementation-defined epoch.
    /// Must never go backwards.
    fn now_ms(&self) -> u64;
}

/// A byte-oriented transport to the DVM host (USB-CDC, UART, or a host-side
/// simulation channel).
pub trait ByteSink {
    /// Error type surfaced by the underlying transport.
    type Error;

    /// Writes as much of `data` as the transport can currently accept.
    /// Returns the number of bytes written; short writes are legal and the
    /// caller is expected to retry later with the remainder.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Requests USB re-enumeration (a D+ pull-up pulse on hardware that
    /// needs one). Default no-op: most transports never need this, and the
    /// bridge core never calls it on its own.
    fn request_enumeration(&mut self) {}
}

/// The on-MCU configuration flash page backing `FLASH_READ`/`FLASH_WRITE`
/// and the bootloader-jump request.
pub trait ConfigFlash {
    /// Reads the configuration page into `out`, returning the number of
    /// bytes copied.
    fn read_page(&mut self, out: &mut [u8]) -> Result<usize, crate::error::FlashError>;

    /// Erases and programs the configuration page from `data`.
    fn write_page(&mut self, data: &[u8]) -> Result<(), crate::error::FlashError>;

    /// Requests a reset into the system bootloader. Does not return on
    /// success; implementations that cannot honor the request should return
    /// an error instead of silently ignoring it.
    fn request_bootloader_jump(&mut self) -> Result<(), crate::error::FlashError>;
}
