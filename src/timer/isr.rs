use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::io::{ByteSink, ConfigFlash};
use crate::sync::TickAction;
use core::cell::RefCell;
use critical_section::Mutex;

/// Used to initialize the global static [`Bridge`] for use with
/// `critical_section`.
///
/// # Example
/// ```rust
/// use dvm_v24_bridge::bridge::Bridge;
/// use core::cell::RefCell;
/// use critical_section::Mutex;
/// use dvm_v24_bridge::timer::global_bridge_init;
///
/// static BRIDGE: Mutex<RefCell<Option<Bridge<256, 256>>>> = global_bridge_init::<256, 256>();
/// ```
pub const fn global_bridge_init<const TXN: usize, const RXN: usize>()
-> Mutex<RefCell<Option<Bridge<TXN, RXN>>>> {
    Mutex::new(RefCell::new(None))
}

/// Builds and installs a [`Bridge`] into the global singleton from a
/// critical-section-aware context (safe in `main()`).
///
/// # Example
/// ```rust
/// use dvm_v24_bridge::bridge::Bridge;
/// use dvm_v24_bridge::config::BridgeConfig;
/// use core::cell::RefCell;
/// use critical_section::Mutex;
/// use dvm_v24_bridge::timer::{global_bridge_init, global_bridge_setup};
///
/// static BRIDGE: Mutex<RefCell<Option<Bridge<256, 256>>>> = global_bridge_init::<256, 256>();
///
/// fn main() {
///     global_bridge_setup(&BRIDGE, BridgeConfig::default(), 0);
/// }
/// ```
pub fn global_bridge_setup<const TXN: usize, const RXN: usize>(
    global_bridge: &'static Mutex<RefCell<Option<Bridge<TXN, RXN>>>>,
    config: BridgeConfig,
    now_ms: u64,
) {
    critical_section::with(|cs| {
        let _ = global_bridge
            .borrow(cs)
            .replace(Some(Bridge::new(config, now_ms)));
    });
}

/// Advances the global [`Bridge`]'s synchronous line engine by one
/// half bit-period. Intended to be called from a timer ISR running at
/// twice the V.24 line bit rate.
///
/// Returns `None` if the bridge has not yet been set up.
pub fn global_bridge_tick_line<const TXN: usize, const RXN: usize>(
    global_bridge: &'static Mutex<RefCell<Option<Bridge<TXN, RXN>>>>,
    rxd: bool,
    now_ms: u64,
) -> Option<TickAction> {
    critical_section::with(|cs| {
        global_bridge
            .borrow(cs)
            .borrow_mut()
            .as_mut()
            .map(|bridge| bridge.tick_line(rxd, now_ms))
    })
}

/// Feeds one byte received from the DVM host transport into the global
/// [`Bridge`]'s parser.
pub fn feed_global_bridge_host_byte<const TXN: usize, const RXN: usize>(
    global_bridge: &'static Mutex<RefCell<Option<Bridge<TXN, RXN>>>>,
    byte: u8,
    now_ms: u64,
    flash: &mut impl ConfigFlash,
) {
    critical_section::with(|cs| {
        if let Some(bridge) = global_bridge.borrow(cs).borrow_mut().as_mut() {
            bridge.feed_host_byte(byte, now_ms, flash);
        }
    });
}

/// Runs one service pass (see [`Bridge::service`]) on the global instance.
/// Intended to be called from the cooperative main loop, not from an ISR.
pub fn service_global_bridge<const TXN: usize, const RXN: usize, S: ByteSink>(
    global_bridge: &'static Mutex<RefCell<Option<Bridge<TXN, RXN>>>>,
    sink: &mut S,
    now_ms: u64,
) -> bool {
    critical_section::with(|cs| {
        global_bridge
            .borrow(cs)
            .borrow_mut()
            .as_mut()
            .map(|bridge| bridge.service(sink, now_ms))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlashError;

    #[derive(Default)]
    struct NoFlash;
    impl ConfigFlash for NoFlash {
        fn read_page(&mut self, out: &mut [u8]) -> Result<usize, FlashError> {
            out.fill(0);
            Ok(out.len())
        }
        fn write_page(&mut self, _data: &[u8]) -> Result<(), FlashError> {
            Ok(())
        }
        fn request_bootloader_jump(&mut self) -> Result<(), FlashError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemSink(Vec<u8>);
    impl ByteSink for MemSink {
        type Error = core::convert::Infallible;
        fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
            self.0.extend_from_slice(data);
            Ok(data.len())
        }
    }

    #[test]
    fn global_bridge_ticks_once_set_up() {
        static BRIDGE: Mutex<RefCell<Option<Bridge<64, 64>>>> = global_bridge_init::<64, 64>();
        global_bridge_setup(&BRIDGE, BridgeConfig::default(), 0);
        assert!(global_bridge_tick_line(&BRIDGE, false, 1).is_some());
    }

    #[test]
    fn global_bridge_drains_host_version_request() {
        static BRIDGE: Mutex<RefCell<Option<Bridge<64, 64>>>> = global_bridge_init::<64, 64>();
        global_bridge_setup(&BRIDGE, BridgeConfig::default(), 0);
        let mut flash = NoFlash;
        for (i, &b) in [0xFE, 0x03, 0x00].iter().enumerate() {
            feed_global_bridge_host_byte(&BRIDGE, b, i as u64, &mut flash);
        }
        let mut sink = MemSink::default();
        let _ = service_global_bridge(&BRIDGE, &mut sink, 1);
        assert_eq!(sink.0[0], 0xFE);
    }
}
