/// Declares a static global `BRIDGE` instance protected by a
/// `critical_section` mutex.
///
/// This macro creates a `static` singleton suitable for use in
/// interrupt-based environments, where both the main loop and a timer ISR
/// need to safely access the shared bridge state.
///
/// # Arguments
/// - `$txn`: TX byte-queue capacity (const usize)
/// - `$rxn`: RX byte-queue capacity (const usize)
///
/// # Example
/// ```rust
/// dvm_v24_bridge::init_bridge!(256, 256);
/// ```
#[macro_export]
macro_rules! init_bridge {
    ( $txn:expr, $rxn:expr ) => {
        pub static BRIDGE: $crate::critical_section::Mutex<
            core::cell::RefCell<Option<$crate::bridge::Bridge<$txn, $rxn>>>,
        > = $crate::critical_section::Mutex::new(core::cell::RefCell::new(None));
    };
}

/// Initializes the global `BRIDGE` singleton declared by [`init_bridge!`].
///
/// # Example
/// ```rust
/// use dvm_v24_bridge::config::BridgeConfig;
///
/// dvm_v24_bridge::init_bridge!(256, 256);
///
/// fn main() {
///     let config = BridgeConfig::default();
///     dvm_v24_bridge::setup_bridge!(config, 0);
/// }
/// ```
///
/// # Notes
/// - Must be called inside a critical section-aware context (safe in `main()`).
/// - Requires `init_bridge!` to have been used earlier.
#[macro_export]
macro_rules! setup_bridge {
    ( $config:expr, $now_ms:expr ) => {
        $crate::critical_section::with(|cs| {
            BRIDGE
                .borrow(cs)
                .replace(Some($crate::bridge::Bridge::new($config, $now_ms)));
        });
    };
}

/// Advances the global `BRIDGE`'s synchronous line engine by one
/// half bit-period. Intended for a timer ISR running at twice the V.24
/// line bit rate.
///
/// # Example
/// ```ignore
/// // Device-specific interrupt attribute, e.g. from `cortex-m-rt` or the
/// // target's PAC.
/// #[interrupt]
/// fn TIM2() {
///     let rxd = read_rxd_pin();
///     let now_ms = millis();
///     dvm_v24_bridge::tick_bridge_timer!(rxd, now_ms);
/// }
/// ```
#[macro_export]
macro_rules! tick_bridge_timer {
    ( $rxd:expr, $now_ms:expr ) => {
        $crate::critical_section::with(|cs| {
            if let Some(bridge) = BRIDGE.borrow(cs).borrow_mut().as_mut() {
                Some(bridge.tick_line($rxd, $now_ms))
            } else {
                None
            }
        })
    };
}
