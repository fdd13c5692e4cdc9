use crate::bridge::Bridge;
use embedded_hal::delay::DelayNs;

/// Runs a blocking loop that repeatedly calls [`Bridge::tick_line`] on the
/// provided bridge.
///
/// This is a simple timing loop for use in environments where interrupts are
/// unavailable or undesired. The caller supplies the current RXD sample and
/// monotonic timestamp each iteration; this function does not read hardware
/// itself.
///
/// # Arguments
/// - `bridge`: A mutable reference to a [`Bridge`] instance.
/// - `delay`: A delay provider implementing `DelayNs`, typically from the HAL.
/// - `tick_us`: The delay between each tick call, in microseconds.
/// - `rxd`: The current line RXD sample.
/// - `now_ms`: The current monotonic timestamp in milliseconds.
///
/// # Notes
/// - This function advances exactly one half bit-period; callers loop it
///   themselves so they can interleave host servicing between ticks.
pub fn run_bridge_tick_loop<D: DelayNs, const TXN: usize, const RXN: usize>(
    bridge: &mut Bridge<TXN, RXN>,
    delay: &mut D,
    tick_us: u32,
    rxd: bool,
    now_ms: u64,
) {
    let _ = bridge.tick_line(rxd, now_ms);
    delay.delay_us(tick_us);
}
