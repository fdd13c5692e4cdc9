//! Tick-loop glue for driving [`crate::bridge::Bridge`] from a platform timer.
//!
//! Two approaches are supported, selected by Cargo feature:
//! - `timer-isr` (default): a hardware timer ISR calls into a
//!   `critical_section`-protected global [`crate::bridge::Bridge`] singleton.
//!   See [`global_bridge_init`], [`global_bridge_setup`],
//!   [`global_bridge_tick_line`] and the [`crate::init_bridge!`] /
//!   [`crate::setup_bridge!`] / [`crate::tick_bridge_timer!`] macros.
//! - `delay-loop`: a blocking loop drives ticks via
//!   `embedded_hal::delay::DelayNs`. See [`run_bridge_tick_loop`].
//!
//! Neither approach configures the underlying hardware timer or clock tree;
//! that bring-up is a platform concern outside this crate (spec.md §1).

#[cfg(feature = "delay-loop")]
mod delay;
#[cfg(feature = "delay-loop")]
pub use delay::*;

#[cfg(feature = "timer-isr")]
mod isr;
#[cfg(feature = "timer-isr")]
pub use isr::*;

#[cfg(feature = "timer-isr")]
mod macros;
