//! Thin logging macros gated on the `log` feature.
//!
//! Mirrors the original firmware's `log_info`/`log_warn`/`log_error`/
//! `log_trace` call sites (see `original_source/fw/v24/src/{sync,hdlc,vcp}.c`)
//! without requiring a logger backend when the `log` feature is disabled.
//! Kept off the per-bit hot path; used only at state transitions and drops.

macro_rules! log_info {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::info!($($arg)*);
    };
}

macro_rules! log_warn {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::warn!($($arg)*);
    };
}

macro_rules! log_error {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::error!($($arg)*);
    };
}

pub(crate) use {log_error, log_info, log_warn};
