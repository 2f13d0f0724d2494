//! Switchable logging macros for the scanning hot paths.
//!
//! The sampling cycle logs on every tick, which is noisy once a scanner is
//! deployed. Each module that uses these macros declares its own switch:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_debug, log_info, log_warn};
//!
//! log_info!("camera opened");
//! ```
//!
//! When `ENABLE_LOGS` is `false` the calls compile down to nothing; the
//! global level is still governed by `RUST_LOG` through `env_logger`.

/// Info-level log gated on the caller's `ENABLE_LOGS` constant.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn-level log gated on the caller's `ENABLE_LOGS` constant.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error-level log gated on the caller's `ENABLE_LOGS` constant.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

/// Debug-level log gated on the caller's `ENABLE_LOGS` constant.
///
/// Used for per-cycle detection misses, which are normal and frequent.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}
