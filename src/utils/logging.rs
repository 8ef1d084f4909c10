//! Conditional, tagged logging macros.
//!
//! Every module that logs declares two constants and then uses the macros
//! exported at the crate root:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//! const LOG_TAG: &str = "sensing";
//!
//! use crate::{log_info, log_warn};
//!
//! log_info!("polling started every {}ms", 1000);
//! // => "[sensing] polling started every 1000ms"
//! ```
//!
//! Flipping `ENABLE_LOGS` to `false` silences a noisy module without touching
//! `RUST_LOG`.

/// Debug-level line, prefixed with the calling module's `LOG_TAG`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!("[{}] {}", LOG_TAG, format_args!($($arg)*));
        }
    };
}

/// Info-level line, prefixed with the calling module's `LOG_TAG`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!("[{}] {}", LOG_TAG, format_args!($($arg)*));
        }
    };
}

/// Warn-level line, prefixed with the calling module's `LOG_TAG`.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!("[{}] {}", LOG_TAG, format_args!($($arg)*));
        }
    };
}

/// Error-level line, prefixed with the calling module's `LOG_TAG`.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!("[{}] {}", LOG_TAG, format_args!($($arg)*));
        }
    };
}

/// Shorten untrusted text (model output, response bodies) before logging it.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("…");
    }
    out
}
