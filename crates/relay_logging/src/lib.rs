#![deny(missing_docs)]
//! Shared logging utilities for the relay workspace.
//!
//! This crate provides the `relay_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger.
//!
//! Every macro accepts an optional `job: <id>,` prefix. When present the
//! correlation id is rendered in brackets ahead of the message so that log
//! lines for one message job can be grepped together.

/// Log target used by the relay macros.
pub const TARGET: &str = "relay";

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! relay_trace {
    (job: $id:expr, $($arg:tt)+) => {{
        log::trace!(target: $crate::TARGET, "[{}] {}", $id, format_args!($($arg)+));
    }};
    ($($arg:tt)*) => {{
        log::trace!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! relay_debug {
    (job: $id:expr, $($arg:tt)+) => {{
        log::debug!(target: $crate::TARGET, "[{}] {}", $id, format_args!($($arg)+));
    }};
    ($($arg:tt)*) => {{
        log::debug!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! relay_info {
    (job: $id:expr, $($arg:tt)+) => {{
        log::info!(target: $crate::TARGET, "[{}] {}", $id, format_args!($($arg)+));
    }};
    ($($arg:tt)*) => {{
        log::info!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! relay_warn {
    (job: $id:expr, $($arg:tt)+) => {{
        log::warn!(target: $crate::TARGET, "[{}] {}", $id, format_args!($($arg)+));
    }};
    ($($arg:tt)*) => {{
        log::warn!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! relay_error {
    (job: $id:expr, $($arg:tt)+) => {{
        log::error!(target: $crate::TARGET, "[{}] {}", $id, format_args!($($arg)+));
    }};
    ($($arg:tt)*) => {{
        log::error!(target: $crate::TARGET, $($arg)*);
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Debug builds get the chatty per-job lines too.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
