#![deny(missing_docs)]
//! Shared logging utilities for the skywatch workspace.
//!
//! Every crate logs through the `sky_*` macros below so that the log target
//! stays under the `skywatch` prefix, which the binary uses to filter out
//! chatter from the HTTP and WebSocket stacks.

/// Prefix of every target emitted by the `sky_*` macros.
pub const TARGET_PREFIX: &str = "skywatch";

/// Logs a trace-level message under the calling module's target.
#[macro_export]
macro_rules! sky_trace {
    ($($arg:tt)*) => {{
        log::trace!(target: module_path!(), $($arg)*);
    }};
}

/// Logs a debug-level message under the calling module's target.
#[macro_export]
macro_rules! sky_debug {
    ($($arg:tt)*) => {{
        log::debug!(target: module_path!(), $($arg)*);
    }};
}

/// Logs an info-level message under the calling module's target.
#[macro_export]
macro_rules! sky_info {
    ($($arg:tt)*) => {{
        log::info!(target: module_path!(), $($arg)*);
    }};
}

/// Logs a warn-level message under the calling module's target.
#[macro_export]
macro_rules! sky_warn {
    ($($arg:tt)*) => {{
        log::warn!(target: module_path!(), $($arg)*);
    }};
}

/// Logs an error-level message under the calling module's target.
#[macro_export]
macro_rules! sky_error {
    ($($arg:tt)*) => {{
        log::error!(target: module_path!(), $($arg)*);
    }};
}

/// Returns true when `target` belongs to one of the skywatch crates.
pub fn is_skywatch_target(target: &str) -> bool {
    target.starts_with(TARGET_PREFIX)
}

/// Initializes a terminal logger for use in tests.
///
/// Safe to call from every test: it no-ops once a logger is installed.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let config = ConfigBuilder::new()
        .add_filter_allow_str(TARGET_PREFIX)
        .build();

    let _ = TermLogger::init(level, config, TerminalMode::Mixed, ColorChoice::Auto);
}

#[cfg(test)]
mod tests {
    use super::is_skywatch_target;

    #[test]
    fn recognizes_workspace_targets() {
        assert!(is_skywatch_target("skywatch_engine::api"));
        assert!(!is_skywatch_target("reqwest::connect"));
    }

    #[test]
    fn macros_expand_without_a_logger() {
        sky_info!("plain message");
        sky_debug!("formatted {}", 42);
    }
}
