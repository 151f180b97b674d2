//! Logging abstraction layer for ember-runtime
//!
//! Thin macros over [`tracing`] so runtime code logs the same way on every
//! target. All macros are no-ops in release builds.
//!
//! ## Macro Overview
//!
//! | Macro | Debug Assertions | Feature Required | Level |
//! |-------|------------------|------------------|-------|
//! | `debug_log!` | Required | `debug-hooks` | `DEBUG` |
//! | `info_log!` | Required | None | `INFO` |
//! | `warn_log!` | Required | None | `WARN` |
//! | `error_log!` | Required | None | `ERROR` |
//!
//! Swallowed failures (hydration functions, lifecycle hooks, relay and watch
//! handlers) are reported through `warn_log!`.
//!
//! ## Example
//!
//! ```ignore
//! use ember_runtime::{debug_log, warn_log};
//!
//! debug_log!("sparked {} instances", count);
//! warn_log!("unmount hook failed on instance {}: {}", id, err);
//! ```

/// Logs a debug message (requires `debug-hooks` feature + `debug_assertions`)
#[macro_export]
#[cfg(all(debug_assertions, feature = "debug-hooks"))]
macro_rules! debug_log {
	($($arg:tt)*) => {{
		$crate::__tracing::debug!(target: "ember_runtime", $($arg)*);
	}};
}

/// No-op debug_log when conditions are not met
#[macro_export]
#[cfg(not(all(debug_assertions, feature = "debug-hooks")))]
macro_rules! debug_log {
	($($arg:tt)*) => {{}};
}

/// Logs an info message (requires `debug_assertions`)
#[macro_export]
#[cfg(debug_assertions)]
macro_rules! info_log {
	($($arg:tt)*) => {{
		$crate::__tracing::info!(target: "ember_runtime", $($arg)*);
	}};
}

/// No-op info_log in release builds
#[macro_export]
#[cfg(not(debug_assertions))]
macro_rules! info_log {
	($($arg:tt)*) => {{}};
}

/// Logs a warning message (requires `debug_assertions`)
#[macro_export]
#[cfg(debug_assertions)]
macro_rules! warn_log {
	($($arg:tt)*) => {{
		$crate::__tracing::warn!(target: "ember_runtime", $($arg)*);
	}};
}

/// No-op warn_log in release builds
#[macro_export]
#[cfg(not(debug_assertions))]
macro_rules! warn_log {
	($($arg:tt)*) => {{}};
}

/// Logs an error message (requires `debug_assertions`)
#[macro_export]
#[cfg(debug_assertions)]
macro_rules! error_log {
	($($arg:tt)*) => {{
		$crate::__tracing::error!(target: "ember_runtime", $($arg)*);
	}};
}

/// No-op error_log in release builds
#[macro_export]
#[cfg(not(debug_assertions))]
macro_rules! error_log {
	($($arg:tt)*) => {{}};
}
