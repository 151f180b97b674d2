//! Runtime error types.

use thiserror::Error;

/// Errors returned by runtime operations that indicate misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
	/// A reactor operation needed a DOM root but the reactor has none.
	#[error("reactor is not attached to a DOM node")]
	NoRoot,
	/// A selector could not be parsed.
	#[error("invalid selector: {0}")]
	InvalidSelector(String),
	/// An array index lies too far past the end of the array to pad.
	#[error("index {segment} is out of range for an array of length {len}")]
	IndexOutOfRange {
		/// The offending path segment.
		segment: String,
		/// Length of the array at that point.
		len: usize,
	},
	/// The browser rejected a DOM call.
	#[error("DOM operation failed: {0}")]
	Dom(String),
	/// The node handle refers to a node that no longer exists in its document.
	#[error("node {0} does not exist")]
	DetachedNode(usize),
}

/// A failure reported by user code: a hydration function, a lifecycle hook,
/// a relay handler or a reactor watcher.
///
/// These are always caught at the call site and logged, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HydrateError {
	message: String,
}

impl HydrateError {
	/// Creates an error with the given message.
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
		}
	}

	/// The error message.
	pub fn message(&self) -> &str {
		&self.message
	}
}

impl From<RuntimeError> for HydrateError {
	fn from(err: RuntimeError) -> Self {
		Self::new(err.to_string())
	}
}

impl From<serde_json::Error> for HydrateError {
	fn from(err: serde_json::Error) -> Self {
		Self::new(err.to_string())
	}
}

/// Result of user-supplied callbacks.
pub type HandlerResult = Result<(), HydrateError>;
