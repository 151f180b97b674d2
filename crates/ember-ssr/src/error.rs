//! Error types for the registration engine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the registration engine.
///
/// Payload shape never produces an error: malformed data is registered as
/// an opaque string. Only misuse of the render-pass lifecycle and settings
/// loading fail.
#[derive(Debug, Error)]
pub enum EngineError {
	/// A pass-scoped operation ran outside of a [`RenderPass`](crate::RenderPass).
	#[error("no render pass is active on this thread")]
	NoActiveContext,
	/// [`RenderPass::begin`](crate::RenderPass::begin) while another pass is active.
	#[error("a render pass is already active on this thread")]
	PassAlreadyActive,
	/// Settings TOML could not be parsed.
	#[error("invalid hydration settings: {0}")]
	Settings(#[from] toml::de::Error),
	/// Settings file could not be read.
	#[error("cannot read settings file {path}: {source}")]
	SettingsIo {
		/// File that failed
		path: PathBuf,
		/// Underlying I/O error
		#[source]
		source: std::io::Error,
	},
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
