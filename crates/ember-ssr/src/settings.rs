//! Hydration settings.
//!
//! Loaded from TOML or built in code:
//!
//! ```toml
//! function_attr = "data-em-fn"
//! data_attr = "data-em-data"
//! always_on = false
//! id_strategy = "content"
//! cache_storage = "local"
//!
//! [runtime_asset]
//! url = "/static/ember.js"
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{EngineError, Result};

/// Default function-id marker attribute.
pub const DEFAULT_FUNCTION_ATTR: &str = "data-em-fn";
/// Default data-id marker attribute.
pub const DEFAULT_DATA_ATTR: &str = "data-em-data";
/// Default window global holding the runtime and its body cache.
pub const DEFAULT_GLOBAL_NAME: &str = "__EMBER__";
/// Default window flag set once the runtime asset has loaded.
pub const DEFAULT_READY_FLAG: &str = "__EMBER_READY__";
/// Default event dispatched on `document` once the runtime asset has loaded.
pub const DEFAULT_READY_EVENT: &str = "ember:ready";

/// How ids are minted for newly registered bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
	/// A fresh random id per registry. Ids never repeat across render
	/// passes, so known-ids omission has nothing to match.
	Random,
	/// Derived from the body text, so the same body gets the same id in
	/// every render pass. Needed for known-ids omission across requests.
	#[default]
	Content,
}

/// Web storage the bootstrap persists bodies to, so known ids survive a
/// full page load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStorage {
	/// `window.localStorage`.
	#[default]
	Local,
	/// `window.sessionStorage`.
	Session,
	/// In-memory cache only.
	None,
}

impl CacheStorage {
	/// The `window` property holding the storage, if any.
	pub fn window_property(self) -> Option<&'static str> {
		match self {
			Self::Local => Some("localStorage"),
			Self::Session => Some("sessionStorage"),
			Self::None => None,
		}
	}
}

/// Where the runtime is served from when it is not inlined.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeAssetSettings {
	/// URL of the runtime script.
	pub url: String,
	/// Window flag the runtime sets when loaded.
	pub ready_flag: String,
	/// Event the runtime dispatches on `document` when loaded.
	pub ready_event: String,
}

impl Default for RuntimeAssetSettings {
	fn default() -> Self {
		Self {
			url: String::new(),
			ready_flag: DEFAULT_READY_FLAG.to_string(),
			ready_event: DEFAULT_READY_EVENT.to_string(),
		}
	}
}

impl RuntimeAssetSettings {
	/// Asset settings for `url` with default ready flag and event.
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			..Self::default()
		}
	}
}

/// Settings of the registration engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HydrationSettings {
	/// Attribute carrying the function id.
	pub function_attr: String,
	/// Attribute carrying the data id.
	pub data_attr: String,
	/// Emit the bootstrap even when nothing was registered.
	pub always_on: bool,
	/// Serve the runtime as a cached asset instead of inline.
	pub runtime_asset: Option<RuntimeAssetSettings>,
	/// Window global holding the runtime and its body cache.
	pub global_name: String,
	/// Id minting strategy.
	pub id_strategy: IdStrategy,
	/// Storage persisting bodies across page loads.
	pub cache_storage: CacheStorage,
}

impl Default for HydrationSettings {
	fn default() -> Self {
		Self {
			function_attr: DEFAULT_FUNCTION_ATTR.to_string(),
			data_attr: DEFAULT_DATA_ATTR.to_string(),
			always_on: false,
			runtime_asset: None,
			global_name: DEFAULT_GLOBAL_NAME.to_string(),
			id_strategy: IdStrategy::default(),
			cache_storage: CacheStorage::default(),
		}
	}
}

impl HydrationSettings {
	/// Creates the default settings.
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses settings from TOML. Missing keys keep their defaults.
	pub fn from_toml_str(input: &str) -> Result<Self> {
		let settings: Self = toml::from_str(input)?;
		Ok(settings.normalized())
	}

	/// Reads and parses a TOML settings file.
	pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let input = std::fs::read_to_string(path).map_err(|source| EngineError::SettingsIo {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_toml_str(&input)
	}

	/// Sets the function-id attribute.
	pub fn function_attr(mut self, name: impl Into<String>) -> Self {
		self.function_attr = name.into();
		self
	}

	/// Sets the data-id attribute.
	pub fn data_attr(mut self, name: impl Into<String>) -> Self {
		self.data_attr = name.into();
		self
	}

	/// Emits the bootstrap even on pages without registrations.
	pub fn always_on(mut self) -> Self {
		self.always_on = true;
		self
	}

	/// Serves the runtime from `asset`.
	pub fn runtime_asset(mut self, asset: RuntimeAssetSettings) -> Self {
		self.runtime_asset = Some(asset);
		self
	}

	/// Sets the window global name.
	pub fn global_name(mut self, name: impl Into<String>) -> Self {
		self.global_name = name.into();
		self
	}

	/// Sets the id minting strategy.
	pub fn id_strategy(mut self, strategy: IdStrategy) -> Self {
		self.id_strategy = strategy;
		self
	}

	/// Sets the storage bodies are persisted to.
	pub fn cache_storage(mut self, storage: CacheStorage) -> Self {
		self.cache_storage = storage;
		self
	}

	/// Returns true in mount-as-asset mode.
	pub fn is_asset_mode(&self) -> bool {
		self.runtime_asset.is_some()
	}

	/// Replaces empty names with defaults; an asset without a URL is dropped.
	fn normalized(mut self) -> Self {
		if self.function_attr.trim().is_empty() {
			tracing::warn!("empty function_attr, using {}", DEFAULT_FUNCTION_ATTR);
			self.function_attr = DEFAULT_FUNCTION_ATTR.to_string();
		}
		if self.data_attr.trim().is_empty() {
			tracing::warn!("empty data_attr, using {}", DEFAULT_DATA_ATTR);
			self.data_attr = DEFAULT_DATA_ATTR.to_string();
		}
		if self.global_name.trim().is_empty() {
			tracing::warn!("empty global_name, using {}", DEFAULT_GLOBAL_NAME);
			self.global_name = DEFAULT_GLOBAL_NAME.to_string();
		}
		if self
			.runtime_asset
			.as_ref()
			.is_some_and(|asset| asset.url.trim().is_empty())
		{
			tracing::warn!("runtime_asset without url, inlining the bootstrap");
			self.runtime_asset = None;
		}
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::io::Write;

	#[rstest]
	fn test_defaults() {
		let settings = HydrationSettings::default();
		assert_eq!(settings.function_attr, "data-em-fn");
		assert_eq!(settings.data_attr, "data-em-data");
		assert_eq!(settings.global_name, "__EMBER__");
		assert!(!settings.always_on);
		assert!(!settings.is_asset_mode());
		assert_eq!(settings.id_strategy, IdStrategy::Content);
		assert_eq!(settings.cache_storage, CacheStorage::Local);
	}

	#[rstest]
	#[case("cache_storage = \"session\"", CacheStorage::Session, Some("sessionStorage"))]
	#[case("cache_storage = \"none\"", CacheStorage::None, None)]
	#[case("", CacheStorage::Local, Some("localStorage"))]
	fn test_cache_storage_from_toml(
		#[case] input: &str,
		#[case] expected: CacheStorage,
		#[case] property: Option<&str>,
	) {
		let settings = HydrationSettings::from_toml_str(input).unwrap();
		assert_eq!(settings.cache_storage, expected);
		assert_eq!(settings.cache_storage.window_property(), property);
	}

	#[rstest]
	fn test_from_toml_partial() {
		// Arrange
		let input = r#"
			always_on = true
			id_strategy = "random"

			[runtime_asset]
			url = "/static/ember.js"
		"#;

		// Act
		let settings = HydrationSettings::from_toml_str(input).unwrap();

		// Assert
		assert!(settings.always_on);
		assert_eq!(settings.id_strategy, IdStrategy::Random);
		assert_eq!(settings.function_attr, DEFAULT_FUNCTION_ATTR);
		let asset = settings.runtime_asset.unwrap();
		assert_eq!(asset.url, "/static/ember.js");
		assert_eq!(asset.ready_event, DEFAULT_READY_EVENT);
	}

	#[rstest]
	#[case("function_attr = \"\"", DEFAULT_FUNCTION_ATTR)]
	#[case("function_attr = \"data-hx\"", "data-hx")]
	fn test_empty_names_fall_back(#[case] input: &str, #[case] expected: &str) {
		let settings = HydrationSettings::from_toml_str(input).unwrap();
		assert_eq!(settings.function_attr, expected);
	}

	#[rstest]
	fn test_asset_without_url_is_dropped() {
		let settings = HydrationSettings::from_toml_str("[runtime_asset]\nready_flag = \"x\"").unwrap();
		assert!(!settings.is_asset_mode());
	}

	#[rstest]
	fn test_invalid_toml() {
		let err = HydrationSettings::from_toml_str("always_on = \"yes\"").unwrap_err();
		assert!(matches!(err, EngineError::Settings(_)));
	}

	#[rstest]
	fn test_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "global_name = \"__APP__\"").unwrap();

		let settings = HydrationSettings::from_toml_file(file.path()).unwrap();

		assert_eq!(settings.global_name, "__APP__");
	}

	#[rstest]
	fn test_missing_file() {
		let err = HydrationSettings::from_toml_file("/nonexistent/ember.toml").unwrap_err();
		assert!(matches!(err, EngineError::SettingsIo { .. }));
	}

	#[rstest]
	fn test_builder() {
		let settings = HydrationSettings::new()
			.function_attr("data-f")
			.data_attr("data-d")
			.global_name("__X__")
			.always_on()
			.id_strategy(IdStrategy::Random)
			.cache_storage(CacheStorage::None)
			.runtime_asset(RuntimeAssetSettings::new("/rt.js"));
		assert_eq!(settings.function_attr, "data-f");
		assert!(settings.is_asset_mode());
		assert!(settings.always_on);
	}
}
