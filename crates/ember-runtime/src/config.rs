//! Client runtime configuration.

/// Default attribute carrying the function id of a hydrated element.
pub const DEFAULT_FUNCTION_ATTR: &str = "data-em-fn";
/// Default attribute carrying the data id of a hydrated element.
pub const DEFAULT_DATA_ATTR: &str = "data-em-data";
/// Default attribute the runtime writes the instance id into.
pub const DEFAULT_INSTANCE_ATTR: &str = "data-em-id";

/// Marker attribute names the runtime looks for.
///
/// Must match the server settings the page was rendered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
	/// Attribute holding the function id.
	pub function_attr: String,
	/// Attribute holding the data id.
	pub data_attr: String,
	/// Attribute set to the instance id while an instance is mounted.
	/// `None` keeps the id off the markup.
	pub instance_attr: Option<String>,
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		Self {
			function_attr: DEFAULT_FUNCTION_ATTR.to_string(),
			data_attr: DEFAULT_DATA_ATTR.to_string(),
			instance_attr: Some(DEFAULT_INSTANCE_ATTR.to_string()),
		}
	}
}

impl RuntimeConfig {
	/// Creates the default configuration.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the function-id attribute name.
	pub fn function_attr(mut self, name: impl Into<String>) -> Self {
		self.function_attr = name.into();
		self
	}

	/// Sets the data-id attribute name.
	pub fn data_attr(mut self, name: impl Into<String>) -> Self {
		self.data_attr = name.into();
		self
	}

	/// Sets the instance-id attribute name, or disables it with `None`.
	pub fn instance_attr(mut self, name: Option<String>) -> Self {
		self.instance_attr = name;
		self
	}

	/// Selector matching every element bound to `function_id`.
	pub(crate) fn function_selector(&self, function_id: &str) -> String {
		format!("[{}=\"{}\"]", self.function_attr, function_id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_defaults() {
		let config = RuntimeConfig::new();
		assert_eq!(config.function_attr, "data-em-fn");
		assert_eq!(config.data_attr, "data-em-data");
		assert_eq!(config.instance_attr.as_deref(), Some("data-em-id"));
	}

	#[rstest]
	fn test_builder_and_selector() {
		let config = RuntimeConfig::new()
			.function_attr("data-fn")
			.data_attr("data-d")
			.instance_attr(None);
		assert_eq!(config.function_selector("f1"), "[data-fn=\"f1\"]");
		assert_eq!(config.data_attr, "data-d");
		assert_eq!(config.instance_attr, None);
	}
}
