//! Runtime served as a separately cached asset.
//!
//! The asset is the `wasm-bindgen` output of `ember-runtime`: a JavaScript
//! module exporting `init` and `install`, plus the `.wasm` binary it fetches.
//! The page loads it with a module script that installs the runtime using the
//! same names the bootstrap script was written with.

use serde_json::json;

use crate::script::{escape_script_text, js_string};
use crate::settings::HydrationSettings;

/// `Cache-Control` value for the runtime asset. The URL is expected to be
/// versioned, so the response never needs revalidation.
pub const RUNTIME_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Content type of the runtime's JavaScript module.
pub const RUNTIME_CONTENT_TYPE: &str = "application/javascript; charset=utf-8";

/// Content type of the runtime's WebAssembly binary.
pub const WASM_CONTENT_TYPE: &str = "application/wasm";

/// The runtime module at its own URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeAsset {
	url: String,
}

impl RuntimeAsset {
	/// Creates the asset descriptor for `url`.
	pub fn new(url: impl Into<String>) -> Self {
		Self { url: url.into() }
	}

	/// The asset URL.
	pub fn url(&self) -> &str {
		&self.url
	}

	/// Module `<script>` importing the runtime and calling `install`.
	///
	/// Module scripts are deferred, so the runtime installs after parsing and
	/// the bootstrap script picks it up through the ready flag or event.
	pub fn script_tag(&self, settings: &HydrationSettings) -> String {
		let mut options = json!({
			"global": settings.global_name,
			"functionAttr": settings.function_attr,
			"dataAttr": settings.data_attr,
		});
		if let Some(asset) = &settings.runtime_asset {
			options["readyFlag"] = json!(asset.ready_flag);
			options["readyEvent"] = json!(asset.ready_event);
		}
		let module = format!(
			"import init,{{install}} from {};await init();install({});",
			js_string(&self.url),
			options
		);
		format!(
			"<script type=\"module\">{}</script>",
			escape_script_text(&module)
		)
	}

	/// Response headers for serving the runtime module.
	pub fn response_headers(&self) -> Vec<(&'static str, &'static str)> {
		response_headers_for(&self.url)
	}
}

/// Content type for a file of the runtime bundle, by extension.
pub fn content_type_for(path: &str) -> &'static str {
	let path = path.split(['?', '#']).next().unwrap_or(path);
	if path.ends_with(".wasm") {
		WASM_CONTENT_TYPE
	} else {
		RUNTIME_CONTENT_TYPE
	}
}

/// Response headers for a file of the runtime bundle.
pub fn response_headers_for(path: &str) -> Vec<(&'static str, &'static str)> {
	vec![
		("Content-Type", content_type_for(path)),
		("Cache-Control", RUNTIME_CACHE_CONTROL),
	]
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::settings::RuntimeAssetSettings;
	use rstest::rstest;

	#[rstest]
	fn test_script_tag_imports_module_and_installs() {
		// Arrange
		let settings = HydrationSettings::new()
			.global_name("__APP__")
			.runtime_asset(RuntimeAssetSettings::new("/static/ember.js?v=1&min=1"));
		let asset = RuntimeAsset::new("/static/ember.js?v=1&min=1");

		// Act
		let tag = asset.script_tag(&settings);

		// Assert
		assert!(tag.starts_with("<script type=\"module\">import init,{install} from \"/static/ember.js?v=1&min=1\";await init();install({"));
		assert!(tag.contains(r#""global":"__APP__""#));
		assert!(tag.contains(r#""readyFlag":"__EMBER_READY__""#));
		assert!(tag.contains(r#""readyEvent":"ember:ready""#));
		assert!(tag.contains(r#""functionAttr":"data-em-fn""#));
		assert!(tag.ends_with("});</script>"));
		assert_eq!(asset.url(), "/static/ember.js?v=1&min=1");
	}

	#[rstest]
	fn test_script_tag_url_cannot_close_tag() {
		let settings = HydrationSettings::new();
		let tag = RuntimeAsset::new("/x.js?</script><!--").script_tag(&settings);
		let inner = &tag["<script type=\"module\">".len()..tag.len() - "</script>".len()];
		assert!(!inner.to_ascii_lowercase().contains("</script"));
		assert!(!inner.contains("<!--"));
	}

	#[rstest]
	#[case("/static/ember.js", RUNTIME_CONTENT_TYPE)]
	#[case("/static/ember_bg.wasm", WASM_CONTENT_TYPE)]
	#[case("/static/ember_bg.wasm?v=3", WASM_CONTENT_TYPE)]
	fn test_content_type_by_extension(#[case] path: &str, #[case] expected: &str) {
		assert_eq!(content_type_for(path), expected);
	}

	#[rstest]
	fn test_headers_are_long_lived() {
		let headers = RuntimeAsset::new("/ember.js").response_headers();
		assert!(headers.contains(&("Cache-Control", "public, max-age=31536000, immutable")));
		assert!(headers.contains(&("Content-Type", RUNTIME_CONTENT_TYPE)));
	}
}
