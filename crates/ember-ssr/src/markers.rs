//! Marker attributes for hydrated elements.
//!
//! The render pipeline places these on every element that should be
//! hydrated; the client runtime finds nodes by them.

use crate::settings::HydrationSettings;

/// Ids returned by a registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Registration {
	/// Id of the function body.
	pub function_id: String,
	/// Id of the data payload, if one was given.
	pub data_id: Option<String>,
}

impl Registration {
	/// Marker attributes as name/value pairs.
	pub fn attrs(&self, settings: &HydrationSettings) -> Vec<(String, String)> {
		let mut attrs = vec![(settings.function_attr.clone(), self.function_id.clone())];

		if let Some(ref data_id) = self.data_id {
			attrs.push((settings.data_attr.clone(), data_id.clone()));
		}

		attrs
	}

	/// Marker attributes rendered as `name="value"` pairs.
	pub fn to_attr_string(&self, settings: &HydrationSettings) -> String {
		self.attrs(settings)
			.iter()
			.map(|(k, v)| format!("{}=\"{}\"", k, html_escape_attr(v)))
			.collect::<Vec<_>>()
			.join(" ")
	}
}

/// Escapes a string for use in a double-quoted HTML attribute value.
pub fn html_escape_attr(s: &str) -> String {
	s.replace('&', "&amp;")
		.replace('"', "&quot;")
		.replace('<', "&lt;")
		.replace('>', "&gt;")
}
