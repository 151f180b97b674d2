//! Placing the bootstrap into rendered HTML.

/// Closing body marker the script is placed before.
pub const BODY_CLOSE: &str = "</body>";

/// Inserts `script` immediately before the last `</body>` (any case), or
/// appends it when there is none.
///
/// `html` of `None` stands for a missing document: the result is the
/// script alone, or an empty string when there is no script.
pub fn inject_script(html: Option<&str>, script: &str) -> String {
	let Some(html) = html else {
		return script.to_string();
	};
	if script.is_empty() {
		return html.to_string();
	}

	let lower = html.to_ascii_lowercase();
	match lower.rfind(BODY_CLOSE) {
		Some(index) => {
			let mut out = String::with_capacity(html.len() + script.len());
			out.push_str(&html[..index]);
			out.push_str(script);
			out.push_str(&html[index..]);
			out
		}
		None => format!("{}{}", html, script),
	}
}
