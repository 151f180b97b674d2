//! Minimal CSS selector support.
//!
//! Supports comma-separated groups of compound selectors built from a tag
//! name (or `*`), `#id`, `.class`, `[attr]` and `[attr=value]` (value bare or
//! quoted). Combinators are not supported; marker lookups and form-control
//! binding only ever need compound selectors.

use std::collections::BTreeMap;

use crate::error::RuntimeError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
	Id(String),
	Class(String),
	HasAttr(String),
	AttrEquals(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Compound {
	tag: Option<String>,
	conditions: Vec<Condition>,
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
	groups: Vec<Compound>,
}

impl Selector {
	/// Parses `input`.
	pub fn parse(input: &str) -> Result<Self, RuntimeError> {
		let invalid = || RuntimeError::InvalidSelector(input.to_string());
		let mut groups = Vec::new();
		for group in input.split(',') {
			let group = group.trim();
			if group.is_empty() {
				return Err(invalid());
			}
			groups.push(parse_compound(group).ok_or_else(invalid)?);
		}
		Ok(Self { groups })
	}

	/// Checks a node's tag and attributes against any group.
	pub(crate) fn matches(&self, tag: &str, attrs: &BTreeMap<String, String>) -> bool {
		self.groups.iter().any(|compound| {
			compound
				.tag
				.as_deref()
				.is_none_or(|t| t.eq_ignore_ascii_case(tag))
				&& compound.conditions.iter().all(|cond| match cond {
					Condition::Id(id) => attrs.get("id").is_some_and(|v| v == id),
					Condition::Class(class) => attrs
						.get("class")
						.is_some_and(|v| v.split_whitespace().any(|c| c == class)),
					Condition::HasAttr(name) => attrs.contains_key(name),
					Condition::AttrEquals(name, value) => {
						attrs.get(name).is_some_and(|v| v == value)
					}
				})
		})
	}
}

fn is_ident_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(chars: &[char], pos: &mut usize) -> Option<String> {
	let start = *pos;
	while *pos < chars.len() && is_ident_char(chars[*pos]) {
		*pos += 1;
	}
	(start < *pos).then(|| chars[start..*pos].iter().collect())
}

fn parse_compound(group: &str) -> Option<Compound> {
	let chars: Vec<char> = group.chars().collect();
	let mut pos = 0;
	let mut compound = Compound::default();

	if chars.first() == Some(&'*') {
		pos = 1;
	} else if chars.first().is_some_and(|c| is_ident_char(*c)) {
		compound.tag = Some(take_ident(&chars, &mut pos)?.to_ascii_lowercase());
	}

	while pos < chars.len() {
		match chars[pos] {
			'#' => {
				pos += 1;
				compound.conditions.push(Condition::Id(take_ident(&chars, &mut pos)?));
			}
			'.' => {
				pos += 1;
				compound
					.conditions
					.push(Condition::Class(take_ident(&chars, &mut pos)?));
			}
			'[' => {
				pos += 1;
				compound.conditions.push(parse_attr(&chars, &mut pos)?);
			}
			_ => return None,
		}
	}
	Some(compound)
}

fn parse_attr(chars: &[char], pos: &mut usize) -> Option<Condition> {
	let name = take_ident(chars, pos)?;
	match chars.get(*pos)? {
		']' => {
			*pos += 1;
			Some(Condition::HasAttr(name))
		}
		'=' => {
			*pos += 1;
			let value = match chars.get(*pos)? {
				quote @ ('"' | '\'') => {
					let quote = *quote;
					*pos += 1;
					let start = *pos;
					while *pos < chars.len() && chars[*pos] != quote {
						*pos += 1;
					}
					if *pos >= chars.len() {
						return None;
					}
					let value: String = chars[start..*pos].iter().collect();
					*pos += 1;
					value
				}
				_ => take_ident(chars, pos)?,
			};
			if chars.get(*pos) != Some(&']') {
				return None;
			}
			*pos += 1;
			Some(Condition::AttrEquals(name, value))
		}
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	}

	#[rstest]
	#[case("div", "div", &[], true)]
	#[case("DIV", "div", &[], true)]
	#[case("span", "div", &[], false)]
	#[case("*", "p", &[], true)]
	#[case("#main", "div", &[("id", "main")], true)]
	#[case(".a", "div", &[("class", "b a")], true)]
	#[case(".a", "div", &[("class", "ab")], false)]
	#[case("[data-em-fn]", "div", &[("data-em-fn", "x")], true)]
	#[case("[data-em-fn=\"x1\"]", "div", &[("data-em-fn", "x1")], true)]
	#[case("[data-em-fn='x1']", "div", &[("data-em-fn", "x2")], false)]
	#[case("input[type=checkbox]", "input", &[("type", "checkbox")], true)]
	#[case("input[type=checkbox]", "input", &[("type", "radio")], false)]
	#[case("select, textarea", "textarea", &[], true)]
	fn test_selector_matches(
		#[case] selector: &str,
		#[case] tag: &str,
		#[case] pairs: &[(&str, &str)],
		#[case] expected: bool,
	) {
		let selector = Selector::parse(selector).unwrap();
		assert_eq!(selector.matches(tag, &attrs(pairs)), expected);
	}

	#[rstest]
	#[case("")]
	#[case("div p")]
	#[case("[unterminated")]
	#[case("[a=\"open]")]
	#[case("a,")]
	#[case("#")]
	fn test_selector_rejects(#[case] input: &str) {
		assert_eq!(
			Selector::parse(input),
			Err(RuntimeError::InvalidSelector(input.to_string()))
		);
	}
}
