//! Value tree for reactive node state.
//!
//! Hydration payloads arrive as JSON, but the state a mounted node keeps can
//! also hold dates, regular expressions and opaque host handles. [`Value`]
//! covers all of them and defines the equality the Data Reactor uses to
//! decide whether a write is a change.
//!
//! ## Equality
//!
//! | Left / Right | Rule |
//! |--------------|------|
//! | numbers | `==`, except `NaN` equals `NaN` |
//! | arrays | same length and positional equality |
//! | objects | same key set and recursive equality |
//! | dates | same `valueOf` (epoch milliseconds) |
//! | regexes | same `/source/flags` form |
//! | opaque handles | same allocation only |
//! | mismatched variants | never equal |

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Serialize, Serializer};

use crate::error::RuntimeError;

/// How many `null` slots a single write may pad onto the end of an array.
pub const MAX_ARRAY_GAP: usize = 1024;

/// A reference-compared host value (callbacks, class instances, DOM handles).
#[derive(Clone)]
pub struct Opaque(Rc<dyn Any>);

impl Opaque {
	/// Wraps a host value.
	pub fn new<T: Any>(value: T) -> Self {
		Self(Rc::new(value))
	}

	/// Borrows the wrapped value if it has type `T`.
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.0.downcast_ref::<T>()
	}

	/// Returns true when both handles point at the same allocation.
	pub fn ptr_eq(&self, other: &Opaque) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl fmt::Debug for Opaque {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Opaque({:p})", Rc::as_ptr(&self.0))
	}
}

/// A JSON-like tagged value.
#[derive(Debug, Clone, Default)]
pub enum Value {
	/// `null`.
	#[default]
	Null,
	/// A boolean.
	Bool(bool),
	/// A number. All numbers are doubles, as in the browser.
	Number(f64),
	/// A string.
	String(String),
	/// An ordered list.
	Array(Vec<Value>),
	/// A plain object.
	Object(BTreeMap<String, Value>),
	/// A date, stored as epoch milliseconds.
	Date(f64),
	/// A regular expression.
	Regex {
		/// Pattern source.
		source: String,
		/// Flags such as `gi`.
		flags: String,
	},
	/// Anything else, compared by reference.
	Opaque(Opaque),
}

impl Value {
	/// Creates an empty object.
	pub fn object() -> Self {
		Value::Object(BTreeMap::new())
	}

	/// Creates an empty array.
	pub fn array() -> Self {
		Value::Array(Vec::new())
	}

	/// Returns true for `null`.
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// Returns true for plain objects.
	pub fn is_object(&self) -> bool {
		matches!(self, Value::Object(_))
	}

	/// Returns the string slice of a string value.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	/// Returns the boolean of a bool value.
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_ => None,
		}
	}

	/// Returns the number of a number value.
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Number(n) => Some(*n),
			_ => None,
		}
	}

	/// Returns the elements of an array value.
	pub fn as_array(&self) -> Option<&Vec<Value>> {
		match self {
			Value::Array(items) => Some(items),
			_ => None,
		}
	}

	/// Returns the entries of an object value.
	pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
		match self {
			Value::Object(map) => Some(map),
			_ => None,
		}
	}

	/// Loose truthiness, as used when a control is bound to a non-boolean path.
	pub fn is_truthy(&self) -> bool {
		match self {
			Value::Null => false,
			Value::Bool(b) => *b,
			Value::Number(n) => *n != 0.0 && !n.is_nan(),
			Value::String(s) => !s.is_empty(),
			_ => true,
		}
	}

	/// String form used when a value is written into a text control.
	pub fn to_display_string(&self) -> String {
		match self {
			Value::Null => String::new(),
			Value::Bool(b) => b.to_string(),
			Value::Number(n) => format_number(*n),
			Value::String(s) => s.clone(),
			Value::Regex { source, flags } => format!("/{}/{}", source, flags),
			other => other.to_json().to_string(),
		}
	}

	/// Follows `segments` from this value.
	///
	/// Objects are indexed by key and arrays by decimal position. Any missing
	/// or non-container intermediate yields `None`.
	pub fn get_path(&self, segments: &[String]) -> Option<&Value> {
		let mut current = self;
		for segment in segments {
			current = match current {
				Value::Object(map) => map.get(segment)?,
				Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
				_ => return None,
			};
		}
		Some(current)
	}

	/// Writes `value` at `segments`, creating objects for missing intermediates.
	///
	/// A non-container intermediate is replaced by an object. Writing past the
	/// end of an array pads it with `null`, by at most [`MAX_ARRAY_GAP`] slots.
	///
	/// # Errors
	///
	/// [`RuntimeError::IndexOutOfRange`] when an array index lies further
	/// past the end than that. The tree is left untouched.
	pub fn set_path(&mut self, segments: &[String], value: Value) -> Result<(), RuntimeError> {
		let Some((last, parents)) = segments.split_last() else {
			*self = value;
			return Ok(());
		};
		self.check_path(segments)?;

		let mut current = self;
		for segment in parents {
			current = child_slot(current, segment);
		}

		match current {
			Value::Array(items) if is_index(last) => {
				let index = array_index(last, items.len())?;
				if index >= items.len() {
					items.resize(index + 1, Value::Null);
				}
				items[index] = value;
			}
			Value::Object(map) => {
				map.insert(last.clone(), value);
			}
			other => {
				let mut map = BTreeMap::new();
				map.insert(last.clone(), value);
				*other = Value::Object(map);
			}
		}
		Ok(())
	}

	/// Validates every array index along `segments` before anything is written.
	fn check_path(&self, segments: &[String]) -> Result<(), RuntimeError> {
		let mut current = Some(self);
		for segment in segments {
			current = match current {
				Some(Value::Array(items)) if is_index(segment) => {
					let index = array_index(segment, items.len())?;
					items.get(index)
				}
				Some(Value::Object(map)) => map.get(segment),
				_ => None,
			};
		}
		Ok(())
	}

	/// Converts into a JSON value. Dates become numbers, regexes their string
	/// form, opaque handles and non-finite numbers `null`.
	pub fn to_json(&self) -> serde_json::Value {
		match self {
			Value::Null | Value::Opaque(_) => serde_json::Value::Null,
			Value::Bool(b) => serde_json::Value::Bool(*b),
			Value::Number(n) | Value::Date(n) => serde_json::Number::from_f64(*n)
				.map(serde_json::Value::Number)
				.unwrap_or(serde_json::Value::Null),
			Value::String(s) => serde_json::Value::String(s.clone()),
			Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
			Value::Object(map) => serde_json::Value::Object(
				map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
			),
			Value::Regex { source, flags } => {
				serde_json::Value::String(format!("/{}/{}", source, flags))
			}
		}
	}

	/// Parses a JSON payload.
	pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str::<serde_json::Value>(json).map(Value::from)
	}
}

fn is_index(segment: &str) -> bool {
	!segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn array_index(segment: &str, len: usize) -> Result<usize, RuntimeError> {
	segment
		.parse::<usize>()
		.ok()
		.filter(|index| index.saturating_sub(len) <= MAX_ARRAY_GAP)
		.ok_or_else(|| RuntimeError::IndexOutOfRange {
			segment: segment.to_string(),
			len,
		})
}

/// Callers run `Value::check_path` first, so array indices here are in range.
fn child_slot<'a>(parent: &'a mut Value, segment: &str) -> &'a mut Value {
	let index = match parent {
		Value::Array(items) if is_index(segment) => array_index(segment, items.len()).ok(),
		_ => None,
	};
	if index.is_none() && !matches!(parent, Value::Object(_)) {
		*parent = Value::object();
	}

	let slot = match (parent, index) {
		(Value::Array(items), Some(index)) => {
			if index >= items.len() {
				items.resize(index + 1, Value::Null);
			}
			&mut items[index]
		}
		(Value::Object(map), _) => map.entry(segment.to_string()).or_insert_with(Value::object),
		(other, _) => other,
	};
	if !matches!(slot, Value::Object(_) | Value::Array(_)) {
		*slot = Value::object();
	}
	slot
}

fn format_number(n: f64) -> String {
	if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
		format!("{}", n as i64)
	} else {
		n.to_string()
	}
}

/// Structural equality with the runtime's rules (see module docs).
pub fn deep_equal(a: &Value, b: &Value) -> bool {
	match (a, b) {
		(Value::Null, Value::Null) => true,
		(Value::Bool(x), Value::Bool(y)) => x == y,
		(Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
		(Value::String(x), Value::String(y)) => x == y,
		(Value::Array(x), Value::Array(y)) => {
			x.len() == y.len() && x.iter().zip(y).all(|(l, r)| deep_equal(l, r))
		}
		(Value::Object(x), Value::Object(y)) => {
			x.len() == y.len()
				&& x.iter()
					.all(|(key, l)| y.get(key).is_some_and(|r| deep_equal(l, r)))
		}
		(Value::Date(x), Value::Date(y)) => x == y || (x.is_nan() && y.is_nan()),
		(
			Value::Regex {
				source: s1,
				flags: f1,
			},
			Value::Regex {
				source: s2,
				flags: f2,
			},
		) => s1 == s2 && f1 == f2,
		(Value::Opaque(x), Value::Opaque(y)) => x.ptr_eq(y),
		_ => false,
	}
}

/// [`deep_equal`] lifted over absent values; two absent values are equal.
pub fn deep_equal_opt(a: Option<&Value>, b: Option<&Value>) -> bool {
	match (a, b) {
		(None, None) => true,
		(Some(x), Some(y)) => deep_equal(x, y),
		_ => false,
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		deep_equal(self, other)
	}
}

impl Serialize for Value {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.to_json().serialize(serializer)
	}
}

impl From<serde_json::Value> for Value {
	fn from(json: serde_json::Value) -> Self {
		match json {
			serde_json::Value::Null => Value::Null,
			serde_json::Value::Bool(b) => Value::Bool(b),
			serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
			serde_json::Value::String(s) => Value::String(s),
			serde_json::Value::Array(items) => {
				Value::Array(items.into_iter().map(Value::from).collect())
			}
			serde_json::Value::Object(map) => {
				Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
			}
		}
	}
}

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Bool(b)
	}
}

impl From<f64> for Value {
	fn from(n: f64) -> Self {
		Value::Number(n)
	}
}

impl From<i32> for Value {
	fn from(n: i32) -> Self {
		Value::Number(f64::from(n))
	}
}

impl From<i64> for Value {
	fn from(n: i64) -> Self {
		Value::Number(n as f64)
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::String(s.to_string())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::String(s)
	}
}

impl From<Vec<Value>> for Value {
	fn from(items: Vec<Value>) -> Self {
		Value::Array(items)
	}
}

impl From<Opaque> for Value {
	fn from(handle: Opaque) -> Self {
		Value::Opaque(handle)
	}
}
