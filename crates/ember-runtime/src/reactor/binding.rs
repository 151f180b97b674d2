//! Two-way form binding
//!
//! Connects a reactor path to the form controls matched by a selector.
//!
//! | Controls matched | Value shape |
//! |------------------|-------------|
//! | text input / textarea | string (number for `type=number`/`range` when it parses) |
//! | one checkbox | bool |
//! | several checkboxes | array of the checked boxes' values |
//! | radios | value of the checked radio, or null |
//! | `<select>` | selected option value |
//! | `<select multiple>` | array of selected option values |

use std::rc::Rc;

use super::{Reactor, WatchHandler, WatchOptions};
use crate::debug_log;
use crate::dom::Element;
use crate::error::{HandlerResult, RuntimeError};
use crate::value::Value;

/// Options for [`Reactor::bind`].
#[derive(Clone, Default)]
pub struct BindOptions {
	handler: Option<WatchHandler>,
	immediate: bool,
}

impl BindOptions {
	/// Creates options without a change handler.
	pub fn new() -> Self {
		Self::default()
	}

	/// Attaches a change handler, invoked as `handler(new, old)`.
	pub fn on_change<F>(mut self, handler: F) -> Self
	where
		F: Fn(Option<&Value>, Option<&Value>) -> HandlerResult + 'static,
	{
		self.handler = Some(Rc::new(handler));
		self
	}

	/// Invokes the change handler once right after binding.
	pub fn immediate(mut self, immediate: bool) -> Self {
		self.immediate = immediate;
		self
	}
}

#[derive(Debug, Clone)]
enum Controls {
	Text(Vec<Element>),
	Checkbox(Element),
	CheckboxGroup(Vec<Element>),
	Radio(Vec<Element>),
	Select(Vec<Element>),
	SelectMultiple(Vec<Element>),
}

impl Controls {
	fn classify(elements: Vec<Element>) -> Self {
		let Some(first) = elements.first() else {
			return Controls::Text(elements);
		};
		if first.tag_name() == "select" {
			return if first.is_multiple() {
				Controls::SelectMultiple(elements)
			} else {
				Controls::Select(elements)
			};
		}
		if first.tag_name() == "input" {
			match first.input_type().as_str() {
				"checkbox" if elements.len() == 1 => return Controls::Checkbox(first.clone()),
				"checkbox" => return Controls::CheckboxGroup(elements),
				"radio" => return Controls::Radio(elements),
				_ => {}
			}
		}
		Controls::Text(elements)
	}

	fn elements(&self) -> Vec<Element> {
		match self {
			Controls::Checkbox(el) => vec![el.clone()],
			Controls::Text(els)
			| Controls::CheckboxGroup(els)
			| Controls::Radio(els)
			| Controls::Select(els)
			| Controls::SelectMultiple(els) => els.clone(),
		}
	}

	/// Reads the bound value, taking text from `source` when given.
	fn read(&self, source: Option<&Element>) -> Value {
		match self {
			Controls::Text(els) => source
				.or_else(|| els.first())
				.map(text_value)
				.unwrap_or_default(),
			Controls::Checkbox(el) => Value::Bool(el.checked()),
			Controls::CheckboxGroup(els) => Value::Array(
				els.iter()
					.filter(|el| el.checked())
					.map(|el| Value::String(el.value()))
					.collect(),
			),
			Controls::Radio(els) => els
				.iter()
				.find(|el| el.checked())
				.map(|el| Value::String(el.value()))
				.unwrap_or_default(),
			Controls::Select(els) => els
				.first()
				.map(|el| Value::String(el.value()))
				.unwrap_or_default(),
			Controls::SelectMultiple(els) => Value::Array(
				els.first()
					.map(|el| {
						el.options()
							.into_iter()
							.filter(Element::selected)
							.map(|o| Value::String(o.value()))
							.collect()
					})
					.unwrap_or_default(),
			),
		}
	}

	fn write(&self, value: &Value) {
		match self {
			Controls::Text(els) => {
				let text = value.to_display_string();
				for el in els.iter().filter(|el| el.value() != text) {
					el.set_value(&text);
				}
			}
			Controls::Checkbox(el) => el.set_checked(value.is_truthy()),
			Controls::CheckboxGroup(els) => {
				let wanted = string_set(value);
				for el in els {
					el.set_checked(wanted.contains(&el.value()));
				}
			}
			Controls::Radio(els) => {
				let wanted = value.to_display_string();
				for el in els {
					el.set_checked(!value.is_null() && el.value() == wanted);
				}
			}
			Controls::Select(els) => {
				let wanted = value.to_display_string();
				for el in els {
					el.set_value(&wanted);
				}
			}
			Controls::SelectMultiple(els) => {
				let wanted = string_set(value);
				for option in els.iter().flat_map(Element::options) {
					option.set_selected(wanted.contains(&option.value()));
				}
			}
		}
	}
}

fn text_value(el: &Element) -> Value {
	let raw = el.value();
	if matches!(el.input_type().as_str(), "number" | "range")
		&& let Ok(n) = raw.trim().parse::<f64>()
	{
		return Value::Number(n);
	}
	Value::String(raw)
}

fn string_set(value: &Value) -> Vec<String> {
	match value {
		Value::Array(items) => items.iter().map(Value::to_display_string).collect(),
		Value::Null => Vec::new(),
		other => vec![other.to_display_string()],
	}
}

impl Reactor {
	/// Two-way binds the form controls under the root element matching
	/// `selector` to `path`.
	///
	/// If `path` has no value yet it is initialized from the controls;
	/// otherwise the controls are set from it. `input` and `change` events
	/// write back to `path`, and later writes to `path` update the controls.
	///
	/// # Returns
	///
	/// The number of controls bound (zero when nothing matches).
	///
	/// # Errors
	///
	/// [`RuntimeError::NoRoot`] for a detached reactor, or
	/// [`RuntimeError::InvalidSelector`].
	///
	/// # Example
	///
	/// ```ignore
	/// reactor.bind(
	///     "form.email",
	///     "input[name=email]",
	///     BindOptions::new().on_change(|new, _old| {
	///         // validate
	///         Ok(())
	///     }),
	/// )?;
	/// ```
	pub fn bind(
		&self,
		path: &str,
		selector: &str,
		options: BindOptions,
	) -> Result<usize, RuntimeError> {
		let root = self.root().ok_or(RuntimeError::NoRoot)?;
		let elements = root.query_selector_all(selector)?;
		if elements.is_empty() {
			debug_log!("bind '{}': no controls match '{}'", path, selector);
			return Ok(0);
		}
		let controls = Controls::classify(elements);

		match self.get(path) {
			None => {
				self.set(path, controls.read(None));
			}
			Some(current) => controls.write(&current),
		}

		let bound = controls.elements();
		for el in &bound {
			for kind in ["input", "change"] {
				let weak = self.downgrade();
				let controls = controls.clone();
				let source = el.clone();
				let path = path.to_string();
				let listener = el.add_event_listener(kind, move |_| {
					if let Some(reactor) = weak.upgrade() {
						reactor.set(&path, controls.read(Some(&source)));
					}
				});
				self.track_listener(el, listener);
			}
		}

		let sync = controls.clone();
		self.watch(
			path,
			move |new, _| {
				sync.write(new.unwrap_or(&Value::Null));
				Ok(())
			},
			WatchOptions::default(),
		);

		if let Some(handler) = options.handler {
			self.watch_rc(
				path,
				handler,
				WatchOptions {
					immediate: options.immediate,
				},
			);
		}
		Ok(bound.len())
	}
}
