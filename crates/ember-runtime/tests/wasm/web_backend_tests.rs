//! Browser backend tests
//!
//! Exercise the `web-sys` document handles, mounting and removal through a
//! live `MutationObserver`, and the `install` export.
//!
//! **Run with**: `wasm-pack test --headless --firefox crates/ember-runtime`

#![cfg(target_arch = "wasm32")]

use std::cell::Cell;
use std::rc::Rc;

use ember_runtime::browser::{DEFAULT_GLOBAL_NAME, DEFAULT_READY_FLAG, install, is_installed};
use ember_runtime::{
	Document, Element, Event, HydrateError, Runtime, RuntimeConfig, Value, hydrate_fn,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn document() -> Document {
	Document::from_window().unwrap()
}

fn attach(doc: &Document, tag: &str, attrs: &[(&str, &str)]) -> Element {
	let el = doc.create_element(tag).unwrap();
	for (name, value) in attrs {
		el.set_attribute(name, value);
	}
	doc.body().unwrap().append_child(&el);
	el
}

// ============================================================================
// Element handles
// ============================================================================

#[wasm_bindgen_test]
fn test_listener_receives_detail_and_can_be_removed() {
	// Arrange
	let doc = document();
	let el = attach(&doc, "div", &[]);
	let seen = Rc::new(Cell::new(0.0));
	let slot = Rc::clone(&seen);
	let id = el.add_event_listener("ember:ping", move |event| {
		if let Some(Value::Number(n)) = event.detail().get_path(&["n".to_string()]) {
			slot.set(slot.get() + n);
		}
	});
	let mut detail = Value::object();
	detail.set_path(&["n".to_string()], Value::from(2)).unwrap();

	// Act
	el.dispatch_event(&Event::with_detail("ember:ping", detail.clone()));
	let removed = el.remove_event_listener(id);
	el.dispatch_event(&Event::with_detail("ember:ping", detail));

	// Assert
	assert!(removed);
	assert_eq!(seen.get(), 2.0);
	assert_eq!(el.listener_count("ember:ping"), 0);
}

#[wasm_bindgen_test]
fn test_form_controls_read_and_write_live_state() {
	// Arrange
	let doc = document();
	let input = attach(&doc, "input", &[("type", "checkbox"), ("value", "yes")]);
	let select = attach(&doc, "select", &[]);
	for value in ["a", "b"] {
		let option = doc.create_element("option").unwrap();
		option.set_attribute("value", value);
		select.append_child(&option);
	}

	// Act
	input.set_checked(true);
	select.set_value("b");

	// Assert
	assert_eq!(input.input_type(), "checkbox");
	assert!(input.checked());
	assert_eq!(input.value(), "yes");
	assert_eq!(select.value(), "b");
	let selected: Vec<bool> = select.options().iter().map(Element::selected).collect();
	assert_eq!(selected, vec![false, true]);
}

#[wasm_bindgen_test]
fn test_slots_are_kept_off_the_markup() {
	let doc = document();
	let el = attach(&doc, "div", &[]);
	assert_eq!(el.instance_id(), None);
	assert!(el.mark_relay_bound());
	assert!(!el.mark_relay_bound());
	assert!(el.relay_bound());
	assert_eq!(el.get_attribute("__emberNode"), None);
}

// ============================================================================
// Runtime over the page document
// ============================================================================

#[wasm_bindgen_test]
fn test_removed_node_is_released_through_observer() {
	// Arrange
	let doc = document();
	let runtime = Runtime::new(doc.clone(), RuntimeConfig::default());
	doc.observe(|| {}).unwrap();
	let el = attach(&doc, "section", &[("data-em-fn", "web-remove")]);
	let unmounted = Rc::new(Cell::new(0));
	let counter = Rc::clone(&unmounted);
	let mounted = runtime.spark(
		vec![(
			"web-remove".to_string(),
			hydrate_fn(move |ctx| {
				let counter = Rc::clone(&counter);
				ctx.element().set_on_unmount(move || {
					counter.set(counter.get() + 1);
					Ok(())
				});
				ctx.element().add_event_listener("click", |_| {});
				Ok(())
			}),
		)],
		Vec::new(),
	);
	assert_eq!(mounted, 1);
	assert!(el.get_attribute("data-em-id").is_some());

	// Act
	el.remove();
	let released = runtime.observe_mutations();

	// Assert
	assert_eq!(released, 1);
	assert_eq!(unmounted.get(), 1);
	assert_eq!(el.instance_id(), None);
	assert_eq!(el.listener_count("click"), 0);
	assert_eq!(runtime.arc().instance_count(), 0);
}

#[wasm_bindgen_test]
fn test_failed_mount_after_bind_leaves_no_listeners() {
	// Arrange
	let doc = document();
	let runtime = Runtime::new(doc.clone(), RuntimeConfig::default());
	let root = attach(&doc, "form", &[("data-em-fn", "web-broken")]);
	let input = doc.create_element("input").unwrap();
	root.append_child(&input);

	// Act
	let mounted = runtime.spark(
		vec![(
			"web-broken".to_string(),
			hydrate_fn(|ctx| {
				ctx.reactor().bind("q", "input", Default::default())?;
				Err(HydrateError::new("failed after binding"))
			}),
		)],
		Vec::new(),
	);

	// Assert
	assert_eq!(mounted, 0);
	assert_eq!(input.listener_count("input"), 0);
	assert_eq!(runtime.scheduler().pending(), 0);
}

// ============================================================================
// install()
// ============================================================================

#[wasm_bindgen_test]
fn test_install_exports_spark_and_ready_flag() {
	// Arrange
	let doc = document();
	let el = attach(
		&doc,
		"div",
		&[("data-em-fn", "web-installed"), ("data-em-data", "web-d1")],
	);
	let window = web_sys::window().unwrap();

	// Act
	install(JsValue::UNDEFINED).unwrap();
	install(JsValue::UNDEFINED).unwrap();
	let global = js_sys::Reflect::get(&window, &JsValue::from_str(DEFAULT_GLOBAL_NAME)).unwrap();
	let spark: js_sys::Function = js_sys::Reflect::get(&global, &JsValue::from_str("spark"))
		.unwrap()
		.dyn_into()
		.unwrap();
	let functions = js_sys::Object::new();
	let body = js_sys::Function::new_with_args("el,data", "el.setAttribute('data-hit', data.n)");
	js_sys::Reflect::set(&functions, &JsValue::from_str("web-installed"), &body).unwrap();
	let data = js_sys::Object::new();
	js_sys::Reflect::set(
		&data,
		&JsValue::from_str("web-d1"),
		&JsValue::from_str("{\"n\":7}"),
	)
	.unwrap();
	let mounted = spark.call2(&JsValue::NULL, &functions, &data).unwrap();

	// Assert
	assert!(is_installed());
	let ready = js_sys::Reflect::get(&window, &JsValue::from_str(DEFAULT_READY_FLAG)).unwrap();
	assert_eq!(ready.as_bool(), Some(true));
	assert_eq!(mounted.as_f64(), Some(1.0));
	assert_eq!(el.get_attribute("data-hit"), Some("7".to_string()));
}
