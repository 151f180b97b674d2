//! Browser entry point
//!
//! [`install`] is exported to JavaScript. It builds the page [`Runtime`]
//! over `window.document` and then:
//!
//! - puts `spark(functions, data)` on the page global, where `functions`
//!   maps ids to `function(element, data)` and `data` maps ids to JSON text
//! - runs frames from `requestAnimationFrame` whenever work is queued
//! - feeds `MutationObserver` removal batches to the cleanup walker
//! - sets the ready flag on `window` and dispatches the ready event
//!
//! The bootstrap script emitted by the server loads the module and calls it:
//!
//! ```text
//! import init, { install } from "/static/ember.js";
//! await init();
//! install({ global: "__EMBER__", readyFlag: "__EMBER_READY__" });
//! ```

use std::cell::RefCell;

use serde::Deserialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::arc::{HydrateFn, hydrate_fn};
use crate::config::{DEFAULT_DATA_ATTR, DEFAULT_FUNCTION_ATTR, DEFAULT_INSTANCE_ATTR, RuntimeConfig};
use crate::dom::{Document, describe_js_error, value_to_js};
use crate::error::{HydrateError, RuntimeError};
use crate::runtime::Runtime;
use crate::scheduler::FrameScheduler;
use crate::{info_log, warn_log};

/// Default name of the page global holding the body cache and `spark`.
pub const DEFAULT_GLOBAL_NAME: &str = "__EMBER__";
/// Default `window` property set once the runtime is installed.
pub const DEFAULT_READY_FLAG: &str = "__EMBER_READY__";
/// Default event dispatched on `document` once the runtime is installed.
pub const DEFAULT_READY_EVENT: &str = "ember:ready";

thread_local! {
	static RUNTIME: RefCell<Option<Runtime>> = const { RefCell::new(None) };
}

/// Options accepted by [`install`], read from a plain JavaScript object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstallOptions {
	/// Page global the bootstrap script caches bodies on.
	pub global: String,
	/// `window` property set to `true` once ready.
	pub ready_flag: String,
	/// Event dispatched on `document` once ready.
	pub ready_event: String,
	/// Attribute holding the function id.
	pub function_attr: String,
	/// Attribute holding the data id.
	pub data_attr: String,
	/// Attribute the instance id is written to; `null` disables it.
	pub instance_attr: Option<String>,
}

impl Default for InstallOptions {
	fn default() -> Self {
		Self {
			global: DEFAULT_GLOBAL_NAME.to_string(),
			ready_flag: DEFAULT_READY_FLAG.to_string(),
			ready_event: DEFAULT_READY_EVENT.to_string(),
			function_attr: DEFAULT_FUNCTION_ATTR.to_string(),
			data_attr: DEFAULT_DATA_ATTR.to_string(),
			instance_attr: Some(DEFAULT_INSTANCE_ATTR.to_string()),
		}
	}
}

impl InstallOptions {
	/// Reads options from a JavaScript value; `undefined` and `null` give
	/// the defaults.
	pub fn from_js(value: &JsValue) -> Result<Self, JsValue> {
		if value.is_undefined() || value.is_null() {
			return Ok(Self::default());
		}
		let json = js_sys::JSON::stringify(value).map(String::from)?;
		serde_json::from_str(&json)
			.map_err(|err| JsValue::from_str(&format!("invalid install options: {}", err)))
	}

	fn runtime_config(&self) -> RuntimeConfig {
		RuntimeConfig::new()
			.function_attr(self.function_attr.clone())
			.data_attr(self.data_attr.clone())
			.instance_attr(self.instance_attr.clone())
	}
}

fn to_js(err: RuntimeError) -> JsValue {
	JsValue::from_str(&err.to_string())
}

/// Installs the runtime on the current page. Calling it again is a no-op.
#[wasm_bindgen]
pub fn install(options: JsValue) -> Result<(), JsValue> {
	if RUNTIME.with(|slot| slot.borrow().is_some()) {
		return Ok(());
	}
	let options = InstallOptions::from_js(&options)?;
	let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window object"))?;
	let document = Document::from_window().map_err(to_js)?;
	let runtime = Runtime::new(document.clone(), options.runtime_config());

	let scheduler = runtime.scheduler().clone();
	runtime
		.scheduler()
		.set_waker(move || request_animation_frame(&scheduler));

	let observed = runtime.clone();
	document
		.observe(move || {
			observed.observe_mutations();
		})
		.map_err(to_js)?;

	let global = page_global(&window, &options.global)?;
	let sparker = runtime.clone();
	let spark = Closure::wrap(Box::new(move |functions: JsValue, data: JsValue| -> u32 {
		let mounted = sparker.spark_json(hydrate_fns(&functions), payloads(&data));
		u32::try_from(mounted).unwrap_or(u32::MAX)
	}) as Box<dyn FnMut(JsValue, JsValue) -> u32>);
	js_sys::Reflect::set(&global, &JsValue::from_str("spark"), spark.as_ref())?;
	spark.forget();

	RUNTIME.with(|slot| *slot.borrow_mut() = Some(runtime.clone()));
	runtime.mark_ready();
	js_sys::Reflect::set(
		&window,
		&JsValue::from_str(&options.ready_flag),
		&JsValue::TRUE,
	)?;
	let ready = web_sys::Event::new(&options.ready_event)?;
	document.raw().dispatch_event(&ready)?;
	info_log!("installed on window.{}", options.global);
	Ok(())
}

/// Returns true once [`install`] has run on this page.
#[wasm_bindgen(js_name = isInstalled)]
pub fn is_installed() -> bool {
	RUNTIME.with(|slot| slot.borrow().is_some())
}

/// Runs `f` with the installed runtime, if any.
pub fn with_runtime<R>(f: impl FnOnce(&Runtime) -> R) -> Option<R> {
	let runtime = RUNTIME.with(|slot| slot.borrow().clone())?;
	Some(f(&runtime))
}

fn request_animation_frame(scheduler: &FrameScheduler) {
	let Some(window) = web_sys::window() else {
		return;
	};
	let scheduler = scheduler.clone();
	let callback = Closure::once_into_js(move || {
		scheduler.run_frame();
	});
	if let Err(err) = window.request_animation_frame(callback.unchecked_ref()) {
		warn_log!("requestAnimationFrame failed: {}", describe_js_error(&err));
	}
}

fn page_global(window: &web_sys::Window, name: &str) -> Result<js_sys::Object, JsValue> {
	let key = JsValue::from_str(name);
	let existing = js_sys::Reflect::get(window, &key)?;
	if let Some(object) = existing.dyn_ref::<js_sys::Object>() {
		return Ok(object.clone());
	}
	let object = js_sys::Object::new();
	js_sys::Reflect::set(window, &key, &object)?;
	Ok(object)
}

fn entries(value: &JsValue) -> Vec<(String, JsValue)> {
	let Some(object) = value.dyn_ref::<js_sys::Object>() else {
		return Vec::new();
	};
	js_sys::Object::entries(object)
		.iter()
		.filter_map(|pair| {
			let pair = pair.dyn_into::<js_sys::Array>().ok()?;
			Some((pair.get(0).as_string()?, pair.get(1)))
		})
		.collect()
}

fn hydrate_fns(functions: &JsValue) -> Vec<(String, HydrateFn)> {
	entries(functions)
		.into_iter()
		.filter_map(|(id, value)| match value.dyn_into::<js_sys::Function>() {
			Ok(function) => Some((id, wrap_function(function))),
			Err(_) => {
				warn_log!("function entry {} is not callable", id);
				None
			}
		})
		.collect()
}

fn payloads(data: &JsValue) -> Vec<(String, String)> {
	entries(data)
		.into_iter()
		.filter_map(|(id, value)| value.as_string().map(|json| (id, json)))
		.collect()
}

/// Adapts a server-emitted `function(element, data)` into a hydration function.
fn wrap_function(function: js_sys::Function) -> HydrateFn {
	hydrate_fn(move |ctx| {
		let data = value_to_js(&ctx.reactor().snapshot());
		function
			.call2(&JsValue::NULL, ctx.element().raw(), &data)
			.map(|_| ())
			.map_err(|err| HydrateError::new(describe_js_error(&err)))
	})
}
