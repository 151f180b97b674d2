//! Browser backend.
//!
//! Wraps the page's `web-sys` nodes. Runtime bookkeeping the browser has no
//! place for (lifecycle hooks, instance ids, listener closures) lives in a
//! per-thread table keyed by a [`NodeId`] stored on the element as an
//! expando property. Ids are assigned lazily, so nodes the runtime never
//! touches stay untagged.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use super::{Event, ListenerId, MutationRecord, NodeId, NodeSlots};
use crate::arc::InstanceId;
use crate::error::{HandlerResult, RuntimeError};
use crate::value::Value;
use crate::warn_log;

const NODE_KEY: &str = "__emberNode";

struct Registered {
	id: ListenerId,
	kind: String,
	closure: Closure<dyn FnMut(web_sys::Event)>,
}

#[derive(Default)]
struct Tables {
	next_node: usize,
	next_listener: u64,
	slots: HashMap<NodeId, NodeSlots>,
	listeners: HashMap<NodeId, Vec<Registered>>,
	mutations: Vec<MutationRecord>,
}

thread_local! {
	static TABLES: RefCell<Tables> = RefCell::new(Tables::default());
}

fn dom_error(err: JsValue) -> RuntimeError {
	RuntimeError::Dom(describe_js_error(&err))
}

/// Human-readable text of a thrown JavaScript value.
pub(crate) fn describe_js_error(err: &JsValue) -> String {
	if let Some(error) = err.dyn_ref::<js_sys::Error>() {
		return String::from(error.message());
	}
	err.as_string().unwrap_or_else(|| format!("{:?}", err))
}

/// Converts a [`Value`] through JSON into a JavaScript value.
pub(crate) fn value_to_js(value: &Value) -> JsValue {
	serde_json::to_string(value)
		.ok()
		.and_then(|json| js_sys::JSON::parse(&json).ok())
		.unwrap_or(JsValue::NULL)
}

/// Converts a JavaScript value through JSON into a [`Value`].
///
/// Anything `JSON.stringify` rejects becomes `null`.
pub(crate) fn js_to_value(value: &JsValue) -> Value {
	if value.is_undefined() || value.is_null() {
		return Value::Null;
	}
	js_sys::JSON::stringify(value)
		.ok()
		.map(String::from)
		.and_then(|json| Value::from_json_str(&json).ok())
		.unwrap_or(Value::Null)
}

fn from_web_event(event: &web_sys::Event) -> Event {
	let detail = event
		.dyn_ref::<web_sys::CustomEvent>()
		.map(|custom| js_to_value(&custom.detail()))
		.unwrap_or(Value::Null);
	Event::with_detail(event.type_(), detail)
}

/// Handle to the page document.
#[derive(Clone)]
pub struct Document {
	raw: web_sys::Document,
	observer: Rc<RefCell<Option<web_sys::MutationObserver>>>,
}

impl fmt::Debug for Document {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Document")
			.field("observing", &self.observer.borrow().is_some())
			.finish()
	}
}

impl Document {
	/// The document of the current window.
	pub fn from_window() -> Result<Self, RuntimeError> {
		let document = web_sys::window()
			.and_then(|window| window.document())
			.ok_or_else(|| RuntimeError::Dom("no window document".to_string()))?;
		Ok(Self::from_raw(document))
	}

	/// Wraps an existing `web-sys` document.
	pub fn from_raw(raw: web_sys::Document) -> Self {
		Self {
			raw,
			observer: Rc::new(RefCell::new(None)),
		}
	}

	/// The underlying `web-sys` document.
	pub fn raw(&self) -> &web_sys::Document {
		&self.raw
	}

	/// The `<html>` element.
	pub fn document_element(&self) -> Option<Element> {
		self.raw.document_element().map(Element::from)
	}

	/// The `<body>` element.
	pub fn body(&self) -> Option<Element> {
		self.raw.body().map(|body| Element::from(web_sys::Element::from(body)))
	}

	/// Creates a detached element.
	pub fn create_element(&self, tag: &str) -> Result<Element, RuntimeError> {
		self.raw
			.create_element(tag)
			.map(Element::from)
			.map_err(dom_error)
	}

	/// All elements matching `selector`, in document order.
	pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, RuntimeError> {
		let nodes = self
			.raw
			.query_selector_all(selector)
			.map_err(|_| RuntimeError::InvalidSelector(selector.to_string()))?;
		Ok(collect_elements(&nodes))
	}

	/// Starts a `MutationObserver` on the whole document.
	///
	/// Every batch that removes elements from the document is queued for
	/// [`Document::take_mutations`], then `on_records` runs. Nodes that were
	/// moved rather than removed are still connected and are left out.
	/// Observing twice replaces the previous observer.
	pub fn observe<F>(&self, on_records: F) -> Result<(), RuntimeError>
	where
		F: Fn() + 'static,
	{
		let root = self
			.raw
			.document_element()
			.ok_or_else(|| RuntimeError::Dom("document has no root element".to_string()))?;
		let callback = Closure::wrap(Box::new(
			move |records: js_sys::Array, _observer: web_sys::MutationObserver| {
				let removed = removed_elements(&records);
				if removed.is_empty() {
					return;
				}
				TABLES.with(|tables| {
					tables
						.borrow_mut()
						.mutations
						.push(MutationRecord { removed })
				});
				on_records();
			},
		) as Box<dyn FnMut(js_sys::Array, web_sys::MutationObserver)>);

		let observer =
			web_sys::MutationObserver::new(callback.as_ref().unchecked_ref()).map_err(dom_error)?;
		let options = web_sys::MutationObserverInit::new();
		options.set_child_list(true);
		options.set_subtree(true);
		observer
			.observe_with_options(&root, &options)
			.map_err(dom_error)?;
		callback.forget();

		if let Some(previous) = self.observer.borrow_mut().replace(observer) {
			previous.disconnect();
		}
		Ok(())
	}

	/// Drains the pending removal records, including batches the observer
	/// has seen but not yet delivered.
	pub fn take_mutations(&self) -> Vec<MutationRecord> {
		let undelivered = self
			.observer
			.borrow()
			.as_ref()
			.map(|observer| removed_elements(&observer.take_records()))
			.unwrap_or_default();
		TABLES.with(|tables| {
			let mut tables = tables.borrow_mut();
			if !undelivered.is_empty() {
				tables.mutations.push(MutationRecord {
					removed: undelivered,
				});
			}
			std::mem::take(&mut tables.mutations)
		})
	}

	/// Number of pending removal records.
	pub fn pending_mutations(&self) -> usize {
		TABLES.with(|tables| tables.borrow().mutations.len())
	}
}

fn removed_elements(records: &js_sys::Array) -> Vec<Element> {
	let mut removed = Vec::new();
	for record in records.iter() {
		let Ok(record) = record.dyn_into::<web_sys::MutationRecord>() else {
			continue;
		};
		let nodes = record.removed_nodes();
		for i in 0..nodes.length() {
			if let Some(node) = nodes.item(i)
				&& let Ok(element) = node.dyn_into::<web_sys::Element>()
				&& !element.is_connected()
			{
				removed.push(Element::from(element));
			}
		}
	}
	removed
}

fn collect_elements(nodes: &web_sys::NodeList) -> Vec<Element> {
	(0..nodes.length())
		.filter_map(|i| nodes.item(i))
		.filter_map(|node| node.dyn_into::<web_sys::Element>().ok())
		.map(Element::from)
		.collect()
}

/// Handle to a page element.
#[derive(Clone, PartialEq, Eq)]
pub struct Element {
	raw: web_sys::Element,
}

impl From<web_sys::Element> for Element {
	fn from(raw: web_sys::Element) -> Self {
		Self { raw }
	}
}

impl fmt::Debug for Element {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Element")
			.field("id", &self.existing_id())
			.field("tag", &self.tag_name())
			.finish()
	}
}

impl Element {
	/// The underlying `web-sys` element.
	pub fn raw(&self) -> &web_sys::Element {
		&self.raw
	}

	fn existing_id(&self) -> Option<NodeId> {
		js_sys::Reflect::get(&self.raw, &JsValue::from_str(NODE_KEY))
			.ok()
			.and_then(|value| value.as_f64())
			.map(|raw| NodeId(raw as usize))
	}

	/// The id of this element, assigned on first use.
	pub fn node_id(&self) -> NodeId {
		if let Some(id) = self.existing_id() {
			return id;
		}
		let id = TABLES.with(|tables| {
			let mut tables = tables.borrow_mut();
			tables.next_node += 1;
			NodeId(tables.next_node)
		});
		let key = JsValue::from_str(NODE_KEY);
		if js_sys::Reflect::set(&self.raw, &key, &JsValue::from_f64(id.0 as f64)).is_err() {
			warn_log!("cannot tag node {}", id.0);
		}
		id
	}

	fn update_slots<R>(&self, f: impl FnOnce(&mut NodeSlots) -> R) -> R {
		let id = self.node_id();
		TABLES.with(|tables| {
			let tables = &mut *tables.borrow_mut();
			let slots = tables.slots.entry(id).or_default();
			let out = f(slots);
			if slots.is_vacant() {
				tables.slots.remove(&id);
			}
			out
		})
	}

	fn read_slots<R>(&self, f: impl FnOnce(&NodeSlots) -> R) -> Option<R> {
		let id = self.existing_id()?;
		TABLES.with(|tables| tables.borrow().slots.get(&id).map(f))
	}

	/// Lowercase tag name.
	pub fn tag_name(&self) -> String {
		self.raw.tag_name().to_ascii_lowercase()
	}

	/// Reads an attribute.
	pub fn get_attribute(&self, name: &str) -> Option<String> {
		self.raw.get_attribute(name)
	}

	/// Returns true if the attribute is present.
	pub fn has_attribute(&self, name: &str) -> bool {
		self.raw.has_attribute(name)
	}

	/// Sets an attribute.
	pub fn set_attribute(&self, name: &str, value: &str) {
		if let Err(err) = self.raw.set_attribute(name, value) {
			warn_log!("set_attribute({}) failed: {}", name, describe_js_error(&err));
		}
	}

	/// Removes an attribute.
	pub fn remove_attribute(&self, name: &str) {
		if let Err(err) = self.raw.remove_attribute(name) {
			warn_log!("remove_attribute({}) failed: {}", name, describe_js_error(&err));
		}
	}

	/// Text content of the element and its descendants.
	pub fn text(&self) -> String {
		self.raw.text_content().unwrap_or_default()
	}

	/// Replaces the content with a text node.
	pub fn set_text(&self, text: impl Into<String>) {
		let text = text.into();
		self.raw.set_text_content(Some(&text));
	}

	/// Parent element, if attached.
	pub fn parent(&self) -> Option<Element> {
		self.raw.parent_element().map(Element::from)
	}

	/// Child elements in order.
	pub fn children(&self) -> Vec<Element> {
		let children = self.raw.children();
		(0..children.length())
			.filter_map(|i| children.item(i))
			.map(Element::from)
			.collect()
	}

	/// Returns true if this element is inside the document tree.
	pub fn is_connected(&self) -> bool {
		self.raw.is_connected()
	}

	/// Appends `child`, moving it from its previous parent if needed.
	pub fn append_child(&self, child: &Element) -> &Self {
		if let Err(err) = self.raw.append_child(&child.raw) {
			warn_log!("append_child failed: {}", describe_js_error(&err));
		}
		self
	}

	/// Removes `child` from this element. A no-op if it is not a child.
	pub fn remove_child(&self, child: &Element) {
		if child.parent().as_ref() == Some(self)
			&& let Err(err) = self.raw.remove_child(&child.raw)
		{
			warn_log!("remove_child failed: {}", describe_js_error(&err));
		}
	}

	/// Removes several children; the observer reports them in one batch.
	pub fn remove_children(&self, children: &[Element]) {
		for child in children {
			self.remove_child(child);
		}
	}

	/// Detaches this element from its parent.
	pub fn remove(&self) {
		self.raw.remove();
	}

	/// Descendant elements matching `selector`, in document order.
	pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, RuntimeError> {
		let nodes = self
			.raw
			.query_selector_all(selector)
			.map_err(|_| RuntimeError::InvalidSelector(selector.to_string()))?;
		Ok(collect_elements(&nodes))
	}

	/// Returns true if this element matches `selector`.
	pub fn matches(&self, selector: &str) -> Result<bool, RuntimeError> {
		self.raw
			.matches(selector)
			.map_err(|_| RuntimeError::InvalidSelector(selector.to_string()))
	}

	/// The `type` of an input, lowercased, defaulting to `text`.
	pub fn input_type(&self) -> String {
		match self.raw.dyn_ref::<web_sys::HtmlInputElement>() {
			Some(input) => input.type_().to_ascii_lowercase(),
			None => self
				.get_attribute("type")
				.map(|t| t.to_ascii_lowercase())
				.unwrap_or_else(|| "text".to_string()),
		}
	}

	/// Current control value.
	pub fn value(&self) -> String {
		if let Some(input) = self.raw.dyn_ref::<web_sys::HtmlInputElement>() {
			return input.value();
		}
		if let Some(select) = self.raw.dyn_ref::<web_sys::HtmlSelectElement>() {
			return select.value();
		}
		if let Some(textarea) = self.raw.dyn_ref::<web_sys::HtmlTextAreaElement>() {
			return textarea.value();
		}
		if let Some(option) = self.raw.dyn_ref::<web_sys::HtmlOptionElement>() {
			return option.value();
		}
		self.get_attribute("value").unwrap_or_default()
	}

	/// Sets the control value. On a `<select>` this selects the matching option.
	pub fn set_value(&self, value: &str) {
		if let Some(input) = self.raw.dyn_ref::<web_sys::HtmlInputElement>() {
			input.set_value(value);
		} else if let Some(select) = self.raw.dyn_ref::<web_sys::HtmlSelectElement>() {
			select.set_value(value);
		} else if let Some(textarea) = self.raw.dyn_ref::<web_sys::HtmlTextAreaElement>() {
			textarea.set_value(value);
		} else if let Some(option) = self.raw.dyn_ref::<web_sys::HtmlOptionElement>() {
			option.set_value(value);
		} else {
			self.set_attribute("value", value);
		}
	}

	/// Checkbox/radio checked state.
	pub fn checked(&self) -> bool {
		self.raw
			.dyn_ref::<web_sys::HtmlInputElement>()
			.is_some_and(web_sys::HtmlInputElement::checked)
	}

	/// Sets the checked state. The browser unchecks the rest of a radio group.
	pub fn set_checked(&self, checked: bool) {
		if let Some(input) = self.raw.dyn_ref::<web_sys::HtmlInputElement>() {
			input.set_checked(checked);
		}
	}

	/// Option selected state.
	pub fn selected(&self) -> bool {
		self.raw
			.dyn_ref::<web_sys::HtmlOptionElement>()
			.is_some_and(web_sys::HtmlOptionElement::selected)
	}

	/// Sets the option selected state.
	pub fn set_selected(&self, selected: bool) {
		if let Some(option) = self.raw.dyn_ref::<web_sys::HtmlOptionElement>() {
			option.set_selected(selected);
		}
	}

	/// Returns true for `<select multiple>`.
	pub fn is_multiple(&self) -> bool {
		match self.raw.dyn_ref::<web_sys::HtmlSelectElement>() {
			Some(select) => select.multiple(),
			None => self.has_attribute("multiple"),
		}
	}

	/// `<option>` descendants of a `<select>`.
	pub fn options(&self) -> Vec<Element> {
		self.query_selector_all("option").unwrap_or_default()
	}

	/// Adds a listener for events of `kind`.
	///
	/// The closure stays registered until removed with
	/// [`Element::remove_event_listener`] or [`Element::clear_listeners`].
	pub fn add_event_listener<F>(&self, kind: &str, listener: F) -> ListenerId
	where
		F: Fn(&Event) + 'static,
	{
		let closure = Closure::wrap(Box::new(move |event: web_sys::Event| {
			listener(&from_web_event(&event));
		}) as Box<dyn FnMut(web_sys::Event)>);
		if let Err(err) = self
			.raw
			.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())
		{
			warn_log!("add_event_listener({}) failed: {}", kind, describe_js_error(&err));
		}

		let node = self.node_id();
		TABLES.with(|tables| {
			let tables = &mut *tables.borrow_mut();
			tables.next_listener += 1;
			let id = ListenerId(tables.next_listener);
			tables.listeners.entry(node).or_default().push(Registered {
				id,
				kind: kind.to_string(),
				closure,
			});
			id
		})
	}

	fn detach_listener(&self, registered: Registered) {
		if let Err(err) = self.raw.remove_event_listener_with_callback(
			&registered.kind,
			registered.closure.as_ref().unchecked_ref(),
		) {
			warn_log!(
				"remove_event_listener({}) failed: {}",
				registered.kind,
				describe_js_error(&err)
			);
		}
	}

	/// Removes a listener added with [`Element::add_event_listener`].
	///
	/// Returns false if it was already gone.
	pub fn remove_event_listener(&self, id: ListenerId) -> bool {
		let Some(node) = self.existing_id() else {
			return false;
		};
		let registered = TABLES.with(|tables| {
			let tables = &mut *tables.borrow_mut();
			let list = tables.listeners.get_mut(&node)?;
			let position = list.iter().position(|r| r.id == id)?;
			let registered = list.remove(position);
			if list.is_empty() {
				tables.listeners.remove(&node);
			}
			Some(registered)
		});
		match registered {
			Some(registered) => {
				self.detach_listener(registered);
				true
			}
			None => false,
		}
	}

	/// Drops every listener added through this handle type. Returns how many
	/// were removed.
	pub fn clear_listeners(&self) -> usize {
		let Some(node) = self.existing_id() else {
			return 0;
		};
		let registered = TABLES.with(|tables| {
			tables
				.borrow_mut()
				.listeners
				.remove(&node)
				.unwrap_or_default()
		});
		let count = registered.len();
		for listener in registered {
			self.detach_listener(listener);
		}
		count
	}

	/// Number of listeners registered for `kind` through this handle type.
	pub fn listener_count(&self, kind: &str) -> usize {
		let Some(node) = self.existing_id() else {
			return 0;
		};
		TABLES.with(|tables| {
			tables
				.borrow()
				.listeners
				.get(&node)
				.map(|list| list.iter().filter(|r| r.kind == kind).count())
				.unwrap_or(0)
		})
	}

	/// Dispatches a non-bubbling `CustomEvent` carrying the event's detail.
	pub fn dispatch_event(&self, event: &Event) {
		let init = web_sys::CustomEventInit::new();
		init.set_detail(&value_to_js(event.detail()));
		let dispatched = web_sys::CustomEvent::new_with_event_init_dict(event.kind(), &init)
			.and_then(|custom| self.raw.dispatch_event(&custom));
		if let Err(err) = dispatched {
			warn_log!("dispatch of {} failed: {}", event.kind(), describe_js_error(&err));
		}
	}

	/// Installs the mount hook, replacing any previous one.
	pub fn set_on_mount<F>(&self, hook: F)
	where
		F: Fn() -> HandlerResult + 'static,
	{
		self.update_slots(|slots| slots.on_mount = Some(Rc::new(hook)));
	}

	/// Installs the unmount hook, replacing any previous one.
	pub fn set_on_unmount<F>(&self, hook: F)
	where
		F: Fn() -> HandlerResult + 'static,
	{
		self.update_slots(|slots| slots.on_unmount = Some(Rc::new(hook)));
	}

	/// Runs the mount hook, if any.
	pub fn run_mount_hook(&self) -> Option<HandlerResult> {
		let hook = self.read_slots(|slots| slots.on_mount.clone()).flatten();
		hook.map(|h| h())
	}

	/// Runs the unmount hook, if any.
	pub fn run_unmount_hook(&self) -> Option<HandlerResult> {
		let hook = self.read_slots(|slots| slots.on_unmount.clone()).flatten();
		hook.map(|h| h())
	}

	/// Drops both lifecycle hooks.
	pub fn clear_hooks(&self) {
		if self.existing_id().is_some() {
			self.update_slots(|slots| {
				slots.on_mount = None;
				slots.on_unmount = None;
			});
		}
	}

	/// The instance id of the hydration bound to this node.
	pub fn instance_id(&self) -> Option<InstanceId> {
		self.read_slots(|slots| slots.instance).flatten()
	}

	/// Sets or clears the instance id.
	pub fn set_instance_id(&self, id: Option<InstanceId>) {
		if id.is_some() || self.existing_id().is_some() {
			self.update_slots(|slots| slots.instance = id);
		}
	}

	/// Returns true once relay bindings were attached to this node.
	pub fn relay_bound(&self) -> bool {
		self.read_slots(|slots| slots.relay_bound).unwrap_or(false)
	}

	/// Records that relay bindings were attached; returns false if they already were.
	pub fn mark_relay_bound(&self) -> bool {
		self.update_slots(|slots| !std::mem::replace(&mut slots.relay_bound, true))
	}

	/// Clears the relay-bound mark.
	pub fn clear_relay_bound(&self) {
		if self.existing_id().is_some() {
			self.update_slots(|slots| slots.relay_bound = false);
		}
	}
}
