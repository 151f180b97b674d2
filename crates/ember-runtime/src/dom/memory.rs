//! In-memory backend.
//!
//! A single-threaded arena document used off the browser (native builds,
//! server-side tests). It models the parts of the browser DOM hydration
//! relies on: attributes, children, text, form-control state, listeners
//! with synchronous dispatch, and removal records queued for
//! [`Document::take_mutations`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use super::selector::Selector;
use super::{Event, Listener, ListenerId, MutationRecord, NodeId, NodeSlots};
use crate::arc::InstanceId;
use crate::error::{HandlerResult, RuntimeError};

#[derive(Default)]
struct ControlState {
	value: String,
	checked: bool,
	selected: bool,
}

#[derive(Default)]
struct NodeData {
	tag: String,
	attrs: BTreeMap<String, String>,
	text: String,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
	control: ControlState,
	listeners: Vec<(ListenerId, String, Listener)>,
	slots: NodeSlots,
}

struct Tree {
	nodes: Vec<NodeData>,
	root: NodeId,
	body: NodeId,
	mutations: Vec<MutationRecord>,
	next_listener: u64,
}

impl Tree {
	fn alloc(&mut self, tag: &str) -> NodeId {
		let id = NodeId(self.nodes.len());
		self.nodes.push(NodeData {
			tag: tag.to_ascii_lowercase(),
			..NodeData::default()
		});
		id
	}

	fn is_connected(&self, id: NodeId) -> bool {
		self.is_inclusive_ancestor(self.root, id)
	}

	fn is_inclusive_ancestor(&self, ancestor: NodeId, mut id: NodeId) -> bool {
		loop {
			if id == ancestor {
				return true;
			}
			match self.nodes[id.0].parent {
				Some(parent) => id = parent,
				None => return false,
			}
		}
	}

	fn descendants(&self, id: NodeId, out: &mut Vec<NodeId>) {
		for &child in &self.nodes[id.0].children {
			out.push(child);
			self.descendants(child, out);
		}
	}

	fn detach(&mut self, id: NodeId) {
		if let Some(parent) = self.nodes[id.0].parent.take() {
			self.nodes[parent.0].children.retain(|&c| c != id);
		}
	}
}

/// Handle to a document.
#[derive(Clone)]
pub struct Document {
	tree: Rc<RefCell<Tree>>,
}

impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Document {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Document")
			.field("nodes", &self.tree.borrow().nodes.len())
			.finish()
	}
}

impl Document {
	/// Creates a document containing `<html><body></body></html>`.
	pub fn new() -> Self {
		let mut tree = Tree {
			nodes: Vec::new(),
			root: NodeId(0),
			body: NodeId(0),
			mutations: Vec::new(),
			next_listener: 0,
		};
		let root = tree.alloc("html");
		let body = tree.alloc("body");
		tree.nodes[body.0].parent = Some(root);
		tree.nodes[root.0].children.push(body);
		tree.root = root;
		tree.body = body;
		Self {
			tree: Rc::new(RefCell::new(tree)),
		}
	}

	/// The `<html>` element.
	pub fn document_element(&self) -> Element {
		let root = self.tree.borrow().root;
		self.element(root)
	}

	/// The `<body>` element.
	pub fn body(&self) -> Element {
		let body = self.tree.borrow().body;
		self.element(body)
	}

	/// Creates a detached element.
	pub fn create_element(&self, tag: &str) -> Element {
		let id = self.tree.borrow_mut().alloc(tag);
		self.element(id)
	}

	/// Looks up a node by id.
	pub fn get(&self, id: NodeId) -> Result<Element, RuntimeError> {
		if id.0 < self.tree.borrow().nodes.len() {
			Ok(self.element(id))
		} else {
			Err(RuntimeError::DetachedNode(id.0))
		}
	}

	/// All connected elements matching `selector`, in document order.
	pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, RuntimeError> {
		self.document_element().query_selector_all(selector)
	}

	/// Drains the pending removal records.
	pub fn take_mutations(&self) -> Vec<MutationRecord> {
		std::mem::take(&mut self.tree.borrow_mut().mutations)
	}

	/// Number of pending removal records.
	pub fn pending_mutations(&self) -> usize {
		self.tree.borrow().mutations.len()
	}

	fn element(&self, id: NodeId) -> Element {
		Element {
			doc: self.clone(),
			id,
		}
	}
}

/// Handle to an element.
#[derive(Clone)]
pub struct Element {
	doc: Document,
	id: NodeId,
}

impl PartialEq for Element {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id && Rc::ptr_eq(&self.doc.tree, &other.doc.tree)
	}
}

impl Eq for Element {}

impl fmt::Debug for Element {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let tree = self.doc.tree.borrow();
		let node = &tree.nodes[self.id.0];
		f.debug_struct("Element")
			.field("id", &self.id.0)
			.field("tag", &node.tag)
			.field("attrs", &node.attrs)
			.finish()
	}
}

impl Element {
	fn with<R>(&self, f: impl FnOnce(&NodeData) -> R) -> R {
		f(&self.doc.tree.borrow().nodes[self.id.0])
	}

	fn with_mut<R>(&self, f: impl FnOnce(&mut NodeData) -> R) -> R {
		f(&mut self.doc.tree.borrow_mut().nodes[self.id.0])
	}

	/// The id of this element within its document.
	pub fn node_id(&self) -> NodeId {
		self.id
	}

	/// The owning document.
	pub fn document(&self) -> &Document {
		&self.doc
	}

	/// Lowercase tag name.
	pub fn tag_name(&self) -> String {
		self.with(|n| n.tag.clone())
	}

	/// Reads an attribute.
	pub fn get_attribute(&self, name: &str) -> Option<String> {
		self.with(|n| n.attrs.get(name).cloned())
	}

	/// Returns true if the attribute is present.
	pub fn has_attribute(&self, name: &str) -> bool {
		self.with(|n| n.attrs.contains_key(name))
	}

	/// Sets an attribute. `value` and `checked` also seed the control state,
	/// as the corresponding HTML attributes do.
	pub fn set_attribute(&self, name: &str, value: &str) {
		self.with_mut(|n| {
			match name {
				"value" => n.control.value = value.to_string(),
				"checked" => n.control.checked = true,
				"selected" => n.control.selected = true,
				_ => {}
			}
			n.attrs.insert(name.to_string(), value.to_string());
		});
	}

	/// Removes an attribute.
	pub fn remove_attribute(&self, name: &str) {
		self.with_mut(|n| {
			n.attrs.remove(name);
		});
	}

	/// Text content of this element (not of its descendants).
	pub fn text(&self) -> String {
		self.with(|n| n.text.clone())
	}

	/// Replaces the text content.
	pub fn set_text(&self, text: impl Into<String>) {
		let text = text.into();
		self.with_mut(|n| n.text = text);
	}

	/// Parent element, if attached.
	pub fn parent(&self) -> Option<Element> {
		self.with(|n| n.parent).map(|id| self.doc.element(id))
	}

	/// Child elements in order.
	pub fn children(&self) -> Vec<Element> {
		self.with(|n| n.children.clone())
			.into_iter()
			.map(|id| self.doc.element(id))
			.collect()
	}

	/// Returns true if this element is inside the document tree.
	pub fn is_connected(&self) -> bool {
		self.doc.tree.borrow().is_connected(self.id)
	}

	/// Appends `child`, moving it from its previous parent if needed.
	///
	/// Appending an ancestor of `self` is ignored.
	pub fn append_child(&self, child: &Element) -> &Self {
		let mut tree = self.doc.tree.borrow_mut();
		if tree.is_inclusive_ancestor(child.id, self.id) {
			return self;
		}
		tree.detach(child.id);
		tree.nodes[child.id.0].parent = Some(self.id);
		tree.nodes[self.id.0].children.push(child.id);
		self
	}

	/// Removes `child` from this element. A no-op if it is not a child.
	pub fn remove_child(&self, child: &Element) {
		self.remove_children(std::slice::from_ref(child));
	}

	/// Removes several children in one batch; one mutation record lists them all.
	pub fn remove_children(&self, children: &[Element]) {
		let mut tree = self.doc.tree.borrow_mut();
		let connected = tree.is_connected(self.id);
		let mut removed = Vec::new();
		for child in children {
			if tree.nodes[child.id.0].parent == Some(self.id) {
				tree.detach(child.id);
				removed.push(child.clone());
			}
		}
		if connected && !removed.is_empty() {
			tree.mutations.push(MutationRecord { removed });
		}
	}

	/// Detaches this element from its parent.
	pub fn remove(&self) {
		if let Some(parent) = self.parent() {
			parent.remove_child(self);
		}
	}

	/// Descendant elements matching `selector`, in document order.
	pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, RuntimeError> {
		let selector = Selector::parse(selector)?;
		let tree = self.doc.tree.borrow();
		let mut ids = Vec::new();
		tree.descendants(self.id, &mut ids);
		Ok(ids
			.into_iter()
			.filter(|id| {
				let node = &tree.nodes[id.0];
				selector.matches(&node.tag, &node.attrs)
			})
			.map(|id| self.doc.element(id))
			.collect())
	}

	/// Returns true if this element matches `selector`.
	pub fn matches(&self, selector: &str) -> Result<bool, RuntimeError> {
		let selector = Selector::parse(selector)?;
		Ok(self.with(|n| selector.matches(&n.tag, &n.attrs)))
	}

	/// The `type` of an input, lowercased, defaulting to `text`.
	pub fn input_type(&self) -> String {
		self.get_attribute("type")
			.map(|t| t.to_ascii_lowercase())
			.unwrap_or_else(|| "text".to_string())
	}

	/// Current control value.
	///
	/// For a `<select>` this is the value of the first selected option. An
	/// `<option>` without a `value` attribute uses its text.
	pub fn value(&self) -> String {
		if self.tag_name() == "select" {
			return self
				.options()
				.into_iter()
				.find(Element::selected)
				.map(|o| o.value())
				.unwrap_or_default();
		}
		self.with(|n| {
			if n.tag == "option" && !n.attrs.contains_key("value") {
				n.text.clone()
			} else {
				n.control.value.clone()
			}
		})
	}

	/// Sets the control value. On a `<select>` this selects the matching option.
	pub fn set_value(&self, value: &str) {
		if self.tag_name() == "select" {
			for option in self.options() {
				option.set_selected(option.value() == value);
			}
			return;
		}
		let value = value.to_string();
		self.with_mut(|n| n.control.value = value);
	}

	/// Checkbox/radio checked state.
	pub fn checked(&self) -> bool {
		self.with(|n| n.control.checked)
	}

	/// Sets the checked state. Checking a radio unchecks others of its group.
	pub fn set_checked(&self, checked: bool) {
		if checked
			&& self.input_type() == "radio"
			&& let Some(name) = self.get_attribute("name")
		{
			let selector = format!("input[type=radio][name=\"{}\"]", name);
			if let Ok(group) = self.doc.query_selector_all(&selector) {
				for radio in group.iter().filter(|r| *r != self) {
					radio.with_mut(|n| n.control.checked = false);
				}
			}
		}
		self.with_mut(|n| n.control.checked = checked);
	}

	/// Option selected state.
	pub fn selected(&self) -> bool {
		self.with(|n| n.control.selected)
	}

	/// Sets the option selected state.
	pub fn set_selected(&self, selected: bool) {
		self.with_mut(|n| n.control.selected = selected);
	}

	/// Returns true for `<select multiple>`.
	pub fn is_multiple(&self) -> bool {
		self.has_attribute("multiple")
	}

	/// `<option>` children of a `<select>` (including those inside `<optgroup>`).
	pub fn options(&self) -> Vec<Element> {
		self.query_selector_all("option").unwrap_or_default()
	}

	/// Adds a listener for events of `kind`.
	pub fn add_event_listener<F>(&self, kind: &str, listener: F) -> ListenerId
	where
		F: Fn(&Event) + 'static,
	{
		let mut tree = self.doc.tree.borrow_mut();
		tree.next_listener += 1;
		let id = ListenerId(tree.next_listener);
		tree.nodes[self.id.0]
			.listeners
			.push((id, kind.to_string(), Rc::new(listener)));
		id
	}

	/// Removes a listener added with [`Element::add_event_listener`].
	///
	/// Returns false if it was already gone.
	pub fn remove_event_listener(&self, id: ListenerId) -> bool {
		self.with_mut(|n| {
			let before = n.listeners.len();
			n.listeners.retain(|(listener, _, _)| *listener != id);
			n.listeners.len() != before
		})
	}

	/// Drops every listener on this element. Returns how many were removed.
	pub fn clear_listeners(&self) -> usize {
		self.with_mut(|n| std::mem::take(&mut n.listeners).len())
	}

	/// Number of listeners registered for `kind`.
	pub fn listener_count(&self, kind: &str) -> usize {
		self.with(|n| n.listeners.iter().filter(|(_, k, _)| k == kind).count())
	}

	/// Invokes the listeners for the event's type synchronously.
	pub fn dispatch_event(&self, event: &Event) {
		let listeners: Vec<Listener> = self.with(|n| {
			n.listeners
				.iter()
				.filter(|(_, k, _)| k == event.kind())
				.map(|(_, _, l)| Rc::clone(l))
				.collect()
		});
		for listener in listeners {
			listener(event);
		}
	}

	/// Installs the mount hook, replacing any previous one.
	pub fn set_on_mount<F>(&self, hook: F)
	where
		F: Fn() -> HandlerResult + 'static,
	{
		self.with_mut(|n| n.slots.on_mount = Some(Rc::new(hook)));
	}

	/// Installs the unmount hook, replacing any previous one.
	pub fn set_on_unmount<F>(&self, hook: F)
	where
		F: Fn() -> HandlerResult + 'static,
	{
		self.with_mut(|n| n.slots.on_unmount = Some(Rc::new(hook)));
	}

	/// Runs the mount hook, if any.
	pub fn run_mount_hook(&self) -> Option<HandlerResult> {
		let hook = self.with(|n| n.slots.on_mount.clone());
		hook.map(|h| h())
	}

	/// Runs the unmount hook, if any.
	pub fn run_unmount_hook(&self) -> Option<HandlerResult> {
		let hook = self.with(|n| n.slots.on_unmount.clone());
		hook.map(|h| h())
	}

	/// Drops both lifecycle hooks.
	pub fn clear_hooks(&self) {
		self.with_mut(|n| {
			n.slots.on_mount = None;
			n.slots.on_unmount = None;
		});
	}

	/// The instance id of the hydration bound to this node.
	pub fn instance_id(&self) -> Option<InstanceId> {
		self.with(|n| n.slots.instance)
	}

	/// Sets or clears the instance id.
	pub fn set_instance_id(&self, id: Option<InstanceId>) {
		self.with_mut(|n| n.slots.instance = id);
	}

	/// Returns true once relay bindings were attached to this node.
	pub fn relay_bound(&self) -> bool {
		self.with(|n| n.slots.relay_bound)
	}

	/// Records that relay bindings were attached; returns false if they already were.
	pub fn mark_relay_bound(&self) -> bool {
		self.with_mut(|n| !std::mem::replace(&mut n.slots.relay_bound, true))
	}

	/// Clears the relay-bound mark.
	pub fn clear_relay_bound(&self) {
		self.with_mut(|n| n.slots.relay_bound = false);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};
	use std::cell::Cell;

	#[fixture]
	fn doc() -> Document {
		Document::new()
	}

	#[rstest]
	fn test_new_document_has_body(doc: Document) {
		let body = doc.body();
		assert_eq!(body.tag_name(), "body");
		assert_eq!(body.parent(), Some(doc.document_element()));
		assert!(body.is_connected());
	}

	#[rstest]
	fn test_append_and_query(doc: Document) {
		// Arrange
		let div = doc.create_element("div");
		div.set_attribute("data-em-fn", "f1");
		let inner = doc.create_element("span");
		inner.set_attribute("data-em-fn", "f1");
		div.append_child(&inner);
		doc.body().append_child(&div);

		// Act
		let found = doc.query_selector_all("[data-em-fn=\"f1\"]").unwrap();

		// Assert
		assert_eq!(found, vec![div, inner]);
	}

	#[rstest]
	fn test_query_skips_detached(doc: Document) {
		let div = doc.create_element("div");
		div.set_attribute("data-em-fn", "f1");
		assert!(doc.query_selector_all("[data-em-fn]").unwrap().is_empty());
		assert!(!div.is_connected());
	}

	#[rstest]
	fn test_remove_connected_child_records_mutation(doc: Document) {
		// Arrange
		let div = doc.create_element("div");
		doc.body().append_child(&div);

		// Act
		div.remove();

		// Assert
		let records = doc.take_mutations();
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].removed, vec![div.clone()]);
		assert!(!div.is_connected());
		assert!(doc.take_mutations().is_empty());
	}

	#[rstest]
	fn test_remove_from_detached_parent_records_nothing(doc: Document) {
		let parent = doc.create_element("div");
		let child = doc.create_element("p");
		parent.append_child(&child);
		parent.remove_child(&child);
		assert_eq!(doc.pending_mutations(), 0);
	}

	#[rstest]
	fn test_remove_children_batches_one_record(doc: Document) {
		let body = doc.body();
		let a = doc.create_element("a");
		let b = doc.create_element("b");
		body.append_child(&a).append_child(&b);

		body.remove_children(&[a.clone(), b.clone()]);

		let records = doc.take_mutations();
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].removed, vec![a, b]);
	}

	#[rstest]
	fn test_append_ancestor_is_ignored(doc: Document) {
		let outer = doc.create_element("div");
		let inner = doc.create_element("div");
		outer.append_child(&inner);
		inner.append_child(&outer);
		assert_eq!(outer.parent(), None);
		assert_eq!(inner.parent(), Some(outer));
	}

	#[rstest]
	fn test_dispatch_event_invokes_matching_listeners(doc: Document) {
		// Arrange
		let input = doc.create_element("input");
		let hits = Rc::new(Cell::new(0));
		let counter = Rc::clone(&hits);
		input.add_event_listener("input", move |_| counter.set(counter.get() + 1));
		input.add_event_listener("change", |_| panic!("wrong event"));

		// Act
		input.dispatch_event(&Event::new("input"));

		// Assert
		assert_eq!(hits.get(), 1);
		assert_eq!(input.listener_count("input"), 1);
	}

	#[rstest]
	fn test_removed_listener_no_longer_fires(doc: Document) {
		// Arrange
		let button = doc.create_element("button");
		let hits = Rc::new(Cell::new(0));
		let counter = Rc::clone(&hits);
		let id = button.add_event_listener("click", move |_| counter.set(counter.get() + 1));
		button.add_event_listener("focus", |_| {});

		// Act
		let removed = button.remove_event_listener(id);
		button.dispatch_event(&Event::new("click"));

		// Assert
		assert!(removed);
		assert!(!button.remove_event_listener(id));
		assert_eq!(hits.get(), 0);
		assert_eq!(button.clear_listeners(), 1);
		assert_eq!(button.listener_count("focus"), 0);
	}

	#[rstest]
	fn test_listener_can_mutate_document(doc: Document) {
		let button = doc.create_element("button");
		doc.body().append_child(&button);
		let target = button.clone();
		button.add_event_listener("click", move |_| target.set_text("clicked"));
		button.dispatch_event(&Event::new("click"));
		assert_eq!(button.text(), "clicked");
	}

	#[rstest]
	fn test_select_value_follows_selected_option(doc: Document) {
		// Arrange
		let select = doc.create_element("select");
		for v in ["a", "b", "c"] {
			let option = doc.create_element("option");
			option.set_attribute("value", v);
			select.append_child(&option);
		}

		// Act
		select.set_value("b");

		// Assert
		assert_eq!(select.value(), "b");
		let selected: Vec<bool> = select.options().iter().map(Element::selected).collect();
		assert_eq!(selected, vec![false, true, false]);
	}

	#[rstest]
	fn test_option_without_value_uses_text(doc: Document) {
		let option = doc.create_element("option");
		option.set_text("Label");
		assert_eq!(option.value(), "Label");
	}

	#[rstest]
	fn test_checking_radio_unchecks_group(doc: Document) {
		// Arrange
		let body = doc.body();
		let radios: Vec<Element> = ["x", "y"]
			.iter()
			.map(|v| {
				let radio = doc.create_element("input");
				radio.set_attribute("type", "radio");
				radio.set_attribute("name", "pick");
				radio.set_attribute("value", v);
				body.append_child(&radio);
				radio
			})
			.collect();

		// Act
		radios[0].set_checked(true);
		radios[1].set_checked(true);

		// Assert
		assert!(!radios[0].checked());
		assert!(radios[1].checked());
	}

	#[rstest]
	fn test_hooks_and_instance_slots(doc: Document) {
		let div = doc.create_element("div");
		assert!(div.run_mount_hook().is_none());
		div.set_on_mount(|| Ok(()));
		assert_eq!(div.run_mount_hook(), Some(Ok(())));
		div.clear_hooks();
		assert!(div.run_mount_hook().is_none());

		assert!(div.mark_relay_bound());
		assert!(!div.mark_relay_bound());
		assert!(div.relay_bound());
		div.clear_relay_bound();
		assert!(!div.relay_bound());
	}

	#[rstest]
	fn test_get_unknown_node(doc: Document) {
		assert_eq!(
			doc.get(NodeId(999)).unwrap_err(),
			RuntimeError::DetachedNode(999)
		);
	}
}
