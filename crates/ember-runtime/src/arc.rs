//! ARC: mounting and reference counting of hydration payloads
//!
//! The [`RefController`] owns three tables:
//!
//! - functions: function id → hydration function
//! - data: data id → [`PayloadEntry`] (`value` + `refs`)
//! - instances: [`InstanceId`] → [`VmRecord`]
//!
//! `refs` of a payload equals the number of live instances referencing it,
//! so a resident entry always has `refs >= 1`. Payloads handed to
//! [`RefController::spark`] are held only for that call: an entry is created
//! by the first successful mount that references it, incremented by later
//! mounts, decremented exactly once per [`RefController::release`] and
//! evicted at zero. A payload no node references is never stored, and
//! re-sending an evicted payload does not bring it back.
//!
//! ## Mount sequence
//!
//! ```text
//! spark(functions, data)
//!   │
//!   ├─ register unknown function ids
//!   └─ for each function id, for each [fn-attr="id"] node without an instance:
//!        mint id ─► scoped relay ─► reactor(seed) ─► call function
//!                                                      │
//!                               Ok ◄───────────────────┴──────────────► Err
//!                               │                                        │
//!        record instance, refs += 1                 dispose reactor (listeners,
//!        (entry created at 1), tag node,            frame), drop relay
//!        run mount hook                             subscriptions, nothing recorded
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::config::RuntimeConfig;
use crate::dom::{Document, Element};
use crate::error::HandlerResult;
use crate::reactor::Reactor;
use crate::relay::{Relay, ScopedRelay};
use crate::scheduler::FrameScheduler;
use crate::toolkit::Toolkit;
use crate::value::Value;
use crate::{debug_log, info_log, warn_log};

/// Identity of one mounted instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
	/// Builds an id from its numeric form.
	pub fn from_raw(raw: u64) -> Self {
		Self(raw)
	}

	/// Numeric form of the id.
	pub fn as_u64(self) -> u64 {
		self.0
	}
}

impl fmt::Display for InstanceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "em-{}", self.0)
	}
}

/// A hydration function.
pub type HydrateFn = Rc<dyn Fn(&MountContext) -> HandlerResult>;

/// Wraps a closure as a [`HydrateFn`].
pub fn hydrate_fn<F>(f: F) -> HydrateFn
where
	F: Fn(&MountContext) -> HandlerResult + 'static,
{
	Rc::new(f)
}

/// Everything a hydration function receives for one node.
pub struct MountContext {
	element: Element,
	reactor: Reactor,
	relay: ScopedRelay,
	toolkit: Toolkit,
}

impl MountContext {
	/// The node being hydrated.
	pub fn element(&self) -> &Element {
		&self.element
	}

	/// The node's reactive state.
	pub fn reactor(&self) -> &Reactor {
		&self.reactor
	}

	/// Relay bindings owned by this instance.
	pub fn relay(&self) -> &ScopedRelay {
		&self.relay
	}

	/// Shared helpers and the page store.
	pub fn toolkit(&self) -> &Toolkit {
		&self.toolkit
	}

	/// The id the instance will be recorded under.
	pub fn instance_id(&self) -> InstanceId {
		self.relay.owner()
	}
}

/// A registered data payload.
#[derive(Debug, Clone)]
pub struct PayloadEntry {
	/// Decoded payload
	pub value: Value,
	/// Live instances referencing this payload
	pub refs: usize,
}

/// One mounted instance.
#[derive(Debug, Clone)]
pub struct VmRecord {
	function_id: String,
	data_id: Option<String>,
	element: Element,
	reactor: Reactor,
}

impl VmRecord {
	/// Function bound to the node.
	pub fn function_id(&self) -> &str {
		&self.function_id
	}

	/// Payload referenced by the instance, if any.
	pub fn data_id(&self) -> Option<&str> {
		self.data_id.as_deref()
	}

	/// The mounted node.
	pub fn element(&self) -> &Element {
		&self.element
	}

	/// The instance's reactor.
	pub fn reactor(&self) -> &Reactor {
		&self.reactor
	}
}

#[derive(Default)]
struct Tables {
	functions: HashMap<String, HydrateFn>,
	/// Function ids in registration order
	function_order: Vec<String>,
	data: HashMap<String, PayloadEntry>,
	instances: HashMap<InstanceId, VmRecord>,
	next_instance: u64,
}

/// Reference controller for one page. Cloning shares the tables.
#[derive(Clone)]
pub struct RefController {
	tables: Rc<RefCell<Tables>>,
	document: Document,
	relay: Relay,
	scheduler: FrameScheduler,
	toolkit: Toolkit,
	config: Rc<RuntimeConfig>,
}

impl fmt::Debug for RefController {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let tables = self.tables.borrow();
		f.debug_struct("RefController")
			.field("functions", &tables.functions.len())
			.field("data", &tables.data.len())
			.field("instances", &tables.instances.len())
			.finish()
	}
}

impl RefController {
	pub(crate) fn new(
		document: Document,
		relay: Relay,
		scheduler: FrameScheduler,
		toolkit: Toolkit,
		config: Rc<RuntimeConfig>,
	) -> Self {
		Self {
			tables: Rc::new(RefCell::new(Tables::default())),
			document,
			relay,
			scheduler,
			toolkit,
			config,
		}
	}

	/// Registers new entries, then mounts every matching node that has no
	/// instance yet.
	///
	/// Functions whose id is already registered keep their existing body.
	/// A resident payload wins over an incoming one with the same id.
	///
	/// # Returns
	///
	/// The number of instances mounted successfully.
	pub fn spark<F, D>(&self, functions: F, data: D) -> usize
	where
		F: IntoIterator<Item = (String, HydrateFn)>,
		D: IntoIterator<Item = (String, Value)>,
	{
		let function_ids = {
			let mut tables = self.tables.borrow_mut();
			for (id, body) in functions {
				if !tables.functions.contains_key(&id) {
					debug_log!("registering function {}", id);
					tables.function_order.push(id.clone());
					tables.functions.insert(id, body);
				}
			}
			tables.function_order.clone()
		};
		let mut incoming: HashMap<String, Value> = HashMap::new();
		for (id, value) in data {
			incoming.entry(id).or_insert(value);
		}

		let mut mounted = 0;
		for function_id in function_ids {
			let selector = self.config.function_selector(&function_id);
			let nodes = match self.document.query_selector_all(&selector) {
				Ok(nodes) => nodes,
				Err(err) => {
					warn_log!("cannot look up nodes of {}: {}", function_id, err);
					continue;
				}
			};
			for node in nodes.into_iter().filter(|n| n.instance_id().is_none()) {
				if self.mount(&function_id, &node, &incoming) {
					mounted += 1;
				}
			}
		}
		info_log!(
			"spark mounted {} instances, {} payloads unreferenced",
			mounted,
			incoming.keys().filter(|id| !self.is_resident(id)).count()
		);
		mounted
	}

	fn mount(&self, function_id: &str, node: &Element, incoming: &HashMap<String, Value>) -> bool {
		let (function, id, data_id, seed) = {
			let mut tables = self.tables.borrow_mut();
			let Some(function) = tables.functions.get(function_id).cloned() else {
				return false;
			};
			let requested = node.get_attribute(&self.config.data_attr);
			let (data_id, seed) = match requested {
				Some(data_id) => match tables
					.data
					.get(&data_id)
					.map(|entry| &entry.value)
					.or_else(|| incoming.get(&data_id))
				{
					Some(value) => {
						let seed = value.clone();
						(Some(data_id), seed)
					}
					None => {
						warn_log!("node references unknown data id {}", data_id);
						(None, Value::object())
					}
				},
				None => (None, Value::object()),
			};
			tables.next_instance += 1;
			let id = InstanceId(tables.next_instance);
			(function, id, data_id, seed)
		};

		if node.mark_relay_bound() {
			debug_log!("relay bindings attached to node {:?}", node.node_id());
		}
		let context = MountContext {
			element: node.clone(),
			reactor: Reactor::attached(seed, self.scheduler.clone(), node.clone()),
			relay: self.relay.scoped(id),
			toolkit: self.toolkit.clone(),
		};

		if let Err(err) = function(&context) {
			warn_log!("hydration of {} with {} failed: {}", id, function_id, err);
			context.reactor.dispose();
			self.relay.unsubscribe(id, None);
			node.clear_hooks();
			return false;
		}

		{
			let mut tables = self.tables.borrow_mut();
			if let Some(data_id) = &data_id {
				match tables.data.get_mut(data_id) {
					Some(entry) => entry.refs += 1,
					None => {
						if let Some(value) = incoming.get(data_id) {
							let entry = PayloadEntry {
								value: value.clone(),
								refs: 1,
							};
							tables.data.insert(data_id.clone(), entry);
						}
					}
				}
			}
			tables.instances.insert(
				id,
				VmRecord {
					function_id: function_id.to_string(),
					data_id,
					element: node.clone(),
					reactor: context.reactor.clone(),
				},
			);
		}
		node.set_instance_id(Some(id));
		if let Some(attr) = &self.config.instance_attr {
			node.set_attribute(attr, &id.to_string());
		}
		if let Some(Err(err)) = node.run_mount_hook() {
			warn_log!("mount hook of {} failed: {}", id, err);
		}
		true
	}

	/// Drops the instance record and its payload reference, and disposes
	/// the instance's reactor.
	///
	/// Unknown ids are a no-op, so releasing twice is safe.
	///
	/// # Returns
	///
	/// `true` if an instance was released.
	pub fn release(&self, id: InstanceId) -> bool {
		let released = {
			let mut tables = self.tables.borrow_mut();
			let Some(record) = tables.instances.remove(&id) else {
				return false;
			};
			if let Some(data_id) = &record.data_id
				&& let Some(entry) = tables.data.get_mut(data_id)
			{
				entry.refs = entry.refs.saturating_sub(1);
				if entry.refs == 0 {
					tables.data.remove(data_id);
					debug_log!("evicted payload {}", data_id);
				}
			}
			record
		};
		debug_log!("released {} ({})", id, released.function_id);
		released.reactor.dispose();
		true
	}

	/// Reference count of a payload; `None` if it is not resident.
	pub fn refs(&self, data_id: &str) -> Option<usize> {
		self.tables.borrow().data.get(data_id).map(|e| e.refs)
	}

	/// Returns true while the payload is in the data table.
	pub fn is_resident(&self, data_id: &str) -> bool {
		self.tables.borrow().data.contains_key(data_id)
	}

	/// Decoded payload, if resident.
	pub fn payload(&self, data_id: &str) -> Option<Value> {
		self.tables.borrow().data.get(data_id).map(|e| e.value.clone())
	}

	/// The record of a live instance.
	pub fn instance(&self, id: InstanceId) -> Option<VmRecord> {
		self.tables.borrow().instances.get(&id).cloned()
	}

	/// Number of live instances.
	pub fn instance_count(&self) -> usize {
		self.tables.borrow().instances.len()
	}

	/// Returns true if `function_id` is registered.
	pub fn has_function(&self, function_id: &str) -> bool {
		self.tables.borrow().functions.contains_key(function_id)
	}

	/// Number of registered functions.
	pub fn function_count(&self) -> usize {
		self.tables.borrow().functions.len()
	}

	pub(crate) fn config(&self) -> &RuntimeConfig {
		&self.config
	}
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
	use super::*;
	use crate::error::HydrateError;
	use crate::store::Store;
	use rstest::{fixture, rstest};
	use serde_json::json;
	use std::cell::Cell;

	struct Page {
		doc: Document,
		relay: Relay,
		scheduler: FrameScheduler,
		arc: RefController,
	}

	#[fixture]
	fn page() -> Page {
		let doc = Document::new();
		let relay = Relay::new();
		let scheduler = FrameScheduler::new();
		let toolkit = Toolkit::new(relay.clone(), Store::new(relay.clone()), scheduler.clone());
		let arc = RefController::new(
			doc.clone(),
			relay.clone(),
			scheduler.clone(),
			toolkit,
			Rc::new(RuntimeConfig::default()),
		);
		Page {
			doc,
			relay,
			scheduler,
			arc,
		}
	}

	fn node(page: &Page, function_id: &str, data_id: Option<&str>) -> Element {
		let el = page.doc.create_element("div");
		el.set_attribute("data-em-fn", function_id);
		if let Some(data_id) = data_id {
			el.set_attribute("data-em-data", data_id);
		}
		page.doc.body().append_child(&el);
		el
	}

	fn functions(entries: Vec<(&str, HydrateFn)>) -> Vec<(String, HydrateFn)> {
		entries
			.into_iter()
			.map(|(id, f)| (id.to_string(), f))
			.collect()
	}

	fn data(entries: Vec<(&str, serde_json::Value)>) -> Vec<(String, Value)> {
		entries
			.into_iter()
			.map(|(id, v)| (id.to_string(), Value::from(v)))
			.collect()
	}

	#[rstest]
	fn test_instance_id_display() {
		assert_eq!(InstanceId::from_raw(7).to_string(), "em-7");
		assert_eq!(InstanceId::from_raw(7).as_u64(), 7);
	}

	#[rstest]
	fn test_spark_mounts_with_seeded_reactor(page: Page) {
		// Arrange
		let el = node(&page, "f1", Some("d1"));
		let seen = Rc::new(RefCell::new(None));
		let slot = Rc::clone(&seen);
		let f = hydrate_fn(move |ctx| {
			*slot.borrow_mut() = ctx.reactor().get("x");
			Ok(())
		});

		// Act
		let mounted = page
			.arc
			.spark(functions(vec![("f1", f)]), data(vec![("d1", json!({"x": 1}))]));

		// Assert
		assert_eq!(mounted, 1);
		assert_eq!(*seen.borrow(), Some(Value::from(1)));
		assert_eq!(page.arc.refs("d1"), Some(1));
		let id = el.instance_id().unwrap();
		assert_eq!(el.get_attribute("data-em-id"), Some(id.to_string()));
		let record = page.arc.instance(id).unwrap();
		assert_eq!(record.function_id(), "f1");
		assert_eq!(record.data_id(), Some("d1"));
		assert!(el.relay_bound());
	}

	#[rstest]
	fn test_node_without_data_gets_empty_object(page: Page) {
		node(&page, "f1", None);
		let snapshot = Rc::new(RefCell::new(None));
		let slot = Rc::clone(&snapshot);
		let f = hydrate_fn(move |ctx| {
			*slot.borrow_mut() = Some(ctx.reactor().snapshot());
			Ok(())
		});

		page.arc.spark(functions(vec![("f1", f)]), Vec::new());

		assert_eq!(*snapshot.borrow(), Some(Value::object()));
		assert_eq!(page.arc.instance_count(), 1);
	}

	#[rstest]
	fn test_shared_payload_refcount(page: Page) {
		// Arrange
		let a = node(&page, "f1", Some("d1"));
		let b = node(&page, "f1", Some("d1"));
		page.arc.spark(
			functions(vec![("f1", hydrate_fn(|_| Ok(())))]),
			data(vec![("d1", json!({"x": 1}))]),
		);
		assert_eq!(page.arc.refs("d1"), Some(2));

		// Act / Assert
		assert!(page.arc.release(a.instance_id().unwrap()));
		assert_eq!(page.arc.refs("d1"), Some(1));
		assert!(page.arc.is_resident("d1"));

		assert!(page.arc.release(b.instance_id().unwrap()));
		assert!(!page.arc.is_resident("d1"));
		assert_eq!(page.arc.refs("d1"), None);
	}

	#[rstest]
	fn test_release_is_idempotent(page: Page) {
		let a = node(&page, "f1", Some("d1"));
		node(&page, "f1", Some("d1"));
		page.arc.spark(
			functions(vec![("f1", hydrate_fn(|_| Ok(())))]),
			data(vec![("d1", json!(1))]),
		);
		let id = a.instance_id().unwrap();

		assert!(page.arc.release(id));
		assert!(!page.arc.release(id));

		assert_eq!(page.arc.refs("d1"), Some(1));
		assert!(!page.arc.release(InstanceId::from_raw(999)));
	}

	#[rstest]
	fn test_failed_mount_records_nothing(page: Page) {
		// Arrange
		let bad = node(&page, "bad", Some("d1"));
		let good = node(&page, "good", Some("d1"));
		let bad_fn = hydrate_fn(|ctx| {
			ctx.relay().subscribe("t", |_| Ok(()));
			Err(HydrateError::new("broken component"))
		});

		// Act
		let mounted = page.arc.spark(
			functions(vec![("bad", bad_fn), ("good", hydrate_fn(|_| Ok(())))]),
			data(vec![("d1", json!({}))]),
		);

		// Assert
		assert_eq!(mounted, 1);
		assert_eq!(bad.instance_id(), None);
		assert!(good.instance_id().is_some());
		assert_eq!(page.arc.refs("d1"), Some(1));
		assert_eq!(page.relay.subscription_count(), 0);
	}

	#[rstest]
	fn test_mount_hook_runs_after_success_and_errors_are_swallowed(page: Page) {
		let el = node(&page, "f1", None);
		let hook_ran = Rc::new(Cell::new(false));
		let flag = Rc::clone(&hook_ran);
		let f = hydrate_fn(move |ctx| {
			let flag = Rc::clone(&flag);
			ctx.element().set_on_mount(move || {
				flag.set(true);
				Err(HydrateError::new("hook failure"))
			});
			Ok(())
		});

		let mounted = page.arc.spark(functions(vec![("f1", f)]), Vec::new());

		assert_eq!(mounted, 1);
		assert!(hook_ran.get());
		assert!(el.instance_id().is_some());
	}

	#[rstest]
	fn test_respark_does_not_mount_twice(page: Page) {
		// Arrange
		node(&page, "f1", None);
		let calls = Rc::new(Cell::new(0));
		let counter = Rc::clone(&calls);
		let f = hydrate_fn(move |_| {
			counter.set(counter.get() + 1);
			Ok(())
		});
		page.arc.spark(functions(vec![("f1", f)]), Vec::new());

		// Act
		node(&page, "f1", None);
		let mounted = page.arc.spark(Vec::new(), Vec::new());

		// Assert
		assert_eq!(mounted, 1);
		assert_eq!(calls.get(), 2);
		assert_eq!(page.arc.instance_count(), 2);
		assert_eq!(page.arc.function_count(), 1);
	}

	#[rstest]
	fn test_unknown_data_id_mounts_without_reference(page: Page) {
		let el = node(&page, "f1", Some("missing"));
		page.arc.spark(functions(vec![("f1", hydrate_fn(|_| Ok(())))]), Vec::new());
		let record = page.arc.instance(el.instance_id().unwrap()).unwrap();
		assert_eq!(record.data_id(), None);
		assert!(!page.arc.is_resident("missing"));
	}

	#[rstest]
	fn test_instance_id_visible_during_mount(page: Page) {
		let el = node(&page, "f1", None);
		let seen = Rc::new(Cell::new(None));
		let slot = Rc::clone(&seen);
		page.arc.spark(
			functions(vec![(
				"f1",
				hydrate_fn(move |ctx| {
					slot.set(Some(ctx.instance_id()));
					Ok(())
				}),
			)]),
			Vec::new(),
		);
		assert_eq!(seen.get(), el.instance_id());
	}

	#[rstest]
	fn test_unreferenced_payload_is_not_kept(page: Page) {
		// Arrange
		node(&page, "f1", Some("d1"));

		// Act
		page.arc.spark(
			functions(vec![("f1", hydrate_fn(|_| Ok(())))]),
			data(vec![("d1", json!({"x": 1})), ("d2", json!({"y": 2}))]),
		);

		// Assert
		assert_eq!(page.arc.refs("d1"), Some(1));
		assert!(!page.arc.is_resident("d2"));
		assert_eq!(page.arc.refs("d2"), None);
	}

	#[rstest]
	fn test_evicted_payload_is_not_revived_by_respark(page: Page) {
		// Arrange
		let el = node(&page, "f1", Some("d1"));
		let f = hydrate_fn(|_| Ok(()));
		page.arc.spark(functions(vec![("f1", f)]), data(vec![("d1", json!(1))]));
		page.arc.release(el.instance_id().unwrap());
		assert!(!page.arc.is_resident("d1"));

		// Act
		el.remove();
		page.arc.spark(Vec::new(), data(vec![("d1", json!(1))]));

		// Assert
		assert!(!page.arc.is_resident("d1"));
		node(&page, "f1", Some("d1"));
		page.arc.spark(Vec::new(), data(vec![("d1", json!(1))]));
		assert_eq!(page.arc.refs("d1"), Some(1));
	}

	#[rstest]
	fn test_resident_payload_wins_over_resent_body(page: Page) {
		node(&page, "f1", Some("d1"));
		page.arc.spark(
			functions(vec![("f1", hydrate_fn(|_| Ok(())))]),
			data(vec![("d1", json!({"v": "first"}))]),
		);
		node(&page, "f1", Some("d1"));
		page.arc.spark(Vec::new(), data(vec![("d1", json!({"v": "second"}))]));
		assert_eq!(page.arc.refs("d1"), Some(2));
		assert_eq!(page.arc.payload("d1"), Some(Value::from(json!({"v": "first"}))));
	}

	#[rstest]
	fn test_failed_mount_after_bind_leaves_no_listeners_or_frame(page: Page) {
		// Arrange
		let el = node(&page, "bad", None);
		let input = page.doc.create_element("input");
		input.set_attribute("name", "q");
		el.append_child(&input);
		let bad_fn = hydrate_fn(|ctx| {
			ctx.reactor().bind("q", "input", Default::default())?;
			ctx.reactor().set("q", Value::from("typed"));
			Err(HydrateError::new("failed after binding"))
		});

		// Act
		let mounted = page.arc.spark(functions(vec![("bad", bad_fn)]), Vec::new());

		// Assert
		assert_eq!(mounted, 0);
		assert_eq!(input.listener_count("input"), 0);
		assert_eq!(input.listener_count("change"), 0);
		assert_eq!(page.scheduler.pending(), 0);
		assert_eq!(page.arc.instance_count(), 0);
	}

	#[rstest]
	fn test_release_removes_bound_listeners(page: Page) {
		// Arrange
		let el = node(&page, "f1", None);
		let input = page.doc.create_element("input");
		el.append_child(&input);
		let f = hydrate_fn(|ctx| {
			ctx.reactor().bind("q", "input", Default::default())?;
			Ok(())
		});
		page.arc.spark(functions(vec![("f1", f)]), Vec::new());
		let id = el.instance_id().unwrap();
		let reactor = page.arc.instance(id).unwrap().reactor().clone();
		assert_eq!(reactor.binding_count(), 2);

		// Act
		page.arc.release(id);

		// Assert
		assert_eq!(reactor.binding_count(), 0);
		assert_eq!(input.listener_count("input"), 0);
		assert_eq!(page.scheduler.pending(), 0);
	}
}
