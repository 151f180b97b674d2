//! Page runtime
//!
//! One [`Runtime`] per page. It owns the page-lifetime services (relay,
//! store, frame scheduler, reference controller) and wires the mutation
//! cleanup walker to the document.
//!
//! ## Usage
//!
//! ```ignore
//! use ember_runtime::{Document, Runtime, RuntimeConfig, hydrate_fn};
//!
//! let runtime = Runtime::new(Document::new(), RuntimeConfig::default());
//! runtime.spark(
//!     vec![("f1".to_string(), hydrate_fn(|ctx| {
//!         ctx.reactor().bind("query", "input", Default::default())?;
//!         Ok(())
//!     }))],
//!     Vec::new(),
//! );
//!
//! // host event loop
//! runtime.observe_mutations();
//! runtime.tick();
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::arc::{HydrateFn, RefController};
use crate::cleanup::CleanupWalker;
use crate::config::RuntimeConfig;
use crate::dom::Document;
use crate::relay::Relay;
use crate::scheduler::FrameScheduler;
use crate::store::Store;
use crate::toolkit::Toolkit;
use crate::value::Value;
use crate::{info_log, warn_log};

type ReadyCallback = Box<dyn FnOnce(&Runtime)>;

/// Client runtime of one page.
#[derive(Clone)]
pub struct Runtime {
	document: Document,
	relay: Relay,
	store: Store,
	scheduler: FrameScheduler,
	toolkit: Toolkit,
	arc: RefController,
	walker: CleanupWalker,
	ready: Rc<Cell<bool>>,
	on_ready: Rc<RefCell<Vec<ReadyCallback>>>,
}

impl std::fmt::Debug for Runtime {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Runtime")
			.field("arc", &self.arc)
			.field("relay", &self.relay)
			.field("scheduler", &self.scheduler)
			.field("ready", &self.ready.get())
			.finish()
	}
}

impl Runtime {
	/// Creates the runtime for `document`.
	pub fn new(document: Document, config: RuntimeConfig) -> Self {
		let relay = Relay::new();
		let store = Store::new(relay.clone());
		let scheduler = FrameScheduler::new();
		let toolkit = Toolkit::new(relay.clone(), store.clone(), scheduler.clone());
		let arc = RefController::new(
			document.clone(),
			relay.clone(),
			scheduler.clone(),
			toolkit.clone(),
			Rc::new(config),
		);
		let walker = CleanupWalker::new(relay.clone(), arc.clone());
		Self {
			document,
			relay,
			store,
			scheduler,
			toolkit,
			arc,
			walker,
			ready: Rc::new(Cell::new(false)),
			on_ready: Rc::new(RefCell::new(Vec::new())),
		}
	}

	/// Registers entries and mounts matching nodes. See [`RefController::spark`].
	pub fn spark<F, D>(&self, functions: F, data: D) -> usize
	where
		F: IntoIterator<Item = (String, HydrateFn)>,
		D: IntoIterator<Item = (String, Value)>,
	{
		self.arc.spark(functions, data)
	}

	/// Like [`Runtime::spark`], with data payloads as the JSON text the
	/// server emitted.
	///
	/// A payload that does not parse is skipped with a warning; nodes
	/// referencing it mount with an empty object.
	pub fn spark_json<F, D>(&self, functions: F, data: D) -> usize
	where
		F: IntoIterator<Item = (String, HydrateFn)>,
		D: IntoIterator<Item = (String, String)>,
	{
		let decoded: Vec<(String, Value)> = data
			.into_iter()
			.filter_map(|(id, json)| match Value::from_json_str(&json) {
				Ok(value) => Some((id, value)),
				Err(err) => {
					warn_log!("payload {} is not valid JSON: {}", id, err);
					None
				}
			})
			.collect();
		self.arc.spark(functions, decoded)
	}

	/// Feeds pending removal records to the cleanup walker.
	///
	/// # Returns
	///
	/// The number of instances released.
	pub fn observe_mutations(&self) -> usize {
		let records = self.document.take_mutations();
		if records.is_empty() {
			return 0;
		}
		self.walker.process(&records)
	}

	/// Runs one animation frame. Returns the number of callbacks run.
	pub fn tick(&self) -> usize {
		self.scheduler.run_frame()
	}

	/// Sets the ready flag and runs callbacks queued by [`Runtime::when_ready`].
	pub fn mark_ready(&self) {
		if self.ready.replace(true) {
			return;
		}
		info_log!("runtime ready");
		let callbacks = std::mem::take(&mut *self.on_ready.borrow_mut());
		for callback in callbacks {
			callback(self);
		}
	}

	/// Returns true once [`Runtime::mark_ready`] was called.
	pub fn is_ready(&self) -> bool {
		self.ready.get()
	}

	/// Runs `callback` now if the runtime is ready, else when it becomes ready.
	pub fn when_ready<F>(&self, callback: F)
	where
		F: FnOnce(&Runtime) + 'static,
	{
		if self.is_ready() {
			callback(self);
		} else {
			self.on_ready.borrow_mut().push(Box::new(callback));
		}
	}

	/// The hydrated document.
	pub fn document(&self) -> &Document {
		&self.document
	}

	/// The page relay.
	pub fn relay(&self) -> &Relay {
		&self.relay
	}

	/// The page store.
	pub fn store(&self) -> &Store {
		&self.store
	}

	/// The frame scheduler.
	pub fn scheduler(&self) -> &FrameScheduler {
		&self.scheduler
	}

	/// The utility surface handed to hydration functions.
	pub fn toolkit(&self) -> &Toolkit {
		&self.toolkit
	}

	/// The reference controller.
	pub fn arc(&self) -> &RefController {
		&self.arc
	}

	/// The cleanup walker.
	pub fn cleanup(&self) -> &CleanupWalker {
		&self.walker
	}
}
