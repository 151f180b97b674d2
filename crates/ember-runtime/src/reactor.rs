//! Data Reactor
//!
//! Per-node reactive state. A [`Reactor`] wraps a [`Value`] tree and lets the
//! hydration code of one mounted node read, write and watch it by dot-path,
//! and bind form controls to it (see [`BindOptions`]).
//!
//! ## Change propagation
//!
//! ```text
//! set("a.b", v) ──► equal to current? ──yes──► no-op
//!                        │ no
//!                        ▼
//!              write tree, mark "a.b", "a" (and watched
//!              descendants of "a.b") dirty
//!                        │
//!                        ▼
//!              request one frame (coalesced)
//!                        │
//!                        ▼
//! flush: for each dirty path with watchers, compare the
//!        current value with each watcher's last-seen snapshot
//!        and call the watcher only if they differ
//! ```
//!
//! Writes made by a watcher during a flush land in a fresh pending set and
//! are delivered on the next frame.

mod binding;

pub use binding::BindOptions;

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::dom::{Element, ListenerId};
use crate::error::HandlerResult;
use crate::path::Path;
use crate::scheduler::{FrameHandle, FrameScheduler};
use crate::value::{Value, deep_equal_opt};
use crate::{debug_log, warn_log};

/// Watch callback, invoked as `handler(new, old)`. Either side is `None`
/// when the path does not resolve.
pub type WatchHandler = Rc<dyn Fn(Option<&Value>, Option<&Value>) -> HandlerResult>;

/// Options for [`Reactor::watch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
	/// Invoke the handler once right away with the current value as both
	/// new and old.
	pub immediate: bool,
}

impl WatchOptions {
	/// Options with `immediate` set.
	pub fn immediate() -> Self {
		Self { immediate: true }
	}
}

/// Handle returned by [`Reactor::watch`], used to unwatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

struct Watcher {
	id: WatchId,
	handler: WatchHandler,
	/// Snapshot of the value this watcher last observed
	last: Option<Value>,
}

#[derive(Default)]
struct ReactorState {
	tree: Value,
	watchers: HashMap<String, Vec<Watcher>>,
	pending: BTreeSet<String>,
	frame: Option<FrameHandle>,
	next_watch: u64,
	/// DOM listeners added by `bind`, removed on dispose
	bindings: Vec<(Element, ListenerId)>,
}

struct ReactorInner {
	state: RefCell<ReactorState>,
	scheduler: FrameScheduler,
	root: Option<Element>,
}

/// Reactive state of one mounted node. Cloning shares the state.
#[derive(Clone)]
pub struct Reactor {
	inner: Rc<ReactorInner>,
}

impl fmt::Debug for Reactor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.inner.state.borrow();
		f.debug_struct("Reactor")
			.field("tree", &state.tree)
			.field("watched_paths", &state.watchers.len())
			.field("pending", &state.pending)
			.finish()
	}
}

impl Reactor {
	/// Creates a detached reactor over `initial`.
	pub fn new(initial: Value, scheduler: FrameScheduler) -> Self {
		Self::build(initial, scheduler, None)
	}

	/// Creates a reactor attached to `root`, enabling [`Reactor::bind`].
	pub fn attached(initial: Value, scheduler: FrameScheduler, root: Element) -> Self {
		Self::build(initial, scheduler, Some(root))
	}

	fn build(initial: Value, scheduler: FrameScheduler, root: Option<Element>) -> Self {
		Self {
			inner: Rc::new(ReactorInner {
				state: RefCell::new(ReactorState {
					tree: initial,
					..ReactorState::default()
				}),
				scheduler,
				root,
			}),
		}
	}

	/// The node this reactor is attached to.
	pub fn root(&self) -> Option<&Element> {
		self.inner.root.as_ref()
	}

	/// Reads the value at `path`; `None` if any segment is missing.
	pub fn get(&self, path: &str) -> Option<Value> {
		let path = Path::parse(path);
		self.inner
			.state
			.borrow()
			.tree
			.get_path(path.segments())
			.cloned()
	}

	/// A copy of the whole tree.
	pub fn snapshot(&self) -> Value {
		self.inner.state.borrow().tree.clone()
	}

	/// Writes `value` at `path`.
	///
	/// # Returns
	///
	/// `false` if the write was a no-op because the current value is deep-equal.
	pub fn set(&self, path: &str, value: Value) -> bool {
		let path = Path::parse(path);
		{
			let mut state = self.inner.state.borrow_mut();
			let state = &mut *state;
			if deep_equal_opt(state.tree.get_path(path.segments()), Some(&value)) {
				return false;
			}
			if let Err(err) = state.tree.set_path(path.segments(), value) {
				warn_log!("write to '{}' rejected: {}", path.as_str(), err);
				return false;
			}
			mark_dirty(state, &path);
		}
		self.schedule();
		true
	}

	/// Writes every leaf of `partial` relative to the root.
	///
	/// Objects are walked recursively; anything else (including arrays) is a
	/// leaf. A non-object `partial` replaces the whole tree.
	///
	/// # Returns
	///
	/// The number of leaves that actually changed.
	pub fn patch(&self, partial: Value) -> usize {
		self.patch_at("", partial)
	}

	/// Like [`Reactor::patch`], rooted at `path`.
	pub fn patch_at(&self, path: &str, partial: Value) -> usize {
		match partial {
			Value::Object(map) => map
				.into_iter()
				.map(|(key, value)| self.patch_at(Path::join(path, &key).as_str(), value))
				.sum(),
			leaf => usize::from(self.set(path, leaf)),
		}
	}

	/// Registers `handler` for changes at `path`.
	pub fn watch<F>(&self, path: &str, handler: F, options: WatchOptions) -> WatchId
	where
		F: Fn(Option<&Value>, Option<&Value>) -> HandlerResult + 'static,
	{
		self.watch_rc(path, Rc::new(handler), options)
	}

	pub(crate) fn watch_rc(
		&self,
		path: &str,
		handler: WatchHandler,
		options: WatchOptions,
	) -> WatchId {
		let current = self.get(path);
		let id = {
			let mut state = self.inner.state.borrow_mut();
			let id = WatchId(state.next_watch);
			state.next_watch += 1;
			state
				.watchers
				.entry(path.to_string())
				.or_default()
				.push(Watcher {
					id,
					handler: Rc::clone(&handler),
					last: current.clone(),
				});
			id
		};

		if options.immediate {
			run_watcher(&handler, path, current.as_ref(), current.as_ref());
		}
		id
	}

	/// Removes a watcher. Returns false if it was already gone.
	pub fn unwatch(&self, id: WatchId) -> bool {
		let mut state = self.inner.state.borrow_mut();
		let mut removed = false;
		for watchers in state.watchers.values_mut() {
			let before = watchers.len();
			watchers.retain(|w| w.id != id);
			removed |= watchers.len() != before;
		}
		state.watchers.retain(|_, watchers| !watchers.is_empty());
		removed
	}

	/// Number of watchers on `path`.
	pub fn watcher_count(&self, path: &str) -> usize {
		self.inner
			.state
			.borrow()
			.watchers
			.get(path)
			.map(Vec::len)
			.unwrap_or(0)
	}

	/// Returns true while a flush is queued on the scheduler.
	pub fn is_scheduled(&self) -> bool {
		self.inner.state.borrow().frame.is_some()
	}

	/// Number of DOM listeners this reactor installed through `bind`.
	pub fn binding_count(&self) -> usize {
		self.inner.state.borrow().bindings.len()
	}

	/// Detaches the reactor from the page: removes its DOM listeners, drops
	/// every watcher and pending change, and cancels a queued flush.
	///
	/// Reads and writes keep working afterwards, but nothing is notified.
	pub(crate) fn dispose(&self) {
		let (bindings, frame) = {
			let mut state = self.inner.state.borrow_mut();
			state.watchers.clear();
			state.pending.clear();
			(std::mem::take(&mut state.bindings), state.frame.take())
		};
		for (element, listener) in bindings {
			element.remove_event_listener(listener);
		}
		if let Some(frame) = frame {
			self.inner.scheduler.cancel(frame);
		}
	}

	pub(super) fn track_listener(&self, element: &Element, listener: ListenerId) {
		self.inner
			.state
			.borrow_mut()
			.bindings
			.push((element.clone(), listener));
	}

	/// Dirty paths waiting for the next flush.
	pub fn pending_paths(&self) -> Vec<String> {
		self.inner.state.borrow().pending.iter().cloned().collect()
	}

	/// Delivers pending changes now instead of waiting for the frame.
	///
	/// A frame already queued for this reactor is cancelled.
	pub fn flush_now(&self) {
		let frame = self.inner.state.borrow_mut().frame.take();
		if let Some(frame) = frame {
			self.inner.scheduler.cancel(frame);
		}
		self.flush();
	}

	fn schedule(&self) {
		if self.is_scheduled() {
			return;
		}
		let weak = self.downgrade();
		let frame = self.inner.scheduler.request_frame(move || {
			if let Some(reactor) = weak.upgrade() {
				reactor.flush();
			}
		});
		self.inner.state.borrow_mut().frame = Some(frame);
	}

	fn flush(&self) {
		let pending = {
			let mut state = self.inner.state.borrow_mut();
			state.frame = None;
			std::mem::take(&mut state.pending)
		};
		debug_log!("reactor flush: {} dirty paths", pending.len());

		for raw in pending {
			let calls = {
				let mut state = self.inner.state.borrow_mut();
				let state = &mut *state;
				let Some(watchers) = state.watchers.get_mut(&raw) else {
					continue;
				};
				let current = state.tree.get_path(Path::parse(&raw).segments()).cloned();
				watchers
					.iter_mut()
					.filter(|w| !deep_equal_opt(current.as_ref(), w.last.as_ref()))
					.map(|w| {
						let old = std::mem::replace(&mut w.last, current.clone());
						(Rc::clone(&w.handler), current.clone(), old)
					})
					.collect::<Vec<_>>()
			};
			for (handler, new, old) in calls {
				run_watcher(&handler, &raw, new.as_ref(), old.as_ref());
			}
		}
	}

	pub(crate) fn downgrade(&self) -> WeakReactor {
		WeakReactor {
			inner: Rc::downgrade(&self.inner),
		}
	}
}

/// Non-owning reactor handle held by DOM listeners.
#[derive(Clone)]
pub(crate) struct WeakReactor {
	inner: Weak<ReactorInner>,
}

impl WeakReactor {
	pub(crate) fn upgrade(&self) -> Option<Reactor> {
		self.inner.upgrade().map(|inner| Reactor { inner })
	}
}

fn mark_dirty(state: &mut ReactorState, path: &Path) {
	if path.is_root() {
		let watched: Vec<String> = state.watchers.keys().cloned().collect();
		state.pending.extend(watched);
		return;
	}
	state.pending.extend(path.with_ancestors());
	let prefix = format!("{}.", path.as_str());
	let descendants: Vec<String> = state
		.watchers
		.keys()
		.filter(|watched| watched.starts_with(&prefix))
		.cloned()
		.collect();
	state.pending.extend(descendants);
}

fn run_watcher(handler: &WatchHandler, path: &str, new: Option<&Value>, old: Option<&Value>) {
	if let Err(err) = handler(new, old) {
		warn_log!("watcher on '{}' failed: {}", path, err);
	}
}
