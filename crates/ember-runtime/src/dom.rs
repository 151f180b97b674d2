//! DOM abstraction layer
//!
//! [`Document`] and [`Element`] are cheap handles with one API over two
//! backends:
//!
//! | Target | Backend | Removal records |
//! |--------|---------|-----------------|
//! | `wasm32` | the page's `web-sys` nodes | `MutationObserver` batches |
//! | other | in-memory tree | queued by `remove` / `remove_children` |
//!
//! Both keep per-node slots for lifecycle hooks, the instance id, relay
//! bindings and the listeners added through `Element::add_event_listener`.
//! User callbacks are never invoked while backend state is borrowed, so
//! listeners and hooks may freely mutate the document.
//!
//! Removals reach the runtime as [`MutationRecord`] batches drained with
//! `Document::take_mutations`, mirroring a document-level mutation observer.

#[cfg(not(target_arch = "wasm32"))]
mod memory;
#[cfg(not(target_arch = "wasm32"))]
mod selector;
#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(not(target_arch = "wasm32"))]
pub use memory::{Document, Element};
#[cfg(not(target_arch = "wasm32"))]
pub use selector::Selector;
#[cfg(target_arch = "wasm32")]
pub use web::{Document, Element};
#[cfg(target_arch = "wasm32")]
pub(crate) use web::{describe_js_error, js_to_value, value_to_js};

use std::rc::Rc;

use crate::arc::InstanceId;
use crate::error::HandlerResult;
use crate::value::Value;

/// Event listener callback.
pub type Listener = Rc<dyn Fn(&Event)>;

/// Lifecycle hook callback (mount / unmount).
pub type Hook = Rc<dyn Fn() -> HandlerResult>;

/// Identity of a node within its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

/// Handle of a listener added through `Element::add_event_listener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// A DOM event.
#[derive(Debug, Clone)]
pub struct Event {
	kind: String,
	detail: Value,
}

impl Event {
	/// Creates an event of the given type with a `null` detail.
	pub fn new(kind: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			detail: Value::Null,
		}
	}

	/// Creates a custom event carrying `detail`.
	pub fn with_detail(kind: impl Into<String>, detail: Value) -> Self {
		Self {
			kind: kind.into(),
			detail,
		}
	}

	/// The event type, e.g. `input`.
	pub fn kind(&self) -> &str {
		&self.kind
	}

	/// The custom detail payload.
	pub fn detail(&self) -> &Value {
		&self.detail
	}
}

/// A batch of removals observed on the document.
#[derive(Debug, Clone)]
pub struct MutationRecord {
	/// Roots of the removed subtrees.
	pub removed: Vec<Element>,
}

/// Runtime bookkeeping attached to one node.
#[derive(Default)]
pub(crate) struct NodeSlots {
	pub(crate) on_mount: Option<Hook>,
	pub(crate) on_unmount: Option<Hook>,
	pub(crate) instance: Option<InstanceId>,
	pub(crate) relay_bound: bool,
}

#[cfg(target_arch = "wasm32")]
impl NodeSlots {
	/// True when nothing is recorded, so the slot can be dropped.
	pub(crate) fn is_vacant(&self) -> bool {
		self.on_mount.is_none()
			&& self.on_unmount.is_none()
			&& self.instance.is_none()
			&& !self.relay_bound
	}
}
