//! Utility surface handed to every hydration function.

use crate::dom::Event;
use crate::relay::Relay;
use crate::scheduler::FrameScheduler;
use crate::store::Store;
use crate::value::{Value, deep_equal};

/// Shared helpers and page-wide services. Cloning shares the services.
#[derive(Clone, Debug)]
pub struct Toolkit {
	relay: Relay,
	store: Store,
	scheduler: FrameScheduler,
}

impl Toolkit {
	pub(crate) fn new(relay: Relay, store: Store, scheduler: FrameScheduler) -> Self {
		Self {
			relay,
			store,
			scheduler,
		}
	}

	/// The page store.
	pub fn store(&self) -> &Store {
		&self.store
	}

	/// The page relay, unscoped.
	pub fn relay(&self) -> &Relay {
		&self.relay
	}

	/// Deep equality as used by the reactor's change gate.
	pub fn equal(&self, a: &Value, b: &Value) -> bool {
		deep_equal(a, b)
	}

	/// Deep copy of `value`. Opaque values are shared, not copied.
	pub fn clone_value(&self, value: &Value) -> Value {
		value.clone()
	}

	/// Builds an event carrying `detail`, ready for `Element::dispatch_event`.
	pub fn create_event(&self, kind: &str, detail: Value) -> Event {
		Event::with_detail(kind, detail)
	}

	/// Runs `callback` on the next frame.
	pub fn request_frame<F>(&self, callback: F)
	where
		F: FnOnce() + 'static,
	{
		self.scheduler.request_frame(callback);
	}
}
