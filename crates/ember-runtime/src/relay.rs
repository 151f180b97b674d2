//! Relay: page-wide publish/subscribe bus
//!
//! Components talk to each other through topics instead of holding references
//! to one another.
//!
//! # Design
//!
//! - **Owner-keyed**: every subscription belongs to an instance id; an owner
//!   holds at most one handler per topic, and subscribing again replaces it
//! - **Isolated delivery**: a failing handler is logged and the remaining
//!   handlers still run
//! - **Reentrant**: handlers may publish, subscribe or unsubscribe while a
//!   publish is in progress; the delivery list is fixed when publish starts

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::arc::InstanceId;
use crate::error::HandlerResult;
use crate::value::Value;
use crate::warn_log;

/// Topic handler.
pub type RelayHandler = Rc<dyn Fn(&Value) -> HandlerResult>;

/// One live subscription.
struct Subscription {
	/// Instance that owns this subscription
	owner: InstanceId,
	/// Callback invoked on publish
	handler: RelayHandler,
}

/// Publish/subscribe bus keyed by topic. Cloning shares the bus.
///
/// # Example
///
/// ```ignore
/// use ember_runtime::relay::Relay;
///
/// let relay = Relay::new();
/// relay.subscribe(owner, "cart:updated", |data| {
///     // react to data
///     Ok(())
/// });
/// relay.publish("cart:updated", &Value::from(3));
/// relay.unsubscribe(owner, None);
/// ```
#[derive(Clone, Default)]
pub struct Relay {
	topics: Rc<RefCell<HashMap<String, Vec<Subscription>>>>,
}

impl fmt::Debug for Relay {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Relay")
			.field("topics", &self.topics.borrow().len())
			.field("subscriptions", &self.subscription_count())
			.finish()
	}
}

impl Relay {
	/// Creates an empty bus.
	pub fn new() -> Self {
		Self::default()
	}

	/// Delivers `data` to every handler of `topic`.
	///
	/// # Returns
	///
	/// The number of handlers that completed without error.
	pub fn publish(&self, topic: &str, data: &Value) -> usize {
		let handlers: Vec<(InstanceId, RelayHandler)> = self
			.topics
			.borrow()
			.get(topic)
			.map(|subs| {
				subs.iter()
					.map(|s| (s.owner, Rc::clone(&s.handler)))
					.collect()
			})
			.unwrap_or_default();

		let mut delivered = 0;
		for (owner, handler) in handlers {
			match handler(data) {
				Ok(()) => delivered += 1,
				Err(err) => warn_log!("relay handler of {} on '{}' failed: {}", owner, topic, err),
			}
		}
		delivered
	}

	/// Registers `handler` for `topic` on behalf of `owner`.
	///
	/// An existing handler of the same owner on the same topic is replaced in place.
	pub fn subscribe<F>(&self, owner: InstanceId, topic: &str, handler: F)
	where
		F: Fn(&Value) -> HandlerResult + 'static,
	{
		let handler: RelayHandler = Rc::new(handler);
		let mut topics = self.topics.borrow_mut();
		let subs = topics.entry(topic.to_string()).or_default();
		match subs.iter_mut().find(|s| s.owner == owner) {
			Some(existing) => existing.handler = handler,
			None => subs.push(Subscription { owner, handler }),
		}
	}

	/// Removes `owner`'s handler from `topic`, or from every topic when `topic` is `None`.
	///
	/// # Returns
	///
	/// The number of subscriptions removed.
	pub fn unsubscribe(&self, owner: InstanceId, topic: Option<&str>) -> usize {
		let mut topics = self.topics.borrow_mut();
		let mut removed = 0;
		match topic {
			Some(topic) => {
				if let Some(subs) = topics.get_mut(topic) {
					let before = subs.len();
					subs.retain(|s| s.owner != owner);
					removed = before - subs.len();
				}
			}
			None => {
				for subs in topics.values_mut() {
					let before = subs.len();
					subs.retain(|s| s.owner != owner);
					removed += before - subs.len();
				}
			}
		}
		topics.retain(|_, subs| !subs.is_empty());
		removed
	}

	/// Number of handlers registered for `topic`.
	pub fn handler_count(&self, topic: &str) -> usize {
		self.topics.borrow().get(topic).map(Vec::len).unwrap_or(0)
	}

	/// Total number of subscriptions across all topics.
	pub fn subscription_count(&self) -> usize {
		self.topics.borrow().values().map(Vec::len).sum()
	}

	/// Returns true if `owner` has a handler on `topic`.
	pub fn is_subscribed(&self, owner: InstanceId, topic: &str) -> bool {
		self.topics
			.borrow()
			.get(topic)
			.is_some_and(|subs| subs.iter().any(|s| s.owner == owner))
	}

	/// Returns a view of this bus scoped to `owner`.
	pub fn scoped(&self, owner: InstanceId) -> ScopedRelay {
		ScopedRelay {
			relay: self.clone(),
			owner,
		}
	}
}

/// Relay bindings of one mounted instance: subscriptions made through it are
/// owned by that instance and go away when the instance is released.
#[derive(Clone, Debug)]
pub struct ScopedRelay {
	relay: Relay,
	owner: InstanceId,
}

impl ScopedRelay {
	/// The owning instance.
	pub fn owner(&self) -> InstanceId {
		self.owner
	}

	/// Subscribes the owning instance to `topic`.
	pub fn subscribe<F>(&self, topic: &str, handler: F)
	where
		F: Fn(&Value) -> HandlerResult + 'static,
	{
		self.relay.subscribe(self.owner, topic, handler);
	}

	/// Unsubscribes the owning instance from `topic`, or from everything.
	pub fn unsubscribe(&self, topic: Option<&str>) -> usize {
		self.relay.unsubscribe(self.owner, topic)
	}

	/// Publishes on the shared bus.
	pub fn publish(&self, topic: &str, data: &Value) -> usize {
		self.relay.publish(topic, data)
	}
}
