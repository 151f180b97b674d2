//! Store: page-wide key/value cells.
//!
//! Every `set` publishes `store:<key>` on the [`Relay`] with the new value,
//! even when the value did not change. Consumers that only care about real
//! changes compare values themselves (or bind through a Data Reactor, whose
//! watchers are equality-gated).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::relay::Relay;
use crate::value::Value;

/// Prefix of the topic published on every write.
pub const STORE_TOPIC_PREFIX: &str = "store:";

/// Returns the relay topic published when `key` is written.
pub fn store_topic(key: &str) -> String {
	format!("{}{}", STORE_TOPIC_PREFIX, key)
}

/// Shared key/value store. Cloning shares the cells.
#[derive(Clone, Debug)]
pub struct Store {
	cells: Rc<RefCell<HashMap<String, Value>>>,
	relay: Relay,
}

impl Store {
	/// Creates an empty store publishing on `relay`.
	pub fn new(relay: Relay) -> Self {
		Self {
			cells: Rc::new(RefCell::new(HashMap::new())),
			relay,
		}
	}

	/// Reads a cell; `None` if it was never written.
	pub fn get(&self, key: &str) -> Option<Value> {
		self.cells.borrow().get(key).cloned()
	}

	/// Writes a cell, then publishes `store:<key>` with the new value.
	pub fn set(&self, key: &str, value: Value) {
		self.cells.borrow_mut().insert(key.to_string(), value.clone());
		self.relay.publish(&store_topic(key), &value);
	}

	/// Number of written cells.
	pub fn len(&self) -> usize {
		self.cells.borrow().len()
	}

	/// Returns true if no cell was written.
	pub fn is_empty(&self) -> bool {
		self.cells.borrow().is_empty()
	}
}
