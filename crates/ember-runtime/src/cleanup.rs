//! Mutation cleanup walker
//!
//! Removal records are the only trigger for releasing instances. Every
//! removed subtree is walked in full: a removed root may contain descendants
//! that were mounted independently and carry their own instance ids.
//!
//! For each node carrying an instance id, in order:
//!
//! 1. run its unmount hook (failures are logged)
//! 2. drop all of its relay subscriptions
//! 3. release it from the [`RefController`], which also removes the
//!    listeners its reactor bound
//! 4. drop the listeners left on the node itself
//! 5. clear the id from the node
//!
//! Records may be delivered more than once for the same node; the id is
//! cleared on the first pass and [`RefController::release`] is total, so a
//! repeat visit does nothing.

use crate::arc::RefController;
use crate::dom::{Element, MutationRecord};
use crate::relay::Relay;
use crate::{debug_log, warn_log};

/// Releases instances of removed subtrees.
#[derive(Debug, Clone)]
pub struct CleanupWalker {
	relay: Relay,
	arc: RefController,
}

impl CleanupWalker {
	pub(crate) fn new(relay: Relay, arc: RefController) -> Self {
		Self { relay, arc }
	}

	/// Processes a batch of removal records.
	///
	/// # Returns
	///
	/// The number of instances released.
	pub fn process(&self, records: &[MutationRecord]) -> usize {
		records
			.iter()
			.flat_map(|record| record.removed.iter())
			.map(|root| self.walk(root))
			.sum()
	}

	/// Cleans up `node` and all of its descendants.
	pub fn walk(&self, node: &Element) -> usize {
		let mut released = 0;
		if let Some(id) = node.instance_id() {
			if let Some(Err(err)) = node.run_unmount_hook() {
				warn_log!("unmount hook of {} failed: {}", id, err);
			}
			self.relay.unsubscribe(id, None);
			if self.arc.release(id) {
				released += 1;
			}
			node.clear_listeners();
			node.set_instance_id(None);
			node.clear_hooks();
			if let Some(attr) = &self.arc.config().instance_attr {
				node.remove_attribute(attr);
			}
			debug_log!("cleaned up {}", id);
		}
		released
			+ node
				.children()
				.iter()
				.map(|child| self.walk(child))
				.sum::<usize>()
	}
}
