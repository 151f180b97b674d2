//! Content-addressed registries
//!
//! A [`Registry`] maps exact body strings to short opaque ids. Identity is
//! exact string equality: two JSON payloads that differ only in key order
//! are different entries. Ids are unique within one registry; function and
//! data registries are independent id spaces.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::settings::IdStrategy;

/// Length of a minted id.
pub const ID_LEN: usize = 8;

/// Namespace for content-derived ids.
const CONTENT_NAMESPACE: Uuid = Uuid::from_u128(0x6c8e_29f1_3b0d_4f57_a2e4_91c3_5d7b_0e16);

/// One registered body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
	/// Minted id.
	pub id: String,
	/// Exact body text.
	pub body: String,
}

/// Append-only map from body text to id, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
	by_body: HashMap<String, usize>,
	ids: HashSet<String>,
	entries: Vec<Entry>,
	strategy: IdStrategy,
}

impl Registry {
	/// Creates an empty registry minting ids with `strategy`.
	pub fn new(strategy: IdStrategy) -> Self {
		Self {
			strategy,
			..Self::default()
		}
	}

	/// Returns the id of `body`, minting one on first sight.
	pub fn intern(&mut self, body: &str) -> String {
		if let Some(&index) = self.by_body.get(body) {
			return self.entries[index].id.clone();
		}
		let id = self.mint(body);
		tracing::debug!(id = %id, len = body.len(), "registered new body");
		self.ids.insert(id.clone());
		self.by_body.insert(body.to_string(), self.entries.len());
		self.entries.push(Entry {
			id: id.clone(),
			body: body.to_string(),
		});
		id
	}

	/// The id of `body`, if registered.
	pub fn id_of(&self, body: &str) -> Option<&str> {
		self.by_body
			.get(body)
			.map(|&index| self.entries[index].id.as_str())
	}

	/// Entries in registration order.
	pub fn entries(&self) -> &[Entry] {
		&self.entries
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true if nothing is registered.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Drops every entry.
	pub fn clear(&mut self) {
		self.by_body.clear();
		self.ids.clear();
		self.entries.clear();
	}

	fn mint(&self, body: &str) -> String {
		match self.strategy {
			IdStrategy::Random => loop {
				let id = short_id(Uuid::new_v4());
				if !self.ids.contains(&id) {
					return id;
				}
			},
			IdStrategy::Content => {
				let uuid = Uuid::new_v5(&CONTENT_NAMESPACE, body.as_bytes());
				let id = short_id(uuid);
				if self.ids.contains(&id) {
					// Truncation collided with another body; the full form is unique.
					uuid.simple().to_string()
				} else {
					id
				}
			}
		}
	}
}

fn short_id(uuid: Uuid) -> String {
	let mut id = uuid.simple().to_string();
	id.truncate(ID_LEN);
	id
}
