//! Dot-path parsing.
//!
//! Paths such as `user.address.city` are split into segments once and cached
//! per thread, so repeated `get`/`set`/`watch` calls on the same path do not
//! re-split the string. The cache holds at most [`PATH_CACHE_CAPACITY`]
//! entries; once full, new paths are parsed without being stored.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Maximum number of parsed paths kept per thread.
pub const PATH_CACHE_CAPACITY: usize = 256;

thread_local! {
	static PATH_CACHE: RefCell<HashMap<String, Path>> = RefCell::new(HashMap::new());
}

/// A parsed dot-path. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
	raw: Rc<str>,
	segments: Rc<[String]>,
}

impl Path {
	/// Returns the parsed form of `raw`, reusing a cached parse if present.
	///
	/// The empty string is the root path and has no segments.
	pub fn parse(raw: &str) -> Self {
		if let Some(hit) = PATH_CACHE.with(|cache| cache.borrow().get(raw).cloned()) {
			return hit;
		}

		let path = Self::split(raw);
		PATH_CACHE.with(|cache| {
			let mut cache = cache.borrow_mut();
			if cache.len() < PATH_CACHE_CAPACITY {
				cache.insert(raw.to_string(), path.clone());
			}
		});
		path
	}

	/// Builds the path of `key` under `parent`. Joined paths are not cached.
	pub fn join(parent: &str, key: &str) -> Self {
		if parent.is_empty() {
			Self::split(key)
		} else {
			Self::split(&format!("{}.{}", parent, key))
		}
	}

	fn split(raw: &str) -> Self {
		let segments: Rc<[String]> = if raw.is_empty() {
			Rc::from(Vec::new())
		} else {
			raw.split('.').map(str::to_string).collect::<Vec<_>>().into()
		};
		Self {
			raw: Rc::from(raw),
			segments,
		}
	}

	/// The original dotted string.
	pub fn as_str(&self) -> &str {
		&self.raw
	}

	/// The split segments.
	pub fn segments(&self) -> &[String] {
		&self.segments
	}

	/// Returns true for the root path.
	pub fn is_root(&self) -> bool {
		self.segments.is_empty()
	}

	/// This path followed by each proper ancestor, nearest first.
	///
	/// `a.b.c` yields `a.b.c`, `a.b`, `a`. The root path yields nothing.
	pub fn with_ancestors(&self) -> Vec<String> {
		(1..=self.segments.len())
			.rev()
			.map(|len| self.segments[..len].join("."))
			.collect()
	}
}
