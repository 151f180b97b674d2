//! Ids the client already holds.
//!
//! The caller decides which ids a returning client has cached (typically
//! from a cookie of recently seen ids); the bootstrap writer only asks
//! whether an id is known and omits its body if so.

use std::collections::{BTreeSet, HashSet};

/// Predicate over ids already cached by the client.
pub trait KnownIds {
	/// Returns true if the client already holds the body of `id`.
	fn is_known(&self, id: &str) -> bool;
}

/// No id is known. Every body is sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoKnownIds;

impl KnownIds for NoKnownIds {
	fn is_known(&self, _id: &str) -> bool {
		false
	}
}

impl KnownIds for HashSet<String> {
	fn is_known(&self, id: &str) -> bool {
		self.contains(id)
	}
}

impl KnownIds for BTreeSet<String> {
	fn is_known(&self, id: &str) -> bool {
		self.contains(id)
	}
}

impl KnownIds for [String] {
	fn is_known(&self, id: &str) -> bool {
		self.iter().any(|known| known == id)
	}
}

impl KnownIds for Vec<String> {
	fn is_known(&self, id: &str) -> bool {
		self.as_slice().is_known(id)
	}
}

impl<T: KnownIds + ?Sized> KnownIds for &T {
	fn is_known(&self, id: &str) -> bool {
		(**self).is_known(id)
	}
}

/// Adapts a closure into a [`KnownIds`] predicate.
///
/// # Example
///
/// ```
/// use ember_ssr::{KnownFn, KnownIds};
///
/// let known = KnownFn(|id: &str| id.starts_with("a"));
/// assert!(known.is_known("a1b2c3d4"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct KnownFn<F>(pub F);

impl<F> KnownIds for KnownFn<F>
where
	F: Fn(&str) -> bool,
{
	fn is_known(&self, id: &str) -> bool {
		(self.0)(id)
	}
}
