//! Client hydration runtime
//!
//! This module provides access to ember-runtime: the Relay, Store, Data
//! Reactor, reference controller and mutation cleanup walker, running over
//! an in-memory document model.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ember::runtime::{Document, Runtime, RuntimeConfig, hydrate_fn};
//!
//! let runtime = Runtime::new(Document::new(), RuntimeConfig::default());
//! runtime.spark(vec![("f1".to_string(), hydrate_fn(|_| Ok(())))], Vec::new());
//! ```

pub use ember_runtime::*;
