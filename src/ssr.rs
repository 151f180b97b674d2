//! Server-side registration engine
//!
//! This module provides access to ember-ssr: content-addressed registration
//! of hydration functions and data payloads, bootstrap serialization and
//! HTML injection.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ember::ssr::{HydrationEngine, HydrationSettings};
//!
//! let mut engine = HydrationEngine::new(HydrationSettings::default());
//! let reg = engine.register("function(el){el.hidden=false}", None);
//! let page = engine.inject(Some("<body></body>"));
//! ```

pub use ember_ssr::*;
