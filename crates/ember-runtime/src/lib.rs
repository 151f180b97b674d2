//! Ember Runtime - client half of selective hydration
//!
//! Mounts server-registered hydration functions onto the DOM nodes that carry
//! their marker attributes, gives every mounted node reactive state and a
//! relay scope, and releases everything exactly once when the node leaves
//! the document.
//!
//! ## Architecture
//!
//! - [`value`]: JSON-like value tree with deep equality
//! - [`path`]: cached dot-path parsing
//! - [`dom`]: document handles over the browser DOM (`wasm32`) or an
//!   in-memory tree, with removal records
//! - [`scheduler`]: animation-frame queue
//! - [`relay`]: owner-keyed publish/subscribe bus
//! - [`store`]: page-wide key/value cells publishing `store:<key>`
//! - [`reactor`]: per-node reactive state, watchers and form binding
//! - [`arc`]: function/data tables, instance records, reference counting
//! - [`cleanup`]: release of removed subtrees
//! - [`runtime`]: the page runtime tying it together
//! - `browser` (`wasm32` only): the `install` export wiring a runtime to
//!   `window`, `requestAnimationFrame` and a `MutationObserver`
//!
//! ## Example
//!
//! ```ignore
//! use ember_runtime::{Document, Runtime, RuntimeConfig, hydrate_fn, Value};
//!
//! let runtime = Runtime::new(document, RuntimeConfig::default());
//! let counter = hydrate_fn(|ctx| {
//!     let reactor = ctx.reactor().clone();
//!     ctx.relay().subscribe("counter:reset", move |_| {
//!         reactor.set("count", Value::from(0));
//!         Ok(())
//!     });
//!     Ok(())
//! });
//! runtime.spark(vec![("a1b2c3d4".to_string(), counter)], Vec::new());
//! ```

pub mod arc;
#[cfg(target_arch = "wasm32")]
pub mod browser;
pub mod cleanup;
pub mod config;
pub mod dom;
pub mod error;
pub mod logging;
pub mod path;
pub mod reactor;
pub mod relay;
pub mod runtime;
pub mod scheduler;
pub mod store;
pub mod toolkit;
pub mod value;

#[doc(hidden)]
pub use tracing as __tracing;

pub use arc::{HydrateFn, InstanceId, MountContext, RefController, VmRecord, hydrate_fn};
pub use cleanup::CleanupWalker;
pub use config::RuntimeConfig;
pub use dom::{Document, Element, Event, ListenerId, MutationRecord};
pub use error::{HandlerResult, HydrateError, RuntimeError};
pub use reactor::{BindOptions, Reactor, WatchId, WatchOptions};
pub use relay::{Relay, ScopedRelay};
pub use runtime::Runtime;
pub use scheduler::{FrameHandle, FrameScheduler};
pub use store::Store;
pub use toolkit::Toolkit;
pub use value::{Opaque, Value};
