//! # Ember
//!
//! Selective hydration for server-rendered markup.
//!
//! Ember attaches small, scoped behaviors and reactive state to specific
//! nodes of a page that was rendered on the server, without shipping a
//! client framework. It has two halves:
//!
//! - [`ssr`]: the registration engine. During rendering it collects
//!   hydration functions and data payloads, deduplicates them by exact
//!   content, and emits one bootstrap script per page.
//! - [`runtime`]: the client runtime. It mounts those functions onto the
//!   marked nodes with a per-node reactive store and relay scope, and
//!   releases everything exactly once when a node leaves the document.
//!
//! ## Feature Flags
//!
//! - `ssr` (default) - Registration engine
//! - `runtime` (default) - Client runtime
//!
//! ## Example
//!
//! ```rust,ignore
//! use ember::ssr::{HydrationSettings, RenderPass, register};
//!
//! let pass = RenderPass::begin(HydrationSettings::default())?;
//! let reg = register("function(el,data){el.value=data.q}", Some(r#"{"q":""}"#))?;
//! let body = format!("<body><input {}></body>", reg.to_attr_string(&HydrationSettings::default()));
//! let page = pass.finish(Some(&body))?;
//! ```

#[cfg(feature = "runtime")]
pub mod runtime;
#[cfg(feature = "ssr")]
pub mod ssr;
