//! Ember SSR - server half of selective hydration
//!
//! Collects the hydration functions and data payloads a page uses during
//! rendering, deduplicates them by exact string content, and serializes the
//! unique ones into a single bootstrap script placed before `</body>`.
//!
//! ## Architecture
//!
//! - [`engine`]: [`HydrationEngine`] and the thread-scoped [`RenderPass`]
//! - [`registry`]: content-addressed body → id maps
//! - [`markers`]: marker attributes for hydrated elements
//! - [`script`]: bootstrap script writer (inline and asset mode)
//! - [`inject`](mod@inject): placing the script into HTML
//! - [`known`]: predicate over ids the client already holds
//! - [`asset`]: the runtime served as a cached asset
//! - [`settings`]: [`HydrationSettings`] (TOML or builder)
//!
//! ## Example
//!
//! ```
//! use ember_ssr::{HydrationSettings, RenderPass, register};
//!
//! let pass = RenderPass::begin(HydrationSettings::default())?;
//! let reg = register("function(el){el.hidden=false}", None)?;
//! let html = format!("<body><nav {}></nav></body>", reg.to_attr_string(&HydrationSettings::default()));
//! let page = pass.finish(Some(&html))?;
//! assert!(page.contains("</script></body>"));
//! # Ok::<(), ember_ssr::EngineError>(())
//! ```

pub mod asset;
pub mod engine;
pub mod error;
pub mod inject;
pub mod known;
pub mod markers;
pub mod registry;
pub mod script;
pub mod settings;

pub use asset::{RUNTIME_CACHE_CONTROL, RuntimeAsset, content_type_for};
pub use engine::{
	HydrationEngine, RenderPass, flush, flush_with, inject, inject_with, is_active, register,
	reset, with_engine,
};
pub use error::{EngineError, Result};
pub use inject::inject_script;
pub use known::{KnownFn, KnownIds, NoKnownIds};
pub use markers::{Registration, html_escape_attr};
pub use registry::{Entry, Registry};
pub use script::BootstrapWriter;
pub use settings::{CacheStorage, HydrationSettings, IdStrategy, RuntimeAssetSettings};
