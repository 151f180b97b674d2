//! Registration engine and render-pass lifecycle
//!
//! A [`HydrationEngine`] accumulates the hydration functions and data
//! payloads used while rendering one page and serializes them once at the
//! end. It is an explicit value: create one per render pass, or call
//! [`HydrationEngine::reset`] between passes, so payloads never leak from one
//! request into another.
//!
//! For render code that cannot thread the engine through, a [`RenderPass`]
//! installs an engine for the current thread and the free functions
//! ([`register`], [`flush`], [`inject`]) reach it. Outside a pass they fail
//! with [`EngineError::NoActiveContext`].
//!
//! ## Example
//!
//! ```
//! use ember_ssr::{HydrationEngine, HydrationSettings};
//!
//! let mut engine = HydrationEngine::new(HydrationSettings::default());
//! let reg = engine.register("function(el,data){el.title=data.t}", Some(r#"{"t":"hi"}"#));
//! let html = format!("<body><div {}></div></body>", reg.to_attr_string(engine.settings()));
//! let page = engine.inject(Some(&html));
//! assert!(page.contains("<script>"));
//! ```

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::error::{EngineError, Result};
use crate::inject::inject_script;
use crate::known::{KnownIds, NoKnownIds};
use crate::markers::Registration;
use crate::registry::{Entry, Registry};
use crate::script::BootstrapWriter;
use crate::settings::{HydrationSettings, IdStrategy};

/// Function and data registries of one render pass.
#[derive(Debug, Clone)]
pub struct HydrationEngine {
	settings: HydrationSettings,
	functions: Registry,
	data: Registry,
}

impl Default for HydrationEngine {
	fn default() -> Self {
		Self::new(HydrationSettings::default())
	}
}

impl HydrationEngine {
	/// Creates an empty engine.
	pub fn new(settings: HydrationSettings) -> Self {
		Self {
			functions: Registry::new(settings.id_strategy),
			data: Registry::new(settings.id_strategy),
			settings,
		}
	}

	/// The engine settings.
	pub fn settings(&self) -> &HydrationSettings {
		&self.settings
	}

	/// Registers a function body and optional data payload.
	///
	/// Identical strings always yield identical ids; `None` data yields no
	/// data id and leaves the data registry untouched. Data is never parsed.
	pub fn register(&mut self, function_body: &str, data: Option<&str>) -> Registration {
		let function_id = self.functions.intern(function_body);
		let data_id = data.map(|payload| self.data.intern(payload));
		Registration {
			function_id,
			data_id,
		}
	}

	/// Renders the bootstrap for everything registered so far.
	pub fn flush(&self) -> String {
		self.render(&NoKnownIds)
	}

	/// Like [`HydrationEngine::flush`], omitting bodies the client already holds.
	///
	/// Known ids only match across render passes under
	/// [`IdStrategy::Content`]; with random ids every body is sent anyway.
	pub fn flush_with(&self, known: &dyn KnownIds) -> String {
		if self.settings.id_strategy == IdStrategy::Random && !self.is_empty() {
			tracing::warn!(
				"known ids given with id_strategy = \"random\"; ids differ per pass, so no body is omitted"
			);
		}
		self.render(known)
	}

	fn render(&self, known: &dyn KnownIds) -> String {
		let script = BootstrapWriter::new(&self.settings, known)
			.write(self.functions.entries(), self.data.entries());
		if !script.is_empty() {
			tracing::info!(
				functions = self.functions.len(),
				data = self.data.len(),
				bytes = script.len(),
				"flushed hydration bootstrap"
			);
		}
		script
	}

	/// Places the bootstrap before `</body>` of `html`, or appends it.
	///
	/// With `html` of `None` the result is the bootstrap alone.
	pub fn inject(&self, html: Option<&str>) -> String {
		self.inject_with(html, &NoKnownIds)
	}

	/// Like [`HydrationEngine::inject`], omitting bodies the client already holds.
	pub fn inject_with(&self, html: Option<&str>, known: &dyn KnownIds) -> String {
		inject_script(html, &self.flush_with(known))
	}

	/// Clears both registries.
	pub fn reset(&mut self) {
		tracing::debug!(
			functions = self.functions.len(),
			data = self.data.len(),
			"resetting hydration registries"
		);
		self.functions.clear();
		self.data.clear();
	}

	/// Registered function bodies in registration order.
	pub fn functions(&self) -> &[Entry] {
		self.functions.entries()
	}

	/// Registered data payloads in registration order.
	pub fn data(&self) -> &[Entry] {
		self.data.entries()
	}

	/// Number of unique function bodies.
	pub fn function_count(&self) -> usize {
		self.functions.len()
	}

	/// Number of unique data payloads.
	pub fn data_count(&self) -> usize {
		self.data.len()
	}

	/// Returns true if nothing is registered.
	pub fn is_empty(&self) -> bool {
		self.functions.is_empty() && self.data.is_empty()
	}
}

thread_local! {
	static ACTIVE: RefCell<Option<HydrationEngine>> = const { RefCell::new(None) };
}

/// Guard of the render pass active on the current thread.
///
/// Dropping it discards the pass's registries.
#[derive(Debug)]
pub struct RenderPass {
	// Tied to the thread that began it.
	_not_send: PhantomData<*const ()>,
}

impl RenderPass {
	/// Starts a render pass on the current thread.
	///
	/// # Errors
	///
	/// [`EngineError::PassAlreadyActive`] if this thread is already in a pass.
	pub fn begin(settings: HydrationSettings) -> Result<Self> {
		ACTIVE.with(|active| {
			let mut active = active
				.try_borrow_mut()
				.map_err(|_| EngineError::PassAlreadyActive)?;
			if active.is_some() {
				return Err(EngineError::PassAlreadyActive);
			}
			*active = Some(HydrationEngine::new(settings));
			tracing::debug!("render pass started");
			Ok(Self {
				_not_send: PhantomData,
			})
		})
	}

	/// Injects the bootstrap into `html` and ends the pass.
	pub fn finish(self, html: Option<&str>) -> Result<String> {
		inject(html)
	}
}

impl Drop for RenderPass {
	fn drop(&mut self) {
		let _ = ACTIVE.try_with(|active| {
			if let Ok(mut active) = active.try_borrow_mut() {
				active.take();
			}
		});
		tracing::debug!("render pass ended");
	}
}

/// Runs `f` against the engine of the active render pass.
///
/// # Errors
///
/// [`EngineError::NoActiveContext`] outside a pass, or when called from
/// inside another `with_engine` closure.
pub fn with_engine<R>(f: impl FnOnce(&mut HydrationEngine) -> R) -> Result<R> {
	ACTIVE.with(|active| {
		let mut active = active
			.try_borrow_mut()
			.map_err(|_| EngineError::NoActiveContext)?;
		active.as_mut().map(f).ok_or(EngineError::NoActiveContext)
	})
}

/// Returns true while a render pass is active on this thread.
pub fn is_active() -> bool {
	ACTIVE.with(|active| active.try_borrow().is_ok_and(|a| a.is_some()))
}

/// Registers with the active engine. See [`HydrationEngine::register`].
pub fn register(function_body: &str, data: Option<&str>) -> Result<Registration> {
	with_engine(|engine| engine.register(function_body, data))
}

/// Flushes the active engine. See [`HydrationEngine::flush`].
pub fn flush() -> Result<String> {
	with_engine(|engine| engine.flush())
}

/// Flushes the active engine omitting known bodies.
pub fn flush_with(known: &dyn KnownIds) -> Result<String> {
	with_engine(|engine| engine.flush_with(known))
}

/// Injects the active engine's bootstrap. See [`HydrationEngine::inject`].
pub fn inject(html: Option<&str>) -> Result<String> {
	with_engine(|engine| engine.inject(html))
}

/// Injects the active engine's bootstrap omitting known bodies.
pub fn inject_with(html: Option<&str>, known: &dyn KnownIds) -> Result<String> {
	with_engine(|engine| engine.inject_with(html, known))
}

/// Clears the active engine's registries.
pub fn reset() -> Result<()> {
	with_engine(HydrationEngine::reset)
}
