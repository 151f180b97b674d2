//! Bootstrap script writer
//!
//! Serializes the registries of one render pass into a single inline
//! script:
//!
//! ```text
//! (function(d,w){
//!   g = w.<global>, c = g.c          // body cache: c.f functions, c.d payloads
//!   s = w.localStorage               // or sessionStorage, or none
//!   F = { id: function body, .. }    // bodies the client does not know yet
//!   D = { id: "json text", .. }
//!   I = [ every function id of the pass ]
//!   X = [ every data id of the pass ]
//!   copy F, D into c and persist them to s under "<global>:f:<id>" / ":d:"
//!   for each id of I, X missing from c: restore it from s, else push it to g.m
//!   inline: for each id in I, each [fn-attr="id"] node:
//!             try { c.f[id](node, JSON.parse(c.d[node data-attr]) or {}) } catch {}
//!   asset:  once the ready flag is set (or the ready event fires):
//!             g.spark({ id: c.f[id] for I }, { id: c.d[id] for X })
//! })(document,window)
//! ```
//!
//! Bodies of known ids are left out of `F`/`D`; the client finds them in
//! the in-memory cache when the page was not reloaded, or in web storage
//! after a full page load. Ids found in neither are listed in `g.m` so the
//! page can tell its known-ids source to forget them. Payloads stay JSON
//! text and are parsed inside the per-node guard, so a broken payload only
//! fails its own node.

use std::fmt::Write;

use crate::asset::RuntimeAsset;
use crate::known::KnownIds;
use crate::registry::Entry;
use crate::settings::HydrationSettings;

/// Writes bootstrap scripts for one set of settings.
pub struct BootstrapWriter<'a> {
	settings: &'a HydrationSettings,
	known: &'a dyn KnownIds,
}

impl<'a> BootstrapWriter<'a> {
	/// Creates a writer omitting bodies for which `known` holds.
	pub fn new(settings: &'a HydrationSettings, known: &'a dyn KnownIds) -> Self {
		Self { settings, known }
	}

	/// Renders the script tags for `functions` and `data`.
	///
	/// # Returns
	///
	/// An empty string when both are empty and `always_on` is off.
	pub fn write(&self, functions: &[Entry], data: &[Entry]) -> String {
		if functions.is_empty() && data.is_empty() && !self.settings.always_on {
			return String::new();
		}

		let mut js = String::from("(function(d,w){");
		self.write_tables(&mut js, functions, data);
		self.write_restore(&mut js);
		match &self.settings.runtime_asset {
			Some(asset) => write_activation(&mut js, &asset.ready_flag, &asset.ready_event),
			None => self.write_runner(&mut js),
		}
		js.push_str("})(document,window);");

		let mut out = String::new();
		if let Some(asset) = &self.settings.runtime_asset {
			out.push_str(&RuntimeAsset::new(asset.url.clone()).script_tag(self.settings));
		}
		let _ = write!(out, "<script>{}</script>", escape_script_text(&js));
		out
	}

	fn write_tables(&self, js: &mut String, functions: &[Entry], data: &[Entry]) {
		let global = js_string(&self.settings.global_name);
		let _ = write!(
			js,
			"var g=w[{g}]=w[{g}]||{{}},c=g.c=g.c||{{f:{{}},d:{{}}}},s=null,\
			P={p},k,F={{",
			g = global,
			p = js_string(&format!("{}:", self.settings.global_name)),
		);
		let fresh_functions = functions.iter().filter(|e| !self.known.is_known(&e.id));
		for (i, entry) in fresh_functions.enumerate() {
			let sep = if i == 0 { "" } else { "," };
			let _ = write!(js, "{}{}:({})", sep, js_string(&entry.id), entry.body);
		}
		js.push_str("},D={");
		let fresh_data = data.iter().filter(|e| !self.known.is_known(&e.id));
		for (i, entry) in fresh_data.enumerate() {
			let sep = if i == 0 { "" } else { "," };
			let _ = write!(js, "{}{}:{}", sep, js_string(&entry.id), js_string(&entry.body));
		}
		js.push_str("},I=");
		write_id_list(js, functions);
		js.push_str(",X=");
		write_id_list(js, data);
		js.push(';');
	}

	/// Copies fresh bodies into the cache and storage, then fills known ids
	/// back in from storage.
	fn write_restore(&self, js: &mut String) {
		if let Some(storage) = self.settings.cache_storage.window_property() {
			let _ = write!(js, "try{{s=w.{}}}catch(_){{}}", storage);
		}
		js.push_str(
			"function p(t,i,v){if(s)try{s.setItem(P+t+i,v)}catch(_){}}\
			function h(t,i,o){if(i in o)return;var v=null;\
			if(s)try{v=s.getItem(P+t+i)}catch(_){}\
			if(v!==null)try{o[i]=t==='f:'?(0,eval)('('+v+')'):v}catch(_){}\
			if(!(i in o))g.m.push(i)}\
			for(k in F){c.f[k]=F[k];p('f:',k,String(F[k]))}\
			for(k in D){c.d[k]=D[k];p('d:',k,D[k])}\
			g.m=g.m||[];\
			I.forEach(function(i){h('f:',i,c.f)});\
			X.forEach(function(i){h('d:',i,c.d)});",
		);
	}

	fn write_runner(&self, js: &mut String) {
		let _ = write!(
			js,
			"I.forEach(function(i){{var f=c.f[i];if(!f)return;\
			var n=d.querySelectorAll('['+{fa}+'=\"'+i+'\"]');\
			for(var j=0;j<n.length;j++){{var e=n[j];\
			try{{var x=e.getAttribute({da});f(e,x!==null&&x in c.d?JSON.parse(c.d[x]):{{}})}}catch(_){{}}}}}});",
			fa = js_string(&self.settings.function_attr),
			da = js_string(&self.settings.data_attr),
		);
	}
}

fn write_id_list(js: &mut String, entries: &[Entry]) {
	let ids: Vec<String> = entries.iter().map(|e| js_string(&e.id)).collect();
	js.push('[');
	js.push_str(&ids.join(","));
	js.push(']');
}

fn write_activation(js: &mut String, ready_flag: &str, ready_event: &str) {
	let _ = write!(
		js,
		"function r(){{var f={{}},x={{}};\
		I.forEach(function(i){{if(c.f[i])f[i]=c.f[i]}});\
		X.forEach(function(i){{if(i in c.d)x[i]=c.d[i]}});g.spark(f,x)}}\
		if(w[{flag}])r();else d.addEventListener({event},r,{{once:true}});",
		flag = js_string(ready_flag),
		event = js_string(ready_event),
	);
}

/// Quotes `s` as a JavaScript string literal.
pub fn js_string(s: &str) -> String {
	serde_json::Value::String(s.to_string()).to_string()
}

/// Breaks up every `</script` and `<!--` (any case) so the text can neither
/// close the tag nor switch the HTML parser into its escaped script state.
///
/// Both only occur inside JavaScript string literals here, where `<\/` and
/// `<\!` read back as the original characters.
pub fn escape_script_text(text: &str) -> String {
	let lower = text.to_ascii_lowercase();
	let bytes = lower.as_bytes();
	let mut out = String::with_capacity(text.len());
	let mut last = 0;
	let mut index = 0;
	while index < bytes.len() {
		let rest = &bytes[index..];
		if rest.starts_with(b"</script") || rest.starts_with(b"<!--") {
			out.push_str(&text[last..=index]);
			out.push('\\');
			last = index + 1;
			index += 2;
		} else {
			index += 1;
		}
	}
	out.push_str(&text[last..]);
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::known::NoKnownIds;
	use crate::settings::{CacheStorage, RuntimeAssetSettings};
	use rstest::{fixture, rstest};
	use std::collections::HashSet;

	fn entry(id: &str, body: &str) -> Entry {
		Entry {
			id: id.to_string(),
			body: body.to_string(),
		}
	}

	#[fixture]
	fn settings() -> HydrationSettings {
		HydrationSettings::default()
	}

	#[rstest]
	fn test_empty_registries_write_nothing(settings: HydrationSettings) {
		let writer = BootstrapWriter::new(&settings, &NoKnownIds);
		assert_eq!(writer.write(&[], &[]), "");
	}

	#[rstest]
	fn test_always_on_writes_runner_without_entries() {
		let settings = HydrationSettings::new().always_on();
		let script = BootstrapWriter::new(&settings, &NoKnownIds).write(&[], &[]);
		assert!(script.starts_with("<script>(function(d,w){"));
		assert!(script.contains("F={},D={},I=[],X=[]"));
		assert!(script.ends_with("})(document,window);</script>"));
	}

	#[rstest]
	fn test_inline_script_shape(settings: HydrationSettings) {
		// Arrange
		let functions = [entry("f1", "function(el,data){el.textContent=data.x}")];
		let data = [entry("d1", r#"{"x":1}"#), entry("d2", r#"{"x":2}"#)];

		// Act
		let script = BootstrapWriter::new(&settings, &NoKnownIds).write(&functions, &data);

		// Assert
		assert!(script.contains(r#"F={"f1":(function(el,data){el.textContent=data.x})}"#));
		assert!(script.contains(r#"D={"d1":"{\"x\":1}","d2":"{\"x\":2}"}"#));
		assert!(script.contains(r#"I=["f1"],X=["d1","d2"]"#));
		assert!(script.contains(r#"P="__EMBER__:""#));
		assert!(script.contains("try{s=w.localStorage}catch(_){}"));
		assert!(script.contains(r#"querySelectorAll('['+"data-em-fn"+'="'+i+'"]')"#));
		assert!(script.contains(r#"getAttribute("data-em-data")"#));
		assert!(script.contains("catch(_){}"));
		assert!(script.contains(r#"w["__EMBER__"]"#));
	}

	#[rstest]
	fn test_known_ids_omit_bodies_but_keep_binding(settings: HydrationSettings) {
		// Arrange
		let known: HashSet<String> = ["f1".to_string(), "d1".to_string()].into_iter().collect();
		let functions = [entry("f1", "function(){KNOWN}"), entry("f2", "function(){FRESH}")];
		let data = [entry("d1", "\"known\""), entry("d2", "\"fresh\"")];

		// Act
		let script = BootstrapWriter::new(&settings, &known).write(&functions, &data);

		// Assert
		assert!(!script.contains("KNOWN"));
		assert!(!script.contains(r#"\"known\""#));
		assert!(script.contains("FRESH"));
		assert!(script.contains(r#"I=["f1","f2"],X=["d1","d2"]"#));
		assert!(script.contains("X.forEach(function(i){h('d:',i,c.d)})"));
	}

	#[rstest]
	#[case(CacheStorage::Session, Some("try{s=w.sessionStorage}catch(_){}"))]
	#[case(CacheStorage::None, None)]
	fn test_cache_storage_selects_window_property(
		#[case] storage: CacheStorage,
		#[case] expected: Option<&str>,
	) {
		let settings = HydrationSettings::new().cache_storage(storage);
		let script = BootstrapWriter::new(&settings, &NoKnownIds).write(&[entry("f1", "function(){}")], &[]);
		assert!(!script.contains("localStorage"));
		match expected {
			Some(fragment) => assert!(script.contains(fragment)),
			None => assert!(!script.contains("s=w.")),
		}
	}

	#[rstest]
	fn test_asset_mode_writes_activation_stub() {
		// Arrange
		let settings = HydrationSettings::new().runtime_asset(RuntimeAssetSettings::new("/ember.js"));
		let functions = [entry("f1", "function(){}")];

		// Act
		let script = BootstrapWriter::new(&settings, &NoKnownIds).write(&functions, &[]);

		// Assert
		assert!(script.starts_with(r#"<script type="module">import init,{install} from "/ember.js";"#));
		assert!(script.contains("</script><script>(function(d,w){"));
		assert!(script.contains("X.forEach(function(i){if(i in c.d)x[i]=c.d[i]})"));
		assert!(script.contains(r#"if(w["__EMBER_READY__"])r();else d.addEventListener("ember:ready",r,{once:true})"#));
		assert!(script.contains("g.spark(f,x)"));
		assert!(!script.contains("querySelectorAll"));
	}

	#[rstest]
	fn test_payload_cannot_close_script_tag(settings: HydrationSettings) {
		let data = [entry("d1", r#"{"html":"</SCRIPT><script>alert(1)</script>"}"#)];
		let script = BootstrapWriter::new(&settings, &NoKnownIds).write(&[], &data);
		let inner = &script["<script>".len()..script.len() - "</script>".len()];
		assert!(!inner.to_ascii_lowercase().contains("</script"));
	}

	#[rstest]
	fn test_payload_cannot_open_html_comment(settings: HydrationSettings) {
		let data = [entry("d1", r#"{"html":"<!--<script>"}"#)];
		let script = BootstrapWriter::new(&settings, &NoKnownIds).write(&[], &data);
		let inner = &script["<script>".len()..script.len() - "</script>".len()];
		assert!(!inner.contains("<!--"));
		assert!(inner.contains(r#"<\!--"#));
	}

	#[rstest]
	#[case("a</script>b", "a<\\/script>b")]
	#[case("</ScRiPt", "<\\/ScRiPt")]
	#[case("no tag", "no tag")]
	#[case("é</script", "é<\\/script")]
	#[case("a<!--b", "a<\\!--b")]
	#[case("<!--</script>", "<\\!--<\\/script>")]
	#[case("<!-x", "<!-x")]
	fn test_escape_script_text(#[case] input: &str, #[case] expected: &str) {
		assert_eq!(escape_script_text(input), expected);
	}

	#[rstest]
	fn test_js_string_quotes() {
		assert_eq!(js_string("a\"b\n"), r#""a\"b\n""#);
	}
}
