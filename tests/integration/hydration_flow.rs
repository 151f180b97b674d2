//! Server render → client hydrate → DOM removal, across both halves.

#![cfg(not(target_arch = "wasm32"))]

use std::cell::RefCell;
use std::rc::Rc;

use ember::runtime::{Document, Element, Runtime, RuntimeConfig, Value, hydrate_fn};
use ember::ssr::{HydrationEngine, HydrationSettings, Registration};
use rstest::{fixture, rstest};

const CARD: &str = "function(el,data){el.textContent=data.title}";
const BADGE: &str = "function(el){el.classList.add('on')}";

struct Rendered {
	engine: HydrationEngine,
	placements: Vec<Registration>,
}

/// Renders three cards (two sharing a payload) and one badge without data.
#[fixture]
fn rendered() -> Rendered {
	let mut engine = HydrationEngine::default();
	let placements = vec![
		engine.register(CARD, Some(r#"{"title":"a"}"#)),
		engine.register(CARD, Some(r#"{"title":"a"}"#)),
		engine.register(CARD, Some(r#"{"title":"b"}"#)),
		engine.register(BADGE, None),
	];
	Rendered { engine, placements }
}

/// Builds the client document the rendered markup describes.
fn hydrate_document(settings: &HydrationSettings, placements: &[Registration]) -> (Document, Vec<Element>) {
	let doc = Document::new();
	let nodes = placements
		.iter()
		.map(|reg| {
			let el = doc.create_element("article");
			for (name, value) in reg.attrs(settings) {
				el.set_attribute(&name, &value);
			}
			doc.body().append_child(&el);
			el
		})
		.collect();
	(doc, nodes)
}

#[rstest]
fn test_registration_dedup_and_flush(rendered: Rendered) {
	let [first, second, third, badge] = rendered.placements.as_slice() else {
		panic!("expected four placements");
	};

	assert_eq!(first, second);
	assert_eq!(third.function_id, first.function_id);
	assert_ne!(third.data_id, first.data_id);
	assert_eq!(badge.data_id, None);
	assert_eq!(rendered.engine.function_count(), 2);
	assert_eq!(rendered.engine.data_count(), 2);

	let page = rendered.engine.inject(Some("<html><body><main></main></body></html>"));
	assert_eq!(page.matches(CARD).count(), 1);
	assert!(page.ends_with("</script></body></html>"));
}

#[rstest]
fn test_client_refcounts_follow_dom(rendered: Rendered) {
	// Arrange
	let settings = rendered.engine.settings().clone();
	let (doc, nodes) = hydrate_document(&settings, &rendered.placements);
	let runtime = Runtime::new(doc, RuntimeConfig::default());
	let titles = Rc::new(RefCell::new(Vec::new()));

	let card_id = rendered.placements[0].function_id.clone();
	let badge_id = rendered.placements[3].function_id.clone();
	let shared = rendered.placements[0].data_id.clone().unwrap();
	let single = rendered.placements[2].data_id.clone().unwrap();

	let log = Rc::clone(&titles);
	let card = hydrate_fn(move |ctx| {
		let title = ctx.reactor().get("title").unwrap_or_default();
		ctx.element().set_text(title.to_display_string());
		log.borrow_mut().push(title);
		Ok(())
	});
	let badge = hydrate_fn(|ctx| {
		ctx.element().set_attribute("class", "on");
		Ok(())
	});

	// Act: hydrate with the payloads exactly as the server serialized them
	let data: Vec<(String, String)> = rendered
		.engine
		.data()
		.iter()
		.map(|entry| (entry.id.clone(), entry.body.clone()))
		.collect();
	let mounted = runtime.spark_json(vec![(card_id, card), (badge_id, badge)], data);

	// Assert: mounted
	assert_eq!(mounted, 4);
	assert_eq!(nodes[2].text(), "b");
	assert_eq!(nodes[3].get_attribute("class").as_deref(), Some("on"));
	assert_eq!(titles.borrow().len(), 3);
	assert_eq!(runtime.arc().refs(&shared), Some(2));
	assert_eq!(runtime.arc().refs(&single), Some(1));

	// Act: remove one of the two nodes sharing a payload
	nodes[0].remove();
	runtime.observe_mutations();

	// Assert: shared payload stays resident
	assert_eq!(runtime.arc().refs(&shared), Some(1));

	// Act: remove the rest in one batch
	runtime.document().body().remove_children(&nodes[1..]);
	let released = runtime.observe_mutations();

	// Assert
	assert_eq!(released, 3);
	assert!(!runtime.arc().is_resident(&shared));
	assert!(!runtime.arc().is_resident(&single));
	assert_eq!(runtime.arc().instance_count(), 0);
	assert_eq!(runtime.observe_mutations(), 0);
}

#[rstest]
fn test_store_broadcast_reaches_hydrated_nodes(rendered: Rendered) {
	// Arrange
	let settings = rendered.engine.settings().clone();
	let (doc, nodes) = hydrate_document(&settings, &rendered.placements[..3]);
	let runtime = Runtime::new(doc, RuntimeConfig::default());
	let card = hydrate_fn(|ctx| {
		let reactor = ctx.reactor().clone();
		ctx.relay().subscribe("store:title", move |value| {
			reactor.set("title", value.clone());
			Ok(())
		});
		let el = ctx.element().clone();
		ctx.reactor().watch(
			"title",
			move |new, _| {
				el.set_text(new.map(Value::to_display_string).unwrap_or_default());
				Ok(())
			},
			Default::default(),
		);
		Ok(())
	});
	let data: Vec<(String, String)> = rendered
		.engine
		.data()
		.iter()
		.map(|entry| (entry.id.clone(), entry.body.clone()))
		.collect();
	runtime.spark_json(vec![(rendered.placements[0].function_id.clone(), card)], data);

	// Act
	runtime.store().set("title", Value::from("z"));
	runtime.tick();

	// Assert
	assert!(nodes.iter().all(|node| node.text() == "z"));
}
