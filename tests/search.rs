use std::sync::Arc;

use scg::config::EngineConfig;
use scg::construction::Construction;
use scg::error::ScgError;
use scg::grammar::build_grammar;
use scg::kb::{KnowledgeBase, MemoryKb, Record};
use scg::pattern::{EntityPattern, Position};
use scg::schema::{Invariant, Schema};
use scg::search::{Node, NodeId, SearchEvent, SearchSpace};
use scg::triple::{Id, Term, Triple};

fn setup() -> (SearchSpace, Id, Id) {
    let mut schema = Schema::new();
    let form = schema.define("form", Invariant::plain().unique()).unwrap();
    schema.define("evokes", Invariant::link()).unwrap();
    let cutting = schema.concept("Cutting");
    let word = Construction::source("word")
        .vars(["w", "f"])
        .query(EntityPattern::var("w").attr("form", Position::var("f")))
        .merging(EntityPattern::var("w").attr("form", Position::var("f")));
    let lexeme = Construction::new("cut")
        .vars(["w"])
        .matching(EntityPattern::var("w").attr("form", Position::lit("cut")))
        .merging(EntityPattern::var("w").attr("evokes", Position::id(cutting)));
    let kb: Arc<dyn KnowledgeBase> = Arc::new(MemoryKb::new(schema.clone()));
    let grammar = build_grammar(schema, vec![word], vec![lexeme], &Default::default()).unwrap();
    let space = SearchSpace::new(Arc::new(grammar), kb, &EngineConfig::default()).unwrap();
    (space, form, cutting)
}

fn record(w: Id, f: &str) -> Record {
    Record::from([("w".to_string(), Term::Id(w)), ("f".to_string(), Term::lit(f))])
}

#[tokio::test]
async fn source_results_fire_once() {
    let (mut space, _, _) = setup();
    let node = space.register_source_result("word", record(100, "cut")).unwrap().unwrap();
    assert_eq!(space.node(node).unwrap().depth(), 0);
    assert_eq!(space.queue_len("cut"), 1);
    assert!(space.register_source_result("word", record(100, "cut")).unwrap().is_none());
    assert_eq!(space.nodes().count(), 1);
}

#[tokio::test]
async fn non_matching_words_queue_nothing() {
    let (mut space, _, _) = setup();
    space.register_source_result("word", record(100, "run")).unwrap();
    assert_eq!(space.nodes().count(), 1);
    assert_eq!(space.queue_len("cut"), 0);
    assert_eq!(space.run_until_quiescent(None).unwrap(), 0);
}

#[tokio::test]
async fn unknown_constructions_are_errors() {
    let (mut space, _, _) = setup();
    assert!(matches!(space.tick(Some("nope")), Err(ScgError::UnknownConstruction(_))));
    assert!(matches!(space.register_source_result("cut", Record::new()), Err(ScgError::UnknownConstruction(_))));
    assert!(matches!(space.extract_triples(&[NodeId(999)]), Err(ScgError::UnknownNode(999))));
}

#[tokio::test]
async fn ticking_fires_and_extracts() {
    let (mut space, form, cutting) = setup();
    let mut events = space.events();
    let source = space.register_source_result("word", record(100, "cut")).unwrap().unwrap();
    space.tick(Some("cut")).unwrap();
    assert_eq!(space.queue_len("cut"), 0);
    assert_eq!(space.cxn_log().len(), 1);

    let fired: Vec<&Node> = space.nodes().filter(|n| n.cxn_id().as_str() == "cut").collect();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].depth(), 1);
    assert!(fired[0].ancestors().contains(source.0));

    let results = space.generate_parsing_results();
    assert_eq!(results, vec![vec![fired[0].id()]]);
    let evokes = space.grammar().schema().attribute("evokes").unwrap();
    let (triples, binding) = space.extract_triples(&results[0]).unwrap();
    assert!(binding.is_valid());
    assert!(triples.contains(&Triple::new(Term::Id(100), evokes, Term::Id(cutting))));
    assert!(triples.contains(&Triple::new(Term::Id(100), form, Term::lit("cut"))));

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen.first(), Some(SearchEvent::NodeAdded(_))));
    assert!(seen.iter().any(|e| matches!(e, SearchEvent::PartialDequeued(_))));
}
