use std::collections::BTreeSet;
use std::path::Path;

use futures_util::StreamExt;

use scg::config::{CoveringPolicy, EngineConfig};
use scg::error::ScgError;
use scg::kb::{KnowledgeBase, MemoryKb, Query, Record, evaluate};
use scg::schema::{Invariant, Schema};
use scg::triple::{Id, Term, Triple, TripleIndex};
use scg::variable::VariableAllocator;

fn setup() -> (MemoryKb, Id, Query) {
    let mut schema = Schema::new();
    let form = schema.define("form", Invariant::plain().unique()).unwrap();
    let kb = MemoryKb::new(schema);
    let mut allocator = VariableAllocator::new();
    let w = allocator.named("w");
    let f = allocator.named("f");
    let triples: TripleIndex = vec![Triple::new(w.clone(), form, f.clone())].into_iter().collect();
    let query = Query::new(triples, vec![("w".into(), w), ("f".into(), f)]);
    (kb, form, query)
}

// ------------- knowledge base -------------

#[test]
fn query_snapshot() {
    let (kb, form, query) = setup();
    assert_eq!(kb.assert(vec![Triple::new(Term::Id(100), form, Term::lit("cut"))]).unwrap(), 1);
    assert_eq!(kb.assert(vec![Triple::new(Term::Id(100), form, Term::lit("cut"))]).unwrap(), 0);
    let records = kb.query(&query).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("f"), Some(&Term::lit("cut")));
}

#[test]
fn non_ground_facts_are_rejected() {
    let (kb, form, query) = setup();
    let variable = query.projection()[0].1.clone();
    let result = kb.assert(vec![Triple::new(variable, form, Term::lit("x"))]);
    assert!(matches!(result, Err(ScgError::Knowledge(_))));
}

#[tokio::test]
async fn subscription_sees_existing_and_new_facts() {
    let (kb, form, query) = setup();
    kb.assert(vec![Triple::new(Term::Id(1), form, Term::lit("cut"))]).unwrap();
    let mut stream = kb.subscribe(&query).unwrap();
    let first = stream.next().await.expect("existing result");
    assert_eq!(first.get("w"), Some(&Term::Id(1)));
    kb.assert(vec![Triple::new(Term::Id(2), form, Term::lit("onion"))]).unwrap();
    let mut seen = BTreeSet::new();
    for _ in 0..2 {
        seen.insert(stream.next().await.expect("re-sent result"));
    }
    assert_eq!(seen.len(), 2);
}

#[test]
fn empty_query_has_one_empty_result() {
    let facts = TripleIndex::new();
    assert_eq!(evaluate(&facts, &Query::default()), vec![Record::new()]);
}

// ------------- configuration -------------

#[test]
fn defaults_when_empty() {
    let config = EngineConfig::from_toml("").unwrap();
    assert_eq!(config, EngineConfig::default());
    assert_eq!(config.covering, CoveringPolicy::FirstFound);
}

#[test]
fn partial_toml_overrides() {
    let config = EngineConfig::from_toml(
        r#"
        covering = "exhaustive_minimal"
        max_ticks = 50

        [precompute]
        allow_self_pairing = true
        "#,
    )
    .unwrap();
    assert_eq!(config.covering, CoveringPolicy::ExhaustiveMinimal);
    assert_eq!(config.max_ticks, 50);
    assert!(config.precompute.allow_self_pairing);
    assert_eq!(config.precompute.max_precomps_per_touched_set, 1);
}

#[test]
fn unknown_policy_is_an_error() {
    assert!(matches!(EngineConfig::from_toml(r#"covering = "greedy""#), Err(ScgError::Config(_))));
}

#[test]
fn missing_file_is_an_error() {
    assert!(EngineConfig::load(Some(Path::new("/nonexistent/scg.toml"))).is_err());
}
