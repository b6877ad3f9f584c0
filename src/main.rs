//! Parses the words given on the command line with a small cooking grammar
//! and prints every parsing result with the triples it asserts.
//!
//! `RUST_LOG=scg=debug cargo run -- slice the bread` shows every tick.
//! Settings are read from `scg.toml` when present and from `SCG__*` variables.

use std::collections::HashMap;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scg::config::EngineConfig;
use scg::construction::Construction;
use scg::grammar::build_grammar;
use scg::kb::MemoryKb;
use scg::pattern::{EntityPattern, Position};
use scg::schema::{Invariant, Schema};
use scg::search::SearchSpace;
use scg::triple::{Id, Literal, Term, Triple};

// words are entities numbered from here on
const FIRST_WORD: Id = 1_000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Path::new("scg.toml");
    let config = EngineConfig::load(settings.exists().then_some(settings))?;

    let mut words: Vec<String> = std::env::args().skip(1).collect();
    if words.is_empty() {
        words = ["cut", "the", "bread"].map(String::from).to_vec();
    }

    let mut schema = Schema::new();
    let form = schema.define("form", Invariant::plain().unique())?;
    schema.define("evokes", Invariant::link())?;
    schema.define("patient", Invariant::link())?;
    let cutting = schema.concept("Cutting");
    let bread = schema.concept("Bread");
    let lexicon: HashMap<String, Id> = [("cut", cutting), ("slice", cutting), ("bread", bread), ("loaf", bread)]
        .into_iter()
        .map(|(form, concept)| (form.to_string(), concept))
        .collect();

    let word = Construction::source("word")
        .vars(["w", "f"])
        .query(EntityPattern::var("w").attr("form", Position::var("f")))
        .merging(EntityPattern::var("w").attr("form", Position::var("f")));
    let lexeme = Construction::new("lexeme")
        .vars(["w", "f", "s"])
        .matching(EntityPattern::var("w").attr("form", Position::var("f")))
        .merging(EntityPattern::var("w").attr("evokes", Position::var("s")))
        .guard(move |binding, _, vars| {
            let concept = match vars.get("f") {
                Some(Term::Lit(Literal::Str(f))) => lexicon.get(f),
                _ => None,
            };
            match (concept, vars.get("s")) {
                (Some(&concept), Some(s)) => vec![binding.unify(s, &Term::Id(concept))],
                _ => Vec::new(),
            }
        });
    let event = Construction::new("cutting_event")
        .vars(["v", "o"])
        .matching(EntityPattern::var("v").attr("evokes", Position::id(cutting)))
        .matching(EntityPattern::var("o").attr("evokes", Position::id(bread)))
        .merging(EntityPattern::var("v").attr("patient", Position::var("o")));

    let kb = MemoryKb::new(schema.clone());
    let grammar = Arc::new(build_grammar(schema, vec![word], vec![lexeme, event], &config.precompute)?);
    let mut space = SearchSpace::new(Arc::clone(&grammar), Arc::new(kb.clone()), &config)?;

    kb.assert(
        words
            .iter()
            .enumerate()
            .map(|(i, w)| Triple::new(Term::Id(FIRST_WORD + i as Id), form, Term::lit(w.as_str()))),
    )?;
    let fired = space.pump_until_idle(Duration::from_millis(50)).await?;
    let ticks = space.run_until_quiescent(None)?;
    info!(words = words.len(), fired, ticks, "parse finished");

    let schema = grammar.schema();
    for result in space.generate_parsing_results() {
        let (triples, _) = space.extract_triples(&result)?;
        let rendered: Vec<String> = triples
            .iter()
            .map(|t| format!("({}, {}, {})", t.e, schema.name(t.a).unwrap_or("?"), t.v))
            .collect();
        println!("{}", serde_json::to_string_pretty(&json!({ "nodes": result, "triples": rendered }))?);
    }
    Ok(())
}
