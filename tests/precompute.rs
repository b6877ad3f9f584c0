use roaring::RoaringBitmap;

use scg::binding::Binding;
use scg::config::PrecomputeConfig;
use scg::construction::{Construction, independent_clusters};
use scg::error::ScgError;
use scg::grammar::build_grammar;
use scg::pattern::{EntityPattern, Position};
use scg::precompute::merge_match_precompute;
use scg::schema::{Invariant, Schema};
use scg::triple::{Term, Triple, TripleIndex};
use scg::variable::VariableAllocator;

fn setup() -> Schema {
    let mut schema = Schema::new();
    schema.define("form", Invariant::plain().unique()).unwrap();
    schema.define("evokes", Invariant::link()).unwrap();
    schema.define("head", Invariant::link().unique()).unwrap();
    schema.define("next", Invariant::link()).unwrap();
    schema
}

fn bits(indices: &[u32]) -> RoaringBitmap {
    indices.iter().copied().collect()
}

#[test]
fn uniqueness_chains_form_clusters() {
    let schema = setup();
    let mut allocator = VariableAllocator::new();
    let cxn = Construction::new("headed")
        .vars(["x", "y", "s"])
        .matching(EntityPattern::var("x").attr("head", Position::var("y")))
        .matching(EntityPattern::var("y").attr("form", Position::lit("bread")))
        .matching(EntityPattern::var("x").attr("evokes", Position::var("s")))
        .compile(&schema, &mut allocator)
        .unwrap();
    let clusters = independent_clusters(&schema, cxn.matching());
    assert_eq!(clusters, vec![bits(&[0, 1]), bits(&[2])]);
    assert_eq!(cxn.clusters(), clusters.as_slice());
}

#[test]
fn clusters_partition_the_match_pattern() {
    let schema = setup();
    let mut allocator = VariableAllocator::new();
    // y is reached from x, and z shares the form literal without being linked
    let cxn = Construction::new("chain")
        .vars(["x", "y", "z", "s"])
        .matching(EntityPattern::var("y").attr("form", Position::lit("bread")))
        .matching(EntityPattern::var("x").attr("evokes", Position::var("s")))
        .matching(EntityPattern::var("z").attr("form", Position::lit("bread")))
        .matching(EntityPattern::var("x").attr("head", Position::var("y")))
        .compile(&schema, &mut allocator)
        .unwrap();
    let clusters = cxn.clusters();
    assert_eq!(clusters, &[bits(&[0, 3]), bits(&[2]), bits(&[1])]);
    let mut all = RoaringBitmap::new();
    for cluster in clusters {
        assert!(all.is_disjoint(cluster));
        all |= cluster;
    }
    assert_eq!(&all, cxn.matching_triples());
}

#[test]
fn unique_inverse_values_anchor_their_cluster() {
    let mut schema = setup();
    schema.define("owns", Invariant::link().unique_inverse()).unwrap();
    let mut allocator = VariableAllocator::new();
    let single = Construction::new("owner")
        .vars(["p", "q"])
        .matching(EntityPattern::var("p").attr("owns", Position::var("q")))
        .compile(&schema, &mut allocator)
        .unwrap();
    assert_eq!(single.clusters(), &[bits(&[0])]);

    // a shared owned value forces both owners together
    let shared = Construction::new("owners")
        .vars(["p", "r", "q", "t"])
        .matching(EntityPattern::var("p").attr("owns", Position::var("q")))
        .matching(EntityPattern::var("t").attr("owns", Position::var("r")))
        .matching(EntityPattern::var("r").attr("owns", Position::var("q")))
        .compile(&schema, &mut allocator)
        .unwrap();
    assert_eq!(shared.clusters(), &[bits(&[0, 1, 2])]);
}

#[test]
fn unrelated_entities_are_separate_clusters() {
    let schema = setup();
    let mut allocator = VariableAllocator::new();
    let cxn = Construction::new("pair")
        .vars(["a", "b"])
        .matching(EntityPattern::var("a").attr("form", Position::lit("red")))
        .matching(EntityPattern::var("b").attr("form", Position::lit("apple")))
        .compile(&schema, &mut allocator)
        .unwrap();
    assert_eq!(cxn.clusters(), &[bits(&[0]), bits(&[1])]);
}

fn chain() -> Construction {
    Construction::new("chain")
        .vars(["x", "y", "z"])
        .matching(EntityPattern::var("x").attr("next", Position::var("y")))
        .merging(EntityPattern::var("y").attr("next", Position::var("z")))
}

#[test]
fn self_pairing_is_opt_in() {
    let grammar = build_grammar(setup(), Vec::new(), vec![chain()], &PrecomputeConfig::default()).unwrap();
    assert!(grammar.precomps_between("chain", "chain").is_empty());

    let config = PrecomputeConfig { allow_self_pairing: true, ..Default::default() };
    let grammar = build_grammar(setup(), Vec::new(), vec![chain()], &config).unwrap();
    let precomps = grammar.precomps_between("chain", "chain");
    assert_eq!(precomps.len(), 1);
    assert_eq!(precomps[0].touched(), &bits(&[0]));
    assert_eq!(grammar.precomps_for_merge("chain"), &[precomps[0].id()]);
}

#[test]
fn producers_feed_every_matching_cluster() {
    let word = Construction::source("word")
        .vars(["w", "f"])
        .query(EntityPattern::var("w").attr("form", Position::var("f")))
        .merging(EntityPattern::var("w").attr("form", Position::var("f")));
    let pair = Construction::new("pair")
        .vars(["a", "b"])
        .matching(EntityPattern::var("a").attr("form", Position::lit("red")))
        .matching(EntityPattern::var("b").attr("form", Position::lit("apple")))
        .merging(EntityPattern::var("b").attr("evokes", Position::var("a")));
    let grammar = build_grammar(setup(), vec![word], vec![pair], &PrecomputeConfig::default()).unwrap();

    let mut touched: Vec<RoaringBitmap> =
        grammar.precomps_between("word", "pair").iter().map(|p| p.touched().clone()).collect();
    touched.sort_by_key(|t| t.min());
    assert_eq!(touched, vec![bits(&[0]), bits(&[1])]);
    assert!(grammar.precomps_between("pair", "word").is_empty());
    assert_eq!(grammar.sources().count(), 1);
}

#[test]
fn malformed_grammars_are_rejected() {
    let config = PrecomputeConfig::default();
    let result = build_grammar(setup(), Vec::new(), vec![chain(), chain()], &config);
    assert!(matches!(result, Err(ScgError::Definition { ref cxn, .. }) if cxn == "chain"));

    let result = build_grammar(setup(), vec![chain()], Vec::new(), &config);
    assert!(matches!(result, Err(ScgError::Definition { .. })));

    let source = Construction::source("word").vars(["w"]).query(EntityPattern::var("w").attr("form", Position::lit("x")));
    let result = build_grammar(setup(), Vec::new(), vec![source], &config);
    assert!(matches!(result, Err(ScgError::Definition { .. })));

    let unknown = Construction::new("bad").vars(["w"]).matching(EntityPattern::var("w").attr("colour", Position::lit("x")));
    let result = build_grammar(setup(), Vec::new(), vec![unknown], &config);
    assert!(matches!(result, Err(ScgError::Definition { ref cxn, .. }) if cxn == "bad"));
}

// ------------- merge/match precomputation -------------

const COLOR: u64 = 1;
const SIZE: u64 = 2;

#[test]
fn pairs_outside_the_cluster_are_ignored() {
    let mut allocator = VariableAllocator::new();
    let (x, y) = (allocator.named("x"), allocator.named("y"));
    let merge: TripleIndex = vec![Triple::new(x.clone(), COLOR, Term::lit("red"))].into_iter().collect();
    let matching: TripleIndex =
        vec![Triple::new(y.clone(), SIZE, Term::lit(3)), Triple::new(y.clone(), COLOR, Term::lit("red"))]
            .into_iter()
            .collect();
    assert!(merge_match_precompute(&Binding::new(), &merge, &matching, &bits(&[0])).is_empty());
    let results = merge_match_precompute(&Binding::new(), &merge, &matching, &bits(&[1]));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].touched, bits(&[1]));
    assert!(results[0].binding.same(&Term::Var(x), &Term::Var(y)));
}

#[test]
fn merge_side_entities_stay_apart() {
    let mut allocator = VariableAllocator::new();
    let (a, b, m) = (allocator.named("a"), allocator.named("b"), allocator.named("m"));
    // two distinct producer entities can not both feed one consumer entity
    let merge: TripleIndex =
        vec![Triple::new(a.clone(), COLOR, Term::lit("red")), Triple::new(b.clone(), COLOR, Term::lit("red"))]
            .into_iter()
            .collect();
    let matching: TripleIndex = vec![Triple::new(m.clone(), COLOR, Term::lit("red"))].into_iter().collect();
    let results = merge_match_precompute(&Binding::new(), &merge, &matching, &bits(&[0]));
    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(!result.binding.same(&Term::Var(a.clone()), &Term::Var(b.clone())));
    }
}

#[test]
fn fresh_precomps_keep_the_two_variable_lists_apart() {
    let word = Construction::source("word")
        .vars(["w", "f"])
        .query(EntityPattern::var("w").attr("form", Position::var("f")))
        .merging(EntityPattern::var("w").attr("form", Position::var("f")));
    let lexeme = Construction::new("lexeme")
        .vars(["x", "s"])
        .matching(EntityPattern::var("x").attr("form", Position::lit("cut")))
        .merging(EntityPattern::var("x").attr("evokes", Position::var("s")));
    let grammar = build_grammar(setup(), vec![word], vec![lexeme], &PrecomputeConfig::default()).unwrap();
    let precomps = grammar.precomps_between("word", "lexeme");
    assert_eq!(precomps.len(), 1);
    let precomp = precomps[0];

    let mut allocator = grammar.allocator().clone();
    let instance = precomp.fresh(&mut allocator);
    assert_eq!(instance.matching_variables.len(), precomp.matching_variables().len());
    assert_eq!(instance.merging_variables.len(), precomp.merging_variables().len());
    assert!(instance.merging_variables.iter().all(|v| !precomp.merging_variables().contains(v)));

    let (w, f) = (Term::Var(instance.merging_variables[0].clone()), Term::Var(instance.merging_variables[1].clone()));
    let x = Term::Var(instance.matching_variables[0].clone());
    assert!(instance.binding.same(&w, &x));
    assert_eq!(instance.binding.walk(&f), Term::lit("cut"));
}
