use scg::error::ScgError;
use scg::schema::{Invariant, Schema};
use scg::triple::{Id, Term, Triple, TripleIndex};
use scg::variable::VariableAllocator;

const COLOR: Id = 10;
const SIZE: Id = 11;

// ------------- variables -------------

#[test]
fn fresh_variables_keep_their_name_and_order() {
    let mut allocator = VariableAllocator::new();
    let x = allocator.named("x");
    let y = allocator.named("y");
    let (fresh, renaming) = allocator.freshen(&[x.clone(), y.clone()]);
    assert_eq!(fresh[0].name(), "x");
    assert!(fresh[0] > y, "fresh ids come after everything handed out before");
    assert!(fresh[0] < fresh[1], "freshening preserves relative order");
    assert_eq!(renaming.get(&x), Some(&fresh[0]));
}

#[test]
fn names_are_cosmetic() {
    let mut allocator = VariableAllocator::new();
    let a = allocator.named("same");
    let b = allocator.named("same");
    assert_ne!(a, b);
    assert!(!allocator.anonymous().is_named());
}

// ------------- triples -------------

#[test]
fn duplicates_are_ignored_and_order_is_kept() {
    let mut index = TripleIndex::new();
    assert!(index.insert(Triple::new(Term::Id(1), COLOR, Term::lit("red"))));
    assert!(index.insert(Triple::new(Term::Id(1), SIZE, Term::lit(3))));
    assert!(!index.insert(Triple::new(Term::Id(1), COLOR, Term::lit("red"))));
    assert_eq!(index.len(), 2);
    assert_eq!(index.get(1).map(|t| t.a), Some(SIZE));
    assert_eq!(index.by_attribute(COLOR).count(), 1);
}

#[test]
fn membership_holds_for_many_triples_on_one_attribute() {
    let index: TripleIndex = (0..1000).map(|i| Triple::new(Term::Id(i), COLOR, Term::lit(i as i64))).collect();
    assert_eq!(index.len(), 1000);
    assert!(index.contains(&Triple::new(Term::Id(999), COLOR, Term::lit(999))));
    assert!(!index.contains(&Triple::new(Term::Id(999), COLOR, Term::lit(998))));
    assert!(!index.contains(&Triple::new(Term::Id(999), SIZE, Term::lit(999))));
}

#[test]
fn remove_reindexes_positions() {
    let mut index: TripleIndex = vec![
        Triple::new(Term::Id(1), COLOR, Term::lit("red")),
        Triple::new(Term::Id(2), COLOR, Term::lit("blue")),
        Triple::new(Term::Id(3), SIZE, Term::lit(1)),
    ]
    .into_iter()
    .collect();
    let red = Triple::new(Term::Id(1), COLOR, Term::lit("red"));
    assert!(index.remove(&red));
    assert!(!index.contains(&red));
    let positions: Vec<usize> = index.by_attribute(SIZE).map(|(p, _)| p).collect();
    assert_eq!(positions, vec![1]);
    assert!(!index.remove(&Triple::new(Term::Id(9), COLOR, Term::lit("red"))));
    assert!(index.insert(red));
}

#[test]
fn union_and_difference() {
    let a: TripleIndex = vec![Triple::new(Term::Id(1), COLOR, Term::lit("red"))].into_iter().collect();
    let b: TripleIndex = vec![
        Triple::new(Term::Id(1), COLOR, Term::lit("red")),
        Triple::new(Term::Id(2), COLOR, Term::lit("blue")),
    ]
    .into_iter()
    .collect();
    assert_eq!(a.union(&b).len(), 2);
    assert_eq!(b.difference(&a).len(), 1);
    assert!(a.difference(&b).is_empty());
}

#[test]
fn rename_substitutes_variables_only() {
    let mut allocator = VariableAllocator::new();
    let x = allocator.named("x");
    let index: TripleIndex = vec![Triple::new(x.clone(), COLOR, Term::lit("red"))].into_iter().collect();
    let (fresh, renaming) = allocator.freshen(&[x.clone()]);
    let renamed = index.rename(&renaming);
    assert_eq!(renamed.get(0), Some(&Triple::new(fresh[0].clone(), COLOR, Term::lit("red"))));
    assert_eq!(index.variables(), vec![x]);
}

// ------------- schema -------------

#[test]
fn attributes_and_aliases_resolve() {
    let mut schema = Schema::new();
    let expresses = schema.define("expresses", Invariant::link().unique().unique_inverse()).unwrap();
    schema.define_inverse("isExpressedBy", "expresses").unwrap();
    assert_eq!(schema.resolve("expresses"), Some((expresses, false)));
    assert_eq!(schema.resolve("isExpressedBy"), Some((expresses, true)));
    assert!(schema.is_unique_inverse(expresses));
    assert_eq!(schema.name(expresses), Some("expresses"));
}

#[test]
fn redefinition_is_rejected() {
    let mut schema = Schema::new();
    schema.define("form", Invariant::plain()).unwrap();
    assert!(matches!(schema.define("form", Invariant::plain()), Err(ScgError::Schema(_))));
    assert!(schema.define_inverse("x", "missing").is_err());
}

#[test]
fn concepts_are_interned_but_not_attributes() {
    let mut schema = Schema::new();
    let cutting = schema.concept("Cutting");
    assert_eq!(schema.concept("Cutting"), cutting);
    assert_eq!(schema.resolve("Cutting"), None);
    assert_eq!(schema.id("Cutting"), Some(cutting));
}
