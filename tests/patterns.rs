use scg::binding::DISEQUALITY_VIOLATION;
use scg::construction::Construction;
use scg::error::ScgError;
use scg::pattern::{EntityPattern, PatternScope, Position};
use scg::schema::{Invariant, Schema};
use scg::triple::{Literal, Term, Triple};
use scg::variable::{Variable, VariableAllocator};

fn setup() -> Schema {
    let mut schema = Schema::new();
    schema.define("form", Invariant::plain().unique()).unwrap();
    schema.define("evokes", Invariant::link()).unwrap();
    schema.define("expresses", Invariant::link().unique().unique_inverse()).unwrap();
    schema.define_inverse("isExpressedBy", "expresses").unwrap();
    schema
}

// ------------- pattern scopes -------------

#[test]
fn nested_entities_get_anonymous_identities() {
    let schema = setup();
    let mut allocator = VariableAllocator::new();
    let mut scope = PatternScope::new(&mut allocator);
    scope.declare("w").unwrap();
    let pattern = EntityPattern::var("w")
        .attr("form", Position::lit("cut"))
        .attr("evokes", EntityPattern::new().attr("form", Position::lit("x")));
    let (triples, binding) = scope.compile(&schema, &[pattern]).unwrap();
    assert_eq!(triples.len(), 3);
    assert!(binding.is_valid());
    let anonymous: Vec<&Variable> = scope.variables().iter().filter(|v| !v.is_named()).collect();
    assert_eq!(anonymous.len(), 1);
}

#[test]
fn inverse_alias_flips_entity_and_value() {
    let schema = setup();
    let expresses = schema.attribute("expresses").unwrap();
    let mut allocator = VariableAllocator::new();
    let mut scope = PatternScope::new(&mut allocator);
    let w = scope.declare("w").unwrap();
    let s = scope.declare("s").unwrap();
    let (triples, binding) =
        scope.compile(&schema, &[EntityPattern::var("s").attr("isExpressedBy", Position::var("w"))]).unwrap();
    assert_eq!(triples.get(0), Some(&Triple::new(w.clone(), expresses, s.clone())));
    assert_eq!(binding.then_of(&Term::Var(w), expresses), Some(Term::Var(s.clone())));
    assert!(binding.then_of(&Term::Var(s), expresses).is_some());
}

#[test]
fn malformed_patterns_are_rejected() {
    let schema = setup();
    let mut allocator = VariableAllocator::new();
    let mut scope = PatternScope::new(&mut allocator);
    scope.declare("w").unwrap();
    assert!(scope.declare("w").is_err());
    let cases = [
        EntityPattern::var("undeclared").attr("form", Position::lit("a")),
        EntityPattern::var("w").attr("unknown", Position::lit("a")),
        EntityPattern::identified_by(Position::lit("a")).attr("form", Position::lit("b")),
        EntityPattern::var("w").attr("evokes", Position::lit("a")),
        EntityPattern::var("w").attr("form", EntityPattern::new().attr("form", Position::lit("a"))),
        EntityPattern::var("w").attr("evokes", EntityPattern::new()),
        EntityPattern::var("w").attr("form", Position::lit("a")).attr("form", Position::lit("b")),
    ];
    for case in cases {
        let result = scope.compile(&schema, &[case.clone()]);
        assert!(matches!(result, Err(ScgError::Pattern { .. })), "{:?} should not compile", case);
    }
}

#[test]
fn scope_declarations_are_checked() {
    let mut allocator = VariableAllocator::new();
    let mut scope = PatternScope::new(&mut allocator);
    let a = scope.declare("a").unwrap();
    let b = scope.declare("b").unwrap();
    scope.leq(&Position::lit(1), &Position::var("a")).unwrap();
    assert!(scope.leq(&Position::var("a"), &Position::lit(0)).is_err());
    scope.all_different(&[Position::var("a"), Position::var("b")]).unwrap();
    assert!(scope.all_different(&[Position::var("a"), Position::var("a")]).is_err());
    assert!(scope.all_different(&[Position::var("missing")]).is_err());

    let (variables, constraints) = scope.finish();
    assert_eq!(variables, vec![a.clone(), b.clone()]);
    assert_eq!(constraints.lower_bound(&Term::Var(a.clone())), Some(Literal::Int(1)));
    assert!(constraints.distinct(&Term::Var(a), &Term::Var(b)));
}

// ------------- constructions -------------

#[test]
fn fresh_instances_share_structure_but_not_variables() {
    let schema = setup();
    let mut allocator = VariableAllocator::new();
    let cxn = Construction::new("lexeme")
        .vars(["w", "s"])
        .matching(EntityPattern::var("w").attr("form", Position::lit("cut")))
        .merging(EntityPattern::var("w").attr("evokes", Position::var("s")))
        .compile(&schema, &mut allocator)
        .unwrap();
    let instance = cxn.fresh(&mut allocator);
    assert_eq!(instance.variables.len(), cxn.variables().len());
    assert!(instance.variables.iter().all(|v| !cxn.variables().contains(v)));
    assert_eq!(instance.matching.len(), 1);
    let w = Term::Var(instance.variables[0].clone());
    assert_eq!(instance.binding.then_of(&w, schema.attribute("form").unwrap()), Some(Term::lit("cut")));
}

#[test]
fn all_different_lands_in_the_baseline() {
    let schema = setup();
    let mut allocator = VariableAllocator::new();
    let cxn = Construction::new("pair")
        .vars(["a", "b"])
        .matching(EntityPattern::var("a").attr("form", Position::lit("red")))
        .matching(EntityPattern::var("b").attr("form", Position::lit("red")))
        .all_different(["a", "b"])
        .compile(&schema, &mut allocator)
        .unwrap();
    let instance = cxn.fresh(&mut allocator);
    let (a, b) = (Term::Var(instance.variables[0].clone()), Term::Var(instance.variables[1].clone()));
    assert!(instance.binding.distinct(&a, &b));
    let collapsed = instance.binding.unify(&a, &b);
    assert_eq!(collapsed.error().map(|e| e.message), Some(DISEQUALITY_VIOLATION));

    let undeclared = Construction::new("broken")
        .vars(["a"])
        .matching(EntityPattern::var("a").attr("form", Position::lit("red")))
        .all_different(["a", "z"])
        .compile(&schema, &mut allocator);
    assert!(matches!(undeclared, Err(ScgError::Definition { ref cxn, .. }) if cxn == "broken"));
}

#[test]
fn sources_project_their_named_query_variables() {
    let schema = setup();
    let mut allocator = VariableAllocator::new();
    let source = Construction::source("word")
        .vars(["w", "f", "unused"])
        .query(EntityPattern::var("w").attr("form", Position::var("f")))
        .merging(EntityPattern::var("w").attr("form", Position::var("f")))
        .compile(&schema, &mut allocator)
        .unwrap();
    let names: Vec<&str> = source.query().unwrap().projection().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["w", "f"]);
    assert!(source.clusters().is_empty());
    assert!(source.matching_triples().is_empty());
}

#[test]
fn definition_errors_name_the_construction() {
    let schema = setup();
    let mut allocator = VariableAllocator::new();
    let result = Construction::new("broken")
        .vars(["w"])
        .matching(EntityPattern::var("x").attr("form", Position::lit("a")))
        .compile(&schema, &mut allocator);
    match result {
        Err(ScgError::Definition { cxn, .. }) => assert_eq!(cxn, "broken"),
        other => panic!("unexpected {:?}", other.map(|c| c.id().clone())),
    }
    let result = Construction::new("inner").query(EntityPattern::new().attr("form", Position::lit("a")));
    assert!(result.compile(&schema, &mut allocator).is_err());
}
