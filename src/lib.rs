//! scg – an incremental unification engine for Streaming Construction Grammar.
//!
//! A grammar is a set of *constructions*. Each one pairs a match pattern
//! (triples that must already hold) with a merge pattern (triples asserted once
//! it fires), optionally guarded by an external predicate. Words and other
//! input arrive as results of *source* constructions subscribed on a knowledge
//! base, and the engine incrementally finds every way the grammar can combine
//! them, without re-running the whole analysis when a new result arrives.
//!
//! The central value is the [`binding::Binding`]: an immutable substitution
//! over variables, identities and literals that also tracks ordering bounds
//! and attribute uniqueness. Every composition returns a new binding, and a
//! contradiction yields an invalid binding rather than an error.
//!
//! ## Modules
//! * [`triple`] – Terms, literals and (entity, attribute, value) triples.
//! * [`variable`] – Variable identities and their allocator.
//! * [`binding`] – Union-find unification with bounds and uniqueness constraints.
//! * [`lattice`] – Maximal consistent subsets over a hard constraint.
//! * [`schema`] – Attribute names, invariants and inverse aliases.
//! * [`pattern`] – Nested entity patterns compiled into triples.
//! * [`construction`] – Construction definitions and their compiled form.
//! * [`precompute`] / [`grammar`] – Producer/consumer precomputation at load time.
//! * [`kb`] – The knowledge base seam and an in-memory implementation.
//! * [`search`] – The runtime search space: nodes, partials, ticks and results.
//! * [`config`] – Engine settings read with the `config` crate.
//!
//! ## Quick Start
//! ```
//! use scg::binding::Binding;
//! use scg::triple::Term;
//! use scg::variable::VariableAllocator;
//!
//! let mut vars = VariableAllocator::new();
//! let (x, y) = (Term::Var(vars.named("x")), Term::Var(vars.named("y")));
//! let b = Binding::new().unify(&x, &y).unify(&y, &Term::lit(42));
//! assert_eq!(b.walk(&x), Term::lit(42));
//! assert!(!b.unify(&x, &Term::lit(7)).is_valid());
//! ```
//!
//! ## Status
//! The search is single-writer: subscriptions forward records over a channel
//! and the owner of the [`search::SearchSpace`] applies them between ticks.
//! Expect API changes while the construction language settles.

pub mod binding;
pub mod config;
pub mod construction;
pub mod error;
pub mod grammar;
pub mod kb;
pub mod lattice;
pub mod pattern;
pub mod precompute;
pub mod schema;
pub mod search;
pub mod triple;
pub mod variable;
