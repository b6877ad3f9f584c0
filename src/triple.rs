//! Entity-attribute-value triples and the attribute-indexed `TripleIndex`.
//!
//! Both entity and value positions hold a [`Term`]: an identifier, a
//! [`Variable`] or an opaque atomic [`Literal`]. The attribute is always an
//! identifier declared in the [`crate::schema::Schema`].

use core::hash::BuildHasherDefault;
use seahash::SeaHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::variable::{Renaming, Variable};

// ------------- Id -------------
pub type Id = u64;

pub type AttributeHasher = BuildHasherDefault<SeaHasher>;

// ------------- Literal -------------
/// Atomic values. The derived ordering is the total order used by bounds
/// constraints: every integer sorts before every string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Str(String),
}
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Str(s) => write!(f, "{:?}", s),
        }
    }
}
impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Int(i)
    }
}
impl From<i32> for Literal {
    fn from(i: i32) -> Self {
        Literal::Int(i.into())
    }
}
impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Str(s.to_string())
    }
}
impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Str(s)
    }
}

// ------------- Term -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Var(Variable),
    Id(Id),
    Lit(Literal),
}
impl Term {
    pub fn lit(literal: impl Into<Literal>) -> Self {
        Term::Lit(literal.into())
    }
    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Var(_))
    }
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Term::Var(v) => Some(v),
            _ => None,
        }
    }
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Lit(l) => Some(l),
            _ => None,
        }
    }
    pub fn rename(&self, renaming: &Renaming) -> Term {
        match self {
            Term::Var(v) => Term::Var(renaming.get(v).cloned().unwrap_or_else(|| v.clone())),
            other => other.clone(),
        }
    }
}
impl From<Variable> for Term {
    fn from(v: Variable) -> Self {
        Term::Var(v)
    }
}
impl From<Literal> for Term {
    fn from(l: Literal) -> Self {
        Term::Lit(l)
    }
}
impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Term::Var(v) => write!(f, "{}", v),
            Term::Id(id) => write!(f, "#{}", id),
            Term::Lit(l) => write!(f, "{}", l),
        }
    }
}

// ------------- Triple -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub e: Term,
    pub a: Id,
    pub v: Term,
}
impl Triple {
    pub fn new(e: impl Into<Term>, a: Id, v: impl Into<Term>) -> Self {
        Self { e: e.into(), a, v: v.into() }
    }
    pub fn rename(&self, renaming: &Renaming) -> Triple {
        Triple { e: self.e.rename(renaming), a: self.a, v: self.v.rename(renaming) }
    }
    /// True when neither position holds a variable, i.e. the triple is a fact.
    pub fn is_ground(&self) -> bool {
        !self.e.is_variable() && !self.v.is_variable()
    }
}
impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.e, self.a, self.v)
    }
}

// ------------- TripleIndex -------------
/// A duplicate-free collection of triples indexed by attribute. Triples keep
/// their insertion order; the position of a triple is the match-triple index
/// that precomputation and covering refer to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripleIndex {
    triples: Vec<Triple>,
    members: HashSet<Triple, AttributeHasher>,
    by_attribute: HashMap<Id, Vec<usize>, AttributeHasher>,
}

impl TripleIndex {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with(mut self, triples: impl IntoIterator<Item = Triple>) -> Self {
        for triple in triples {
            self.insert(triple);
        }
        self
    }
    /// Adds a triple, returning false if it was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        if !self.members.insert(triple.clone()) {
            return false;
        }
        let position = self.triples.len();
        self.by_attribute.entry(triple.a).or_default().push(position);
        self.triples.push(triple);
        true
    }
    pub fn remove(&mut self, triple: &Triple) -> bool {
        if !self.contains(triple) {
            return false;
        }
        let kept: Vec<Triple> = self.triples.drain(..).filter(|t| t != triple).collect();
        self.members.clear();
        self.by_attribute.clear();
        for t in kept {
            self.insert(t);
        }
        true
    }
    pub fn contains(&self, triple: &Triple) -> bool {
        self.members.contains(triple)
    }
    pub fn union(&self, other: &TripleIndex) -> TripleIndex {
        self.clone().with(other.iter().cloned())
    }
    pub fn difference(&self, other: &TripleIndex) -> TripleIndex {
        TripleIndex::new().with(self.iter().filter(|t| !other.contains(t)).cloned())
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Triple> {
        self.triples.iter()
    }
    pub fn get(&self, position: usize) -> Option<&Triple> {
        self.triples.get(position)
    }
    /// Triples with the given attribute, paired with their positions.
    pub fn by_attribute(&self, attribute: Id) -> impl Iterator<Item = (usize, &Triple)> {
        self.by_attribute
            .get(&attribute)
            .into_iter()
            .flatten()
            .map(move |&p| (p, &self.triples[p]))
    }
    pub fn len(&self) -> usize {
        self.triples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }
    /// Structurally identical copy with entity and value variables substituted.
    pub fn rename(&self, renaming: &Renaming) -> TripleIndex {
        TripleIndex::new().with(self.iter().map(|t| t.rename(renaming)))
    }
    /// Distinct variables in entity and value positions, in order of appearance.
    pub fn variables(&self) -> Vec<Variable> {
        let mut seen = Vec::new();
        for t in &self.triples {
            for term in [&t.e, &t.v] {
                if let Term::Var(v) = term {
                    if !seen.contains(v) {
                        seen.push(v.clone());
                    }
                }
            }
        }
        seen
    }
}

impl FromIterator<Triple> for TripleIndex {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        TripleIndex::new().with(iter)
    }
}

impl<'a> IntoIterator for &'a TripleIndex {
    type Item = &'a Triple;
    type IntoIter = std::slice::Iter<'a, Triple>;
    fn into_iter(self) -> Self::IntoIter {
        self.triples.iter()
    }
}
