//! Constructions: declarative rules that, once their match pattern is
//! satisfied and their guard agrees, assert their merge pattern.
//!
//! A [`Construction`] is written with a builder and compiled against a
//! [`Schema`] into a [`CompiledConstruction`]. Source constructions have no
//! match pattern; they fire whenever their query has a new result in the
//! knowledge base.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

// sets of match-triple indices
use roaring::RoaringBitmap;

use serde::{Deserialize, Serialize};

use crate::binding::Binding;
use crate::error::{Result, ScgError};
use crate::kb::{KnowledgeBase, Query};
use crate::pattern::{EntityPattern, PatternScope, Position};
use crate::schema::Schema;
use crate::triple::{Term, TripleIndex};
use crate::variable::{Variable, VariableAllocator};

// ------------- CxnId -------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CxnId(Arc<str>);

impl CxnId {
    pub fn new(id: &str) -> Self {
        Self(Arc::from(id))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl Borrow<str> for CxnId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
impl From<&str> for CxnId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
impl fmt::Display for CxnId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ------------- Guard -------------
/// Walked values of the construction's named variables, handed to guards.
pub type GuardVars = BTreeMap<String, Term>;

/// An external predicate deciding whether, and how, a satisfied match pattern
/// may fire. Returning no bindings rejects the candidate; returning several
/// fires the construction once per binding.
pub type Guard = Arc<dyn Fn(&Binding, &dyn KnowledgeBase, &GuardVars) -> Vec<Binding> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Inner,
    Source,
}

// ------------- Construction -------------
pub struct Construction {
    id: CxnId,
    kind: Kind,
    vars: Vec<String>,
    matching: Vec<EntityPattern>,
    merging: Vec<EntityPattern>,
    query: Vec<EntityPattern>,
    guard: Option<Guard>,
    bounds: Vec<(Position, Position)>,
    distinct: Vec<Vec<Position>>,
}

impl Construction {
    pub fn new(id: &str) -> Self {
        Self::with_kind(id, Kind::Inner)
    }
    pub fn source(id: &str) -> Self {
        Self::with_kind(id, Kind::Source)
    }
    fn with_kind(id: &str, kind: Kind) -> Self {
        Self {
            id: CxnId::new(id),
            kind,
            vars: Vec::new(),
            matching: Vec::new(),
            merging: Vec::new(),
            query: Vec::new(),
            guard: None,
            bounds: Vec::new(),
            distinct: Vec::new(),
        }
    }
    pub fn id(&self) -> &CxnId {
        &self.id
    }
    pub fn kind(&self) -> Kind {
        self.kind
    }
    pub fn vars<'s>(mut self, names: impl IntoIterator<Item = &'s str>) -> Self {
        self.vars.extend(names.into_iter().map(str::to_string));
        self
    }
    pub fn matching(mut self, pattern: EntityPattern) -> Self {
        self.matching.push(pattern);
        self
    }
    pub fn merging(mut self, pattern: EntityPattern) -> Self {
        self.merging.push(pattern);
        self
    }
    pub fn query(mut self, pattern: EntityPattern) -> Self {
        self.query.push(pattern);
        self
    }
    pub fn guard<F>(mut self, guard: F) -> Self
    where
        F: Fn(&Binding, &dyn KnowledgeBase, &GuardVars) -> Vec<Binding> + Send + Sync + 'static,
    {
        self.guard = Some(Arc::new(guard));
        self
    }
    pub fn leq(mut self, lower: Position, upper: Position) -> Self {
        self.bounds.push((lower, upper));
        self
    }
    /// No two of the named variables may be bound to the same term.
    pub fn all_different<'s>(mut self, names: impl IntoIterator<Item = &'s str>) -> Self {
        self.distinct.push(names.into_iter().map(Position::var).collect());
        self
    }

    pub fn compile(&self, schema: &Schema, allocator: &mut VariableAllocator) -> Result<CompiledConstruction> {
        self.compile_inner(schema, allocator).map_err(|e| e.in_construction(self.id.as_str()))
    }

    fn compile_inner(&self, schema: &Schema, allocator: &mut VariableAllocator) -> Result<CompiledConstruction> {
        match self.kind {
            Kind::Inner if !self.query.is_empty() => {
                return Err(ScgError::pattern("only source constructions have a query"));
            }
            Kind::Source if !self.matching.is_empty() => {
                return Err(ScgError::pattern("source constructions match through their query"));
            }
            _ => {}
        }

        let mut scope = PatternScope::new(allocator);
        for name in &self.vars {
            scope.declare(name)?;
        }
        let (matching, matching_binding) = scope.compile(schema, &self.matching)?;
        let (merging, merging_binding) = scope.compile(schema, &self.merging)?;
        for (lower, upper) in &self.bounds {
            scope.leq(lower, upper)?;
        }
        for positions in &self.distinct {
            scope.all_different(positions)?;
        }
        let (variables, constraints) = scope.finish();

        let binding = Binding::merge([&matching_binding, &merging_binding, &constraints]);
        if let Some(error) = binding.error() {
            return Err(ScgError::pattern(format!("match and merge patterns contradict each other: {}", error)));
        }

        let query = match self.kind {
            Kind::Source => Some(self.compile_query(schema, allocator)?),
            Kind::Inner => None,
        };
        let clusters = match self.kind {
            Kind::Inner => independent_clusters(schema, &matching),
            Kind::Source => Vec::new(),
        };
        let matching_triples = (0..matching.len() as u32).collect();

        Ok(CompiledConstruction {
            id: self.id.clone(),
            kind: self.kind,
            binding,
            matching,
            merging,
            variables,
            guard: self.guard.clone(),
            query,
            matching_triples,
            clusters,
        })
    }

    // Queries get their own variables. Records are matched to the construction
    // by variable name.
    fn compile_query(&self, schema: &Schema, allocator: &mut VariableAllocator) -> Result<Query> {
        let mut scope = PatternScope::new(allocator);
        let mut declared = Vec::new();
        for name in &self.vars {
            declared.push((name.clone(), scope.declare(name)?));
        }
        let (triples, _) = scope.compile(schema, &self.query)?;
        let used = triples.variables();
        let projection = declared.into_iter().filter(|(_, v)| used.contains(v)).collect();
        Ok(Query::new(triples, projection))
    }
}

impl fmt::Debug for Construction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Construction")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("vars", &self.vars)
            .field("matching", &self.matching)
            .field("merging", &self.merging)
            .field("query", &self.query)
            .field("guard", &self.guard.as_ref().map(|_| "<function>"))
            .field("bounds", &self.bounds)
            .field("distinct", &self.distinct)
            .finish()
    }
}

// ------------- CompiledConstruction -------------
pub struct CompiledConstruction {
    id: CxnId,
    kind: Kind,
    binding: Binding,
    matching: TripleIndex,
    merging: TripleIndex,
    variables: Vec<Variable>,
    guard: Option<Guard>,
    query: Option<Query>,
    matching_triples: RoaringBitmap,
    clusters: Vec<RoaringBitmap>,
}

/// A copy of a construction's patterns and baseline binding over fresh
/// variables. `variables` lines up position by position with the
/// construction's own variable list.
#[derive(Debug, Clone)]
pub struct Instance {
    pub variables: Vec<Variable>,
    pub matching: TripleIndex,
    pub merging: TripleIndex,
    pub binding: Binding,
}

impl CompiledConstruction {
    pub fn id(&self) -> &CxnId {
        &self.id
    }
    pub fn kind(&self) -> Kind {
        self.kind
    }
    pub fn is_source(&self) -> bool {
        self.kind == Kind::Source
    }
    pub fn binding(&self) -> &Binding {
        &self.binding
    }
    pub fn matching(&self) -> &TripleIndex {
        &self.matching
    }
    pub fn merging(&self) -> &TripleIndex {
        &self.merging
    }
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }
    pub fn guard(&self) -> Option<&Guard> {
        self.guard.as_ref()
    }
    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }
    pub fn matching_triples(&self) -> &RoaringBitmap {
        &self.matching_triples
    }
    pub fn clusters(&self) -> &[RoaringBitmap] {
        &self.clusters
    }
    pub fn fresh(&self, allocator: &mut VariableAllocator) -> Instance {
        let (variables, renaming) = allocator.freshen(&self.variables);
        Instance {
            variables,
            matching: self.matching.rename(&renaming),
            merging: self.merging.rename(&renaming),
            binding: self.binding.rename(&renaming),
        }
    }
}

impl fmt::Debug for CompiledConstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledConstruction")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("matching", &self.matching)
            .field("merging", &self.merging)
            .field("variables", &self.variables)
            .field("guard", &self.guard.as_ref().map(|_| "<function>"))
            .field("query", &self.query)
            .field("clusters", &self.clusters)
            .finish()
    }
}

// ------------- independent clusters -------------
/// Partitions the match triples into maximal groups linked through uniqueness
/// invariants. A unique triple is anchored at its entity and reaches its
/// value; a unique-inverse triple is anchored at its value and reaches its
/// entity. Triples sharing an anchor, or where one reaches the anchor of the
/// other, end up in the same cluster. Triples whose attribute has neither
/// invariant form clusters of their own. Clusters are ordered by their
/// smallest index, constrained ones first.
pub fn independent_clusters(schema: &Schema, matching: &TripleIndex) -> Vec<RoaringBitmap> {
    // (triple index, anchor, reached endpoint); a triple may be both
    let mut edges: Vec<(usize, &Term, &Term)> = Vec::new();
    for (i, t) in matching.iter().enumerate() {
        if schema.is_unique(t.a) {
            edges.push((i, &t.e, &t.v));
        }
        if schema.is_unique_inverse(t.a) {
            edges.push((i, &t.v, &t.e));
        }
    }

    let mut anchored: HashMap<&Term, Vec<usize>> = HashMap::new();
    for &(i, anchor, _) in &edges {
        anchored.entry(anchor).or_default().push(i);
    }
    let mut neighbours: HashMap<usize, Vec<usize>> = HashMap::new();
    for &(i, anchor, reached) in &edges {
        for &j in anchored.get(anchor).into_iter().chain(anchored.get(reached)).flatten() {
            if i != j {
                neighbours.entry(i).or_default().push(j);
                neighbours.entry(j).or_default().push(i);
            }
        }
    }

    let mut clusters: Vec<RoaringBitmap> = Vec::new();
    let mut visited = HashSet::new();
    for &(start, _, _) in &edges {
        if visited.contains(&start) {
            continue;
        }
        let mut component = RoaringBitmap::new();
        let mut work = vec![start];
        while let Some(i) = work.pop() {
            if !visited.insert(i) {
                continue;
            }
            component.insert(i as u32);
            work.extend(neighbours.get(&i).into_iter().flatten().copied());
        }
        clusters.push(component);
    }
    for (i, t) in matching.iter().enumerate() {
        if !schema.is_unique(t.a) && !schema.is_unique_inverse(t.a) {
            clusters.push(RoaringBitmap::from_iter([i as u32]));
        }
    }
    clusters
}
