//! The knowledge base seen by the engine.
//!
//! The engine only needs three things from a store of facts: its schema, a
//! synchronous snapshot query for guards, and a monotonic subscription that
//! keeps delivering query results as facts arrive. [`MemoryKb`] is a small
//! in-memory implementation used by the binary, tests and benchmarks.

use std::collections::{BTreeMap, BTreeSet};
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use futures_util::stream::Stream;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::binding::Binding;
use crate::error::{Result, ScgError};
use crate::schema::Schema;
use crate::triple::{Term, Triple, TripleIndex};
use crate::variable::Variable;

/// One query result, mapping projected variable names to ground terms.
pub type Record = BTreeMap<String, Term>;

pub type RecordStream = Pin<Box<dyn Stream<Item = Record> + Send>>;

// ------------- Query -------------
/// A conjunctive pattern over facts together with the named variables whose
/// values make up each record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    triples: TripleIndex,
    projection: Vec<(String, Variable)>,
}

impl Query {
    pub fn new(triples: TripleIndex, projection: Vec<(String, Variable)>) -> Self {
        Self { triples, projection }
    }
    pub fn triples(&self) -> &TripleIndex {
        &self.triples
    }
    pub fn projection(&self) -> &[(String, Variable)] {
        &self.projection
    }
}

/// Evaluates a query against ground facts by backtracking unification.
/// An empty query has exactly one, empty, result.
pub fn evaluate(facts: &TripleIndex, query: &Query) -> Vec<Record> {
    let patterns: Vec<&Triple> = query.triples.iter().collect();
    let mut records = BTreeSet::new();
    solve(facts, &patterns, &Binding::new(), &query.projection, &mut records);
    records.into_iter().collect()
}

fn solve(
    facts: &TripleIndex,
    patterns: &[&Triple],
    binding: &Binding,
    projection: &[(String, Variable)],
    records: &mut BTreeSet<Record>,
) {
    let Some((first, rest)) = patterns.split_first() else {
        let record: Record = projection
            .iter()
            .map(|(name, variable)| (name.clone(), binding.walk(&Term::Var(variable.clone()))))
            .collect();
        if record.values().all(|t| !t.is_variable()) {
            records.insert(record);
        }
        return;
    };
    for (_, fact) in facts.by_attribute(first.a) {
        let next = binding.unify_triple(first, fact);
        if next.is_valid() {
            solve(facts, rest, &next, projection, records);
        }
    }
}

// ------------- KnowledgeBase -------------
pub trait KnowledgeBase: Send + Sync {
    fn schema(&self) -> &Schema;
    /// All current results of the query.
    fn query(&self, query: &Query) -> Result<Vec<Record>>;
    /// Current and future results of the query. Records may repeat.
    fn subscribe(&self, query: &Query) -> Result<RecordStream>;
}

// ------------- MemoryKb -------------
struct Subscriber {
    query: Query,
    sender: UnboundedSender<Record>,
}

#[derive(Default)]
struct Store {
    facts: TripleIndex,
    subscribers: Vec<Subscriber>,
}

#[derive(Clone)]
pub struct MemoryKb {
    schema: Arc<Schema>,
    store: Arc<RwLock<Store>>,
}

impl MemoryKb {
    pub fn new(schema: Schema) -> Self {
        Self { schema: Arc::new(schema), store: Arc::new(RwLock::new(Store::default())) }
    }
    /// Adds ground facts and returns how many of them were new. Every live
    /// subscription is re-evaluated and sent its full result set.
    pub fn assert(&self, triples: impl IntoIterator<Item = Triple>) -> Result<usize> {
        let triples: Vec<Triple> = triples.into_iter().collect();
        if let Some(t) = triples.iter().find(|t| !t.is_ground()) {
            return Err(ScgError::Knowledge(format!("cannot assert non-ground triple {}", t)));
        }
        let mut store = self.store.write()?;
        let added = triples.into_iter().filter(|t| store.facts.insert(t.clone())).count();
        if added > 0 {
            let Store { facts, subscribers } = &mut *store;
            subscribers.retain(|s| evaluate(facts, &s.query).into_iter().all(|r| s.sender.send(r).is_ok()));
        }
        debug!(added, facts = store.facts.len(), subscribers = store.subscribers.len(), "facts asserted");
        Ok(added)
    }
}

impl KnowledgeBase for MemoryKb {
    fn schema(&self) -> &Schema {
        &self.schema
    }
    fn query(&self, query: &Query) -> Result<Vec<Record>> {
        let store = self.store.read()?;
        Ok(evaluate(&store.facts, query))
    }
    fn subscribe(&self, query: &Query) -> Result<RecordStream> {
        let mut store = self.store.write()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        for record in evaluate(&store.facts, query) {
            // the receiver is still in hand, so this cannot fail
            let _ = sender.send(record);
        }
        store.subscribers.push(Subscriber { query: query.clone(), sender });
        Ok(Box::pin(UnboundedReceiverStream::new(receiver)))
    }
}
