//! The runtime search space.
//!
//! Fired constructions become [`Node`]s. Through the grammar's precomps each
//! node yields [`Partial`]s, which are queued on the construction they
//! partially satisfy. A [`SearchSpace::tick`] takes the most recent queued
//! partial of one construction as its seed, looks for sets of registered
//! partials that together cover the whole match pattern, asks the guard, and
//! fires the construction for every surviving binding.
//!
//! Source constructions fire from knowledge-base subscriptions. Each one is
//! served by a tokio task that only forwards records into the inbox; records
//! are applied when the owner calls [`SearchSpace::drain_sources`] or
//! [`SearchSpace::pump`], so the search space itself has a single writer.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use roaring::{RoaringBitmap, RoaringTreemap};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::binding::Binding;
use crate::config::{CoveringPolicy, EngineConfig};
use crate::construction::{CxnId, GuardVars};
use crate::error::{Result, ScgError};
use crate::grammar::Grammar;
use crate::kb::{KnowledgeBase, Record};
use crate::lattice::maximal_consistent_subsets;
use crate::precompute::PrecompId;
use crate::triple::{Term, Triple};
use crate::variable::{IdGenerator, Renaming, Variable, VariableAllocator};

// ------------- identities -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartialId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}
impl fmt::Display for PartialId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

// ------------- Node -------------
/// A fired construction.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    cxn_id: CxnId,
    binding: Binding,
    parent_partials: Vec<PartialId>,
    ancestors: RoaringTreemap,
    depth: usize,
    union_variables: Vec<Variable>,
    created: DateTime<Utc>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }
    pub fn cxn_id(&self) -> &CxnId {
        &self.cxn_id
    }
    pub fn binding(&self) -> &Binding {
        &self.binding
    }
    pub fn parent_partials(&self) -> &[PartialId] {
        &self.parent_partials
    }
    /// Every node this one was derived from, transitively.
    pub fn ancestors(&self) -> &RoaringTreemap {
        &self.ancestors
    }
    pub fn depth(&self) -> usize {
        self.depth
    }
    /// The instance of the construction's variables the binding talks about.
    pub fn union_variables(&self) -> &[Variable] {
        &self.union_variables
    }
    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }
}

// ------------- Partial -------------
/// Evidence that a node satisfies part of another construction's match pattern.
#[derive(Debug, Clone)]
pub struct Partial {
    id: PartialId,
    precomp_id: PrecompId,
    cxn_id: CxnId,
    merged_cxn_id: CxnId,
    parent_node: NodeId,
    matching_variables: Vec<Variable>,
    merging_variables: Vec<Variable>,
    binding: Binding,
    touched: RoaringBitmap,
}

impl Partial {
    pub fn id(&self) -> PartialId {
        self.id
    }
    pub fn precomp_id(&self) -> PrecompId {
        self.precomp_id
    }
    /// The construction this partial helps to match.
    pub fn cxn_id(&self) -> &CxnId {
        &self.cxn_id
    }
    /// The construction whose firing produced this partial.
    pub fn merged_cxn_id(&self) -> &CxnId {
        &self.merged_cxn_id
    }
    pub fn parent_node(&self) -> NodeId {
        self.parent_node
    }
    pub fn matching_variables(&self) -> &[Variable] {
        &self.matching_variables
    }
    pub fn merging_variables(&self) -> &[Variable] {
        &self.merging_variables
    }
    pub fn binding(&self) -> &Binding {
        &self.binding
    }
    pub fn touched(&self) -> &RoaringBitmap {
        &self.touched
    }
}

/// A set of partials that together touch every match triple of a construction.
#[derive(Debug, Clone)]
pub struct Covering {
    pub partials: BTreeSet<PartialId>,
    pub variables: Vec<Variable>,
    pub binding: Binding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchEvent {
    NodeAdded(NodeId),
    PartialQueued(PartialId),
    PartialDequeued(PartialId),
}

struct CoverState {
    remaining_seed: RoaringBitmap,
    remaining: RoaringBitmap,
    partials: BTreeSet<PartialId>,
    binding: Binding,
}

type CoverHeap = BinaryHeap<(Reverse<u64>, Reverse<usize>)>;

// Fewest remaining match triples first, then oldest first.
fn enqueue(heap: &mut CoverHeap, states: &mut Vec<Option<CoverState>>, state: CoverState) {
    heap.push((Reverse(state.remaining.len()), Reverse(states.len())));
    states.push(Some(state));
}

struct Provisional {
    frontier: Vec<NodeId>,
    included: BTreeSet<NodeId>,
    binding: Binding,
}

// ------------- SearchSpace -------------
pub struct SearchSpace {
    grammar: Arc<Grammar>,
    kb: Arc<dyn KnowledgeBase>,
    covering: CoveringPolicy,
    max_ticks: usize,
    allocator: VariableAllocator,
    ids: IdGenerator,
    cxn_log: Vec<CxnId>,
    nodes: BTreeMap<NodeId, Node>,
    partials: HashMap<PartialId, Partial>,
    partials_by_cxn_and_index: HashMap<(CxnId, u32), Vec<PartialId>>,
    queued: HashMap<CxnId, Vec<PartialId>>,
    source_results: HashMap<CxnId, HashSet<Record>>,
    inbox: UnboundedReceiver<(CxnId, Record)>,
    subscriptions: HashMap<CxnId, JoinHandle<()>>,
    events: Option<UnboundedSender<SearchEvent>>,
}

impl SearchSpace {
    /// Subscribes every source construction's query on the knowledge base.
    /// Needs a tokio runtime when the grammar has sources.
    pub fn new(grammar: Arc<Grammar>, kb: Arc<dyn KnowledgeBase>, config: &EngineConfig) -> Result<Self> {
        let (sender, inbox) = mpsc::unbounded_channel();
        let mut subscriptions = HashMap::new();
        let mut source_results = HashMap::new();

        if grammar.sources().next().is_some() {
            let handle = Handle::try_current()
                .map_err(|e| ScgError::Runtime(format!("source subscriptions need a tokio runtime: {}", e)))?;
            for source in grammar.sources() {
                let id = source.id().clone();
                let query = source
                    .query()
                    .ok_or_else(|| ScgError::Invariant(format!("source construction '{}' has no query", id)))?;
                let mut stream = kb.subscribe(query)?;
                let sender = sender.clone();
                let forwarded = id.clone();
                let task = handle.spawn(async move {
                    while let Some(record) = stream.next().await {
                        if sender.send((forwarded.clone(), record)).is_err() {
                            break;
                        }
                    }
                    debug!(source = %forwarded, "subscription ended");
                });
                subscriptions.insert(id.clone(), task);
                source_results.insert(id, HashSet::new());
            }
        }
        info!(
            constructions = grammar.constructions().len(),
            subscriptions = subscriptions.len(),
            covering = ?config.covering,
            "search space ready"
        );

        let allocator = grammar.allocator().clone();
        let queued = grammar.construction_ids().map(|id| (id.clone(), Vec::new())).collect();
        Ok(Self {
            grammar,
            kb,
            covering: config.covering,
            max_ticks: config.max_ticks,
            allocator,
            ids: IdGenerator::new(),
            cxn_log: Vec::new(),
            nodes: BTreeMap::new(),
            partials: HashMap::new(),
            partials_by_cxn_and_index: HashMap::new(),
            queued,
            source_results,
            inbox,
            subscriptions,
            events: None,
        })
    }

    // ------------- accessors -------------
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }
    pub fn partials(&self) -> impl Iterator<Item = &Partial> {
        self.partials.values()
    }
    pub fn partial(&self, id: PartialId) -> Option<&Partial> {
        self.partials.get(&id)
    }
    pub fn queue_len(&self, cxn: &str) -> usize {
        self.queued.get(cxn).map_or(0, Vec::len)
    }
    pub fn has_queued(&self) -> bool {
        self.queued.values().any(|q| !q.is_empty())
    }
    pub fn cxn_log(&self) -> &[CxnId] {
        &self.cxn_log
    }
    /// Starts reporting search events. A later call replaces the earlier receiver.
    pub fn events(&mut self) -> UnboundedReceiver<SearchEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.events = Some(sender);
        receiver
    }

    fn emit(&mut self, event: SearchEvent) {
        if let Some(sender) = &self.events {
            if sender.send(event).is_err() {
                self.events = None;
            }
        }
    }

    // ------------- sources -------------
    /// Applies every record that has already arrived, without waiting.
    /// Returns the number of nodes created.
    pub fn drain_sources(&mut self) -> Result<usize> {
        let mut created = 0;
        while let Ok((cxn, record)) = self.inbox.try_recv() {
            if self.register_source_result(cxn.as_str(), record)?.is_some() {
                created += 1;
            }
        }
        Ok(created)
    }

    /// Waits for at least one record, then drains whatever else has arrived.
    /// Returns zero once every subscription has ended.
    pub async fn pump(&mut self) -> Result<usize> {
        let Some((cxn, record)) = self.inbox.recv().await else {
            return Ok(0);
        };
        let mut created = usize::from(self.register_source_result(cxn.as_str(), record)?.is_some());
        tokio::task::yield_now().await;
        created += self.drain_sources()?;
        Ok(created)
    }

    /// Pumps until no record has arrived for `idle`.
    pub async fn pump_until_idle(&mut self, idle: Duration) -> Result<usize> {
        let mut created = 0;
        while let Ok(Some((cxn, record))) = tokio::time::timeout(idle, self.inbox.recv()).await {
            if self.register_source_result(cxn.as_str(), record)?.is_some() {
                created += 1;
            }
        }
        Ok(created)
    }

    /// Fires a source construction for one query result, unless the same
    /// result was seen before.
    pub fn register_source_result(&mut self, cxn: &str, record: Record) -> Result<Option<NodeId>> {
        let grammar = Arc::clone(&self.grammar);
        let source = grammar
            .construction(cxn)
            .filter(|c| c.is_source())
            .ok_or_else(|| ScgError::UnknownConstruction(cxn.to_string()))?;
        if !self.source_results.entry(source.id().clone()).or_default().insert(record.clone()) {
            return Ok(None);
        }
        let instance = source.fresh(&mut self.allocator);
        let binding = instance.binding.unify_all(
            instance
                .variables
                .iter()
                .filter_map(|v| record.get(v.name()).map(|t| (Term::Var(v.clone()), t.clone()))),
        );
        if let Some(error) = binding.error() {
            debug!(source = %cxn, %error, "record does not fit its source construction");
            return Ok(None);
        }
        let (node, _) = self.add_node(source.id().clone(), binding, Vec::new(), instance.variables)?;
        Ok(Some(node))
    }

    // ------------- nodes and partials -------------
    fn add_node(
        &mut self,
        cxn_id: CxnId,
        binding: Binding,
        parent_partials: Vec<PartialId>,
        union_variables: Vec<Variable>,
    ) -> Result<(NodeId, Vec<PartialId>)> {
        let mut depth = 0;
        let mut ancestors = RoaringTreemap::new();
        for partial in &parent_partials {
            let parent = self
                .partials
                .get(partial)
                .and_then(|p| self.nodes.get(&p.parent_node))
                .ok_or_else(|| ScgError::Invariant(format!("partial {} has no parent node", partial)))?;
            depth = depth.max(parent.depth + 1);
            ancestors.insert(parent.id.0);
            ancestors |= &parent.ancestors;
        }
        let id = NodeId(self.ids.generate());
        self.nodes.insert(
            id,
            Node { id, cxn_id, binding, parent_partials, ancestors, depth, union_variables, created: Utc::now() },
        );
        self.emit(SearchEvent::NodeAdded(id));

        let mut queued = Vec::new();
        for partial in self.partials_for_node(id)? {
            if !partial.binding.is_valid() {
                continue;
            }
            let partial_id = partial.id;
            self.queued.entry(partial.cxn_id.clone()).or_default().push(partial_id);
            self.partials.insert(partial_id, partial);
            self.emit(SearchEvent::PartialQueued(partial_id));
            queued.push(partial_id);
        }
        debug!(node = %id, depth, partials = queued.len(), "node added");
        Ok((id, queued))
    }

    /// Derives one partial per precomp whose merge side is the node's
    /// construction. Invalid partials are returned as well; callers decide.
    pub fn partials_for_node(&mut self, node: NodeId) -> Result<Vec<Partial>> {
        let grammar = Arc::clone(&self.grammar);
        let node = self.nodes.get(&node).ok_or(ScgError::UnknownNode(node.0))?;
        let mut partials = Vec::new();
        for &precomp_id in grammar.precomps_for_merge(node.cxn_id.as_str()) {
            let precomp = grammar
                .precomp(precomp_id)
                .ok_or_else(|| ScgError::Invariant(format!("missing precomp {}", precomp_id.0)))?;
            let instance = precomp.fresh(&mut self.allocator);
            let pairs = node
                .union_variables
                .iter()
                .zip(&instance.merging_variables)
                .map(|(old, new)| (Term::Var(old.clone()), Term::Var(new.clone())));
            let binding = Binding::merge([&node.binding, &instance.binding]).unify_all(pairs);
            partials.push(Partial {
                id: PartialId(self.ids.generate()),
                precomp_id,
                cxn_id: precomp.matching_id().clone(),
                merged_cxn_id: precomp.merging_id().clone(),
                parent_node: node.id,
                matching_variables: instance.matching_variables,
                merging_variables: instance.merging_variables,
                binding,
                touched: precomp.touched().clone(),
            });
        }
        Ok(partials)
    }

    // ------------- tick -------------
    /// Tries to fire one construction: the named one, or the next in
    /// round-robin order. Returns the partials queued by the new nodes.
    pub fn tick(&mut self, cxn: Option<&str>) -> Result<Vec<PartialId>> {
        let grammar = Arc::clone(&self.grammar);
        let cxn = match cxn {
            Some(id) => grammar.construction(id).ok_or_else(|| ScgError::UnknownConstruction(id.to_string()))?,
            None => {
                let all = grammar.constructions();
                if all.is_empty() {
                    return Ok(Vec::new());
                }
                &all[self.cxn_log.len() % all.len()]
            }
        };
        self.cxn_log.push(cxn.id().clone());

        if cxn.matching_triples().is_empty() {
            return Ok(Vec::new());
        }
        let Some(seed_id) = self.queued.get_mut(cxn.id().as_str()).and_then(Vec::pop) else {
            return Ok(Vec::new());
        };

        let coverings = self.covering_partials(cxn.id().as_str(), seed_id)?;
        let mut new_partials = Vec::new();
        let mut fired = 0;
        for covering in &coverings {
            if !covering.binding.is_valid() {
                continue;
            }
            let bindings: Vec<Binding> = match cxn.guard() {
                Some(guard) => {
                    let vars: GuardVars = covering
                        .variables
                        .iter()
                        .filter(|v| v.is_named())
                        .map(|v| (v.name().to_string(), covering.binding.walk(&Term::Var(v.clone()))))
                        .collect();
                    guard(&covering.binding, self.kb.as_ref(), &vars).into_iter().filter(Binding::is_valid).collect()
                }
                None => vec![covering.binding.clone()],
            };
            if bindings.is_empty() {
                debug!(cxn = %cxn.id(), "guard rejected covering");
            }
            for binding in bindings {
                let parents = covering.partials.iter().copied().collect();
                let (_, queued) = self.add_node(cxn.id().clone(), binding, parents, covering.variables.clone())?;
                new_partials.extend(queued);
                fired += 1;
            }
        }

        let seed = self
            .partials
            .get(&seed_id)
            .ok_or_else(|| ScgError::Invariant(format!("queued partial {} is unknown", seed_id)))?;
        for index in seed.touched.iter() {
            self.partials_by_cxn_and_index.entry((seed.cxn_id.clone(), index)).or_default().push(seed_id);
        }
        self.emit(SearchEvent::PartialDequeued(seed_id));

        debug!(
            cxn = %cxn.id(),
            seed = %seed_id,
            coverings = coverings.len(),
            fired,
            partials = new_partials.len(),
            "tick"
        );
        Ok(new_partials)
    }

    /// Searches for sets of registered partials that, together with the seed,
    /// touch every match triple of the construction. States with the fewest
    /// remaining triples are expanded first.
    pub fn covering_partials(&self, cxn: &str, seed: PartialId) -> Result<Vec<Covering>> {
        let construction = self.grammar.construction(cxn).ok_or_else(|| ScgError::UnknownConstruction(cxn.to_string()))?;
        let seed = self
            .partials
            .get(&seed)
            .ok_or_else(|| ScgError::Invariant(format!("seed partial {} is unknown", seed)))?;
        let variables = &seed.matching_variables;

        let mut states: Vec<Option<CoverState>> = Vec::new();
        let mut heap = BinaryHeap::new();
        enqueue(
            &mut heap,
            &mut states,
            CoverState {
                remaining_seed: seed.touched.clone(),
                remaining: construction.matching_triples() - &seed.touched,
                partials: BTreeSet::from([seed.id]),
                binding: seed.binding.clone(),
            },
        );

        let mut coverings: Vec<Covering> = Vec::new();
        while let Some((_, Reverse(slot))) = heap.pop() {
            let Some(state) = states.get_mut(slot).and_then(Option::take) else { continue };
            if state.remaining_seed.is_empty() {
                continue;
            }
            let Some(index) = state.remaining.min() else {
                if !coverings.iter().any(|c| c.partials.is_subset(&state.partials)) {
                    coverings.push(Covering {
                        partials: state.partials,
                        variables: variables.clone(),
                        binding: state.binding,
                    });
                    if self.covering == CoveringPolicy::FirstFound {
                        break;
                    }
                }
                continue;
            };
            let key = (construction.id().clone(), index);
            for partial_id in self.partials_by_cxn_and_index.get(&key).into_iter().flatten() {
                let Some(partial) = self.partials.get(partial_id) else { continue };
                let pairs = variables
                    .iter()
                    .zip(&partial.matching_variables)
                    .map(|(mine, theirs)| (Term::Var(mine.clone()), Term::Var(theirs.clone())));
                let binding = Binding::merge([&state.binding, &partial.binding]).unify_all(pairs);
                if !binding.is_valid() {
                    continue;
                }
                let mut partials = state.partials.clone();
                partials.insert(*partial_id);
                enqueue(
                    &mut heap,
                    &mut states,
                    CoverState {
                        remaining_seed: &state.remaining_seed - &partial.touched,
                        remaining: &state.remaining - &partial.touched,
                        partials,
                        binding,
                    },
                );
            }
        }
        Ok(coverings)
    }

    /// Drains sources and ticks round-robin until nothing is queued, or until
    /// `max_ticks` (the configured limit when `None`) ticks have been spent.
    pub fn run_until_quiescent(&mut self, max_ticks: Option<usize>) -> Result<usize> {
        let limit = max_ticks.unwrap_or(self.max_ticks);
        let mut ticks = 0;
        loop {
            self.drain_sources()?;
            if !self.has_queued() {
                break;
            }
            if ticks >= limit {
                warn!(ticks, "tick limit reached with partials still queued");
                break;
            }
            self.tick(None)?;
            ticks += 1;
        }
        info!(ticks, nodes = self.nodes.len(), partials = self.partials.len(), "search quiescent");
        Ok(ticks)
    }

    // ------------- results -------------
    fn parent_nodes<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = NodeId> + 'a {
        node.parent_partials.iter().filter_map(|p| self.partials.get(p)).map(|p| p.parent_node)
    }

    fn ancestry<'a>(&self, ids: impl Iterator<Item = &'a NodeId>) -> RoaringTreemap {
        let mut all = RoaringTreemap::new();
        for node in ids.filter_map(|id| self.nodes.get(id)) {
            all |= &node.ancestors;
        }
        all
    }

    fn merged_with<'a>(&'a self, base: Option<&'a Binding>, members: &[NodeId]) -> Binding {
        let bindings = members.iter().filter_map(|m| self.nodes.get(m)).map(|n| &n.binding);
        Binding::merge(base.into_iter().chain(bindings))
    }

    /// Assembles the maximal consistent combinations of nodes. Root nodes,
    /// those no other node was derived from, are combined first; each result
    /// is then extended layer by layer with the parents of the nodes it left
    /// out, as long as they add knowledge and stay consistent.
    pub fn generate_parsing_results(&self) -> Vec<Vec<NodeId>> {
        let inner: HashSet<NodeId> = self.nodes.values().flat_map(|n| self.parent_nodes(n)).collect();
        let roots: Vec<NodeId> = self.nodes.keys().copied().filter(|id| !inner.contains(id)).collect();

        let mut provisionals: VecDeque<Provisional> =
            maximal_consistent_subsets(roots.iter().copied(), |members| self.merged_with(None, members))
                .into_iter()
                .map(|subset| Provisional {
                    frontier: roots.clone(),
                    included: subset.members.into_iter().collect(),
                    binding: subset.binding,
                })
                .collect();

        let mut results: Vec<BTreeSet<NodeId>> = Vec::new();
        while let Some(provisional) = provisionals.pop_front() {
            let mut candidates: BTreeSet<NodeId> = provisional
                .frontier
                .iter()
                .filter(|id| !provisional.included.contains(id))
                .filter_map(|id| self.nodes.get(id))
                .flat_map(|n| self.parent_nodes(n))
                .collect();
            let covered = self.ancestry(provisional.included.iter());
            let shadowed = self.ancestry(candidates.iter());
            candidates.retain(|c| !provisional.included.contains(c) && !covered.contains(c.0) && !shadowed.contains(c.0));

            if candidates.is_empty() {
                if !results.iter().any(|r| provisional.included.is_subset(r)) {
                    results.retain(|r| !r.is_subset(&provisional.included));
                    results.push(provisional.included);
                }
                continue;
            }

            let frontier: Vec<NodeId> = candidates.iter().copied().collect();
            let extensions = maximal_consistent_subsets(frontier.iter().copied(), |members| {
                self.merged_with(Some(&provisional.binding), members)
            });
            if extensions.is_empty() {
                provisionals.push_back(Provisional { frontier, ..provisional });
                continue;
            }
            for extension in extensions {
                let mut included = provisional.included.clone();
                included.extend(extension.members);
                if provisionals.iter().any(|p| included.is_subset(&p.included)) {
                    continue;
                }
                provisionals.push_back(Provisional { frontier: frontier.clone(), included, binding: extension.binding });
            }
        }

        let mut results: Vec<Vec<NodeId>> = results.into_iter().map(|r| r.into_iter().collect()).collect();
        results.sort();
        results
    }

    /// Collects the merge triples of the given nodes and all their ancestors,
    /// substituted through the merged binding of the given nodes.
    pub fn extract_triples(&self, node_ids: &[NodeId]) -> Result<(Vec<Triple>, Binding)> {
        let mut leaves = Vec::new();
        for id in node_ids {
            leaves.push(self.nodes.get(id).ok_or(ScgError::UnknownNode(id.0))?);
        }
        let binding = Binding::merge(leaves.iter().map(|n| &n.binding));

        let mut triples = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut work: Vec<NodeId> = node_ids.to_vec();
        while let Some(id) = work.pop() {
            if !visited.insert(id) {
                continue;
            }
            let node = self.nodes.get(&id).ok_or(ScgError::UnknownNode(id.0))?;
            let cxn = self
                .grammar
                .construction(node.cxn_id.as_str())
                .ok_or_else(|| ScgError::UnknownConstruction(node.cxn_id.to_string()))?;
            let renaming: Renaming =
                cxn.variables().iter().cloned().zip(node.union_variables.iter().cloned()).collect();
            triples.extend(cxn.merging().rename(&renaming).iter().map(|t| binding.walk_triple(t)));
            work.extend(self.parent_nodes(node));
        }
        Ok((triples.into_iter().collect(), binding))
    }
}

impl Drop for SearchSpace {
    fn drop(&mut self) {
        for task in self.subscriptions.values() {
            task.abort();
        }
    }
}

impl fmt::Debug for SearchSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchSpace")
            .field("nodes", &self.nodes.len())
            .field("partials", &self.partials.len())
            .field("queued", &self.queued.values().map(Vec::len).sum::<usize>())
            .field("ticks", &self.cxn_log.len())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
