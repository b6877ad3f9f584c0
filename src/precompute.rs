//! Producer to consumer precomputation.
//!
//! For a producer construction (whose merge pattern asserts facts) and a
//! consumer construction (whose match pattern needs facts), we find at grammar
//! load time the maximal ways in which merge triples can satisfy match triples
//! of one independent cluster. At runtime a fired producer only has to replay
//! the stored binding to know which part of the consumer it satisfies.

use std::collections::HashSet;

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};

use crate::binding::{Binding, DISJOINT_ENTITIES};
use crate::construction::CxnId;
use crate::lattice::maximal_consistent_subsets;
use crate::triple::{Term, TripleIndex};
use crate::variable::{Variable, VariableAllocator};

// ------------- Precomp -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrecompId(pub usize);

#[derive(Debug, Clone)]
pub struct Precomp {
    pub(crate) id: PrecompId,
    pub(crate) matching_id: CxnId,
    pub(crate) merging_id: CxnId,
    pub(crate) matching_variables: Vec<Variable>,
    pub(crate) merging_variables: Vec<Variable>,
    pub(crate) binding: Binding,
    pub(crate) touched: RoaringBitmap,
}

/// A precomp over fresh variables, ready to be joined with a node.
#[derive(Debug, Clone)]
pub struct PrecompInstance {
    pub matching_variables: Vec<Variable>,
    pub merging_variables: Vec<Variable>,
    pub binding: Binding,
}

impl Precomp {
    pub fn id(&self) -> PrecompId {
        self.id
    }
    pub fn matching_id(&self) -> &CxnId {
        &self.matching_id
    }
    pub fn merging_id(&self) -> &CxnId {
        &self.merging_id
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
    pub fn fresh(&self, allocator: &mut VariableAllocator) -> PrecompInstance {
        let all: Vec<Variable> = self.matching_variables.iter().chain(&self.merging_variables).cloned().collect();
        let (mut fresh, renaming) = allocator.freshen(&all);
        let merging_variables = fresh.split_off(self.matching_variables.len());
        PrecompInstance { matching_variables: fresh, merging_variables, binding: self.binding.rename(&renaming) }
    }
}

// ------------- merge/match precomputation -------------
/// One maximal way of satisfying part of a cluster.
#[derive(Debug, Clone)]
pub struct PrecomputeResult {
    pub binding: Binding,
    pub touched: RoaringBitmap,
}

struct Pair {
    binding: Binding,
    touched: u32,
}

// Two distinct variables on the same side stand for distinct entities.
fn unifies_disjoint(binding: &Binding, sides: &[&[Variable]]) -> bool {
    sides.iter().any(|side| {
        let mut seen = HashSet::new();
        side.iter().any(|v| !seen.insert(binding.walk(&Term::Var(v.clone()))))
    })
}

/// Finds the maximal consistent combinations of (merge triple, match triple)
/// pairs over the match triples in `cluster`, on top of `base`.
pub fn merge_match_precompute(
    base: &Binding,
    merge: &TripleIndex,
    matching: &TripleIndex,
    cluster: &RoaringBitmap,
) -> Vec<PrecomputeResult> {
    let merge_variables = merge.variables();
    let match_variables = matching.variables();

    let mut pairs = Vec::new();
    for merge_triple in merge {
        for (i, match_triple) in matching.iter().enumerate() {
            if !cluster.contains(i as u32) {
                continue;
            }
            let binding = base.unify_triple(merge_triple, match_triple);
            if binding.is_valid() {
                pairs.push(Pair { binding, touched: i as u32 });
            }
        }
    }

    let hard = |members: &[usize]| {
        let binding = Binding::merge(members.iter().map(|&m| &pairs[m].binding));
        if binding.is_valid() && unifies_disjoint(&binding, &[&merge_variables, &match_variables]) {
            return binding.poison(DISJOINT_ENTITIES, None, None);
        }
        binding
    };

    maximal_consistent_subsets(0..pairs.len(), hard)
        .into_iter()
        .map(|subset| PrecomputeResult {
            touched: subset.members.iter().map(|&m| pairs[m].touched).collect(),
            binding: subset.binding,
        })
        .collect()
}
