//! The grammar: compiled constructions plus the precomp table saying which
//! part of which consumer a fired producer can satisfy.

use std::collections::HashMap;
use std::time::Instant;

use roaring::RoaringBitmap;
use tracing::{debug, info};

use crate::binding::Binding;
use crate::config::PrecomputeConfig;
use crate::construction::{CompiledConstruction, Construction, CxnId, Kind};
use crate::error::{Result, ScgError};
use crate::precompute::{Precomp, PrecompId, merge_match_precompute};
use crate::schema::Schema;
use crate::variable::VariableAllocator;

#[derive(Debug)]
pub struct Grammar {
    schema: Schema,
    constructions: Vec<CompiledConstruction>,
    index: HashMap<CxnId, usize>,
    precomps: Vec<Precomp>,
    precomps_for_merge: HashMap<CxnId, Vec<PrecompId>>,
    allocator: VariableAllocator,
}

impl Grammar {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }
    /// All constructions in declaration order, sources first.
    pub fn constructions(&self) -> &[CompiledConstruction] {
        &self.constructions
    }
    pub fn construction(&self, id: &str) -> Option<&CompiledConstruction> {
        self.index.get(id).map(|&i| &self.constructions[i])
    }
    pub fn construction_ids(&self) -> impl Iterator<Item = &CxnId> {
        self.constructions.iter().map(|c| c.id())
    }
    pub fn sources(&self) -> impl Iterator<Item = &CompiledConstruction> {
        self.constructions.iter().filter(|c| c.is_source())
    }
    pub fn precomps(&self) -> &[Precomp] {
        &self.precomps
    }
    pub fn precomp(&self, id: PrecompId) -> Option<&Precomp> {
        self.precomps.get(id.0)
    }
    /// Precomps whose merge side is the given construction.
    pub fn precomps_for_merge(&self, id: &str) -> &[PrecompId] {
        self.precomps_for_merge.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
    pub fn precomps_between(&self, merging: &str, matching: &str) -> Vec<&Precomp> {
        self.precomps_for_merge(merging)
            .iter()
            .filter_map(|&id| self.precomp(id))
            .filter(|p| p.matching_id().as_str() == matching)
            .collect()
    }
    /// Allocator state after compilation. Runtime variables are minted after it.
    pub fn allocator(&self) -> &VariableAllocator {
        &self.allocator
    }
}

/// Compiles the constructions and precomputes every producer/consumer pair.
pub fn build_grammar(
    schema: Schema,
    sources: Vec<Construction>,
    constructions: Vec<Construction>,
    config: &PrecomputeConfig,
) -> Result<Grammar> {
    let started = Instant::now();
    let mut allocator = VariableAllocator::new();
    let mut compiled: Vec<CompiledConstruction> = Vec::new();
    let mut index = HashMap::new();

    let declared = sources.iter().map(|c| (c, Kind::Source)).chain(constructions.iter().map(|c| (c, Kind::Inner)));
    for (construction, expected) in declared {
        let id = construction.id().clone();
        if construction.kind() != expected {
            let message = match expected {
                Kind::Source => "declared among the sources but is not a source construction",
                Kind::Inner => "source construction declared among the inner constructions",
            };
            return Err(ScgError::Definition { cxn: id.to_string(), message: message.to_string() });
        }
        if index.contains_key(&id) {
            return Err(ScgError::Definition { cxn: id.to_string(), message: "duplicate construction id".to_string() });
        }
        index.insert(id, compiled.len());
        compiled.push(construction.compile(&schema, &mut allocator)?);
    }

    let mut precomps: Vec<Precomp> = Vec::new();
    for producer in &compiled {
        for consumer in compiled.iter().filter(|c| !c.is_source()) {
            if producer.id() == consumer.id() && !config.allow_self_pairing {
                continue;
            }
            let merging = producer.fresh(&mut allocator);
            let matching = consumer.fresh(&mut allocator);
            let base = Binding::merge([&merging.binding, &matching.binding]);
            if !base.is_valid() {
                continue;
            }

            let mut kept: Vec<(RoaringBitmap, usize)> = Vec::new();
            let mut added = 0;
            for cluster in consumer.clusters() {
                for result in merge_match_precompute(&base, &merging.merging, &matching.matching, cluster) {
                    // results are grouped by the match triples they touch
                    let group = match kept.iter().position(|(touched, _)| *touched == result.touched) {
                        Some(group) => group,
                        None => {
                            kept.push((result.touched.clone(), 0));
                            kept.len() - 1
                        }
                    };
                    if kept[group].1 >= config.max_precomps_per_touched_set {
                        continue;
                    }
                    kept[group].1 += 1;
                    precomps.push(Precomp {
                        id: PrecompId(precomps.len()),
                        matching_id: consumer.id().clone(),
                        merging_id: producer.id().clone(),
                        matching_variables: matching.variables.clone(),
                        merging_variables: merging.variables.clone(),
                        binding: result.binding,
                        touched: result.touched,
                    });
                    added += 1;
                }
            }
            if added > 0 {
                debug!(merging = %producer.id(), matching = %consumer.id(), precomps = added, "pair precomputed");
            }
        }
    }

    let mut precomps_for_merge: HashMap<CxnId, Vec<PrecompId>> = HashMap::new();
    for precomp in &precomps {
        precomps_for_merge.entry(precomp.merging_id.clone()).or_default().push(precomp.id);
    }

    info!(
        constructions = compiled.len(),
        sources = compiled.iter().filter(|c| c.is_source()).count(),
        precomps = precomps.len(),
        ms = started.elapsed().as_secs_f64() * 1000.0,
        "grammar built"
    );
    Ok(Grammar { schema, constructions: compiled, index, precomps, precomps_for_merge, allocator })
}
