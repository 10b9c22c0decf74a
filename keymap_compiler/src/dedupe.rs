//! Conflict detection and block deduplication.
//!
//! Conflicts are detected on the collections themselves, before any merging,
//! so that deduplication can never hide a collision.

use std::collections::BTreeMap;
use std::fmt;

use keymap_schema::{Layer, LeaderKeyPreference, RuleCollection};
use tracing::debug;

use crate::blocks::{CollectionBlock, LayerEntry};
use crate::error::CompileError;
use crate::generators::effective_mappings;
use crate::keys::to_engine_key;
use crate::planner::ActivatorOrigin;

/// The same key claimed by more than one collection in the same layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub key: String,
    pub layer: Layer,
    pub collections: Vec<String>,
}

impl Conflict {
    pub fn message(&self) -> String {
        format!(
            "key '{}' in layer '{}' is claimed by: {}",
            self.key,
            self.layer,
            self.collections.join(", ")
        )
    }

    pub fn to_error(&self) -> CompileError {
        CompileError::new("E1001", self.message())
            .with_key(self.key.clone())
            .with_layer(self.layer.kanata_name())
            .with_collections(self.collections.clone())
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ClaimKind {
    Mapping,
    /// Activators for the same target may share a key.
    Activation(Layer),
}

#[derive(Debug, Clone)]
struct Claim {
    owner: String,
    kind: ClaimKind,
}

/// Every key claimed by two or more enabled collections (or a collection and
/// the leader key) in the same layer, ordered by layer then key.
pub fn detect_conflicts(collections: &[RuleCollection], leader: Option<&LeaderKeyPreference>) -> Vec<Conflict> {
    let mut claims: BTreeMap<(Layer, String), Vec<Claim>> = BTreeMap::new();
    let mut claim = |layer: &Layer, key: String, owner: &str, kind: ClaimKind| {
        let list = claims.entry((layer.clone(), key)).or_default();
        // a collection repeating its own key is not a conflict
        if !list.iter().any(|c| c.owner == owner && c.kind == kind) {
            list.push(Claim {
                owner: owner.to_string(),
                kind,
            });
        }
    };

    if let Some(leader) = leader.filter(|l| l.enabled) {
        let key = to_engine_key(&leader.key);
        if !key.is_empty() {
            claim(
                &Layer::Base,
                key,
                ActivatorOrigin::Leader.label(),
                ClaimKind::Activation(leader.target_layer.clone()),
            );
        }
    }

    for c in collections.iter().filter(|c| c.is_enabled) {
        for m in effective_mappings(c) {
            let key = if m.is_chord_input() {
                let mut keys: Vec<String> = m.input_keys().into_iter().map(to_engine_key).collect();
                keys.sort();
                keys.join("+")
            } else {
                to_engine_key(&m.input)
            };
            if key.is_empty() {
                continue;
            }
            claim(&c.target_layer, key, &c.name, ClaimKind::Mapping);
        }
        if let Some(a) = c.momentary_activator.as_ref().filter(|a| !a.is_hyper()) {
            let key = to_engine_key(&a.input);
            if !key.is_empty() {
                claim(
                    &a.source_layer,
                    key,
                    &c.name,
                    ClaimKind::Activation(a.target_layer.clone()),
                );
            }
        }
    }

    let mut conflicts = Vec::new();
    for ((layer, key), list) in claims {
        let mut owners: Vec<String> = Vec::new();
        for c in &list {
            if !owners.contains(&c.owner) {
                owners.push(c.owner.clone());
            }
        }
        if owners.len() < 2 {
            continue;
        }
        let shared_activation = match &list[0].kind {
            ClaimKind::Activation(target) => list
                .iter()
                .all(|c| c.kind == ClaimKind::Activation(target.clone())),
            ClaimKind::Mapping => false,
        };
        if shared_activation {
            continue;
        }
        conflicts.push(Conflict {
            key,
            layer,
            collections: owners,
        });
    }
    conflicts
}

/// Merges entries for the same key across blocks. The first block to define
/// a key's base output keeps it; per-layer overrides from every block are
/// unioned, first writer winning on overlap. Merged entries stay in the
/// block that first mentioned the key.
pub fn dedupe(blocks: Vec<CollectionBlock>) -> Vec<CollectionBlock> {
    let mut out: Vec<CollectionBlock> = Vec::with_capacity(blocks.len());
    let mut index: BTreeMap<String, (usize, usize)> = BTreeMap::new();

    for block in blocks {
        let block_idx = out.len();
        let mut kept = CollectionBlock {
            metadata: block.metadata,
            entries: Vec::new(),
        };
        for entry in block.entries {
            match index.get(&entry.source_key).copied() {
                Some((b, e)) if b == block_idx => merge(&mut kept.entries[e], entry),
                Some((b, e)) => merge(&mut out[b].entries[e], entry),
                None => {
                    index.insert(entry.source_key.clone(), (block_idx, kept.entries.len()));
                    kept.entries.push(entry);
                }
            }
        }
        out.push(kept);
    }
    out
}

fn merge(into: &mut LayerEntry, from: LayerEntry) {
    if let Some(base) = from.base_output {
        match &into.base_output {
            None => into.base_output = Some(base),
            Some(kept) if *kept != base => {
                debug!(key = %into.source_key, kept = %kept, dropped = %base, "base output already defined");
            }
            Some(_) => {}
        }
    }
    for (layer, action) in from.layer_outputs {
        if let Some(kept) = into.layer_outputs.get(&layer) {
            if *kept != action {
                debug!(key = %into.source_key, layer = %layer, "layer override already defined");
            }
            continue;
        }
        into.layer_outputs.insert(layer, action);
    }
}
