use std::collections::{BTreeMap, BTreeSet};

use keymap_schema::{Behavior, HyperTrigger, Layer, LeaderKeyPreference, RuleCollection};
use tracing::{debug, warn};

use crate::generators::effective_mappings;
use crate::keys::to_engine_key;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivatorOrigin {
    Leader,
    Collection { id: String, name: String },
}

impl ActivatorOrigin {
    pub fn label(&self) -> &str {
        match self {
            ActivatorOrigin::Leader => "Leader key",
            ActivatorOrigin::Collection { name, .. } => name,
        }
    }
}

/// A physical key that activates `target_layer` while in `source_layer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activator {
    pub key: String,
    pub source_layer: Layer,
    pub target_layer: Layer,
    pub origin: ActivatorOrigin,
}

/// A layer that rides along with the synthetic hyper modifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperLink {
    pub layer: Layer,
    pub trigger: HyperTrigger,
    /// Physical key whose hold action is hyper, if any collection has one.
    pub hyper_key: Option<String>,
    pub collection_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationPlan {
    pub activators: Vec<Activator>,
    pub activator_keys_by_source_layer: BTreeMap<Layer, BTreeSet<String>>,
    pub hyper_linked_layers: Vec<HyperLink>,
    pub one_shot_layers: BTreeSet<Layer>,
}

impl ActivationPlan {
    pub fn is_one_shot(&self, layer: &Layer) -> bool {
        self.one_shot_layers.contains(layer)
    }

    /// Whether `key` switches to another layer while `layer` is active.
    pub fn is_activator_in(&self, key: &str, layer: &Layer) -> bool {
        self.activator_keys_by_source_layer
            .get(layer)
            .is_some_and(|keys| keys.contains(key))
    }

    /// Whether `key` activates `layer` from anywhere.
    pub fn activates(&self, key: &str, layer: &Layer) -> bool {
        self.activators
            .iter()
            .any(|a| a.key == key && &a.target_layer == layer)
    }

    /// Every layer reachable through an activator or hyper.
    pub fn activated_layers(&self) -> BTreeSet<Layer> {
        self.activators
            .iter()
            .map(|a| a.target_layer.clone())
            .chain(self.hyper_linked_layers.iter().map(|h| h.layer.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.activators.is_empty() && self.hyper_linked_layers.is_empty()
    }
}

/// Computes which keys activate which layers, which layers are linked to
/// hyper, and which layers behave as one-shot. Disabled collections are
/// ignored. Output depends only on the inputs' order, never on hashing.
pub fn plan(collections: &[RuleCollection], leader: Option<&LeaderKeyPreference>) -> ActivationPlan {
    let enabled: Vec<&RuleCollection> = collections.iter().filter(|c| c.is_enabled).collect();
    let mut plan = ActivationPlan::default();

    if let Some(leader) = leader.filter(|l| l.enabled) {
        let key = to_engine_key(&leader.key);
        if key.is_empty() {
            warn!("leader key preference has an empty key; ignored");
        } else {
            plan.activators.push(Activator {
                key,
                source_layer: Layer::Base,
                target_layer: leader.target_layer.clone(),
                origin: ActivatorOrigin::Leader,
            });
            // Leader into navigation is entered as a one-shot.
            if leader.target_layer == Layer::Nav {
                plan.one_shot_layers.insert(Layer::Nav);
            }
        }
    }

    let hyper_key = find_hyper_key(&enabled);

    for c in &enabled {
        let Some(activator) = &c.momentary_activator else {
            continue;
        };
        if activator.is_hyper() {
            if hyper_key.is_none() {
                warn!(
                    collection = %c.name,
                    layer = %activator.target_layer,
                    "layer is linked to hyper but no key holds hyper"
                );
            }
            if activator.hyper_trigger == HyperTrigger::Tap {
                plan.one_shot_layers.insert(activator.target_layer.clone());
            }
            plan.hyper_linked_layers.push(HyperLink {
                layer: activator.target_layer.clone(),
                trigger: activator.hyper_trigger,
                hyper_key: hyper_key.clone(),
                collection_name: c.name.clone(),
            });
            continue;
        }

        let key = to_engine_key(&activator.input);
        if key.is_empty() {
            warn!(collection = %c.name, "activator has an empty input key; ignored");
            continue;
        }
        if !activator.source_layer.is_base() {
            plan.one_shot_layers.insert(activator.target_layer.clone());
        }
        plan.activators.push(Activator {
            key,
            source_layer: activator.source_layer.clone(),
            target_layer: activator.target_layer.clone(),
            origin: ActivatorOrigin::Collection {
                id: c.id.clone(),
                name: c.name.clone(),
            },
        });
    }

    for a in &plan.activators {
        plan.activator_keys_by_source_layer
            .entry(a.source_layer.clone())
            .or_default()
            .insert(a.key.clone());
    }

    debug!(
        activators = plan.activators.len(),
        hyper_links = plan.hyper_linked_layers.len(),
        one_shot = ?plan.one_shot_layers,
        "layer activation planned"
    );
    plan
}

fn find_hyper_key(collections: &[&RuleCollection]) -> Option<String> {
    collections.iter().find_map(|c| {
        effective_mappings(c).into_iter().find_map(|m| match &m.behavior {
            Some(Behavior::DualRole(d)) if d.hold_action.trim().eq_ignore_ascii_case("hyper") => {
                Some(to_engine_key(&m.input))
            }
            _ => None,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use keymap_schema::{DualRole, KeyMapping, MomentaryActivator};

    fn nav_collection() -> RuleCollection {
        RuleCollection::new("nav", "Navigation", Layer::Nav)
            .with_mappings(vec![KeyMapping::new("h", "left")])
            .with_activator(MomentaryActivator::new("space", Layer::Base, Layer::Nav))
    }

    #[test]
    fn collects_activator_keys_by_source_layer() {
        let window = RuleCollection::new("win", "Window", Layer::Window)
            .with_activator(MomentaryActivator::new("w", Layer::Nav, Layer::Window));
        let plan = plan(&[nav_collection(), window], None);

        assert!(plan.is_activator_in("spc", &Layer::Base));
        assert!(plan.is_activator_in("w", &Layer::Nav));
        assert!(!plan.is_activator_in("w", &Layer::Base));
        // chained activation is one-shot
        assert!(plan.is_one_shot(&Layer::Window));
        assert!(!plan.is_one_shot(&Layer::Nav));
    }

    #[test]
    fn leader_into_nav_is_one_shot() {
        let leader = LeaderKeyPreference::default();
        let plan = plan(&[], Some(&leader));
        assert_eq!(plan.activators.len(), 1);
        assert_eq!(plan.activators[0].origin, ActivatorOrigin::Leader);
        assert!(plan.is_one_shot(&Layer::Nav));

        let disabled = LeaderKeyPreference { enabled: false, ..LeaderKeyPreference::default() };
        assert!(super::plan(&[], Some(&disabled)).is_empty());
    }

    #[test]
    fn hyper_activator_links_to_hyper_hold_key() {
        let hyper = RuleCollection::new("caps", "Caps Hyper", Layer::Base).with_mappings(vec![
            KeyMapping::new("caps lock", "esc")
                .with_behavior(Behavior::DualRole(DualRole::new("esc", "hyper"))),
        ]);
        let mut activator = MomentaryActivator::new("hyper", Layer::Base, Layer::Launcher);
        activator.hyper_trigger = HyperTrigger::Tap;
        let launcher = RuleCollection::new("launch", "Launcher", Layer::Launcher)
            .with_activator(activator);

        let plan = plan(&[launcher, hyper], None);
        assert!(plan.activators.is_empty());
        assert_eq!(plan.hyper_linked_layers.len(), 1);
        assert_eq!(plan.hyper_linked_layers[0].hyper_key.as_deref(), Some("caps"));
        assert!(plan.is_one_shot(&Layer::Launcher));
        assert!(plan.activated_layers().contains(&Layer::Launcher));
    }

    #[test]
    fn disabled_collections_do_not_activate() {
        let plan = plan(&[nav_collection().disabled()], None);
        assert!(plan.is_empty());
    }

    #[test]
    fn plan_is_deterministic() {
        let collections = vec![nav_collection()];
        let leader = LeaderKeyPreference::default();
        assert_eq!(plan(&collections, Some(&leader)), plan(&collections, Some(&leader)));
    }
}
