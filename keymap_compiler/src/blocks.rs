//! Intermediate representation: one block of layer entries per collection,
//! plus the aliases, chords, sequences and virtual keys they need.

use std::collections::{BTreeMap, BTreeSet};

use keymap_schema::{
    Behavior, KeyMapping, Layer, Milliseconds, RuleCollection, TapOrTapDance,
    DEFAULT_CHORD_TIMEOUT_MS,
};
use tracing::{debug, warn};

use crate::generators::{effective_mappings, referenced_layers, sequence_definitions};
use crate::keys::{alias_safe, is_modifier_key, to_engine_key};
use crate::planner::{plan, ActivationPlan};
use crate::render::{
    already_returns_to_base, chord_group_name, is_complex, layer_fake_key, layer_message,
    render, render_action_text, render_behavior, render_layer_activation, wrap_one_shot_release,
    ActivationContext, HOLD_TIMEOUT_VAR, NO_OP, TAP_TIMEOUT_VAR,
};
use crate::CompileOptions;

/// One physical key and what it does in each layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerEntry {
    pub source_key: String,
    /// `None` leaves the key as itself in the base layer.
    pub base_output: Option<String>,
    pub layer_outputs: BTreeMap<Layer, String>,
}

impl LayerEntry {
    pub fn new(source_key: impl Into<String>) -> Self {
        Self {
            source_key: source_key.into(),
            base_output: None,
            layer_outputs: BTreeMap::new(),
        }
    }

    fn set(&mut self, layer: &Layer, action: String) {
        if layer.is_base() {
            self.base_output = Some(action);
        } else {
            self.layer_outputs.insert(layer.clone(), action);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionBlock {
    /// Comment lines naming where the entries came from.
    pub metadata: Vec<String>,
    pub entries: Vec<LayerEntry>,
}

impl CollectionBlock {
    fn entry_mut(&mut self, key: &str) -> Option<&mut LayerEntry> {
        self.entries.iter_mut().find(|e| e.source_key == key)
    }

    fn has_key(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.source_key == key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasDefinition {
    pub alias_name: String,
    pub definition_text: String,
    /// Collection (or synthesized block) the alias was generated for.
    pub origin: String,
}

/// A simultaneous multi-key input, emitted in `defchordsv2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordMapping {
    pub keys: Vec<String>,
    pub action: String,
    pub timeout_ms: Milliseconds,
    pub layer: Layer,
    pub collection: String,
}

/// A named `defchords` group used by inline chord behaviors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordGroupDefinition {
    pub name: String,
    pub timeout_ms: Milliseconds,
    pub participants: BTreeSet<String>,
    pub chords: Vec<(Vec<String>, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceEntry {
    /// Virtual key fired when the sequence completes.
    pub virtual_key: String,
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeKeyDefinition {
    pub name: String,
    pub action: String,
}

#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub blocks: Vec<CollectionBlock>,
    pub aliases: Vec<AliasDefinition>,
    pub layers: Vec<Layer>,
    pub chords: Vec<ChordMapping>,
    pub chord_groups: Vec<ChordGroupDefinition>,
    pub sequences: Vec<SequenceEntry>,
    pub sequence_timeout_ms: Option<Milliseconds>,
    pub fake_keys: Vec<FakeKeyDefinition>,
    pub plan: ActivationPlan,
}

/// Hands out unique alias names of the form `prefix_layer_key`.
#[derive(Debug, Default)]
struct AliasRegistry {
    taken: BTreeSet<String>,
    aliases: Vec<AliasDefinition>,
}

impl AliasRegistry {
    fn register(&mut self, prefix: &str, layer: &Layer, key: &str, text: String, origin: &str) -> String {
        let stem = format!("{prefix}_{}_{}", layer.kanata_name(), alias_safe(key));
        let mut name = stem.clone();
        let mut n = 2;
        while self.taken.contains(&name) {
            name = format!("{stem}_{n}");
            n += 1;
        }
        self.taken.insert(name.clone());
        self.aliases.push(AliasDefinition {
            alias_name: name.clone(),
            definition_text: text,
            origin: origin.to_string(),
        });
        format!("@{name}")
    }
}

fn alias_prefix(mapping: &KeyMapping) -> &'static str {
    match &mapping.behavior {
        Some(Behavior::DualRole(_)) => "th",
        Some(Behavior::TapOrTapDance(TapOrTapDance::TapDance(_))) => "td",
        Some(Behavior::TapOrTapDance(TapOrTapDance::Tap { .. })) => "tp",
        Some(Behavior::Macro(_)) => "mac",
        Some(Behavior::Chord(_)) => "chd",
        None if mapping.requires_fork() => "frk",
        None => "act",
    }
}

/// Builds the intermediate representation for every enabled collection, in
/// declaration order, followed by a synthesized block of layer activators.
pub fn build(collections: &[RuleCollection], options: &CompileOptions) -> BuildOutput {
    let enabled: Vec<&RuleCollection> = collections.iter().filter(|c| c.is_enabled).collect();
    let plan = plan(collections, options.leader_key.as_ref());
    let ctx = ActivationContext::new(&plan, options.one_shot_timeout_ms);

    let expanded: Vec<(&RuleCollection, Vec<KeyMapping>)> =
        enabled.iter().map(|c| (*c, effective_mappings(c))).collect();
    let mapped_inputs: BTreeSet<String> = expanded
        .iter()
        .flat_map(|(_, mappings)| mappings.iter())
        .filter(|m| !m.is_chord_input())
        .map(|m| to_engine_key(&m.input))
        .collect();

    let mut registry = AliasRegistry::default();
    let mut blocks = Vec::new();
    let mut chords = Vec::new();
    let mut chord_groups: BTreeMap<String, ChordGroupDefinition> = BTreeMap::new();
    let mut sequences = Vec::new();
    let mut sequence_timeout_ms: Option<Milliseconds> = None;

    for (c, mappings) in &expanded {
        let layer = &c.target_layer;
        let mut block = CollectionBlock {
            metadata: vec![format!("{} [{}]", c.name, layer.display_name())],
            entries: Vec::new(),
        };

        for m in mappings {
            if m.is_chord_input() {
                chords.push(chord_mapping(m, layer, &c.name, &ctx));
                continue;
            }
            let key = to_engine_key(&m.input);
            if key.is_empty() {
                warn!(collection = %c.name, "mapping has an empty input key; skipped");
                continue;
            }
            if block.has_key(&key) {
                warn!(collection = %c.name, key = %key, "duplicate mapping in collection; first kept");
                continue;
            }

            let mut action = render(m, &ctx);
            let mut needs_alias = m.behavior.is_some() || m.requires_fork() || is_complex(&action);

            if let Some(Behavior::Chord(chord)) = &m.behavior {
                let group = chord_groups
                    .entry(chord_group_name(&chord.group_name))
                    .or_insert_with(|| ChordGroupDefinition {
                        name: chord_group_name(&chord.group_name),
                        timeout_ms: chord.timeout_ms,
                        participants: BTreeSet::new(),
                        chords: Vec::new(),
                    });
                group.participants.insert(key.clone());
                let chord_keys: Vec<String> = chord.keys.iter().map(|k| to_engine_key(k)).collect();
                let output = render_action_text(&chord.output, &ctx);
                if !group.chords.iter().any(|(keys, _)| keys == &chord_keys) {
                    group.chords.push((chord_keys, output));
                }
            } else if !layer.is_base()
                && plan.is_one_shot(layer)
                && !plan.is_activator_in(&key, layer)
                && !already_returns_to_base(&action)
            {
                action = wrap_one_shot_release(&action, layer);
                needs_alias = true;
            }

            let action = if needs_alias {
                registry.register(alias_prefix(m), layer, &key, action, &c.name)
            } else {
                action
            };
            let mut entry = LayerEntry::new(key);
            entry.set(layer, action);
            block.entries.push(entry);
        }

        if c.blocks_unmapped_keys && !layer.is_base() {
            let mut blocked = 0usize;
            for key in options.physical_layout.keys() {
                if is_modifier_key(key)
                    || mapped_inputs.contains(key)
                    || plan.is_activator_in(key, layer)
                    || plan.activates(key, layer)
                    || block.has_key(key)
                {
                    continue;
                }
                let mut entry = LayerEntry::new(key);
                entry.set(layer, NO_OP.to_string());
                block.entries.push(entry);
                blocked += 1;
            }
            block.metadata.push(format!("blocks {blocked} unmapped key(s)"));
        }

        if let Some((defs, timeout_ms)) = sequence_definitions(c) {
            sequence_timeout_ms = Some(sequence_timeout_ms.map_or(timeout_ms, |t| t.max(timeout_ms)));
            for def in defs {
                let keys: Vec<String> = def
                    .keys
                    .iter()
                    .map(|k| to_engine_key(k))
                    .filter(|k| !k.is_empty())
                    .collect();
                if keys.is_empty() {
                    warn!(collection = %c.name, sequence = %def.name, "sequence has no keys; skipped");
                    continue;
                }
                sequences.push((
                    SequenceEntry {
                        virtual_key: format!("seq-{}", alias_safe(def.name.trim())),
                        keys,
                    },
                    render_action_text(&def.action, &ctx),
                ));
            }
        }

        if block.entries.is_empty() {
            block.metadata.push("no mappings to emit".to_string());
        } else {
            block.metadata.push(format!("{} key(s)", block.entries.len()));
        }
        blocks.push(block);
    }

    if !plan.activators.is_empty() {
        blocks.push(activator_block(&plan, &ctx, &mut registry));
    }

    // Chord participants must exist in defsrc.
    let mut chord_keys_block = CollectionBlock {
        metadata: vec!["Chord keys".to_string()],
        entries: Vec::new(),
    };
    for key in chords.iter().flat_map(|c: &ChordMapping| c.keys.iter()) {
        if !blocks.iter().any(|b| b.has_key(key)) && !chord_keys_block.has_key(key) {
            chord_keys_block.entries.push(LayerEntry::new(key.clone()));
        }
    }
    if !chord_keys_block.entries.is_empty() {
        blocks.push(chord_keys_block);
    }

    let mut fake_keys = Vec::new();
    if !plan.is_empty() {
        let mut notified = BTreeSet::from([Layer::Base]);
        notified.extend(plan.activated_layers());
        fake_keys.extend(notified.iter().map(|l| FakeKeyDefinition {
            name: layer_fake_key(l),
            action: layer_message(l),
        }));
    }
    fake_keys.extend(sequences.iter().map(|(s, action)| FakeKeyDefinition {
        name: s.virtual_key.clone(),
        action: action.clone(),
    }));

    let mut layers = BTreeSet::from([Layer::Base]);
    for c in &enabled {
        layers.insert(c.target_layer.clone());
        layers.extend(referenced_layers(c));
    }
    layers.extend(plan.activated_layers());

    let chord_groups: Vec<ChordGroupDefinition> = chord_groups.into_values().collect();
    debug!(
        blocks = blocks.len(),
        aliases = registry.aliases.len(),
        chords = chords.len(),
        chord_groups = chord_groups.len(),
        sequences = sequences.len(),
        "blocks built"
    );

    BuildOutput {
        blocks,
        aliases: registry.aliases,
        layers: layers.into_iter().collect(),
        chords,
        chord_groups,
        sequences: sequences.into_iter().map(|(s, _)| s).collect(),
        sequence_timeout_ms,
        fake_keys,
        plan,
    }
}

fn chord_mapping(m: &KeyMapping, layer: &Layer, collection: &str, ctx: &ActivationContext<'_>) -> ChordMapping {
    let (action, timeout_ms) = match &m.behavior {
        Some(Behavior::Chord(c)) => (render_action_text(&c.output, ctx), c.timeout_ms),
        Some(b) => (render_behavior(b, m, ctx), DEFAULT_CHORD_TIMEOUT_MS),
        None => (render_action_text(&m.output, ctx), DEFAULT_CHORD_TIMEOUT_MS),
    };
    ChordMapping {
        keys: m.input_keys().into_iter().map(to_engine_key).collect(),
        action,
        timeout_ms,
        layer: layer.clone(),
        collection: collection.to_string(),
    }
}

fn activator_block(plan: &ActivationPlan, ctx: &ActivationContext<'_>, registry: &mut AliasRegistry) -> CollectionBlock {
    let mut block = CollectionBlock {
        metadata: vec!["Layer activators".to_string()],
        entries: Vec::new(),
    };
    let mut seen: BTreeSet<(String, Layer)> = BTreeSet::new();

    for a in &plan.activators {
        if !seen.insert((a.key.clone(), a.source_layer.clone())) {
            debug!(key = %a.key, layer = %a.source_layer, "activator already emitted; skipped");
            continue;
        }
        let activation = render_layer_activation(&a.target_layer, plan.is_one_shot(&a.target_layer), ctx);
        let text = if a.source_layer.is_base() {
            // Tapping still types the key itself.
            format!(
                "(tap-hold ${} ${} {} {activation})",
                TAP_TIMEOUT_VAR, HOLD_TIMEOUT_VAR, a.key
            )
        } else {
            activation
        };
        let alias = registry.register("lyr", &a.source_layer, &a.key, text, a.origin.label());
        block.metadata.push(format!(
            "{} -> {} via {} ({})",
            a.source_layer,
            a.target_layer,
            a.key,
            a.origin.label()
        ));

        match block.entry_mut(&a.key) {
            Some(entry) => entry.set(&a.source_layer, alias),
            None => {
                let mut entry = LayerEntry::new(a.key.clone());
                entry.set(&a.source_layer, alias);
                block.entries.push(entry);
            }
        }
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use keymap_schema::{DualRole, MacroBehavior, MomentaryActivator};

    fn options() -> CompileOptions {
        CompileOptions::default()
    }

    #[test]
    fn behaviors_forks_and_complex_outputs_are_aliased() {
        let c = RuleCollection::new("base", "Base Tweaks", Layer::Base).with_mappings(vec![
            KeyMapping::new("caps lock", "esc")
                .with_behavior(Behavior::DualRole(DualRole::new("esc", "lctl"))),
            KeyMapping::new("1", "1").with_shifted_output("f1"),
            KeyMapping::new("m", "(multi lctl c)"),
            KeyMapping::new("x", "y"),
        ]);
        let out = build(&[c], &options());
        let names: Vec<&str> = out.aliases.iter().map(|a| a.alias_name.as_str()).collect();
        assert_eq!(names, vec!["th_base_caps", "frk_base_1", "act_base_m"]);

        let entries = &out.blocks[0].entries;
        assert_eq!(entries[0].base_output.as_deref(), Some("@th_base_caps"));
        assert_eq!(entries[3].base_output.as_deref(), Some("y"));
        assert_eq!(out.layers, vec![Layer::Base]);
        assert!(out.fake_keys.is_empty());
    }

    #[test]
    fn alias_names_get_numeric_suffixes_on_collision() {
        let mut registry = AliasRegistry::default();
        let a = registry.register("act", &Layer::Nav, "a", "(multi a b)".into(), "one");
        let b = registry.register("act", &Layer::Nav, "a", "(multi a c)".into(), "two");
        let c = registry.register("act", &Layer::Nav, "a", "(multi a d)".into(), "three");
        assert_eq!((a.as_str(), b.as_str(), c.as_str()), ("@act_nav_a", "@act_nav_a_2", "@act_nav_a_3"));
    }

    #[test]
    fn empty_collection_still_produces_a_block() {
        let out = build(&[RuleCollection::new("e", "Empty", Layer::Symbol)], &options());
        assert_eq!(out.blocks.len(), 1);
        assert!(out.blocks[0].entries.is_empty());
        assert!(out.blocks[0].metadata.iter().any(|l| l.contains("no mappings")));
        assert!(out.layers.contains(&Layer::Symbol));
    }

    #[test]
    fn chord_inputs_are_routed_out_of_layer_entries() {
        let c = RuleCollection::new("c", "Combos", Layer::Base)
            .with_mappings(vec![KeyMapping::new("j+k", "esc"), KeyMapping::new("q", "w")]);
        let out = build(&[c], &options());
        assert_eq!(out.chords.len(), 1);
        assert_eq!(out.chords[0].keys, vec!["j", "k"]);
        assert_eq!(out.chords[0].action, "esc");
        assert_eq!(out.chords[0].timeout_ms, DEFAULT_CHORD_TIMEOUT_MS);

        assert_eq!(out.blocks[0].entries.len(), 1);
        let chord_block = out.blocks.last().unwrap();
        assert_eq!(chord_block.metadata[0], "Chord keys");
        assert_eq!(chord_block.entries.len(), 2);
    }

    #[test]
    fn one_shot_layer_actions_release_the_layer() {
        let nav = RuleCollection::new("nav", "Navigation", Layer::Nav)
            .with_mappings(vec![KeyMapping::new("h", "left")])
            .with_activator(MomentaryActivator::new("space", Layer::Base, Layer::Nav));
        let window = RuleCollection::new("win", "Window", Layer::Window)
            .with_mappings(vec![
                KeyMapping::new("h", "(push-msg \"window:left\")"),
                KeyMapping::new("b", "(multi (push-msg \"layer:base\") a)"),
            ])
            .with_activator(MomentaryActivator::new("w", Layer::Nav, Layer::Window));
        let out = build(&[nav, window], &options());

        // nav is held, not one-shot
        assert_eq!(out.blocks[0].entries[0].layer_outputs[&Layer::Nav], "left");

        let wrapped = out
            .aliases
            .iter()
            .find(|a| a.alias_name == "act_window_h")
            .unwrap();
        assert_eq!(
            wrapped.definition_text,
            "(multi (push-msg \"window:left\") (release-layer window) (on-press-fakekey kp-layer-base tap))"
        );
        let untouched = out.aliases.iter().find(|a| a.alias_name == "act_window_b").unwrap();
        assert!(!untouched.definition_text.contains("release-layer"));

        let names: Vec<&str> = out.fake_keys.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["kp-layer-base", "kp-layer-nav", "kp-layer-window"]);
    }

    #[test]
    fn activator_block_comes_last_with_tap_hold_on_base() {
        let nav = RuleCollection::new("nav", "Navigation", Layer::Nav)
            .with_mappings(vec![KeyMapping::new("h", "left")])
            .with_activator(MomentaryActivator::new("space", Layer::Base, Layer::Nav));
        let out = build(&[nav], &options());
        let block = out.blocks.last().unwrap();
        assert_eq!(block.metadata[0], "Layer activators");
        assert_eq!(block.entries[0].source_key, "spc");
        assert_eq!(block.entries[0].base_output.as_deref(), Some("@lyr_base_spc"));

        let alias = out.aliases.iter().find(|a| a.alias_name == "lyr_base_spc").unwrap();
        assert_eq!(
            alias.definition_text,
            "(tap-hold $tap-timeout $hold-timeout spc (multi (layer-while-held nav) \
             (on-press-fakekey kp-layer-nav tap) (on-release-fakekey kp-layer-base tap)))"
        );
        assert_eq!(alias.origin, "Navigation");
    }

    #[test]
    fn blocked_keys_skip_modifiers_mapped_keys_and_activators() {
        let nav = RuleCollection::new("nav", "Navigation", Layer::Nav)
            .with_mappings(vec![KeyMapping::new("h", "left")])
            .with_activator(MomentaryActivator::new("space", Layer::Base, Layer::Nav))
            .blocking_unmapped_keys();
        let base = RuleCollection::new("base", "Base", Layer::Base)
            .with_mappings(vec![KeyMapping::new("q", "q")]);
        let out = build(&[nav, base], &options());

        let nav_block = &out.blocks[0];
        let blocked: BTreeSet<&str> = nav_block
            .entries
            .iter()
            .filter(|e| e.layer_outputs.get(&Layer::Nav).map(String::as_str) == Some(NO_OP))
            .map(|e| e.source_key.as_str())
            .collect();
        assert!(blocked.contains("a"));
        assert!(blocked.contains("esc"));
        assert!(!blocked.contains("h"));
        assert!(!blocked.contains("q"));
        assert!(!blocked.contains("spc"));
        assert!(!blocked.contains("lsft"));
        assert!(!blocked.contains("lmet"));
    }

    #[test]
    fn inline_chords_define_one_group_per_name() {
        let chord = |input: &str| {
            KeyMapping::new(input, input).with_behavior(Behavior::Chord(keymap_schema::ChordBehavior {
                group_name: "vim".into(),
                keys: vec!["j".into(), "k".into()],
                timeout_ms: 40,
                output: "esc".into(),
            }))
        };
        let c = RuleCollection::new("c", "Chords", Layer::Base).with_mappings(vec![chord("j"), chord("k")]);
        let out = build(&[c], &options());
        assert_eq!(out.chord_groups.len(), 1);
        let group = &out.chord_groups[0];
        assert_eq!(group.name, "vim");
        assert_eq!(group.timeout_ms, 40);
        assert_eq!(group.participants.iter().collect::<Vec<_>>(), vec!["j", "k"]);
        assert_eq!(group.chords, vec![(vec!["j".to_string(), "k".to_string()], "esc".to_string())]);
        assert_eq!(out.aliases[0].definition_text, "(chord vim j)");
    }

    #[test]
    fn sequences_become_virtual_keys() {
        use keymap_schema::{CollectionKind, SequenceDefinition, SequencesConfig};
        let c = RuleCollection::new("s", "Sequences", Layer::Base).with_configuration(
            CollectionKind::Sequences(SequencesConfig {
                leader_key: Some("right alt".into()),
                timeout_ms: 700,
                sequences: vec![SequenceDefinition {
                    name: "email".into(),
                    keys: vec!["e".into(), "m".into()],
                    action: "(macro h i)".into(),
                }],
            }),
        );
        let out = build(&[c], &options());
        assert_eq!(out.sequence_timeout_ms, Some(700));
        assert_eq!(out.sequences[0].virtual_key, "seq-email");
        assert_eq!(out.fake_keys[0].action, "(macro h i)");
        assert_eq!(out.blocks[0].entries[0].base_output.as_deref(), Some("sldr"));
    }

    #[test]
    fn text_macro_alias() {
        let c = RuleCollection::new("m", "Macros", Layer::Base).with_mappings(vec![
            KeyMapping::new("f13", "hi!").with_behavior(Behavior::Macro(MacroBehavior::text("hi!"))),
        ]);
        let out = build(&[c], &options());
        assert_eq!(out.aliases[0].alias_name, "mac_base_f13");
        assert_eq!(out.aliases[0].definition_text, "(macro h i S-1)");
    }
}
