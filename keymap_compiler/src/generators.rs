//! Expansion of each `CollectionKind` into primitive `KeyMapping`s.

use keymap_schema::{
    Behavior, ChordBehavior, ChordGroupsConfig, CollectionKind, DualRole,
    HomeRowLayerTogglesConfig, HomeRowModsConfig, KeyMapping, LaunchTarget, LauncherGridConfig,
    Layer, LayerPresetPickerConfig, LayerToggleMode, RuleCollection,
    SequenceDefinition, TapDance, TapHoldPickerConfig, TapOrTapDance,
};
use tracing::warn;

/// The mappings a collection contributes, whatever its kind.
pub fn effective_mappings(collection: &RuleCollection) -> Vec<KeyMapping> {
    match &collection.configuration {
        CollectionKind::List | CollectionKind::Table => collection.mappings.clone(),
        CollectionKind::HomeRowMods(cfg) => home_row_mods(cfg),
        CollectionKind::HomeRowLayerToggles(cfg) => home_row_layer_toggles(cfg),
        CollectionKind::ChordGroups(cfg) => chord_groups(cfg, &collection.name),
        CollectionKind::Sequences(cfg) => match &cfg.leader_key {
            Some(key) => vec![KeyMapping::new(key.clone(), "sldr")
                .with_description("sequence leader")],
            None => Vec::new(),
        },
        CollectionKind::TapHoldPicker(cfg) => vec![tap_hold_picker(cfg)],
        CollectionKind::LayerPresetPicker(cfg) => layer_preset(cfg),
        CollectionKind::LauncherGrid(cfg) => launcher_grid(cfg),
    }
}

/// Sequence definitions of a `Sequences` collection, with its timeout.
pub fn sequence_definitions(collection: &RuleCollection) -> Option<(&[SequenceDefinition], u32)> {
    match &collection.configuration {
        CollectionKind::Sequences(cfg) => Some((cfg.sequences.as_slice(), cfg.timeout_ms)),
        _ => None,
    }
}

/// Layers named by generated actions, which must exist in the output.
pub fn referenced_layers(collection: &RuleCollection) -> Vec<Layer> {
    match &collection.configuration {
        CollectionKind::HomeRowLayerToggles(cfg) => cfg
            .keys
            .iter()
            .filter(|k| k.enabled)
            .map(|k| k.layer.clone())
            .collect(),
        _ => Vec::new(),
    }
}

fn home_row_mods(cfg: &HomeRowModsConfig) -> Vec<KeyMapping> {
    cfg.keys
        .iter()
        .filter(|k| k.enabled && !k.modifier.trim().is_empty())
        .map(|k| {
            let behavior = DualRole {
                tap_timeout_ms: cfg.tap_timeout_ms,
                hold_timeout_ms: cfg.hold_timeout_ms,
                activate_hold_on_other_key_press: cfg.activate_hold_on_other_key_press,
                quick_tap_on_release: cfg.quick_tap_on_release,
                ..DualRole::new(k.key.clone(), k.modifier.clone())
            };
            KeyMapping::new(k.key.clone(), k.key.clone())
                .with_behavior(Behavior::DualRole(behavior))
        })
        .collect()
}

fn home_row_layer_toggles(cfg: &HomeRowLayerTogglesConfig) -> Vec<KeyMapping> {
    cfg.keys
        .iter()
        .filter(|k| k.enabled)
        .map(|k| {
            let hold = match cfg.mode {
                LayerToggleMode::Hold => format!("(layer-while-held {})", k.layer.kanata_name()),
                LayerToggleMode::Toggle => format!("(layer-switch {})", k.layer.kanata_name()),
            };
            let behavior = DualRole {
                tap_timeout_ms: cfg.tap_timeout_ms,
                hold_timeout_ms: cfg.hold_timeout_ms,
                ..DualRole::new(k.key.clone(), hold)
            };
            KeyMapping::new(k.key.clone(), k.key.clone())
                .with_behavior(Behavior::DualRole(behavior))
        })
        .collect()
}

fn chord_groups(cfg: &ChordGroupsConfig, collection_name: &str) -> Vec<KeyMapping> {
    let mut out = Vec::new();
    for group in &cfg.groups {
        for chord in &group.chords {
            let keys: Vec<String> = chord
                .keys
                .iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
            if keys.len() < 2 {
                warn!(
                    collection = collection_name,
                    group = %group.name,
                    "chord needs at least two keys; skipped"
                );
                continue;
            }
            let behavior = ChordBehavior {
                group_name: group.name.clone(),
                keys: keys.clone(),
                timeout_ms: group.timeout_ms,
                output: chord.output.clone(),
            };
            out.push(
                KeyMapping::new(keys.join("+"), chord.output.clone())
                    .with_behavior(Behavior::Chord(behavior)),
            );
        }
    }
    out
}

fn tap_hold_picker(cfg: &TapHoldPickerConfig) -> KeyMapping {
    let hold = cfg.hold_action.as_deref().filter(|h| !h.trim().is_empty());
    let double = cfg.double_tap_action.as_deref().filter(|d| !d.trim().is_empty());
    let dual_role = |hold: &str| DualRole {
        tap_timeout_ms: cfg.tap_timeout_ms,
        hold_timeout_ms: cfg.hold_timeout_ms,
        activate_hold_on_other_key_press: cfg.activate_hold_on_other_key_press,
        quick_tap_on_release: cfg.quick_tap_on_release,
        ..DualRole::new(cfg.tap_action.clone(), hold)
    };

    let behavior = match (hold, double) {
        (Some(hold), None) => Behavior::DualRole(dual_role(hold)),
        (None, Some(double)) => Behavior::TapOrTapDance(TapOrTapDance::TapDance(
            TapDance::from_actions(cfg.tap_dance_window_ms, [cfg.tap_action.as_str(), double]),
        )),
        (Some(hold), Some(double)) => {
            // Behaviors do not nest: the tap-hold becomes the first step's action text.
            let first = crate::render::render_dual_role(
                &dual_role(hold),
                &crate::render::ActivationContext::empty(),
            );
            Behavior::TapOrTapDance(TapOrTapDance::TapDance(TapDance::from_actions(
                cfg.tap_dance_window_ms,
                [first, double.to_string()],
            )))
        }
        (None, None) => Behavior::TapOrTapDance(TapOrTapDance::Tap {
            action: cfg.tap_action.clone(),
        }),
    };
    KeyMapping::new(cfg.key.clone(), cfg.tap_action.clone()).with_behavior(behavior)
}

fn layer_preset(cfg: &LayerPresetPickerConfig) -> Vec<KeyMapping> {
    let selected = cfg
        .selected_preset_id
        .as_deref()
        .and_then(|id| cfg.presets.iter().find(|p| p.id == id))
        .or_else(|| cfg.presets.first());
    selected.map(|p| p.mappings.clone()).unwrap_or_default()
}

fn launcher_grid(cfg: &LauncherGridConfig) -> Vec<KeyMapping> {
    cfg.entries
        .iter()
        .filter(|e| e.enabled)
        .map(|e| {
            let target = match &e.target {
                LaunchTarget::App(name) => format!("app:{name}"),
                LaunchTarget::Url(url) => format!("url:{url}"),
                LaunchTarget::Folder(path) => format!("folder:{path}"),
            };
            let escaped = target.replace('\\', "\\\\").replace('"', "\\\"");
            KeyMapping::new(e.key.clone(), format!("(push-msg \"launch:{escaped}\")"))
                .with_description(target)
        })
        .collect()
}
