use serde::{Deserialize, Serialize};

use crate::{
    default_chord_timeout, default_hold_timeout, default_tap_dance_window, default_tap_timeout,
    default_true, KeyMapping, Layer, Milliseconds, MomentaryActivator,
};

/// A user-authored group of mappings, compiled together into one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCollection {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default)]
    pub target_layer: Layer,
    #[serde(default)]
    pub mappings: Vec<KeyMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub momentary_activator: Option<MomentaryActivator>,
    #[serde(default)]
    pub configuration: CollectionKind,
    /// Capture every unmapped, non-modifier key of the physical layout in
    /// `target_layer` instead of letting it fall through.
    #[serde(default)]
    pub blocks_unmapped_keys: bool,
}

impl RuleCollection {
    pub fn new(id: impl Into<String>, name: impl Into<String>, target_layer: Layer) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_enabled: true,
            target_layer,
            mappings: Vec::new(),
            momentary_activator: None,
            configuration: CollectionKind::List,
            blocks_unmapped_keys: false,
        }
    }

    pub fn with_mappings(mut self, mappings: Vec<KeyMapping>) -> Self {
        self.mappings = mappings;
        self
    }

    pub fn with_activator(mut self, activator: MomentaryActivator) -> Self {
        self.momentary_activator = Some(activator);
        self
    }

    pub fn with_configuration(mut self, configuration: CollectionKind) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn blocking_unmapped_keys(mut self) -> Self {
        self.blocks_unmapped_keys = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.is_enabled = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollectionKind {
    #[default]
    List,
    Table,
    HomeRowMods(HomeRowModsConfig),
    HomeRowLayerToggles(HomeRowLayerTogglesConfig),
    ChordGroups(ChordGroupsConfig),
    Sequences(SequencesConfig),
    TapHoldPicker(TapHoldPickerConfig),
    LayerPresetPicker(LayerPresetPickerConfig),
    LauncherGrid(LauncherGridConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeRowModKey {
    pub key: String,
    pub modifier: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeRowModsConfig {
    #[serde(default = "default_home_row_mod_keys")]
    pub keys: Vec<HomeRowModKey>,
    #[serde(default = "default_tap_timeout")]
    pub tap_timeout_ms: Milliseconds,
    #[serde(default = "default_hold_timeout")]
    pub hold_timeout_ms: Milliseconds,
    #[serde(default)]
    pub activate_hold_on_other_key_press: bool,
    #[serde(default = "default_true")]
    pub quick_tap_on_release: bool,
}

impl Default for HomeRowModsConfig {
    fn default() -> Self {
        Self {
            keys: default_home_row_mod_keys(),
            tap_timeout_ms: default_tap_timeout(),
            hold_timeout_ms: default_hold_timeout(),
            activate_hold_on_other_key_press: false,
            quick_tap_on_release: true,
        }
    }
}

fn default_home_row_mod_keys() -> Vec<HomeRowModKey> {
    [
        ("a", "lctl"),
        ("s", "lalt"),
        ("d", "lmet"),
        ("f", "lsft"),
        ("j", "rsft"),
        ("k", "rmet"),
        ("l", "ralt"),
        (";", "rctl"),
    ]
    .into_iter()
    .map(|(key, modifier)| HomeRowModKey {
        key: key.to_string(),
        modifier: modifier.to_string(),
        enabled: true,
    })
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerToggleMode {
    #[default]
    Hold,
    Toggle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeRowLayerKey {
    pub key: String,
    pub layer: Layer,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeRowLayerTogglesConfig {
    #[serde(default)]
    pub keys: Vec<HomeRowLayerKey>,
    #[serde(default)]
    pub mode: LayerToggleMode,
    #[serde(default = "default_tap_timeout")]
    pub tap_timeout_ms: Milliseconds,
    #[serde(default = "default_hold_timeout")]
    pub hold_timeout_ms: Milliseconds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordDefinition {
    pub keys: Vec<String>,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordGroup {
    pub name: String,
    #[serde(default = "default_chord_timeout")]
    pub timeout_ms: Milliseconds,
    #[serde(default)]
    pub chords: Vec<ChordDefinition>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChordGroupsConfig {
    #[serde(default)]
    pub groups: Vec<ChordGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceDefinition {
    pub name: String,
    pub keys: Vec<String>,
    pub action: String,
}

fn default_sequence_timeout() -> Milliseconds {
    500
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencesConfig {
    /// Physical key that starts sequence entry; none means sequences are
    /// only reachable from preserved or hand-written triggers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader_key: Option<String>,
    #[serde(default = "default_sequence_timeout")]
    pub timeout_ms: Milliseconds,
    #[serde(default)]
    pub sequences: Vec<SequenceDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TapHoldPickerConfig {
    pub key: String,
    pub tap_action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double_tap_action: Option<String>,
    #[serde(default = "default_tap_timeout")]
    pub tap_timeout_ms: Milliseconds,
    #[serde(default = "default_hold_timeout")]
    pub hold_timeout_ms: Milliseconds,
    #[serde(default = "default_tap_dance_window")]
    pub tap_dance_window_ms: Milliseconds,
    #[serde(default)]
    pub activate_hold_on_other_key_press: bool,
    #[serde(default)]
    pub quick_tap_on_release: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerPreset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mappings: Vec<KeyMapping>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayerPresetPickerConfig {
    #[serde(default)]
    pub presets: Vec<LayerPreset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_preset_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum LaunchTarget {
    App(String),
    Url(String),
    Folder(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LauncherEntry {
    pub key: String,
    pub target: LaunchTarget,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LauncherGridConfig {
    #[serde(default)]
    pub entries: Vec<LauncherEntry>,
}
