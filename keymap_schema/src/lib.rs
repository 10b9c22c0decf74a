use serde::{Deserialize, Serialize};
use std::fmt;

mod collection;
mod layout;

pub use collection::{
    ChordDefinition, ChordGroup, ChordGroupsConfig, CollectionKind, HomeRowLayerKey,
    HomeRowLayerTogglesConfig, HomeRowModKey, HomeRowModsConfig, LaunchTarget, LauncherEntry,
    LauncherGridConfig, LayerPreset, LayerPresetPickerConfig, LayerToggleMode, RuleCollection,
    SequenceDefinition, SequencesConfig, TapHoldPickerConfig,
};
pub use layout::PhysicalLayout;

pub type Milliseconds = u32;

pub const DEFAULT_TAP_TIMEOUT_MS: Milliseconds = 200;
pub const DEFAULT_HOLD_TIMEOUT_MS: Milliseconds = 200;
pub const DEFAULT_CHORD_TIMEOUT_MS: Milliseconds = 50;
pub const DEFAULT_TAP_DANCE_WINDOW_MS: Milliseconds = 200;

fn default_tap_timeout() -> Milliseconds {
    DEFAULT_TAP_TIMEOUT_MS
}

fn default_hold_timeout() -> Milliseconds {
    DEFAULT_HOLD_TIMEOUT_MS
}

fn default_chord_timeout() -> Milliseconds {
    DEFAULT_CHORD_TIMEOUT_MS
}

fn default_tap_dance_window() -> Milliseconds {
    DEFAULT_TAP_DANCE_WINDOW_MS
}

/// A named keymap that can be activated over the base layer.
///
/// Serialized as its engine-facing name (`"base"`, `"nav"`, ...). Unknown
/// names become `Custom` layers with a sanitized name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Layer {
    #[default]
    Base,
    Nav,
    Window,
    Symbol,
    Number,
    Function,
    Launcher,
    Custom(String),
}

impl Layer {
    pub fn kanata_name(&self) -> &str {
        match self {
            Layer::Base => "base",
            Layer::Nav => "nav",
            Layer::Window => "window",
            Layer::Symbol => "sym",
            Layer::Number => "num",
            Layer::Function => "fun",
            Layer::Launcher => "launcher",
            Layer::Custom(name) => name,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Layer::Base => "Base".to_string(),
            Layer::Nav => "Navigation".to_string(),
            Layer::Window => "Window".to_string(),
            Layer::Symbol => "Symbols".to_string(),
            Layer::Number => "Numbers".to_string(),
            Layer::Function => "Function".to_string(),
            Layer::Launcher => "Launcher".to_string(),
            Layer::Custom(name) => {
                let mut chars = name.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        }
    }

    pub fn is_base(&self) -> bool {
        matches!(self, Layer::Base)
    }
}

impl From<String> for Layer {
    fn from(value: String) -> Self {
        Layer::from(value.as_str())
    }
}

impl From<&str> for Layer {
    fn from(value: &str) -> Self {
        let lowered = value.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "" | "base" => Layer::Base,
            "nav" | "navigation" => Layer::Nav,
            "window" | "windows" => Layer::Window,
            "sym" | "symbol" | "symbols" => Layer::Symbol,
            "num" | "number" | "numbers" | "numpad" => Layer::Number,
            "fun" | "function" | "fn" => Layer::Function,
            "launcher" | "launch" => Layer::Launcher,
            other => Layer::Custom(sanitize_layer_name(other)),
        }
    }
}

impl From<Layer> for String {
    fn from(layer: Layer) -> Self {
        layer.kanata_name().to_string()
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kanata_name())
    }
}

fn sanitize_layer_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// One physical key remapping.
///
/// When `behavior` is set, `output` is only a fallback/display value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMapping {
    pub input: String,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<Behavior>,
    /// Output while shift is held. Checked before `ctrl_output`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shifted_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctrl_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl KeyMapping {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            behavior: None,
            shifted_output: None,
            ctrl_output: None,
            description: None,
        }
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = Some(behavior);
        self
    }

    pub fn with_shifted_output(mut self, output: impl Into<String>) -> Self {
        self.shifted_output = Some(output.into());
        self
    }

    pub fn with_ctrl_output(mut self, output: impl Into<String>) -> Self {
        self.ctrl_output = Some(output.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn requires_fork(&self) -> bool {
        self.shifted_output.is_some() || self.ctrl_output.is_some()
    }

    /// Keys of a chord input (`"j+k"`). A single-key input yields one element.
    pub fn input_keys(&self) -> Vec<&str> {
        let parts: Vec<&str> = self
            .input
            .split('+')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() >= 2 {
            parts
        } else {
            vec![self.input.trim()]
        }
    }

    pub fn is_chord_input(&self) -> bool {
        self.input_keys().len() >= 2
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Behavior {
    DualRole(DualRole),
    TapOrTapDance(TapOrTapDance),
    Macro(MacroBehavior),
    Chord(ChordBehavior),
}

/// Tap for one action, hold for another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DualRole {
    pub tap_action: String,
    pub hold_action: String,
    #[serde(default = "default_tap_timeout")]
    pub tap_timeout_ms: Milliseconds,
    #[serde(default = "default_hold_timeout")]
    pub hold_timeout_ms: Milliseconds,
    #[serde(default)]
    pub activate_hold_on_other_key_press: bool,
    #[serde(default)]
    pub quick_tap_on_release: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_tap_keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualRoleMode {
    HoldOnOtherKeyPress,
    HoldOnRelease,
    CustomTapKeys,
    Timeout,
}

impl DualRole {
    pub fn new(tap_action: impl Into<String>, hold_action: impl Into<String>) -> Self {
        Self {
            tap_action: tap_action.into(),
            hold_action: hold_action.into(),
            tap_timeout_ms: DEFAULT_TAP_TIMEOUT_MS,
            hold_timeout_ms: DEFAULT_HOLD_TIMEOUT_MS,
            activate_hold_on_other_key_press: false,
            quick_tap_on_release: false,
            custom_tap_keys: Vec::new(),
        }
    }

    /// Which tap-hold flavour applies; flags are checked in priority order.
    pub fn mode(&self) -> DualRoleMode {
        if self.activate_hold_on_other_key_press {
            DualRoleMode::HoldOnOtherKeyPress
        } else if self.quick_tap_on_release {
            DualRoleMode::HoldOnRelease
        } else if !self.custom_tap_keys.is_empty() {
            DualRoleMode::CustomTapKeys
        } else {
            DualRoleMode::Timeout
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TapOrTapDance {
    Tap { action: String },
    TapDance(TapDance),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapDance {
    #[serde(default = "default_tap_dance_window")]
    pub window_ms: Milliseconds,
    #[serde(default)]
    pub steps: Vec<TapDanceStep>,
}

impl TapDance {
    /// Builds a tap-dance whose step `n` fires on the `n`-th tap.
    pub fn from_actions<I, S>(window_ms: Milliseconds, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        // tap counts stop at u8::MAX; later actions are dropped
        let steps = actions
            .into_iter()
            .zip(1..=u8::MAX)
            .map(|(action, tap_count)| TapDanceStep {
                tap_count,
                action: action.into(),
            })
            .collect();
        Self { window_ms, steps }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapDanceStep {
    pub tap_count: u8,
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroSource {
    #[default]
    Keys,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroBehavior {
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub source: MacroSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl MacroBehavior {
    pub fn keys<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outputs: outputs.into_iter().map(Into::into).collect(),
            source: MacroSource::Keys,
            text: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            outputs: Vec::new(),
            source: MacroSource::Text,
            text: Some(text.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordBehavior {
    pub group_name: String,
    pub keys: Vec<String>,
    #[serde(default = "default_chord_timeout")]
    pub timeout_ms: Milliseconds,
    pub output: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HyperTrigger {
    /// Layer active while hyper is held.
    #[default]
    Hold,
    /// Layer stays active until the next keypress.
    Tap,
}

/// A key that activates `target_layer` from `source_layer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MomentaryActivator {
    pub input: String,
    #[serde(default)]
    pub source_layer: Layer,
    pub target_layer: Layer,
    /// Only meaningful when `input` is the synthetic `"hyper"` token.
    #[serde(default)]
    pub hyper_trigger: HyperTrigger,
}

impl MomentaryActivator {
    pub fn new(input: impl Into<String>, source_layer: Layer, target_layer: Layer) -> Self {
        Self {
            input: input.into(),
            source_layer,
            target_layer,
            hyper_trigger: HyperTrigger::Hold,
        }
    }

    pub fn is_hyper(&self) -> bool {
        self.input.trim().eq_ignore_ascii_case("hyper")
    }
}

fn default_leader_key() -> String {
    "space".to_string()
}

fn default_true() -> bool {
    true
}

fn default_leader_layer() -> Layer {
    Layer::Nav
}

/// The system-wide leader key preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderKeyPreference {
    #[serde(default = "default_leader_key")]
    pub key: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_leader_layer")]
    pub target_layer: Layer,
}

impl Default for LeaderKeyPreference {
    fn default() -> Self {
        Self {
            key: default_leader_key(),
            enabled: true,
            target_layer: Layer::Nav,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_serializes_as_engine_name() {
        let json = serde_json::to_value(Layer::Symbol).unwrap();
        assert_eq!(json, "sym");

        let layer: Layer = serde_json::from_str("\"Navigation\"").unwrap();
        assert_eq!(layer, Layer::Nav);

        let custom: Layer = serde_json::from_str("\"Gaming Mode\"").unwrap();
        assert_eq!(custom, Layer::Custom("gaming-mode".to_string()));
        assert_eq!(custom.display_name(), "Gaming-mode");
    }

    #[test]
    fn base_layer_sorts_first() {
        let mut layers = vec![
            Layer::Custom("zzz".to_string()),
            Layer::Window,
            Layer::Base,
            Layer::Nav,
        ];
        layers.sort();
        assert_eq!(layers[0], Layer::Base);
        assert_eq!(layers[1], Layer::Nav);
    }

    #[test]
    fn behavior_serialization_includes_type_tag() {
        let mapping = KeyMapping::new("caps", "esc")
            .with_behavior(Behavior::DualRole(DualRole::new("esc", "lctl")));

        let json = serde_json::to_value(&mapping).unwrap();
        assert_eq!(json["behavior"]["type"], "dual_role");
        assert_eq!(json["behavior"]["tap_action"], "esc");
        assert_eq!(json["behavior"]["tap_timeout_ms"], 200);
        assert!(json.get("shifted_output").is_none());
    }

    #[test]
    fn dual_role_timeouts_default_when_missing() {
        let v = serde_json::json!({
            "type": "dual_role",
            "tap_action": "a",
            "hold_action": "lmet"
        });

        let behavior: Behavior = serde_json::from_value(v).unwrap();
        match behavior {
            Behavior::DualRole(d) => {
                assert_eq!(d.tap_timeout_ms, DEFAULT_TAP_TIMEOUT_MS);
                assert_eq!(d.hold_timeout_ms, DEFAULT_HOLD_TIMEOUT_MS);
                assert_eq!(d.mode(), DualRoleMode::Timeout);
            }
            _ => panic!("unexpected behavior"),
        }
    }

    #[test]
    fn tap_dance_nested_tags_roundtrip() {
        let behavior = Behavior::TapOrTapDance(TapOrTapDance::TapDance(TapDance::from_actions(
            180,
            ["esc", "caps"],
        )));

        let json = serde_json::to_string(&behavior).unwrap();
        let back: Behavior = serde_json::from_str(&json).unwrap();
        assert_eq!(behavior, back);
    }

    #[test]
    fn tap_dance_counts_stop_at_u8_max() {
        let td = TapDance::from_actions(200, (0..300).map(|i| format!("k{i}")));
        assert_eq!(td.steps.len(), 255);
        assert_eq!(td.steps[0].tap_count, 1);
        assert_eq!(td.steps[254].tap_count, 255);
        assert_eq!(td.steps[254].action, "k254");
    }

    #[test]
    fn dual_role_mode_priority() {
        let mut d = DualRole::new("a", "lctl");
        d.custom_tap_keys = vec!["s".to_string()];
        d.quick_tap_on_release = true;
        d.activate_hold_on_other_key_press = true;
        assert_eq!(d.mode(), DualRoleMode::HoldOnOtherKeyPress);
        d.activate_hold_on_other_key_press = false;
        assert_eq!(d.mode(), DualRoleMode::HoldOnRelease);
        d.quick_tap_on_release = false;
        assert_eq!(d.mode(), DualRoleMode::CustomTapKeys);
    }

    #[test]
    fn chord_input_splits_on_plus() {
        assert_eq!(KeyMapping::new("j+k", "esc").input_keys(), vec!["j", "k"]);
        assert!(!KeyMapping::new("caps lock", "esc").is_chord_input());
        assert!(!KeyMapping::new("+", "a").is_chord_input());
    }
}
