//! Rendering of mappings and behaviors into engine action syntax.
//!
//! Rendering never fails: malformed input degrades to best-effort output so
//! one bad mapping cannot block the rest of a compile.

use keymap_schema::{
    Behavior, ChordBehavior, DualRole, DualRoleMode, HyperTrigger, KeyMapping, Layer,
    MacroBehavior, MacroSource, Milliseconds, TapDance, TapOrTapDance, DEFAULT_HOLD_TIMEOUT_MS,
    DEFAULT_TAP_TIMEOUT_MS,
};
use tracing::warn;

use crate::keys::{alias_safe, to_engine_action, to_engine_key, to_engine_key_for_macro};
use crate::planner::{ActivationPlan, HyperLink};
use crate::text_keys::map_text;
use crate::tokenizer::{group_inner, parens_balanced};
use crate::DEFAULT_ONE_SHOT_TIMEOUT_MS;

pub const TAP_TIMEOUT_VAR: &str = "tap-timeout";
pub const HOLD_TIMEOUT_VAR: &str = "hold-timeout";
pub const NO_OP: &str = "XX";
pub const TRANSPARENT: &str = "_";

pub const HYPER_MODIFIERS: [&str; 4] = ["lctl", "lalt", "lmet", "lsft"];
pub const MEH_MODIFIERS: [&str; 3] = ["lctl", "lalt", "lsft"];

/// Layer activation state the renderer threads through `hyper`.
#[derive(Debug, Clone, Copy)]
pub struct ActivationContext<'a> {
    plan: Option<&'a ActivationPlan>,
    pub one_shot_timeout_ms: Milliseconds,
}

impl<'a> ActivationContext<'a> {
    pub fn new(plan: &'a ActivationPlan, one_shot_timeout_ms: Milliseconds) -> Self {
        Self {
            plan: Some(plan),
            one_shot_timeout_ms,
        }
    }

    pub fn empty() -> ActivationContext<'static> {
        ActivationContext {
            plan: None,
            one_shot_timeout_ms: DEFAULT_ONE_SHOT_TIMEOUT_MS,
        }
    }

    fn hyper_links(&self) -> &[HyperLink] {
        self.plan
            .map(|p| p.hyper_linked_layers.as_slice())
            .unwrap_or(&[])
    }
}

/// Renders a mapping. `behavior` wins over fork outputs, which win over the
/// plain output.
pub fn render(mapping: &KeyMapping, ctx: &ActivationContext<'_>) -> String {
    match &mapping.behavior {
        Some(behavior) => render_behavior(behavior, mapping, ctx),
        None if mapping.requires_fork() => render_fork(mapping, ctx),
        None => render_action_text(&mapping.output, ctx),
    }
}

pub fn render_behavior(behavior: &Behavior, mapping: &KeyMapping, ctx: &ActivationContext<'_>) -> String {
    match behavior {
        Behavior::DualRole(d) => render_dual_role(d, ctx),
        Behavior::TapOrTapDance(TapOrTapDance::Tap { action }) => render_action_text(action, ctx),
        Behavior::TapOrTapDance(TapOrTapDance::TapDance(td)) => {
            render_tap_dance(td, &mapping.input, ctx)
        }
        Behavior::Macro(m) => render_macro(m),
        Behavior::Chord(c) => render_chord_reference(c, &mapping.input),
    }
}

/// Renders free-form action text: engine syntax passes through, `hyper` and
/// `meh` expand, known key names and `+` combos convert, and several
/// whitespace-separated keys become a `multi`.
pub fn render_action_text(text: &str, ctx: &ActivationContext<'_>) -> String {
    let t = text.trim();
    if t.is_empty() {
        return NO_OP.to_string();
    }
    if is_engine_form(t) {
        return t.to_string();
    }
    if t.eq_ignore_ascii_case("hyper") {
        return render_hyper(ctx);
    }
    if t.eq_ignore_ascii_case("meh") {
        return format!("(multi {})", MEH_MODIFIERS.join(" "));
    }
    let parts: Vec<&str> = t.split_whitespace().collect();
    if parts.len() > 1 && to_engine_key(t) == t.to_lowercase() {
        // not a known multi-word key name
        let inner: Vec<String> = parts.iter().map(|p| render_action_text(p, ctx)).collect();
        return format!("(multi {})", inner.join(" "));
    }
    let action = to_engine_action(t);
    if action.contains(&['(', ')', '"'][..]) {
        warn!(text = t, "output is not a key or a balanced action; rendering no-op");
        return NO_OP.to_string();
    }
    action
}

/// Balanced groups, alias references and variables pass through verbatim.
/// A lone `(`, `@` or `$` is a key, not syntax.
fn is_engine_form(t: &str) -> bool {
    if group_inner(t).is_some() {
        return parens_balanced(t);
    }
    t.len() > 1 && (t.starts_with('@') || t.starts_with('$'))
}

pub fn render_dual_role(d: &DualRole, ctx: &ActivationContext<'_>) -> String {
    let tap_ms = timeout_token(d.tap_timeout_ms, DEFAULT_TAP_TIMEOUT_MS, TAP_TIMEOUT_VAR);
    let hold_ms = timeout_token(d.hold_timeout_ms, DEFAULT_HOLD_TIMEOUT_MS, HOLD_TIMEOUT_VAR);
    let tap = render_action_text(&d.tap_action, ctx);
    let hold = render_action_text(&d.hold_action, ctx);
    match d.mode() {
        DualRoleMode::HoldOnOtherKeyPress => {
            format!("(tap-hold-press {tap_ms} {hold_ms} {tap} {hold})")
        }
        DualRoleMode::HoldOnRelease => {
            format!("(tap-hold-release {tap_ms} {hold_ms} {tap} {hold})")
        }
        DualRoleMode::CustomTapKeys => {
            let keys: Vec<String> = d.custom_tap_keys.iter().map(|k| to_engine_key(k)).collect();
            format!(
                "(tap-hold-release-keys {tap_ms} {hold_ms} {tap} {hold} ({}))",
                keys.join(" ")
            )
        }
        DualRoleMode::Timeout => format!("(tap-hold {tap_ms} {hold_ms} {tap} {hold})"),
    }
}

/// Uses the shared variable when the value equals the default, so the
/// defaults can be re-tuned in one place.
fn timeout_token(ms: Milliseconds, default: Milliseconds, var: &str) -> String {
    if ms == default {
        format!("${var}")
    } else {
        ms.to_string()
    }
}

pub fn render_tap_dance(td: &TapDance, input: &str, ctx: &ActivationContext<'_>) -> String {
    if td.steps.is_empty() {
        return passthrough(input);
    }
    let mut steps: Vec<_> = td.steps.iter().collect();
    steps.sort_by_key(|s| s.tap_count);
    if !tap_counts_contiguous(td) {
        let counts: Vec<u8> = steps.iter().map(|s| s.tap_count).collect();
        warn!(input, ?counts, "tap-dance counts are not 1..n; steps renumbered in order");
    }
    let actions: Vec<String> = steps
        .iter()
        .map(|s| render_action_text(&s.action, ctx))
        .collect();
    format!("(tap-dance {} ({}))", td.window_ms, actions.join(" "))
}

/// Whether the step tap counts are exactly 1, 2, .. n in some order.
fn tap_counts_contiguous(td: &TapDance) -> bool {
    let mut counts: Vec<u8> = td.steps.iter().map(|s| s.tap_count).collect();
    counts.sort_unstable();
    counts.len() <= usize::from(u8::MAX)
        && counts.iter().zip(1..=u8::MAX).all(|(c, expected)| *c == expected)
}

pub fn render_macro(m: &MacroBehavior) -> String {
    let keys = match m.source {
        MacroSource::Text => {
            let text = m.text.as_deref().unwrap_or_default();
            match map_text(text) {
                Ok(keys) => keys,
                Err(err) => {
                    warn!(%err, text, "macro text cannot be typed; rendering no-op");
                    return NO_OP.to_string();
                }
            }
        }
        MacroSource::Keys => m
            .outputs
            .iter()
            .map(|k| to_engine_key_for_macro(k))
            .filter(|k| !k.is_empty())
            .collect(),
    };
    if keys.is_empty() {
        return NO_OP.to_string();
    }
    format!("(macro {})", keys.join(" "))
}

pub fn render_chord_reference(c: &ChordBehavior, input: &str) -> String {
    format!("(chord {} {})", chord_group_name(&c.group_name), passthrough(input))
}

pub fn chord_group_name(name: &str) -> String {
    alias_safe(name.trim())
}

pub fn render_fork(mapping: &KeyMapping, ctx: &ActivationContext<'_>) -> String {
    let default = render_action_text(&mapping.output, ctx);
    if let Some(shifted) = &mapping.shifted_output {
        let alt = render_action_text(shifted, ctx);
        return format!("(fork {default} {alt} (lsft rsft))");
    }
    if let Some(ctrl) = &mapping.ctrl_output {
        let alt = render_action_text(ctrl, ctx);
        return format!("(fork {default} {alt} (lctl rctl))");
    }
    default
}

/// `hyper` plus activation of every layer linked to it.
pub fn render_hyper(ctx: &ActivationContext<'_>) -> String {
    let mut parts: Vec<String> = HYPER_MODIFIERS.iter().map(|m| m.to_string()).collect();
    for link in ctx.hyper_links() {
        match link.trigger {
            HyperTrigger::Hold => {
                parts.push(format!("(layer-while-held {})", link.layer.kanata_name()));
                parts.push(format!("(on-press-fakekey {} tap)", layer_fake_key(&link.layer)));
                parts.push(format!("(on-release-fakekey {} tap)", layer_fake_key(&Layer::Base)));
            }
            HyperTrigger::Tap => {
                parts.push(format!(
                    "(one-shot-press {} (layer-while-held {}))",
                    ctx.one_shot_timeout_ms,
                    link.layer.kanata_name()
                ));
                parts.push(format!("(on-press-fakekey {} tap)", layer_fake_key(&link.layer)));
            }
        }
    }
    format!("(multi {})", parts.join(" "))
}

/// Virtual key that announces a switch to `layer`.
pub fn layer_fake_key(layer: &Layer) -> String {
    format!("kp-layer-{}", layer.kanata_name())
}

/// Notification payload for `layer`.
pub fn layer_message(layer: &Layer) -> String {
    format!("(push-msg \"layer:{}\")", layer.kanata_name())
}

/// Action that enters `target`, held or as a one-shot.
pub fn render_layer_activation(target: &Layer, one_shot: bool, ctx: &ActivationContext<'_>) -> String {
    let notify = format!("(on-press-fakekey {} tap)", layer_fake_key(target));
    if one_shot {
        format!(
            "(multi (one-shot-press {} (layer-while-held {})) {notify})",
            ctx.one_shot_timeout_ms,
            target.kanata_name()
        )
    } else {
        format!(
            "(multi (layer-while-held {}) {notify} (on-release-fakekey {} tap))",
            target.kanata_name(),
            layer_fake_key(&Layer::Base)
        )
    }
}

/// Makes an action in a one-shot `layer` release the layer and announce the
/// return to base after it runs.
pub fn wrap_one_shot_release(action: &str, layer: &Layer) -> String {
    format!(
        "(multi {action} (release-layer {}) (on-press-fakekey {} tap))",
        layer.kanata_name(),
        layer_fake_key(&Layer::Base)
    )
}

/// Textual check for an action that already returns to base.
// TODO: carry a structural "returns to base" flag on LayerEntry instead of matching text.
pub fn already_returns_to_base(action: &str) -> bool {
    action.contains("layer:base") || action.contains(&layer_fake_key(&Layer::Base))
}

pub fn passthrough(input: &str) -> String {
    let key = to_engine_key(input);
    if key.is_empty() {
        NO_OP.to_string()
    } else {
        key
    }
}

pub fn is_complex(action: &str) -> bool {
    action.trim_start().starts_with('(')
}
