//! Parses rendered actions back into behaviors.
//!
//! Only the forms the renderer emits are recognized: the tap-hold family,
//! tap-dance and macro. Everything else yields `None`, meaning "no advanced
//! behavior".

use std::collections::BTreeMap;

use keymap_schema::{
    Behavior, DualRole, MacroBehavior, Milliseconds, TapDance, TapOrTapDance,
    DEFAULT_HOLD_TIMEOUT_MS, DEFAULT_TAP_TIMEOUT_MS,
};

use crate::render::{HOLD_TIMEOUT_VAR, HYPER_MODIFIERS, MEH_MODIFIERS, TAP_TIMEOUT_VAR};
use crate::tokenizer::{split_group, strip_comments, tokenize};

pub fn parse(action_text: &str) -> Option<Behavior> {
    let tokens = split_group(action_text)?;
    let head = tokens.first()?;
    match head.as_str() {
        "tap-hold" | "tap-hold-press" | "tap-hold-release" => {
            if tokens.len() != 5 {
                return None;
            }
            let mut d = dual_role(&tokens)?;
            d.activate_hold_on_other_key_press = head == "tap-hold-press";
            d.quick_tap_on_release = head == "tap-hold-release";
            Some(Behavior::DualRole(d))
        }
        "tap-hold-release-keys" => {
            if tokens.len() != 6 {
                return None;
            }
            let mut d = dual_role(&tokens)?;
            d.custom_tap_keys = split_group(&tokens[5])?;
            Some(Behavior::DualRole(d))
        }
        "tap-dance" => {
            if tokens.len() != 3 {
                return None;
            }
            let window_ms: Milliseconds = tokens[1].parse().ok()?;
            let actions = split_group(&tokens[2])?;
            if actions.is_empty() {
                return None;
            }
            let actions: Vec<String> = actions.iter().map(|a| normalize_action(a)).collect();
            Some(Behavior::TapOrTapDance(TapOrTapDance::TapDance(
                TapDance::from_actions(window_ms, actions),
            )))
        }
        "macro" => {
            if tokens.len() < 2 {
                return None;
            }
            Some(Behavior::Macro(MacroBehavior::keys(tokens[1..].iter().cloned())))
        }
        _ => None,
    }
}

fn dual_role(tokens: &[String]) -> Option<DualRole> {
    let tap_timeout_ms = parse_timeout(&tokens[1])?;
    let hold_timeout_ms = parse_timeout(&tokens[2])?;
    Some(DualRole {
        tap_timeout_ms,
        hold_timeout_ms,
        ..DualRole::new(normalize_action(&tokens[3]), normalize_action(&tokens[4]))
    })
}

/// Resolves the shared timeout variables back to their default values.
fn parse_timeout(token: &str) -> Option<Milliseconds> {
    match token.strip_prefix('$') {
        Some(TAP_TIMEOUT_VAR) => Some(DEFAULT_TAP_TIMEOUT_MS),
        Some(HOLD_TIMEOUT_VAR) => Some(DEFAULT_HOLD_TIMEOUT_MS),
        Some(_) => None,
        None => token.parse().ok(),
    }
}

/// Maps the modifier expansions of `hyper` and `meh` back to the keyword.
/// Layer side effects folded into hyper are regenerated on render.
fn normalize_action(token: &str) -> String {
    let Some(inner) = split_group(token) else {
        return token.to_string();
    };
    let is_multi = inner.first().map(String::as_str) == Some("multi");
    if is_multi
        && inner.len() >= 5
        && inner[1..5] == HYPER_MODIFIERS
        && inner[5..].iter().all(|t| is_hyper_layer_effect(t))
    {
        return "hyper".to_string();
    }
    if is_multi && inner.len() == 4 && inner[1..4] == MEH_MODIFIERS {
        return "meh".to_string();
    }
    token.to_string()
}

/// Layer activation and notification forms that `hyper` carries for its
/// linked layers.
fn is_hyper_layer_effect(token: &str) -> bool {
    let Some(items) = split_group(token) else {
        return false;
    };
    let items: Vec<&str> = items.iter().map(String::as_str).collect();
    match items.as_slice() {
        ["layer-while-held", _] => true,
        ["on-press-fakekey" | "on-release-fakekey", key, "tap"] => key.starts_with("kp-layer-"),
        ["one-shot-press", ms, held] => {
            ms.parse::<Milliseconds>().is_ok()
                && split_group(held).is_some_and(|h| h.len() == 2 && h[0] == "layer-while-held")
        }
        _ => false,
    }
}

/// Every alias of a generated config's `defalias` blocks that parses as a
/// behavior, keyed by alias name.
pub fn parse_config_aliases(config_text: &str) -> BTreeMap<String, Behavior> {
    let mut out = BTreeMap::new();
    for form in tokenize(&strip_comments(config_text)) {
        let Some(inner) = split_group(&form) else {
            continue;
        };
        if inner.first().map(String::as_str) != Some("defalias") {
            continue;
        }
        for pair in inner[1..].chunks(2) {
            if let [name, action] = pair {
                if let Some(behavior) = parse(action) {
                    out.insert(name.clone(), behavior);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{render, render_dual_role, ActivationContext};
    use keymap_schema::KeyMapping;

    fn roundtrip(behavior: Behavior) {
        let mapping = KeyMapping::new("caps", "esc").with_behavior(behavior.clone());
        let text = render(&mapping, &ActivationContext::empty());
        assert_eq!(parse(&text), Some(behavior), "text was {text}");
    }

    #[test]
    fn tap_hold_family_roundtrips() {
        roundtrip(Behavior::DualRole(DualRole::new("esc", "lctl")));

        let mut press = DualRole::new("esc", "lctl");
        press.activate_hold_on_other_key_press = true;
        roundtrip(Behavior::DualRole(press));

        let mut release = DualRole::new("a", "lmet");
        release.quick_tap_on_release = true;
        release.hold_timeout_ms = 300;
        roundtrip(Behavior::DualRole(release));

        let mut keys = DualRole::new("f", "lsft");
        keys.custom_tap_keys = vec!["j".into(), "k".into()];
        keys.tap_timeout_ms = 150;
        roundtrip(Behavior::DualRole(keys));

        roundtrip(Behavior::DualRole(DualRole::new("esc", "hyper")));
        roundtrip(Behavior::DualRole(DualRole::new("esc", "meh")));
    }

    #[test]
    fn tap_dance_and_macro_roundtrip() {
        roundtrip(Behavior::TapOrTapDance(TapOrTapDance::TapDance(TapDance::from_actions(
            250,
            ["esc", "caps", "(multi lctl c)"],
        ))));
        roundtrip(Behavior::Macro(MacroBehavior::keys(["h", "i", "S-1"])));
    }

    #[test]
    fn symbolic_timeouts_resolve_to_defaults() {
        let parsed = parse("(tap-hold $tap-timeout $hold-timeout a lctl)").unwrap();
        match parsed {
            Behavior::DualRole(d) => {
                assert_eq!(d.tap_timeout_ms, DEFAULT_TAP_TIMEOUT_MS);
                assert_eq!(d.hold_timeout_ms, DEFAULT_HOLD_TIMEOUT_MS);
            }
            other => panic!("unexpected behavior: {other:?}"),
        }
    }

    #[test]
    fn nested_sub_actions_survive() {
        let d = DualRole::new("(macro a b)", "(layer-while-held nav)");
        let text = render_dual_role(&d, &ActivationContext::empty());
        assert_eq!(parse(&text), Some(Behavior::DualRole(d)));
    }

    #[test]
    fn only_hyper_side_effects_collapse_to_hyper() {
        let linked = "(tap-hold 200 200 esc (multi lctl lalt lmet lsft (one-shot-press 2000 \
                      (layer-while-held launcher)) (on-press-fakekey kp-layer-launcher tap)))";
        match parse(linked) {
            Some(Behavior::DualRole(d)) => assert_eq!(d.hold_action, "hyper"),
            other => panic!("unexpected behavior: {other:?}"),
        }

        let authored = "(tap-hold 200 200 esc (multi lctl lalt lmet lsft a))";
        match parse(authored) {
            Some(Behavior::DualRole(d)) => assert_eq!(d.hold_action, "(multi lctl lalt lmet lsft a)"),
            other => panic!("unexpected behavior: {other:?}"),
        }
    }

    #[test]
    fn unrecognized_text_is_not_a_behavior() {
        assert_eq!(parse("a"), None);
        assert_eq!(parse("@alias"), None);
        assert_eq!(parse("(multi lctl c)"), None);
        assert_eq!(parse("(tap-hold 200 a lctl)"), None);
        assert_eq!(parse("(tap-hold $unknown 200 a lctl)"), None);
        assert_eq!(parse("(tap-dance 200 ())"), None);
        assert_eq!(parse("(macro)"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn config_aliases_parse_from_generated_block() {
        let text = "\
(defvar tap-timeout 200 hold-timeout 200)
(defalias
  ;; Home Row Mods
  th_base_a (tap-hold-release $tap-timeout $hold-timeout a lctl)
  act_base_x (multi lctl c)
  mac_base_m (macro h i)
)
";
        let aliases = parse_config_aliases(text);
        assert_eq!(aliases.len(), 2);
        assert!(matches!(aliases.get("th_base_a"), Some(Behavior::DualRole(_))));
        assert!(matches!(aliases.get("mac_base_m"), Some(Behavior::Macro(_))));
    }
}
