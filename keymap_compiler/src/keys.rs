//! Conversion between human key names ("caps lock", "cmd") and engine key
//! tokens ("caps", "lmet").

use crate::text_keys::shifted_base;

const NAME_TABLE: &[(&str, &str)] = &[
    ("caps lock", "caps"),
    ("capslock", "caps"),
    ("caps", "caps"),
    ("escape", "esc"),
    ("esc", "esc"),
    ("return", "ret"),
    ("enter", "ret"),
    ("ret", "ret"),
    ("space", "spc"),
    ("spacebar", "spc"),
    ("spc", "spc"),
    ("tab", "tab"),
    ("backspace", "bspc"),
    ("delete", "bspc"),
    ("bspc", "bspc"),
    ("forward delete", "del"),
    ("fwd delete", "del"),
    ("del", "del"),
    ("command", "lmet"),
    ("cmd", "lmet"),
    ("left command", "lmet"),
    ("lcmd", "lmet"),
    ("meta", "lmet"),
    ("left meta", "lmet"),
    ("super", "lmet"),
    ("win", "lmet"),
    ("lmet", "lmet"),
    ("right command", "rmet"),
    ("rcmd", "rmet"),
    ("right meta", "rmet"),
    ("rmet", "rmet"),
    ("option", "lalt"),
    ("opt", "lalt"),
    ("alt", "lalt"),
    ("left option", "lalt"),
    ("left alt", "lalt"),
    ("lopt", "lalt"),
    ("lalt", "lalt"),
    ("right option", "ralt"),
    ("right alt", "ralt"),
    ("ropt", "ralt"),
    ("ralt", "ralt"),
    ("control", "lctl"),
    ("ctrl", "lctl"),
    ("left control", "lctl"),
    ("left ctrl", "lctl"),
    ("lctrl", "lctl"),
    ("lctl", "lctl"),
    ("right control", "rctl"),
    ("right ctrl", "rctl"),
    ("rctrl", "rctl"),
    ("rctl", "rctl"),
    ("shift", "lsft"),
    ("left shift", "lsft"),
    ("lshift", "lsft"),
    ("lsft", "lsft"),
    ("right shift", "rsft"),
    ("rshift", "rsft"),
    ("rsft", "rsft"),
    ("function", "fn"),
    ("globe", "fn"),
    ("fn", "fn"),
    ("left arrow", "left"),
    ("left", "left"),
    ("right arrow", "rght"),
    ("right", "rght"),
    ("rght", "rght"),
    ("up arrow", "up"),
    ("up", "up"),
    ("down arrow", "down"),
    ("down", "down"),
    ("page up", "pgup"),
    ("pageup", "pgup"),
    ("pgup", "pgup"),
    ("page down", "pgdn"),
    ("pagedown", "pgdn"),
    ("pgdn", "pgdn"),
    ("home", "home"),
    ("end", "end"),
    ("grave", "grv"),
    ("backtick", "grv"),
    ("`", "grv"),
    ("minus", "min"),
    ("-", "min"),
    ("equal", "eql"),
    ("equals", "eql"),
    ("=", "eql"),
    ("left bracket", "lbrc"),
    ("[", "lbrc"),
    ("right bracket", "rbrc"),
    ("]", "rbrc"),
    ("backslash", "bksl"),
    ("\\", "bksl"),
    ("semicolon", "scln"),
    (";", "scln"),
    ("quote", "apos"),
    ("apostrophe", "apos"),
    ("'", "apos"),
    ("comma", "comm"),
    (",", "comm"),
    ("period", "dot"),
    ("dot", "dot"),
    (".", "dot"),
    ("slash", "slsh"),
    ("/", "slsh"),
    ("(", "lpar"),
    (")", "rpar"),
    ("volume up", "volu"),
    ("volume down", "voldwn"),
    ("mute", "mute"),
    ("play/pause", "pp"),
    ("play pause", "pp"),
    ("next track", "next"),
    ("previous track", "prev"),
    ("brightness up", "brup"),
    ("brightness down", "brdown"),
    ("print screen", "prnt"),
];

/// Preferred display name for tokens whose name differs from the token.
const DISPLAY_TABLE: &[(&str, &str)] = &[
    ("caps", "caps lock"),
    ("esc", "escape"),
    ("ret", "return"),
    ("spc", "space"),
    ("bspc", "delete"),
    ("del", "forward delete"),
    ("lmet", "command"),
    ("rmet", "right command"),
    ("lalt", "option"),
    ("ralt", "right option"),
    ("lctl", "control"),
    ("rctl", "right control"),
    ("lsft", "shift"),
    ("rsft", "right shift"),
    ("rght", "right"),
    ("pgup", "page up"),
    ("pgdn", "page down"),
    ("grv", "`"),
    ("min", "-"),
    ("eql", "="),
    ("lbrc", "["),
    ("rbrc", "]"),
    ("bksl", "\\"),
    ("scln", ";"),
    ("apos", "'"),
    ("comm", ","),
    ("dot", "."),
    ("slsh", "/"),
];

const MACRO_PREFIXES: &[&str] = &["M", "A", "C", "S", "RA", "RC", "RM", "RS", "AG"];

const MODIFIER_KEYS: &[&str] = &[
    "lsft", "rsft", "lctl", "rctl", "lalt", "ralt", "lmet", "rmet", "fn",
];

/// Converts a key name to its engine token. Never fails: unknown names pass
/// through lowercased.
pub fn to_engine_key(name: &str) -> String {
    if name == " " {
        return "spc".to_string();
    }
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let lowered = trimmed.to_lowercase();
    lookup(&lowered)
        .map(str::to_string)
        .unwrap_or(lowered)
}

/// Like [`to_engine_key`], but keeps uppercase modifier prefixes (`M-`,
/// `C-S-`, `RA-`) that macro syntax requires, converting only the base key.
pub fn to_engine_key_for_macro(name: &str) -> String {
    let trimmed = name.trim();
    let mut prefixes = String::new();
    let mut rest = trimmed;
    while let Some((prefix, base)) = split_macro_prefix(rest) {
        prefixes.push_str(prefix);
        prefixes.push('-');
        rest = base;
    }
    if prefixes.is_empty() {
        return to_engine_key(trimmed);
    }
    format!("{prefixes}{}", to_engine_key(rest))
}

fn split_macro_prefix(s: &str) -> Option<(&str, &str)> {
    let idx = s.find('-')?;
    if idx == 0 {
        return None;
    }
    let (prefix, rest) = (&s[..idx], &s[idx + 1..]);
    if rest.is_empty() || !MACRO_PREFIXES.contains(&prefix) {
        return None;
    }
    Some((prefix, rest))
}

/// Converts a plain output: a single key name, a `+` combo
/// (`cmd+shift+z` -> `M-S-z`), or an already prefixed key (`C-a`).
pub fn to_engine_action(output: &str) -> String {
    let trimmed = output.trim();
    if let Some(key) = shifted_symbol(trimmed) {
        return key;
    }
    if let Some((mods, base)) = split_combo(trimmed) {
        let mut prefixes = Vec::with_capacity(mods.len());
        for m in &mods {
            match modifier_prefix(&to_engine_key(m)) {
                Some(p) => prefixes.push(p),
                None => return to_engine_key(trimmed),
            }
        }
        let mut out = String::new();
        for p in prefixes {
            out.push_str(p);
            out.push('-');
        }
        out.push_str(&to_engine_key(base));
        return out;
    }
    to_engine_key_for_macro(trimmed)
}

/// A lone shifted punctuation character (`!`, `"`) typed as `S-<key>`.
/// Characters with their own key name keep it.
fn shifted_symbol(s: &str) -> Option<String> {
    let mut chars = s.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return None;
    };
    if lookup(s).is_some() {
        return None;
    }
    shifted_base(c).map(|key| format!("S-{key}"))
}

fn split_combo(s: &str) -> Option<(Vec<&str>, &str)> {
    let (head, base) = if let Some(head) = s.strip_suffix("++") {
        (head, "+")
    } else {
        let (head, base) = s.rsplit_once('+')?;
        (head, base)
    };
    if head.trim().is_empty() || base.trim().is_empty() {
        return None;
    }
    let mods: Vec<&str> = head.split('+').map(str::trim).collect();
    if mods.iter().any(|m| m.is_empty()) {
        return None;
    }
    Some((mods, base.trim()))
}

/// Macro prefix for a modifier token (`lmet` -> `M`).
pub fn modifier_prefix(token: &str) -> Option<&'static str> {
    match token {
        "lmet" => Some("M"),
        "rmet" => Some("RM"),
        "lalt" => Some("A"),
        "ralt" => Some("RA"),
        "lctl" => Some("C"),
        "rctl" => Some("RC"),
        "lsft" => Some("S"),
        "rsft" => Some("RS"),
        _ => None,
    }
}

pub fn is_modifier_key(token: &str) -> bool {
    MODIFIER_KEYS.contains(&token)
}

/// Human-readable name for an engine token.
pub fn to_display_name(token: &str) -> String {
    DISPLAY_TABLE
        .iter()
        .find(|(t, _)| *t == token)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| token.to_string())
}

/// Fragment usable inside an alias name.
pub fn alias_safe(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for c in token.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            out.push(c.to_ascii_lowercase());
        } else {
            out.push_str(&format!("x{:02x}", c as u32));
        }
    }
    out
}

fn lookup(lowered: &str) -> Option<&'static str> {
    NAME_TABLE
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|(_, token)| *token)
}
