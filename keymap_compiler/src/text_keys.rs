use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("unsupported character {character:?} at index {index}")]
pub struct UnsupportedCharacter {
    pub character: char,
    pub index: usize,
}

const UNSHIFTED: &[(char, &str)] = &[
    ('`', "grv"),
    ('-', "min"),
    ('=', "eql"),
    ('[', "lbrc"),
    (']', "rbrc"),
    ('\\', "bksl"),
    (';', "scln"),
    ('\'', "apos"),
    (',', "comm"),
    ('.', "dot"),
    ('/', "slsh"),
];

const SHIFTED: &[(char, &str)] = &[
    ('~', "grv"),
    ('!', "1"),
    ('@', "2"),
    ('#', "3"),
    ('$', "4"),
    ('%', "5"),
    ('^', "6"),
    ('&', "7"),
    ('*', "8"),
    ('(', "9"),
    (')', "0"),
    ('_', "min"),
    ('+', "eql"),
    ('{', "lbrc"),
    ('}', "rbrc"),
    ('|', "bksl"),
    (':', "scln"),
    ('"', "apos"),
    ('<', "comm"),
    ('>', "dot"),
    ('?', "slsh"),
];

/// Maps literal text to the engine keys that type it. The first character
/// without a mapping aborts the whole conversion.
pub fn map_text(text: &str) -> Result<Vec<String>, UnsupportedCharacter> {
    text.chars()
        .enumerate()
        .map(|(index, character)| {
            map_char(character).ok_or(UnsupportedCharacter { character, index })
        })
        .collect()
}

fn map_char(c: char) -> Option<String> {
    match c {
        'a'..='z' | '0'..='9' => Some(c.to_string()),
        'A'..='Z' => Some(format!("S-{}", c.to_ascii_lowercase())),
        '\n' => Some("ret".to_string()),
        '\t' => Some("tab".to_string()),
        ' ' => Some("spc".to_string()),
        _ => {
            if let Some((_, key)) = UNSHIFTED.iter().find(|(ch, _)| *ch == c) {
                return Some(key.to_string());
            }
            shifted_base(c).map(|key| format!("S-{key}"))
        }
    }
}

/// Unshifted key that types `c` with shift held.
pub(crate) fn shifted_base(c: char) -> Option<&'static str> {
    SHIFTED.iter().find(|(ch, _)| *ch == c).map(|(_, key)| *key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_letters_digits_and_shifted_punctuation() {
        assert_eq!(map_text("hi!").unwrap(), vec!["h", "i", "S-1"]);
        assert_eq!(map_text("A b\n").unwrap(), vec!["S-a", "spc", "b", "ret"]);
        assert_eq!(map_text("a;b").unwrap(), vec!["a", "scln", "b"]);
        assert_eq!(map_text("(x)").unwrap(), vec!["S-9", "x", "S-0"]);
        assert!(map_text("").unwrap().is_empty());
    }

    #[test]
    fn first_unsupported_character_fails_closed() {
        let err = map_text("caf\u{e9}!").unwrap_err();
        assert_eq!(err.character, '\u{e9}');
        assert_eq!(err.index, 3);
        assert!(map_text("\r").is_err());
    }
}
