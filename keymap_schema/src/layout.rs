use serde::{Deserialize, Serialize};

/// Physical keyboard grid, rows of engine key tokens in visual order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalLayout {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

const ANSI_ROWS: &[&[&str]] = &[
    &["esc", "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12"],
    &["grv", "1", "2", "3", "4", "5", "6", "7", "8", "9", "0", "min", "eql", "bspc"],
    &["tab", "q", "w", "e", "r", "t", "y", "u", "i", "o", "p", "lbrc", "rbrc", "bksl"],
    &["caps", "a", "s", "d", "f", "g", "h", "j", "k", "l", "scln", "apos", "ret"],
    &["lsft", "z", "x", "c", "v", "b", "n", "m", "comm", "dot", "slsh", "rsft"],
    &["fn", "lctl", "lalt", "lmet", "spc", "rmet", "ralt", "left", "down", "up", "rght"],
];

impl PhysicalLayout {
    pub fn ansi() -> Self {
        Self {
            name: "ansi".to_string(),
            rows: ANSI_ROWS
                .iter()
                .map(|row| row.iter().map(|k| k.to_string()).collect())
                .collect(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(String::as_str)
    }

    /// Row and column of `key`, if the layout has it.
    pub fn position(&self, key: &str) -> Option<(usize, usize)> {
        self.rows.iter().enumerate().find_map(|(r, row)| {
            row.iter().position(|k| k == key).map(|c| (r, c))
        })
    }
}

impl Default for PhysicalLayout {
    fn default() -> Self {
        Self::ansi()
    }
}
