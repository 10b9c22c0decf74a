//! Arranges `defsrc` and `deflayer` keys on the physical keyboard grid.

use std::collections::{BTreeMap, BTreeSet};

use keymap_schema::PhysicalLayout;

const INDENT: &str = "  ";

/// Source keys grouped into rows of the physical layout. Keys the layout
/// does not know go to a trailing row in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyGrid {
    pub rows: Vec<Vec<String>>,
}

impl KeyGrid {
    pub fn arrange<'a>(keys: impl IntoIterator<Item = &'a str>, layout: &PhysicalLayout) -> Self {
        let mut placed: BTreeSet<&str> = BTreeSet::new();
        let mut unknown: Vec<String> = Vec::new();
        let mut present: BTreeSet<&str> = BTreeSet::new();

        for key in keys {
            if !present.insert(key) {
                continue;
            }
            if layout.position(key).is_none() {
                unknown.push(key.to_string());
            }
        }

        let mut rows = Vec::new();
        for row in &layout.rows {
            let mut cells = Vec::new();
            for key in row {
                if present.contains(key.as_str()) && placed.insert(key.as_str()) {
                    cells.push(key.clone());
                }
            }
            if !cells.is_empty() {
                rows.push(cells);
            }
        }
        if !unknown.is_empty() {
            rows.push(unknown);
        }
        Self { rows }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Widest cell per key across `defsrc` and every layer, so columns line up.
pub fn column_widths<'a>(
    grid: &KeyGrid,
    layers: impl IntoIterator<Item = &'a BTreeMap<String, String>>,
) -> BTreeMap<String, usize> {
    let mut widths: BTreeMap<String, usize> =
        grid.keys().map(|k| (k.to_string(), k.chars().count())).collect();
    for actions in layers {
        for (key, action) in actions {
            if let Some(w) = widths.get_mut(key) {
                *w = (*w).max(action.chars().count());
            }
        }
    }
    widths
}

pub fn render_defsrc(grid: &KeyGrid, widths: &BTreeMap<String, usize>) -> Vec<String> {
    let mut lines = vec!["(defsrc".to_string()];
    for row in &grid.rows {
        lines.push(render_row(row.iter().map(|k| (k.as_str(), k.as_str())), widths));
    }
    lines.push(")".to_string());
    lines
}

/// One `deflayer`; keys with no action in `actions` render as `fallback`.
pub fn render_layer(
    name: &str,
    grid: &KeyGrid,
    actions: &BTreeMap<String, String>,
    fallback: impl Fn(&str) -> String,
    widths: &BTreeMap<String, usize>,
) -> Vec<String> {
    let mut lines = vec![format!("(deflayer {name}")];
    for row in &grid.rows {
        let cells: Vec<(&str, String)> = row
            .iter()
            .map(|k| {
                let action = actions.get(k).cloned().unwrap_or_else(|| fallback(k));
                (k.as_str(), action)
            })
            .collect();
        lines.push(render_row(cells.iter().map(|(k, a)| (*k, a.as_str())), widths));
    }
    lines.push(")".to_string());
    lines
}

fn render_row<'a>(
    cells: impl Iterator<Item = (&'a str, &'a str)>,
    widths: &BTreeMap<String, usize>,
) -> String {
    let mut line = String::from(INDENT);
    for (i, (key, text)) in cells.enumerate() {
        if i > 0 {
            line.push(' ');
        }
        let width = widths.get(key).copied().unwrap_or(0);
        line.push_str(&format!("{text:<width$}"));
    }
    line.trim_end().to_string()
}
