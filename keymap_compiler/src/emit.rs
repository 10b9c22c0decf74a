//! Final text assembly.

use std::collections::BTreeMap;

use keymap_schema::{Layer, DEFAULT_HOLD_TIMEOUT_MS, DEFAULT_TAP_TIMEOUT_MS};
use tracing::warn;

use crate::blocks::{BuildOutput, LayerEntry};
use crate::layout::{column_widths, render_defsrc, render_layer, KeyGrid};
use crate::render::{HOLD_TIMEOUT_VAR, TAP_TIMEOUT_VAR, TRANSPARENT};
use crate::CompileOptions;

const HEADER: &str = ";; Generated by keymapc. Edits outside preserved sections are overwritten.";

/// Key used when nothing is mapped, so the config still has a key grid.
const EMPTY_LAYOUT_KEY: &str = "esc";

/// Renders the complete configuration from deduplicated build output.
pub fn render_config(out: &BuildOutput, options: &CompileOptions) -> String {
    let mut lines: Vec<String> = vec![HEADER.to_string(), String::new()];

    lines.push("(defcfg".to_string());
    let unmapped = if options.process_unmapped_keys { "yes" } else { "no" };
    lines.push(format!("  process-unmapped-keys {unmapped}"));
    if !out.chords.is_empty() {
        lines.push("  concurrent-tap-hold yes".to_string());
    }
    if let Some(timeout) = out.sequence_timeout_ms {
        lines.push(format!("  sequence-timeout {timeout}"));
    }
    lines.push(")".to_string());
    lines.push(String::new());

    lines.push(format!(
        "(defvar {TAP_TIMEOUT_VAR} {DEFAULT_TAP_TIMEOUT_MS} {HOLD_TIMEOUT_VAR} {DEFAULT_HOLD_TIMEOUT_MS})"
    ));
    lines.push(String::new());

    if !out.aliases.is_empty() {
        lines.push("(defalias".to_string());
        let mut origin: Option<&str> = None;
        for alias in &out.aliases {
            if origin != Some(alias.origin.as_str()) {
                lines.push(format!("  ;; {}", alias.origin));
                origin = Some(alias.origin.as_str());
            }
            lines.push(format!("  {} {}", alias.alias_name, alias.definition_text));
        }
        lines.push(")".to_string());
        lines.push(String::new());
    }

    if !out.fake_keys.is_empty() {
        lines.push("(deffakekeys".to_string());
        for fake in &out.fake_keys {
            lines.push(format!("  {} {}", fake.name, fake.action));
        }
        lines.push(")".to_string());
        lines.push(String::new());
    }

    for group in &out.chord_groups {
        lines.push(format!("(defchords {} {}", group.name, group.timeout_ms));
        for key in &group.participants {
            lines.push(format!("  ({key}) {key}"));
        }
        for (keys, output) in &group.chords {
            if keys.iter().all(|k| group.participants.contains(k)) {
                lines.push(format!("  ({}) {output}", keys.join(" ")));
            } else {
                warn!(group = %group.name, keys = ?keys, "chord uses keys outside its group; skipped");
            }
        }
        lines.push(")".to_string());
        lines.push(String::new());
    }

    if !out.chords.is_empty() {
        lines.push("(defchordsv2".to_string());
        for chord in &out.chords {
            // chords of a non-base layer are disabled everywhere else
            let disabled: Vec<&str> = if chord.layer.is_base() {
                Vec::new()
            } else {
                out.layers
                    .iter()
                    .filter(|l| **l != chord.layer)
                    .map(|l| l.kanata_name())
                    .collect()
            };
            lines.push(format!(
                "  ({}) {} {} all-released ({})",
                chord.keys.join(" "),
                chord.action,
                chord.timeout_ms,
                disabled.join(" ")
            ));
        }
        lines.push(")".to_string());
        lines.push(String::new());
    }

    if !out.sequences.is_empty() {
        lines.push("(defseq".to_string());
        for seq in &out.sequences {
            lines.push(format!("  {} ({})", seq.virtual_key, seq.keys.join(" ")));
        }
        lines.push(")".to_string());
        lines.push(String::new());
    }

    for block in &options.preserved_blocks {
        lines.push(block.render().trim_end().to_string());
        lines.push(String::new());
    }

    lines.push(";; Collections".to_string());
    for block in &out.blocks {
        for (i, meta) in block.metadata.iter().enumerate() {
            let indent = if i == 0 { "  " } else { "    " };
            lines.push(format!(";;{indent}{meta}"));
        }
    }
    lines.push(String::new());

    let entries: Vec<&LayerEntry> = out.blocks.iter().flat_map(|b| b.entries.iter()).collect();
    let mut grid = KeyGrid::arrange(entries.iter().map(|e| e.source_key.as_str()), &options.physical_layout);
    if grid.is_empty() {
        warn!("no keys mapped; emitting a passthrough layout");
        grid = KeyGrid::arrange([EMPTY_LAYOUT_KEY], &options.physical_layout);
    }

    let tables: Vec<(&Layer, BTreeMap<String, String>)> = out
        .layers
        .iter()
        .map(|layer| {
            let actions = entries
                .iter()
                .filter_map(|e| {
                    let action = if layer.is_base() {
                        e.base_output.clone()
                    } else {
                        e.layer_outputs.get(layer).cloned()
                    };
                    action.map(|a| (e.source_key.clone(), a))
                })
                .collect();
            (layer, actions)
        })
        .collect();

    let widths = column_widths(&grid, tables.iter().map(|(_, t)| t));
    lines.extend(render_defsrc(&grid, &widths));
    for (layer, actions) in &tables {
        lines.push(String::new());
        let base = layer.is_base();
        lines.extend(render_layer(
            layer.kanata_name(),
            &grid,
            actions,
            |key| if base { key.to_string() } else { TRANSPARENT.to_string() },
            &widths,
        ));
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
