//! Hand-written sections carried verbatim from one generated config to the
//! next.

use serde::{Deserialize, Serialize};
use tracing::warn;

const BEGIN: &str = ";; === BEGIN PRESERVED: ";
const END: &str = ";; === END PRESERVED: ";
const CLOSE: &str = " ===";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreservedBlock {
    pub name: String,
    pub content: String,
}

impl PreservedBlock {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn render(&self) -> String {
        let body = self.content.trim_end_matches('\n');
        if body.is_empty() {
            format!("{BEGIN}{name}{CLOSE}\n{END}{name}{CLOSE}\n", name = self.name)
        } else {
            format!("{BEGIN}{name}{CLOSE}\n{body}\n{END}{name}{CLOSE}\n", name = self.name)
        }
    }
}

fn marker_name<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.trim()
        .strip_prefix(prefix)?
        .strip_suffix(CLOSE)
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// Every complete preserved section of `text`, in order. A section missing
/// its end marker, or closed under another name, is dropped with a warning.
pub fn extract_preserved_blocks(text: &str) -> Vec<PreservedBlock> {
    let mut blocks = Vec::new();
    let mut open: Option<(String, Vec<&str>, usize)> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if let Some((name, body, start)) = open.as_mut() {
            if let Some(end) = marker_name(line, END) {
                if end == name.as_str() {
                    blocks.push(PreservedBlock::new(name.clone(), body.join("\n")));
                } else {
                    warn!(block = %name, found = end, line = line_no, "preserved block closed under another name; dropped");
                }
                open = None;
            } else if let Some(nested) = marker_name(line, BEGIN) {
                warn!(block = %name, start = *start, "preserved block not closed; dropped");
                open = Some((nested.to_string(), Vec::new(), line_no));
            } else {
                body.push(line);
            }
            continue;
        }
        if let Some(name) = marker_name(line, BEGIN) {
            open = Some((name.to_string(), Vec::new(), line_no));
        }
    }
    if let Some((name, _, start)) = open {
        warn!(block = %name, start, "preserved block not closed; dropped");
    }
    blocks
}
