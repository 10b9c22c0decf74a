//! Whitespace tokenizer that keeps balanced parenthesized groups and quoted
//! strings together.

const COMMENT: &str = ";;";

/// Splits `line` on whitespace at paren depth 0. A parenthesized run is one
/// token including its parens; unbalanced trailing input is flushed as the
/// final token. A trailing `;;` comment is dropped.
pub fn tokenize(line: &str) -> Vec<String> {
    let content = strip_comment(line);
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for c in content.chars() {
        if in_string {
            current.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                current.push(c);
            }
            '(' => {
                if depth == 0 && !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                depth += 1;
                current.push(c);
            }
            ')' => {
                current.push(c);
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Drops a `;;` comment that is not inside a string literal.
pub fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in line.as_bytes().iter().enumerate() {
        match b {
            _ if escaped => escaped = false,
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b';' if !in_string && line[i..].starts_with(COMMENT) => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Strips comments from every line of a multi-line text.
pub fn strip_comments(text: &str) -> String {
    text.lines()
        .map(strip_comment)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tokens inside a parenthesized group, or `None` if `token` is not one.
pub fn split_group(token: &str) -> Option<Vec<String>> {
    let inner = group_inner(token)?;
    Some(tokenize(inner))
}

pub(crate) fn group_inner(token: &str) -> Option<&str> {
    let trimmed = token.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('(') && trimmed.ends_with(')') {
        Some(&trimmed[1..trimmed.len() - 1])
    } else {
        None
    }
}

/// Whether parens outside string literals balance.
pub fn parens_balanced(text: &str) -> bool {
    let mut depth: i64 = 0;
    for line in text.lines() {
        let mut in_string = false;
        let mut escaped = false;
        for c in strip_comment(line).chars() {
            match c {
                _ if escaped => escaped = false,
                '\\' if in_string => escaped = true,
                '"' => in_string = !in_string,
                '(' if !in_string => depth += 1,
                ')' if !in_string => {
                    depth -= 1;
                    if depth < 0 {
                        return false;
                    }
                }
                _ => {}
            }
        }
    }
    depth == 0
}
