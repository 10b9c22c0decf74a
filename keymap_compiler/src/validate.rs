//! Structural checks on generated text, run before any external validation.

use crate::error::{CompileError, CompileErrors};
use crate::tokenizer::{parens_balanced, split_group, strip_comments, tokenize};

/// Checks the invariants the compiler itself guarantees: non-empty output,
/// balanced parens, a `defsrc` and a base `deflayer`, and equal key counts
/// in `defsrc` and every `deflayer`.
pub fn check_structure(text: &str) -> Result<(), CompileErrors> {
    let code = strip_comments(text);
    if code.trim().is_empty() {
        return Err(CompileError::new("E2001", "generated configuration is empty").into());
    }
    if !parens_balanced(text) {
        return Err(CompileError::new("E2003", "unbalanced parentheses in generated configuration").into());
    }

    let mut errors = Vec::new();
    let mut defsrc: Option<usize> = None;
    let mut layers: Vec<(String, usize)> = Vec::new();

    for form in tokenize(&code) {
        let Some(items) = split_group(&form) else {
            continue;
        };
        match items.first().map(String::as_str) {
            Some("defsrc") => {
                if defsrc.is_some() {
                    errors.push(CompileError::new("E2004", "more than one defsrc block"));
                }
                defsrc = Some(items.len() - 1);
            }
            Some("deflayer") if items.len() >= 2 => {
                layers.push((items[1].clone(), items.len() - 2));
            }
            _ => {}
        }
    }

    match defsrc {
        None => errors.push(CompileError::new("E2004", "missing defsrc block")),
        Some(expected) => {
            for (name, count) in &layers {
                if *count != expected {
                    errors.push(
                        CompileError::new(
                            "E2002",
                            format!("layer '{name}' has {count} keys but defsrc has {expected}"),
                        )
                        .with_layer(name.clone()),
                    );
                }
            }
        }
    }
    if !layers.iter().any(|(name, _)| name == "base") {
        errors.push(CompileError::new("E2004", "missing base deflayer"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(CompileErrors::new(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileErrorKind;

    fn codes(result: Result<(), CompileErrors>) -> Vec<&'static str> {
        result.unwrap_err().errors.iter().map(|e| e.code).collect()
    }

    #[test]
    fn accepts_matching_layers() {
        let text = "(defsrc a b)\n;; comment (\n(deflayer base a @x)\n(deflayer nav _ XX)\n";
        assert!(check_structure(text).is_ok());
    }

    #[test]
    fn empty_and_comment_only_output_is_rejected() {
        assert_eq!(codes(check_structure("")), vec!["E2001"]);
        assert_eq!(codes(check_structure(";; nothing here\n")), vec!["E2001"]);
    }

    #[test]
    fn unbalanced_parens_are_rejected() {
        assert_eq!(codes(check_structure("(defsrc a\n(deflayer base a)")), vec!["E2003"]);
    }

    #[test]
    fn key_count_mismatch_names_the_layer() {
        let err = check_structure("(defsrc a b)\n(deflayer base a b)\n(deflayer nav _)\n").unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].code, "E2002");
        assert_eq!(err.errors[0].layer.as_deref(), Some("nav"));
        assert!(err.has_kind(CompileErrorKind::Structure));
    }

    #[test]
    fn missing_blocks_are_reported() {
        assert_eq!(codes(check_structure("(deflayer base a)")), vec!["E2004"]);
        assert_eq!(codes(check_structure("(defsrc a)\n(deflayer nav a)")), vec!["E2004"]);
    }
}
