use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    Conflict,
    Structure,
    IO,
    Validation,
}

impl CompileErrorKind {
    pub(crate) fn from_code(code: &'static str) -> Self {
        match code {
            "E1001" => Self::Conflict,

            "E2001" | "E2002" | "E2003" | "E2004" => Self::Structure,

            "E3001" | "E3002" => Self::IO,

            "E4001" | "E4002" => Self::Validation,

            _ => Self::Structure,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{code}: {message}")]
pub struct CompileError {
    pub code: &'static str,
    pub kind: CompileErrorKind,
    pub message: String,

    // Structured fields; `message` stays the source of truth for display.
    pub key: Option<String>,
    pub layer: Option<String>,
    pub collections: Vec<String>,
    pub line: Option<usize>,
    pub context: Option<String>,
}

impl CompileError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            kind: CompileErrorKind::from_code(code),
            message: message.into(),

            key: None,
            layer: None,
            collections: Vec::new(),
            line: None,
            context: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub fn with_collections(mut self, collections: Vec<String>) -> Self {
        self.collections = collections;
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Every problem found by a failed compile. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileErrors {
    pub errors: Vec<CompileError>,
}

impl CompileErrors {
    pub fn new(errors: Vec<CompileError>) -> Self {
        debug_assert!(!errors.is_empty());
        Self { errors }
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn has_kind(&self, kind: CompileErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }
}

impl From<CompileError> for CompileErrors {
    fn from(error: CompileError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl std::error::Error for CompileErrors {}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.errors.len();
        write!(f, "{count} error{}", if count == 1 { "" } else { "s" })?;
        for error in &self.errors {
            write!(f, "\n  {error}")?;
        }
        Ok(())
    }
}
