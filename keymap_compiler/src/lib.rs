pub mod behavior_parser;
pub mod blocks;
pub mod dedupe;
pub mod emit;
mod error;
pub mod generators;
pub mod keys;
pub mod layout;
pub mod planner;
pub mod preserved;
pub mod render;
pub mod text_keys;
pub mod tokenizer;
pub mod validate;

use keymap_schema::{Layer, LeaderKeyPreference, Milliseconds, PhysicalLayout, RuleCollection};
use thiserror::Error;
use tracing::{debug, warn};

pub use behavior_parser::{parse as parse_behavior, parse_config_aliases};
pub use blocks::{AliasDefinition, ChordMapping, CollectionBlock, LayerEntry};
pub use dedupe::Conflict;
pub use error::{CompileError, CompileErrorKind, CompileErrors};
pub use preserved::{extract_preserved_blocks, PreservedBlock};
pub use render::ActivationContext;

pub const DEFAULT_ONE_SHOT_TIMEOUT_MS: Milliseconds = 2000;

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub leader_key: Option<LeaderKeyPreference>,
    /// Grid used for key ordering and for blocking unmapped keys.
    pub physical_layout: PhysicalLayout,
    /// Compile despite conflicts; they are logged and reported on the result.
    pub allow_conflicts: bool,
    pub one_shot_timeout_ms: Milliseconds,
    pub process_unmapped_keys: bool,
    pub preserved_blocks: Vec<PreservedBlock>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            leader_key: None,
            physical_layout: PhysicalLayout::default(),
            allow_conflicts: false,
            one_shot_timeout_ms: DEFAULT_ONE_SHOT_TIMEOUT_MS,
            process_unmapped_keys: true,
            preserved_blocks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledConfig {
    pub text: String,
    pub layers: Vec<Layer>,
    pub aliases: Vec<AliasDefinition>,
    /// Conflicts accepted through `allow_conflicts`.
    pub conflicts: Vec<Conflict>,
}

/// Conflicts among enabled collections, before any deduplication.
pub fn detect_conflicts(collections: &[RuleCollection], options: &CompileOptions) -> Vec<Conflict> {
    dedupe::detect_conflicts(collections, options.leader_key.as_ref())
}

pub fn compile(collections: &[RuleCollection]) -> Result<CompiledConfig, CompileErrors> {
    compile_with_options(collections, &CompileOptions::default())
}

/// Runs the full pipeline: conflicts, build, dedupe, emit, structural checks.
pub fn compile_with_options(
    collections: &[RuleCollection],
    options: &CompileOptions,
) -> Result<CompiledConfig, CompileErrors> {
    let conflicts = detect_conflicts(collections, options);
    if !conflicts.is_empty() {
        if !options.allow_conflicts {
            return Err(CompileErrors::new(conflicts.iter().map(Conflict::to_error).collect()));
        }
        for c in &conflicts {
            warn!(key = %c.key, layer = %c.layer, collections = ?c.collections, "conflict accepted");
        }
    }

    let mut built = blocks::build(collections, options);
    built.blocks = dedupe::dedupe(std::mem::take(&mut built.blocks));
    let text = emit::render_config(&built, options);
    validate::check_structure(&text)?;

    debug!(
        collections = collections.len(),
        layers = built.layers.len(),
        aliases = built.aliases.len(),
        bytes = text.len(),
        "configuration compiled"
    );
    Ok(CompiledConfig {
        text,
        layers: built.layers,
        aliases: built.aliases,
        conflicts,
    })
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    /// The engine ran and rejected the text; carries its diagnostic verbatim.
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Unavailable(String),
}

/// External check of generated text, typically the engine in check mode.
pub trait EngineValidator {
    fn check(&self, config_text: &str) -> Result<(), ValidationFailure>;
}

/// Compiles, then hands the text to `validator` only if the structural
/// checks passed.
pub fn compile_and_validate(
    collections: &[RuleCollection],
    options: &CompileOptions,
    validator: &dyn EngineValidator,
) -> Result<CompiledConfig, CompileErrors> {
    let compiled = compile_with_options(collections, options)?;
    validator.check(&compiled.text).map_err(|failure| {
        let error = match failure {
            ValidationFailure::Rejected(diagnostic) => {
                CompileError::new("E4001", format!("engine rejected the configuration:\n{diagnostic}"))
            }
            ValidationFailure::Unavailable(reason) => {
                CompileError::new("E4002", format!("engine could not be run: {reason}"))
            }
        };
        CompileErrors::from(error)
    })?;
    Ok(compiled)
}
