mod engine;

use std::{fs, path::PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use keymap_compiler::{compile_and_validate, compile_with_options, EngineValidator};
use keymap_loader::{
    load_collections_from_path, load_preferences_from_path, save_config, Preferences,
};
use tracing_subscriber::EnvFilter;

use crate::engine::ProcessValidator;

#[derive(Debug, Parser)]
#[command(name = "keymapc")]
#[command(about = "Keymap configuration compiler CLI", long_about = None)]
struct Cli {
    /// Log every pipeline stage to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile rule collections into an engine config.
    Compile {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        prefs: Option<PathBuf>,
        /// Engine binary used to check the generated config.
        #[arg(long)]
        engine: Option<PathBuf>,
        #[arg(long)]
        allow_conflicts: bool,
    },
    /// List keys claimed by more than one collection.
    Conflicts {
        input: PathBuf,
        #[arg(long)]
        prefs: Option<PathBuf>,
    },
    /// Parse one action and print the behavior as JSON (`null` if plain).
    ParseAction { text: String },
    /// Print the behaviors of a generated config's aliases as JSON.
    Aliases { config: PathBuf },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_prefs(path: Option<&PathBuf>) -> anyhow::Result<Preferences> {
    match path {
        Some(p) => load_preferences_from_path(p),
        None => Ok(Preferences::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Compile {
            input,
            output,
            prefs,
            engine,
            allow_conflicts,
        } => {
            let collections = load_collections_from_path(&input)?;
            let mut prefs = load_prefs(prefs.as_ref())?;
            prefs.allow_conflicts |= allow_conflicts;
            let validator = engine.or_else(|| prefs.engine_binary.clone()).map(ProcessValidator::new);
            let validator = validator.as_ref().map(|v| v as &dyn EngineValidator);

            match output {
                Some(out_path) => {
                    save_config(&collections, &prefs, &out_path, validator)
                        .with_context(|| format!("compile failed: {}", input.display()))?;
                }
                None => {
                    let options = prefs.compile_options(Vec::new());
                    let compiled = match validator {
                        Some(v) => compile_and_validate(&collections, &options, v),
                        None => compile_with_options(&collections, &options),
                    }
                    .map_err(|e| anyhow::anyhow!(e.to_string()))
                    .with_context(|| format!("compile failed: {}", input.display()))?;
                    print!("{}", compiled.text);
                }
            }
        }
        Command::Conflicts { input, prefs } => {
            let collections = load_collections_from_path(&input)?;
            let options = load_prefs(prefs.as_ref())?.compile_options(Vec::new());
            let conflicts = keymap_compiler::detect_conflicts(&collections, &options);
            if conflicts.is_empty() {
                println!("no conflicts");
            } else {
                for c in &conflicts {
                    println!("{}", c.to_error());
                }
                anyhow::bail!("{} conflict(s) found in {}", conflicts.len(), input.display());
            }
        }
        Command::ParseAction { text } => {
            let behavior = keymap_compiler::parse_behavior(&text);
            let json = serde_json::to_string_pretty(&behavior).context("failed to serialize behavior")?;
            println!("{json}");
        }
        Command::Aliases { config } => {
            let text = fs::read_to_string(&config)
                .with_context(|| format!("failed to read: {}", config.display()))?;
            let aliases = keymap_compiler::parse_config_aliases(&text);
            let json = serde_json::to_string_pretty(&aliases).context("failed to serialize aliases")?;
            println!("{json}");
        }
    }

    Ok(())
}
