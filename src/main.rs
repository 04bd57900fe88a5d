//! Binary entry point for scrub.
//!
//! Redacts files through a configured pipeline and manages the named
//! configuration store.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
// CLI output goes through println/eprintln by design
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Command functions take owned args from clap
#![allow(clippy::needless_pass_by_value)]

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use scrub::backends::HttpBackends;
use scrub::config::{ScrubConfig, tasks_from_store};
use scrub::store::ConfigStore;
use scrub::verify::TextEquivalence;
use scrub::{RedactionPipeline, SqliteConfigStore};
use std::path::PathBuf;
use std::sync::Arc;

/// Scrub - configurable redaction pipeline for sensitive spans in free text.
#[derive(Parser)]
#[command(name = "scrub")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration store database.
    #[arg(long, global = true, env = "SCRUB_STORE")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Redact one or more text files.
    Run {
        /// Input text files.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory for redacted output files.
        #[arg(short, long, default_value = "out")]
        output_dir: PathBuf,

        /// YAML pipeline configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Named tasks to activate from the store, in execution order.
        #[arg(short, long, value_delimiter = ',')]
        tasks: Vec<String>,

        /// Directory to write per-file audit trails to.
        #[arg(long)]
        audit_dir: Option<PathBuf>,
    },

    /// Manage named configurations in the store.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check that a redacted file is the original with only token substitutions.
    Verify {
        /// The original file.
        original: PathBuf,

        /// The redacted file.
        redacted: PathBuf,

        /// Replacement tokens used during redaction.
        #[arg(short, long, value_delimiter = ',')]
        tokens: Vec<String>,
    },
}

/// Config store actions.
#[derive(Subcommand)]
enum ConfigAction {
    /// Add a new configuration from a JSON or YAML file.
    Add {
        /// Name to store it under.
        name: String,
        /// The configuration file.
        file: PathBuf,
    },
    /// Update an existing configuration from a JSON or YAML file.
    Update {
        /// Name of the existing configuration.
        name: String,
        /// The configuration file.
        file: PathBuf,
    },
    /// Delete a configuration.
    Delete {
        /// Name of the configuration.
        name: String,
    },
    /// List stored configuration names.
    List,
    /// Print a stored configuration.
    Show {
        /// Name of the configuration.
        name: String,
    },
    /// Dump all stored configurations to a JSON file.
    Backup {
        /// Output file.
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    scrub::observability::init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            inputs,
            output_dir,
            config,
            tasks,
            audit_dir,
        } => run(cli.store, inputs, output_dir, config, tasks, audit_dir),
        Commands::Config { action } => config_command(cli.store, action),
        Commands::Verify {
            original,
            redacted,
            tokens,
        } => verify(original, redacted, tokens),
    }
}

fn open_store(path: Option<PathBuf>) -> anyhow::Result<SqliteConfigStore> {
    let path = path
        .or_else(SqliteConfigStore::default_user_path)
        .context("cannot determine a configuration store path")?;
    SqliteConfigStore::new(&path)
        .with_context(|| format!("opening configuration store at {}", path.display()))
}

fn run(
    store: Option<PathBuf>,
    inputs: Vec<PathBuf>,
    output_dir: PathBuf,
    config: Option<PathBuf>,
    task_names: Vec<String>,
    audit_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = match (config, task_names.is_empty()) {
        (Some(path), _) => ScrubConfig::from_file(&path)
            .with_context(|| format!("loading pipeline config {}", path.display()))?,
        (None, false) => {
            let store = open_store(store)?;
            ScrubConfig {
                tasks: tasks_from_store(&store, &task_names)?,
                ..ScrubConfig::default()
            }
        },
        (None, true) => bail!("either --config or --tasks is required"),
    };

    let backends = Arc::new(HttpBackends::new(config.backends.clone()));
    let mut pipeline =
        RedactionPipeline::new(config.tasks, backends).context("constructing pipeline")?;

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;
    if let Some(dir) = &audit_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating audit directory {}", dir.display()))?;
    }

    for input in inputs {
        let text = std::fs::read_to_string(&input)
            .with_context(|| format!("reading {}", input.display()))?;
        let redacted = pipeline
            .edit_text(&text)
            .with_context(|| format!("redacting {}", input.display()))?;

        let file_name = input
            .file_name()
            .with_context(|| format!("input {} has no file name", input.display()))?;
        let output_path = output_dir.join(file_name);
        std::fs::write(&output_path, redacted)
            .with_context(|| format!("writing {}", output_path.display()))?;
        println!("{} -> {}", input.display(), output_path.display());

        if let Some(dir) = &audit_dir {
            let mut audit_path = dir.join(file_name);
            audit_path.set_extension("audit.json");
            pipeline
                .flush_audit(&audit_path)
                .with_context(|| format!("writing audit trail {}", audit_path.display()))?;
        }
    }

    Ok(())
}

fn read_config_document(file: &PathBuf) -> anyhow::Result<serde_json::Value> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    // JSON is a YAML subset, so one parser covers both.
    serde_yaml_ng::from_str(&raw)
        .with_context(|| format!("parsing {}", file.display()))
}

fn config_command(store: Option<PathBuf>, action: ConfigAction) -> anyhow::Result<()> {
    let store = open_store(store)?;

    match action {
        ConfigAction::Add { name, file } => {
            store.add(&read_config_document(&file)?, &name)?;
            println!("added '{}'", name.to_lowercase());
        },
        ConfigAction::Update { name, file } => {
            store.update(&read_config_document(&file)?, &name)?;
            println!("updated '{}'", name.to_lowercase());
        },
        ConfigAction::Delete { name } => {
            store.delete(&name)?;
            println!("deleted '{}'", name.to_lowercase());
        },
        ConfigAction::List => {
            for name in store.list_names()? {
                println!("{name}");
            }
        },
        ConfigAction::Show { name } => {
            let value = store.get(&name)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        },
        ConfigAction::Backup { file } => {
            store.backup(&file)?;
            println!("backed up to {}", file.display());
        },
    }
    Ok(())
}

fn verify(original: PathBuf, redacted: PathBuf, tokens: Vec<String>) -> anyhow::Result<()> {
    let original_text = std::fs::read_to_string(&original)
        .with_context(|| format!("reading {}", original.display()))?;
    let redacted_text = std::fs::read_to_string(&redacted)
        .with_context(|| format!("reading {}", redacted.display()))?;

    let (equivalent, _) = TextEquivalence::new(original_text, tokens).check(&redacted_text);
    if equivalent {
        println!("ok: {} is a pure redaction of {}", redacted.display(), original.display());
        Ok(())
    } else {
        bail!(
            "{} differs from {} beyond token substitution",
            redacted.display(),
            original.display()
        )
    }
}
