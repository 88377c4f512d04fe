//! # Bindery CLI
//!
//! Command-line access to the binding engine, mostly for inspecting
//! templates and debugging snapshots outside the editor.
//!
//! ## Usage
//!
//! ```bash
//! # List the fields a template binds
//! bindery fields template.json
//!
//! # Render record 3 of a dataset, with overrides
//! bindery render template.json --data rows.json --record 3 --overrides overrides.json
//!
//! # Capture the snapshot of a rendered record
//! bindery snapshot template.json --data rows.json --record 3 > snap.json
//!
//! # Restore a snapshot and print the markup plus reconciled overrides
//! bindery replay template.json snap.json --data rows.json --record 3
//! ```
//!
//! Set `RUST_LOG=bindery=debug` to see per-field decisions.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use bindery::{
    BinderyError, Dataset, EngineConfig, OverrideMap, RecordId, Snapshot, Template,
    TemplateSource,
    binding::{FieldIndex, read_field},
    dom::Document,
    merge::apply_record,
    snapshot::{BackgroundState, SnapshotMeta, capture, reconcile_overrides, restore},
};

/// Bindery - template data-binding engine
#[derive(Parser, Debug)]
#[command(name = "bindery")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// Dataset file (JSON array of row objects)
    #[arg(long, value_name = "FILE")]
    data: Option<PathBuf>,

    /// Record to render (0 is the bare template; defaults to the first row)
    #[arg(long)]
    record: Option<u32>,

    /// Override map file (JSON object keyed by record id)
    #[arg(long, value_name = "FILE")]
    overrides: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the fields a template binds, with their baked-in values
    Fields {
        /// Template source file (JSON)
        template: PathBuf,
    },

    /// Render one record and print the resulting markup
    Render {
        template: PathBuf,

        #[command(flatten)]
        record: RecordArgs,

        /// Write the markup to a file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Render one record and print its snapshot
    Snapshot {
        template: PathBuf,

        #[command(flatten)]
        record: RecordArgs,
    },

    /// Restore a snapshot onto a rendered record and reconcile overrides
    Replay {
        template: PathBuf,

        /// Snapshot file (JSON)
        snapshot: PathBuf,

        #[command(flatten)]
        record: RecordArgs,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), BinderyError> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Fields { template } => {
            let template = load_template(&template)?;
            let doc = template.instantiate();
            let index = FieldIndex::build(&doc);
            for field in template.fields() {
                let key = field.key.as_str();
                let kind = match index.kind(&doc, key) {
                    Some(kind) => format!("{:?}", kind),
                    None => "unbound".to_string(),
                };
                let value = read_field(&doc, &index, key).unwrap_or_default();
                println!("{:<24} {:<16} {}", key, kind, value);
            }
        }
        Commands::Render {
            template,
            record,
            out,
        } => {
            let template = load_template(&template)?;
            let rendered = Rendered::new(&template, &record, &config)?;
            let html = rendered.doc.inner_html(rendered.doc.root());
            match out {
                Some(path) => {
                    std::fs::write(&path, html)?;
                    println!("Saved to {}", path.display());
                }
                None => println!("{}", html),
            }
        }
        Commands::Snapshot { template, record } => {
            let template = load_template(&template)?;
            let rendered = Rendered::new(&template, &record, &config)?;
            let snapshot = capture(
                &rendered.doc,
                &rendered.index,
                &SnapshotMeta::default(),
                &BackgroundState::default(),
            );
            println!("{}", snapshot.to_json()?);
        }
        Commands::Replay {
            template,
            snapshot,
            record,
        } => {
            let template = load_template(&template)?;
            let snapshot = Snapshot::from_json_str(&std::fs::read_to_string(&snapshot)?)?;
            let mut rendered = Rendered::new(&template, &record, &config)?;

            let report = restore(&mut rendered.doc, &rendered.index, &snapshot);
            if !report.skipped.is_empty() {
                tracing::warn!(skipped = ?report.skipped, "snapshot fields missing from template");
            }
            let data_record = rendered
                .dataset
                .get(rendered.id)
                .ok_or(BinderyError::UnknownRecord(rendered.id))?;
            reconcile_overrides(
                &rendered.doc,
                &rendered.index,
                &snapshot,
                data_record,
                &template,
                rendered.id,
                &mut rendered.overrides,
            );

            let output = serde_json::json!({
                "html": rendered.doc.inner_html(rendered.doc.root()),
                "overrides": rendered.overrides,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn load_template(path: &Path) -> Result<Template, BinderyError> {
    Template::new(TemplateSource::from_file(path)?)
}

/// One record merged into a fresh template instance.
struct Rendered {
    dataset: Dataset,
    overrides: OverrideMap,
    id: RecordId,
    doc: Document,
    index: FieldIndex,
}

impl Rendered {
    fn new(template: &Template, args: &RecordArgs, config: &EngineConfig) -> Result<Self, BinderyError> {
        let dataset = match &args.data {
            Some(path) => Dataset::from_json_str(&std::fs::read_to_string(path)?)?,
            None => Dataset::default(),
        };
        let overrides: OverrideMap = match &args.overrides {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => OverrideMap::new(),
        };
        let id = match args.record {
            Some(n) => RecordId(n),
            None if dataset.is_empty() => RecordId::BARE,
            None => RecordId(1),
        };
        let record = dataset.get(id).ok_or(BinderyError::UnknownRecord(id))?;

        let mut doc = template.instantiate();
        let mut index = FieldIndex::build(&doc);
        let report = apply_record(&mut doc, &mut index, record, id, &overrides, config);
        tracing::info!(record = %id, written = report.written.len(), skipped = report.skipped.len(), "record rendered");

        Ok(Self {
            dataset,
            overrides,
            id,
            doc,
            index,
        })
    }
}
