//! facetag CLI - tag STEP faces from the terminal
//!
//! Every command runs against the documents directory and fingerprint
//! database named in the configuration. Results are printed as JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use facetag::{
    AttributeKind, FaceUpdate, FacetagConfig, PurgeScope, ThreadSpec, ToleranceSpec, Workspace,
};
use facetag_step::annotate;
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "facetag")]
#[command(about = "Attach color, thread and tolerance data to STEP faces", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, default_value = "facetag.toml")]
    config: PathBuf,

    /// Override the documents directory
    #[arg(long, global = true)]
    documents_dir: Option<PathBuf>,

    /// Override the fingerprint database path
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a STEP file into the documents directory and list its faces
    Import {
        /// Input STEP file (.step or .stp)
        input: PathBuf,
    },
    /// List the faces of a document with their metadata
    Info {
        /// Document identifier
        document: String,
    },
    /// Group cylindrical faces of a document by diameter
    Holes {
        /// Document identifier
        document: String,
    },
    /// Set or clear a face color
    SetColor {
        #[command(flatten)]
        target: FaceTarget,
        /// Color as #RRGGBB; omit to clear
        color: Option<String>,
    },
    /// Set or clear a thread callout
    SetThread {
        #[command(flatten)]
        target: FaceTarget,
        #[command(flatten)]
        thread: ThreadArgs,
        /// Remove the thread instead of setting it
        #[arg(long, conflicts_with = "size")]
        clear: bool,
    },
    /// Set or clear a tolerance callout
    SetTolerance {
        #[command(flatten)]
        target: FaceTarget,
        #[command(flatten)]
        tolerance: ToleranceArgs,
        /// Remove the tolerance instead of setting it
        #[arg(long, conflicts_with = "value")]
        clear: bool,
    },
    /// Remove one attribute from a face
    Unset {
        #[command(flatten)]
        target: FaceTarget,
        /// color, thread, tolerance (sub-fields such as thread.size name their kind)
        #[arg(short, long)]
        attribute: AttributeKind,
    },
    /// Show the fingerprint and stored record of a face
    Inspect {
        /// Document identifier
        document: String,
        /// Face index
        #[arg(short, long)]
        face: usize,
    },
    /// Embed the document's metadata into its file
    Export {
        /// Document identifier
        document: String,
        /// Also write the annotated file here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Erase metadata from the database, the document file, or both
    Purge {
        /// Document identifier
        document: String,
        /// db, file or all
        #[arg(short, long, default_value = "all")]
        scope: PurgeScope,
    },
    /// Show fingerprint database counts
    Stats,
    /// Show the metadata embedded in any STEP file
    Extract {
        /// STEP file to inspect
        file: PathBuf,
    },
    /// Remove embedded metadata from any STEP file
    Strip {
        /// STEP file to clean
        file: PathBuf,
        /// Write the result here instead of in place
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
struct FaceTarget {
    /// Document identifier
    document: String,
    /// Face index
    #[arg(short, long)]
    face: usize,
    /// Write the document file after the edit
    #[arg(long)]
    export: bool,
}

#[derive(Args)]
struct ThreadArgs {
    /// Thread standard, e.g. "M (ISO Metric)"
    #[arg(long, default_value = "")]
    kind: String,
    /// Nominal size, e.g. M6
    #[arg(long, required_unless_present = "clear")]
    size: Option<String>,
    /// Pitch
    #[arg(long, default_value = "")]
    pitch: String,
    /// Tolerance class, e.g. 6H
    #[arg(long, default_value = "")]
    class: String,
}

#[derive(Args)]
struct ToleranceArgs {
    /// Tolerance type, e.g. Flatness
    #[arg(long, default_value = "")]
    kind: String,
    /// Value, e.g. "+/- 0.01"
    #[arg(long, required_unless_present = "clear")]
    value: Option<String>,
    /// Datum reference
    #[arg(long, default_value = "")]
    datum: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config.log_filter);
    debug!(?config, "effective configuration");

    match cli.command {
        Commands::Import { input } => {
            let mut ws = Workspace::open(config)?;
            print_json(&ws.import(&input)?)?;
        }
        Commands::Info { document } => {
            let mut ws = Workspace::open(config)?;
            print_json(&ws.open_document(&document)?)?;
        }
        Commands::Holes { document } => {
            let mut ws = Workspace::open(config)?;
            ws.open_document(&document)?;
            print_json(&ws.holes()?)?;
        }
        Commands::SetColor { target, color } => {
            let update = match color {
                Some(color) => FaceUpdate::set(target.face, color),
                None => FaceUpdate::clear(target.face),
            };
            edit(config, &target, |ws| Ok(ws.set_color(&[update])?))?;
        }
        Commands::SetThread {
            target,
            thread,
            clear,
        } => {
            let update = match thread.size {
                Some(size) if !clear => FaceUpdate::set(
                    target.face,
                    ThreadSpec {
                        kind: thread.kind,
                        size,
                        pitch: thread.pitch,
                        class: thread.class,
                    },
                ),
                _ => FaceUpdate::clear(target.face),
            };
            edit(config, &target, |ws| Ok(ws.set_thread(&[update])?))?;
        }
        Commands::SetTolerance {
            target,
            tolerance,
            clear,
        } => {
            let update = match tolerance.value {
                Some(value) if !clear => FaceUpdate::set(
                    target.face,
                    ToleranceSpec {
                        kind: tolerance.kind,
                        value,
                        datum: tolerance.datum,
                    },
                ),
                _ => FaceUpdate::clear(target.face),
            };
            edit(config, &target, |ws| Ok(ws.set_tolerance(&[update])?))?;
        }
        Commands::Unset { target, attribute } => {
            let update = FaceUpdate::clear(target.face);
            edit(config, &target, |ws| {
                Ok(ws.set_attributes(attribute, vec![update])?)
            })?;
        }
        Commands::Inspect { document, face } => {
            let mut ws = Workspace::open(config)?;
            let loaded = ws.open_document(&document)?;
            let summary = loaded
                .faces
                .get(face)
                .with_context(|| format!("face {face} out of range"))?;
            print_json(&json!({
                "face": summary,
                "stored": ws.face_entry(face)?,
            }))?;
        }
        Commands::Export { document, output } => {
            let mut ws = Workspace::open(config)?;
            ws.open_document(&document)?;
            let exported = ws.export()?;
            if let Some(output) = &output {
                std::fs::write(output, &exported.bytes)
                    .with_context(|| format!("writing {}", output.display()))?;
            }
            print_json(&json!({
                "file_name": exported.file_name,
                "path": exported.path,
                "bytes": exported.bytes.len(),
                "copied_to": output,
            }))?;
        }
        Commands::Purge { document, scope } => {
            let mut ws = Workspace::open(config)?;
            print_json(&ws.purge(&document, scope)?)?;
        }
        Commands::Stats => {
            let ws = Workspace::open(config)?;
            print_json(&ws.stats()?)?;
        }
        Commands::Extract { file } => extract_file(&file)?,
        Commands::Strip { file, output } => strip_file(&file, output.as_deref())?,
        Commands::Config => print!("{}", config.to_toml_string()?),
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<FacetagConfig> {
    let mut config = FacetagConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?
        .with_env_overrides();
    if let Some(dir) = &cli.documents_dir {
        config.documents_dir = dir.clone();
    }
    if let Some(db) = &cli.database {
        config.database_path = db.clone();
    }
    config.validate()?;
    Ok(config)
}

/// `RUST_LOG` wins over the configured filter. Logs go to stderr so stdout
/// stays valid JSON.
fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn edit<R, F>(config: FacetagConfig, target: &FaceTarget, apply: F) -> Result<()>
where
    R: Serialize,
    F: FnOnce(&mut Workspace) -> Result<R>,
{
    let mut ws = Workspace::open(config)?;
    ws.open_document(&target.document)?;
    let report = apply(&mut ws)?;
    let exported = if target.export {
        Some(ws.export()?.path)
    } else {
        None
    };
    print_json(&json!({ "report": report, "exported": exported }))
}

fn extract_file(file: &Path) -> Result<()> {
    let text = read_step(file)?;
    let extraction = annotate::extract_detailed(&text)?;
    let found: Vec<&str> = extraction.found().into_iter().map(|s| s.as_str()).collect();
    let corrupt: Vec<&str> = extraction.corrupt.iter().map(|s| s.as_str()).collect();
    print_json(&json!({
        "found": found,
        "corrupt": corrupt,
        "metadata": extraction.merged(),
    }))
}

fn strip_file(file: &Path, output: Option<&Path>) -> Result<()> {
    let text = read_step(file)?;
    let stripped = annotate::strip(&text)?;
    let target = output.unwrap_or(file);
    std::fs::write(target, stripped.text.as_bytes())
        .with_context(|| format!("writing {}", target.display()))?;
    let report = stripped.report;
    print_json(&json!({
        "path": target,
        "entity_fields": report.entity_fields,
        "description_tags": report.description_tags,
        "comment_blocks": report.comment_blocks,
        "bytes_removed": report.bytes_removed,
    }))
}

fn read_step(file: &Path) -> Result<String> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
