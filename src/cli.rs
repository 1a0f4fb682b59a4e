use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::asset_store::DirectoryAssetStore;
use crate::bundle::build_export_bundle;
use crate::job::{ExportJobSpec, ExportReport};
use crate::ribbon::GeometryMode;
use crate::session::{export_strokes, ExportOptions, ExportSession};
use crate::stroke::Stroke;
use crate::texture::{cancel_pair, HttpTextureFetcher};
use crate::world::{EntityCatalog, PolylineEntity};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export strokes to OBJ (and MTL + textures)
    Export {
        /// JSON job spec; flags below override its fields
        #[arg(long)]
        job: Option<PathBuf>,

        /// Input JSON file: stroke records or polyline entities
        #[arg(long)]
        strokes: Option<PathBuf>,

        /// Output directory for exported assets
        #[arg(long)]
        out: Option<PathBuf>,

        /// File name prefix, e.g. "wrap" gives wrap1.obj
        #[arg(long)]
        name: Option<String>,

        /// Number used in the exported file name
        #[arg(long)]
        number: Option<u32>,

        /// Skip the material library and texture upload
        #[arg(long)]
        no_textures: bool,

        /// Fail a stroke on any degenerate sample instead of skipping it
        #[arg(long)]
        strict: bool,

        /// Timeout for all texture uploads, in seconds
        #[arg(long)]
        timeout_secs: Option<f32>,
    },
    /// Build the mesh and print its statistics without writing anything
    Check {
        /// Input JSON file: stroke records or polyline entities
        #[arg(long)]
        strokes: PathBuf,

        #[arg(long)]
        strict: bool,
    },
}

/// Stroke input file: entities as reported by the host, or bare strokes.
#[derive(Deserialize)]
#[serde(untagged)]
enum StrokeInput {
    Entities(Vec<PolylineEntity>),
    Strokes(Vec<Stroke>),
}

impl StrokeInput {
    fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        serde_json::from_str(&content).with_context(|| {
            format!("{:?} is neither a list of strokes nor of polyline entities", path)
        })
    }

    fn into_strokes(self) -> Vec<Stroke> {
        match self {
            StrokeInput::Entities(entities) => entities.iter().map(|e| e.to_stroke()).collect(),
            StrokeInput::Strokes(strokes) => strokes,
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            job,
            strokes,
            out,
            name,
            number,
            no_textures,
            strict,
            timeout_secs,
        } => {
            let mut spec = match (job, strokes, out) {
                (Some(job), strokes, out) => {
                    let mut spec = ExportJobSpec::from_file(&job)
                        .with_context(|| format!("Failed to load job {:?}", job))?;
                    if let Some(strokes) = strokes {
                        spec.strokes_path = strokes;
                    }
                    if let Some(out) = out {
                        spec.output_dir = out;
                    }
                    spec
                }
                (None, Some(strokes), Some(out)) => ExportJobSpec::new(strokes, out),
                (None, _, _) => anyhow::bail!("Either --job or both --strokes and --out are required"),
            };
            if let Some(name) = name {
                spec.file_prefix = name;
            }
            if let Some(number) = number {
                spec.first_file_number = number;
            }
            if no_textures {
                spec.use_textures = false;
            }
            if strict {
                spec.geometry_mode = GeometryMode::Strict;
            }
            if let Some(secs) = timeout_secs {
                spec.upload_timeout_secs = secs;
            }
            spec.validate()?;

            let runtime = tokio::runtime::Runtime::new()?;
            let report = runtime.block_on(run_export(&spec))?;

            let report_path = spec.output_dir.join(format!("{}.json", report.name));
            report.save(&report_path)?;
            println!(
                "Exported {} strokes ({} vertices, {} faces) to {:?}",
                report.stroke_count, report.vertex_count, report.face_count, spec.output_dir
            );
            if !report.skipped_strokes.is_empty() {
                println!("Skipped degenerate strokes: {:?}", report.skipped_strokes);
            }
        }
        Commands::Check { strokes, strict } => {
            let mode = if strict {
                GeometryMode::Strict
            } else {
                GeometryMode::Lenient
            };
            let input = StrokeInput::load(&strokes)?.into_strokes();
            let bundle = build_export_bundle(&input, mode)?;
            println!(
                "{} of {} strokes usable: {} vertices, {} faces",
                bundle.groups.len(),
                input.len(),
                bundle.vertex_count(),
                bundle.face_count()
            );
            for skipped in &bundle.skipped {
                println!("  stroke {}: {}", skipped.stroke_index, skipped.reason);
            }
        }
    }
    Ok(())
}

async fn run_export(spec: &ExportJobSpec) -> Result<ExportReport> {
    let input = StrokeInput::load(&spec.strokes_path)?;
    let store = DirectoryAssetStore::new(&spec.output_dir);
    let fetcher = HttpTextureFetcher::new(spec.fetch_timeout())?;
    let options = ExportOptions {
        geometry_mode: spec.geometry_mode,
        use_textures: spec.use_textures,
        upload_timeout: spec.upload_timeout(),
    };

    let (cancel_handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling export");
            cancel_handle.cancel();
        }
    });

    let report = match input {
        StrokeInput::Entities(entities) => {
            let catalog = EntityCatalog::from_entities(entities);
            let mut session = ExportSession::new(spec.file_prefix.clone())
                .with_next_file_number(spec.first_file_number);
            for id in catalog.ids() {
                session.add(id.clone());
            }
            session
                .export(&catalog, &fetcher, &store, &options, cancel)
                .await?
        }
        StrokeInput::Strokes(strokes) => {
            let name = format!("{}{}", spec.file_prefix, spec.first_file_number);
            export_strokes(&strokes, &name, &fetcher, &store, &options, cancel).await?
        }
    };
    Ok(report)
}
