//! odx-ingest - plate and experiment ETL
//!
//! Loads absorbance plate exports and experiment dosing sheets into the odx
//! database, reconstructs feature matrices from them and recovers generated
//! protocol tables.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use odx_common::config::{self, TomlConfig};
use odx_ingest::db::{self, reagents::SqliteReagentCatalog};
use odx_ingest::services::experiment_ingest::{self, DEFAULT_EXPERIMENT_PATTERN};
use odx_ingest::services::feature_builder;
use odx_ingest::services::growth_summary;
use odx_ingest::services::plate_ingest::{self, DEFAULT_PLATE_PATTERN};
use odx_ingest::services::{protocol_recovery, reagent_seed, BatchReport, NamePattern};
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for odx-ingest
#[derive(Parser, Debug)]
#[command(name = "odx-ingest")]
#[command(about = "Plate and experiment ETL for odx")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// Database file (defaults to <root>/odx.db)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a plate CSV, or every matching plate CSV in a directory
    IngestPlates {
        path: PathBuf,
        /// Plate id to use instead of the one in the file name
        #[arg(long)]
        plate_id: Option<i64>,
        #[arg(long, default_value = DEFAULT_PLATE_PATTERN)]
        pattern: String,
    },

    /// Ingest an experiment dosing sheet, or every matching sheet in a directory
    IngestExperiments {
        path: PathBuf,
        /// Experiment id to use instead of the one in the file name
        #[arg(long)]
        experiment_id: Option<i64>,
        #[arg(long, default_value = DEFAULT_EXPERIMENT_PATTERN)]
        pattern: String,
    },

    /// Build the feature matrix for an experiment and a plate
    Features {
        experiment_id: i64,
        plate_id: i64,
        /// Output CSV (defaults to features_exp<E>_plate<P>.csv)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Load the reagent catalog from a name,concentration,unit CSV
    SeedReagents { csv: PathBuf },

    /// Print a growth report for a plate CSV
    PlateSummary { csv: PathBuf },

    /// Recover a reagent table from generated text and store it
    RecoverTable {
        file: PathBuf,
        #[arg(long)]
        organism: String,
    },

    /// Delete every reading of a plate
    DeletePlate { plate_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = TomlConfig::load_or_default();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "odx-ingest v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // Growth reports need no database
    if let Command::PlateSummary { csv } = &args.command {
        return plate_summary(csv, args.json);
    }

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    config::ensure_root_folder(&root_folder).context("Failed to initialize root folder")?;
    let db_path = config::resolve_database_path(args.database.as_deref(), &toml_config, &root_folder);
    info!("Database: {}", db_path.display());

    let pool = db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;

    match args.command {
        Command::IngestPlates {
            path,
            plate_id,
            pattern,
        } => ingest_plates(&pool, path, plate_id, &pattern, args.json).await,
        Command::IngestExperiments {
            path,
            experiment_id,
            pattern,
        } => ingest_experiments(&pool, path, experiment_id, &pattern, args.json).await,
        Command::Features {
            experiment_id,
            plate_id,
            output,
        } => features(&pool, experiment_id, plate_id, output, args.json).await,
        Command::SeedReagents { csv } => {
            let report = reagent_seed::seed_reagents_file(&pool, &csv).await?;
            if args.json {
                return print_json(&report);
            }
            println!(
                "Reagents inserted: {}, already present: {}",
                report.inserted, report.unchanged
            );
            for name in &report.skipped {
                println!("  skipped: {}", name);
            }
            Ok(())
        }
        Command::PlateSummary { .. } => Ok(()),
        Command::RecoverTable { file, organism } => {
            let report = protocol_recovery::recover_protocol_file(&pool, &file, &organism).await?;
            if args.json {
                return print_json(&report);
            }
            println!(
                "Protocol {} for {}: {} reagents ({} repaired lines)",
                report.tracker_id,
                report.target_organism,
                report.rows.len(),
                report.repaired_lines
            );
            Ok(())
        }
        Command::DeletePlate { plate_id } => {
            let deleted = db::readings::delete_by_plate(&pool, plate_id).await?;
            println!("Deleted {} readings for plate {}", deleted, plate_id);
            Ok(())
        }
    }
}

async fn ingest_plates(
    pool: &SqlitePool,
    path: PathBuf,
    plate_id: Option<i64>,
    pattern: &str,
    json: bool,
) -> Result<()> {
    let pattern = NamePattern::new(pattern)?;
    let report = plate_ingest::ingest_plate_path(pool, &path, &pattern, plate_id).await?;

    if json {
        print_json(&batch_json(&report))?;
        return check_batch(&report, "plate", &pattern, &path);
    }

    let mut total = 0;
    for outcome in &report.files {
        match &outcome.result {
            Ok(plate) => {
                total += plate.inserted;
                println!(
                    "{}: plate {} - {} readings",
                    outcome.path.display(),
                    plate.plate_id,
                    plate.inserted
                );
            }
            Err(e) => println!("{}: FAILED - {}", outcome.path.display(), e),
        }
    }
    println!("Total readings inserted: {}", total);

    check_batch(&report, "plate", &pattern, &path)
}

async fn ingest_experiments(
    pool: &SqlitePool,
    path: PathBuf,
    experiment_id: Option<i64>,
    pattern: &str,
    json: bool,
) -> Result<()> {
    let pattern = NamePattern::new(pattern)?;
    let catalog = SqliteReagentCatalog::new(pool.clone());
    let report =
        experiment_ingest::ingest_experiment_path(pool, &catalog, &path, &pattern, experiment_id).await?;

    if json {
        print_json(&batch_json(&report))?;
        return check_batch(&report, "experiment", &pattern, &path);
    }

    for outcome in &report.files {
        match &outcome.result {
            Ok(experiment) => {
                println!(
                    "{}: experiment {} - {} doses",
                    outcome.path.display(),
                    experiment.experiment_id,
                    experiment.doses_inserted
                );
                if !experiment.skipped_reagents.is_empty() {
                    println!("  reagents not in catalog: {}", experiment.skipped_reagents.join(", "));
                }
            }
            Err(e) => println!("{}: FAILED - {}", outcome.path.display(), e),
        }
    }

    check_batch(&report, "experiment", &pattern, &path)
}

/// Batch outcome as JSON: one object per file with either a report or an error
fn batch_json<T: Serialize>(report: &BatchReport<T>) -> serde_json::Value {
    let files: Vec<serde_json::Value> = report
        .files
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(ok) => json!({ "path": outcome.path, "report": ok }),
            Err(e) => json!({ "path": outcome.path, "error": e.to_string() }),
        })
        .collect();
    json!({ "files": files, "failed": report.failure_count() })
}

/// Non-zero exit when nothing matched or any file failed
fn check_batch<T>(report: &BatchReport<T>, kind: &str, pattern: &NamePattern, path: &Path) -> Result<()> {
    if report.files.is_empty() {
        bail!("No {} files matched {:?} in {}", kind, pattern.as_str(), path.display());
    }
    if report.failure_count() > 0 {
        bail!("{} of {} {} files failed", report.failure_count(), report.files.len(), kind);
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn features(
    pool: &SqlitePool,
    experiment_id: i64,
    plate_id: i64,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let rows = feature_builder::build_features(pool, experiment_id, plate_id).await?;
    let output = output
        .unwrap_or_else(|| PathBuf::from(feature_builder::default_output_name(experiment_id, plate_id)));
    feature_builder::write_features_file(&rows, &output)?;

    let summary = feature_builder::summarize(experiment_id, plate_id, &rows);
    if json {
        return print_json(&summary);
    }
    println!(
        "Experiment {} x plate {}: {} records, {} features -> {}",
        summary.experiment_id,
        summary.plate_id,
        summary.records,
        summary.features,
        output.display()
    );
    for stats in &summary.stats {
        println!(
            "  {:<11} mean={:.4} std={:.4} min={:.4} max={:.4}",
            stats.name, stats.mean, stats.std, stats.min, stats.max
        );
    }
    Ok(())
}

fn plate_summary(csv: &Path, json: bool) -> Result<()> {
    match growth_summary::summarize_plate_file(csv)? {
        Some(summary) if json => print_json(&summary)?,
        Some(summary) => print!("{}", summary),
        None => println!("No readings in {}", csv.display()),
    }
    Ok(())
}
