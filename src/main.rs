use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use health_anomaly_monitor::config::{parse_contamination, DEFAULT_CONTAMINATION};
use health_anomaly_monitor::{dashboard, db, logging, pipeline, report, PipelineConfig};

const SAMPLE_CSV: &[u8] = include_bytes!("../data/sample_health_data.csv");

#[derive(Parser)]
#[command(name = "health-monitor")]
#[command(about = "Clean, score and summarize personal health measurements", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Clean, score and store a CSV/TSV upload
    Upload {
        #[arg(long)]
        owner: Uuid,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value_t = DEFAULT_CONTAMINATION, value_parser = parse_contamination)]
        contamination: f64,
    },
    /// Score and store the bundled sample data
    LoadSample {
        #[arg(long)]
        owner: Uuid,
    },
    /// Write the bundled sample CSV to disk
    ExportSample {
        #[arg(long, default_value = "sample_health_data.csv")]
        out: PathBuf,
    },
    /// Score a file without storing it
    Score {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value_t = DEFAULT_CONTAMINATION, value_parser = parse_contamination)]
        contamination: f64,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Print dashboard counters and optionally dump chart series as JSON
    Dashboard {
        #[arg(long)]
        owner: Uuid,
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Summarize the most recent week of stored records
    Report {
        #[arg(long)]
        owner: Uuid,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Delete every stored record for an owner
    Clear {
        #[arg(long)]
        owner: Uuid,
    },
    /// Count stored records across all owners
    Stats,
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn store_upload(
    pool: &PgPool,
    owner: Uuid,
    bytes: &[u8],
    config: &PipelineConfig,
) -> anyhow::Result<()> {
    let scored = pipeline::process_upload(bytes, config)?;
    let rows = pipeline::to_storage_rows(&scored, config);
    let inserted = db::insert_records(pool, owner, &rows).await?;
    let total = db::count_records(pool, owner).await?;
    println!(
        "Stored {inserted} records ({} flagged as unusual); {total} on file.",
        scored.anomaly_count()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();
    let cli = Cli::parse();
    let config = PipelineConfig::default();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Upload {
            owner,
            file,
            contamination,
        } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let pool = connect().await?;
            info!(owner = %owner, file = %file.display(), "uploading");
            store_upload(&pool, owner, &bytes, &config.with_contamination(contamination)).await?;
        }
        Commands::LoadSample { owner } => {
            let pool = connect().await?;
            store_upload(&pool, owner, SAMPLE_CSV, &config).await?;
        }
        Commands::ExportSample { out } => {
            std::fs::write(&out, SAMPLE_CSV)?;
            println!("Sample written to {}.", out.display());
        }
        Commands::Score {
            file,
            contamination,
            limit,
        } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let config = config.with_contamination(contamination);
            let scored = pipeline::process_upload(&bytes, &config)?;
            let summary = dashboard::summarize(&scored);
            println!(
                "{} records, {} flagged ({}%).",
                summary.total_records, summary.anomaly_count, summary.anomaly_rate
            );

            let mut flagged = scored.flagged_indices();
            flagged.sort_by(|&a, &b| {
                scored.anomaly_scores[b]
                    .partial_cmp(&scored.anomaly_scores[a])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            for i in flagged.into_iter().take(limit) {
                println!(
                    "- {} score {:.3} drivers: {}",
                    scored.timestamps()[i],
                    scored.anomaly_scores[i],
                    scored.anomaly_drivers[i]
                );
            }
        }
        Commands::Dashboard { owner, json } => {
            let pool = connect().await?;
            let rows = db::fetch_records(&pool, owner).await?;
            if rows.is_empty() {
                println!("No records stored for this owner.");
                return Ok(());
            }
            let scored = pipeline::from_storage_rows(&rows, &config);
            let summary = dashboard::summarize(&scored);
            println!("Total records: {}", summary.total_records);
            println!("Anomalies: {}", summary.anomaly_count);
            println!("Anomaly rate: {}%", summary.anomaly_rate);

            if let Some(path) = json {
                let series = dashboard::build_series(&scored, &config);
                std::fs::write(&path, serde_json::to_vec_pretty(&series)?)?;
                println!("Chart series written to {}.", path.display());
            }
        }
        Commands::Report { owner, csv } => {
            let pool = connect().await?;
            let rows = db::fetch_records(&pool, owner).await?;
            let scored = pipeline::from_storage_rows(&rows, &config);
            let Some(summary) = report::generate_weekly_summary(&scored, &config) else {
                println!("No data to report yet.");
                return Ok(());
            };

            println!("Weekly summary for {}", summary.date_range);
            println!("Records: {}", summary.records);
            println!("Anomalies: {}", summary.anomalies);
            println!("Top drivers: {}", summary.top_drivers);
            println!();
            println!("{}", summary.interpretation);

            if let Some(path) = csv {
                std::fs::write(&path, report::to_csv_bytes(&summary)?)?;
                println!("Daily rollup written to {}.", path.display());
            }
        }
        Commands::Clear { owner } => {
            let pool = connect().await?;
            let deleted = db::delete_records(&pool, owner).await?;
            println!("Deleted {deleted} records.");
        }
        Commands::Stats => {
            let pool = connect().await?;
            let total = db::count_all_records(&pool).await?;
            println!("{total} records stored across all owners.");
        }
    }

    Ok(())
}
