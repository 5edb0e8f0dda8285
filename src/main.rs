mod analysis;
mod config;
mod db;
mod loader;
mod logging;
mod parser;
mod record;
mod render;
mod report;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use crate::analysis::Analyzer;
use crate::config::Settings;
use crate::db::{Document, RecordStore, SqliteStore};
use crate::parser::extract::{ExtractOptions, Extraction};
use crate::render::ChartRenderer;
use crate::report::TracingReporter;

const INSERT_CHUNK: usize = 500;

#[derive(Parser)]
#[command(name = "goofish_pipeline", about = "Goofish search-result ingestion and analysis")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Search response JSON (default: GOOFISH_INPUT_PATH or data/raw/response.json)
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,
    /// Directory for analysis results and charts
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
    /// SQLite document store path
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Extract listings on the rayon pool
    #[arg(long, global = true)]
    parallel: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, extract, store, analyze and chart one payload
    Run {
        /// Skip writing records to the document store
        #[arg(long)]
        no_store: bool,
    },
    /// Load and extract only; print a summary
    Extract {
        /// Print one flat JSON record per line
        #[arg(long)]
        json: bool,
    },
    /// Analyze the records already in the document store
    Stats,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = apply_overrides(Settings::load()?, &cli.common);
    let _log_guard = logging::init(&settings.logs_dir)?;
    info!(settings = ?settings, "Starting pipeline");

    let result = match cli.command {
        Commands::Run { no_store } => {
            let extraction = extract(&settings)?;
            if extraction.records.is_empty() {
                error!("No items found in the JSON file");
                return Ok(());
            }
            let docs = extraction.to_flat();

            if !no_store {
                let inserted = store_documents(&settings, &docs)?;
                println!("Stored {} records in {}", inserted, settings.collection);
            }

            analyze_and_render(&settings, &docs)?;
            info!("Data processing completed successfully");
            Ok(())
        }
        Commands::Extract { json } => {
            let extraction = extract(&settings)?;
            if json {
                for record in &extraction.records {
                    println!("{}", record.to_json()?);
                }
            } else {
                print_summary(&extraction);
            }
            Ok(())
        }
        Commands::Stats => {
            let store = SqliteStore::open(&settings.db_path, &settings.collection)?;
            let docs = store.find_all()?;
            store.close()?;
            if docs.is_empty() {
                println!("No records in {}. Run 'run' first.", settings.collection);
                return Ok(());
            }
            println!("Analyzing {} stored records...", docs.len());
            analyze_and_render(&settings, &docs)
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

fn apply_overrides(mut settings: Settings, args: &CommonArgs) -> Settings {
    if let Some(p) = &args.input {
        settings.input_path = p.clone();
    }
    if let Some(p) = &args.output {
        settings.output_dir = p.clone();
    }
    if let Some(p) = &args.db {
        settings.db_path = p.clone();
    }
    settings.parallel |= args.parallel;
    settings
}

fn extract(settings: &Settings) -> anyhow::Result<Extraction> {
    let options = ExtractOptions {
        parallel: settings.parallel,
        ..Default::default()
    };
    let extraction = parser::process_file(&settings.input_path, &TracingReporter, options)?;
    Ok(extraction)
}

fn store_documents(settings: &Settings, docs: &[Document]) -> anyhow::Result<usize> {
    use indicatif::{ProgressBar, ProgressStyle};

    let mut store = SqliteStore::open(&settings.db_path, &settings.collection)?;

    let pb = ProgressBar::new(docs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut inserted = 0;
    for chunk in docs.chunks(INSERT_CHUNK) {
        inserted += store.insert(chunk)?;
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();
    info!(inserted, total = store.count()?, "Collection {} updated", settings.collection);

    store.close()?;
    Ok(inserted)
}

fn analyze_and_render(settings: &Settings, docs: &[Document]) -> anyhow::Result<()> {
    let report = Analyzer::new(docs).report();
    let path = analysis::write_report(&report, &settings.output_dir)?;
    println!("Analysis written to {}", path.display());

    if let Some(stats) = report.basic_stats.ready() {
        let p = &stats.price_stats;
        println!(
            "Items: {} | price mean {:.2}, median {:.2}, min {:.2}, max {:.2}",
            stats.total_items, p.mean, p.median, p.min, p.max
        );
    }

    let charts = ChartRenderer::new(docs, &settings.output_dir)?.render_all()?;
    for chart in &charts {
        println!("Chart: {}", chart.display());
    }
    Ok(())
}

fn print_summary(extraction: &Extraction) {
    println!(
        "Keyword: {:?} | {} records, {} skipped",
        extraction.keyword,
        extraction.records.len(),
        extraction.skipped.len()
    );
    println!(
        "{:>3} | {:<14} | {:>9} | {:<10} | {:>6} | {:<32}",
        "#", "Item", "Price", "Location", "Want", "Title"
    );
    println!("{}", "-".repeat(90));
    for (i, r) in extraction.records.iter().enumerate() {
        println!(
            "{:>3} | {:<14} | {:>9.2} | {:<10} | {:>6} | {:<32}",
            i + 1,
            truncate(&r.item_id, 14),
            r.price,
            truncate(r.location.as_deref().unwrap_or("-"), 10),
            r.want_count.as_deref().unwrap_or("0"),
            truncate(&r.title, 32)
        );
    }
    for s in &extraction.skipped {
        println!(
            "  skipped #{} ({}): {}",
            s.index,
            s.item_id.as_deref().unwrap_or("-"),
            s.reason
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate("浙江杭州", 10), "浙江杭州");
        assert_eq!(truncate("浙江杭州西湖区", 2), "浙江...");
    }

    #[test]
    fn cli_flags_override_settings() {
        let settings = Settings {
            input_path: "a.json".into(),
            output_dir: "out".into(),
            db_path: "db.sqlite".into(),
            logs_dir: "logs".into(),
            collection: "search_results".into(),
            parallel: false,
        };
        let cli = Cli::parse_from(["goofish_pipeline", "--input", "b.json", "--parallel", "extract"]);
        let s = apply_overrides(settings, &cli.common);
        assert_eq!(s.input_path, PathBuf::from("b.json"));
        assert_eq!(s.output_dir, PathBuf::from("out"));
        assert!(s.parallel);
    }

    #[test]
    fn run_pipeline_into_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            input_path: "tests/fixtures/search_response.json".into(),
            output_dir: dir.path().join("output"),
            db_path: dir.path().join("goofish.sqlite"),
            logs_dir: dir.path().join("logs"),
            collection: "search_results".into(),
            parallel: true,
        };
        let extraction = extract(&settings).unwrap();
        let docs = extraction.to_flat();
        assert_eq!(store_documents(&settings, &docs).unwrap(), 3);
        analyze_and_render(&settings, &docs).unwrap();
        assert!(settings.output_dir.join("analysis_results.json").exists());
        assert!(settings.output_dir.join("price_by_location.svg").exists());
    }
}
