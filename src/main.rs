mod analysis;
mod config;
mod csv_io;
mod ingest;
mod listing;
mod normalize;
mod progress;
mod report;
mod store;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::analysis::Filter;
use crate::config::Settings;
use crate::ingest::IngestPolicy;
use crate::normalize::tables::GenreKeywordTable;
use crate::normalize::{DurationBucket, NormalizedRecord, Normalizer, RawRecord};
use crate::store::WriteMode;

#[derive(Parser)]
#[command(name = "imdb_pipeline", about = "IMDb listing scraper, normalizer and loader")]
struct Cli {
    /// Config file (default: ./imdb_pipeline.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch listing pages (or parse saved ones) and write the raw CSV
    Scrape {
        /// Parse saved listing pages instead of fetching
        #[arg(long)]
        html: Vec<PathBuf>,
        /// Listing URL to fetch (repeatable; replaces configured sources)
        #[arg(long)]
        url: Vec<String>,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Stop after this many unique rows
        #[arg(short = 'n', long)]
        target: Option<usize>,
    },
    /// Normalize a raw CSV into the analysis-ready CSV
    Normalize {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Normalize a raw CSV and store it in SQLite
    Load {
        #[arg(long)]
        input: Option<PathBuf>,
        #[command(flatten)]
        location: StoreArgs,
        /// Keep existing rows instead of replacing the table
        #[arg(long)]
        append: bool,
    },
    /// Scrape, normalize and load in one go
    Run {
        #[arg(short = 'n', long)]
        target: Option<usize>,
        #[arg(long)]
        append: bool,
    },
    /// Summary statistics and tables from a raw CSV
    Report {
        #[arg(long)]
        input: Option<PathBuf>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Stored movies, best rated first
    Movies {
        #[command(flatten)]
        location: StoreArgs,
        #[command(flatten)]
        filter: FilterArgs,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Row counts and category distribution of the store
    Stats {
        #[command(flatten)]
        location: StoreArgs,
    },
}

#[derive(Args)]
struct StoreArgs {
    /// SQLite database path
    #[arg(long)]
    db: Option<PathBuf>,
    #[arg(long)]
    table: Option<String>,
}

#[derive(Args)]
struct FilterArgs {
    /// Duration category ("short", "medium", "long", "very long", "unknown")
    #[arg(long)]
    duration: Option<DurationBucket>,
    #[arg(long)]
    min_rating: Option<f64>,
    #[arg(long)]
    min_votes: Option<u64>,
    /// Primary genre label, e.g. "Sci-Fi"
    #[arg(long)]
    genre: Option<String>,
}

impl From<FilterArgs> for Filter {
    fn from(a: FilterArgs) -> Self {
        Filter {
            duration: a.duration,
            min_rating: a.min_rating,
            min_votes: a.min_votes,
            genre: a.genre,
        }
    }
}

impl StoreArgs {
    fn apply(self, settings: &mut Settings) {
        if let Some(db) = self.db {
            settings.db_path = db;
        }
        if let Some(table) = self.table {
            settings.table = table;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Scrape { html, url, out, target } => {
            if let Some(n) = target {
                settings.target_rows = n;
            }
            if !url.is_empty() {
                settings.source_urls = url;
            }
            let out = out.unwrap_or_else(|| settings.raw_csv.clone());
            settings.validate()?;

            let raws = scrape(&settings, &html).await?;
            let n = csv_io::write_raw(&out, &raws)?;
            println!("Saved {} movies to {:?}", n, out);
            Ok(())
        }
        Commands::Normalize { input, out } => {
            settings.validate()?;
            let input = input.unwrap_or_else(|| settings.raw_csv.clone());
            let out = out.unwrap_or_else(|| settings.normalized_csv.clone());

            let records = normalize(&settings, csv_io::read_raw(&input)?);
            let n = csv_io::write_normalized(&out, &records)?;
            println!("Wrote {} normalized rows to {:?}", n, out);
            Ok(())
        }
        Commands::Load { input, location, append } => {
            location.apply(&mut settings);
            if append {
                settings.write_mode = WriteMode::Append;
            }
            settings.validate()?;
            let input = input.unwrap_or_else(|| settings.raw_csv.clone());

            let records = normalize(&settings, csv_io::read_raw(&input)?);
            load(&settings, records)
        }
        Commands::Run { target, append } => {
            if let Some(n) = target {
                settings.target_rows = n;
            }
            if append {
                settings.write_mode = WriteMode::Append;
            }
            settings.validate()?;

            let t_scrape = Instant::now();
            let raws = scrape(&settings, &[]).await?;
            csv_io::write_raw(&settings.raw_csv, &raws)?;
            println!(
                "Scraped {} movies in {:.1}s -> {:?}",
                raws.len(),
                t_scrape.elapsed().as_secs_f64(),
                settings.raw_csv
            );

            let records = normalize(&settings, raws);
            csv_io::write_normalized(&settings.normalized_csv, &records)?;
            load(&settings, records)
        }
        Commands::Report { input, filter } => {
            settings.validate()?;
            let input = input.unwrap_or_else(|| settings.raw_csv.clone());
            let mut records = normalize(&settings, csv_io::read_raw(&input)?);
            ingest::retain_usable(&mut records, policy(&settings));

            let filter = Filter::from(filter);
            check_genre(&settings, &filter);
            let selection = filter.apply(&records);
            if !filter.is_empty() {
                println!("{} of {} movies match the filters\n", selection.len(), records.len());
            }
            if selection.is_empty() {
                println!("No movies match the selected filters.");
                return Ok(());
            }
            report::print_report(&selection);
            Ok(())
        }
        Commands::Movies { location, filter, limit } => {
            location.apply(&mut settings);
            settings.validate()?;
            let conn = store::connect(&settings.db_path)?;
            store::init_schema(&conn, &settings.table)?;
            let filter = Filter::from(filter);
            check_genre(&settings, &filter);
            let rows = store::fetch_movies(&conn, &settings.table, &filter, limit)?;
            if rows.is_empty() {
                println!("No movies found. Run 'load' first.");
                return Ok(());
            }
            report::print_rows(&rows);
            Ok(())
        }
        Commands::Stats { location } => {
            location.apply(&mut settings);
            settings.validate()?;
            let conn = store::connect(&settings.db_path)?;
            let s = store::get_stats(&conn, &settings.table)?;
            report::print_stats(&s);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn policy(settings: &Settings) -> IngestPolicy {
    IngestPolicy {
        require_rating: settings.require_rating,
    }
}

/// Warn when a genre filter names no known label.
fn check_genre(settings: &Settings, filter: &Filter) {
    let Some(genre) = filter.genre.as_deref() else {
        return;
    };
    let table = GenreKeywordTable::for_version(settings.genre_table);
    if !table.labels().any(|l| l == genre) {
        warn!("Unknown genre {:?}; known: {}", genre, table.labels().join(", "));
    }
}

/// Saved pages when given, otherwise the configured listing URLs.
async fn scrape(settings: &Settings, html: &[PathBuf]) -> anyhow::Result<Vec<RawRecord>> {
    if !html.is_empty() {
        return parse_saved_pages(html, settings.target_rows);
    }
    if settings.source_urls.is_empty() {
        bail!("No listing URLs configured (set source_urls or pass --url)");
    }
    println!("Fetching {} listing pages...", settings.source_urls.len());
    let outcome = listing::fetch_listings(&settings.source_urls, settings).await?;
    println!(
        "Fetched {} pages ({} failed), {} unique movies",
        outcome.pages_ok,
        outcome.pages_failed,
        outcome.records.len()
    );
    if outcome.pages_ok == 0 {
        bail!("Every listing page failed to download");
    }
    Ok(outcome.records)
}

fn parse_saved_pages(paths: &[PathBuf], target: usize) -> anyhow::Result<Vec<RawRecord>> {
    let mut records = Vec::new();
    for path in paths {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        let page = listing::parse_listing(&html);
        info!("{:?}: {} items", path, page.len());
        records.extend(page);
    }
    let mut records = listing::dedupe(records);
    listing::sort_by_rank(&mut records);
    records.truncate(target);
    Ok(records)
}

fn normalize(settings: &Settings, raws: Vec<RawRecord>) -> Vec<NormalizedRecord> {
    let normalizer = Normalizer::new(settings.genre_table);
    debug!(genre_table = ?normalizer.table_version(), rows = raws.len(), "Normalizing");

    let outcome = normalizer.normalize_batch(&raws, settings.chunk_size);
    let malformed = outcome.malformed_total();
    if malformed > 0 {
        println!("{} malformed values treated as missing", malformed);
    }
    outcome.records
}

fn load(settings: &Settings, mut records: Vec<NormalizedRecord>) -> anyhow::Result<()> {
    let dropped = ingest::retain_usable(&mut records, policy(settings));
    if records.is_empty() {
        println!("Nothing to load ({} rows dropped).", dropped);
        return Ok(());
    }

    let conn = store::connect(&settings.db_path)?;
    let summary = store::save_movies(
        &conn,
        &settings.table,
        &records,
        settings.write_mode,
        settings.chunk_size,
    )?;
    println!(
        "Loaded {} movies into {}:{} ({}, {} dropped)",
        summary.written,
        settings.db_path.display(),
        settings.table,
        summary.run_id,
        dropped
    );
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
