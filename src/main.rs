mod config;
mod db;
mod dom;
mod driver;
mod export;
mod extract;
mod host;
mod intercept;
mod listing;
mod replay;
mod scheduler;
mod scroll;
mod sequencer;
mod session;
mod store;
mod verify;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::driver::Pace;
use crate::replay::ReplayHost;
use crate::session::Session;

#[derive(Parser)]
#[command(name = "maps_scraper", about = "Google Maps listing scraper over recorded page snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a recorded session directory (manifest.json + snapshots)
    Run {
        dir: PathBuf,
        /// JSON settings file; flags below override it
        #[arg(short, long = "config")]
        config_path: Option<PathBuf>,
        /// Don't scroll the results feed for more entries
        #[arg(long)]
        no_auto_scroll: bool,
        /// Only collect what the listing cards show
        #[arg(long)]
        no_details: bool,
        /// Allow unscoped phone/website fallbacks
        #[arg(long)]
        loose: bool,
        /// Honour every settle delay instead of skipping ahead
        #[arg(long)]
        realtime: bool,
        /// Value for the Time Zone column
        #[arg(long)]
        time_zone: Option<String>,
        /// CSV output path, `-` for stdout (default: google-maps-data-<ms>.csv)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Also upsert results into this SQLite database
        #[arg(long = "db")]
        db_path: Option<PathBuf>,
    },
    /// Export records saved in a database
    Export {
        #[arg(long)]
        db: PathBuf,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Show database statistics
    Stats {
        #[arg(long)]
        db: PathBuf,
    },
    /// Check whether two place names would pass identity verification
    Match { expected: String, observed: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            dir,
            config_path,
            no_auto_scroll,
            no_details,
            loose,
            realtime,
            time_zone,
            out,
            db_path,
        } => {
            let mut settings = match &config_path {
                Some(path) => config::load(path)?,
                None => Settings::default(),
            };
            if no_auto_scroll {
                settings.auto_scroll = false;
            }
            if no_details {
                settings.detail_extraction = false;
            }
            if loose {
                settings.strict_scoping = false;
            }
            if let Some(tz) = time_zone {
                settings.time_zone = tz;
            }

            let mut host = ReplayHost::open(&dir)?;
            let mut session = Session::new(settings);
            session.start(&mut host)?;

            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
            pb.enable_steady_tick(Duration::from_millis(120));
            let pace = if realtime { Pace::Realtime } else { Pace::Instant };
            let summary = driver::run(&mut session, &mut host, pace, &pb).await;

            println!(
                "Collected {} places ({} enriched, {} mismatched, {} failed) in {} of page time",
                summary.records,
                summary.enriched,
                summary.mismatched,
                summary.failed,
                format_duration(summary.elapsed)
            );

            if let Some(path) = &db_path {
                let conn = db::connect(path)?;
                db::init_schema(&conn)?;
                let saved = db::save_records(&conn, session.store().iter())?;
                println!("Saved {} places to {}", saved, path.display());
            }
            write_export(session.store().iter(), out.as_deref())
        }
        Commands::Export { db: db_path, out } => {
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let records = db::fetch_records(&conn)?;
            write_export(records.iter(), out.as_deref())
        }
        Commands::Stats { db: db_path } => {
            let conn = db::connect(&db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Places:      {}", s.total);
            println!("Phone:       {}", s.with_phone);
            println!("Website:     {}", s.with_website);
            println!("Coordinates: {}", s.with_coordinates);
            Ok(())
        }
        Commands::Match { expected, observed } => {
            let verdict = if verify::is_name_match(&expected, &observed) {
                "match"
            } else {
                "mismatch"
            };
            println!(
                "{} ({:?} vs {:?})",
                verdict,
                verify::normalize(&expected),
                verify::normalize(&observed)
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn write_export<'a>(records: impl IntoIterator<Item = &'a store::Record>, out: Option<&Path>) -> anyhow::Result<()> {
    let Some(csv) = export::to_csv_string(records)? else {
        println!("No data to export.");
        return Ok(());
    };
    match out {
        Some(path) if path == Path::new("-") => {
            std::io::stdout().write_all(csv.as_bytes())?;
        }
        _ => {
            let path = out
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(export::default_file_name(Utc::now())));
            std::fs::write(&path, csv).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
