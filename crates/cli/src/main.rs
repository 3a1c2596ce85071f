//! Command-line interface for package extraction.
//!
//! This CLI tool extracts packages into a local directory or into a
//! directory-backed store, and lists package contents.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process;
use unpacker::{
    ArchiveReader, ExtractConfig, ExtractReport, Extractor, LocalStore, Package, TaskOutcome,
};

#[derive(Parser)]
#[command(name = "unpack")]
#[command(version, about = "Extract content packages into directories and stores", long_about = None)]
struct Cli {
    /// Maximum concurrent workers (overrides config file and UNPACK_MAX_WORKERS)
    #[arg(long, global = true)]
    max_workers: Option<usize>,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the extraction report as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace a local directory with the package contents
    Extract {
        /// Package file to extract
        archive: PathBuf,

        /// Output directory (destroyed and recreated)
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Replace a store prefix with the package contents
    Upload {
        /// Package file to extract
        archive: PathBuf,

        /// Root directory of the store
        #[arg(long)]
        store_root: PathBuf,

        /// Key prefix inside the store
        #[arg(long)]
        prefix: String,
    },

    /// List package entries
    List {
        /// Package file to list
        archive: PathBuf,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref(), cli.max_workers).and_then(|config| {
        match cli.command {
            Commands::Extract { archive, out } => handle_extract(&archive, &out, config, cli.json),
            Commands::Upload {
                archive,
                store_root,
                prefix,
            } => handle_upload(&archive, store_root, &prefix, config, cli.json),
            Commands::List { archive } => handle_list(&archive, cli.json),
        }
    });

    if let Err(e) = result {
        tracing::debug!("command failed: {:?}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_config(
    path: Option<&Path>,
    max_workers: Option<usize>,
) -> Result<ExtractConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => ExtractConfig::from_json_file(path)?,
        None => ExtractConfig::from_env(),
    };
    if let Some(n) = max_workers {
        config.max_workers = n;
    }
    let config = config.normalized();
    tracing::debug!("using {} workers", config.max_workers);
    Ok(config)
}

fn handle_extract(
    archive: &Path,
    out: &Path,
    config: ExtractConfig,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Extracting {} into {}", archive.display(), out.display());
    let package = Package::open(archive)?;
    let report = Extractor::new(config).extract_local(package, out)?;
    print_report(&report, json)
}

fn handle_upload(
    archive: &Path,
    store_root: PathBuf,
    prefix: &str,
    config: ExtractConfig,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Uploading {} to {} under {}",
        archive.display(),
        store_root.display(),
        prefix
    );
    let package = Package::open(archive)?;
    let store = LocalStore::new(store_root);

    let progress = ProgressBar::new_spinner();
    progress.set_style(ProgressStyle::with_template("{spinner} {pos} entries {msg}")?);

    let bar = progress.clone();
    let extractor = Extractor::new(config).with_observer(move |outcome: &TaskOutcome<u64>| {
        bar.inc(1);
        bar.set_message(outcome.id().to_string());
    });

    let report = extractor.extract_to_store(package, &store, prefix)?;
    progress.finish_and_clear();
    print_report(&report, json)
}

fn handle_list(archive: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let reader = ArchiveReader::open(Package::open(archive)?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(reader.list_entries())?);
    } else {
        for entry in reader.list_entries() {
            println!("{}", entry);
        }
    }
    Ok(())
}

fn print_report(report: &ExtractReport, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{} -> {}: {} files written ({} bytes), {} skipped, {} failed in {:.2?}",
        report.archive,
        report.destination,
        report.files_written,
        report.bytes_written,
        report.skipped.len(),
        report.failed.len(),
        report.duration
    );
    for failed in &report.failed {
        println!("  failed {}: {}", failed.path, failed.error);
    }
    Ok(())
}
