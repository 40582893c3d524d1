mod display;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use armory_core::{PipelineConfig, Rarity, compact};
use armory_pipeline::{PipelineError, category_counts, reconcile_snapshot, refresh_staging};
use armory_store::{ImageDir, ParquetSink, ParquetSource, read_records, write_diff, write_records};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "armory", version, about = "Equipment scrape reconciliation and icon classification")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Collapse repeated scrape rows to one row per item plus the frontier marker
    Compact {
        /// Scraped snapshot (Parquet)
        #[arg(long)]
        scraped: PathBuf,

        /// Write here instead of replacing the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Reconcile scraped records against the canonical tables
    Diff {
        /// Pipeline config (JSON) with the canonical table mapping
        #[arg(long, env = "ARMORY_CONFIG")]
        config: PathBuf,

        #[arg(long)]
        scraped: PathBuf,

        /// Write the full diff as Parquet
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Diff rows to print
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Rebuild the staging set and classify uncategorised items
    Refresh {
        #[arg(long, env = "ARMORY_CONFIG")]
        config: PathBuf,

        #[arg(long)]
        scraped: PathBuf,

        /// Staging snapshot to replace (Parquet)
        #[arg(long)]
        staging: PathBuf,

        /// Icon directory
        #[arg(long)]
        images: PathBuf,

        /// Also write the reconciliation diff
        #[arg(long)]
        diff: Option<PathBuf>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Print the marker fingerprint of one icon
    Fingerprint {
        #[arg(long)]
        rarity: Rarity,

        image: PathBuf,

        /// Pipeline config for crop and threshold overrides
        #[arg(long, env = "ARMORY_CONFIG")]
        config: Option<PathBuf>,

        /// Also draw the bit grid
        #[arg(long)]
        grid: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Compact { scraped, output } => run_compact(&scraped, output.as_deref()),
        Command::Diff {
            config,
            scraped,
            output,
            limit,
        } => run_diff(&config, &scraped, output.as_deref(), limit),
        Command::Refresh {
            config,
            scraped,
            staging,
            images,
            diff,
            limit,
        } => run_refresh(&config, &scraped, &staging, &images, diff.as_deref(), limit),
        Command::Fingerprint {
            rarity,
            image,
            config,
            grid,
        } => run_fingerprint(rarity, &image, config.as_deref(), grid),
    }
}

fn load_config(path: &Path) -> anyhow::Result<PipelineConfig> {
    PipelineConfig::load(path).with_context(|| format!("loading config {}", path.display()))
}

/// Canonical table paths are relative to the config file.
fn source_for(config_path: &Path, scraped: &Path, config: &PipelineConfig) -> ParquetSource {
    let base = config_path.parent().unwrap_or(Path::new("."));
    ParquetSource::new(scraped, config.canonical_tables.clone(), base)
}

fn run_compact(scraped: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let rows = read_records(scraped).with_context(|| format!("reading {}", scraped.display()))?;
    let compacted = compact(&rows);
    let target = output.unwrap_or(scraped);
    write_records(target, &compacted.records)
        .with_context(|| format!("writing {}", target.display()))?;
    display::print_compaction(&compacted);
    Ok(())
}

fn run_diff(
    config_path: &Path,
    scraped: &Path,
    output: Option<&Path>,
    limit: usize,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let source = source_for(config_path, scraped, &config);
    let outcome = reconcile_snapshot(&source).context("reading snapshots")?;
    if let Some(path) = output {
        write_diff(path, &outcome.reconciliation)
            .with_context(|| format!("writing diff {}", path.display()))?;
        info!(path = %path.display(), rows = outcome.reconciliation.diffs.len(), "wrote diff");
    }
    display::print_reconciliation(&outcome.reconciliation, limit)
}

fn run_refresh(
    config_path: &Path,
    scraped: &Path,
    staging: &Path,
    images: &Path,
    diff: Option<&Path>,
    limit: usize,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let source = source_for(config_path, scraped, &config);
    let outcome = reconcile_snapshot(&source).context("reading snapshots")?;

    if let Some(path) = diff {
        write_diff(path, &outcome.reconciliation)
            .with_context(|| format!("writing diff {}", path.display()))?;
    }
    display::print_reconciliation(&outcome.reconciliation, limit)?;

    let images = ImageDir::new(images).with_references(
        outcome
            .compacted
            .records
            .iter()
            .chain(outcome.canonical.iter().map(|e| &e.record)),
    );
    let mut sink = ParquetSink::new(staging);

    match refresh_staging(&outcome, &images, &mut sink, &config) {
        Ok((summary, staged)) => {
            display::print_summary(&summary)?;
            display::print_category_counts(&category_counts(&staged))?;
            Ok(())
        }
        Err(PipelineError::EmptyBank { allowed, summary }) => {
            display::print_summary(&summary)?;
            bail!(
                "no reference icons for any allowed rarity ({allowed}) under {}; staging left unchanged",
                images.root().display()
            )
        }
        Err(e) => Err(e).context("refreshing staging set"),
    }
}

fn run_fingerprint(
    rarity: Rarity,
    image: &Path,
    config_path: Option<&Path>,
    grid: bool,
) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };
    let bytes = std::fs::read(image).with_context(|| format!("reading {}", image.display()))?;
    let decoded = armory_vision::decode(&bytes)
        .with_context(|| format!("decoding {}", image.display()))?;
    let fp = armory_vision::extract(&decoded, rarity, &config.fingerprint)?;

    println!("{}", fp.to_hex());
    println!(
        "{} of {} bits set ({}x{} source)",
        fp.count_ones(),
        config.fingerprint.bits(),
        decoded.width(),
        decoded.height()
    );
    if grid {
        print!("{fp}");
    }
    Ok(())
}
