//! Command-line front end: batch filing, dry-run identification and
//! scanner acquisition.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local};
use clap::{Parser, Subcommand};
use log::{info, warn};

use facscan::config::{load_config, Config};
use facscan::extract::{INVOICE_NUMBER_PLACEHOLDER, UNKNOWN_TAX_ID};
use facscan::logging;
use facscan::pipeline::{Pipeline, PipelineConfig};
use facscan::processor::{
    scan_filename, CommandScanDevice, ScanDevice, ScanOutcome, TesseractEngine,
};
use facscan::worker::{BatchRunner, DirectoryScanner};

/// Scanned invoice filing: reads the RUT and folio from the header and files
/// the PDF under a predictable name.
#[derive(Parser)]
#[command(name = "facscan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "facscan.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// File every PDF waiting in the input directory
    Run {
        /// Overrides the configured input directory
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Show what would happen to one PDF without moving it
    Identify {
        pdf: PathBuf,
    },

    /// Acquire one page from the scanner, then file the input directory
    Scan,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    logging::init(Path::new(&config.log_directory), cli.verbose)
        .context("setting up logging")?;

    match cli.command {
        Commands::Run { input } => {
            if let Some(input) = input {
                config.input_directory = input.to_string_lossy().to_string();
            }
            run_batch(&config)
        }
        Commands::Identify { pdf } => identify(&config, &pdf),
        Commands::Scan => {
            acquire(&config)?;
            run_batch(&config)
        }
    }
}

fn build_pipeline(config: &Config) -> Result<Arc<Pipeline>> {
    let pipeline_config = Arc::new(PipelineConfig::from_config(config)?);

    // Model load is slow; done once and shared by every worker
    let engine = TesseractEngine::spawn(&config.ocr.language, config.ocr.datapath.as_deref())
        .context("starting the OCR engine")?;

    Ok(Arc::new(Pipeline::from_config(
        pipeline_config,
        Arc::new(engine),
    )))
}

fn run_batch(config: &Config) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let runner = BatchRunner::new(Arc::clone(&pipeline), config.worker_count);

    let interrupted = runner.interrupt_flag();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, finishing documents in progress");
        interrupted.store(true, Ordering::SeqCst);
    })
    .context("installing the Ctrl-C handler")?;

    let scanner = DirectoryScanner::new(&pipeline.config().input_directory);
    let summary = runner.run_directory(&scanner)?;

    println!("{}", summary);
    if summary.manual_review > 0 {
        println!(
            "Pending review: {}",
            pipeline.manual_review_directory().display()
        );
    }
    Ok(())
}

fn identify(config: &Config, pdf: &Path) -> Result<()> {
    if !pdf.is_file() {
        bail!("{} is not a file", pdf.display());
    }

    let pipeline = build_pipeline(config)?;
    let identification = pipeline.identify(pdf)?;

    println!("--- OCR ({:.0}%) ---", identification.mean_confidence * 100.0);
    println!("{}", identification.raw_text);
    println!("---");
    println!(
        "RUT:   {}",
        identification.outcome.tax_id.as_str_or(UNKNOWN_TAX_ID)
    );
    println!(
        "Folio: {}",
        identification
            .outcome
            .invoice_number
            .as_str_or(INVOICE_NUMBER_PLACEHOLDER)
    );

    match identification.filed_name {
        Some(name) => println!(
            "Would file as {}",
            pipeline
                .config()
                .output_directory
                .join(Local::now().year().to_string())
                .join(format!("{}.pdf", name))
                .display()
        ),
        None => println!(
            "Would send to manual review in {}",
            pipeline.manual_review_directory().display()
        ),
    }
    Ok(())
}

fn acquire(config: &Config) -> Result<()> {
    let Some(scanner) = config.scanner.as_ref() else {
        bail!("no scanner configured; add a \"scanner\" section to the config");
    };

    let device = CommandScanDevice::from_config(scanner, config.ocr.dpi);
    let filename = scan_filename(Local::now().naive_local());

    match device.acquire(&filename, Path::new(&config.input_directory))? {
        ScanOutcome::Acquired(path) => info!("Scanned page saved as {}", path.display()),
        ScanOutcome::NoDevice => warn!("Scanner not available, filing existing documents only"),
        ScanOutcome::Cancelled => info!("Scan cancelled, filing existing documents only"),
    }
    Ok(())
}
