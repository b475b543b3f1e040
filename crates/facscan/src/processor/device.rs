use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::config::ScannerConfig;
use crate::error::ProcessError;
use crate::processor::pdf::image_to_pdf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A new PDF was written into the input directory.
    Acquired(PathBuf),
    NoDevice,
    Cancelled,
}

/// Physical scanner collaborator.
pub trait ScanDevice: Send + Sync {
    fn acquire(&self, output_filename: &str, input_dir: &Path)
        -> Result<ScanOutcome, ProcessError>;
}

/// `escaneo_{YYYYMMDD_HHMMSS}.pdf`
pub fn scan_filename(now: NaiveDateTime) -> String {
    format!("escaneo_{}.pdf", now.format("%Y%m%d_%H%M%S"))
}

/// Runs an external acquisition program that prints one raster page on stdout
/// (e.g. `scanimage --format=png`).
pub struct CommandScanDevice {
    program: String,
    args: Vec<String>,
    dpi: u32,
}

impl CommandScanDevice {
    pub fn new(program: impl Into<String>, args: Vec<String>, dpi: u32) -> Self {
        Self {
            program: program.into(),
            args,
            dpi,
        }
    }

    pub fn from_config(config: &ScannerConfig, dpi: u32) -> Self {
        Self::new(config.program.clone(), config.args.clone(), dpi)
    }
}

impl ScanDevice for CommandScanDevice {
    fn acquire(
        &self,
        output_filename: &str,
        input_dir: &Path,
    ) -> Result<ScanOutcome, ProcessError> {
        let _span = tracing::info_span!("device.acquire", program = %self.program).entered();

        let output = match Command::new(&self.program).args(&self.args).output() {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Scanner program not found");
                return Ok(ScanOutcome::NoDevice);
            }
            Err(e) => {
                return Err(ProcessError::Device(format!(
                    "Failed to start '{}': {}",
                    self.program, e
                )))
            }
        };

        if !output.status.success() || output.stdout.is_empty() {
            info!(status = %output.status, "Scan cancelled or produced no page");
            return Ok(ScanOutcome::Cancelled);
        }

        let pdf = image_to_pdf(&output.stdout, self.dpi)?;

        std::fs::create_dir_all(input_dir).map_err(|e| ProcessError::ReadDocument {
            path: input_dir.to_path_buf(),
            source: e,
        })?;
        let target = input_dir.join(output_filename);
        std::fs::write(&target, pdf).map_err(|e| ProcessError::ReadDocument {
            path: target.clone(),
            source: e,
        })?;

        info!(file = %output_filename, "Scanned page saved");
        Ok(ScanOutcome::Acquired(target))
    }
}
