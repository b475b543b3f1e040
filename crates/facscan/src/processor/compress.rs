use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::config::{CompressionConfig, QualityPreset};
use crate::error::CompressionError;

/// Shrinks a PDF in place. On any error the original must be left untouched.
pub trait Compressor: Send + Sync {
    fn compress(&self, pdf_path: &Path) -> Result<CompressionReport, CompressionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionReport {
    pub original_bytes: u64,
    pub final_bytes: u64,
}

impl CompressionReport {
    pub fn replaced(&self) -> bool {
        self.final_bytes < self.original_bytes
    }
}

/// Ghostscript `pdfwrite` re-encoding.
pub struct GhostscriptCompressor {
    executable: String,
    dpi: u32,
    preset: QualityPreset,
}

impl GhostscriptCompressor {
    pub fn new(executable: impl Into<String>, dpi: u32, preset: QualityPreset) -> Self {
        Self {
            executable: executable.into(),
            dpi,
            preset,
        }
    }

    pub fn from_config(config: &CompressionConfig) -> Self {
        Self::new(config.executable.clone(), config.dpi, config.preset)
    }

    fn arguments(&self, input: &Path, output: &Path) -> Vec<String> {
        let dpi = self.dpi.to_string();
        vec![
            "-sDEVICE=pdfwrite".to_string(),
            "-dCompatibilityLevel=1.4".to_string(),
            format!("-dPDFSETTINGS={}", self.preset.pdf_settings()),
            "-dNOPAUSE".to_string(),
            "-dQUIET".to_string(),
            "-dBATCH".to_string(),
            "-dDownsampleColorImages=true".to_string(),
            "-dDownsampleGrayImages=true".to_string(),
            format!("-dColorImageResolution={}", dpi),
            format!("-dGrayImageResolution={}", dpi),
            format!("-dMonoImageResolution={}", dpi),
            format!("-sOutputFile={}", output.display()),
            input.display().to_string(),
        ]
    }
}

impl Compressor for GhostscriptCompressor {
    fn compress(&self, pdf_path: &Path) -> Result<CompressionReport, CompressionError> {
        let _span = tracing::debug_span!("processor.ghostscript", dpi = self.dpi).entered();

        let original_bytes = file_len(pdf_path)?;
        let temp_output = temp_sibling(pdf_path);

        let output = Command::new(&self.executable)
            .args(self.arguments(pdf_path, &temp_output))
            .output()
            .map_err(|e| CompressionError::Spawn {
                executable: self.executable.clone(),
                source: e,
            })?;

        if !output.status.success() {
            let _ = std::fs::remove_file(&temp_output);
            return Err(CompressionError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        replace_if_smaller(pdf_path, &temp_output, original_bytes)
    }
}

/// Used when compression is disabled.
pub struct NoopCompressor;

impl Compressor for NoopCompressor {
    fn compress(&self, pdf_path: &Path) -> Result<CompressionReport, CompressionError> {
        let size = file_len(pdf_path)?;
        Ok(CompressionReport {
            original_bytes: size,
            final_bytes: size,
        })
    }
}

fn file_len(path: &Path) -> Result<u64, CompressionError> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| CompressionError::Replace {
            path: path.to_path_buf(),
            source: e,
        })
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = format!(".facscan_gs_{}.pdf", uuid::Uuid::new_v4());
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Swaps `candidate` over `original` only when it is non-empty and smaller.
pub(crate) fn replace_if_smaller(
    original: &Path,
    candidate: &Path,
    original_bytes: u64,
) -> Result<CompressionReport, CompressionError> {
    let candidate_bytes = match std::fs::metadata(candidate) {
        Ok(meta) => meta.len(),
        Err(_) => return Err(CompressionError::MissingOutput(candidate.to_path_buf())),
    };

    if candidate_bytes == 0 || candidate_bytes >= original_bytes {
        debug!(
            original_bytes,
            candidate_bytes, "compressed copy is not smaller, keeping original"
        );
        let _ = std::fs::remove_file(candidate);
        return Ok(CompressionReport {
            original_bytes,
            final_bytes: original_bytes,
        });
    }

    std::fs::rename(candidate, original).map_err(|e| {
        let _ = std::fs::remove_file(candidate);
        CompressionError::Replace {
            path: original.to_path_buf(),
            source: e,
        }
    })?;

    Ok(CompressionReport {
        original_bytes,
        final_bytes: candidate_bytes,
    })
}
