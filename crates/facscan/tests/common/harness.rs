//! Test harness for isolated pipeline runs.
//!
//! Input "PDFs" are small text files carrying a script index. The fake
//! rasterizer paints a page whose gray level is that index and the fake OCR
//! engine reads the gray level back out of the cropped zone, so every
//! document gets its own scripted text even when several workers run at once.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};
use image::{DynamicImage, Rgb, RgbImage};
use tempfile::TempDir;

use facscan::config::CompressionConfig;
use facscan::error::{CompressionError, ProcessError};
use facscan::pipeline::{Collaborators, Pipeline, PipelineConfig};
use facscan::processor::{
    BoundingBox, CompressionReport, Compressor, NoopCompressor, OcrEngine, Rasterizer,
    TextFragment, ZoneBounds,
};

/// OCR script that makes the fake engine panic.
pub const PANIC_SCRIPT: &str = "!panic";

const FAKE_PDF_HEADER: &str = "%PDF-1.4 facscan-test";
const CORRUPT_MARKER: &str = "corrupt";

pub fn fixed_clock() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap()
}

/// Draws a plain page whose gray level encodes the script index.
pub struct ScriptedRasterizer;

impl Rasterizer for ScriptedRasterizer {
    fn render_page(&self, pdf_path: &Path, _page: u32) -> Result<Vec<u8>, ProcessError> {
        let content =
            std::fs::read_to_string(pdf_path).map_err(|e| ProcessError::ReadDocument {
                path: pdf_path.to_path_buf(),
                source: e,
            })?;

        let marker = content.lines().last().unwrap_or_default().trim();
        if marker == CORRUPT_MARKER {
            return Ok(b"\x89PNG\r\n\x1a\n truncated".to_vec());
        }

        let index: u8 = marker
            .parse()
            .map_err(|_| ProcessError::PdfProcessing(format!("bad test document: {}", marker)))?;

        let mut png = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 500, Rgb([index, index, index])))
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| ProcessError::InvalidImage(e.to_string()))?;
        Ok(png)
    }
}

/// Returns the script selected by the zone's gray level, one fragment per line.
pub struct ScriptedOcr {
    scripts: Arc<Mutex<Vec<String>>>,
}

impl OcrEngine for ScriptedOcr {
    fn recognize(&self, png: &[u8]) -> Result<Vec<TextFragment>, ProcessError> {
        let zone = image::load_from_memory(png)
            .map_err(|e| ProcessError::InvalidImage(e.to_string()))?
            .to_rgb8();
        let index = zone.get_pixel(0, 0)[0] as usize;

        let script = self.scripts.lock().unwrap()[index].clone();
        if script == PANIC_SCRIPT {
            panic!("scripted OCR panic");
        }

        Ok(script
            .lines()
            .enumerate()
            .map(|(row, line)| {
                TextFragment::new(line, 0.91, BoundingBox::new(4, row as u32 * 20, 150, 16))
            })
            .collect())
    }
}

/// Rewrites the file with fewer bytes.
pub struct ShrinkingCompressor;

impl Compressor for ShrinkingCompressor {
    fn compress(&self, pdf_path: &Path) -> Result<CompressionReport, CompressionError> {
        let original_bytes = std::fs::metadata(pdf_path).map(|m| m.len()).unwrap_or(0);
        std::fs::write(pdf_path, b"%PDF-small").unwrap();
        Ok(CompressionReport {
            original_bytes,
            final_bytes: 10,
        })
    }
}

pub struct FailingCompressor;

impl Compressor for FailingCompressor {
    fn compress(&self, pdf_path: &Path) -> Result<CompressionReport, CompressionError> {
        Err(CompressionError::MissingOutput(pdf_path.to_path_buf()))
    }
}

/// Test harness providing isolated execution environment for integration tests.
pub struct TestHarness {
    temp_dir: TempDir,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub review_dir: PathBuf,
    scripts: Arc<Mutex<Vec<String>>>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let input_dir = base.join("input");
        let output_dir = base.join("output");
        let review_dir = base.join("review");

        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");

        Self {
            temp_dir,
            input_dir,
            output_dir,
            review_dir,
            scripts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes an input document whose header zone reads as `ocr_text`.
    pub fn add_document(&self, filename: &str, ocr_text: &str) -> PathBuf {
        let index = {
            let mut scripts = self.scripts.lock().unwrap();
            scripts.push(ocr_text.to_string());
            scripts.len() - 1
        };
        assert!(index < 256, "too many scripted documents");
        self.write_input(filename, &format!("{}\n{}\n", FAKE_PDF_HEADER, index))
    }

    /// Writes an input document whose first page does not decode.
    pub fn add_corrupt_document(&self, filename: &str) -> PathBuf {
        self.write_input(
            filename,
            &format!("{}\n{}\n", FAKE_PDF_HEADER, CORRUPT_MARKER),
        )
    }

    fn write_input(&self, filename: &str, content: &str) -> PathBuf {
        let path = self.input_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            input_directory: self.input_dir.clone(),
            output_directory: self.output_dir.clone(),
            manual_review_directory: self.review_dir.clone(),
            debug_directory: None,
            branch: "local".to_string(),
            ocr_dpi: 300,
            zone: ZoneBounds::default(),
            compression: CompressionConfig::default(),
        }
    }

    pub fn pipeline(&self) -> Arc<Pipeline> {
        self.pipeline_with_compressor(Box::new(NoopCompressor))
    }

    pub fn pipeline_with_compressor(&self, compressor: Box<dyn Compressor>) -> Arc<Pipeline> {
        self.pipeline_from(self.pipeline_config(), compressor)
    }

    pub fn pipeline_from(
        &self,
        config: PipelineConfig,
        compressor: Box<dyn Compressor>,
    ) -> Arc<Pipeline> {
        let collaborators = Collaborators {
            rasterizer: Box::new(ScriptedRasterizer),
            ocr: Arc::new(ScriptedOcr {
                scripts: Arc::clone(&self.scripts),
            }),
            compressor,
        };
        Arc::new(Pipeline::new(Arc::new(config), collaborators).with_clock(fixed_clock))
    }

    /// Sorted file names in `output/{year}`.
    pub fn filed(&self, year: i32) -> Vec<String> {
        list_names(&self.output_dir.join(year.to_string()))
    }

    pub fn in_review(&self) -> Vec<String> {
        list_names(&self.review_dir)
    }

    pub fn remaining_input(&self) -> Vec<String> {
        list_names(&self.input_dir)
    }
}

fn list_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
