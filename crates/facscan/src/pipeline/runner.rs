use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDateTime};
use tracing::{debug, info, info_span, warn};

use crate::extract::{
    ExtractionOutcome, FieldExtractor, INVOICE_NUMBER_PLACEHOLDER, UNKNOWN_TAX_ID,
};
use crate::processor::{
    Compressor, GhostscriptCompressor, NoopCompressor, OcrEngine, PdftoppmRasterizer, Rasterizer,
    TextRecognizer, ZoneCropper,
};
use crate::sanitize;
use crate::storage::FileStorage;
use crate::worker::job::{Job, JobResult};

use super::config::PipelineConfig;
use super::context::{DocumentState, PipelineContext};
use super::error::{PipelineError, PipelineWarning};

/// External programs and engines the pipeline talks to.
pub struct Collaborators {
    pub rasterizer: Box<dyn Rasterizer>,
    pub ocr: Arc<dyn OcrEngine>,
    pub compressor: Box<dyn Compressor>,
}

impl Collaborators {
    /// pdftoppm + the given OCR engine + Ghostscript (or nothing when
    /// compression is disabled).
    pub fn production(config: &PipelineConfig, ocr: Arc<dyn OcrEngine>) -> Self {
        let compressor: Box<dyn Compressor> = if config.compression.enabled {
            Box::new(GhostscriptCompressor::from_config(&config.compression))
        } else {
            Box::new(NoopCompressor)
        };

        Self {
            rasterizer: Box::new(PdftoppmRasterizer::new(config.ocr_dpi)),
            ocr,
            compressor,
        }
    }
}

/// Result of a dry run over one PDF.
#[derive(Debug, Clone)]
pub struct Identification {
    pub raw_text: String,
    pub mean_confidence: f32,
    pub outcome: ExtractionOutcome,
    /// Base name the document would be filed under; `None` means manual review.
    pub filed_name: Option<String>,
}

/// Classifies one document at a time. Shared by every worker.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    rasterizer: Box<dyn Rasterizer>,
    cropper: ZoneCropper,
    recognizer: TextRecognizer,
    extractor: FieldExtractor,
    compressor: Box<dyn Compressor>,
    storage: FileStorage,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl Pipeline {
    pub fn new(config: Arc<PipelineConfig>, collaborators: Collaborators) -> Self {
        let recognizer = TextRecognizer::new(collaborators.ocr)
            .with_debug_directory(config.debug_directory.clone());
        let storage = FileStorage::new(&config.output_directory, &config.manual_review_directory);

        Self {
            cropper: ZoneCropper::new(config.zone),
            rasterizer: collaborators.rasterizer,
            recognizer,
            extractor: FieldExtractor::new(),
            compressor: collaborators.compressor,
            storage,
            clock: local_now,
            config,
        }
    }

    /// Production constructor.
    pub fn from_config(config: Arc<PipelineConfig>, ocr: Arc<dyn OcrEngine>) -> Self {
        let collaborators = Collaborators::production(&config, ocr);
        Self::new(config, collaborators)
    }

    /// Overrides the time source used for the filing year and the
    /// manual-review timestamp.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline for a single document.
    ///
    /// Never fails: every per-document error ends in manual review, or in a
    /// `Failed` result when even that move is impossible.
    pub fn run(&self, mut ctx: PipelineContext) -> (JobResult, PipelineContext) {
        let filename = sanitize::redact_path(&ctx.job.source_path);
        let _pipeline_span = info_span!("pipeline",
            job_id = %ctx.job.id,
            filename = %filename,
        )
        .entered();

        if let Err(e) = self.identify_steps(&mut ctx) {
            return self.route_to_manual_review(ctx, e);
        }

        let now = (self.clock)();
        let outcome = match ctx.outcome.clone() {
            Some(outcome) => outcome,
            None => return self.route_to_manual_review(ctx, PipelineError::NoExtraction),
        };

        let base_name = match outcome.filed_name(&self.config.branch, now.year()) {
            Some(base_name) => base_name,
            None => return self.route_to_manual_review(ctx, PipelineError::NoExtraction),
        };

        {
            let _step = info_span!("compress").entered();
            self.step_compress(&mut ctx);
        }

        let _step = info_span!("route").entered();
        match self.storage.file_invoice(&ctx.job.source_path, now.year(), &base_name) {
            Ok(path) => {
                info!(
                    rut = outcome.tax_id.as_str_or(UNKNOWN_TAX_ID),
                    folio = outcome.invoice_number.as_str_or(INVOICE_NUMBER_PLACEHOLDER),
                    "Filed {} -> {}",
                    filename,
                    sanitize::redact_path(&path)
                );
                ctx.output_path = Some(path.clone());
                ctx.advance(DocumentState::Filed);
                (JobResult::filed(&ctx.job, path, outcome), ctx)
            }
            Err(e) => {
                warn!("Filing failed, sending to manual review: {}", e);
                ctx.warnings.push(PipelineWarning::FilingFailed {
                    error: e.to_string(),
                });
                self.route_to_manual_review(ctx, PipelineError::Storage(e))
            }
        }
    }

    /// Dry run: everything up to extraction, nothing is moved or compressed.
    pub fn identify(&self, pdf_path: &Path) -> Result<Identification, PipelineError> {
        let mut ctx = PipelineContext::new(Job::new(pdf_path.to_path_buf()));
        self.identify_steps(&mut ctx)?;

        let outcome = ctx.outcome.take().ok_or(PipelineError::NoExtraction)?;
        let year = (self.clock)().year();
        Ok(Identification {
            raw_text: ctx.raw_text.take().unwrap_or_default(),
            mean_confidence: ctx
                .recognition
                .as_ref()
                .map(|r| r.mean_confidence())
                .unwrap_or(0.0),
            filed_name: outcome.filed_name(&self.config.branch, year),
            outcome,
        })
    }

    fn identify_steps(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        {
            let _step = info_span!("rasterize").entered();
            self.step_rasterize(ctx)?;
        }
        {
            let _step = info_span!("crop_zone").entered();
            self.step_crop_zone(ctx)?;
        }
        {
            let _step = info_span!("recognize").entered();
            self.step_recognize(ctx)?;
        }
        {
            let _step = info_span!("extract").entered();
            self.step_extract(ctx);
        }
        Ok(())
    }

    fn step_rasterize(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let page = self.rasterizer.render_first_page(&ctx.job.source_path)?;
        ctx.page_image = Some(page);
        ctx.advance(DocumentState::Rasterized);
        Ok(())
    }

    fn step_crop_zone(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let page = ctx.page_image.take().unwrap_or_default();
        let zone = self.cropper.crop(&page)?;
        debug!(width = zone.width(), height = zone.height(), "zone cropped");
        ctx.zone = Some(zone);
        ctx.advance(DocumentState::ZoneCropped);
        Ok(())
    }

    fn step_recognize(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let Some(zone) = ctx.zone.take() else {
            return Err(PipelineError::Processing(
                crate::error::ProcessError::InvalidImage("no zone to recognize".to_string()),
            ));
        };
        let artifact_name = sanitize::file_stem(&ctx.job.source_path);
        let recognition = self.recognizer.recognize(&zone, &artifact_name)?;

        ctx.raw_text = Some(recognition.raw_text());
        ctx.recognition = Some(recognition);
        ctx.advance(DocumentState::OcrDone);
        Ok(())
    }

    fn step_extract(&self, ctx: &mut PipelineContext) {
        let raw_text = ctx.raw_text.as_deref().unwrap_or_default();
        let outcome = self.extractor.extract(raw_text);
        debug!(
            rut = outcome.tax_id.as_str_or(UNKNOWN_TAX_ID),
            folio = outcome.invoice_number.as_str_or(""),
            "fields extracted"
        );
        ctx.outcome = Some(outcome);
        ctx.advance(DocumentState::Extracted);
    }

    fn step_compress(&self, ctx: &mut PipelineContext) {
        match self.compressor.compress(&ctx.job.source_path) {
            Ok(report) => {
                debug!(
                    original_bytes = report.original_bytes,
                    final_bytes = report.final_bytes,
                    "compression finished"
                );
                ctx.compression = Some(report);
            }
            Err(e) => {
                warn!("Compression failed, keeping original: {}", e);
                ctx.warnings.push(PipelineWarning::CompressionFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    fn route_to_manual_review(
        &self,
        mut ctx: PipelineContext,
        reason: PipelineError,
    ) -> (JobResult, PipelineContext) {
        let _step = info_span!("route").entered();
        let filename = sanitize::redact_path(&ctx.job.source_path);
        let now = (self.clock)();
        let ocr_failure = matches!(&reason, PipelineError::Processing(e) if e.is_ocr_failure());

        match self.storage.send_to_manual_review(&ctx.job.source_path, now) {
            Ok(path) => {
                warn!(
                    reason = %reason,
                    ocr_failure,
                    "Sent {} to manual review as {}",
                    filename,
                    sanitize::redact_path(&path)
                );
                ctx.output_path = Some(path.clone());
                ctx.advance(DocumentState::ManualReview);
                let result = JobResult::manual_review(
                    &ctx.job,
                    path,
                    ctx.outcome.clone(),
                    reason.to_string(),
                );
                (result, ctx)
            }
            Err(e) => {
                tracing::error!(
                    reason = %reason,
                    "Could not move {} to manual review: {}",
                    filename,
                    e
                );
                let result = JobResult::failure(&ctx.job, format!("{}; {}", reason, e));
                (result, ctx)
            }
        }
    }

    /// Where the manual-review copy of a document ends up.
    pub fn manual_review_directory(&self) -> PathBuf {
        self.storage.manual_review_directory().to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionConfig;
    use crate::error::{CompressionError, ProcessError};
    use crate::extract::Extraction;
    use crate::processor::{BoundingBox, CompressionReport, TextFragment, ZoneBounds};
    use crate::worker::job::Routing;
    use chrono::NaiveDate;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    struct BlankPage;

    impl Rasterizer for BlankPage {
        fn render_page(&self, _pdf_path: &Path, _page: u32) -> Result<Vec<u8>, ProcessError> {
            let mut png = Vec::new();
            DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 300, Rgb([255, 255, 255])))
                .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
                .unwrap();
            Ok(png)
        }
    }

    struct CorruptPage;

    impl Rasterizer for CorruptPage {
        fn render_page(&self, _pdf_path: &Path, _page: u32) -> Result<Vec<u8>, ProcessError> {
            Ok(b"\x89PNG broken".to_vec())
        }
    }

    struct FixedText(&'static str);

    impl OcrEngine for FixedText {
        fn recognize(&self, _png: &[u8]) -> Result<Vec<TextFragment>, ProcessError> {
            Ok(vec![TextFragment::new(
                self.0,
                0.9,
                BoundingBox::new(0, 0, 100, 10),
            )])
        }
    }

    struct FailingCompressor;

    impl Compressor for FailingCompressor {
        fn compress(&self, _pdf_path: &Path) -> Result<CompressionReport, CompressionError> {
            Err(CompressionError::Failed {
                status: "exit status: 1".to_string(),
                stderr: "boom".to_string(),
            })
        }
    }

    fn fixed_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
    }

    fn setup(
        rasterizer: Box<dyn Rasterizer>,
        text: &'static str,
        compressor: Box<dyn Compressor>,
    ) -> (TempDir, Pipeline, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("input");
        std::fs::create_dir_all(&input).unwrap();
        let source = input.join("scan.pdf");
        std::fs::write(&source, b"%PDF-1.4 fake").unwrap();

        let config = Arc::new(PipelineConfig {
            input_directory: input,
            output_directory: temp_dir.path().join("output"),
            manual_review_directory: temp_dir.path().join("review"),
            debug_directory: None,
            branch: "local".to_string(),
            ocr_dpi: 300,
            zone: ZoneBounds::default(),
            compression: CompressionConfig::default(),
        });
        let pipeline = Pipeline::new(
            config,
            Collaborators {
                rasterizer,
                ocr: Arc::new(FixedText(text)),
                compressor,
            },
        )
        .with_clock(fixed_clock);

        (temp_dir, pipeline, source)
    }

    #[test]
    fn test_identified_document_is_filed() {
        let (temp_dir, pipeline, source) = setup(
            Box::new(BlankPage),
            "FACTURA ELECTRONICA N° 123456 RUT: 76.466.343-8",
            Box::new(NoopCompressor),
        );

        let (result, ctx) = pipeline.run(PipelineContext::new(Job::new(source.clone())));

        assert_eq!(result.routing, Routing::Filed);
        assert_eq!(ctx.state, DocumentState::Filed);
        assert_eq!(
            result.output_path.unwrap(),
            temp_dir
                .path()
                .join("output/2024/local_76466343-8_factura_123456_2024.pdf")
        );
        assert!(!source.exists());
    }

    #[test]
    fn test_unreadable_fields_go_to_manual_review() {
        let (temp_dir, pipeline, source) =
            setup(Box::new(BlankPage), "gracias por su compra", Box::new(NoopCompressor));

        let (result, ctx) = pipeline.run(PipelineContext::new(Job::new(source)));

        assert_eq!(result.routing, Routing::ManualReview);
        assert_eq!(ctx.state, DocumentState::ManualReview);
        assert_eq!(
            result.output_path.unwrap(),
            temp_dir
                .path()
                .join("review/documento_escaneado_20240601_1030.pdf")
        );
        let outcome = result.outcome.unwrap();
        assert_eq!(outcome.tax_id, Extraction::NotFound);
        assert_eq!(outcome.invoice_number, Extraction::NotFound);
    }

    #[test]
    fn test_corrupt_page_goes_to_manual_review_before_ocr() {
        let (_temp_dir, pipeline, source) =
            setup(Box::new(CorruptPage), "NRO 123456", Box::new(NoopCompressor));

        let (result, ctx) = pipeline.run(PipelineContext::new(Job::new(source)));

        assert_eq!(result.routing, Routing::ManualReview);
        assert!(result.outcome.is_none());
        assert!(ctx.raw_text.is_none());
        assert!(result.error.unwrap().contains("Invalid page image"));
    }

    #[test]
    fn test_compression_failure_does_not_block_filing() {
        let (_temp_dir, pipeline, source) =
            setup(Box::new(BlankPage), "NRO 123456", Box::new(FailingCompressor));

        let (result, ctx) = pipeline.run(PipelineContext::new(Job::new(source)));

        assert_eq!(result.routing, Routing::Filed);
        assert!(matches!(
            ctx.warnings.as_slice(),
            [PipelineWarning::CompressionFailed { .. }]
        ));
        assert_eq!(
            std::fs::read(result.output_path.unwrap()).unwrap(),
            b"%PDF-1.4 fake"
        );
    }

    #[test]
    fn test_missing_source_is_a_failure() {
        let (_temp_dir, pipeline, source) =
            setup(Box::new(CorruptPage), "", Box::new(NoopCompressor));
        std::fs::remove_file(&source).unwrap();

        let (result, _ctx) = pipeline.run(PipelineContext::new(Job::new(source)));
        assert_eq!(result.routing, Routing::Failed);
    }

    #[test]
    fn test_identify_is_a_dry_run() {
        let (_temp_dir, pipeline, source) = setup(
            Box::new(BlankPage),
            "RUT 76.466.343-8",
            Box::new(FailingCompressor),
        );

        let identification = pipeline.identify(&source).unwrap();

        assert_eq!(identification.raw_text, "RUT 76.466.343-8");
        assert_eq!(
            identification.filed_name.as_deref(),
            Some("local_76466343-8_factura_factura_desconocida_2024")
        );
        assert!(source.exists());
    }
}
