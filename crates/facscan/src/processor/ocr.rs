use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, unbounded, Sender};
use tracing::{debug, warn};

use crate::error::ProcessError;
use crate::processor::zone::Zone;

/// Pixel box of a recognized fragment, relative to the zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> u32 {
        self.top.saturating_add(self.height)
    }

    pub fn right(&self) -> u32 {
        self.left.saturating_add(self.width)
    }

    fn union(&self, other: &BoundingBox) -> BoundingBox {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        BoundingBox::new(left, top, right - left, bottom - top)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    /// 0.0 to 1.0
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            confidence,
            bbox,
        }
    }
}

/// Fragments of one zone in the order the engine emitted them.
#[derive(Debug, Clone, Default)]
pub struct RecognitionResult {
    pub fragments: Vec<TextFragment>,
}

impl RecognitionResult {
    pub fn new(fragments: Vec<TextFragment>) -> Self {
        Self { fragments }
    }

    /// Joins fragments with a space, starting a new line whenever a fragment
    /// begins at or below the bottom of the previous one.
    pub fn raw_text(&self) -> String {
        let mut text = String::new();
        let mut previous: Option<&BoundingBox> = None;

        for fragment in &self.fragments {
            let piece = fragment.text.trim();
            if piece.is_empty() {
                continue;
            }
            if let Some(prev) = previous {
                if fragment.bbox.top >= prev.bottom() && prev.height > 0 {
                    text.push('\n');
                } else {
                    text.push(' ');
                }
            }
            text.push_str(piece);
            previous = Some(&fragment.bbox);
        }

        text
    }

    pub fn mean_confidence(&self) -> f32 {
        if self.fragments.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.fragments.iter().map(|f| f.confidence).sum();
        sum / self.fragments.len() as f32
    }
}

/// The text-recognition oracle: PNG bytes in, fragments out.
///
/// Implementations must tolerate concurrent calls from pool workers,
/// serializing internally when the underlying engine is not reentrant.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, png: &[u8]) -> Result<Vec<TextFragment>, ProcessError>;
}

struct OcrRequest {
    png: Vec<u8>,
    reply: Sender<Result<Vec<TextFragment>, ProcessError>>,
}

/// Tesseract behind a request queue.
///
/// The `LepTess` instance is built once on a dedicated thread and never
/// reloaded; every call is serialized through the queue. The thread exits
/// when the last handle is dropped.
#[derive(Clone)]
pub struct TesseractEngine {
    requests: Sender<OcrRequest>,
}

impl TesseractEngine {
    pub fn spawn(language: &str, datapath: Option<&str>) -> Result<Self, ProcessError> {
        let language = language.to_string();
        let datapath = datapath.map(str::to_string);
        let (requests, inbox) = unbounded::<OcrRequest>();
        let (ready_tx, ready_rx) = bounded::<Result<(), ProcessError>>(1);

        thread::Builder::new()
            .name("tesseract".to_string())
            .spawn(move || {
                let mut lt = match leptess::LepTess::new(datapath.as_deref(), &language) {
                    Ok(lt) => {
                        let _ = ready_tx.send(Ok(()));
                        lt
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(ProcessError::OcrFailed(format!(
                            "Failed to initialize Tesseract ({}): {}",
                            language, e
                        ))));
                        return;
                    }
                };

                for request in inbox {
                    let result = run_tesseract(&mut lt, &request.png);
                    let _ = request.reply.send(result);
                }
            })
            .map_err(|e| ProcessError::OcrFailed(format!("Failed to start OCR thread: {}", e)))?;

        ready_rx.recv().map_err(|_| {
            ProcessError::OcrFailed("OCR thread exited during startup".to_string())
        })??;

        Ok(Self { requests })
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, png: &[u8]) -> Result<Vec<TextFragment>, ProcessError> {
        let (reply, response) = bounded(1);
        self.requests
            .send(OcrRequest {
                png: png.to_vec(),
                reply,
            })
            .map_err(|_| ProcessError::OcrFailed("OCR thread is gone".to_string()))?;

        response
            .recv()
            .map_err(|_| ProcessError::OcrFailed("OCR thread dropped the request".to_string()))?
    }
}

fn run_tesseract(
    lt: &mut leptess::LepTess,
    png: &[u8],
) -> Result<Vec<TextFragment>, ProcessError> {
    lt.set_image_from_mem(png)
        .map_err(|e| ProcessError::OcrFailed(format!("Failed to set image for OCR: {}", e)))?;

    let tsv = lt
        .get_tsv_text(0)
        .map_err(|e| ProcessError::OcrFailed(format!("OCR failed: {}", e)))?;

    Ok(parse_tsv(&tsv))
}

/// Groups Tesseract TSV word rows (level 5) into one fragment per text line.
///
/// Columns: level, page, block, par, line, word, left, top, width, height, conf, text.
pub fn parse_tsv(tsv: &str) -> Vec<TextFragment> {
    let mut lines: Vec<((u32, u32, u32, u32), Vec<String>, Vec<f32>, BoundingBox)> = Vec::new();

    for row in tsv.lines() {
        let cols: Vec<&str> = row.splitn(12, '\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }

        let num = |i: usize| cols[i].trim().parse::<u32>().ok();
        let (Some(page), Some(block), Some(par), Some(line)) = (num(1), num(2), num(3), num(4))
        else {
            continue;
        };
        let (Some(left), Some(top), Some(width), Some(height)) = (num(6), num(7), num(8), num(9))
        else {
            continue;
        };
        let conf: f32 = cols[10].trim().parse().unwrap_or(-1.0);
        let word = cols[11].trim();
        if word.is_empty() || conf < 0.0 {
            continue;
        }

        let key = (page, block, par, line);
        let bbox = BoundingBox::new(left, top, width, height);
        match lines.iter_mut().find(|(k, ..)| *k == key) {
            Some((_, words, confs, line_box)) => {
                words.push(word.to_string());
                confs.push(conf);
                *line_box = line_box.union(&bbox);
            }
            None => lines.push((key, vec![word.to_string()], vec![conf], bbox)),
        }
    }

    lines
        .into_iter()
        .map(|(_, words, confs, bbox)| {
            let mean = confs.iter().sum::<f32>() / confs.len() as f32;
            TextFragment::new(words.join(" "), (mean / 100.0).clamp(0.0, 1.0), bbox)
        })
        .collect()
}

/// Wraps the shared OCR engine for the pipeline.
///
/// Constructed once per process and handed to every worker; the engine is
/// never reloaded.
pub struct TextRecognizer {
    engine: Arc<dyn OcrEngine>,
    debug_directory: Option<PathBuf>,
}

impl TextRecognizer {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            engine,
            debug_directory: None,
        }
    }

    pub fn with_debug_directory(mut self, directory: Option<PathBuf>) -> Self {
        self.debug_directory = directory;
        self
    }

    /// Recognizes one zone. `artifact_name` keys the optional debug PNG.
    ///
    /// An engine error or an empty result are both OCR failures.
    pub fn recognize(
        &self,
        zone: &Zone,
        artifact_name: &str,
    ) -> Result<RecognitionResult, ProcessError> {
        let png = zone.to_png()?;

        if let Some(ref dir) = self.debug_directory {
            write_debug_artifact(dir, artifact_name, &png);
        }

        let fragments = self.engine.recognize(&png)?;
        let result = RecognitionResult::new(fragments);

        if result.raw_text().trim().is_empty() {
            return Err(ProcessError::EmptyText);
        }

        debug!(
            fragments = result.fragments.len(),
            confidence = result.mean_confidence(),
            "zone recognized"
        );
        Ok(result)
    }
}

fn write_debug_artifact(directory: &Path, name: &str, png: &[u8]) {
    let path = directory.join(format!("{}_zona.png", name));
    let written = std::fs::create_dir_all(directory).and_then(|_| std::fs::write(&path, png));
    if let Err(e) = written {
        warn!("Failed to write debug zone {}: {}", path.display(), e);
    }
}
