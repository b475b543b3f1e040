pub mod compress;
pub mod device;
pub mod ocr;
pub mod pdf;
pub mod zone;

pub use compress::{CompressionReport, Compressor, GhostscriptCompressor, NoopCompressor};
pub use device::{scan_filename, CommandScanDevice, ScanDevice, ScanOutcome};
pub use ocr::{
    BoundingBox, OcrEngine, RecognitionResult, TesseractEngine, TextFragment, TextRecognizer,
};
pub use pdf::{image_to_pdf, PdftoppmRasterizer, Rasterizer};
pub use zone::{Zone, ZoneBounds, ZoneCropper};
