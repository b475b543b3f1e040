use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub input_directory: String,
    pub output_directory: String,
    #[serde(default = "default_manual_review_directory")]
    pub manual_review_directory: String,
    #[serde(default = "default_log_directory")]
    pub log_directory: String,
    /// Cropped zones are written here for visual audit when set.
    #[serde(default)]
    pub debug_directory: Option<String>,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub zone: ZoneConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub scanner: Option<ScannerConfig>,
}

fn default_manual_review_directory() -> String {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .map(|p| {
            p.join("facturas_por_revisar")
                .to_string_lossy()
                .to_string()
        })
        .unwrap_or_else(|| "facturas_por_revisar".to_string())
}

fn default_log_directory() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("facscan").join("logs").to_string_lossy().to_string())
        .unwrap_or_else(|| "logs".to_string())
}

fn default_branch() -> String {
    "local".to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get().clamp(1, 4)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_language")]
    pub language: String,
    /// Directory holding `<language>.traineddata`; Tesseract's default when unset.
    #[serde(default)]
    pub datapath: Option<String>,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_language() -> String {
    "spa".to_string()
}

fn default_dpi() -> u32 {
    300
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            datapath: None,
            dpi: default_dpi(),
        }
    }
}

/// Fractional rectangle of the page holding the RUT / folio box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            x1: 0.58,
            y1: 0.0,
            x2: 0.98,
            y2: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_compressor")]
    pub executable: String,
    #[serde(default = "default_compression_dpi")]
    pub dpi: u32,
    #[serde(default)]
    pub preset: QualityPreset,
}

fn default_true() -> bool {
    true
}

fn default_compressor() -> String {
    if cfg!(target_os = "windows") {
        "gswin64c".to_string()
    } else {
        "gs".to_string()
    }
}

fn default_compression_dpi() -> u32 {
    150
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            executable: default_compressor(),
            dpi: default_compression_dpi(),
            preset: QualityPreset::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Screen,
    #[default]
    Ebook,
    Printer,
    Prepress,
}

impl QualityPreset {
    /// Value for Ghostscript's `-dPDFSETTINGS`.
    pub fn pdf_settings(&self) -> &'static str {
        match self {
            Self::Screen => "/screen",
            Self::Ebook => "/ebook",
            Self::Printer => "/printer",
            Self::Prepress => "/prepress",
        }
    }
}

/// External acquisition command. Its stdout must be a single raster image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}
