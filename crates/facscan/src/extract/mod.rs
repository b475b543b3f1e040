//! Field extraction from recognized zone text.

pub mod invoice_number;
pub mod normalize;
pub mod tax_id;

pub use invoice_number::{
    is_plausible_invoice_number, Candidate, InvoiceNumberExtractor, Strategy,
};
pub use normalize::{normalize, Target, TextNormalizer};
pub use tax_id::{has_valid_check_digit, rut_check_digit, TaxIdExtractor};

/// Reported when no RUT could be read.
pub const UNKNOWN_TAX_ID: &str = "desconocido";

/// Filename placeholders for a field that is missing while the other one was found.
pub const TAX_ID_PLACEHOLDER: &str = "rut_desconocido";
pub const INVOICE_NUMBER_PLACEHOLDER: &str = "factura_desconocida";

/// Outcome of looking for one field. Absence is expected, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction<T> {
    Found(T),
    NotFound,
}

impl<T> Extraction<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Extraction::Found(_))
    }

    pub fn as_ref(&self) -> Extraction<&T> {
        match self {
            Extraction::Found(value) => Extraction::Found(value),
            Extraction::NotFound => Extraction::NotFound,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Extraction::Found(value) => Some(value),
            Extraction::NotFound => None,
        }
    }
}

impl Extraction<String> {
    pub fn as_str_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self {
            Extraction::Found(value) => value,
            Extraction::NotFound => fallback,
        }
    }
}

impl<T> From<Option<T>> for Extraction<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Extraction::Found(v),
            None => Extraction::NotFound,
        }
    }
}

/// Both fields of one document. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutcome {
    pub tax_id: Extraction<String>,
    pub invoice_number: Extraction<String>,
}

impl ExtractionOutcome {
    pub fn new(tax_id: Extraction<String>, invoice_number: Extraction<String>) -> Self {
        Self {
            tax_id,
            invoice_number,
        }
    }

    /// At least one field was read.
    pub fn is_identified(&self) -> bool {
        self.tax_id.is_found() || self.invoice_number.is_found()
    }

    /// `{branch}_{taxId}_factura_{invoiceNumber}_{year}`, without extension
    /// or collision suffix. `None` when neither field was read.
    pub fn filed_name(&self, branch: &str, year: i32) -> Option<String> {
        if !self.is_identified() {
            return None;
        }
        Some(format!(
            "{}_{}_factura_{}_{}",
            branch,
            self.tax_id.as_str_or(TAX_ID_PLACEHOLDER),
            self.invoice_number.as_str_or(INVOICE_NUMBER_PLACEHOLDER),
            year
        ))
    }
}

/// Normalizes raw zone text per target and runs both extractors.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldExtractor {
    normalizer: TextNormalizer,
    tax_id: TaxIdExtractor,
    invoice_number: InvoiceNumberExtractor,
}

impl FieldExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract(&self, raw_text: &str) -> ExtractionOutcome {
        let tax_text = self.normalizer.normalize(raw_text, Target::TaxId);
        let invoice_text = self.normalizer.normalize(raw_text, Target::InvoiceNumber);

        ExtractionOutcome::new(
            self.tax_id.extract(&tax_text),
            self.invoice_number.extract(&invoice_text),
        )
    }
}
