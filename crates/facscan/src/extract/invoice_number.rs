//! Folio (invoice number) extraction.
//!
//! Every line is tried against the strategies in priority order and
//! contributes at most one candidate. The longest surviving candidate wins;
//! equal lengths keep the first one found. Length is a tunable heuristic, not
//! a confidence score.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::Extraction;

static EXACT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"NRO[\s.:#\-]{1,5}([0-9OQBILSZDE]{5,12})\b").unwrap()
});

static TOLERANT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bN\W{0,3}(?:R?O)?\W{0,4}([0-9OQBILSZDE]{5,12})\b").unwrap()
});

static AFTER_ELECTRONIC_INVOICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"FACTURA\s+ELECTRONICA.{0,10}?\b([0-9OQBILSZDE]{5,12})\b").unwrap()
});

static STANDALONE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9OQBILSZDE]{5,12}$").unwrap());

static PHONE_SHAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+?56\d{2}\d{4,}$").unwrap());

/// Letter to digit remapping applied to the winning candidate only.
pub const INVOICE_CONFUSABLES: &[(char, char)] = &[
    ('O', '0'),
    ('Q', '0'),
    ('B', '8'),
    ('I', '1'),
    ('L', '1'),
    ('S', '5'),
    ('Z', '2'),
    ('D', '0'),
    ('E', '8'),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ExactPrefix,
    TolerantPrefix,
    AfterElectronicInvoice,
    NextLineAfterInvoice,
    NumericLine,
    GlobalBackstop,
}

impl Strategy {
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::ExactPrefix => "NRO: exacto",
            Strategy::TolerantPrefix => "Prefijo tolerante",
            Strategy::AfterElectronicInvoice => "Tras FACTURA ELECTRONICA",
            Strategy::NextLineAfterInvoice => "Linea siguiente a FACTURA",
            Strategy::NumericLine => "Linea numerica",
            Strategy::GlobalBackstop => "Respaldo global",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub value: String,
    pub strategy: Strategy,
}

/// Rejects lengths outside 4..=12, Chilean phone numbers and tokens made of
/// letters only.
pub fn is_plausible_invoice_number(token: &str) -> bool {
    let len = token.chars().count();
    (4..=12).contains(&len)
        && !PHONE_SHAPE.is_match(token)
        && token.chars().any(|c| c.is_ascii_digit())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InvoiceNumberExtractor;

impl InvoiceNumberExtractor {
    pub fn new() -> Self {
        Self
    }

    /// All candidates in discovery order, before ranking.
    pub fn candidates(&self, text: &str) -> Vec<Candidate> {
        let lines: Vec<&str> = text.lines().collect();
        let mut candidates = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            let next_line = lines.get(index + 1).copied();
            if let Some(candidate) = line_candidate(line, next_line) {
                candidates.push(candidate);
            }
        }

        if candidates.is_empty() {
            candidates.extend(
                standalone_tokens(text).map(|value| Candidate {
                    value: value.to_string(),
                    strategy: Strategy::GlobalBackstop,
                }),
            );
        }

        candidates
    }

    /// Picks the folio out of text normalized for
    /// [`Target::InvoiceNumber`](super::Target::InvoiceNumber).
    pub fn extract(&self, text: &str) -> Extraction<String> {
        let candidates = self.candidates(text);

        let best = candidates.iter().fold(None::<&Candidate>, |best, c| match best {
            Some(b) if b.value.len() >= c.value.len() => Some(b),
            _ => Some(c),
        });

        match best {
            Some(candidate) => {
                let value = remap_confusables(&candidate.value);
                debug!(
                    candidates = candidates.len(),
                    strategy = candidate.strategy.label(),
                    folio = %value,
                    "invoice number selected"
                );
                Extraction::Found(value)
            }
            None => Extraction::NotFound,
        }
    }
}

fn line_candidate(line: &str, next_line: Option<&str>) -> Option<Candidate> {
    let inline = [
        (&*EXACT_PREFIX, Strategy::ExactPrefix),
        (&*TOLERANT_PREFIX, Strategy::TolerantPrefix),
        (&*AFTER_ELECTRONIC_INVOICE, Strategy::AfterElectronicInvoice),
    ];

    for (pattern, strategy) in inline {
        let found = pattern
            .captures_iter(line)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .find(|token| is_plausible_invoice_number(token));
        if let Some(value) = found {
            return Some(Candidate {
                value: value.to_string(),
                strategy,
            });
        }
    }

    if line.contains("FACTURA") {
        if let Some(value) = next_line.and_then(|next| standalone_tokens(next).next()) {
            return Some(Candidate {
                value: value.to_string(),
                strategy: Strategy::NextLineAfterInvoice,
            });
        }
    }

    let trimmed = line.trim();
    if STANDALONE_TOKEN.is_match(trimmed) && is_plausible_invoice_number(trimmed) {
        return Some(Candidate {
            value: trimmed.to_string(),
            strategy: Strategy::NumericLine,
        });
    }

    None
}

fn standalone_tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
        .filter(|token| STANDALONE_TOKEN.is_match(token) && is_plausible_invoice_number(token))
}

fn remap_confusables(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            INVOICE_CONFUSABLES
                .iter()
                .find(|(from, _)| *from == c)
                .map(|(_, to)| *to)
                .unwrap_or(c)
        })
        .collect()
}
