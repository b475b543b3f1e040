//! Chilean RUT extraction.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use super::Extraction;

// Both patterns are guarded by a non-digit (or the text edge) on either side
// so a RUT is never cut out of a longer digit run. Letters may touch it.

/// Body with optional thousands dots, dash, check digit.
static RUT_STRICT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)(\d{1,2}\.?\d{3}\.?\d{3}-[\dkK])(?:$|[^\dkK])").unwrap()
});

/// Four digit groups separated by up to two noise characters.
static RUT_TOLERANT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)(\d{1,2})\D{0,2}(\d{3})\D{0,2}(\d{3})\D{0,2}([\dkK])(?:$|[^\dkK])")
        .unwrap()
});

#[derive(Debug, Clone, Copy, Default)]
pub struct TaxIdExtractor;

impl TaxIdExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Finds the first RUT in text normalized for [`Target::TaxId`](super::Target::TaxId).
    ///
    /// Returns the canonical `NNNNNNNN-X` form: no dots, upper-case check digit.
    pub fn extract(&self, text: &str) -> Extraction<String> {
        let found = RUT_STRICT
            .captures(text)
            .map(|caps| canonical(&caps[1].replace('.', "")))
            .or_else(|| {
                RUT_TOLERANT.captures(text).map(|caps| {
                    canonical(&format!("{}{}{}-{}", &caps[1], &caps[2], &caps[3], &caps[4]))
                })
            });

        match found {
            Some(rut) => {
                if !has_valid_check_digit(&rut) {
                    warn!(rut = %rut, "RUT check digit does not match its body");
                }
                Extraction::Found(rut)
            }
            None => Extraction::NotFound,
        }
    }
}

fn canonical(rut: &str) -> String {
    rut.to_uppercase()
}

/// Modulo-11 verifier for a RUT body. Returns `'0'..='9'` or `'K'`.
pub fn rut_check_digit(body: &str) -> Option<char> {
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let sum: u32 = body
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .zip([2u32, 3, 4, 5, 6, 7].into_iter().cycle())
        .map(|(digit, weight)| digit * weight)
        .sum();

    match 11 - (sum % 11) {
        11 => Some('0'),
        10 => Some('K'),
        n => char::from_digit(n, 10),
    }
}

/// True when a canonical `BODY-X` string carries the right verifier.
pub fn has_valid_check_digit(rut: &str) -> bool {
    let Some((body, check)) = rut.split_once('-') else {
        return false;
    };
    let mut check_chars = check.chars();
    match (check_chars.next(), check_chars.next()) {
        (Some(c), None) => rut_check_digit(body) == Some(c.to_ascii_uppercase()),
        _ => false,
    }
}
