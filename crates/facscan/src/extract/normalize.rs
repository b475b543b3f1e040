//! Deterministic clean-up of raw OCR text before field extraction.
//!
//! Each target has its own substitution rules. Normalization is idempotent:
//! feeding already normalized text back in returns it unchanged.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    TaxId,
    InvoiceNumber,
}

/// Literal replacements that fold the many OCR readings of the folio label
/// into `NRO`. Applied in table order on upper-cased text, so an entry must
/// come before any shorter entry it contains (`FOLIO N°` before `FOLIO`).
///
/// Entries starting with a space only match at a word start; every line is
/// padded with one leading space while the table runs.
pub const INVOICE_LABEL_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("FOLIO N°", "NRO"),
    ("FOLIO Nº", "NRO"),
    ("FOLIO:", "NRO:"),
    ("FOLIO", "NRO"),
    ("NÚMERO", "NRO"),
    ("NUMERO", "NRO"),
    ("NRO.:", "NRO:"),
    ("NRO.", "NRO "),
    ("N°:", "NRO:"),
    ("Nº:", "NRO:"),
    ("N°.", "NRO "),
    ("Nº.", "NRO "),
    ("N.º", "NRO"),
    ("N°", "NRO"),
    ("Nº", "NRO"),
    ("N˚", "NRO"),
    (" NO.", " NRO"),
    (" NO:", " NRO:"),
    ("ELECTRÓNICA", "ELECTRONICA"),
];

/// Letters OCR commonly returns in place of digits inside a tax ID.
pub const TAX_ID_CONFUSABLES: &[(char, char)] = &[
    ('O', '0'),
    ('o', '0'),
    ('I', '1'),
    ('l', '1'),
    ('|', '1'),
    ('B', '8'),
    ('Z', '2'),
    ('z', '2'),
    ('G', '6'),
];

/// Hyphen look-alikes folded into `-`.
pub const DASH_VARIANTS: &[char] = &['‐', '‑', '‒', '–', '—', '―', '−'];

const MAX_PASSES: usize = 8;

/// Normalizes `raw` for one extraction target. Pure; no I/O.
pub fn normalize(raw: &str, target: Target) -> String {
    match target {
        Target::TaxId => fixpoint(raw, tax_id_pass),
        Target::InvoiceNumber => fixpoint(raw, invoice_pass),
    }
}

/// Stateless handle over [`normalize`] for callers that inject collaborators.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn normalize(&self, raw: &str, target: Target) -> String {
        normalize(raw, target)
    }
}

fn fixpoint(raw: &str, pass: fn(&str) -> String) -> String {
    let mut current = raw.to_string();
    for _ in 0..MAX_PASSES {
        let next = pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn tax_id_pass(text: &str) -> String {
    let dashed: String = text
        .chars()
        .map(|c| if DASH_VARIANTS.contains(&c) { '-' } else { c })
        .collect();
    let tight = tighten_dashes(&dashed);
    let mapped = map_confusables_in_numeric_tokens(&tight);
    strip_digit_separators(&mapped)
}

/// Removes horizontal whitespace on both sides of every `-`.
fn tighten_dashes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '-' {
            while out.ends_with([' ', '\t']) {
                out.pop();
            }
            out.push('-');
            while matches!(chars.peek(), Some(' ') | Some('\t')) {
                chars.next();
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | ',' | '-' | '|')
}

/// Confusable letters are only mapped inside tokens that already carry a
/// digit, so plain words such as `RUT` or `BOLETA` survive.
fn map_confusables_in_numeric_tokens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut token = String::new();

    let flush = |token: &mut String, out: &mut String| {
        if token.chars().any(|c| c.is_ascii_digit()) {
            out.push_str(&map_letter_runs(token));
        } else {
            out.push_str(token);
        }
        token.clear();
    };

    for c in text.chars() {
        if is_token_char(c) {
            token.push(c);
        } else {
            flush(&mut token, &mut out);
            out.push(c);
        }
    }
    flush(&mut token, &mut out);
    out
}

/// Maps a run of letters only when every letter in it is a confusable.
/// A word glued to a number (`-8GIRO`) keeps its spelling.
fn map_letter_runs(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut run = String::new();

    let flush = |run: &mut String, out: &mut String| {
        if run.chars().all(is_confusable) {
            out.extend(run.chars().map(map_confusable));
        } else {
            out.push_str(run);
        }
        run.clear();
    };

    for c in token.chars() {
        if c.is_ascii_alphabetic() || c == '|' {
            run.push(c);
        } else {
            flush(&mut run, &mut out);
            out.push(c);
        }
    }
    flush(&mut run, &mut out);
    out
}

fn is_confusable(c: char) -> bool {
    TAX_ID_CONFUSABLES.iter().any(|(from, _)| *from == c)
}

fn map_confusable(c: char) -> char {
    TAX_ID_CONFUSABLES
        .iter()
        .find(|(from, _)| *from == c)
        .map(|(_, to)| *to)
        .unwrap_or(c)
}

/// Drops `.` and `,` sitting between two digits.
fn strip_digit_separators(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        let separator = matches!(c, '.' | ',');
        let between_digits = i > 0
            && chars[i - 1].is_ascii_digit()
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        if separator && between_digits {
            continue;
        }
        out.push(c);
    }
    out
}

fn invoice_pass(text: &str) -> String {
    let upper = text.to_uppercase();
    upper
        .lines()
        .map(|line| {
            let replaced = apply_label_table(line);
            replaced.chars().filter(char::is_ascii).collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn apply_label_table(line: &str) -> String {
    let mut padded = format!(" {}", line);
    for (pattern, replacement) in INVOICE_LABEL_SUBSTITUTIONS {
        if padded.contains(pattern) {
            padded = padded.replace(pattern, replacement);
        }
    }
    match padded.strip_prefix(' ') {
        Some(rest) => rest.to_string(),
        None => padded,
    }
}
