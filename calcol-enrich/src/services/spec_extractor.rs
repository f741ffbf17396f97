//! Specification extraction from free text
//!
//! Reads the merged text corpus and yields a small specification map
//! (display, power, processor, firmware) plus date and price facts. Also
//! parses the keyword/label tables returned by the structured provider.
//!
//! Extraction never fails: unmatched input yields empty maps.

use crate::services::text::clean_html;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

pub const DISPLAY_TYPE: &str = "Display Type";
pub const DISPLAY_WIDTH: &str = "Display Width";
pub const RESOLUTION: &str = "Resolution";
pub const PROCESSOR: &str = "Processor";
pub const OS_FIRMWARE: &str = "OS/Firmware";
pub const POWER_SUPPLY: &str = "Power Supply";

// ============================================================================
// Patterns
// ============================================================================

static DISPLAY_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(lcd|led|vfd|oled|vacuum\s+fluorescent|dot\s+matrix|segmented)\b")
        .expect("valid display type pattern")
});

static DISPLAY_WIDTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:display|screen|width|size)[^\d]*(\d+)\s*(?:digit|char|character|dot|pixel|segments?|\s*x\s*\d+)",
    )
    .expect("valid display width pattern")
});

static RESOLUTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*x\s*(\d+)\s*(?:pixel|dot|resolution)").expect("valid resolution pattern")
});

static PROCESSOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?i:cpu|processor|microprocessor|chip|ic|integrated\s+circuit)\b[^\w]*(?i:(?:type|model|name)\b)?[^\w]*([A-Za-z0-9][A-Za-z0-9\-]*)",
    )
    .expect("valid processor pattern")
});

static OS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?i:os|operating\s+system|firmware|rom|software)\b[^\w]*(?i:(?:version|type|name)\b)?[^\w]*([A-Za-z0-9][A-Za-z0-9\-\.]*)",
    )
    .expect("valid firmware pattern")
});

static BATTERY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:x\s*)?(AAA|AA|button|coin|cell|batteries|battery)")
        .expect("valid battery pattern")
});

static AC_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bac\b").expect("valid ac pattern"));

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(introduced|released|discontinued|manufactured|produced)\s+(?:in\s+)?(\d{4})")
        .expect("valid date pattern")
});

static PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:retail\s+)?price(?:\s+of)?\s+\$?([\d,]+(?:\.\d{2})?)")
        .expect("valid price pattern")
});

static TABLE_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[|\s\-:]+$").expect("valid separator pattern"));

const NAMED_KEYS: [&str; 13] = [
    "Model",
    "Manufacturer",
    "Year",
    "Type",
    "Display",
    "Power",
    "Size",
    "Weight",
    "Functions",
    "Keys",
    "Features",
    "Successor",
    "Historical",
];

static NAMED_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)({})[:\s]+([^\n]+)", NAMED_KEYS.join("|")))
        .expect("valid named key pattern")
});

/// Minimum text length before the named-key fallback is tried
const NAMED_KEY_MIN_CHARS: usize = 50;

// ============================================================================
// Corpus Extraction
// ============================================================================

/// Extraction output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecExtraction {
    /// First-wins specification map
    pub spec_table: BTreeMap<String, String>,
    /// Distinct facts in discovery order
    pub facts: Vec<String>,
}

/// Run every pattern over the ordered sources
///
/// Earlier sources take precedence for spec keys.
pub fn extract_specs<S: AsRef<str>>(sources: &[S]) -> SpecExtraction {
    let mut extraction = SpecExtraction::default();
    let mut seen_facts = HashSet::new();

    for source in sources {
        let text = clean_html(source.as_ref());
        if text.is_empty() {
            continue;
        }

        extract_spec_keys(&text, &mut extraction.spec_table);

        for fact in extract_facts(&text) {
            if seen_facts.insert(fact.clone()) {
                extraction.facts.push(fact);
            }
        }
    }

    tracing::debug!(
        specs = extraction.spec_table.len(),
        facts = extraction.facts.len(),
        "Extracted specifications"
    );
    extraction
}

fn insert_first(table: &mut BTreeMap<String, String>, key: &str, value: impl FnOnce() -> Option<String>) {
    if table.contains_key(key) {
        return;
    }
    if let Some(value) = value() {
        table.insert(key.to_string(), value);
    }
}

fn extract_spec_keys(text: &str, table: &mut BTreeMap<String, String>) {
    insert_first(table, DISPLAY_TYPE, || {
        DISPLAY_TYPE_RE.captures(text).map(|c| c[1].to_uppercase())
    });
    insert_first(table, DISPLAY_WIDTH, || {
        DISPLAY_WIDTH_RE
            .captures(text)
            .map(|c| format!("{} digits/characters", &c[1]))
    });
    insert_first(table, RESOLUTION, || {
        RESOLUTION_RE
            .captures(text)
            .map(|c| format!("{}x{}", &c[1], &c[2]))
    });
    insert_first(table, PROCESSOR, || model_token(&PROCESSOR_RE, text));
    insert_first(table, OS_FIRMWARE, || model_token(&OS_RE, text));
    insert_first(table, POWER_SUPPLY, || power_supply(text));
}

/// First token after a keyword that looks like a part or version name
///
/// Plain lowercase words ("from", "update") are skipped.
fn model_token(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures_iter(text)
        .map(|c| c[1].trim_end_matches(&['.', '-'][..]).to_string())
        .find(|token| {
            token
                .chars()
                .any(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        })
}

fn power_supply(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    if lower.contains("batter") {
        return Some(match BATTERY_RE.captures(text) {
            Some(c) => format!("{}x {}", &c[1], &c[2]),
            None => "Batteries".to_string(),
        });
    }
    if lower.contains("solar") {
        return Some("Solar powered".to_string());
    }
    if lower.contains("usb") && lower.contains("power") {
        return Some("USB powered".to_string());
    }
    if lower.contains("external") && lower.contains("power") {
        return Some("External power supply".to_string());
    }
    if AC_WORD_RE.is_match(text) && lower.contains("adapter") {
        return Some("AC adapter".to_string());
    }
    None
}

/// Dates (every match) and the first price of one cleaned source
fn extract_facts(text: &str) -> Vec<String> {
    let mut facts: Vec<String> = DATE_RE
        .captures_iter(text)
        .map(|c| format!("{} {}", &c[1], &c[2]))
        .collect();

    if let Some(c) = PRICE_RE.captures(text) {
        facts.push(format!("Retail price: ${}", &c[1]));
    }
    facts
}

// ============================================================================
// Structured Table Parsing
// ============================================================================

fn is_table_header(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("keywords") && lower.contains("labels")
}

fn accept(key: &str, value: &str) -> Option<(String, String)> {
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() || value.is_empty() || key == value {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

/// Tab, then pipe, then colon
fn parse_row(line: &str) -> Option<(String, String)> {
    if line.contains('\t') {
        let mut cells = line.split('\t');
        if let (Some(key), Some(value)) = (cells.next(), cells.next()) {
            if let Some(pair) = accept(key, value) {
                return Some(pair);
            }
        }
    }

    if line.contains('|') {
        let cells: Vec<&str> = line.split('|').collect();
        if cells.len() >= 3 {
            let key_lower = cells[1].to_lowercase();
            if !key_lower.contains("keyword") && !key_lower.contains("label") {
                if let Some(pair) = accept(cells[1], cells[2]) {
                    return Some(pair);
                }
            }
        }
    }

    if let Some(index) = line.find(':') {
        if index > 0 && index < line.len() - 1 {
            return accept(&line[..index], &line[index + 1..]);
        }
    }

    None
}

/// Parse a keyword/label table into key/value pairs
///
/// Rows are read after a header naming both "keywords" and "labels", and on
/// the line following a separator row. Text with no such header is read as
/// table rows throughout. When no row parses, recognised names followed by
/// a colon or space (`Model: HP-35`) are collected instead.
pub fn parse_structured_table(text: &str) -> BTreeMap<String, String> {
    let mut table = BTreeMap::new();
    if text.trim().is_empty() {
        return table;
    }

    let mut in_table = !text.lines().any(is_table_header);
    let mut after_separator = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if TABLE_SEPARATOR_RE.is_match(line) {
            after_separator = true;
            continue;
        }
        if is_table_header(line) {
            in_table = true;
            after_separator = true;
            continue;
        }
        if in_table || after_separator {
            after_separator = false;
            if let Some((key, value)) = parse_row(line) {
                table.insert(key, value);
            }
        }
    }

    if table.is_empty() && text.chars().count() > NAMED_KEY_MIN_CHARS {
        for c in NAMED_KEY_RE.captures_iter(text) {
            let value = c[2].trim();
            if value.is_empty() {
                continue;
            }
            let key = NAMED_KEYS
                .iter()
                .find(|k| k.eq_ignore_ascii_case(&c[1]))
                .map(|k| k.to_string())
                .unwrap_or_else(|| c[1].to_string());
            table.insert(key, value.to_string());
        }
    }

    tracing::debug!(entries = table.len(), "Parsed structured table");
    table
}
