use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::Record;
use crate::error::VdbError;

/// Noise tokens stripped from strain names, applied in this order.
const NOISE_TOKENS: &[&str] = &[
    // host
    "Human",
    "H.sapiens_tc",
    "Hsapiens_tc",
    "H.sapiens-tc",
    "Homo_sapiens",
    "Homo sapiens",
    "Hsapiens",
    "H.sapiens",
    // lineage locale
    "_Asian",
    "_Asia",
    // virus name
    "Zika_virus",
    "Zika virus",
    "Zika",
    "ZIKV",
];

const CANONICAL_PREFIX: &str = "V";

fn noise_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        NOISE_TOKENS
            .iter()
            .map(|token| {
                Regex::new(&format!("(?i){}", regex::escape(token)))
                    .expect("noise token patterns are valid")
            })
            .collect()
    })
}

/// Canonical comparison key for a strain name.
///
/// Two strains are the same sample iff their normalized names are equal.
/// The key is only used for lookups and is never stored.
pub fn normalize_name(name: &str) -> String {
    let mut key = name.to_string();
    for pattern in noise_patterns() {
        key = pattern.replace_all(&key, "").into_owned();
    }
    key = key
        .replace([' ', '\'', '(', ')'], "")
        .replace("//", "/")
        .replace("__", "_")
        .replace(['.', ','], "");
    if let Some(rest) = key.strip_prefix('/') {
        key = rest.to_string();
    }
    match integer_literal(&key) {
        Some(number) => format!("{CANONICAL_PREFIX}{number}"),
        None => key,
    }
}

fn integer_literal(raw: &str) -> Option<String> {
    let (negative, body) = match raw.as_bytes().first()? {
        b'-' => (true, &raw[1..]),
        b'+' => (false, &raw[1..]),
        _ => (false, raw),
    };
    let mut digits = String::with_capacity(body.len());
    let mut previous_was_digit = false;
    for ch in body.chars() {
        match ch {
            '0'..='9' => {
                digits.push(ch);
                previous_was_digit = true;
            }
            '_' if previous_was_digit => previous_was_digit = false,
            _ => return None,
        }
    }
    if !previous_was_digit {
        return None;
    }
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        Some("0".to_string())
    } else if negative {
        Some(format!("-{trimmed}"))
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedIndex {
    by_key: HashMap<String, String>,
}

impl NormalizedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes the `strain` of every record. When two stored strains share a
    /// key the later one wins.
    pub fn build<'a>(records: impl IntoIterator<Item = &'a Record>) -> Result<Self, VdbError> {
        let mut index = Self::new();
        for record in records {
            index.insert(record.strain()?);
        }
        Ok(index)
    }

    pub fn insert(&mut self, strain: &str) {
        self.by_key
            .insert(normalize_name(strain), strain.to_string());
    }

    pub fn lookup(&self, strain: &str) -> Option<&str> {
        self.by_key
            .get(&normalize_name(strain))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
