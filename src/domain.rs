use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::VdbError;

pub const STRAIN: &str = "strain";
pub const LOCUS: &str = "locus";
pub const SEQUENCE: &str = "sequence";
pub const PUBLIC: &str = "public";
pub const TIMESTAMP: &str = "timestamp";

/// Document as stored in a table: an ordered mapping of field names to JSON
/// values. A field holding `null` is treated the same as a missing field by
/// every accessor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|value| !value.is_null())
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn has(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.shift_remove(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn strain(&self) -> Result<&str, VdbError> {
        self.required_str(STRAIN)
    }

    pub fn locus(&self) -> Result<&str, VdbError> {
        self.required_str(LOCUS)
    }

    /// `strain + locus`, concatenated without a separator.
    pub fn identity_key(&self) -> Result<String, VdbError> {
        Ok(format!("{}{}", self.strain()?, self.locus()?))
    }

    pub fn sequence_len(&self) -> usize {
        self.get_str(SEQUENCE)
            .map(|seq| seq.chars().count())
            .unwrap_or(0)
    }

    pub fn is_public(&self) -> bool {
        matches!(self.get(PUBLIC), Some(Value::Bool(true)))
    }

    pub fn display_field(&self, field: &str) -> Option<String> {
        self.get(field).map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    }

    /// Copies fields from `other` that are missing here. Existing values are
    /// never replaced. Returns the number of fields added.
    pub fn merge_missing(&mut self, other: &Record) -> usize {
        let mut added = 0;
        for (field, value) in other.fields() {
            if value.is_null() || self.has(field) {
                continue;
            }
            self.0.insert(field.clone(), value.clone());
            added += 1;
        }
        added
    }

    pub fn merge_over(&mut self, other: &Record) {
        for (field, value) in other.fields() {
            self.0.insert(field.clone(), value.clone());
        }
    }

    fn required_str(&self, field: &str) -> Result<&str, VdbError> {
        self.get_str(field)
            .ok_or_else(|| VdbError::MissingIdentityField {
                field: field.to_string(),
            })
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

const ALLOWED_DATABASES: &[&str] = &["vdb", "test_vdb", "test"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatabaseName(String);

impl DatabaseName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatabaseName {
    type Err = VdbError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        if !ALLOWED_DATABASES.contains(&normalized.as_str()) {
            return Err(VdbError::InvalidDatabase(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VirusName(String);

impl VirusName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn viruses_table(&self) -> String {
        format!("{}_viruses", self.0)
    }

    pub fn sequences_table(&self) -> String {
        format!("{}_sequences", self.0)
    }
}

impl fmt::Display for VirusName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VirusName {
    type Err = VdbError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        if !is_valid {
            return Err(VdbError::InvalidSelector(format!("virus name: {value}")));
        }
        Ok(Self(normalized))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Fasta,
    Tsv,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Fasta => "fasta",
            OutputFormat::Tsv => "tsv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = VdbError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "fasta" => Ok(OutputFormat::Fasta),
            "tsv" => Ok(OutputFormat::Tsv),
            _ => Err(VdbError::UnsupportedOutputFormat(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Fasta,
    Json,
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::Fasta => write!(f, "fasta"),
            InputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn null_fields_read_as_absent() {
        let record: Record = [("strain", json!("A1")), ("country", Value::Null)]
            .into_iter()
            .collect();
        assert!(record.has("strain"));
        assert!(!record.has("country"));
        assert!(record.get("country").is_none());
    }

    #[test]
    fn identity_key_requires_locus() {
        let record: Record = [("strain", json!("A1"))].into_iter().collect();
        let err = record.identity_key().unwrap_err();
        assert_matches!(err, VdbError::MissingIdentityField { field } if field == "locus");
    }

    #[test]
    fn merge_missing_keeps_existing_values() {
        let mut pending: Record = [("strain", json!("A1")), ("date", json!("2016-01-01"))]
            .into_iter()
            .collect();
        let incoming: Record = [
            ("strain", json!("A1")),
            ("date", json!("2016-02-02")),
            ("country", json!("brazil")),
        ]
        .into_iter()
        .collect();
        assert_eq!(pending.merge_missing(&incoming), 1);
        assert_eq!(pending.get_str("date"), Some("2016-01-01"));
        assert_eq!(pending.get_str("country"), Some("brazil"));
    }

    #[test]
    fn database_allow_list() {
        let db: DatabaseName = "VDB".parse().unwrap();
        assert_eq!(db.as_str(), "vdb");
        let err = "prod".parse::<DatabaseName>().unwrap_err();
        assert_matches!(err, VdbError::InvalidDatabase(_));
    }

    #[test]
    fn output_format_rejects_unknown() {
        assert_eq!("TSV".parse::<OutputFormat>().unwrap(), OutputFormat::Tsv);
        let err = "xml".parse::<OutputFormat>().unwrap_err();
        assert_matches!(err, VdbError::UnsupportedOutputFormat(_));
    }
}
