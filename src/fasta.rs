use std::collections::BTreeMap;
use std::io::{BufRead, Read};
use std::path::Path;

use needletail::parse_fastx_reader;
use serde_json::Value;

use crate::domain::{InputFormat, Record, SEQUENCE};
use crate::error::VdbError;
use crate::fs_util::{open_file, open_input};

pub const HEADER_SEPARATOR: char = '|';

/// Header position (0-based, split on `|`) to field name.
pub type HeaderFields = BTreeMap<usize, String>;

pub fn read_records(
    path: &Path,
    format: InputFormat,
    header_fields: &HeaderFields,
) -> Result<Vec<Record>, VdbError> {
    match format {
        InputFormat::Fasta => parse_fasta(open_file(path)?, header_fields),
        InputFormat::Json => parse_json(open_input(path)?),
    }
}

/// One record per FASTA entry: mapped header fields plus `sequence`.
/// Empty header fields are left out. Compressed input is detected from its
/// leading bytes.
pub fn parse_fasta<R: Read + Send>(
    reader: R,
    header_fields: &HeaderFields,
) -> Result<Vec<Record>, VdbError> {
    let mut fastx = parse_fastx_reader(reader).map_err(input_error)?;
    let mut records = Vec::new();
    while let Some(entry) = fastx.next() {
        let entry = entry.map_err(input_error)?;
        let header = String::from_utf8_lossy(entry.id());
        let mut record = header_record(&header, header_fields);
        let sequence = String::from_utf8_lossy(&entry.seq()).trim().to_string();
        record.insert(SEQUENCE, Value::String(sequence));
        records.push(record);
    }
    Ok(records)
}

pub fn parse_json<R: BufRead>(reader: R) -> Result<Vec<Record>, VdbError> {
    serde_json::from_reader(reader).map_err(|err| VdbError::InputParse(err.to_string()))
}

fn header_record(header: &str, header_fields: &HeaderFields) -> Record {
    let parts = header.split(HEADER_SEPARATOR).collect::<Vec<_>>();
    let mut record = Record::new();
    for (position, field) in header_fields {
        let Some(value) = parts.get(*position).map(|value| value.trim()) else {
            continue;
        };
        if !value.is_empty() {
            record.insert(field.clone(), Value::String(value.to_string()));
        }
    }
    record
}

fn input_error(err: needletail::errors::ParseError) -> VdbError {
    VdbError::InputParse(err.to_string())
}
