use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tempfile::Builder;

use crate::app::{DownloadResult, ProgressEvent, ProgressSink, UploadResult};
use crate::domain::{OutputFormat, Record, SEQUENCE};
use crate::error::VdbError;

const MISSING: &str = "?";
const FASTA_SEPARATOR: &str = "|";
const TSV_SEPARATOR: &str = "\t";

/// Writes the batch to `path`, replacing any previous file atomically.
/// Returns the number of records written (fasta skips records without a
/// sequence).
pub fn write_batch(
    records: &[Record],
    path: &Path,
    format: OutputFormat,
    fields: &[String],
) -> Result<usize, VdbError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let temp = Builder::new()
        .prefix("vdb-output")
        .tempfile_in(parent)
        .map_err(|err| VdbError::Filesystem(err.to_string()))?;

    let written = {
        let mut writer = BufWriter::new(temp.as_file());
        let written = match format {
            OutputFormat::Json => write_json(&mut writer, records),
            OutputFormat::Fasta => write_fasta(&mut writer, records, fields),
            OutputFormat::Tsv => write_tsv(&mut writer, records, fields),
        }
        .map_err(|err| VdbError::Filesystem(err.to_string()))?;
        writer
            .flush()
            .map_err(|err| VdbError::Filesystem(err.to_string()))?;
        written
    };

    temp.persist(path)
        .map_err(|err| VdbError::Filesystem(err.to_string()))?;
    Ok(written)
}

pub fn write_json<W: Write>(writer: &mut W, records: &[Record]) -> io::Result<usize> {
    serde_json::to_writer_pretty(&mut *writer, records).map_err(io::Error::other)?;
    writer.write_all(b"\n")?;
    Ok(records.len())
}

pub fn write_fasta<W: Write>(
    writer: &mut W,
    records: &[Record],
    fields: &[String],
) -> io::Result<usize> {
    let mut written = 0;
    for record in records {
        let Some(sequence) = record.get_str(SEQUENCE).filter(|seq| !seq.is_empty()) else {
            continue;
        };
        writeln!(
            writer,
            ">{}",
            field_values(record, fields).join(FASTA_SEPARATOR)
        )?;
        writeln!(writer, "{sequence}")?;
        written += 1;
    }
    Ok(written)
}

pub fn write_tsv<W: Write>(
    writer: &mut W,
    records: &[Record],
    fields: &[String],
) -> io::Result<usize> {
    writeln!(writer, "{}", fields.join(TSV_SEPARATOR))?;
    for record in records {
        writeln!(writer, "{}", field_values(record, fields).join(TSV_SEPARATOR))?;
    }
    Ok(records.len())
}

fn field_values(record: &Record, fields: &[String]) -> Vec<String> {
    fields
        .iter()
        .map(|field| {
            record
                .display_field(field)
                .unwrap_or_else(|| MISSING.to_string())
        })
        .collect()
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_download(result: &DownloadResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_upload(result: &UploadResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}
