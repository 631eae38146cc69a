use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::dedup::{DedupOptions, dedupe};
use crate::domain::{DatabaseName, InputFormat, LOCUS, OutputFormat, Record, TIMESTAMP, VirusName};
use crate::error::VdbError;
use crate::fasta::{HeaderFields, read_records};
use crate::filter::{FilterOptions, SubsetFilter};
use crate::fs_util::ensure_dir;
use crate::normalize::NormalizedIndex;
use crate::output::write_batch;
use crate::reconcile::{Reconciler, index_by_strain};
use crate::store::{Repository, merged_read};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Message(String),
    Filter {
        name: String,
        before: usize,
        after: usize,
    },
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub virus: VirusName,
    pub format: OutputFormat,
    pub output_path: PathBuf,
    /// Output file name without extension; `<virus>_<YYYY>_<MM>_<DD>` if unset.
    pub fstem: Option<String>,
    pub fasta_fields: Vec<String>,
    pub join_key: String,
    pub filter: FilterOptions,
    pub pick_longest: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub database: String,
    pub virus: String,
    pub sequences_in_table: usize,
    pub viruses_in_table: usize,
    pub downloaded: usize,
    pub after_filter: usize,
    pub after_dedup: usize,
    pub written: usize,
    pub output: String,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub virus: VirusName,
    pub table: Option<String>,
    pub input: PathBuf,
    pub format: InputFormat,
    pub header_fields: HeaderFields,
    pub default_locus: Option<String>,
    pub timestamp: Option<i64>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub table: String,
    pub parsed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub merged: usize,
    pub unchanged: usize,
    pub dry_run: bool,
}

#[derive(Clone)]
pub struct App<R: Repository> {
    repo: R,
    database: DatabaseName,
}

impl<R: Repository> App<R> {
    pub fn new(repo: R, database: DatabaseName) -> Self {
        Self { repo, database }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn download(
        &self,
        options: &DownloadOptions,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadResult, VdbError> {
        let start = Instant::now();
        let sequences_table = options.virus.sequences_table();
        let viruses_table = options.virus.viruses_table();
        self.require_table(&sequences_table)?;
        self.require_table(&viruses_table)?;

        let sequences_in_table = self.repo.count(&sequences_table)?;
        let viruses_in_table = self.repo.count(&viruses_table)?;
        info!(table = %sequences_table, count = sequences_in_table, "sequences in table");
        info!(table = %viruses_table, count = viruses_in_table, "viruses in table");
        sink.event(ProgressEvent::Message(format!(
            "downloading from {sequences_table} ({sequences_in_table}) and {viruses_table} ({viruses_in_table})"
        )));

        let downloaded = merged_read(
            &self.repo,
            &sequences_table,
            &viruses_table,
            &options.join_key,
        )?;
        let downloaded_count = downloaded.len();

        let filtered = SubsetFilter::new(options.filter.clone()).apply(downloaded, sink)?;
        let after_filter = filtered.len();

        if options.pick_longest {
            sink.event(ProgressEvent::Message(
                "resolving duplicate strain/locus records by longest sequence".to_string(),
            ));
        }
        let records = dedupe(filtered, DedupOptions::new(options.pick_longest))?;
        sink.event(ProgressEvent::Filter {
            name: "dedup".to_string(),
            before: after_filter,
            after: records.len(),
        });

        ensure_dir(&options.output_path)?;
        let stem = options
            .fstem
            .clone()
            .unwrap_or_else(|| default_fstem(&options.virus));
        let output = options
            .output_path
            .join(format!("{stem}.{}", options.format.extension()));
        let written = write_batch(&records, &output, options.format, &options.fasta_fields)?;
        info!(path = %output.display(), written, "wrote output");

        Ok(DownloadResult {
            database: self.database.to_string(),
            virus: options.virus.to_string(),
            sequences_in_table,
            viruses_in_table,
            downloaded: downloaded_count,
            after_filter,
            after_dedup: records.len(),
            written,
            output: output.display().to_string(),
            elapsed_ms: start.elapsed().as_millis(),
        })
    }

    pub fn upload(
        &self,
        options: &UploadOptions,
        sink: &dyn ProgressSink,
    ) -> Result<UploadResult, VdbError> {
        sink.event(ProgressEvent::Message(format!(
            "reading {} input {}",
            options.format,
            options.input.display()
        )));
        let mut records = read_records(&options.input, options.format, &options.header_fields)?;
        let timestamp = options
            .timestamp
            .unwrap_or_else(|| chrono::Utc::now().timestamp());
        for record in &mut records {
            if !record.has(TIMESTAMP) {
                record.insert(TIMESTAMP, timestamp);
            }
            if let Some(locus) = &options.default_locus {
                if !record.has(LOCUS) {
                    record.insert(LOCUS, locus.clone());
                }
            }
        }

        let table = options
            .table
            .clone()
            .unwrap_or_else(|| options.virus.viruses_table());
        self.upload_records(&table, records, timestamp, options.dry_run, sink)
    }

    pub fn upload_records(
        &self,
        table: &str,
        records: Vec<Record>,
        timestamp: impl Into<Value>,
        dry_run: bool,
        sink: &dyn ProgressSink,
    ) -> Result<UploadResult, VdbError> {
        self.require_table(table)?;
        let parsed = records.len();

        let existing = index_by_strain(self.repo.query(table, &|_| true)?)?;
        let index = NormalizedIndex::build(existing.values())?;
        let outcome = Reconciler::new(timestamp).reconcile(records, &existing, &index)?;
        sink.event(ProgressEvent::Message(format!(
            "{} new, {} changed, {} merged, {} unchanged",
            outcome.to_insert.len(),
            outcome.to_update.len(),
            outcome.merged,
            outcome.unchanged
        )));

        if !dry_run {
            info!(table, count = outcome.to_insert.len(), "inserting new documents");
            self.repo
                .insert(table, &outcome.to_insert)
                .map_err(persistence)?;
            info!(table, count = outcome.to_update.len(), "updating changed documents");
            self.repo
                .upsert(table, &outcome.to_update)
                .map_err(persistence)?;
        }

        Ok(UploadResult {
            table: table.to_string(),
            parsed,
            inserted: outcome.to_insert.len(),
            updated: outcome.to_update.len(),
            merged: outcome.merged,
            unchanged: outcome.unchanged,
            dry_run,
        })
    }

    fn require_table(&self, table: &str) -> Result<(), VdbError> {
        if self.repo.table_exists(table)? {
            Ok(())
        } else {
            Err(VdbError::TableNotFound(table.to_string()))
        }
    }
}

pub fn default_fstem(virus: &VirusName) -> String {
    format!("{virus}_{}", chrono::Local::now().format("%Y_%m_%d"))
}

fn persistence(err: VdbError) -> VdbError {
    match err {
        VdbError::PersistenceError(_) => err,
        other => VdbError::PersistenceError(other.to_string()),
    }
}
