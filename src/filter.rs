use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::date::{DateInterval, PartialDate};
use crate::domain::Record;
use crate::error::VdbError;
use crate::selector::{IntervalSelector, Selection};

pub const DATE_FIELDS: &[&str] = &["collection_date", "date", "submission_date"];

#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub present: Vec<String>,
    pub select: Vec<Selection>,
    pub public_only: bool,
    pub intervals: Vec<IntervalSelector>,
    /// Wildcard months and days satisfy interval bounds instead of failing them.
    pub relaxed_interval: bool,
}

#[derive(Debug, Clone)]
pub struct SubsetFilter {
    options: FilterOptions,
    today: NaiveDate,
}

impl SubsetFilter {
    pub fn new(options: FilterOptions) -> Self {
        Self {
            options,
            today: Utc::now().date_naive(),
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn apply(
        &self,
        mut records: Vec<Record>,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<Record>, VdbError> {
        let intervals = self.resolve_intervals()?;

        if !self.options.present.is_empty() {
            let before = records.len();
            records.retain(|record| self.options.present.iter().all(|field| record.has(field)));
            report(sink, "present".to_string(), before, records.len());
        }

        for selection in &self.options.select {
            let before = records.len();
            records.retain(|record| {
                record
                    .display_field(&selection.field)
                    .map(|value| selection.allows(&value))
                    .unwrap_or(false)
            });
            report(
                sink,
                format!("select:{}", selection.field),
                before,
                records.len(),
            );
        }

        if self.options.public_only {
            let before = records.len();
            records.retain(Record::is_public);
            report(sink, "public".to_string(), before, records.len());
        }

        for (field, interval) in intervals {
            let before = records.len();
            let mut kept = Vec::with_capacity(before);
            for record in records {
                if self.in_interval(&record, &field, &interval)? {
                    kept.push(record);
                }
            }
            records = kept;
            info!(field = %field, interval = %interval, remaining = records.len(), "applied date interval");
            report(sink, format!("interval:{field}"), before, records.len());
        }

        Ok(records)
    }

    fn resolve_intervals(&self) -> Result<Vec<(String, DateInterval)>, VdbError> {
        let mut resolved = Vec::new();
        for selector in &self.options.intervals {
            if !DATE_FIELDS.contains(&selector.field.as_str()) {
                warn!(field = %selector.field, "ignoring interval on a non-date field");
                continue;
            }
            let interval = DateInterval::parse_at(&selector.start, &selector.end, self.today)?;
            resolved.push((selector.field.clone(), interval));
        }
        Ok(resolved)
    }

    fn in_interval(
        &self,
        record: &Record,
        field: &str,
        interval: &DateInterval,
    ) -> Result<bool, VdbError> {
        let Some(raw) = record.get_str(field) else {
            return Ok(false);
        };
        let date: PartialDate = raw.parse()?;
        Ok(interval.contains(&date, self.options.relaxed_interval))
    }
}

fn report(sink: &dyn ProgressSink, name: String, before: usize, after: usize) {
    sink.event(ProgressEvent::Filter {
        name,
        before,
        after,
    });
}
