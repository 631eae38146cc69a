use indexmap::IndexMap;
use indexmap::map::Entry;
use tracing::{debug, warn};

use crate::domain::Record;
use crate::error::VdbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupOptions {
    pub pick_longest: bool,
    /// Legacy behaviour for concatenated keys that collide across different
    /// strain/locus pairs (`"A1" + "B"` and `"A" + "1B"`): the second record
    /// is stored under its bare strain, overwriting anything already there.
    /// When disabled the colliding record gets its own strain/locus slot.
    pub strain_fallback: bool,
}

impl DedupOptions {
    pub fn new(pick_longest: bool) -> Self {
        Self {
            pick_longest,
            strain_fallback: true,
        }
    }
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self::new(false)
    }
}

pub fn dedupe(records: Vec<Record>, options: DedupOptions) -> Result<Vec<Record>, VdbError> {
    dedupe_by(records, Record::identity_key, options)
}

pub fn dedupe_by<F>(
    records: Vec<Record>,
    key_fn: F,
    options: DedupOptions,
) -> Result<Vec<Record>, VdbError>
where
    F: Fn(&Record) -> Result<String, VdbError>,
{
    let input_len = records.len();
    let mut representatives: IndexMap<String, Record> = IndexMap::with_capacity(input_len);

    for record in records {
        let key = key_fn(&record)?;
        let Some(current) = representatives.get_mut(&key) else {
            representatives.insert(key, record);
            continue;
        };

        if same_identity(current, &record)? {
            keep_better(current, record, options);
            continue;
        }

        let strain = record.strain()?.to_string();
        if options.strain_fallback {
            warn!(key = %key, strain = %strain, "identity key collision, storing under strain");
            representatives.insert(strain, record);
        } else {
            let slot = format!("{strain}\t{}", record.locus()?);
            match representatives.entry(slot) {
                Entry::Occupied(mut occupied) => keep_better(occupied.get_mut(), record, options),
                Entry::Vacant(vacant) => {
                    vacant.insert(record);
                }
            }
        }
    }

    debug!(
        before = input_len,
        after = representatives.len(),
        "resolved duplicate strain/locus records"
    );
    Ok(representatives.into_values().collect())
}

fn same_identity(a: &Record, b: &Record) -> Result<bool, VdbError> {
    Ok(a.strain()? == b.strain()? && a.locus()? == b.locus()?)
}

fn keep_better(current: &mut Record, candidate: Record, options: DedupOptions) {
    if options.pick_longest && candidate.sequence_len() > current.sequence_len() {
        *current = candidate;
    }
}
