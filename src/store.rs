use std::collections::HashSet;
use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tempfile::Builder;
use tracing::debug;

use crate::domain::{DatabaseName, Record};
use crate::error::VdbError;

/// Document store the download and upload paths run against.
///
/// `insert` and `upsert` are all-or-nothing: on error nothing in the batch
/// has been written.
pub trait Repository: Send + Sync {
    fn table_exists(&self, table: &str) -> Result<bool, VdbError>;
    fn count(&self, table: &str) -> Result<usize, VdbError>;
    fn get(&self, table: &str, key: &str) -> Result<Option<Record>, VdbError>;
    fn query(
        &self,
        table: &str,
        predicate: &dyn Fn(&Record) -> bool,
    ) -> Result<Vec<Record>, VdbError>;
    /// Adds new documents; fails if any primary key is already taken.
    fn insert(&self, table: &str, records: &[Record]) -> Result<usize, VdbError>;
    fn upsert(&self, table: &str, records: &[Record]) -> Result<usize, VdbError>;
}

/// Every sequence document merged with the virus document whose `join_key`
/// field has the same value. Virus fields win on conflict; a sequence without
/// a matching virus is returned as is. Each table is read once.
pub fn merged_read(
    repo: &dyn Repository,
    sequences_table: &str,
    viruses_table: &str,
    join_key: &str,
) -> Result<Vec<Record>, VdbError> {
    let mut viruses: IndexMap<String, Record> = IndexMap::new();
    for virus in repo.query(viruses_table, &|_| true)? {
        if let Some(key) = virus.display_field(join_key) {
            viruses.entry(key).or_insert(virus);
        }
    }

    let mut sequences = repo.query(sequences_table, &|_| true)?;
    for sequence in &mut sequences {
        let matched = sequence
            .display_field(join_key)
            .and_then(|key| viruses.get(&key));
        if let Some(virus) = matched {
            sequence.merge_over(virus);
        }
    }
    debug!(
        sequences = sequences.len(),
        viruses = viruses.len(),
        "merged sequence and virus documents"
    );
    Ok(sequences)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableFile {
    primary_key: String,
    #[serde(default)]
    documents: Vec<Record>,
}

impl TableFile {
    fn key_of(&self, record: &Record) -> Result<String, VdbError> {
        record.display_field(&self.primary_key).ok_or_else(|| {
            VdbError::PersistenceError(format!(
                "document is missing primary key `{}`",
                self.primary_key
            ))
        })
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.documents.iter().position(|doc| {
            doc.display_field(&self.primary_key)
                .is_some_and(|value| value == key)
        })
    }
}

/// File-backed repository: one JSON file per table under
/// `<root>/<database>/`, rewritten atomically on every write.
#[derive(Debug, Clone)]
pub struct JsonStore {
    database_root: Utf8PathBuf,
}

impl JsonStore {
    pub fn open(root: &Utf8Path, database: &DatabaseName) -> Self {
        Self {
            database_root: root.join(database.as_str()),
        }
    }

    pub fn default_root() -> Result<Utf8PathBuf, VdbError> {
        BaseDirs::new()
            .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.data_dir().join("vdb-manager")).ok())
            .ok_or_else(|| VdbError::Filesystem("unable to resolve data directory".to_string()))
    }

    pub fn database_root(&self) -> &Utf8Path {
        &self.database_root
    }

    pub fn table_path(&self, table: &str) -> Utf8PathBuf {
        self.database_root.join(format!("{table}.json"))
    }

    pub fn create_table(&self, table: &str, primary_key: &str) -> Result<(), VdbError> {
        let path = self.table_path(table);
        if path.as_std_path().exists() {
            return Err(VdbError::TableExists(table.to_string()));
        }
        let file = TableFile {
            primary_key: primary_key.to_string(),
            documents: Vec::new(),
        };
        write_table_atomic(&path, &file).map_err(|err| VdbError::Filesystem(err.to_string()))
    }

    pub fn list_tables(&self) -> Result<Vec<String>, VdbError> {
        if !self.database_root.as_std_path().exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(self.database_root.as_std_path())
            .map_err(|err| VdbError::Filesystem(err.to_string()))?;
        let mut tables = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| VdbError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if path.extension().map(|ext| ext == "json").unwrap_or(false) {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    tables.push(stem.to_string());
                }
            }
        }
        tables.sort();
        Ok(tables)
    }

    fn load(&self, table: &str) -> Result<TableFile, VdbError> {
        let path = self.table_path(table);
        if !path.as_std_path().exists() {
            return Err(VdbError::TableNotFound(table.to_string()));
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| VdbError::Filesystem(format!("read {path}: {err}")))?;
        serde_json::from_str(&content)
            .map_err(|err| VdbError::Filesystem(format!("parse {path}: {err}")))
    }

    fn save(&self, table: &str, file: &TableFile) -> Result<(), VdbError> {
        write_table_atomic(&self.table_path(table), file)
            .map_err(|err| VdbError::PersistenceError(format!("write {table}: {err}")))
    }
}

impl Repository for JsonStore {
    fn table_exists(&self, table: &str) -> Result<bool, VdbError> {
        Ok(self.table_path(table).as_std_path().exists())
    }

    fn count(&self, table: &str) -> Result<usize, VdbError> {
        Ok(self.load(table)?.documents.len())
    }

    fn get(&self, table: &str, key: &str) -> Result<Option<Record>, VdbError> {
        let file = self.load(table)?;
        Ok(file.position(key).map(|idx| file.documents[idx].clone()))
    }

    fn query(
        &self,
        table: &str,
        predicate: &dyn Fn(&Record) -> bool,
    ) -> Result<Vec<Record>, VdbError> {
        let file = self.load(table)?;
        Ok(file
            .documents
            .into_iter()
            .filter(|doc| predicate(doc))
            .collect())
    }

    fn insert(&self, table: &str, records: &[Record]) -> Result<usize, VdbError> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut file = self.load(table)?;
        let mut seen = HashSet::new();
        for record in records {
            let key = file.key_of(record)?;
            if file.position(&key).is_some() || !seen.insert(key.clone()) {
                return Err(VdbError::PersistenceError(format!(
                    "duplicate primary key `{key}` in {table}"
                )));
            }
        }
        file.documents.extend(records.iter().cloned());
        self.save(table, &file)?;
        debug!(table, inserted = records.len(), "inserted documents");
        Ok(records.len())
    }

    fn upsert(&self, table: &str, records: &[Record]) -> Result<usize, VdbError> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut file = self.load(table)?;
        for record in records {
            let key = file.key_of(record)?;
            match file.position(&key) {
                Some(idx) => file.documents[idx] = record.clone(),
                None => file.documents.push(record.clone()),
            }
        }
        self.save(table, &file)?;
        debug!(table, replaced = records.len(), "upserted documents");
        Ok(records.len())
    }
}

fn write_table_atomic(path: &Utf8Path, file: &TableFile) -> std::io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::other("table path has no parent"))?;
    fs::create_dir_all(parent.as_std_path())?;
    let content = serde_json::to_vec_pretty(file).map_err(std::io::Error::other)?;
    let mut temp = Builder::new()
        .prefix("vdb-table")
        .tempfile_in(parent.as_std_path())?;
    temp.write_all(&content)?;
    temp.persist(path.as_std_path()).map_err(|err| err.error)?;
    Ok(())
}
