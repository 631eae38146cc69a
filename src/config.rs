use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::DatabaseName;
use crate::error::VdbError;
use crate::fasta::HeaderFields;
use crate::store::JsonStore;

pub const DEFAULT_CONFIG_FILE: &str = "vdb.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub store_root: Option<String>,
    #[serde(default)]
    pub download: Option<DownloadSection>,
    #[serde(default)]
    pub upload: Option<UploadSection>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DownloadSection {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub fasta_fields: Option<Vec<String>>,
    #[serde(default)]
    pub join_key: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UploadSection {
    /// Header position (as a string key, JSON objects have no integer keys)
    /// to field name.
    #[serde(default)]
    pub header_fields: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub locus: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub database: DatabaseName,
    pub store_root: Option<Utf8PathBuf>,
    pub output_path: String,
    pub fasta_fields: Vec<String>,
    pub join_key: String,
    pub header_fields: HeaderFields,
    pub default_locus: Option<String>,
}

impl ResolvedConfig {
    pub fn store_root(&self) -> Result<Utf8PathBuf, VdbError> {
        match &self.store_root {
            Some(root) => Ok(root.clone()),
            None => JsonStore::default_root(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, VdbError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| VdbError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| VdbError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, VdbError> {
        let database = config.database.as_deref().unwrap_or("vdb").parse()?;
        let download = config.download.unwrap_or_default();
        let upload = config.upload.unwrap_or_default();

        let header_fields = match upload.header_fields {
            Some(raw) => raw
                .into_iter()
                .map(|(position, field)| {
                    position
                        .trim()
                        .parse::<usize>()
                        .map(|position| (position, field))
                        .map_err(|_| {
                            VdbError::ConfigParse(format!(
                                "header field position must be an integer: {position}"
                            ))
                        })
                })
                .collect::<Result<HeaderFields, VdbError>>()?,
            None => default_header_fields(),
        };

        Ok(ResolvedConfig {
            database,
            store_root: config.store_root.map(Utf8PathBuf::from),
            output_path: download.path.unwrap_or_else(|| "data".to_string()),
            fasta_fields: download.fasta_fields.unwrap_or_else(default_fasta_fields),
            join_key: download.join_key.unwrap_or_else(|| "strain".to_string()),
            header_fields,
            default_locus: upload.locus,
        })
    }
}

pub fn default_fasta_fields() -> Vec<String> {
    [
        "strain", "virus", "accession", "date", "region", "country", "division", "location",
        "source", "locus", "authors",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// `>KU501216|Zika_virus|103344|NA|2015_12_01|Human|Guatemala`
pub fn default_header_fields() -> HeaderFields {
    [(0, "accession"), (2, "strain"), (4, "date"), (6, "country")]
        .into_iter()
        .map(|(position, field)| (position, field.to_string()))
        .collect()
}
