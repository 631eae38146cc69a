use std::io::Write;
use std::path::PathBuf;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::json;

use vdb_manager::app::{App, DownloadOptions, UploadOptions};
use vdb_manager::config::{default_fasta_fields, default_header_fields};
use vdb_manager::domain::{DatabaseName, InputFormat, OutputFormat, Record, VirusName};
use vdb_manager::error::VdbError;
use vdb_manager::filter::FilterOptions;
use vdb_manager::output::JsonOutput;
use vdb_manager::store::{JsonStore, Repository};

struct FailingStore {
    inner: JsonStore,
}

impl Repository for FailingStore {
    fn table_exists(&self, table: &str) -> Result<bool, VdbError> {
        self.inner.table_exists(table)
    }

    fn count(&self, table: &str) -> Result<usize, VdbError> {
        self.inner.count(table)
    }

    fn get(&self, table: &str, key: &str) -> Result<Option<Record>, VdbError> {
        self.inner.get(table, key)
    }

    fn query(
        &self,
        table: &str,
        predicate: &dyn Fn(&Record) -> bool,
    ) -> Result<Vec<Record>, VdbError> {
        self.inner.query(table, predicate)
    }

    fn insert(&self, _table: &str, _records: &[Record]) -> Result<usize, VdbError> {
        Err(VdbError::PersistenceError("connection reset".to_string()))
    }

    fn upsert(&self, _table: &str, _records: &[Record]) -> Result<usize, VdbError> {
        Err(VdbError::PersistenceError("connection reset".to_string()))
    }
}

fn record(fields: &[(&str, serde_json::Value)]) -> Record {
    fields
        .iter()
        .map(|(field, value)| (field.to_string(), value.clone()))
        .collect()
}

fn seeded_store(temp: &tempfile::TempDir) -> JsonStore {
    let root = Utf8PathBuf::from_path_buf(temp.path().join("store")).unwrap();
    let database: DatabaseName = "test".parse().unwrap();
    let store = JsonStore::open(&root, &database);
    store.create_table("zika_sequences", "accession").unwrap();
    store.create_table("zika_viruses", "strain").unwrap();
    store
        .insert(
            "zika_sequences",
            &[
                record(&[
                    ("accession", json!("KU1")),
                    ("strain", json!("BR1")),
                    ("locus", json!("genome")),
                    ("sequence", json!("ACGT")),
                ]),
                record(&[
                    ("accession", json!("KU2")),
                    ("strain", json!("BR1")),
                    ("locus", json!("genome")),
                    ("sequence", json!("ACGTACGTAC")),
                ]),
                record(&[
                    ("accession", json!("KU3")),
                    ("strain", json!("PE9")),
                    ("locus", json!("genome")),
                    ("sequence", json!("GGG")),
                ]),
            ],
        )
        .unwrap();
    store
        .insert(
            "zika_viruses",
            &[
                record(&[
                    ("strain", json!("BR1")),
                    ("country", json!("brazil")),
                    ("date", json!("2016-02-01")),
                ]),
                record(&[
                    ("strain", json!("PE9")),
                    ("country", json!("peru")),
                    ("date", json!("2016-02-03")),
                ]),
            ],
        )
        .unwrap();
    store
}

fn download_options(output: PathBuf, format: OutputFormat) -> DownloadOptions {
    DownloadOptions {
        virus: "zika".parse::<VirusName>().unwrap(),
        format,
        output_path: output,
        fstem: Some("zika_test".to_string()),
        fasta_fields: vec!["strain".to_string(), "accession".to_string(), "country".to_string()],
        join_key: "strain".to_string(),
        filter: FilterOptions {
            select: vec!["country:brazil".parse().unwrap()],
            intervals: vec!["date:2016-01-01,2016-03-01".parse().unwrap()],
            ..FilterOptions::default()
        },
        pick_longest: true,
    }
}

#[test]
fn download_filters_dedupes_and_writes_fasta() {
    let temp = tempfile::tempdir().unwrap();
    let app = App::new(seeded_store(&temp), "test".parse().unwrap());
    let output = temp.path().join("data");

    let result = app
        .download(&download_options(output.clone(), OutputFormat::Fasta), &JsonOutput)
        .unwrap();

    assert_eq!(result.sequences_in_table, 3);
    assert_eq!(result.viruses_in_table, 2);
    assert_eq!(result.downloaded, 3);
    assert_eq!(result.after_filter, 2);
    assert_eq!(result.after_dedup, 1);
    let content = std::fs::read_to_string(output.join("zika_test.fasta")).unwrap();
    assert_eq!(content, ">BR1|KU2|brazil\nACGTACGTAC\n");
}

#[test]
fn download_writes_json_batch() {
    let temp = tempfile::tempdir().unwrap();
    let app = App::new(seeded_store(&temp), "test".parse().unwrap());
    let output = temp.path().join("data");

    app.download(&download_options(output.clone(), OutputFormat::Json), &JsonOutput)
        .unwrap();

    let content = std::fs::read_to_string(output.join("zika_test.json")).unwrap();
    let records: Vec<Record> = serde_json::from_str(&content).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get_str("accession"), Some("KU2"));
}

#[test]
fn download_requires_both_tables() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = JsonStore::open(&root, &"test".parse().unwrap());
    store.create_table("zika_sequences", "accession").unwrap();
    let app = App::new(store, "test".parse().unwrap());

    let err = app
        .download(
            &download_options(temp.path().join("data"), OutputFormat::Tsv),
            &JsonOutput,
        )
        .unwrap_err();
    assert_matches!(err, VdbError::TableNotFound(table) if table == "zika_viruses");
}

fn upload_options(input: PathBuf) -> UploadOptions {
    UploadOptions {
        virus: "zika".parse().unwrap(),
        table: None,
        input,
        format: InputFormat::Fasta,
        header_fields: default_header_fields(),
        default_locus: Some("genome".to_string()),
        timestamp: Some(1_700_000_000),
        dry_run: false,
    }
}

#[test]
fn upload_inserts_new_and_updates_fuzzy_matches() {
    let temp = tempfile::tempdir().unwrap();
    let store = seeded_store(&temp);
    store
        .insert(
            "zika_viruses",
            &[record(&[("strain", json!("103344")), ("country", json!("guatemala"))])],
        )
        .unwrap();
    let app = App::new(store, "test".parse().unwrap());

    let input = temp.path().join("upload.fasta");
    std::fs::write(
        &input,
        ">KU501216|Zika_virus|ZIKV/0103344|NA|2015-12-01|Human|guatemala\nACGT\n\
         >KU000002|Zika_virus|NEW1|NA|2016-01-01|Human|mexico\nGGGG\n\
         >KU000003|Zika_virus|NEW1|NA||Human|\nGGGG\n",
    )
    .unwrap();

    let result = app.upload(&upload_options(input), &JsonOutput).unwrap();
    assert_eq!(result.parsed, 3);
    assert_eq!(result.inserted, 1);
    assert_eq!(result.merged, 1);
    assert_eq!(result.updated, 1);

    let repo = app.repository();
    let updated = repo.get("zika_viruses", "103344").unwrap().unwrap();
    assert_eq!(updated.get_str("accession"), Some("KU501216"));
    assert_eq!(updated.get("timestamp"), Some(&json!(1_700_000_000)));
    let inserted = repo.get("zika_viruses", "NEW1").unwrap().unwrap();
    assert_eq!(inserted.get_str("locus"), Some("genome"));
    assert_eq!(inserted.get_str("country"), Some("mexico"));
}

#[test]
fn upload_dry_run_leaves_table_untouched() {
    let temp = tempfile::tempdir().unwrap();
    let app = App::new(seeded_store(&temp), "test".parse().unwrap());
    let input = temp.path().join("upload.fasta");
    std::fs::write(&input, ">KU9|x|NEW9|NA|2016-01-01|Human|chile\nAC\n").unwrap();

    let mut options = upload_options(input);
    options.dry_run = true;
    let result = app.upload(&options, &JsonOutput).unwrap();
    assert_eq!(result.inserted, 1);
    assert_eq!(app.repository().count("zika_viruses").unwrap(), 2);
}

#[test]
fn upload_reads_gzipped_fasta() {
    let temp = tempfile::tempdir().unwrap();
    let app = App::new(seeded_store(&temp), "test".parse().unwrap());
    let input = temp.path().join("upload.fasta.gz");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(b">KU7|Zika_virus|NEW7|NA|2016-01-05|Human|colombia\nACGT\nTTGG\n")
        .unwrap();
    std::fs::write(&input, encoder.finish().unwrap()).unwrap();

    let result = app.upload(&upload_options(input), &JsonOutput).unwrap();
    assert_eq!(result.parsed, 1);
    assert_eq!(result.inserted, 1);
    let stored = app.repository().get("zika_viruses", "NEW7").unwrap().unwrap();
    assert_eq!(stored.get_str("sequence"), Some("ACGTTTGG"));
    assert_eq!(stored.get_str("country"), Some("colombia"));
}

#[test]
fn upload_reads_json_record_list() {
    let temp = tempfile::tempdir().unwrap();
    let app = App::new(seeded_store(&temp), "test".parse().unwrap());
    let input = temp.path().join("upload.json");
    std::fs::write(
        &input,
        r#"[
            {"strain": "BR1", "country": "brazil", "host": "mosquito"},
            {"strain": "NEW8", "country": "ecuador", "locus": "NS5"}
        ]"#,
    )
    .unwrap();

    let mut options = upload_options(input);
    options.format = InputFormat::Json;
    let result = app.upload(&options, &JsonOutput).unwrap();
    assert_eq!(result.parsed, 2);
    assert_eq!(result.inserted, 1);
    assert_eq!(result.updated, 1);

    let repo = app.repository();
    let updated = repo.get("zika_viruses", "BR1").unwrap().unwrap();
    assert_eq!(updated.get_str("host"), Some("mosquito"));
    assert_eq!(updated.get("timestamp"), Some(&json!(1_700_000_000)));
    let inserted = repo.get("zika_viruses", "NEW8").unwrap().unwrap();
    assert_eq!(inserted.get_str("locus"), Some("NS5"));
}

#[test]
fn persistence_failure_fails_the_batch() {
    let temp = tempfile::tempdir().unwrap();
    let app = App::new(
        FailingStore {
            inner: seeded_store(&temp),
        },
        "test".parse().unwrap(),
    );
    let batch = vec![record(&[("strain", json!("NEW1")), ("sequence", json!("AC"))])];

    let err = app
        .upload_records("zika_viruses", batch, 1, false, &JsonOutput)
        .unwrap_err();
    assert_matches!(err, VdbError::PersistenceError(_));
}

#[test]
fn default_fasta_fields_lead_with_strain() {
    assert_eq!(default_fasta_fields()[0], "strain");
}
