use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use vdb_manager::app::{
    App, DownloadOptions, DownloadResult, ProgressEvent, ProgressSink, UploadOptions, UploadResult,
};
use vdb_manager::config::{ConfigLoader, ResolvedConfig};
use vdb_manager::domain::{DatabaseName, InputFormat, OutputFormat, VirusName};
use vdb_manager::error::VdbError;
use vdb_manager::filter::FilterOptions;
use vdb_manager::output::JsonOutput;
use vdb_manager::selector::{parse_intervals, parse_selections};
use vdb_manager::store::JsonStore;

#[derive(Parser)]
#[command(name = "vdb")]
#[command(about = "Download, subset and reconcile virus sequence records")]
#[command(version, author)]
struct Cli {
    /// Print command results as JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    /// Root directory of the document store.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[arg(short = 'd', long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download, filter and deduplicate sequences")]
    Download(DownloadArgs),
    #[command(about = "Reconcile parsed records against a table and persist them")]
    Upload(UploadArgs),
    #[command(about = "Create an empty table")]
    CreateTable(CreateTableArgs),
    #[command(about = "List tables in the database")]
    Tables,
}

#[derive(Args)]
struct DownloadArgs {
    #[arg(short = 'v', long)]
    virus: String,

    /// json, fasta or tsv
    #[arg(long, default_value = "fasta")]
    ftype: String,

    #[arg(long)]
    fstem: Option<String>,

    #[arg(long)]
    path: Option<PathBuf>,

    #[arg(long, num_args = 1..)]
    fasta_fields: Vec<String>,

    /// field:value1,value2
    #[arg(long, num_args = 1..)]
    select: Vec<String>,

    /// Fields that must be present and non-null
    #[arg(long, num_args = 1..)]
    present: Vec<String>,

    /// field:start,end with YYYY-MM-DD dates, either side may be empty
    #[arg(long, num_args = 1..)]
    interval: Vec<String>,

    #[arg(long)]
    public_only: bool,

    /// Unknown months and days (XX) satisfy interval bounds
    #[arg(long)]
    relaxed_interval: bool,

    /// Keep the longest sequence for duplicate strain/locus records
    #[arg(long)]
    pick_longest: bool,
}

#[derive(Args)]
struct UploadArgs {
    #[arg(short = 'v', long)]
    virus: String,

    #[arg(long)]
    fname: PathBuf,

    #[arg(long, value_enum, default_value_t = InputFormat::Fasta)]
    ftype: InputFormat,

    /// Defaults to <virus>_viruses
    #[arg(long)]
    table: Option<String>,

    #[arg(long)]
    locus: Option<String>,

    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct CreateTableArgs {
    table: String,

    #[arg(long, default_value = "strain")]
    primary_key: String,
}

struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Message(message) => tracing::info!("{message}"),
            ProgressEvent::Filter {
                name,
                before,
                after,
            } => tracing::info!(
                filter = %name,
                before,
                after,
                removed = before.saturating_sub(after),
                "filtered documents"
            ),
        }
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<VdbError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &VdbError) -> u8 {
    match error {
        VdbError::InvalidDateFormat(_)
        | VdbError::InvalidInterval { .. }
        | VdbError::InvalidSelector(_)
        | VdbError::InvalidDatabase(_)
        | VdbError::UnsupportedOutputFormat(_)
        | VdbError::MissingIdentityField { .. }
        | VdbError::TableNotFound(_)
        | VdbError::ConfigRead(_)
        | VdbError::ConfigParse(_) => 2,
        VdbError::PersistenceError(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let database: DatabaseName = match &cli.database {
        Some(name) => name.parse()?,
        None => config.database.clone(),
    };
    let root = match &cli.store {
        Some(path) => camino::Utf8PathBuf::from_path_buf(path.clone())
            .map_err(|_| VdbError::Filesystem("store path is not valid UTF-8".to_string()))?,
        None => config.store_root()?,
    };
    let store = JsonStore::open(&root, &database);

    match cli.command {
        Commands::Download(args) => run_download(args, App::new(store, database), &config, cli.json),
        Commands::Upload(args) => run_upload(args, App::new(store, database), &config, cli.json),
        Commands::CreateTable(args) => {
            store.create_table(&args.table, &args.primary_key)?;
            println!("created table {} in {}", args.table, store.database_root());
            Ok(())
        }
        Commands::Tables => {
            for table in store.list_tables()? {
                println!("{table}");
            }
            Ok(())
        }
    }
}

fn run_download(
    args: DownloadArgs,
    app: App<JsonStore>,
    config: &ResolvedConfig,
    json: bool,
) -> miette::Result<()> {
    let options = DownloadOptions {
        virus: args.virus.parse::<VirusName>()?,
        format: args.ftype.parse::<OutputFormat>()?,
        output_path: args
            .path
            .unwrap_or_else(|| PathBuf::from(&config.output_path)),
        fstem: args.fstem,
        fasta_fields: if args.fasta_fields.is_empty() {
            config.fasta_fields.clone()
        } else {
            args.fasta_fields
        },
        join_key: config.join_key.clone(),
        filter: FilterOptions {
            present: args.present,
            select: parse_selections(&args.select)?,
            public_only: args.public_only,
            intervals: parse_intervals(&args.interval)?,
            relaxed_interval: args.relaxed_interval,
        },
        pick_longest: args.pick_longest,
    };

    if json {
        let result = app.download(&options, &JsonOutput)?;
        JsonOutput::print_download(&result).into_diagnostic()?;
    } else {
        let result = app.download(&options, &LogSink)?;
        print_download_summary(&result);
    }
    Ok(())
}

fn run_upload(
    args: UploadArgs,
    app: App<JsonStore>,
    config: &ResolvedConfig,
    json: bool,
) -> miette::Result<()> {
    let options = UploadOptions {
        virus: args.virus.parse::<VirusName>()?,
        table: args.table,
        input: args.fname,
        format: args.ftype,
        header_fields: config.header_fields.clone(),
        default_locus: args.locus.or_else(|| config.default_locus.clone()),
        timestamp: None,
        dry_run: args.dry_run,
    };

    if json {
        let result = app.upload(&options, &JsonOutput)?;
        JsonOutput::print_upload(&result).into_diagnostic()?;
    } else {
        let result = app.upload(&options, &LogSink)?;
        print_upload_summary(&result);
    }
    Ok(())
}

fn print_download_summary(result: &DownloadResult) {
    println!(
        "{} of {} documents written to {} ({:.2} minutes)",
        result.written,
        result.downloaded,
        result.output,
        result.elapsed_ms as f64 / 60_000.0
    );
}

fn print_upload_summary(result: &UploadResult) {
    let verb = if result.dry_run { "would insert" } else { "inserted" };
    println!(
        "{}: {verb} {}, updated {}, merged {}, unchanged {} (parsed {})",
        result.table, result.inserted, result.updated, result.merged, result.unchanged, result.parsed
    );
}
