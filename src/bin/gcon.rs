use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use gcon::config::ConfigLoader;
use gcon::error::{ErrorKind, GconError};
use gcon::ncbi::EntrezHttpClient;
use gcon::output::{JsonOutput, LogSink};
use gcon::pipeline::{Pipeline, ResolveOptions, source_genomes, validate_source_table};
use gcon::store::JsonFileStore;

#[derive(Parser)]
#[command(name = "gcon")]
#[command(about = "Reconcile genetic-marker accessions into scored specimen connections")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch metadata, build connections and write scored reports")]
    Resolve(ResolveArgs),
    #[command(about = "Load and validate a source table without fetching")]
    Validate(ValidateArgs),
    #[command(about = "Show reference information")]
    Info(InfoArgs),
}

#[derive(Args)]
struct ResolveArgs {
    #[arg(short = 'i', long = "input-path", help = "Tab-separated source table (.tsv or .tsv.gz)")]
    input: PathBuf,

    #[arg(short = 'o', long = "output-file", help = "Report path; .json and .tsv are written")]
    output: String,

    #[arg(short = 't', long = "temp-dir", default_value = "tmp")]
    temp_dir: String,

    #[arg(long)]
    cache_file: Option<String>,

    #[arg(long)]
    ignore_duplicates: bool,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    chunk_size: Option<usize>,
}

#[derive(Args)]
struct ValidateArgs {
    #[arg(short = 'i', long = "input-path")]
    input: PathBuf,

    #[arg(long)]
    ignore_duplicates: bool,
}

#[derive(Args)]
struct InfoArgs {
    #[command(subcommand)]
    command: InfoCommand,
}

#[derive(Subcommand)]
enum InfoCommand {
    #[command(about = "List marker prefixes and the genome they refer to")]
    SourceGenomes,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<GconError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GconError) -> u8 {
    match error.kind() {
        ErrorKind::Argument => 2,
        ErrorKind::Retrieval => 3,
        ErrorKind::DataIntegrity => 4,
        ErrorKind::Execution => 1,
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
    match cli.command {
        Commands::Resolve(args) => run_resolve(args),
        Commands::Validate(args) => {
            let summary = validate_source_table(&args.input, args.ignore_duplicates)?;
            JsonOutput::print_validate(&summary).into_diagnostic()
        }
        Commands::Info(args) => match args.command {
            InfoCommand::SourceGenomes => {
                JsonOutput::print_source_genomes(&source_genomes()).into_diagnostic()
            }
        },
    }
}

fn run_resolve(args: ResolveArgs) -> miette::Result<()> {
    let mut config = ConfigLoader::resolve(args.config.as_deref())?;
    if let Some(chunk_size) = args.chunk_size {
        config = config.with_chunk_size(chunk_size)?;
    }

    let store = match &args.cache_file {
        Some(path) => JsonFileStore::open(path.as_str())?,
        None => JsonFileStore::open_default()?,
    };
    let fetcher = EntrezHttpClient::new(&config)?;
    let pipeline = Pipeline::new(store, fetcher, config.chunk_size);

    let options = ResolveOptions {
        source_table: args.input,
        output: Utf8PathBuf::from(args.output),
        work_dir: Utf8PathBuf::from(args.temp_dir),
        ignore_duplicates: args.ignore_duplicates,
    };
    let summary = pipeline.resolve(&options, &LogSink)?;
    JsonOutput::print_resolve(&summary).into_diagnostic()
}
