use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use lyra_dataset_manager::app::App;
use lyra_dataset_manager::error::LyraError;
use lyra_dataset_manager::osf::OsfHttpClient;
use lyra_dataset_manager::output::JsonOutput;
use lyra_dataset_manager::registry::Registry;
use lyra_dataset_manager::zenodo::ZenodoHttpClient;

#[derive(Parser)]
#[command(name = "lyra-dm")]
#[command(about = "Fetch research datasets from archival repositories into local folders")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download one dataset file from an archive record")]
    Fetch(FetchArgs),
    #[command(about = "Download a named group of dataset files ('all' for every group)")]
    FetchGroup(FetchGroupArgs),
    #[command(about = "Mirror a folder subtree of a storage project")]
    FetchTree(FetchTreeArgs),
    #[command(about = "Upload a local file into a storage project")]
    Upload(UploadArgs),
}

#[derive(Args)]
struct FetchArgs {
    dataset: String,

    #[arg(long, default_value = ".")]
    folder: Utf8PathBuf,

    #[arg(long)]
    repository: Option<String>,

    #[arg(long)]
    filename: Option<String>,
}

#[derive(Args)]
struct FetchGroupArgs {
    group: Option<String>,

    #[arg(long, default_value = ".")]
    folder: Utf8PathBuf,

    #[arg(long)]
    repository: Option<String>,
}

#[derive(Args)]
struct FetchTreeArgs {
    #[arg(default_value = "")]
    remote_path: String,

    #[arg(long, default_value = ".")]
    folder: Utf8PathBuf,

    #[arg(long)]
    project: String,

    #[arg(long)]
    token: Option<String>,

    #[arg(long)]
    no_extract: bool,
}

#[derive(Args)]
struct UploadArgs {
    local_file: Utf8PathBuf,

    remote_path: String,

    #[arg(long)]
    project: String,

    #[arg(long)]
    token: Option<String>,

    #[arg(long)]
    no_overwrite: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(lyra) = report.downcast_ref::<LyraError>() {
            return ExitCode::from(map_exit_code(lyra));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &LyraError) -> u8 {
    match error {
        LyraError::UnknownDataset(_)
        | LyraError::UnknownGroup { .. }
        | LyraError::PathNotFound { .. }
        | LyraError::LocalFileNotFound(_) => 2,
        LyraError::ConnectionFailure { .. }
        | LyraError::RemoteRequestFailure { .. }
        | LyraError::StorageHttp(_)
        | LyraError::StorageStatus { .. }
        | LyraError::OverwriteFailed(_)
        | LyraError::UploadFailed(_)
        | LyraError::ClientUnavailable(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let archive = ZenodoHttpClient::new().into_diagnostic()?;
    let storage = OsfHttpClient::new().into_diagnostic()?;
    let app = App::new(Registry::standard(), archive, storage);

    match cli.command {
        Commands::Fetch(args) => {
            let path = app
                .fetch_dataset(
                    &args.dataset,
                    &args.folder,
                    args.repository.as_deref(),
                    args.filename.as_deref(),
                )
                .into_diagnostic()?;
            JsonOutput::print_files(std::slice::from_ref(&path)).into_diagnostic()
        }
        Commands::FetchGroup(args) => {
            let paths = app
                .fetch_group(args.group.as_deref(), &args.folder, args.repository.as_deref())
                .into_diagnostic()?;
            JsonOutput::print_files(&paths).into_diagnostic()
        }
        Commands::FetchTree(args) => {
            let token = credential(args.token);
            let folder = app
                .fetch_tree(
                    &args.remote_path,
                    &args.folder,
                    &args.project,
                    token.as_deref(),
                    !args.no_extract,
                )
                .into_diagnostic()?;
            JsonOutput::print_folder(&folder).into_diagnostic()
        }
        Commands::Upload(args) => {
            let token = credential(args.token);
            app.upload(
                &args.local_file,
                &args.remote_path,
                &args.project,
                token.as_deref(),
                !args.no_overwrite,
            )
            .into_diagnostic()?;
            JsonOutput::print_uploaded(&args.remote_path).into_diagnostic()
        }
    }
}

/// An explicit --token wins; otherwise fall back to the OSF_TOKEN variable.
fn credential(explicit: Option<String>) -> Option<String> {
    explicit.or_else(|| {
        std::env::var("OSF_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty())
    })
}
