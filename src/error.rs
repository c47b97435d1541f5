use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum LyraError {
    #[error(
        "dataset {0} is not in the registry; pass an explicit repository id to fetch datasets from external repositories"
    )]
    UnknownDataset(String),

    #[error("'{name}' is not a valid dataset group (available groups: {available})")]
    UnknownGroup { name: String, available: String },

    #[error("connection to the archive service failed while fetching {dataset}: {cause}")]
    ConnectionFailure { dataset: String, cause: String },

    #[error("archive service returned status {status}: {message}")]
    RemoteRequestFailure { status: u16, message: String },

    #[error("folder '{segment}' not found while resolving remote path '{path}'")]
    PathNotFound { segment: String, path: String },

    #[error("local file not found: {0}")]
    LocalFileNotFound(Utf8PathBuf),

    #[error("failed to delete existing remote file before overwrite: {0}")]
    OverwriteFailed(String),

    #[error("failed to upload file: {0}")]
    UploadFailed(String),

    #[error("corrupt entry {entry} in archive {archive}")]
    CorruptArchive { archive: String, entry: String },

    #[error("http client unavailable: {0}")]
    ClientUnavailable(String),

    #[error("storage request failed: {0}")]
    StorageHttp(String),

    #[error("storage service returned status {status}: {message}")]
    StorageStatus { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("cannot insert figure, source file does not exist: {0}")]
    FigureNotFound(Utf8PathBuf),

    #[error("cannot insert table, source file does not exist: {0}")]
    TableNotFound(Utf8PathBuf),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("report build failed: {0}")]
    ReportBuild(String),
}
