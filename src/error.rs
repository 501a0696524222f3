use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while locating, assembling or loading measurement data.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("serial number must be a non-negative integer, got {0}")]
    InvalidSerialNumber(String),

    #[error("no folder matching '#{serial}_*' under {}", .root.display())]
    FolderNotFound { serial: u64, root: PathBuf },

    #[error("no '{target}.{extension}' file in {}", .folder.display())]
    DatasetFileNotFound {
        folder: PathBuf,
        target: String,
        extension: String,
    },

    #[error("stream handle '{0}' not found")]
    MissingStream(String),

    #[error("fetching stream '{stream}' failed: {message}")]
    Fetch { stream: String, message: String },

    #[error("shape mismatch for {variable}{qubit_index}: got {got:?}, expected {expected:?}")]
    ShapeMismatch {
        variable: String,
        /// 1-based, as in the stream name.
        qubit_index: usize,
        got: Vec<usize>,
        expected: Vec<usize>,
    },

    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("invalid calibration state: {0}")]
    InvalidState(String),

    #[error("calibration state is unavailable for {}", .0.display())]
    MachineUnavailable(PathBuf),

    #[error("qubit '{0}' is not present in the calibration state")]
    UnknownQubit(String),

    #[error("metadata has no '{0}' section")]
    MissingMetadata(&'static str),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("unsupported dataset file extension: .{0}")]
    UnsupportedFormat(String),

    #[error("invalid settings: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

impl StorageError {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
