use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LongsegError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read NIfTI header of {path}: {message}")]
    NiftiHeader { path: PathBuf, message: String },

    #[error("Source file missing before move: {0}")]
    MissingSource(PathBuf),

    #[error("Move did not materialize target {dest} (from {src})")]
    MoveFailed { src: PathBuf, dest: PathBuf },

    #[error("{tool} exited with {status}")]
    ToolFailed { tool: String, status: String },

    #[error("{tool} succeeded but expected outputs are missing: {missing:?}")]
    MissingOutputs { tool: String, missing: Vec<PathBuf> },

    #[error("Stats parse error in {path}: {message}")]
    StatsParse { path: PathBuf, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

pub type Result<T> = std::result::Result<T, LongsegError>;
