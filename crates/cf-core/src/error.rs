use std::io;
use std::path::PathBuf;

use cf_backend::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),
    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("{0}")]
    Backend(#[from] BackendError),
    #[error("input error: {0}")]
    Readline(String),
    #[error("interrupted")]
    Interrupted,
}
