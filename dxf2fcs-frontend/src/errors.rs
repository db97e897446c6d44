use std::path::PathBuf;

use dxf2fcs_engine::errors::EngineError;
use dxf2fcs_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("the dxf file does not exist: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error("unknown vertex style `{0}` (expected `compact` or `verbose`)")]
    InvalidVertexStyle(String),
    #[error("cannot write output {}: {reason}", path.display())]
    OutputNotWritable { path: PathBuf, reason: String },
    #[error(transparent)]
    Load(#[from] IoError),
    #[error("conversion failed: {0}")]
    Convert(#[from] EngineError),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
