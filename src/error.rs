use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = ResizeError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ResizeError {
    #[error("unsupported file format")]
    UnsupportedFormat(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid target size {width}x{height}: width and height must be greater than 0")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("target width and height are required")]
    MissingDimensions,

    #[error("invalid quality {0}: must be between 1 and 100")]
    InvalidQuality(u8),

    #[error("worker count must be at least 1")]
    InvalidWorkers,

    #[error("could not find a free output name for {}", .0.display())]
    NameExhausted(PathBuf),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}

impl ResizeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ResizeError::Io {
            path: path.into(),
            source,
        }
    }
}
