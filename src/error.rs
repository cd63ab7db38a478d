//! Crate-wide error type.
//!
//! Nothing here is fatal to the host: every caller that receives an error is
//! expected to keep whatever state it had before the call.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Adapter/device creation, buffer mapping or dispatch failure
    #[error("compute device error: {0}")]
    Device(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt volume asset {path}: {reason}")]
    CorruptAsset { path: PathBuf, reason: String },

    #[error("volume asset version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("resolution mismatch: expected {expected}, found {found}")]
    ResolutionMismatch { expected: u32, found: u32 },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptAsset {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<wgpu::BufferAsyncError> for Error {
    fn from(e: wgpu::BufferAsyncError) -> Self {
        Self::Device(format!("buffer map failed: {}", e))
    }
}

impl From<wgpu::RequestDeviceError> for Error {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        Self::Device(format!("failed to request device: {}", e))
    }
}
