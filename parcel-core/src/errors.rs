use std::{fmt, io, path::PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParcelError>;

/// The part of a download attempt an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Setting up the parts directory before fan-out.
    Prepare,
    Probe,
    /// Range fetch of the segment with the given index.
    Fetch(usize),
    Merge,
    /// Whole-resource fetch used when ranges are unavailable.
    Single,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Prepare => write!(f, "prepare"),
            Stage::Probe => write!(f, "probe"),
            Stage::Fetch(index) => write!(f, "fetch of segment {}", index),
            Stage::Merge => write!(f, "merge"),
            Stage::Single => write!(f, "single-stream fetch"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ParcelError {
    #[error("{stage} failed: could not reach {url}: {source}")]
    Connectivity {
        stage: Stage,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{stage} failed: {message}")]
    Transfer { stage: Stage, message: String },

    #[error("{stage} failed: {}: {source}", .path.display())]
    Filesystem {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid download request: {0}")]
    InvalidRequest(String),

    #[error("worker for segment {index} did not finish: {message}")]
    Worker { index: usize, message: String },
}

impl ParcelError {
    pub(crate) fn connectivity(stage: Stage, url: &str, source: reqwest::Error) -> Self {
        ParcelError::Connectivity {
            stage,
            url: url.to_string(),
            source,
        }
    }

    pub(crate) fn transfer(stage: Stage, message: impl Into<String>) -> Self {
        ParcelError::Transfer {
            stage,
            message: message.into(),
        }
    }

    pub(crate) fn filesystem(stage: Stage, path: impl Into<PathBuf>, source: io::Error) -> Self {
        ParcelError::Filesystem {
            stage,
            path: path.into(),
            source,
        }
    }

    /// Stage the error was raised in, if it is tied to one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ParcelError::Connectivity { stage, .. }
            | ParcelError::Transfer { stage, .. }
            | ParcelError::Filesystem { stage, .. } => Some(*stage),
            ParcelError::Worker { index, .. } => Some(Stage::Fetch(*index)),
            ParcelError::InvalidRequest(_) => None,
        }
    }
}
