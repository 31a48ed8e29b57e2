use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SkeletonError {
    #[error("hand skeleton must have 21 keypoints, got {found}")]
    KeypointCount { found: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write config {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("hand crop is empty")]
    EmptyCrop,
    #[error("failed to resize hand crop: {0}")]
    Resize(String),
    #[error("failed to encode hand crop: {0}")]
    Encode(#[from] image::ImageError),
    #[error("verifier request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("verifier returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("verifier response had no text")]
    EmptyResponse,
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("keystroke injection failed: {0}")]
    Injection(String),
    #[error("no transcriber configured")]
    NoTranscriber,
}
