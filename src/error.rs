// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for DadABase

use thiserror::Error;

/// Result type alias for DadABase operations
pub type Result<T> = std::result::Result<T, DadabaseError>;

/// DadABase error types
#[derive(Error, Debug)]
pub enum DadabaseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("AI engine not available: {0}")]
    AiUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
