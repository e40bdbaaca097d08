// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! DadABase: a dad joke catalog
//!
//! Jokes and categories live in SQLite (or a read-mostly JSON file). On top
//! of the repository sit search, an editor, a T-SQL export, and an AI batch
//! job that writes scene descriptions and suggests categories.

pub mod ai;
pub mod analyzer;
pub mod config;
pub mod error;
pub mod export;
pub mod images;
pub mod llm;
pub mod models;
pub mod repository;
pub mod web;

pub use config::AppConfig;
pub use error::{DadabaseError, Result};
