// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for DadABase

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Environment label echoed by the diagnostics endpoint
    #[serde(default = "default_environment")]
    pub environment_name: String,

    /// Joke storage settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// AI engine configuration
    #[serde(default)]
    pub ai_engine: EngineConfig,

    /// Batch analysis settings
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Web UI settings
    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite database file. Empty selects the JSON backend.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// JSON joke file used when no database is configured
    #[serde(default = "default_json_path")]
    pub json_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    /// Base URL of an OpenAI-compatible API (e.g. `http://localhost:1234/v1`)
    #[serde(default = "default_engine_url")]
    pub url: String,
    #[serde(default = "default_text_model")]
    pub model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Generation calls are slow on local models, so this is generous
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalyzerConfig {
    /// Maximum jokes per run (0 = no limit)
    #[serde(default = "default_batch_size")]
    pub max_batch_size: usize,
    /// Audit user name written on rows the analyzer touches
    #[serde(default = "default_analyzer_user")]
    pub user_name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_web_host")]
    pub host: String,
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// Where generated joke images are stored and served from
    #[serde(default = "default_images_dir")]
    pub images_dir: String,
}

// Default value functions
fn default_environment() -> String { "Development".to_string() }
fn default_db_path() -> String { "dadabase.db".to_string() }
fn default_json_path() -> String { "data/jokes.json".to_string() }
fn default_engine_url() -> String { "http://localhost:1234/v1".to_string() }
fn default_text_model() -> String { "phi-4".to_string() }
fn default_image_model() -> String { "gpt-image-1".to_string() }
fn default_timeout() -> u64 { 300 }
fn default_max_tokens() -> u32 { 400 }
fn default_temperature() -> f32 { 0.7 }
fn default_batch_size() -> usize { 100 }
fn default_analyzer_user() -> String { "JokeAnalyzer".to_string() }
fn default_web_host() -> String { "127.0.0.1".to_string() }
fn default_web_port() -> u16 { 8080 }
fn default_images_dir() -> String { "images/jokes".to_string() }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment_name: default_environment(),
            database: DatabaseConfig::default(),
            ai_engine: EngineConfig::default(),
            analyzer: AnalyzerConfig::default(),
            web: WebConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            json_path: default_json_path(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            model: default_text_model(),
            image_model: default_image_model(),
            api_key: None,
            timeout_secs: default_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_batch_size(),
            user_name: default_analyzer_user(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
            images_dir: default_images_dir(),
        }
    }
}

impl EngineConfig {
    /// API key shortened for logs: first three characters and the length
    pub fn masked_api_key(&self) -> String {
        mask_secret(self.api_key.as_deref().unwrap_or_default())
    }
}

/// Mask a secret as `abc... (~N bytes)`, or `(0 bytes)` when empty
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "(0 bytes)".to_string();
    }
    let prefix: String = secret.chars().take(3).collect();
    format!("{}... (~{} bytes)", prefix, secret.len())
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::DadabaseError::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// True when jokes come from the JSON file rather than SQLite
    pub fn uses_json_backend(&self) -> bool {
        self.database.path.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.analyzer.max_batch_size, 100);
        assert!(!config.uses_json_backend());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"database": {"path": ""}, "web": {"port": 9000}}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert!(config.uses_json_backend());
        assert_eq!(config.database.json_path, "data/jokes.json");
        assert_eq!(config.web.port, 9000);
        assert_eq!(config.web.host, "127.0.0.1");
        assert_eq!(config.ai_engine.timeout_secs, 300);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.analyzer.max_batch_size = 7;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.analyzer.max_batch_size, 7);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(crate::DadabaseError::Config(_))));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "(0 bytes)");
        assert_eq!(mask_secret("sk-123456"), "sk-... (~9 bytes)");
    }
}
