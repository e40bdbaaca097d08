// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Local storage for generated joke images (`<dir>/<jokeId>.png`)

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{DadabaseError, Result};

/// Directory of joke images and the URL prefix it is served under
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    url_prefix: String,
}

impl ImageStore {
    pub fn new<P: AsRef<Path>>(dir: P, url_prefix: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, joke_id: i64) -> PathBuf {
        self.dir.join(format!("{}.png", joke_id))
    }

    pub fn url(&self, joke_id: i64) -> String {
        format!("{}/{}.png", self.url_prefix, joke_id)
    }

    /// URL of the stored image, if there is one
    pub fn find(&self, joke_id: i64) -> Option<String> {
        if joke_id <= 0 {
            return None;
        }
        self.path_for(joke_id).is_file().then(|| self.url(joke_id))
    }

    /// Write PNG bytes for a joke and return the public URL
    pub fn save(&self, joke_id: i64, bytes: &[u8]) -> Result<String> {
        if joke_id <= 0 {
            return Err(DadabaseError::Image(format!("Invalid joke id {}", joke_id)));
        }
        if bytes.is_empty() {
            return Err(DadabaseError::Image("Image data is empty".to_string()));
        }
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(joke_id);
        std::fs::write(&path, bytes)?;
        debug!("Saved {} bytes to {:?}", bytes.len(), path);
        Ok(self.url(joke_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_find() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("nested"), "/images/");
        assert_eq!(store.find(5), None);

        let url = store.save(5, b"png").unwrap();
        assert_eq!(url, "/images/5.png");
        assert_eq!(store.find(5).as_deref(), Some("/images/5.png"));
        assert!(store.path_for(5).exists());
    }

    #[test]
    fn test_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), "/images");
        assert!(store.save(0, b"png").is_err());
        assert!(store.save(1, b"").is_err());
        assert_eq!(store.find(0), None);
    }
}
