// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Read-mostly joke store loaded from the flat JSON seed file.
//!
//! Mutations live in memory for the life of the process; the file on disk
//! is never rewritten.

use chrono::Utc;
use rand::Rng;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use super::JokeRepository;
use crate::models::{join_categories, sort_names, ActiveInd, Joke, JokeCategory, JsonJokeList};
use crate::{DadabaseError, Result};

const LOADER_USER: &str = "JSON";

#[derive(Default)]
struct JsonStore {
    jokes: Vec<Joke>,
    categories: Vec<JokeCategory>,
    /// (joke_id, joke_category_id)
    links: BTreeSet<(i64, i64)>,
}

impl JsonStore {
    fn next_joke_id(&self) -> i64 {
        self.jokes.iter().map(|j| j.joke_id).max().unwrap_or(0) + 1
    }

    fn find_or_create_category(&mut self, name: &str, user: &str) -> JokeCategory {
        if let Some(existing) = self.categories.iter().find(|c| c.matches_name(name)) {
            return existing.clone();
        }
        let id = self
            .categories
            .iter()
            .map(|c| c.joke_category_id)
            .max()
            .unwrap_or(0)
            + 1;
        let category = JokeCategory::new(id, name.trim(), user);
        self.categories.push(category.clone());
        category
    }

    /// Copy of the joke with its category string rebuilt from the links
    fn resolved(&self, joke: &Joke) -> Joke {
        let names = self
            .links
            .iter()
            .filter(|(joke_id, _)| *joke_id == joke.joke_id)
            .filter_map(|(_, cat_id)| {
                self.categories
                    .iter()
                    .find(|c| c.joke_category_id == *cat_id)
                    .map(|c| c.joke_category_txt.clone())
            });
        let mut joke = joke.clone();
        joke.categories = join_categories(names);
        joke
    }

    fn joke_mut(&mut self, joke_id: i64) -> Option<&mut Joke> {
        self.jokes.iter_mut().find(|j| j.joke_id == joke_id)
    }
}

/// Joke repository over an in-memory copy of the JSON joke file
pub struct JsonJokeRepository {
    store: Mutex<JsonStore>,
}

impl JsonJokeRepository {
    /// Load the JSON joke file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let list = JsonJokeList::load(path).map_err(|e| {
            DadabaseError::Storage(format!("Failed to load jokes from {}: {}", path.display(), e))
        })?;
        let repo = Self::from_list(&list);
        let loaded = repo.lock_store()?.jokes.len();
        info!("Loaded {} jokes from {}", loaded, path.display());
        Ok(repo)
    }

    /// Build the store from an already parsed list; ids follow file order.
    ///
    /// Entries without joke text are dropped.
    pub fn from_list(list: &JsonJokeList) -> Self {
        let mut store = JsonStore::default();
        for (index, entry) in list.jokes.iter().enumerate() {
            let mut joke = entry.to_joke(store.next_joke_id(), LOADER_USER);
            joke.joke_txt = joke.joke_txt.trim().to_string();
            if joke.joke_txt.is_empty() {
                warn!("Skipping entry {} in joke file: no joke text", index + 1);
                continue;
            }
            for name in joke.category_list() {
                let category = store.find_or_create_category(&name, LOADER_USER);
                store.links.insert((joke.joke_id, category.joke_category_id));
            }
            store.jokes.push(joke);
        }
        Self {
            store: Mutex::new(store),
        }
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, JsonStore>> {
        self.store
            .lock()
            .map_err(|_| DadabaseError::Storage("Joke store lock poisoned".to_string()))
    }
}

impl JokeRepository for JsonJokeRepository {
    fn backend_name(&self) -> &'static str {
        "json"
    }

    fn get_random_joke(&self) -> Joke {
        let Ok(store) = self.lock_store() else {
            return Joke::no_jokes();
        };
        let active: Vec<&Joke> = store.jokes.iter().filter(|j| j.active_ind.is_active()).collect();
        if active.is_empty() {
            return Joke::no_jokes();
        }
        let pick = active[rand::rng().random_range(0..active.len())];
        store.resolved(pick)
    }

    fn get_one(&self, id: i64) -> Joke {
        let Ok(store) = self.lock_store() else {
            return Joke::not_found();
        };
        store
            .jokes
            .iter()
            .find(|j| j.joke_id == id)
            .map(|j| store.resolved(j))
            .unwrap_or_else(Joke::not_found)
    }

    fn list_all(&self, active_ind: ActiveInd) -> Result<Vec<Joke>> {
        let store = self.lock_store()?;
        let mut jokes: Vec<Joke> = store
            .jokes
            .iter()
            .filter(|j| j.active_ind == active_ind)
            .map(|j| store.resolved(j))
            .collect();
        jokes.sort_by_key(|j| j.joke_id);
        Ok(jokes)
    }

    fn get_joke_categories(&self) -> Result<Vec<String>> {
        let store = self.lock_store()?;
        let mut names: Vec<String> = store
            .categories
            .iter()
            .filter(|c| c.active_ind.is_active())
            .map(|c| c.joke_category_txt.clone())
            .collect();
        sort_names(&mut names);
        names.dedup();
        Ok(names)
    }

    fn get_all_categories(&self) -> Result<Vec<JokeCategory>> {
        let store = self.lock_store()?;
        let mut categories = store.categories.clone();
        categories.sort_by(|a, b| {
            a.joke_category_txt
                .to_lowercase()
                .cmp(&b.joke_category_txt.to_lowercase())
        });
        Ok(categories)
    }

    fn update_image_txt(&self, joke_id: i64, image_txt: &str, user: &str) -> bool {
        let Ok(mut store) = self.lock_store() else {
            warn!("Joke store unavailable, image text for {} not saved", joke_id);
            return false;
        };
        match store.joke_mut(joke_id) {
            Some(joke) => {
                joke.image_txt = Some(image_txt.to_string());
                joke.change_date_time = Utc::now();
                joke.change_user_name = user.to_string();
                true
            }
            None => false,
        }
    }

    fn update_joke(&self, joke: &Joke, user: &str) -> bool {
        if joke.joke_txt.trim().is_empty() {
            return false;
        }
        let Ok(mut store) = self.lock_store() else {
            return false;
        };
        match store.joke_mut(joke.joke_id) {
            Some(stored) => {
                stored.joke_txt = joke.joke_txt.trim().to_string();
                stored.attribution = joke.attribution.clone();
                stored.image_txt = joke.image_txt.clone();
                stored.sort_order_nbr = joke.sort_order_nbr;
                stored.active_ind = joke.active_ind;
                stored.change_date_time = Utc::now();
                stored.change_user_name = user.to_string();
                true
            }
            None => false,
        }
    }

    fn update_joke_categories(&self, joke_id: i64, category_ids: &[i64], user: &str) -> bool {
        let Ok(mut store) = self.lock_store() else {
            return false;
        };
        if store.joke_mut(joke_id).is_none() {
            return false;
        }
        let all_known = category_ids
            .iter()
            .all(|id| store.categories.iter().any(|c| c.joke_category_id == *id));
        if !all_known {
            return false;
        }

        store.links.retain(|(j, _)| *j != joke_id);
        for id in category_ids {
            store.links.insert((joke_id, *id));
        }
        if let Some(joke) = store.joke_mut(joke_id) {
            joke.change_date_time = Utc::now();
            joke.change_user_name = user.to_string();
        }
        true
    }

    fn add_joke(&self, joke: &Joke, user: &str) -> i64 {
        if joke.joke_txt.trim().is_empty() {
            return -1;
        }
        let Ok(mut store) = self.lock_store() else {
            return -1;
        };
        let now = Utc::now();
        let mut stored = joke.clone();
        stored.joke_id = store.next_joke_id();
        stored.joke_txt = joke.joke_txt.trim().to_string();
        stored.categories = String::new();
        stored.create_date_time = now;
        stored.create_user_name = user.to_string();
        stored.change_date_time = now;
        stored.change_user_name = user.to_string();
        let id = stored.joke_id;
        store.jokes.push(stored);
        id
    }

    fn add_category(&self, name: &str, user: &str) -> Result<JokeCategory> {
        if name.trim().is_empty() {
            return Err(DadabaseError::Validation("Category name is empty".to_string()));
        }
        let mut store = self.lock_store()?;
        Ok(store.find_or_create_category(name, user))
    }

    fn add_joke_category(&self, joke_id: i64, category_id: i64, _user: &str) -> Result<bool> {
        let mut store = self.lock_store()?;
        let known = store.jokes.iter().any(|j| j.joke_id == joke_id)
            && store.categories.iter().any(|c| c.joke_category_id == category_id);
        if !known {
            return Ok(false);
        }
        Ok(store.links.insert((joke_id, category_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing;

    #[test]
    fn test_repository_contract() {
        let repo = JsonJokeRepository::from_list(&JsonJokeList::default());
        testing::check_contract(&repo);
    }

    #[test]
    fn test_open_file_builds_categories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jokes.json");
        std::fs::write(
            &path,
            r#"{"Jokes": [
                {"JokeCategoryTxt": "Puns, Food", "JokeTxt": "Lettuce joke", "Attribution": ""},
                {"JokeCategoryTxt": "puns", "JokeTxt": "Another pun", "Attribution": "Dad"}
            ]}"#,
        )
        .unwrap();

        let repo = JsonJokeRepository::open(&path).unwrap();
        assert_eq!(repo.get_joke_categories().unwrap(), vec!["Food", "Puns"]);
        assert_eq!(repo.get_one(1).categories, "Food, Puns");
        assert_eq!(repo.get_one(2).categories, "Puns");
        assert_eq!(repo.search_jokes("", "PUNS").unwrap().len(), 2);
    }

    #[test]
    fn test_blank_entries_are_dropped() {
        let list: JsonJokeList = serde_json::from_str(
            r#"{"Jokes": [
                {"JokeCategoryTxt": "Puns", "JokeTxt": ""},
                {"JokeCategoryTxt": "Puns", "JokeTxt": "   "}
            ]}"#,
        )
        .unwrap();
        let repo = JsonJokeRepository::from_list(&list);
        assert_eq!(repo.get_random_joke().joke_txt, crate::models::NO_JOKES_TXT);
        assert!(repo.list_all(ActiveInd::Active).unwrap().is_empty());
        assert!(repo.get_joke_categories().unwrap().is_empty());

        let list: JsonJokeList = serde_json::from_str(
            r#"{"Jokes": [
                {"JokeTxt": ""},
                {"JokeCategoryTxt": "Puns", "JokeTxt": " Kept "}
            ]}"#,
        )
        .unwrap();
        let repo = JsonJokeRepository::from_list(&list);
        let kept = repo.get_one(1);
        assert_eq!(kept.joke_txt, "Kept");
        assert_eq!(kept.categories, "Puns");
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(JsonJokeRepository::open(dir.path().join("missing.json")).is_err());
    }
}
