// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Joke repository contract and its two backends
//!
//! Both backends answer not-found conditions with sentinel jokes or
//! `false`, never with errors. `Result` is reserved for storage failures
//! on the read paths.

pub mod json;
pub mod sql;

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::export;
use crate::models::{ActiveInd, Joke, JokeCategory, JsonJokeList};
use crate::{AppConfig, Result};

pub use json::JsonJokeRepository;
pub use sql::SqlJokeRepository;

/// Category filter value meaning "no filter"
pub const ALL_CATEGORIES: &str = "All";

/// Operations every joke store provides
pub trait JokeRepository: Send + Sync {
    /// Short backend label for logs and diagnostics
    fn backend_name(&self) -> &'static str;

    /// Uniformly random active joke, or the "No jokes here!" sentinel
    fn get_random_joke(&self) -> Joke;

    /// Joke with categories resolved, or the "Joke not found!" sentinel
    fn get_one(&self, id: i64) -> Joke;

    /// Search by text and/or comma-separated categories.
    ///
    /// With neither filter this returns exactly one random joke.
    fn search_jokes(&self, search_txt: &str, category_txt: &str) -> Result<Vec<Joke>> {
        let filter = SearchFilter::new(search_txt, category_txt);
        if filter.is_empty() {
            return Ok(vec![self.get_random_joke()]);
        }
        let jokes = self.list_all(ActiveInd::Active)?;
        Ok(filter.apply(jokes))
    }

    /// All jokes with the given flag, ordered by id
    fn list_all(&self, active_ind: ActiveInd) -> Result<Vec<Joke>>;

    /// Distinct active category names, alphabetical
    fn get_joke_categories(&self) -> Result<Vec<String>>;

    /// Every category entity, alphabetical
    fn get_all_categories(&self) -> Result<Vec<JokeCategory>>;

    fn update_image_txt(&self, joke_id: i64, image_txt: &str, user: &str) -> bool;

    /// Overwrite text, attribution, image text, sort order and active flag
    fn update_joke(&self, joke: &Joke, user: &str) -> bool;

    /// Replace the joke's category set with exactly `category_ids`
    fn update_joke_categories(&self, joke_id: i64, category_ids: &[i64], user: &str) -> bool;

    /// Insert a joke; returns the new id or -1
    fn add_joke(&self, joke: &Joke, user: &str) -> i64;

    /// Existing category on a case-insensitive name match, else a new one
    fn add_category(&self, name: &str, user: &str) -> Result<JokeCategory>;

    /// Link a joke to a category; returns whether a row was added
    fn add_joke_category(&self, joke_id: i64, category_id: i64, user: &str) -> Result<bool>;

    /// Render the active joke set and categories as a rebuild script
    fn export_to_sql(&self, user: &str) -> Result<String> {
        let jokes = self.list_all(ActiveInd::Active)?;
        let categories: Vec<JokeCategory> = self
            .get_all_categories()?
            .into_iter()
            .filter(|c| c.active_ind.is_active())
            .collect();
        info!("Exporting {} jokes and {} categories for {}", jokes.len(), categories.len(), user);
        Ok(export::render_sql_script(&jokes, &categories, user, Utc::now()))
    }
}

/// Normalized search request shared by both backends
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilter {
    text: Option<String>,
    categories: Vec<String>,
}

impl SearchFilter {
    pub fn new(search_txt: &str, category_txt: &str) -> Self {
        let text = Some(search_txt.trim().to_lowercase()).filter(|t| !t.is_empty());
        let category_txt = category_txt.trim();
        let categories = if category_txt.eq_ignore_ascii_case(ALL_CATEGORIES) {
            Vec::new()
        } else {
            category_txt
                .split(',')
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect()
        };
        Self { text, categories }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.categories.is_empty()
    }

    pub fn matches(&self, joke: &Joke) -> bool {
        let text_ok = self
            .text
            .as_deref()
            .map_or(true, |t| joke.joke_txt.to_lowercase().contains(t));
        let categories_ok = self.categories.is_empty()
            || joke
                .category_list()
                .iter()
                .any(|c| self.categories.contains(&c.to_lowercase()));
        text_ok && categories_ok
    }

    pub fn apply(&self, jokes: Vec<Joke>) -> Vec<Joke> {
        jokes.into_iter().filter(|j| self.matches(j)).collect()
    }
}

/// Open the backend the configuration asks for
pub fn open_repository(config: &AppConfig) -> Result<Arc<dyn JokeRepository>> {
    if config.uses_json_backend() {
        let repo = JsonJokeRepository::open(&config.database.json_path)?;
        info!("Using JSON joke file: {}", config.database.json_path);
        Ok(Arc::new(repo))
    } else {
        let repo = SqlJokeRepository::open(&config.database.path)?;
        info!("Using SQLite database: {}", config.database.path);
        Ok(Arc::new(repo))
    }
}

/// Import a JSON joke list, creating categories as new names appear.
///
/// Jokes whose text already exists (ignoring case) are skipped.
pub fn import_jokes(repo: &dyn JokeRepository, list: &JsonJokeList, user: &str) -> Result<usize> {
    let mut known: Vec<String> = repo
        .list_all(ActiveInd::Active)?
        .into_iter()
        .chain(repo.list_all(ActiveInd::Inactive)?)
        .map(|j| j.joke_txt.trim().to_lowercase())
        .collect();

    let mut added = 0;
    for entry in &list.jokes {
        let joke = entry.to_joke(0, user);
        let key = joke.joke_txt.trim().to_lowercase();
        if key.is_empty() || known.contains(&key) {
            debug!("Skipping joke already present or empty: {:?}", joke.joke_txt);
            continue;
        }

        let joke_id = repo.add_joke(&joke, user);
        if joke_id < 0 {
            return Err(crate::DadabaseError::Storage(format!(
                "Failed to import joke: {}",
                joke.joke_txt
            )));
        }
        for name in joke.category_list() {
            let category = repo.add_category(&name, user)?;
            repo.add_joke_category(joke_id, category.joke_category_id, user)?;
        }
        known.push(key);
        added += 1;
    }

    info!("Imported {} of {} jokes", added, list.jokes.len());
    Ok(added)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Contract checks run against both backends

    use super::*;

    pub fn seed(repo: &dyn JokeRepository) -> (i64, i64, i64) {
        let puns = repo.add_category("Puns", "TEST").unwrap();
        let animals = repo.add_category("Animals", "TEST").unwrap();
        let food = repo.add_category("food", "TEST").unwrap();

        let a = repo.add_joke(&Joke::new("I'm reading a book about anti-gravity. It's impossible to put down."), "TEST");
        let b = repo.add_joke(&Joke::new("What do you call a fish with no eyes? A fsh.").with_attribution("Dad"), "TEST");
        let c = repo.add_joke(&Joke::new("Why did the cookie go to the doctor? It felt crummy."), "TEST");

        assert!(repo.update_joke_categories(a, &[puns.joke_category_id], "TEST"));
        assert!(repo.update_joke_categories(b, &[animals.joke_category_id, puns.joke_category_id], "TEST"));
        assert!(repo.update_joke_categories(c, &[food.joke_category_id], "TEST"));
        (a, b, c)
    }

    pub fn check_contract(repo: &dyn JokeRepository) {
        assert_eq!(repo.get_random_joke().joke_txt, crate::models::NO_JOKES_TXT);

        let (a, b, c) = seed(repo);

        // categories resolve alphabetically
        assert_eq!(repo.get_one(b).categories, "Animals, Puns");
        assert_eq!(repo.get_one(b).attribution.as_deref(), Some("Dad"));
        assert_eq!(repo.get_one(999).joke_txt, crate::models::NOT_FOUND_TXT);

        // category-only search, case-insensitive, multi-valued
        let hits = repo.search_jokes("", "puns").unwrap();
        assert_eq!(hits.iter().map(|j| j.joke_id).collect::<Vec<_>>(), vec![a, b]);
        let hits = repo.search_jokes("", "FOOD, animals").unwrap();
        assert_eq!(hits.iter().map(|j| j.joke_id).collect::<Vec<_>>(), vec![b, c]);

        // text-only and combined search
        let hits = repo.search_jokes("DOCTOR", "All").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].joke_id, c);
        assert!(repo.search_jokes("doctor", "Puns").unwrap().is_empty());
        assert_eq!(repo.search_jokes("fish", "Puns").unwrap()[0].joke_id, b);

        // no filter -> one random active joke
        let random = repo.search_jokes("", "").unwrap();
        assert_eq!(random.len(), 1);
        assert!([a, b, c].contains(&random[0].joke_id));

        assert_eq!(repo.get_joke_categories().unwrap(), vec!["Animals", "food", "Puns"]);

        // replace-all category edits
        assert!(repo.update_joke_categories(b, &[], "TEST"));
        assert_eq!(repo.get_one(b).categories, "");
        let cats = repo.get_all_categories().unwrap();
        let ids: Vec<i64> = cats.iter().map(|c| c.joke_category_id).collect();
        assert!(repo.update_joke_categories(b, &[ids[2], ids[0]], "TEST"));
        assert_eq!(repo.get_one(b).categories, "Animals, Puns");
        assert!(!repo.update_joke_categories(999, &[ids[0]], "TEST"));
        assert!(!repo.update_joke_categories(b, &[9999], "TEST"));
        assert_eq!(repo.get_one(b).categories, "Animals, Puns");

        // updates
        let mut joke = repo.get_one(a);
        joke.joke_txt = "Updated text".to_string();
        joke.active_ind = ActiveInd::Inactive;
        assert!(repo.update_joke(&joke, "EDITOR"));
        let reloaded = repo.get_one(a);
        assert_eq!(reloaded.joke_txt, "Updated text");
        assert_eq!(reloaded.change_user_name, "EDITOR");
        assert_eq!(repo.list_all(ActiveInd::Inactive).unwrap().len(), 1);
        assert_eq!(repo.list_all(ActiveInd::Active).unwrap().len(), 2);
        let mut missing = Joke::new("ghost");
        missing.joke_id = 999;
        assert!(!repo.update_joke(&missing, "EDITOR"));

        // blank text is refused, padded text is stored trimmed
        let mut blank = repo.get_one(c);
        blank.joke_txt = "   ".to_string();
        assert!(!repo.update_joke(&blank, "EDITOR"));
        assert_eq!(repo.get_one(c).joke_txt, "Why did the cookie go to the doctor? It felt crummy.");
        let mut padded = repo.get_one(c);
        padded.joke_txt = "  Why did the cookie go to the doctor? It felt crummy.  ".to_string();
        assert!(repo.update_joke(&padded, "EDITOR"));
        assert_eq!(repo.get_one(c).joke_txt, "Why did the cookie go to the doctor? It felt crummy.");

        // inactive jokes never come back from the random paths
        for _ in 0..25 {
            assert_ne!(repo.get_random_joke().joke_id, a);
            let random = repo.search_jokes("", "").unwrap();
            assert_eq!(random.len(), 1);
            assert_ne!(random[0].joke_id, a);
        }

        assert!(repo.update_image_txt(c, "A cookie in a hospital bed", "TEST"));
        assert_eq!(repo.get_one(c).image_txt.as_deref(), Some("A cookie in a hospital bed"));
        assert!(!repo.update_image_txt(999, "nothing", "TEST"));

        // add round-trips, failure creates nothing
        let before = repo.list_all(ActiveInd::Active).unwrap().len();
        assert_eq!(repo.add_joke(&Joke::new("   "), "TEST"), -1);
        assert_eq!(repo.list_all(ActiveInd::Active).unwrap().len(), before);
        let id = repo.add_joke(&Joke::new("New one").with_attribution("Kid"), "TEST");
        assert!(id > 0);
        let added = repo.get_one(id);
        assert_eq!(added.joke_txt, "New one");
        assert_eq!(added.attribution.as_deref(), Some("Kid"));
        assert_eq!(added.create_user_name, "TEST");

        assert!(matches!(
            repo.add_category("  ", "TEST"),
            Err(crate::DadabaseError::Validation(_))
        ));

        // category creation is idempotent ignoring case
        let again = repo.add_category("PUNS", "TEST").unwrap();
        assert_eq!(again.joke_category_txt, "Puns");
        assert_eq!(repo.get_all_categories().unwrap().len(), 3);
        assert!(repo.add_joke_category(id, again.joke_category_id, "TEST").unwrap());
        assert!(!repo.add_joke_category(id, again.joke_category_id, "TEST").unwrap());

        // links to unknown rows are refused
        assert!(!repo.add_joke_category(999, again.joke_category_id, "TEST").unwrap());
        assert!(!repo.add_joke_category(id, 9999, "TEST").unwrap());
        assert_eq!(repo.get_one(id).categories, "Puns");

        let best = repo.add_category("Dad's Best", "TEST").unwrap();
        assert!(repo.add_joke_category(c, best.joke_category_id, "TEST").unwrap());

        let script = repo.export_to_sql("TEST").unwrap();
        assert!(script.contains("INSERT INTO @tmpJokes"));
        assert!(!script.contains("Updated text")); // deactivated above
        assert!(script.contains("fsh"));
        assert!(script.contains("(N'Dad''s Best')"));
        assert!(script.contains("(N'Dad''s Best', N'Why did the cookie"));
        assert!(!script.contains("Dad's Best"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_all_means_none() {
        assert!(SearchFilter::new("", "All").is_empty());
        assert!(SearchFilter::new("  ", "all").is_empty());
        assert!(!SearchFilter::new("", "Puns").is_empty());
    }

    #[test]
    fn test_filter_matches_intersection() {
        let joke = Joke::new("A pun about Food").with_categories("Food, Puns");
        assert!(SearchFilter::new("", "animals,puns").matches(&joke));
        assert!(!SearchFilter::new("", "animals").matches(&joke));
        assert!(SearchFilter::new("PUN", "").matches(&joke));
        assert!(!SearchFilter::new("pun", "animals").matches(&joke));
    }

    #[test]
    fn test_import_creates_categories_once() {
        let repo = SqlJokeRepository::in_memory().unwrap();
        let list: JsonJokeList = serde_json::from_str(
            r#"{"Jokes": [
                {"JokeCategoryTxt": "Puns", "JokeTxt": "One", "Attribution": ""},
                {"JokeCategoryTxt": "puns, Animals", "JokeTxt": "Two", "Attribution": "Dad"},
                {"JokeCategoryTxt": "Puns", "JokeTxt": "one", "Attribution": ""}
            ]}"#,
        )
        .unwrap();

        assert_eq!(import_jokes(&repo, &list, "SEED").unwrap(), 2);
        assert_eq!(repo.get_joke_categories().unwrap(), vec!["Animals", "Puns"]);
        let two = repo.search_jokes("two", "").unwrap();
        assert_eq!(two[0].categories, "Animals, Puns");

        // rerun adds nothing
        assert_eq!(import_jokes(&repo, &list, "SEED").unwrap(), 0);
    }

    #[test]
    fn test_open_repository_picks_backend() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("jokes.json");
        std::fs::write(&json_path, r#"{"Jokes": []}"#).unwrap();

        let mut config = AppConfig::default();
        config.database.path = String::new();
        config.database.json_path = json_path.to_string_lossy().to_string();
        assert_eq!(open_repository(&config).unwrap().backend_name(), "json");

        config.database.path = dir.path().join("jokes.db").to_string_lossy().to_string();
        assert_eq!(open_repository(&config).unwrap().backend_name(), "sql");
    }
}
