// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! SQLite joke store

use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::JokeRepository;
use crate::models::{join_categories, sort_names, ActiveInd, Joke, JokeCategory};
use crate::{DadabaseError, Result};

const JOKE_COLUMNS: &str = r#"j.joke_id, j.joke_txt, j.attribution, j.image_txt, j.active_ind,
    j.sort_order_nbr, j.create_date_time, j.create_user_name, j.change_date_time, j.change_user_name,
    (SELECT AVG(r.rating) FROM JokeRating r WHERE r.joke_id = j.joke_id),
    (SELECT COUNT(*) FROM JokeRating r WHERE r.joke_id = j.joke_id)"#;

/// Joke repository backed by SQLite (thread-safe wrapper)
#[derive(Clone)]
pub struct SqlJokeRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqlJokeRepository {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.initialize()?;
        Ok(repo)
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.initialize()?;
        Ok(repo)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| DadabaseError::Storage("Database lock poisoned".to_string()))
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS Joke (
                joke_id INTEGER PRIMARY KEY AUTOINCREMENT,
                joke_txt TEXT NOT NULL,
                attribution TEXT,
                image_txt TEXT,
                active_ind TEXT NOT NULL DEFAULT 'Y',
                sort_order_nbr INTEGER NOT NULL DEFAULT 50,
                create_date_time TEXT NOT NULL,
                create_user_name TEXT NOT NULL,
                change_date_time TEXT NOT NULL,
                change_user_name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS JokeCategory (
                joke_category_id INTEGER PRIMARY KEY AUTOINCREMENT,
                joke_category_txt TEXT NOT NULL,
                active_ind TEXT NOT NULL DEFAULT 'Y',
                sort_order_nbr INTEGER NOT NULL DEFAULT 50,
                create_date_time TEXT NOT NULL,
                create_user_name TEXT NOT NULL,
                change_date_time TEXT NOT NULL,
                change_user_name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS JokeJokeCategory (
                joke_id INTEGER NOT NULL REFERENCES Joke(joke_id),
                joke_category_id INTEGER NOT NULL REFERENCES JokeCategory(joke_category_id),
                create_date_time TEXT NOT NULL,
                create_user_name TEXT NOT NULL,
                PRIMARY KEY (joke_id, joke_category_id)
            );

            CREATE TABLE IF NOT EXISTS JokeRating (
                joke_rating_id INTEGER PRIMARY KEY AUTOINCREMENT,
                joke_id INTEGER NOT NULL REFERENCES Joke(joke_id),
                rating REAL NOT NULL,
                create_date_time TEXT NOT NULL,
                create_user_name TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_joke_active ON Joke(active_ind);
            CREATE INDEX IF NOT EXISTS idx_category_txt ON JokeCategory(joke_category_txt COLLATE NOCASE);
            "#,
        )?;
        Ok(())
    }

    /// Category names per joke id, each list alphabetical
    fn category_names(conn: &Connection) -> Result<HashMap<i64, Vec<String>>> {
        let mut stmt = conn.prepare(
            r#"SELECT jjc.joke_id, c.joke_category_txt
               FROM JokeJokeCategory jjc
               JOIN JokeCategory c ON c.joke_category_id = jjc.joke_category_id"#,
        )?;
        let mut names: HashMap<i64, Vec<String>> = HashMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (joke_id, name) = row?;
            names.entry(joke_id).or_default().push(name);
        }
        Ok(names)
    }

    fn load_one(&self, id: i64) -> Result<Option<Joke>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {} FROM Joke j WHERE j.joke_id = ?1", JOKE_COLUMNS);
        let joke = conn.query_row(&sql, params![id], joke_from_row).optional()?;
        let Some(mut joke) = joke else {
            return Ok(None);
        };
        let mut stmt = conn.prepare(
            r#"SELECT c.joke_category_txt FROM JokeJokeCategory jjc
               JOIN JokeCategory c ON c.joke_category_id = jjc.joke_category_id
               WHERE jjc.joke_id = ?1"#,
        )?;
        let names = stmt
            .query_map(params![id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        joke.categories = join_categories(names);
        Ok(Some(joke))
    }

    fn random_joke(&self) -> Result<Option<Joke>> {
        let ids: Vec<i64> = {
            let conn = self.lock_conn()?;
            let mut stmt = conn.prepare("SELECT joke_id FROM Joke WHERE active_ind = 'Y'")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };
        if ids.is_empty() {
            return Ok(None);
        }
        let pick = ids[rand::rng().random_range(0..ids.len())];
        self.load_one(pick)
    }

    fn try_update_image_txt(&self, joke_id: i64, image_txt: &str, user: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            r#"UPDATE Joke SET image_txt = ?1, change_date_time = ?2, change_user_name = ?3
               WHERE joke_id = ?4"#,
            params![image_txt, now_text(), user, joke_id],
        )?;
        Ok(changed > 0)
    }

    fn try_update_joke(&self, joke: &Joke, user: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            r#"UPDATE Joke SET joke_txt = ?1, attribution = ?2, image_txt = ?3, sort_order_nbr = ?4,
                   active_ind = ?5, change_date_time = ?6, change_user_name = ?7
               WHERE joke_id = ?8"#,
            params![
                joke.joke_txt.trim(),
                joke.attribution,
                joke.image_txt,
                joke.sort_order_nbr,
                joke.active_ind.as_str(),
                now_text(),
                user,
                joke.joke_id
            ],
        )?;
        Ok(changed > 0)
    }

    fn try_update_joke_categories(&self, joke_id: i64, category_ids: &[i64], user: &str) -> Result<bool> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM Joke WHERE joke_id = ?1)",
            params![joke_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(false);
        }

        let mut ids = category_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        for id in &ids {
            let known: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM JokeCategory WHERE joke_category_id = ?1)",
                params![id],
                |row| row.get(0),
            )?;
            if !known {
                debug!("Unknown category {} for joke {}", id, joke_id);
                return Ok(false);
            }
        }

        tx.execute("DELETE FROM JokeJokeCategory WHERE joke_id = ?1", params![joke_id])?;
        let now = now_text();
        for id in &ids {
            tx.execute(
                r#"INSERT INTO JokeJokeCategory (joke_id, joke_category_id, create_date_time, create_user_name)
                   VALUES (?1, ?2, ?3, ?4)"#,
                params![joke_id, id, now, user],
            )?;
        }
        tx.execute(
            "UPDATE Joke SET change_date_time = ?1, change_user_name = ?2 WHERE joke_id = ?3",
            params![now, user, joke_id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn try_add_joke(&self, joke: &Joke, user: &str) -> Result<i64> {
        let conn = self.lock_conn()?;
        let now = now_text();
        conn.execute(
            r#"INSERT INTO Joke (joke_txt, attribution, image_txt, active_ind, sort_order_nbr,
                   create_date_time, create_user_name, change_date_time, change_user_name)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?6, ?7)"#,
            params![
                joke.joke_txt.trim(),
                joke.attribution,
                joke.image_txt,
                joke.active_ind.as_str(),
                joke.sort_order_nbr,
                now,
                user
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Record a vote for a joke
    pub fn add_rating(&self, joke_id: i64, rating: f64, user: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            r#"INSERT INTO JokeRating (joke_id, rating, create_date_time, create_user_name)
               VALUES (?1, ?2, ?3, ?4)"#,
            params![joke_id, rating, now_text(), user],
        )?;
        Ok(())
    }
}

impl JokeRepository for SqlJokeRepository {
    fn backend_name(&self) -> &'static str {
        "sql"
    }

    fn get_random_joke(&self) -> Joke {
        match self.random_joke() {
            Ok(Some(joke)) => joke,
            Ok(None) => Joke::no_jokes(),
            Err(e) => {
                warn!("Random joke lookup failed: {}", e);
                Joke::no_jokes()
            }
        }
    }

    fn get_one(&self, id: i64) -> Joke {
        match self.load_one(id) {
            Ok(Some(joke)) => joke,
            Ok(None) => Joke::not_found(),
            Err(e) => {
                warn!("Joke {} lookup failed: {}", id, e);
                Joke::not_found()
            }
        }
    }

    fn list_all(&self, active_ind: ActiveInd) -> Result<Vec<Joke>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {} FROM Joke j WHERE j.active_ind = ?1 ORDER BY j.joke_id",
            JOKE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut jokes = stmt
            .query_map(params![active_ind.as_str()], joke_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut names = Self::category_names(&conn)?;
        for joke in &mut jokes {
            if let Some(list) = names.remove(&joke.joke_id) {
                joke.categories = join_categories(list);
            }
        }
        Ok(jokes)
    }

    fn get_joke_categories(&self) -> Result<Vec<String>> {
        let conn = self.lock_conn()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT joke_category_txt FROM JokeCategory WHERE active_ind = 'Y'")?;
        let mut names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        sort_names(&mut names);
        Ok(names)
    }

    fn get_all_categories(&self) -> Result<Vec<JokeCategory>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT joke_category_id, joke_category_txt, active_ind, sort_order_nbr,
                   create_date_time, create_user_name, change_date_time, change_user_name
               FROM JokeCategory"#,
        )?;
        let mut categories = stmt
            .query_map([], category_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        categories.sort_by(|a, b| {
            a.joke_category_txt
                .to_lowercase()
                .cmp(&b.joke_category_txt.to_lowercase())
        });
        Ok(categories)
    }

    fn update_image_txt(&self, joke_id: i64, image_txt: &str, user: &str) -> bool {
        self.try_update_image_txt(joke_id, image_txt, user)
            .unwrap_or_else(|e| {
                warn!("Failed to update image text for joke {}: {}", joke_id, e);
                false
            })
    }

    fn update_joke(&self, joke: &Joke, user: &str) -> bool {
        if joke.joke_txt.trim().is_empty() {
            return false;
        }
        self.try_update_joke(joke, user).unwrap_or_else(|e| {
            warn!("Failed to update joke {}: {}", joke.joke_id, e);
            false
        })
    }

    fn update_joke_categories(&self, joke_id: i64, category_ids: &[i64], user: &str) -> bool {
        self.try_update_joke_categories(joke_id, category_ids, user)
            .unwrap_or_else(|e| {
                warn!("Failed to update categories for joke {}: {}", joke_id, e);
                false
            })
    }

    fn add_joke(&self, joke: &Joke, user: &str) -> i64 {
        if joke.joke_txt.trim().is_empty() {
            return -1;
        }
        self.try_add_joke(joke, user).unwrap_or_else(|e| {
            warn!("Failed to add joke: {}", e);
            -1
        })
    }

    fn add_category(&self, name: &str, user: &str) -> Result<JokeCategory> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DadabaseError::Validation("Category name is empty".to_string()));
        }
        let conn = self.lock_conn()?;
        let existing = conn
            .query_row(
                r#"SELECT joke_category_id, joke_category_txt, active_ind, sort_order_nbr,
                       create_date_time, create_user_name, change_date_time, change_user_name
                   FROM JokeCategory WHERE LOWER(joke_category_txt) = LOWER(?1)
                   ORDER BY joke_category_id LIMIT 1"#,
                params![name],
                category_from_row,
            )
            .optional()?;
        if let Some(category) = existing {
            return Ok(category);
        }

        let now = now_text();
        conn.execute(
            r#"INSERT INTO JokeCategory (joke_category_txt, active_ind, sort_order_nbr,
                   create_date_time, create_user_name, change_date_time, change_user_name)
               VALUES (?1, 'Y', 50, ?2, ?3, ?2, ?3)"#,
            params![name, now, user],
        )?;
        debug!("Created category {}", name);
        Ok(JokeCategory::new(conn.last_insert_rowid(), name, user))
    }

    fn add_joke_category(&self, joke_id: i64, category_id: i64, user: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let known: bool = conn.query_row(
            r#"SELECT EXISTS(SELECT 1 FROM Joke WHERE joke_id = ?1)
                  AND EXISTS(SELECT 1 FROM JokeCategory WHERE joke_category_id = ?2)"#,
            params![joke_id, category_id],
            |row| row.get(0),
        )?;
        if !known {
            debug!("Not linking unknown joke {} or category {}", joke_id, category_id);
            return Ok(false);
        }
        let added = conn.execute(
            r#"INSERT OR IGNORE INTO JokeJokeCategory (joke_id, joke_category_id, create_date_time, create_user_name)
               VALUES (?1, ?2, ?3, ?4)"#,
            params![joke_id, category_id, now_text(), user],
        )?;
        Ok(added > 0)
    }
}

fn now_text() -> String {
    Utc::now().to_rfc3339()
}

fn parse_time(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn joke_from_row(row: &Row<'_>) -> rusqlite::Result<Joke> {
    let active: String = row.get(4)?;
    let created: String = row.get(6)?;
    let changed: String = row.get(8)?;
    let votes: i64 = row.get(11)?;
    Ok(Joke {
        joke_id: row.get(0)?,
        joke_txt: row.get(1)?,
        categories: String::new(),
        attribution: row.get(2)?,
        image_txt: row.get(3)?,
        active_ind: ActiveInd::from_flag(&active),
        sort_order_nbr: row.get(5)?,
        rating: row.get(10)?,
        vote_count: Some(votes).filter(|v| *v > 0),
        create_date_time: parse_time(&created),
        create_user_name: row.get(7)?,
        change_date_time: parse_time(&changed),
        change_user_name: row.get(9)?,
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<JokeCategory> {
    let active: String = row.get(2)?;
    let created: String = row.get(4)?;
    let changed: String = row.get(6)?;
    Ok(JokeCategory {
        joke_category_id: row.get(0)?,
        joke_category_txt: row.get(1)?,
        active_ind: ActiveInd::from_flag(&active),
        sort_order_nbr: row.get(3)?,
        create_date_time: parse_time(&created),
        create_user_name: row.get(5)?,
        change_date_time: parse_time(&changed),
        change_user_name: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing;

    #[test]
    fn test_repository_contract() {
        let repo = SqlJokeRepository::in_memory().unwrap();
        testing::check_contract(&repo);
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jokes.db");
        let id = {
            let repo = SqlJokeRepository::open(&path).unwrap();
            let id = repo.add_joke(&Joke::new("Persistent pun"), "TEST");
            let cat = repo.add_category("Puns", "TEST").unwrap();
            repo.add_joke_category(id, cat.joke_category_id, "TEST").unwrap();
            id
        };

        let repo = SqlJokeRepository::open(&path).unwrap();
        let joke = repo.get_one(id);
        assert_eq!(joke.joke_txt, "Persistent pun");
        assert_eq!(joke.categories, "Puns");
    }

    #[test]
    fn test_ratings_average() {
        let repo = SqlJokeRepository::in_memory().unwrap();
        let id = repo.add_joke(&Joke::new("Rated"), "TEST");
        assert_eq!(repo.get_one(id).rating, None);

        repo.add_rating(id, 4.0, "A").unwrap();
        repo.add_rating(id, 2.0, "B").unwrap();
        let joke = repo.get_one(id);
        assert_eq!(joke.rating, Some(3.0));
        assert_eq!(joke.vote_count, Some(2));
    }

    #[test]
    fn test_inactive_categories_hidden_from_names() {
        let repo = SqlJokeRepository::in_memory().unwrap();
        repo.add_category("Visible", "TEST").unwrap();
        let hidden = repo.add_category("Hidden", "TEST").unwrap();
        {
            let conn = repo.lock_conn().unwrap();
            conn.execute(
                "UPDATE JokeCategory SET active_ind = 'N' WHERE joke_category_id = ?1",
                params![hidden.joke_category_id],
            )
            .unwrap();
        }
        assert_eq!(repo.get_joke_categories().unwrap(), vec!["Visible"]);
        assert_eq!(repo.get_all_categories().unwrap().len(), 2);
    }
}
