// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! T-SQL export of the joke catalog
//!
//! The script stages every (joke, category) pair in table variables and
//! then merges them into `JokeCategory`, `Joke` and `JokeJokeCategory`,
//! skipping rows that already exist. Running it twice is harmless.

use chrono::{DateTime, Utc};

use crate::models::{split_categories, Joke, JokeCategory};

/// Rows per `INSERT ... VALUES` statement (SQL Server caps a list at 1000)
pub const EXPORT_BATCH_SIZE: usize = 500;

/// Download name for an export generated at `now`
pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("JokeExport_{}.sql", now.format("%Y%m%d_%H%M%S"))
}

/// `N'...'` literal with quotes doubled, or `NULL`
pub fn sql_literal(value: Option<&str>) -> String {
    match value {
        Some(text) => format!("N'{}'", text.replace('\'', "''")),
        None => "NULL".to_string(),
    }
}

fn optional_literal(value: Option<&str>) -> String {
    sql_literal(value.map(str::trim).filter(|v| !v.is_empty()))
}

/// Render the full rebuild script
pub fn render_sql_script(
    jokes: &[Joke],
    categories: &[JokeCategory],
    user: &str,
    generated_at: DateTime<Utc>,
) -> String {
    let mut category_rows: Vec<String> = categories
        .iter()
        .map(|c| c.joke_category_txt.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    for joke in jokes {
        for name in split_categories(&joke.categories) {
            if !category_rows.iter().any(|c| c.eq_ignore_ascii_case(&name)) {
                category_rows.push(name);
            }
        }
    }

    let mut joke_rows = Vec::new();
    for joke in jokes {
        let text = sql_literal(Some(joke.joke_txt.trim()));
        let attribution = optional_literal(joke.attribution.as_deref());
        let image = optional_literal(joke.image_txt.as_deref());
        let names = split_categories(&joke.categories);
        if names.is_empty() {
            joke_rows.push(format!("(N'', {}, {}, {})", text, attribution, image));
        }
        for name in names {
            joke_rows.push(format!(
                "({}, {}, {}, {})",
                sql_literal(Some(&name)),
                text,
                attribution,
                image
            ));
        }
    }

    let mut out = String::from("-- DadABase joke export\n");
    out.push_str(&format!(
        "-- Generated: {} UTC\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("-- Generated by: {}\n", user));
    out.push_str(&format!(
        "-- Jokes: {}  Categories: {}\n",
        jokes.len(),
        category_rows.len()
    ));
    out.push_str("SET NOCOUNT ON\n\n");
    out.push_str("-- Set to 1 to wipe existing jokes before loading\n");
    out.push_str("Declare @RemovePreviousJokes bit = 0\n\n");
    out.push_str(
        "Declare @tmpJokes TABLE (\n  JokeCategoryTxt nvarchar(500),\n  JokeTxt nvarchar(max),\n  Attribution nvarchar(500),\n  ImageTxt nvarchar(max)\n)\n",
    );
    out.push_str("Declare @tmpCategories TABLE (\n  JokeCategoryTxt nvarchar(500)\n)\n\n");

    // an empty VALUES list is a syntax error
    if category_rows.is_empty() {
        out.push_str("INSERT INTO @tmpCategories (JokeCategoryTxt) SELECT NULL WHERE 1 = 0\n\n");
    }
    for chunk in category_rows.chunks(EXPORT_BATCH_SIZE) {
        out.push_str("INSERT INTO @tmpCategories (JokeCategoryTxt) VALUES\n");
        let rows: Vec<String> = chunk
            .iter()
            .map(|c| format!("  ({})", sql_literal(Some(c))))
            .collect();
        out.push_str(&rows.join(",\n"));
        out.push_str("\n\n");
    }

    if joke_rows.is_empty() {
        out.push_str(
            "INSERT INTO @tmpJokes (JokeCategoryTxt, JokeTxt, Attribution, ImageTxt) SELECT NULL, NULL, NULL, NULL WHERE 1 = 0\n\n",
        );
    }
    for chunk in joke_rows.chunks(EXPORT_BATCH_SIZE) {
        out.push_str("INSERT INTO @tmpJokes (JokeCategoryTxt, JokeTxt, Attribution, ImageTxt) VALUES\n");
        let rows: Vec<String> = chunk.iter().map(|r| format!("  {}", r)).collect();
        out.push_str(&rows.join(",\n"));
        out.push_str("\n\n");
    }

    out.push_str(
        r#"IF @RemovePreviousJokes = 1
BEGIN
  DELETE FROM JokeRating
  DELETE FROM JokeJokeCategory
  DELETE FROM JokeCategory
  DELETE FROM Joke
  DBCC CHECKIDENT ('JokeCategory', RESEED, 0)
  DBCC CHECKIDENT ('Joke', RESEED, 0)
END

INSERT INTO JokeCategory (JokeCategoryTxt)
SELECT DISTINCT JokeCategoryTxt FROM @tmpCategories
 WHERE JokeCategoryTxt NOT IN (SELECT JokeCategoryTxt FROM JokeCategory)

INSERT INTO Joke (JokeTxt, Attribution, ImageTxt)
SELECT DISTINCT JokeTxt, Attribution, ImageTxt FROM @tmpJokes
 WHERE JokeTxt NOT IN (SELECT JokeTxt FROM Joke)

INSERT INTO JokeJokeCategory (JokeId, JokeCategoryId)
SELECT DISTINCT j.JokeId, c.JokeCategoryId
  FROM @tmpJokes t
  JOIN Joke j ON j.JokeTxt = t.JokeTxt
  JOIN JokeCategory c ON c.JokeCategoryTxt = t.JokeCategoryTxt
 WHERE NOT EXISTS (
   SELECT 1 FROM JokeJokeCategory x
    WHERE x.JokeId = j.JokeId AND x.JokeCategoryId = c.JokeCategoryId
 )
"#,
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn category(id: i64, name: &str) -> JokeCategory {
        JokeCategory::new(id, name, "TEST")
    }

    #[test]
    fn test_file_name() {
        let at = Utc.with_ymd_and_hms(2025, 3, 7, 14, 5, 9).unwrap();
        assert_eq!(export_file_name(at), "JokeExport_20250307_140509.sql");
    }

    #[test]
    fn test_literals() {
        assert_eq!(sql_literal(Some("It's")), "N'It''s'");
        assert_eq!(sql_literal(None), "NULL");
        assert_eq!(optional_literal(Some("  ")), "NULL");
    }

    #[test]
    fn test_script_structure() {
        let jokes = vec![
            Joke::new("Why don't eggs tell jokes? They'd crack each other up.")
                .with_categories("Food, Puns")
                .with_attribution("O'Brien"),
            Joke::new("Plain joke"),
        ];
        let categories = vec![category(1, "Food"), category(2, "Puns"), category(3, "Dad's Best")];
        let script = render_sql_script(&jokes, &categories, "TEST", Utc::now());

        for needle in [
            "SET NOCOUNT ON",
            "Declare @RemovePreviousJokes bit = 0",
            "INSERT INTO @tmpCategories (JokeCategoryTxt) VALUES",
            "INSERT INTO @tmpJokes (JokeCategoryTxt, JokeTxt, Attribution, ImageTxt) VALUES",
            "DELETE FROM JokeRating",
            "DELETE FROM JokeJokeCategory",
            "DELETE FROM JokeCategory",
            "DELETE FROM Joke",
            "INSERT INTO JokeCategory",
            "INSERT INTO Joke (",
            "INSERT INTO JokeJokeCategory",
            "NOT EXISTS",
        ] {
            assert!(script.contains(needle), "missing {}", needle);
        }

        assert!(script.contains("N'Dad''s Best'"));
        assert!(script.contains("don''t"));
        assert!(script.contains("N'O''Brien'"));
        // one staging row per pair, plus the uncategorized row
        assert_eq!(script.matches("They''d crack").count(), 2);
        assert!(script.contains("(N'', N'Plain joke', NULL, NULL)"));
    }

    #[test]
    fn test_rows_are_batched() {
        let jokes: Vec<Joke> = (0..1200)
            .map(|i| Joke::new(format!("Joke {}", i)).with_categories("Puns"))
            .collect();
        let script = render_sql_script(&jokes, &[category(1, "Puns")], "TEST", Utc::now());
        assert_eq!(script.matches("INSERT INTO @tmpJokes").count(), 3);
        assert_eq!(script.matches("INSERT INTO @tmpCategories").count(), 1);
    }

    #[test]
    fn test_empty_catalog_still_valid() {
        let script = render_sql_script(&[], &[], "TEST", Utc::now());
        assert!(script.contains("Declare @tmpJokes"));
        assert_eq!(script.matches("INSERT INTO @tmpJokes").count(), 1);
        assert!(script.contains("SELECT NULL, NULL, NULL, NULL WHERE 1 = 0"));
        assert!(!script.contains("VALUES\n\n"));
    }
}
