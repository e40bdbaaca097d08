// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Joke data model: jokes, categories, the junction between them, and the
//! flat JSON seed file format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Text of the joke returned when there is nothing to pick from
pub const NO_JOKES_TXT: &str = "No jokes here!";
/// Text of the joke returned for an unknown id
pub const NOT_FOUND_TXT: &str = "Joke not found!";
/// Sort order given to new rows
pub const DEFAULT_SORT_ORDER: i32 = 50;
/// Audit user for anonymous callers
pub const ANONYMOUS_USER: &str = "ANON";

const KNOCK_KNOCK_PREFIX: &str = "KK/WT:";

/// Single-character active flag (`Y` / `N`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActiveInd {
    #[default]
    #[serde(rename = "Y")]
    Active,
    #[serde(rename = "N")]
    Inactive,
}

impl ActiveInd {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActiveInd::Active => "Y",
            ActiveInd::Inactive => "N",
        }
    }

    /// Anything other than `Y` (any case) is inactive
    pub fn from_flag(flag: &str) -> Self {
        if flag.trim().eq_ignore_ascii_case("Y") {
            ActiveInd::Active
        } else {
            ActiveInd::Inactive
        }
    }

    pub fn is_active(&self) -> bool {
        *self == ActiveInd::Active
    }
}

/// A joke with its categories resolved into a comma-joined string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Joke {
    pub joke_id: i64,
    pub joke_txt: String,
    /// Alphabetical, `", "`-joined category names
    #[serde(default)]
    pub categories: String,
    #[serde(default)]
    pub attribution: Option<String>,
    #[serde(default)]
    pub image_txt: Option<String>,
    #[serde(default)]
    pub active_ind: ActiveInd,
    #[serde(default = "default_sort_order")]
    pub sort_order_nbr: i32,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<i64>,
    #[serde(default = "Utc::now")]
    pub create_date_time: DateTime<Utc>,
    #[serde(default = "unknown_user")]
    pub create_user_name: String,
    #[serde(default = "Utc::now")]
    pub change_date_time: DateTime<Utc>,
    #[serde(default = "unknown_user")]
    pub change_user_name: String,
}

fn default_sort_order() -> i32 {
    DEFAULT_SORT_ORDER
}

fn unknown_user() -> String {
    "UNKNOWN".to_string()
}

impl Joke {
    /// New, unsaved joke with default flags and audit fields
    pub fn new(joke_txt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            joke_id: 0,
            joke_txt: joke_txt.into(),
            categories: String::new(),
            attribution: None,
            image_txt: None,
            active_ind: ActiveInd::Active,
            sort_order_nbr: DEFAULT_SORT_ORDER,
            rating: None,
            vote_count: None,
            create_date_time: now,
            create_user_name: unknown_user(),
            change_date_time: now,
            change_user_name: unknown_user(),
        }
    }

    pub fn with_attribution(mut self, attribution: impl Into<String>) -> Self {
        self.attribution = Some(attribution.into()).filter(|a: &String| !a.trim().is_empty());
        self
    }

    pub fn with_categories(mut self, categories: impl Into<String>) -> Self {
        self.categories = categories.into();
        self
    }

    /// Placeholder returned instead of an error when no joke is available
    pub fn no_jokes() -> Self {
        Self::new(NO_JOKES_TXT)
    }

    /// Placeholder returned for an id that does not exist
    pub fn not_found() -> Self {
        Self::new(NOT_FOUND_TXT)
    }

    /// Sentinels carry id 0; stored jokes never do
    pub fn is_sentinel(&self) -> bool {
        self.joke_id == 0
    }

    /// Category names as a list, trimmed and without blanks
    pub fn category_list(&self) -> Vec<String> {
        split_categories(&self.categories)
    }

    pub fn has_image_txt(&self) -> bool {
        self.image_txt.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

impl fmt::Display for Joke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = if self.joke_txt.is_empty() { "No joke here!" } else { &self.joke_txt };
        match knock_knock_parts(text) {
            Some((question, response)) => write!(
                f,
                "Knock Knock!\n  Who's There?\n{q}\n  {q} who?\n{r}",
                q = question,
                r = response
            )?,
            None => write!(f, "{}", text)?,
        }
        if let Some(attribution) = self.attribution.as_deref().filter(|a| !a.is_empty()) {
            write!(f, " - {}", attribution)?;
        }
        Ok(())
    }
}

/// Split a `KK/WT:` joke into the knock-knock question and response
fn knock_knock_parts(text: &str) -> Option<(&str, &str)> {
    let body = text.strip_prefix(KNOCK_KNOCK_PREFIX)?;
    let mark = body.find('?')?;
    Some((body[..mark].trim(), body[mark + 1..].trim()))
}

/// Split a comma-separated category string into trimmed, non-empty names
pub fn split_categories(categories: &str) -> Vec<String> {
    categories
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

/// Sort names alphabetically ignoring case and join them with `", "`
pub fn join_categories<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
    sort_names(&mut names);
    names.join(", ")
}

/// Case-insensitive alphabetical sort, ties broken by the original text
pub fn sort_names(names: &mut [String]) {
    names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
}

/// A joke category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JokeCategory {
    pub joke_category_id: i64,
    pub joke_category_txt: String,
    pub active_ind: ActiveInd,
    pub sort_order_nbr: i32,
    pub create_date_time: DateTime<Utc>,
    pub create_user_name: String,
    pub change_date_time: DateTime<Utc>,
    pub change_user_name: String,
}

impl JokeCategory {
    pub fn new(id: i64, name: impl Into<String>, user: &str) -> Self {
        let now = Utc::now();
        Self {
            joke_category_id: id,
            joke_category_txt: name.into(),
            active_ind: ActiveInd::Active,
            sort_order_nbr: DEFAULT_SORT_ORDER,
            create_date_time: now,
            create_user_name: user.to_string(),
            change_date_time: now,
            change_user_name: user.to_string(),
        }
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.joke_category_txt.trim().to_lowercase() == name.trim().to_lowercase()
    }
}

/// Junction row between a joke and a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JokeJokeCategory {
    pub joke_id: i64,
    pub joke_category_id: i64,
    pub create_date_time: DateTime<Utc>,
    pub create_user_name: String,
}

/// One entry of the flat JSON joke file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JsonJoke {
    #[serde(default)]
    pub joke_category_txt: Option<String>,
    #[serde(default)]
    pub joke_txt: Option<String>,
    #[serde(default)]
    pub attribution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_txt: Option<String>,
}

impl JsonJoke {
    /// Map onto a joke; the category string is carried through unsorted
    pub fn to_joke(&self, joke_id: i64, user: &str) -> Joke {
        let mut joke = Joke::new(self.joke_txt.clone().unwrap_or_default())
            .with_attribution(self.attribution.clone().unwrap_or_default())
            .with_categories(self.joke_category_txt.clone().unwrap_or_default());
        joke.joke_id = joke_id;
        joke.image_txt = self.image_txt.clone().filter(|t| !t.trim().is_empty());
        joke.create_user_name = user.to_string();
        joke.change_user_name = user.to_string();
        joke
    }
}

/// Container of the JSON joke file: `{"Jokes": [...]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JsonJokeList {
    #[serde(rename = "Jokes", default)]
    pub jokes: Vec<JsonJoke>,
}

impl JsonJokeList {
    pub fn load(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_ind_flag() {
        assert_eq!(ActiveInd::from_flag("y"), ActiveInd::Active);
        assert_eq!(ActiveInd::from_flag("N"), ActiveInd::Inactive);
        assert_eq!(ActiveInd::from_flag(""), ActiveInd::Inactive);
        assert_eq!(serde_json::to_string(&ActiveInd::Active).unwrap(), "\"Y\"");
    }

    #[test]
    fn test_display_with_attribution() {
        let joke = Joke::new("I used to hate facial hair, but then it grew on me.")
            .with_attribution("Dad");
        assert_eq!(
            joke.to_string(),
            "I used to hate facial hair, but then it grew on me. - Dad"
        );
    }

    #[test]
    fn test_display_knock_knock() {
        let joke = Joke::new("KK/WT: Lettuce? Lettuce in, it's cold out here!");
        assert_eq!(
            joke.to_string(),
            "Knock Knock!\n  Who's There?\nLettuce\n  Lettuce who?\nLettuce in, it's cold out here!"
        );
    }

    #[test]
    fn test_sentinels() {
        assert!(Joke::no_jokes().is_sentinel());
        assert_eq!(Joke::not_found().joke_txt, NOT_FOUND_TXT);
    }

    #[test]
    fn test_category_helpers() {
        assert_eq!(split_categories(" Puns, ,Animals ,"), vec!["Puns", "Animals"]);
        assert_eq!(join_categories(["puns", "Animals", "food"]), "Animals, food, puns");
    }

    #[test]
    fn test_json_list_format() {
        let raw = r#"{"Jokes": [
            {"JokeCategoryTxt": "Puns", "JokeTxt": "Why?", "Attribution": ""},
            {"JokeCategoryTxt": "Animals, Food", "JokeTxt": "What?", "Attribution": "Me"}
        ]}"#;
        let list: JsonJokeList = serde_json::from_str(raw).unwrap();
        assert_eq!(list.jokes.len(), 2);

        let joke = list.jokes[1].to_joke(2, "JSON");
        assert_eq!(joke.joke_id, 2);
        assert_eq!(joke.attribution.as_deref(), Some("Me"));
        assert_eq!(joke.category_list(), vec!["Animals", "Food"]);
        assert_eq!(list.jokes[0].to_joke(1, "JSON").attribution, None);
    }
}
