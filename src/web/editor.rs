// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Joke editor save flow shared by the HTML form and the JSON API

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::{ActiveInd, Joke, DEFAULT_SORT_ORDER};
use crate::repository::JokeRepository;

/// Fields the editor submits
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    #[serde(default)]
    pub joke_txt: String,
    #[serde(default)]
    pub attribution: Option<String>,
    #[serde(default)]
    pub image_txt: Option<String>,
    #[serde(default)]
    pub active_ind: Option<ActiveInd>,
    #[serde(default)]
    pub sort_order_nbr: Option<i32>,
    #[serde(default)]
    pub category_ids: Vec<i64>,
}

/// Bootstrap-style alert class for the status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Success,
    Warning,
    Danger,
}

impl AlertLevel {
    pub fn css_class(&self) -> &'static str {
        match self {
            AlertLevel::Success => "alert-success",
            AlertLevel::Warning => "alert-warning",
            AlertLevel::Danger => "alert-danger",
        }
    }
}

/// Inline status reported back to the editor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveStatus {
    pub success: bool,
    pub level: AlertLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joke_id: Option<i64>,
}

impl SaveStatus {
    fn ok(message: &str, joke_id: i64) -> Self {
        Self {
            success: true,
            level: AlertLevel::Success,
            message: message.to_string(),
            joke_id: Some(joke_id),
        }
    }

    fn failed(level: AlertLevel, message: &str, joke_id: Option<i64>) -> Self {
        Self {
            success: false,
            level,
            message: message.to_string(),
            joke_id,
        }
    }
}

/// Check the rules both editors enforce before touching storage
pub fn validate(request: &EditRequest) -> Result<(), SaveStatus> {
    if request.joke_txt.trim().is_empty() {
        return Err(SaveStatus::failed(AlertLevel::Danger, "Joke text is required.", None));
    }
    if request.category_ids.is_empty() {
        return Err(SaveStatus::failed(
            AlertLevel::Danger,
            "At least one category must be selected.",
            None,
        ));
    }
    Ok(())
}

/// Create (`joke_id` is `None`) or update a joke and replace its categories
pub fn save_joke(repo: &dyn JokeRepository, joke_id: Option<i64>, request: &EditRequest, user: &str) -> SaveStatus {
    if let Err(status) = validate(request) {
        return SaveStatus { joke_id, ..status };
    }

    let id = match joke_id {
        Some(id) => {
            let mut joke = repo.get_one(id);
            if joke.is_sentinel() {
                return SaveStatus::failed(AlertLevel::Danger, "Failed to update joke.", Some(id));
            }
            apply(&mut joke, request);
            if !repo.update_joke(&joke, user) {
                return SaveStatus::failed(AlertLevel::Danger, "Failed to update joke.", Some(id));
            }
            id
        }
        None => {
            let mut joke = Joke::new(request.joke_txt.trim());
            apply(&mut joke, request);
            let id = repo.add_joke(&joke, user);
            if id < 0 {
                return SaveStatus::failed(AlertLevel::Danger, "Failed to add joke.", None);
            }
            id
        }
    };

    if !repo.update_joke_categories(id, &request.category_ids, user) {
        warn!("Categories not saved for joke {}", id);
        return SaveStatus::failed(
            AlertLevel::Warning,
            "Joke updated, but failed to update categories.",
            Some(id),
        );
    }

    info!("Joke {} saved by {}", id, user);
    match joke_id {
        Some(_) => SaveStatus::ok("Joke updated successfully!", id),
        None => SaveStatus::ok("Joke added successfully!", id),
    }
}

fn apply(joke: &mut Joke, request: &EditRequest) {
    joke.joke_txt = request.joke_txt.trim().to_string();
    joke.attribution = request
        .attribution
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(String::from);
    joke.image_txt = request
        .image_txt
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from);
    if let Some(active) = request.active_ind {
        joke.active_ind = active;
    }
    joke.sort_order_nbr = request.sort_order_nbr.unwrap_or(DEFAULT_SORT_ORDER);
}
