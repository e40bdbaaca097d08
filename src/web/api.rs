// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! JSON API handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::editor::{save_joke, EditRequest, SaveStatus};
use super::AppState;
use crate::ai::{describe_joke_scene, illustrate_joke, GenerationOptions, ImageOutcome};
use crate::config::mask_secret;
use crate::export::export_file_name;
use crate::models::{ActiveInd, Joke, JokeCategory};
use crate::DadabaseError;

#[derive(Deserialize)]
pub(crate) struct SearchQuery {
    #[serde(default)]
    q: String,
    #[serde(default)]
    category: String,
}

#[derive(Deserialize)]
pub(crate) struct ListQuery {
    active: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CategoryUpdate {
    #[serde(default)]
    category_ids: Vec<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusMessage {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl StatusMessage {
    fn new(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
            description: None,
        }
    }
}

/// 500 with the failure as a status message
fn storage_failure(action: &str, error: DadabaseError) -> Response {
    warn!("{} failed: {}", action, error);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(StatusMessage::new(false, format!("{} failed: {}", action, error))),
    )
        .into_response()
}

pub(crate) async fn random_joke(State(state): State<Arc<AppState>>) -> Json<Joke> {
    Json(state.repo.get_random_joke())
}

pub(crate) async fn search_jokes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Joke>>, Response> {
    state
        .repo
        .search_jokes(&query.q, &query.category)
        .map(Json)
        .map_err(|e| storage_failure("Search", e))
}

pub(crate) async fn list_jokes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Joke>>, Response> {
    let active = query
        .active
        .as_deref()
        .map(ActiveInd::from_flag)
        .unwrap_or_default();
    state
        .repo
        .list_all(active)
        .map(Json)
        .map_err(|e| storage_failure("Joke listing", e))
}

pub(crate) async fn get_joke(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Response {
    let joke = state.repo.get_one(id);
    let status = if joke.is_sentinel() { StatusCode::NOT_FOUND } else { StatusCode::OK };
    (status, Json(joke)).into_response()
}

pub(crate) async fn create_joke(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EditRequest>,
) -> (StatusCode, Json<SaveStatus>) {
    let status = save_joke(state.repo.as_ref(), None, &request, &state.user_name);
    let code = if status.success { StatusCode::CREATED } else { StatusCode::BAD_REQUEST };
    (code, Json(status))
}

pub(crate) async fn update_joke(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<EditRequest>,
) -> (StatusCode, Json<SaveStatus>) {
    let status = save_joke(state.repo.as_ref(), Some(id), &request, &state.user_name);
    let code = if status.success { StatusCode::OK } else { StatusCode::BAD_REQUEST };
    (code, Json(status))
}

pub(crate) async fn update_categories(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(update): Json<CategoryUpdate>,
) -> (StatusCode, Json<StatusMessage>) {
    if state
        .repo
        .update_joke_categories(id, &update.category_ids, &state.user_name)
    {
        (StatusCode::OK, Json(StatusMessage::new(true, "Categories updated.")))
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(StatusMessage::new(false, "Failed to update categories.")),
        )
    }
}

pub(crate) async fn generate_description(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> (StatusCode, Json<StatusMessage>) {
    let joke = state.repo.get_one(id);
    if joke.is_sentinel() {
        return (StatusCode::NOT_FOUND, Json(StatusMessage::new(false, joke.joke_txt)));
    }
    let Some(generator) = state.text_generator.as_deref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(StatusMessage::new(false, "AI Chat Keys not found!")),
        );
    };

    let description = match describe_joke_scene(generator, &joke.joke_txt, &GenerationOptions::default()).await {
        Ok(description) => description,
        Err(e) => {
            warn!("Error during description generation for joke {}: {}", id, e);
            String::new()
        }
    };
    if description.is_empty() {
        return (
            StatusCode::BAD_GATEWAY,
            Json(StatusMessage::new(
                false,
                "Could not generate an image description - see log for details!",
            )),
        );
    }

    if !state.repo.update_image_txt(id, &description, &state.user_name) {
        warn!("Description for joke {} generated but not saved", id);
    }
    let mut message = StatusMessage::new(true, "");
    message.description = Some(description);
    (StatusCode::OK, Json(message))
}

pub(crate) async fn generate_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> (StatusCode, Json<ImageOutcome>) {
    let joke = state.repo.get_one(id);
    let failure = |message: &str| ImageOutcome {
        success: false,
        image_url: None,
        message: message.to_string(),
        reused: false,
    };
    if joke.is_sentinel() {
        return (StatusCode::NOT_FOUND, Json(failure(&joke.joke_txt)));
    }

    if let Some(url) = state.images.find(id) {
        return (
            StatusCode::OK,
            Json(ImageOutcome {
                success: true,
                image_url: Some(url),
                message: String::new(),
                reused: true,
            }),
        );
    }
    let Some(generator) = state.image_generator.as_deref() else {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(failure("AI Image Keys not found!")));
    };
    let Some(description) = joke.image_txt.as_deref().filter(|_| joke.has_image_txt()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(failure("Generate an image description first!")),
        );
    };

    let outcome = illustrate_joke(generator, &state.images, id, description).await;
    let code = if outcome.success { StatusCode::OK } else { StatusCode::BAD_GATEWAY };
    (code, Json(outcome))
}

pub(crate) async fn joke_categories(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, Response> {
    state
        .repo
        .get_joke_categories()
        .map(Json)
        .map_err(|e| storage_failure("Category listing", e))
}

pub(crate) async fn all_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<JokeCategory>>, Response> {
    state
        .repo
        .get_all_categories()
        .map(Json)
        .map_err(|e| storage_failure("Category listing", e))
}

pub(crate) async fn export_sql(State(state): State<Arc<AppState>>) -> Response {
    match state.repo.export_to_sql(&state.user_name) {
        Ok(script) => {
            let file_name = export_file_name(Utc::now());
            info!("Serving export {}", file_name);
            (
                [
                    (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", file_name),
                    ),
                ],
                script,
            )
                .into_response()
        }
        Err(e) => storage_failure("Export", e),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConfigInfo {
    environment_name: String,
    backend: &'static str,
    database_path: String,
    json_path: String,
    engine_url: String,
    model: String,
    image_model: String,
    api_key: String,
    max_tokens: u32,
    temperature: f32,
    images_dir: String,
    version: &'static str,
}

pub(crate) async fn config_info(State(state): State<Arc<AppState>>) -> Json<ConfigInfo> {
    let config = &state.config;
    let api_key = mask_secret(config.ai_engine.api_key.as_deref().unwrap_or_default());
    info!(
        "Config requested: environment={} engine={} model={} key={}",
        config.environment_name, config.ai_engine.url, config.ai_engine.model, api_key
    );
    Json(ConfigInfo {
        environment_name: config.environment_name.clone(),
        backend: state.repo.backend_name(),
        database_path: config.database.path.clone(),
        json_path: config.database.json_path.clone(),
        engine_url: config.ai_engine.url.clone(),
        model: config.ai_engine.model.clone(),
        image_model: config.ai_engine.image_model.clone(),
        api_key,
        max_tokens: config.ai_engine.max_tokens,
        temperature: config.ai_engine.temperature,
        images_dir: config.web.images_dir.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HealthResponse {
    status: &'static str,
    backend: &'static str,
    active_jokes: usize,
}

pub(crate) async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    match state.repo.list_all(ActiveInd::Active) {
        Ok(jokes) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                backend: state.repo.backend_name(),
                active_jokes: jokes.len(),
            }),
        ),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    backend: state.repo.backend_name(),
                    active_jokes: 0,
                }),
            )
        }
    }
}
