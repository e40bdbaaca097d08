// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Web UI and JSON API for DadABase

pub mod api;
pub mod editor;
pub mod pages;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::ai::{ImageGenerator, TextGenerator};
use crate::config::AppConfig;
use crate::images::ImageStore;
use crate::models::ANONYMOUS_USER;
use crate::repository::JokeRepository;

/// URL prefix generated images are served under
pub const IMAGES_ROUTE: &str = "/images";

/// Shared application state
pub struct AppState {
    pub repo: Arc<dyn JokeRepository>,
    pub config: AppConfig,
    pub images: ImageStore,
    /// `None` when no AI engine is configured
    pub text_generator: Option<Arc<dyn TextGenerator>>,
    pub image_generator: Option<Arc<dyn ImageGenerator>>,
    /// Audit name written on edits made through the web
    pub user_name: String,
}

impl AppState {
    pub fn new(repo: Arc<dyn JokeRepository>, config: AppConfig) -> Self {
        let images = ImageStore::new(&config.web.images_dir, IMAGES_ROUTE);
        Self {
            repo,
            config,
            images,
            text_generator: None,
            image_generator: None,
            user_name: ANONYMOUS_USER.to_string(),
        }
    }

    pub fn with_text_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.text_generator = Some(generator);
        self
    }

    pub fn with_image_generator(mut self, generator: Arc<dyn ImageGenerator>) -> Self {
        self.image_generator = Some(generator);
        self
    }
}

/// Create the web application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let images = ServeDir::new(state.images.dir());
    Router::new()
        // Pages
        .route("/", get(pages::index_page))
        .route("/search", get(pages::search_page))
        .route("/jokes/:id", get(pages::joke_page))
        .route("/editor", get(pages::editor_list_page).post(pages::editor_create))
        .route("/editor/:id", get(pages::editor_page).post(pages::editor_save))
        .route("/export", get(pages::export_page))
        // API endpoints
        .route("/api/jokes", get(api::list_jokes).post(api::create_joke))
        .route("/api/jokes/random", get(api::random_joke))
        .route("/api/jokes/search", get(api::search_jokes))
        .route("/api/jokes/:id", get(api::get_joke).put(api::update_joke))
        .route("/api/jokes/:id/categories", put(api::update_categories))
        .route("/api/jokes/:id/description", post(api::generate_description))
        .route("/api/jokes/:id/image", post(api::generate_image))
        .route("/api/categories", get(api::joke_categories))
        .route("/api/categories/all", get(api::all_categories))
        .route("/api/export/sql", get(api::export_sql))
        .route("/api/config", get(api::config_info))
        .route("/api/health", get(api::health))
        .nest_service(IMAGES_ROUTE, images)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web server
pub async fn start_server(state: AppState) -> crate::Result<()> {
    let addr = format!("{}:{}", state.config.web.host, state.config.web.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Web UI available at http://{}", addr);

    let router = create_router(Arc::new(state));
    axum::serve(listener, router).await?;

    Ok(())
}
