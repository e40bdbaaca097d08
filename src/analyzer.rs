// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Batch analysis: scene descriptions and categories for undescribed jokes
//!
//! Each joke gets one combined prompt. The reply is parsed leniently; an
//! unusable reply skips the joke without writing anything. Any generator or
//! storage error stops the batch.

use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::ai::{GenerationOptions, TextGenerator, TokenUsage};
use crate::config::AnalyzerConfig;
use crate::models::{ActiveInd, Joke, JokeCategory};
use crate::repository::JokeRepository;
use crate::{DadabaseError, Result};

/// Most categories kept from one reply
pub const MAX_CATEGORIES_PER_JOKE: usize = 3;

/// Prompt template; `{categories}` and `{joke}` are substituted
pub const COMBINED_ANALYSIS_PROMPT: &str = r#"Analyze the following joke and provide two things:

1. IMAGE DESCRIPTION: Describe this joke so an artist can draw a picture of the mental image it creates.
   - Give clear instructions on how the scene should look and what objects should be included.
   - Draw it in a humorous cartoon format.
   - Make sure the description does not ask for anything violent, sexual, or political.
   - Keep the scene description under 250 words.

2. CATEGORIES: Identify the one, two, or three of the most appropriate categories this joke belongs to.
   - Choose from existing categories if they fit, or suggest a new category if needed.
   - Try not to put everything into the Dad category - only use that for jokes clearly referencing Dad
   - If it is clearly of one type, only suggest one category. If it matches several categories, suggest two or three.
   - Existing categories: {categories}

Joke: {joke}

Respond ONLY with valid JSON in this exact format (no markdown, no code blocks):
{"imageDescription": "your description here", "categories": ["category1", "category2"]}"#;

pub fn build_analysis_prompt(category_names: &str, joke_txt: &str) -> String {
    COMBINED_ANALYSIS_PROMPT
        .replace("{categories}", category_names)
        .replace("{joke}", joke_txt)
}

/// Parsed reply for one joke
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JokeAnalysis {
    pub image_description: String,
    pub categories: Vec<String>,
}

/// Parse a model reply; `None` when no usable description is present
pub fn parse_analysis_response(raw: &str) -> Option<JokeAnalysis> {
    let body = strip_code_fence(raw.trim());
    let json = extract_json_object(body)?;
    let value: Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            debug!("Analysis reply is not JSON: {}", e);
            return None;
        }
    };
    let object = value.as_object()?;

    let mut analysis = JokeAnalysis::default();
    for (key, value) in object {
        match key.to_lowercase().as_str() {
            "imagedescription" => {
                analysis.image_description = value.as_str().unwrap_or_default().trim().to_string();
            }
            "categories" => analysis.categories = category_values(value),
            _ => {}
        }
    }

    if analysis.image_description.is_empty() {
        return None;
    }
    Some(analysis)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // drop the language tag line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    match rest.find("```") {
        Some(end) => &rest[..end],
        None => rest,
    }
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Categories as an array or a comma string, deduplicated ignoring case
fn category_values(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        Value::String(text) => text.split(',').map(String::from).collect(),
        _ => Vec::new(),
    };

    let mut names: Vec<String> = Vec::new();
    for name in raw {
        let name = name.trim();
        if name.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            continue;
        }
        names.push(name.to_string());
    }
    names.truncate(MAX_CATEGORIES_PER_JOKE);
    names
}

/// Categories known during one run, grown as new ones are created
#[derive(Debug, Clone, Default)]
pub struct CategoryState {
    categories: Vec<JokeCategory>,
}

impl CategoryState {
    /// Snapshot the active categories
    pub fn load(repo: &dyn JokeRepository) -> Result<Self> {
        let categories = repo
            .get_all_categories()?
            .into_iter()
            .filter(|c| c.active_ind.is_active())
            .collect();
        Ok(Self { categories })
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Comma-joined names for the prompt
    pub fn names(&self) -> String {
        self.categories
            .iter()
            .map(|c| c.joke_category_txt.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Known category by name, or a newly created one
    pub fn resolve(&mut self, repo: &dyn JokeRepository, name: &str, user: &str) -> Result<JokeCategory> {
        if let Some(existing) = self.categories.iter().find(|c| c.matches_name(name)) {
            return Ok(existing.clone());
        }
        let category = repo.add_category(name, user)?;
        info!("New category: {}", category.joke_category_txt);
        self.categories.push(category.clone());
        Ok(category)
    }
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    /// True when an error stopped the batch early
    pub aborted: bool,
    pub elapsed: Duration,
    /// Present only when the engine reported token counts
    pub usage: Option<TokenUsage>,
}

impl BatchSummary {
    fn add_usage(&mut self, usage: Option<TokenUsage>) {
        if let Some(u) = usage {
            let total = self.usage.get_or_insert_with(TokenUsage::default);
            total.prompt_tokens += u.prompt_tokens;
            total.completion_tokens += u.completion_tokens;
        }
    }

    /// Jokes that were never attempted because the batch stopped
    pub fn not_attempted(&self) -> usize {
        self.total
            .saturating_sub(self.updated + self.skipped + self.errors)
    }
}

enum JokeOutcome {
    Updated,
    Skipped,
}

/// Runs the analysis over one batch of jokes
pub struct BatchAnalyzer<'a> {
    repo: &'a dyn JokeRepository,
    generator: &'a dyn TextGenerator,
    max_batch_size: usize,
    user_name: String,
    options: GenerationOptions,
}

impl<'a> BatchAnalyzer<'a> {
    pub fn new(repo: &'a dyn JokeRepository, generator: &'a dyn TextGenerator, config: &AnalyzerConfig) -> Self {
        Self {
            repo,
            generator,
            max_batch_size: config.max_batch_size,
            user_name: config.user_name.clone(),
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Active jokes without image text, ordered by id, capped at the batch size
    pub fn select_jokes(&self) -> Result<Vec<Joke>> {
        let mut jokes: Vec<Joke> = self
            .repo
            .list_all(ActiveInd::Active)?
            .into_iter()
            .filter(|j| !j.has_image_txt())
            .collect();
        jokes.sort_by_key(|j| j.joke_id);
        if self.max_batch_size > 0 {
            jokes.truncate(self.max_batch_size);
        }
        Ok(jokes)
    }

    pub async fn run(&self) -> Result<BatchSummary> {
        let started = Instant::now();
        let jokes = self.select_jokes()?;
        let mut summary = BatchSummary {
            total: jokes.len(),
            ..BatchSummary::default()
        };
        if jokes.is_empty() {
            info!("No jokes found to process");
            return Ok(summary);
        }

        let mut state = CategoryState::load(self.repo)?;
        info!("Found {} jokes to process, {} categories known", jokes.len(), state.len());

        for (index, joke) in jokes.iter().enumerate() {
            let joke_started = Instant::now();
            info!("Processing record {} of {} - joke {}", index + 1, jokes.len(), joke.joke_id);

            match self.process_joke(joke, &mut state, &mut summary).await {
                Ok(JokeOutcome::Updated) => summary.updated += 1,
                Ok(JokeOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    warn!("Error processing joke {}: {}", joke.joke_id, e);
                    summary.errors += 1;
                    summary.aborted = index + 1 < jokes.len();
                    break;
                }
            }
            debug!("Joke {} took {:.2}s", joke.joke_id, joke_started.elapsed().as_secs_f64());
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    async fn process_joke(
        &self,
        joke: &Joke,
        state: &mut CategoryState,
        summary: &mut BatchSummary,
    ) -> Result<JokeOutcome> {
        let prompt = build_analysis_prompt(&state.names(), &joke.joke_txt);
        let generation = self.generator.generate(&prompt, &self.options).await?;
        summary.add_usage(generation.usage);

        let Some(analysis) = parse_analysis_response(&generation.content) else {
            warn!("Unusable analysis for joke {}, skipping", joke.joke_id);
            debug!("Raw reply: {}", generation.content);
            return Ok(JokeOutcome::Skipped);
        };
        info!("Categories for joke {}: {}", joke.joke_id, analysis.categories.join(", "));

        for name in &analysis.categories {
            let category = state.resolve(self.repo, name, &self.user_name)?;
            self.repo
                .add_joke_category(joke.joke_id, category.joke_category_id, &self.user_name)?;
        }

        // written last so a failed joke is picked up again next run
        if !self
            .repo
            .update_image_txt(joke.joke_id, &analysis.image_description, &self.user_name)
        {
            return Err(DadabaseError::Analysis(format!(
                "Failed to save image description for joke {}",
                joke.joke_id
            )));
        }
        Ok(JokeOutcome::Updated)
    }
}
