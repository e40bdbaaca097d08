// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Text and image generation seams, plus the joke illustration flow
//!
//! Callers depend on [`TextGenerator`] and [`ImageGenerator`] so tests can
//! swap in canned responses instead of a live engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::images::ImageStore;
use crate::Result;

/// System prompt asking for an artist's description of a joke
pub const JOKE_IMAGE_PROMPT: &str = "You are going to be told a funny joke or a humorous line or an insightful quote. \
It is your responsibility to describe that joke so that an artist can draw a picture of the mental image that this joke creates. \
Give clear instructions on how the scene should look and what objects should be included in the scene. \
Instruct the artist to draw it in a humorous cartoon format. \
Make sure the description does not ask for anything violent, sexual, or political so that it does not violate safety rules. \
Keep the scene description under 250 words or less.";

const IMAGE_FAILURE_TXT: &str =
    "Sorry - I can't even imagine drawing that picture...!  Try again with a different joke!";

/// Per-call generation settings
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl GenerationOptions {
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Token counts reported by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Result of one text generation call
#[derive(Debug, Clone, Default)]
pub struct Generation {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

impl Generation {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }
}

/// Anything that turns a prompt into text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Generation>;
}

/// Anything that turns a description into PNG bytes
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, description: &str) -> Result<Vec<u8>>;
}

/// Ask the generator for a drawable scene description of a joke
pub async fn describe_joke_scene(
    generator: &dyn TextGenerator,
    joke_txt: &str,
    options: &GenerationOptions,
) -> Result<String> {
    let options = options.clone().with_system_prompt(JOKE_IMAGE_PROMPT);
    let generation = generator.generate(joke_txt, &options).await?;
    Ok(generation.content.trim().to_string())
}

/// User-facing message for a failed image generation
pub fn image_failure_message(error: &str) -> String {
    let error = error.to_lowercase();
    let mut message = IMAGE_FAILURE_TXT.to_string();
    if error.contains("safety system") {
        message.push_str(" (safety violation)");
    }
    if error.contains("content filter") {
        message.push_str(" (content filter violation)");
    }
    message
}

/// Outcome of an illustration request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOutcome {
    pub success: bool,
    /// Public URL of the image when one exists
    pub image_url: Option<String>,
    pub message: String,
    /// True when an earlier image was returned without generating
    pub reused: bool,
}

/// Return the stored image for a joke, generating and saving it if absent
pub async fn illustrate_joke(
    generator: &dyn ImageGenerator,
    store: &ImageStore,
    joke_id: i64,
    description: &str,
) -> ImageOutcome {
    if let Some(url) = store.find(joke_id) {
        info!("Image already exists for joke {}: {}", joke_id, url);
        return ImageOutcome {
            success: true,
            image_url: Some(url),
            message: String::new(),
            reused: true,
        };
    }

    let saved = match generator.generate_image(description).await {
        Ok(bytes) => store.save(joke_id, &bytes),
        Err(e) => Err(e),
    };
    match saved {
        Ok(url) => ImageOutcome {
            success: true,
            image_url: Some(url),
            message: String::new(),
            reused: false,
        },
        Err(e) => {
            warn!("Image generation failed for joke {}: {}", joke_id, e);
            ImageOutcome {
                success: false,
                image_url: None,
                message: image_failure_message(&e.to_string()),
                reused: false,
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Canned generators for tests

    use super::*;
    use crate::DadabaseError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies in order; an `Err` string becomes an AI error
    pub struct ScriptedGenerator {
        replies: Mutex<VecDeque<std::result::Result<String, String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub fn new(replies: Vec<std::result::Result<&str, &str>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(String::from).map_err(String::from))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<Generation> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(content)) => Ok(Generation {
                    content,
                    usage: Some(TokenUsage {
                        prompt_tokens: 10,
                        completion_tokens: 5,
                    }),
                }),
                Some(Err(message)) => Err(DadabaseError::AiUnavailable(message)),
                None => Err(DadabaseError::AiUnavailable("no scripted reply".to_string())),
            }
        }
    }

    /// Returns fixed bytes, or fails with the given message
    pub struct FixedImage(pub std::result::Result<Vec<u8>, String>);

    #[async_trait]
    impl ImageGenerator for FixedImage {
        async fn generate_image(&self, _description: &str) -> Result<Vec<u8>> {
            self.0.clone().map_err(DadabaseError::Image)
        }
    }
}
