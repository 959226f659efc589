use super::client::{OpenAiHttpClient, DEFAULT_TIMEOUT};
use super::types::{ChatCompletionRequest, ChatMessage, ChatMessageContent};
use crate::ai::StoryGenerator;
use crate::models::StoryRequest;
use crate::{prompts, Error, Result};
use async_trait::async_trait;

const MAX_TOKENS: u32 = 600;
const TEMPERATURE: f64 = 0.7;

/// Writes short marketing stories with a text-only chat model.
pub struct OpenAiStoryClient {
    http: OpenAiHttpClient,
    model: String,
}

impl OpenAiStoryClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::new_with_client(api_key, model, reqwest::Client::new())
    }

    pub fn new_with_client(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self {
            http: OpenAiHttpClient::new_with_client(api_key, DEFAULT_TIMEOUT, client),
            model,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }
}

/// Render the story prompt for a request.
pub fn render_story_prompt(request: &StoryRequest) -> String {
    let analysis = &request.analysis;
    let features = analysis.features.join("、");
    let (style, tone) = request.style_and_tone();

    prompts::render(
        prompts::STORY,
        &[
            ("product_name", analysis.product_name.as_str()),
            ("description", analysis.description.as_str()),
            ("category", analysis.category.as_str()),
            ("features", features.as_str()),
            ("target_audience", analysis.target_audience.as_str()),
            ("prompt", request.prompt.as_str()),
            ("style", style),
            ("tone", tone),
        ],
    )
}

#[async_trait]
impl StoryGenerator for OpenAiStoryClient {
    async fn generate_story(&self, request: &StoryRequest) -> Result<String> {
        if request.story_style().is_none() {
            tracing::warn!(
                "Unknown story style '{}', using the generic tone",
                request.style
            );
        }

        let chat_request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(ChatMessageContent::Text(
                render_story_prompt(request),
            ))],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self.http.chat_completion(&chat_request).await?;

        let raw = response
            .first_text()
            .ok_or_else(|| Error::AiProvider("No response from OpenAI story API".to_string()))?;

        let story = raw.trim();
        if story.is_empty() {
            return Err(Error::malformed("story reply was empty", raw));
        }

        tracing::info!(
            "Generated {} story for '{}' ({} chars)",
            request.style,
            request.analysis.product_name,
            story.chars().count()
        );

        Ok(story.to_string())
    }
}
