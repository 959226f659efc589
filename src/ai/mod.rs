//! AI service integration for product analysis and story generation
//!
//! Provides interfaces to an OpenAI-compatible chat completions API for
//! identifying products in photos and writing marketing copy about them.

pub mod mime;
pub mod mock;
pub mod openai;

pub use mock::{MockProductAnalyzer, MockStoryGenerator};
pub use openai::{OpenAiStoryClient, OpenAiVisionClient};

use crate::models::{AnalysisResult, StoryRequest};
use crate::Result;
use async_trait::async_trait;

/// Identifies the product in an image.
#[async_trait]
pub trait ProductAnalyzer: Send + Sync {
    async fn analyze(&self, image_bytes: &[u8]) -> Result<AnalysisResult>;
}

/// Writes a marketing story for an analyzed product.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    async fn generate_story(&self, request: &StoryRequest) -> Result<String>;
}
