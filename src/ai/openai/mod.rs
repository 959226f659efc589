pub mod client;
pub mod story;
pub mod types;
pub mod vision;

pub use client::OpenAiHttpClient;
pub use story::OpenAiStoryClient;
pub use vision::OpenAiVisionClient;
