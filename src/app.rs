//! Application orchestration for analyzing product photos and writing stories.

use crate::ai::{OpenAiStoryClient, OpenAiVisionClient, ProductAnalyzer, StoryGenerator};
use crate::models::{Config, ProductRecord, StoryRequest};
use crate::store::{FileRecordStore, RecordStore};
use crate::{Error, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_retry::{strategy::FixedInterval, RetryIf};
use tracing::{error, info, warn};
use uuid::Uuid;

/// How often a provider call is retried after a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_millis(2000),
        }
    }
}

/// Coordinates analysis, story generation and record persistence.
pub struct App {
    analyzer: Box<dyn ProductAnalyzer>,
    storyteller: Box<dyn StoryGenerator>,
    store: Box<dyn RecordStore>,
    retry: RetryPolicy,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub analyzer: Box<dyn ProductAnalyzer>,
    pub storyteller: Box<dyn StoryGenerator>,
    pub store: Box<dyn RecordStore>,
}

impl App {
    /// Build an app from concrete service dependencies.
    pub fn with_services(services: AppServices, retry: RetryPolicy) -> Self {
        Self {
            analyzer: services.analyzer,
            storyteller: services.storyteller,
            store: services.store,
            retry,
        }
    }

    /// Construct an app from environment configuration (`Config::from_env`).
    pub async fn new() -> Result<Self> {
        let config = Config::from_env()?;
        Self::from_config(&config).await
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        // Reuse one HTTP connection pool across provider clients.
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        info!(
            "Vision model: {}, story model: {} ({})",
            config.vision_model, config.story_model, config.openai_base_url
        );

        let analyzer = OpenAiVisionClient::new_with_client(
            config.openai_api_key.clone(),
            config.vision_model.clone(),
            http_client.clone(),
        )
        .with_base_url(config.openai_base_url.clone())
        .with_timeout(config.request_timeout);

        let storyteller = OpenAiStoryClient::new_with_client(
            config.openai_api_key.clone(),
            config.story_model.clone(),
            http_client,
        )
        .with_base_url(config.openai_base_url.clone())
        .with_timeout(config.request_timeout);

        let store = FileRecordStore::new(&config.records_dir).await?;
        info!("Storing records in {}", config.records_dir.display());

        Ok(Self::with_services(
            AppServices {
                analyzer: Box::new(analyzer),
                storyteller: Box::new(storyteller),
                store: Box::new(store),
            },
            RetryPolicy {
                max_retries: config.max_retries,
                delay: config.retry_delay,
            },
        ))
    }

    /// Read an image from disk, record it, and analyze it.
    pub async fn analyze_image(&self, image_path: &Path) -> Result<ProductRecord> {
        let bytes = tokio::fs::read(image_path).await?;
        self.analyze_bytes(image_path.to_path_buf(), &bytes).await
    }

    /// Record an image and analyze it.
    ///
    /// Empty or unrecognized images are rejected before anything is saved.
    /// The record is saved before analysis starts. If analysis fails the
    /// record stays unanalyzed with the failure noted, and the error comes
    /// back as [`Error::Analysis`] carrying the record id.
    pub async fn analyze_bytes(&self, image_path: PathBuf, bytes: &[u8]) -> Result<ProductRecord> {
        if bytes.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Image file {} is empty",
                image_path.display()
            )));
        }
        if image::guess_format(bytes).is_err() {
            return Err(Error::InvalidInput(format!(
                "{} is not a recognized image",
                image_path.display()
            )));
        }

        let mut record = ProductRecord::new(image_path);
        self.store.save(&record).await?;
        info!(
            "Saved record {} for {} ({} bytes)",
            record.id,
            record.image_path.display(),
            bytes.len()
        );

        let outcome = self
            .with_retry("analysis", || self.analyzer.analyze(bytes))
            .await;

        match outcome {
            Ok(analysis) => {
                record.apply_analysis(&analysis);
                self.store.save(&record).await?;
                info!("Analyzed record {}: {}", record.id, record);
                Ok(record)
            }
            Err(e) => {
                error!("Analysis of record {} failed: {}", record.id, e);
                record.record_analysis_failure(&e);
                if let Err(save_err) = self.store.save(&record).await {
                    error!(
                        "Failed to store analysis failure for record {}: {}",
                        record.id, save_err
                    );
                }
                Err(Error::Analysis {
                    record_id: record.id,
                    source: Box::new(e),
                })
            }
        }
    }

    /// Generate and store a story for an analyzed record.
    ///
    /// On failure the stored record is left untouched.
    pub async fn generate_story(&self, id: Uuid, style: &str, prompt: &str) -> Result<ProductRecord> {
        let mut record = self.store.load(id).await?;

        let analysis = match (&record.analysis, record.analyzed) {
            (Some(analysis), true) => analysis.clone(),
            _ => {
                return Err(Error::InvalidInput(format!(
                    "Record {} has not been analyzed",
                    id
                )))
            }
        };

        let request = StoryRequest::new(analysis, style, prompt)?;
        let story = self
            .with_retry("story", || self.storyteller.generate_story(&request))
            .await?;

        record.apply_story(&request, story);
        self.store.save(&record).await?;
        info!("Stored {} story for record {}", request.style, id);

        Ok(record)
    }

    pub async fn record(&self, id: Uuid) -> Result<ProductRecord> {
        self.store.load(id).await
    }

    /// Records newest first, optionally truncated.
    pub async fn history(&self, limit: Option<usize>) -> Result<Vec<ProductRecord>> {
        let mut records = self.store.list().await?;
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn with_retry<T, F, Fut>(&self, label: &str, mut action: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let strategy = FixedInterval::new(self.retry.delay).take(self.retry.max_retries);
        let max_attempts = self.retry.max_retries + 1;
        let mut attempt = 0;

        RetryIf::spawn(
            strategy,
            || {
                attempt += 1;
                let current = attempt;
                let call = action();
                async move {
                    call.await.map_err(|e| {
                        if e.is_retryable() && current < max_attempts {
                            warn!(
                                "[{}] Attempt {}/{} failed: {}. Will retry...",
                                label, current, max_attempts, e
                            );
                        }
                        e
                    })
                }
            },
            Error::is_retryable,
        )
        .await
    }
}
