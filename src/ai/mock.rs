use super::{ProductAnalyzer, StoryGenerator};
use crate::models::{AnalysisResult, StoryRequest};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Canned outcome for [`MockProductAnalyzer`].
#[derive(Debug, Clone)]
pub enum MockAnalysis {
    Identified(AnalysisResult),
    /// The provider answered with this unparseable text.
    Malformed(String),
    /// The provider could not be reached.
    Unavailable(String),
}

#[derive(Clone)]
pub struct MockProductAnalyzer {
    responses: Arc<Mutex<Vec<MockAnalysis>>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockProductAnalyzer {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_result(self, result: AnalysisResult) -> Self {
        self.with_response(MockAnalysis::Identified(result))
    }

    pub fn with_response(self, response: MockAnalysis) -> Self {
        self.responses.lock().unwrap().push(response);
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

impl Default for MockProductAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProductAnalyzer for MockProductAnalyzer {
    async fn analyze(&self, image_bytes: &[u8]) -> Result<AnalysisResult> {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;

        let responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(AnalysisResult {
                product_name: "測試商品".to_string(),
                description: format!("{} bytes", image_bytes.len()),
                recommended_price: 100.0,
                ..Default::default()
            });
        }

        let index = (*count - 1) % responses.len();
        match &responses[index] {
            MockAnalysis::Identified(result) => Ok(result.clone()),
            MockAnalysis::Malformed(raw) => Err(Error::malformed("invalid JSON", raw.clone())),
            MockAnalysis::Unavailable(reason) => Err(Error::AiProvider(reason.clone())),
        }
    }
}

#[derive(Clone)]
pub struct MockStoryGenerator {
    story_responses: Arc<Mutex<Vec<std::result::Result<String, String>>>>,
    requests: Arc<Mutex<Vec<StoryRequest>>>,
}

impl MockStoryGenerator {
    pub fn new() -> Self {
        Self {
            story_responses: Arc::new(Mutex::new(Vec::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_story_response(self, story: String) -> Self {
        self.story_responses.lock().unwrap().push(Ok(story));
        self
    }

    /// Queue a provider failure with the given reason.
    pub fn with_failure(self, reason: String) -> Self {
        self.story_responses.lock().unwrap().push(Err(reason));
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn get_requests(&self) -> Vec<StoryRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockStoryGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoryGenerator for MockStoryGenerator {
    async fn generate_story(&self, request: &StoryRequest) -> Result<String> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        let count = requests.len();

        let responses = self.story_responses.lock().unwrap();
        if responses.is_empty() {
            let (style, _) = request.style_and_tone();
            return Ok(format!(
                "一段{}風格的{}故事",
                style, request.analysis.product_name
            ));
        }

        let index = (count - 1) % responses.len();
        responses[index].clone().map_err(Error::AiProvider)
    }
}
