//! Data models and structures
//!
//! Defines the analysis and story payloads exchanged with the AI clients,
//! the persisted product record, and runtime configuration.

use crate::{Error, ErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

pub const ANALYSIS_FAILED_NAME: &str = "分析失敗";
pub const ANALYSIS_ERROR_NAME: &str = "分析錯誤";

/// Longest story prompt accepted, in characters.
pub const MAX_STORY_PROMPT_CHARS: usize = 500;

/// Largest price a `DECIMAL(10, 2)` column can hold.
pub const MAX_STORED_PRICE: f64 = 99_999_999.99;

/// Structured product description produced by image analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisResult {
    pub product_name: String,
    pub description: String,
    pub recommended_price: f64,
    pub category: String,
    pub features: Vec<String>,
    pub target_audience: String,
    pub usage_scenarios: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    /// Success-shaped payload describing a failed analysis.
    ///
    /// Unparseable replies are reported as "分析失敗" with the raw reply
    /// attached; every other failure is "分析錯誤" with the error text.
    pub fn failure_fallback(error: &Error) -> Self {
        let error = match error {
            Error::Analysis { source, .. } => source.as_ref(),
            other => other,
        };

        match error {
            Error::MalformedReply {
                reason,
                raw_response,
            } => Self {
                product_name: ANALYSIS_FAILED_NAME.to_string(),
                description: format!("OpenAI 回應解析失敗: {}", reason),
                recommended_price: 0.0,
                category: "未知".to_string(),
                target_audience: "未知".to_string(),
                raw_response: Some(raw_response.clone()),
                ..Default::default()
            },
            other => Self {
                product_name: ANALYSIS_ERROR_NAME.to_string(),
                description: format!("分析過程發生錯誤: {}", other),
                recommended_price: 0.0,
                category: "錯誤".to_string(),
                target_audience: "未知".to_string(),
                error: Some(other.to_string()),
                ..Default::default()
            },
        }
    }

    pub fn is_failure_sentinel(&self) -> bool {
        (self.product_name == ANALYSIS_FAILED_NAME || self.product_name == ANALYSIS_ERROR_NAME)
            && (self.raw_response.is_some() || self.error.is_some())
    }
}

/// One of the fixed narrative presets for story generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStyle {
    WarmFamily,
    Pastoral,
    Health,
    Nostalgic,
    ModernMinimal,
    ChildFriendly,
    Scientific,
    Romantic,
}

/// Tone used when the requested style is not one of [`StoryStyle::ALL`].
pub const FALLBACK_TONE: &str = "以親切友善的語氣描述，讓讀者感受到商品的魅力";

impl StoryStyle {
    pub const ALL: [StoryStyle; 8] = [
        StoryStyle::WarmFamily,
        StoryStyle::Pastoral,
        StoryStyle::Health,
        StoryStyle::Nostalgic,
        StoryStyle::ModernMinimal,
        StoryStyle::ChildFriendly,
        StoryStyle::Scientific,
        StoryStyle::Romantic,
    ];

    pub fn key(self) -> &'static str {
        match self {
            StoryStyle::WarmFamily => "warm_family",
            StoryStyle::Pastoral => "pastoral",
            StoryStyle::Health => "health",
            StoryStyle::Nostalgic => "nostalgic",
            StoryStyle::ModernMinimal => "modern_minimal",
            StoryStyle::ChildFriendly => "child_friendly",
            StoryStyle::Scientific => "scientific",
            StoryStyle::Romantic => "romantic",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StoryStyle::WarmFamily => "溫馨家庭",
            StoryStyle::Pastoral => "田園風光",
            StoryStyle::Health => "健康養生",
            StoryStyle::Nostalgic => "懷舊復古",
            StoryStyle::ModernMinimal => "現代簡約",
            StoryStyle::ChildFriendly => "童趣可愛",
            StoryStyle::Scientific => "科學知識",
            StoryStyle::Romantic => "浪漫詩意",
        }
    }

    pub fn tone(self) -> &'static str {
        match self {
            StoryStyle::WarmFamily => "以溫暖的家庭氛圍描述，強調親情、團聚與分享的美好時光",
            StoryStyle::Pastoral => "以田園鄉村的意象描述，強調自然、土地與農人的用心栽種",
            StoryStyle::Health => "以健康養生的角度描述，強調營養價值與對身體的益處",
            StoryStyle::Nostalgic => "以懷舊的口吻描述，喚起兒時記憶與傳統的味道",
            StoryStyle::ModernMinimal => "以簡潔俐落的現代風格描述，句子精煉、重點明確",
            StoryStyle::ChildFriendly => "以活潑可愛、適合孩子閱讀的語氣描述，用詞淺顯有趣",
            StoryStyle::Scientific => "以科普知識的角度描述，加入產地、成分或原理等知識",
            StoryStyle::Romantic => "以浪漫詩意的文字描述，營造美好的情境與感受",
        }
    }
}

impl fmt::Display for StoryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StoryStyle {
    type Err = Error;

    /// Accepts either the key (`health`) or the label (`健康養生`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        StoryStyle::ALL
            .into_iter()
            .find(|style| style.key() == s || style.label() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown story style '{}'", s)))
    }
}

/// Input for story generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRequest {
    pub analysis: AnalysisResult,
    pub style: String,
    pub prompt: String,
}

impl StoryRequest {
    pub fn new(
        analysis: AnalysisResult,
        style: impl Into<String>,
        prompt: impl Into<String>,
    ) -> crate::Result<Self> {
        let prompt = prompt.into().trim().to_string();
        if prompt.is_empty() {
            return Err(Error::InvalidInput("Story prompt is empty".to_string()));
        }
        let chars = prompt.chars().count();
        if chars > MAX_STORY_PROMPT_CHARS {
            return Err(Error::InvalidInput(format!(
                "Story prompt is {} characters; the limit is {}",
                chars, MAX_STORY_PROMPT_CHARS
            )));
        }

        Ok(Self {
            analysis,
            style: style.into(),
            prompt,
        })
    }

    /// The recognized style, if any.
    pub fn story_style(&self) -> Option<StoryStyle> {
        self.style.parse().ok()
    }

    /// Display name and tone instruction, falling back to a generic tone.
    pub fn style_and_tone(&self) -> (&str, &'static str) {
        match self.story_style() {
            Some(style) => (style.label(), style.tone()),
            None => (self.style.as_str(), FALLBACK_TONE),
        }
    }
}

/// Legacy single-string rendering of a story generation failure.
pub fn story_failure_message(error: &Error) -> String {
    format!("故事生成失敗: {}", error)
}

/// A product photo and everything learned about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: Uuid,
    pub image_path: PathBuf,
    pub uploaded_at: DateTime<Utc>,

    pub product_name: String,
    pub description: String,
    pub recommended_price: Option<f64>,
    pub analysis: Option<AnalysisResult>,
    pub analyzed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,

    #[serde(default)]
    pub story_content: String,
    #[serde(default)]
    pub story_style: String,
    #[serde(default)]
    pub story_prompt: String,
    #[serde(default)]
    pub story_generated: bool,
}

impl ProductRecord {
    pub fn new(image_path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            image_path,
            uploaded_at: Utc::now(),
            product_name: String::new(),
            description: String::new(),
            recommended_price: None,
            analysis: None,
            analyzed: false,
            analysis_error: None,
            story_content: String::new(),
            story_style: String::new(),
            story_prompt: String::new(),
            story_generated: false,
        }
    }

    pub fn apply_analysis(&mut self, analysis: &AnalysisResult) {
        self.product_name = analysis.product_name.clone();
        self.description = analysis.description.clone();
        self.recommended_price = Some(to_stored_price(analysis.recommended_price));
        self.analysis = Some(analysis.clone());
        self.analyzed = true;
        self.analysis_error = None;
    }

    /// Keeps the record unanalyzed and notes why.
    pub fn record_analysis_failure(&mut self, error: &Error) {
        self.analyzed = false;
        self.analysis_error = Some(error.to_string());
        if error.kind() == ErrorKind::MalformedReply {
            self.analysis = Some(AnalysisResult::failure_fallback(error));
        }
    }

    pub fn apply_story(&mut self, request: &StoryRequest, story: String) {
        self.story_style = request.style.clone();
        self.story_prompt = request.prompt.clone();
        self.story_content = story;
        self.story_generated = true;
    }
}

impl fmt::Display for ProductRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.product_name.is_empty() {
            "未分析"
        } else {
            &self.product_name
        };
        write!(f, "商品圖片 - {}", name)
    }
}

/// Round to cents and clamp into the range of a `DECIMAL(10, 2)` column.
pub fn to_stored_price(price: f64) -> f64 {
    if !price.is_finite() || price <= 0.0 {
        return 0.0;
    }
    if price > MAX_STORED_PRICE {
        tracing::warn!("Price {} exceeds storable maximum, clamping", price);
        return MAX_STORED_PRICE;
    }
    (price * 100.0).round() / 100.0
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub vision_model: String,
    pub story_model: String,
    pub request_timeout: Duration,
    pub max_retries: usize,
    pub retry_delay: Duration,
    pub records_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Config("OPENAI_API_KEY not set".to_string()))?;

        Ok(Self {
            openai_api_key,
            openai_base_url: lookup("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            vision_model: lookup("VISION_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
            story_model: lookup("STORY_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
            request_timeout: Duration::from_secs(parse_var(
                &lookup,
                "AI_REQUEST_TIMEOUT_SECS",
                60,
            )?),
            max_retries: parse_var(&lookup, "AI_MAX_RETRIES", 2)?,
            retry_delay: Duration::from_millis(parse_var(&lookup, "AI_RETRY_DELAY_MS", 2000)?),
            records_dir: lookup("RECORDS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("records")),
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> crate::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn tomato() -> AnalysisResult {
        AnalysisResult {
            product_name: "牛番茄".to_string(),
            description: "果肉厚實的大番茄".to_string(),
            recommended_price: 35.0,
            category: "蔬果".to_string(),
            features: vec!["果肉厚實".to_string(), "酸甜適中".to_string()],
            target_audience: "家庭主婦".to_string(),
            usage_scenarios: vec!["沙拉".to_string()],
            ..Default::default()
        }
    }

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_analysis_result_serialization_omits_diagnostics() {
        let json = serde_json::to_string(&tomato()).unwrap();
        assert!(json.contains("\"recommended_price\":35.0"));
        assert!(!json.contains("raw_response"));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_failure_fallback_for_malformed_reply() {
        let err = Error::malformed("invalid JSON", "not json");
        let fallback = AnalysisResult::failure_fallback(&err);

        assert_eq!(fallback.product_name, ANALYSIS_FAILED_NAME);
        assert_eq!(fallback.recommended_price, 0.0);
        assert_eq!(fallback.raw_response.as_deref(), Some("not json"));
        assert!(fallback.error.is_none());
        assert!(fallback.is_failure_sentinel());
    }

    #[test]
    fn test_failure_fallback_for_transport_error() {
        let err = Error::AiProvider("OpenAI API error (status 401): bad key".to_string());
        let fallback = AnalysisResult::failure_fallback(&err);

        assert_eq!(fallback.product_name, ANALYSIS_ERROR_NAME);
        assert_eq!(fallback.category, "錯誤");
        assert!(fallback.error.unwrap().contains("status 401"));
    }

    #[test]
    fn test_failure_fallback_unwraps_record_error() {
        let err = Error::Analysis {
            record_id: Uuid::new_v4(),
            source: Box::new(Error::malformed("invalid JSON", "oops")),
        };
        let fallback = AnalysisResult::failure_fallback(&err);
        assert_eq!(fallback.product_name, ANALYSIS_FAILED_NAME);
    }

    #[test]
    fn test_real_product_named_like_sentinel_is_not_failure() {
        let mut result = tomato();
        result.product_name = ANALYSIS_FAILED_NAME.to_string();
        assert!(!result.is_failure_sentinel());
    }

    #[test]
    fn test_story_style_parses_key_and_label() {
        assert_eq!("health".parse::<StoryStyle>().unwrap(), StoryStyle::Health);
        assert_eq!("健康養生".parse::<StoryStyle>().unwrap(), StoryStyle::Health);
        assert!("cyberpunk".parse::<StoryStyle>().is_err());
    }

    #[test]
    fn test_story_styles_have_distinct_tones() {
        let mut tones: Vec<&str> = StoryStyle::ALL.iter().map(|s| s.tone()).collect();
        tones.sort();
        tones.dedup();
        assert_eq!(tones.len(), 8);
        assert!(!tones.contains(&FALLBACK_TONE));
    }

    #[test]
    fn test_story_style_serializes_as_key() {
        assert_eq!(
            serde_json::to_string(&StoryStyle::ModernMinimal).unwrap(),
            "\"modern_minimal\""
        );
    }

    #[test]
    fn test_story_request_unknown_style_falls_back() {
        let request = StoryRequest::new(tomato(), "賽博龐克", "寫一段故事").unwrap();
        assert!(request.story_style().is_none());
        assert_eq!(request.style_and_tone(), ("賽博龐克", FALLBACK_TONE));
    }

    #[test]
    fn test_story_request_rejects_long_prompt() {
        let prompt = "字".repeat(MAX_STORY_PROMPT_CHARS + 1);
        let err = StoryRequest::new(tomato(), "health", prompt).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_story_request_accepts_prompt_at_limit() {
        let prompt = "字".repeat(MAX_STORY_PROMPT_CHARS);
        assert!(StoryRequest::new(tomato(), "health", prompt).is_ok());
    }

    #[test]
    fn test_story_request_rejects_blank_prompt() {
        assert!(StoryRequest::new(tomato(), "health", "   ").is_err());
    }

    #[test]
    fn test_story_failure_message() {
        let msg = story_failure_message(&Error::AiProvider("timeout".to_string()));
        assert!(msg.starts_with("故事生成失敗: "));
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn test_record_apply_analysis() {
        let mut record = ProductRecord::new(PathBuf::from("tomato.jpg"));
        assert_eq!(record.to_string(), "商品圖片 - 未分析");

        record.apply_analysis(&tomato());

        assert!(record.analyzed);
        assert_eq!(record.recommended_price, Some(35.0));
        assert_eq!(record.to_string(), "商品圖片 - 牛番茄");
        assert_eq!(record.analysis, Some(tomato()));
    }

    #[test]
    fn test_record_analysis_failure_keeps_unanalyzed() {
        let mut record = ProductRecord::new(PathBuf::from("blurry.jpg"));
        record.record_analysis_failure(&Error::malformed("invalid JSON", "not json"));

        assert!(!record.analyzed);
        assert!(record.analysis_error.unwrap().contains("invalid JSON"));
        assert!(record.analysis.unwrap().is_failure_sentinel());
    }

    #[test]
    fn test_record_apply_story() {
        let mut record = ProductRecord::new(PathBuf::from("tomato.jpg"));
        record.apply_analysis(&tomato());
        let request = StoryRequest::new(tomato(), "健康養生", "介紹營養價值").unwrap();

        record.apply_story(&request, "一顆番茄的故事".to_string());

        assert!(record.story_generated);
        assert_eq!(record.story_style, "健康養生");
        assert_eq!(record.story_prompt, "介紹營養價值");
    }

    #[test]
    fn test_stored_price_rounding_and_clamping() {
        assert_eq!(to_stored_price(1200.456), 1200.46);
        assert_eq!(to_stored_price(0.0), 0.0);
        assert_eq!(to_stored_price(1e12), MAX_STORED_PRICE);
        assert_eq!(to_stored_price(f64::NAN), 0.0);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup_from(&[("OPENAI_API_KEY", "sk-test")])).unwrap();

        assert_eq!(config.openai_api_key, "sk-test");
        assert_eq!(config.openai_base_url, "https://api.openai.com");
        assert_eq!(config.vision_model, "gpt-4o");
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.records_dir, PathBuf::from("records"));
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:8080/"),
            ("STORY_MODEL", "gpt-4o-mini"),
            ("AI_REQUEST_TIMEOUT_SECS", "15"),
            ("AI_MAX_RETRIES", "0"),
        ]))
        .unwrap();

        assert_eq!(config.openai_base_url, "http://localhost:8080");
        assert_eq!(config.story_model, "gpt-4o-mini");
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_config_requires_api_key() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_config_rejects_bad_number() {
        let err = Config::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("AI_MAX_RETRIES", "many"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("AI_MAX_RETRIES"));
    }
}
