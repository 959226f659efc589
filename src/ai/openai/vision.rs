use super::client::{OpenAiHttpClient, DEFAULT_TIMEOUT};
use super::types::{ChatCompletionRequest, ChatMessage, ChatMessageContent, MessagePart};
use crate::ai::ProductAnalyzer;
use crate::models::AnalysisResult;
use crate::{normalize, prompts, Error, Result};
use async_trait::async_trait;

const MAX_TOKENS: u32 = 800;
const TEMPERATURE: f64 = 0.1;

/// Identifies products in photos through a vision-capable chat model.
pub struct OpenAiVisionClient {
    http: OpenAiHttpClient,
    model: String,
}

impl OpenAiVisionClient {
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

    fn build_request(&self, image_bytes: &[u8]) -> ChatCompletionRequest {
        use base64::Engine as _;
        let base64_image = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let mime = crate::ai::mime::detect_image_mime(image_bytes);
        let data_url = format!("data:{};base64,{}", mime, base64_image);

        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(ChatMessageContent::Parts(vec![
                MessagePart::text(prompts::ANALYSIS),
                MessagePart::image(data_url, "high"),
            ]))],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        }
    }
}

#[async_trait]
impl ProductAnalyzer for OpenAiVisionClient {
    async fn analyze(&self, image_bytes: &[u8]) -> Result<AnalysisResult> {
        tracing::debug!("Analyzing product image ({} bytes)", image_bytes.len());

        let request = self.build_request(image_bytes);
        let response = self.http.chat_completion(&request).await?;

        let content = response
            .first_text()
            .ok_or_else(|| Error::AiProvider("No response from OpenAI vision API".to_string()))?;

        let result = normalize::parse_analysis_reply(content).map_err(|e| {
            tracing::warn!("Could not parse analysis reply: {}", e);
            e
        })?;

        tracing::info!(
            "Identified product '{}' at {} TWD",
            result.product_name,
            result.recommended_price
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::openai::test_support;
    use crate::models::ANALYSIS_FAILED_NAME;
    use crate::ErrorKind;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_string_contains, header};
    use wiremock::{MockServer, ResponseTemplate};

    const JPEG_BYTES: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

    fn make_client(server: &MockServer) -> OpenAiVisionClient {
        OpenAiVisionClient::new("test-key".to_string(), "gpt-4o".to_string())
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_analyze_normalizes_text_price() {
        let server = MockServer::start().await;

        test_support::post(test_support::CHAT_COMPLETIONS_PATH)
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(test_support::chat_reply(
                r#"{"product_name":"牛番茄","recommended_price":"35元"}"#,
            ))
            .mount(&server)
            .await;

        let result = make_client(&server).analyze(&JPEG_BYTES).await.unwrap();

        assert_eq!(result.product_name, "牛番茄");
        assert_eq!(result.recommended_price, 35.0);
        assert!(result.usage_scenarios.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_reads_full_fenced_reply() {
        let server = MockServer::start().await;

        let reply = "```json\n{\n  \"product_name\": \"小番茄\",\n  \"description\": \"酸甜多汁\",\n  \"recommended_price\": 60,\n  \"category\": \"蔬果\",\n  \"features\": [\"酸甜\", \"多汁\"],\n  \"target_audience\": \"小朋友\",\n  \"usage_scenarios\": [\"點心\", \"沙拉\"]\n}\n```";

        test_support::post(test_support::CHAT_COMPLETIONS_PATH)
            .respond_with(test_support::chat_reply(reply))
            .mount(&server)
            .await;

        let result = make_client(&server).analyze(&JPEG_BYTES).await.unwrap();

        assert_eq!(
            result,
            AnalysisResult {
                product_name: "小番茄".to_string(),
                description: "酸甜多汁".to_string(),
                recommended_price: 60.0,
                category: "蔬果".to_string(),
                features: vec!["酸甜".to_string(), "多汁".to_string()],
                target_audience: "小朋友".to_string(),
                usage_scenarios: vec!["點心".to_string(), "沙拉".to_string()],
                raw_response: None,
                error: None,
            }
        );
    }

    #[tokio::test]
    async fn test_analyze_sends_image_and_sampling_settings() {
        let server = MockServer::start().await;

        test_support::post(test_support::CHAT_COMPLETIONS_PATH)
            .and(body_string_contains("\"model\":\"gpt-4o\""))
            .and(body_string_contains("\"max_tokens\":800"))
            .and(body_string_contains("\"temperature\":0.1"))
            .and(body_string_contains("data:image/jpeg;base64,/9j/4A=="))
            .and(body_string_contains("\"detail\":\"high\""))
            .and(body_string_contains("recommended_price 必須是純數字"))
            .respond_with(test_support::chat_reply(r#"{"product_name":"青椒"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let result = make_client(&server).analyze(&JPEG_BYTES).await.unwrap();
        assert_eq!(result.recommended_price, 0.0);
    }

    #[tokio::test]
    async fn test_analyze_non_json_reply_is_malformed() {
        let server = MockServer::start().await;

        test_support::post(test_support::CHAT_COMPLETIONS_PATH)
            .respond_with(test_support::chat_reply("not json"))
            .mount(&server)
            .await;

        let err = make_client(&server).analyze(&JPEG_BYTES).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedReply);

        let fallback = AnalysisResult::failure_fallback(&err);
        assert_eq!(fallback.product_name, ANALYSIS_FAILED_NAME);
        assert_eq!(fallback.recommended_price, 0.0);
        assert!(fallback.raw_response.unwrap().contains("not json"));
    }

    #[tokio::test]
    async fn test_analyze_api_error_is_transport() {
        let server = MockServer::start().await;

        test_support::post(test_support::CHAT_COMPLETIONS_PATH)
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let err = make_client(&server).analyze(&JPEG_BYTES).await.unwrap_err();
        assert!(matches!(err, Error::AiProvider(_)));
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("invalid api key"));
    }

    #[tokio::test]
    async fn test_analyze_rejects_empty_choices() {
        let server = MockServer::start().await;

        test_support::post(test_support::CHAT_COMPLETIONS_PATH)
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let err = make_client(&server).analyze(&JPEG_BYTES).await.unwrap_err();
        assert!(matches!(err, Error::AiProvider(_)));
    }

    #[tokio::test]
    async fn test_analyze_times_out() {
        let server = MockServer::start().await;

        test_support::post(test_support::CHAT_COMPLETIONS_PATH)
            .respond_with(
                test_support::chat_reply(r#"{"product_name":"青椒"}"#)
                    .set_delay(std::time::Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = make_client(&server).with_timeout(std::time::Duration::from_millis(50));
        let err = client.analyze(&JPEG_BYTES).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert!(err.is_retryable());
    }
}
