use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    config::GeminiConfig,
    intake,
    models::{GenerationResult, ProductDescription, Source},
    prompt,
};

/// Why a generation call failed, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("credential invalid or missing")]
    AuthFailure,
    #[error("blocked by the provider's safety filters")]
    ContentFiltered,
    #[error("provider quota exhausted")]
    QuotaExceeded,
    #[error("{0}")]
    Unknown(String),
}

impl GenerationError {
    /// Maps a provider failure message onto the error taxonomy.
    ///
    /// Matching is case-sensitive substring search on the provider's wording;
    /// anything unrecognised stays `Unknown` with the message preserved.
    pub fn classify(message: &str) -> Self {
        if message.contains("404") || message.contains("entity was not found") {
            GenerationError::AuthFailure
        } else if message.contains("SAFETY") {
            GenerationError::ContentFiltered
        } else if message.contains("quota") || message.contains("429") {
            GenerationError::QuotaExceeded
        } else {
            GenerationError::Unknown(message.to_string())
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::AuthFailure => "AUTH_FAILURE",
            GenerationError::ContentFiltered => "CONTENT_FILTERED",
            GenerationError::QuotaExceeded => "QUOTA_EXCEEDED",
            GenerationError::Unknown(_) => "GENERATION_FAILED",
        }
    }

    /// Localized, human-readable message for the form banner.
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::AuthFailure => {
                "API Key 验证失败。请使用您自己的 API Key 关联后重试。".to_string()
            }
            GenerationError::ContentFiltered => {
                "生成被安全系统拦截：内容可能涉及敏感词汇，请尝试修改产品描述后再试。".to_string()
            }
            GenerationError::QuotaExceeded => "API 配额已用尽，请稍后再试。".to_string(),
            GenerationError::Unknown(msg) => {
                let msg = if msg.trim().is_empty() { "未知原因" } else { msg.as_str() };
                format!("生成失败：{msg}。建议检查网络连接或更换 API Key。")
            }
        }
    }
}

/// Anything that can turn a product description into a listing bundle.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, input: &ProductDescription) -> Result<GenerationResult, GenerationError>;
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            *val = Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

/// Stateless client for the `generateContent` endpoint.
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Builds the request body: instruction, schema, optional front image, settings.
    pub fn build_request(&self, input: &ProductDescription) -> Result<Value, GenerationError> {
        let mut parts = Vec::new();
        if let Some(url) = &input.front_image {
            let image = intake::parse_data_url(url)
                .map_err(|e| GenerationError::Unknown(format!("front image rejected: {e}")))?;
            parts.push(json!({ "inlineData": { "mimeType": image.mime_type, "data": image.data } }));
        }
        parts.push(json!({ "text": prompt::user_prompt(input) }));

        // Swimwear imagery trips the default thresholds; only high-probability hits are blocked.
        let safety_settings: Vec<Value> = [
            "HARM_CATEGORY_HARASSMENT",
            "HARM_CATEGORY_HATE_SPEECH",
            "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            "HARM_CATEGORY_DANGEROUS_CONTENT",
        ]
        .into_iter()
        .map(|category| json!({ "category": category, "threshold": "BLOCK_ONLY_HIGH" }))
        .collect();

        Ok(json!({
            "systemInstruction": {
                "parts": [{ "text": prompt::system_instruction(input.category) }]
            },
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": prompt::response_schema(),
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_output_tokens,
                "candidateCount": 1
            },
            "safetySettings": safety_settings
        }))
    }

    /// Sends one request. Failures come back as the provider's raw message.
    async fn perform_api_call(&self, api_key: &str, request_body: &Value) -> Result<GeminiResponse, String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            api_key
        );

        info!("🔗 Making request to: {}", url.replace(api_key, "***"));

        let mut loggable = request_body.clone();
        truncate_base64_in_json(&mut loggable);
        // the schema dominates the body; log everything else
        if let Some(config) = loggable.get_mut("generationConfig").and_then(Value::as_object_mut) {
            config.remove("responseSchema");
        }
        info!("📤 Request body: {}", serde_json::to_string(&loggable).unwrap_or_default());

        let response = self
            .client
            .post(&url)
            .json(request_body)
            .send()
            .await
            .map_err(|e| e.to_string().replace(api_key, "***"))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response.text().await.map_err(|e| e.to_string())?;
        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(format!("status={} body={}", status, response_text));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            let preview: String = response_text.chars().take(1000).collect();
            format!("parse error: {e}: {preview}")
        })
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate(&self, input: &ProductDescription) -> Result<GenerationResult, GenerationError> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            error!("❌ No API key configured; the user must select one");
            return Err(GenerationError::AuthFailure);
        };
        input
            .validate()
            .map_err(|e| GenerationError::Unknown(format!("invalid product description: {e}")))?;

        info!("🚀 Generating listing bundle for '{}' ({})", input.name, input.category);
        let body = self.build_request(input)?;

        let parsed = match self.perform_api_call(api_key, &body).await {
            Ok(parsed) => parsed,
            Err(message) if message.starts_with("parse error") => {
                error!("❌ Unreadable provider envelope: {}", message);
                return Err(GenerationError::Unknown(message));
            }
            Err(message) => {
                let err = GenerationError::classify(&message);
                error!("❌ Generation failed ({}): {}", err.code(), message);
                return Err(err);
            }
        };

        if let Some(reason) = parsed.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref()) {
            let err = GenerationError::classify(&format!("prompt blocked: blockReason={reason}"));
            error!("❌ Prompt blocked by provider: {}", reason);
            return Err(err);
        }

        let Some(candidate) = parsed.candidates.first() else {
            return Err(GenerationError::Unknown("provider returned no candidates".into()));
        };
        let text = candidate.text();
        if text.trim().is_empty() {
            let reason = candidate.finish_reason.as_deref().unwrap_or("UNKNOWN");
            let err = GenerationError::classify(&format!("empty response: finishReason={reason}"));
            error!("❌ Empty response from provider ({})", reason);
            return Err(err);
        }

        let mut result = decode_result(&text)?;
        result.sources.extend(candidate.sources());

        for warning in result.shape_warnings() {
            warn!("⚠️ Provider output shape: {}", warning);
        }
        info!(
            "✅ Generated '{}' with {} bullets and {} roadmap phases",
            result.listing.main_title,
            result.listing.bullet_points.len(),
            result.ads.detailed_roadmap.len()
        );
        Ok(result)
    }
}

/// Removes a surrounding Markdown code fence (```` ```json ... ``` ````).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Strict decode of the model's text into a [`GenerationResult`].
///
/// `null` members are dropped first so they read as absent optional fields;
/// a `null` required field therefore still fails.
pub fn decode_result(text: &str) -> Result<GenerationResult, GenerationError> {
    let mut value: Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| GenerationError::Unknown(format!("response is not valid JSON: {e}")))?;
    prune_nulls(&mut value);
    serde_json::from_value(value)
        .map_err(|e| GenerationError::Unknown(format!("response does not match the expected shape: {e}")))
}

fn prune_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(prune_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(prune_nulls),
        _ => {}
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Debug, Deserialize)]
struct WebSource {
    #[serde(default)]
    uri: String,
    #[serde(default)]
    title: String,
}

impl Candidate {
    fn text(&self) -> String {
        self.content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                Part::Other(_) => None,
            })
            .collect()
    }

    fn sources(&self) -> Vec<Source> {
        self.grounding_metadata
            .iter()
            .flat_map(|meta| &meta.grounding_chunks)
            .filter_map(|chunk| chunk.web.as_ref())
            .filter(|web| !web.uri.is_empty())
            .map(|web| Source {
                title: web.title.clone(),
                uri: web.uri.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{sample_input, sample_result, RESULT_JSON, TINY_PNG};
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_provider_messages() {
        assert_eq!(GenerationError::classify("Error: 404 entity was not found"), GenerationError::AuthFailure);
        assert_eq!(GenerationError::classify("Requested entity was not found."), GenerationError::AuthFailure);
        assert_eq!(GenerationError::classify("finishReason=SAFETY"), GenerationError::ContentFiltered);
        assert_eq!(GenerationError::classify("You exceeded your current quota"), GenerationError::QuotaExceeded);
        assert_eq!(GenerationError::classify("status=429 Too Many Requests"), GenerationError::QuotaExceeded);
        assert_eq!(
            GenerationError::classify("network timeout"),
            GenerationError::Unknown("network timeout".into())
        );
    }

    #[test]
    fn classification_is_case_sensitive() {
        assert!(matches!(GenerationError::classify("safety"), GenerationError::Unknown(_)));
        assert!(matches!(GenerationError::classify("QUOTA"), GenerationError::Unknown(_)));
    }

    #[test]
    fn unknown_message_falls_back_when_blank() {
        let msg = GenerationError::Unknown(String::new()).user_message();
        assert!(msg.contains("未知原因"));
        let msg = GenerationError::Unknown("network timeout".into()).user_message();
        assert!(msg.contains("network timeout"));
    }

    #[test]
    fn strips_code_fences() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn fenced_and_bare_output_decode_identically() {
        let fenced = format!("```json\n{RESULT_JSON}\n```");
        assert_eq!(decode_result(&fenced).unwrap(), decode_result(RESULT_JSON).unwrap());
        assert_eq!(decode_result(RESULT_JSON).unwrap(), sample_result());
    }

    #[test]
    fn null_optional_fields_read_as_empty() {
        let mut value: Value = serde_json::from_str(RESULT_JSON).unwrap();
        value["listing"]["searchTerms"] = Value::Null;
        value["listing"]["visualAssets"]["productVideo"] = Value::Null;
        let result = decode_result(&value.to_string()).unwrap();
        assert!(result.listing.search_terms.is_empty());
        assert!(result.listing.visual_assets.product_video.is_none());
    }

    #[test]
    fn shape_mismatches_are_unknown_failures() {
        assert!(matches!(decode_result("not json"), Err(GenerationError::Unknown(m)) if m.contains("not valid JSON")));
        let mut value: Value = serde_json::from_str(RESULT_JSON).unwrap();
        value["listing"]["mainTitle"] = Value::Null;
        assert!(matches!(
            decode_result(&value.to_string()),
            Err(GenerationError::Unknown(m)) if m.contains("mainTitle")
        ));
    }

    #[test]
    fn request_inlines_front_image_only() {
        use base64::Engine;
        let client = GeminiClient::new(GeminiConfig::default());
        let mut input = sample_input();
        let png = base64::engine::general_purpose::STANDARD.encode(TINY_PNG);
        input.front_image = Some(format!("data:image/png;base64,{png}"));
        input.back_image = Some(format!("data:image/png;base64,{png}"));

        let body = client.build_request(&input).unwrap();
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], png);
        assert!(parts[1]["text"].as_str().unwrap().contains("Retro high-cut"));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn request_without_images_is_text_only() {
        let client = GeminiClient::new(GeminiConfig::default());
        let body = client.build_request(&sample_input()).unwrap();
        assert_eq!(body["contents"][0]["parts"].as_array().unwrap().len(), 1);
        assert!(body["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Swimwear"));
    }

    #[test]
    fn truncates_long_base64_for_logging() {
        let data = "A".repeat(200);
        let mut value = json!({ "parts": [{ "inlineData": { "data": data } }] });
        truncate_base64_in_json(&mut value);
        let logged = value["parts"][0]["inlineData"]["data"].as_str().unwrap();
        assert!(logged.ends_with("[truncated 150 chars]"));
    }

    #[tokio::test]
    async fn missing_credential_is_an_auth_failure() {
        let client = GeminiClient::new(GeminiConfig::default());
        assert!(!client.has_credential());
        assert_eq!(client.generate(&sample_input()).await, Err(GenerationError::AuthFailure));
    }
}
