use crate::config::AppConfig;
use crate::error::{LabError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::{sleep, Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: Role::Model, text: text.into() }
    }
}

#[derive(Debug, Clone)]
pub struct InlineDocument {
    pub mime: String,
    pub data_base64: String,
}

/// One call to the model: a system instruction, the conversation so far, and
/// optional structured-output constraints.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub stage: String,
    pub system: String,
    pub turns: Vec<Turn>,
    pub json: bool,
    pub response_schema: Option<Value>,
    pub document: Option<InlineDocument>,
}

impl GenerationRequest {
    pub fn new(stage: &str, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            system: system.into(),
            turns: vec![Turn::user(user)],
            json: false,
            response_schema: None,
            document: None,
        }
    }

    pub fn conversation(stage: &str, system: impl Into<String>, turns: Vec<Turn>) -> Self {
        Self {
            stage: stage.to_string(),
            system: system.into(),
            turns,
            json: false,
            response_schema: None,
            document: None,
        }
    }

    pub fn json(mut self, schema: Option<Value>) -> Self {
        self.json = true;
        self.response_schema = schema;
        self
    }

    pub fn with_document(mut self, document: InlineDocument) -> Self {
        self.document = Some(document);
        self
    }

    pub fn last_user_text(&self) -> &str {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
            .unwrap_or_default()
    }
}

pub trait LlmBackend: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> impl Future<Output = Result<String>> + Send;
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    max_retries: u32,
    dump_dir: Option<PathBuf>,
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_base: config.api_base.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
            dump_dir: config.dump_dir.clone(),
        })
    }

    /// The API key goes in the `x-goog-api-key` header.
    fn build_request(&self, request: &GenerationRequest) -> Result<reqwest::Request> {
        let url = format!("{}/{}:generateContent", self.api_base, self.model);
        Ok(self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_payload(request))
            .build()?)
    }

    async fn generate_attempt(&self, request: &GenerationRequest) -> Result<String> {
        let res = self.client.execute(self.build_request(request)?).await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            log::error!("API Error ({}): {} {}", request.stage, status, body);
            return Err(LabError::ApiStatus { status, body });
        }

        let body: Value = res.json().await?;
        let text = extract_text(&body)?;
        let text = if request.json { clean_json_block(&text) } else { text };

        if let Some(dir) = &self.dump_dir {
            self.dump_response(dir, &request.stage, &text).await;
        }

        Ok(text)
    }

    async fn dump_response(&self, dir: &Path, stage: &str, text: &str) {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let safe_stage = stage.replace(' ', "_").replace('/', "-");
        let path = dir.join(format!("llm_response_{safe_stage}_{timestamp}.txt"));

        if let Err(e) = tokio::fs::write(&path, text).await {
            log::warn!("Failed to dump response to {}: {}", path.display(), e);
        } else {
            log::info!("LLM response dumped to '{}'", path.display());
        }
    }
}

impl LlmBackend for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        for attempt in 1..=self.max_retries {
            match self.generate_attempt(request).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    log::warn!("[{}] attempt {attempt}/{} failed: {e}", request.stage, self.max_retries);
                    if attempt == self.max_retries || !e.is_retryable() {
                        return Err(e);
                    }
                    sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
            }
        }
        Err(LabError::GenerationFailed("Max retries exceeded".into()))
    }
}

pub(crate) fn build_payload(request: &GenerationRequest) -> Value {
    let mut contents: Vec<Value> = request
        .turns
        .iter()
        .map(|t| json!({ "role": t.role, "parts": [{ "text": t.text }] }))
        .collect();

    if let Some(doc) = &request.document {
        let inline = json!({ "inlineData": { "mimeType": doc.mime, "data": doc.data_base64 } });
        match contents.last_mut().and_then(|c| c["parts"].as_array_mut()) {
            Some(parts) => parts.insert(0, inline),
            None => contents.push(json!({ "role": "user", "parts": [inline] })),
        }
    }

    let mut payload = json!({ "contents": contents });

    if !request.system.trim().is_empty() {
        payload["systemInstruction"] = json!({ "parts": [{ "text": request.system }] });
    }

    if request.json {
        payload["generationConfig"] = json!({ "responseMimeType": "application/json" });
        if let Some(schema) = &request.response_schema {
            payload["generationConfig"]["responseSchema"] = schema.clone();
        }
    }

    payload
}

pub(crate) fn extract_text(body: &Value) -> Result<String> {
    let parts = body["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| {
            let reason = body["promptFeedback"]["blockReason"].as_str().unwrap_or("no candidates");
            LabError::GenerationFailed(format!("No text content returned ({reason})"))
        })?;

    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.trim().is_empty() {
        return Err(LabError::GenerationFailed("No text content returned".into()));
    }
    Ok(text)
}

pub fn clean_json_block(text: &str) -> String {
    let trimmed = text.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed.to_string();
    };
    let after_fence = &trimmed[open + 3..];
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.rfind("```").unwrap_or(body.len());
    body[..end].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_system_turns_and_schema() {
        let req = GenerationRequest::conversation(
            "Chat",
            "be kind",
            vec![Turn::user("hi"), Turn::model("hello"), Turn::user("bye")],
        )
        .json(Some(json!({ "type": "object" })));
        let payload = build_payload(&req);

        assert_eq!(payload["systemInstruction"]["parts"][0]["text"], "be kind");
        assert_eq!(payload["contents"][1]["role"], "model");
        assert_eq!(payload["contents"][2]["parts"][0]["text"], "bye");
        assert_eq!(payload["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(payload["generationConfig"]["responseSchema"]["type"], "object");
    }

    #[test]
    fn plain_text_requests_have_no_generation_config() {
        let payload = build_payload(&GenerationRequest::new("Gen", "", "x"));
        assert!(payload.get("generationConfig").is_none());
        assert!(payload.get("systemInstruction").is_none());
    }

    #[test]
    fn document_goes_first_in_last_user_turn() {
        let req = GenerationRequest::new("Extract", "sys", "read this").with_document(InlineDocument {
            mime: "application/pdf".into(),
            data_base64: "JVBERi0=".into(),
        });
        let payload = build_payload(&req);
        assert_eq!(payload["contents"][0]["parts"][0]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(payload["contents"][0]["parts"][1]["text"], "read this");
    }

    #[test]
    fn extract_text_joins_parts() {
        let body = json!({ "candidates": [{ "content": { "parts": [{ "text": "a" }, { "text": "b" }] } }] });
        assert_eq!(extract_text(&body).unwrap(), "ab");
    }

    #[test]
    fn blocked_prompt_reports_reason() {
        let body = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(extract_text(&body).unwrap_err().to_string().contains("SAFETY"));
    }

    #[test]
    fn fences_are_stripped() {
        assert_eq!(clean_json_block("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(clean_json_block("```\n[1]\n```"), "[1]");
        assert_eq!(clean_json_block("  {\"a\":1} "), "{\"a\":1}");
    }

    fn client_for(api_base: &str, api_key: &str) -> GeminiClient {
        GeminiClient::new(&AppConfig {
            api_key: api_key.into(),
            model: "gemini-test".into(),
            api_base: api_base.into(),
            timeout: Duration::from_secs(5),
            max_retries: 1,
            dump_dir: None,
            max_upload_bytes: 1024,
            rate_limit: std::num::NonZeroU32::MIN,
            rate_window: Duration::from_secs(60),
        })
        .unwrap()
    }

    #[test]
    fn api_key_is_sent_as_header() {
        let client = client_for("https://example.test/v1beta/models", "SECRETKEY123");
        let req = client.build_request(&GenerationRequest::new("Gen", "", "x")).unwrap();
        assert_eq!(req.url().as_str(), "https://example.test/v1beta/models/gemini-test:generateContent");
        assert_eq!(req.headers()["x-goog-api-key"], "SECRETKEY123");
    }

    #[tokio::test]
    async fn transport_errors_do_not_leak_the_key() {
        let client = client_for("http://127.0.0.1:9/v1beta/models", "SECRETKEY123");
        let err = client.generate(&GenerationRequest::new("Gen", "", "x")).await.unwrap_err();
        assert!(matches!(err, LabError::Api(_)));
        assert!(!err.to_string().contains("SECRETKEY123"), "{err}");
        assert!(!format!("{err:?}").contains("SECRETKEY123"));
    }

    #[test]
    fn last_user_text_skips_model_turns() {
        let req = GenerationRequest::conversation("c", "", vec![Turn::user("q"), Turn::model("a")]);
        assert_eq!(req.last_user_text(), "q");
    }
}
