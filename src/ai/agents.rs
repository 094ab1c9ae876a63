use super::client::{GenerationRequest, InlineDocument, LlmBackend, Turn};
use super::prompts;
use super::schema_utils;
use crate::core::composer;
use crate::core::feedback::OptimizationPair;
use crate::core::form::{FewShotExample, FieldUpdate, FormField, PromptForm};
use crate::error::{LabError, Result};
use crate::upload::UploadedDocument;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const MAX_PARSE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ExtractedTool {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ExtractedFlow {
    pub name: String,
    pub steps: Vec<String>,
}

/// Form fields recovered from an uploaded document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ExtractedForm {
    pub title: Option<String>,
    pub persona_name: Option<String>,
    pub persona_role: Option<String>,
    pub persona_tone: Option<String>,
    pub persona_language: Option<String>,
    pub objective: Option<String>,
    pub business_context: Option<String>,
    pub rules: Vec<String>,
    pub few_shot_examples: Vec<FewShotExample>,
    pub tools: Vec<ExtractedTool>,
    pub flows: Vec<ExtractedFlow>,
}

impl ExtractedForm {
    pub fn into_updates(self) -> Vec<FieldUpdate> {
        let mut updates = Vec::new();
        let scalars = [
            (FormField::Title, self.title),
            (FormField::PersonaName, self.persona_name),
            (FormField::PersonaRole, self.persona_role),
            (FormField::PersonaTone, self.persona_tone),
            (FormField::PersonaLanguage, self.persona_language),
            (FormField::Objective, self.objective),
            (FormField::BusinessContext, self.business_context),
        ];
        for (field, value) in scalars {
            if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
                updates.push(FieldUpdate::new(field, v));
            }
        }
        for rule in self.rules.into_iter().filter(|r| !r.trim().is_empty()) {
            updates.push(FieldUpdate::new(FormField::Rule, rule));
        }
        for ex in self.few_shot_examples {
            if !ex.user.trim().is_empty() && !ex.agent.trim().is_empty() {
                updates.push(FieldUpdate::new(FormField::FewShotExample, format!("{} => {}", ex.user, ex.agent)));
            }
        }
        for tool in self
            .tools
            .into_iter()
            .filter(|t| !t.name.trim().is_empty() && !t.description.trim().is_empty())
        {
            updates.push(FieldUpdate::new(FormField::Tool, format!("{}: {}", tool.name, tool.description)));
        }
        for flow in self.flows.into_iter().filter(|f| !f.name.trim().is_empty() && !f.steps.is_empty()) {
            updates.push(FieldUpdate::new(FormField::Flow, format!("{}: {}", flow.name, flow.steps.join("; "))));
        }
        updates
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct VoiceCommandResponse {
    pub updates: Vec<FieldUpdate>,
    pub reply: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PromptEvaluation {
    #[schemars(description = "Overall score from 0 to 10.")]
    pub score: f32,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
}

/// The LLM-backed steps of the prompt laboratory.
pub struct PromptAgents<B> {
    backend: B,
}

impl<B: LlmBackend> PromptAgents<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn generate_master_prompt(&self, form: &PromptForm) -> Result<String> {
        form.validate()?;
        let request = GenerationRequest::new(
            "Master Prompt",
            prompts::GENERATOR_PROMPT,
            composer::compose_generation_request(form),
        );
        let text = self.backend.generate(&request).await?;
        non_blank(strip_outer_fence(&text), "master prompt")
    }

    pub async fn optimize_prompt(&self, current: &str, pairs: &[OptimizationPair]) -> Result<String> {
        if pairs.is_empty() {
            return Err(LabError::ValidationFailed("no corrections to optimize with".into()));
        }
        let request = GenerationRequest::new(
            "Optimization",
            prompts::OPTIMIZER_PROMPT,
            composer::compose_optimization_request(current, pairs),
        );
        let text = self.backend.generate(&request).await?;
        non_blank(strip_outer_fence(&text), "optimized prompt")
    }

    /// Plays the agent described by `prompt` for one more turn of `history`.
    pub async fn reply_as_agent(&self, prompt: &str, history: &[Turn], message: &str) -> Result<String> {
        let mut turns = history.to_vec();
        turns.push(Turn::user(message));
        let request = GenerationRequest::conversation("Test Chat", composer::compose_chat_system(prompt), turns);
        let text = self.backend.generate(&request).await?;
        non_blank(text.trim().to_string(), "chat reply")
    }

    pub async fn extract_fields(&self, document: &UploadedDocument) -> Result<Vec<FieldUpdate>> {
        let system = format!(
            "{}\n\nREQUIRED OUTPUT SCHEMA:\n{}",
            prompts::EXTRACTOR_PROMPT,
            schema_utils::schema_text::<ExtractedForm>()
        );
        let schema = Some(schema_utils::gemini_schema::<ExtractedForm>());

        let request = match document.text() {
            Some(text) => GenerationRequest::new(
                "Extraction",
                system,
                format!("DOCUMENT ({}):\n{}", document.filename, text),
            ),
            None => GenerationRequest::new(
                "Extraction",
                system,
                format!("The attached document '{}' describes the business.", document.filename),
            )
            .with_document(InlineDocument { mime: document.mime.clone(), data_base64: document.base64() }),
        }
        .json(schema);

        let extracted: ExtractedForm = self.structured(request).await?;
        Ok(extracted.into_updates())
    }

    pub async fn interpret_voice_command(&self, transcript: &str, form: &PromptForm) -> Result<VoiceCommandResponse> {
        if transcript.trim().is_empty() {
            return Err(LabError::ValidationFailed("empty voice transcript".into()));
        }
        let system = format!(
            "{}\n\nREQUIRED OUTPUT SCHEMA:\n{}",
            prompts::VOICE_PROMPT,
            schema_utils::schema_text::<VoiceCommandResponse>()
        );
        let user = format!(
            "CURRENT FORM:\n{}\n\nVOICE COMMAND:\n{}",
            serde_json::to_string_pretty(form)?,
            transcript.trim()
        );
        let request = GenerationRequest::new("Voice Command", system, user)
            .json(Some(schema_utils::gemini_schema::<VoiceCommandResponse>()));
        self.structured(request).await
    }

    pub async fn evaluate_prompt(&self, prompt: &str) -> Result<PromptEvaluation> {
        if prompt.trim().is_empty() {
            return Err(LabError::ValidationFailed("nothing to evaluate".into()));
        }
        let system = format!(
            "{}\n\nREQUIRED OUTPUT SCHEMA:\n{}",
            prompts::EVALUATOR_PROMPT,
            schema_utils::schema_text::<PromptEvaluation>()
        );
        let request = GenerationRequest::new("Evaluation", system, format!("SYSTEM PROMPT:\n<<<\n{}\n>>>", prompt.trim()))
            .json(Some(schema_utils::gemini_schema::<PromptEvaluation>()));
        let mut evaluation: PromptEvaluation = self.structured(request).await?;
        evaluation.score = if evaluation.score.is_finite() { evaluation.score.clamp(0.0, 10.0) } else { 0.0 };
        Ok(evaluation)
    }

    /// Sends `request` and parses the JSON reply, feeding parse errors back to
    /// the model on retry.
    async fn structured<T: DeserializeOwned>(&self, request: GenerationRequest) -> Result<T> {
        let original_user = request.last_user_text().to_string();
        let mut request = request;

        for attempt in 1..=MAX_PARSE_ATTEMPTS {
            let json_text = self.backend.generate(&request).await?;
            match serde_json::from_str::<T>(&json_text) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    log::warn!("[{}] attempt {attempt}/{MAX_PARSE_ATTEMPTS} returned unparseable JSON: {e}", request.stage);
                    if attempt == MAX_PARSE_ATTEMPTS {
                        return Err(LabError::ValidationFailed(format!("{} parse failed: {e}", request.stage)));
                    }
                    let retry = format!(
                        "{original_user}\n\nPREVIOUS ATTEMPT FAILED: {e}.\nReturn a single JSON object that matches the schema exactly."
                    );
                    if let Some(last) = request.turns.last_mut() {
                        last.text = retry;
                    }
                }
            }
        }

        Err(LabError::ValidationFailed("Max parse retries exceeded".into()))
    }
}

fn strip_outer_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") || !trimmed.ends_with("```") || trimmed.len() < 6 {
        return trimmed.to_string();
    }
    let inner = &trimmed[3..trimmed.len() - 3];
    // drop an info string such as "markdown" on the opening fence
    let inner = match inner.split_once('\n') {
        Some((first, rest)) if !first.trim().contains(' ') => rest,
        _ => inner,
    };
    inner.trim().to_string()
}

fn non_blank(text: String, what: &str) -> Result<String> {
    if text.trim().is_empty() {
        return Err(LabError::GenerationFailed(format!("model returned an empty {what}")));
    }
    Ok(text)
}
