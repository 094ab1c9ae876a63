use crate::error::{LabError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Persona {
    pub name: String,
    pub role: String,
    pub tone: String,
    pub language: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FewShotExample {
    pub user: String,
    pub agent: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub parameters: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ConversationFlow {
    pub name: String,
    pub trigger: String,
    pub steps: Vec<String>,
}

/// The structured input a user fills in before a Master Prompt is generated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptForm {
    pub title: String,
    pub persona: Persona,
    pub objective: String,
    pub business_context: String,
    pub rules: Vec<String>,
    pub few_shot_examples: Vec<FewShotExample>,
    pub tools: Vec<ToolSpec>,
    pub flows: Vec<ConversationFlow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
#[schemars(description = "The form field to write.")]
pub enum FormField {
    Title,
    PersonaName,
    PersonaRole,
    PersonaTone,
    PersonaLanguage,
    Objective,
    BusinessContext,
    Rule,
    FewShotExample,
    Tool,
    Flow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldUpdate {
    pub field: FormField,
    pub value: String,
}

impl FieldUpdate {
    pub fn new(field: FormField, value: impl Into<String>) -> Self {
        Self { field, value: value.into() }
    }
}

impl PromptForm {
    pub fn validate(&self) -> Result<()> {
        if self.objective.trim().is_empty() {
            return Err(invalid("objective is required"));
        }
        if self.persona.role.trim().is_empty() {
            return Err(invalid("persona role is required"));
        }
        if let Some(i) = self.rules.iter().position(|r| r.trim().is_empty()) {
            return Err(invalid(format!("rule #{} is blank", i + 1)));
        }
        for (i, ex) in self.few_shot_examples.iter().enumerate() {
            if ex.user.trim().is_empty() || ex.agent.trim().is_empty() {
                return Err(invalid(format!("few-shot example #{} needs both a user and an agent message", i + 1)));
            }
        }
        let mut seen = HashSet::new();
        for tool in &self.tools {
            let name = tool.name.trim();
            if name.is_empty() {
                return Err(invalid("tool name is required"));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(invalid(format!("duplicate tool name '{name}'")));
            }
        }
        for flow in &self.flows {
            if flow.name.trim().is_empty() {
                return Err(invalid("flow name is required"));
            }
            if flow.steps.iter().all(|s| s.trim().is_empty()) {
                return Err(invalid(format!("flow '{}' has no steps", flow.name)));
            }
        }
        Ok(())
    }

    /// Writes a scalar field, or appends one entry to a list field.
    pub fn apply(&mut self, update: &FieldUpdate) -> Result<()> {
        let value = update.value.trim();
        match update.field {
            FormField::Title => self.title = value.to_string(),
            FormField::PersonaName => self.persona.name = value.to_string(),
            FormField::PersonaRole => self.persona.role = required(value, "persona role")?,
            FormField::PersonaTone => self.persona.tone = value.to_string(),
            FormField::PersonaLanguage => self.persona.language = value.to_string(),
            FormField::Objective => self.objective = required(value, "objective")?,
            FormField::BusinessContext => self.business_context = value.to_string(),
            FormField::Rule => {
                if value.is_empty() {
                    return Err(invalid("cannot add a blank rule"));
                }
                self.rules.push(value.to_string());
            }
            FormField::FewShotExample => {
                let (user, agent) = split_pair(value, "=>")
                    .ok_or_else(|| invalid(format!("example must look like 'user => agent', got '{value}'")))?;
                self.few_shot_examples.push(FewShotExample { user, agent });
            }
            FormField::Tool => {
                let (name, description) = split_pair(value, ":")
                    .ok_or_else(|| invalid(format!("tool must look like 'name: description', got '{value}'")))?;
                if self.tools.iter().any(|t| t.name.eq_ignore_ascii_case(&name)) {
                    return Err(invalid(format!("duplicate tool name '{name}'")));
                }
                self.tools.push(ToolSpec { name, description, parameters: None });
            }
            FormField::Flow => {
                let (name, rest) = split_pair(value, ":")
                    .ok_or_else(|| invalid(format!("flow must look like 'name: step; step', got '{value}'")))?;
                let steps: Vec<String> = rest
                    .split(';')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
                if steps.is_empty() {
                    return Err(invalid(format!("flow '{name}' has no steps")));
                }
                self.flows.push(ConversationFlow { name, trigger: String::new(), steps });
            }
        }
        Ok(())
    }

    /// Percentage of the eight form sections that hold content.
    pub fn completeness(&self) -> u8 {
        let persona_filled = !self.persona.name.trim().is_empty() || !self.persona.role.trim().is_empty();
        let sections = [
            !self.title.trim().is_empty(),
            persona_filled,
            !self.objective.trim().is_empty(),
            !self.business_context.trim().is_empty(),
            !self.rules.is_empty(),
            !self.few_shot_examples.is_empty(),
            !self.tools.is_empty(),
            !self.flows.is_empty(),
        ];
        let filled = sections.iter().filter(|s| **s).count();
        ((filled * 100) / sections.len()) as u8
    }
}

fn split_pair(value: &str, sep: &str) -> Option<(String, String)> {
    let (left, right) = value.split_once(sep)?;
    let (left, right) = (left.trim(), right.trim());
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some((left.to_string(), right.to_string()))
}

fn required(value: &str, what: &str) -> Result<String> {
    if value.is_empty() {
        return Err(invalid(format!("{what} cannot be blank")));
    }
    Ok(value.to_string())
}

fn invalid(msg: impl Into<String>) -> LabError {
    LabError::ValidationFailed(msg.into())
}

#[cfg(test)]
pub(crate) fn sample_form() -> PromptForm {
    PromptForm {
        title: "Clinic receptionist".into(),
        persona: Persona {
            name: "Ana".into(),
            role: "Receptionist for a dental clinic".into(),
            tone: "warm and concise".into(),
            language: "English".into(),
        },
        objective: "Book, move and cancel appointments".into(),
        business_context: "Two dentists, open Monday to Friday 9-18".into(),
        rules: vec!["Never give medical advice".into(), "Confirm the date back to the patient".into()],
        few_shot_examples: vec![FewShotExample {
            user: "Can I come tomorrow?".into(),
            agent: "Sure, morning or afternoon?".into(),
        }],
        tools: vec![ToolSpec {
            name: "book_slot".into(),
            description: "Reserve a calendar slot".into(),
            parameters: None,
        }],
        flows: vec![ConversationFlow {
            name: "Cancellation".into(),
            trigger: "patient wants to cancel".into(),
            steps: vec!["Ask for the booking name".into(), "Offer to reschedule".into()],
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_form_is_valid_and_complete() {
        let form = sample_form();
        form.validate().unwrap();
        assert_eq!(form.completeness(), 100);
    }

    #[test]
    fn objective_and_role_are_required() {
        let mut form = sample_form();
        form.objective = "  ".into();
        assert!(form.validate().unwrap_err().to_string().contains("objective"));

        let mut form = sample_form();
        form.persona.role.clear();
        assert!(form.validate().unwrap_err().to_string().contains("persona role"));
    }

    #[test]
    fn duplicate_tools_are_rejected_case_insensitively() {
        let mut form = sample_form();
        form.tools.push(ToolSpec { name: "Book_Slot".into(), description: "again".into(), parameters: None });
        assert!(matches!(form.validate(), Err(LabError::ValidationFailed(_))));
    }

    #[test]
    fn half_empty_example_is_rejected() {
        let mut form = sample_form();
        form.few_shot_examples.push(FewShotExample { user: "hi".into(), agent: " ".into() });
        assert!(form.validate().unwrap_err().to_string().contains("#2"));
    }

    #[test]
    fn apply_appends_list_entries() {
        let mut form = PromptForm::default();
        form.apply(&FieldUpdate::new(FormField::Rule, "Be brief")).unwrap();
        form.apply(&FieldUpdate::new(FormField::FewShotExample, "hello => hi there")).unwrap();
        form.apply(&FieldUpdate::new(FormField::Tool, "lookup: find an order")).unwrap();
        form.apply(&FieldUpdate::new(FormField::Flow, "Refund: ask order id; check policy ;")).unwrap();

        assert_eq!(form.rules, vec!["Be brief"]);
        assert_eq!(form.few_shot_examples[0].agent, "hi there");
        assert_eq!(form.tools[0].name, "lookup");
        assert_eq!(form.flows[0].steps, vec!["ask order id", "check policy"]);
    }

    #[test]
    fn apply_rejects_malformed_entries() {
        let mut form = PromptForm::default();
        assert!(form.apply(&FieldUpdate::new(FormField::FewShotExample, "no arrow here")).is_err());
        assert!(form.apply(&FieldUpdate::new(FormField::Tool, ": missing name")).is_err());
        assert!(form.apply(&FieldUpdate::new(FormField::Rule, "   ")).is_err());
    }

    #[test]
    fn apply_never_blanks_required_fields() {
        let mut form = sample_form();
        assert!(form.apply(&FieldUpdate::new(FormField::Objective, "  ")).is_err());
        assert!(form.apply(&FieldUpdate::new(FormField::PersonaRole, "")).is_err());
        assert!(form.apply(&FieldUpdate::new(FormField::Flow, "Refund: ;")).is_err());
        assert_eq!(form, sample_form());
        form.validate().unwrap();
    }

    #[test]
    fn completeness_counts_sections() {
        let mut form = PromptForm::default();
        assert_eq!(form.completeness(), 0);
        form.objective = "Sell shoes".into();
        form.persona.role = "Sales assistant".into();
        assert_eq!(form.completeness(), 25);
    }

    #[test]
    fn form_deserializes_with_missing_sections() {
        let form: PromptForm = serde_json::from_str(r#"{"objective":"x","persona":{"name":"","role":"r","tone":"","language":""}}"#).unwrap();
        assert!(form.rules.is_empty());
        form.validate().unwrap();
    }
}
