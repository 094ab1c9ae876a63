//! Templated text construction for every LLM request the studio makes, plus
//! the offline Markdown draft.

use super::feedback::OptimizationPair;
use super::form::PromptForm;

/// Builds the user message handed to the Master Prompt generator. Sections
/// always appear in the same order; empty ones are left out.
pub fn compose_generation_request(form: &PromptForm) -> String {
    let mut out = String::new();
    if !form.title.trim().is_empty() {
        line(&mut out, format!("PROMPT TITLE: {}\n", form.title.trim()));
    }

    let persona = persona_lines(form);
    if !persona.is_empty() {
        line(&mut out, format!("## PERSONA\n{}\n", persona.join("\n")));
    }
    push_section(&mut out, "## OBJECTIVE", &form.objective);
    push_section(&mut out, "## BUSINESS CONTEXT", &form.business_context);

    if !form.rules.is_empty() {
        line(&mut out, "## RULES");
        for (i, rule) in form.rules.iter().enumerate() {
            line(&mut out, format!("{}. {}", i + 1, rule.trim()));
        }
        out.push('\n');
    }

    if !form.few_shot_examples.is_empty() {
        line(&mut out, "## FEW-SHOT EXAMPLES");
        for (i, ex) in form.few_shot_examples.iter().enumerate() {
            line(&mut out, format!("Example {}:\nUser: {}\nAgent: {}", i + 1, ex.user.trim(), ex.agent.trim()));
        }
        out.push('\n');
    }

    if !form.tools.is_empty() {
        line(&mut out, "## TOOLS");
        for tool in &form.tools {
            line(&mut out, format!("- {}: {}", tool.name.trim(), tool.description.trim()));
            if let Some(params) = &tool.parameters {
                line(&mut out, format!("  parameters: {params}"));
            }
        }
        out.push('\n');
    }

    if !form.flows.is_empty() {
        line(&mut out, "## CONVERSATION FLOWS");
        for flow in &form.flows {
            out.push_str(&format!("### {}", flow.name.trim()));
            if !flow.trigger.trim().is_empty() {
                out.push_str(&format!(" (when {})", flow.trigger.trim()));
            }
            out.push('\n');
            for (i, step) in flow.steps.iter().filter(|s| !s.trim().is_empty()).enumerate() {
                line(&mut out, format!("{}. {}", i + 1, step.trim()));
            }
        }
        out.push('\n');
    }

    out.push_str("Write the complete system prompt for this agent.");
    out
}

/// A deterministic system prompt rendered without calling the model.
pub fn compose_draft(form: &PromptForm) -> String {
    let mut out = String::new();
    let title = if form.title.trim().is_empty() { "System Prompt" } else { form.title.trim() };
    line(&mut out, format!("# {title}\n"));

    let p = &form.persona;
    if !p.role.trim().is_empty() {
        let who = if p.name.trim().is_empty() {
            format!("You are {}.", p.role.trim())
        } else {
            format!("You are {}, {}.", p.name.trim(), p.role.trim())
        };
        line(&mut out, format!("## Identity\n{who}"));
        if !p.tone.trim().is_empty() {
            line(&mut out, format!("Your tone is {}.", p.tone.trim()));
        }
        if !p.language.trim().is_empty() {
            line(&mut out, format!("Always answer in {}.", p.language.trim()));
        }
        out.push('\n');
    }

    push_section(&mut out, "## Objective", &form.objective);
    push_section(&mut out, "## Context", &form.business_context);

    if !form.rules.is_empty() {
        line(&mut out, "## Rules");
        for rule in &form.rules {
            line(&mut out, format!("- {}", rule.trim()));
        }
        out.push('\n');
    }

    if !form.tools.is_empty() {
        line(&mut out, "## Tools");
        for tool in &form.tools {
            line(&mut out, format!("- `{}`: {}", tool.name.trim(), tool.description.trim()));
        }
        out.push('\n');
    }

    if !form.flows.is_empty() {
        line(&mut out, "## Flows");
        for flow in &form.flows {
            line(&mut out, format!("### {}", flow.name.trim()));
            if !flow.trigger.trim().is_empty() {
                line(&mut out, format!("Use when {}.", flow.trigger.trim()));
            }
            for (i, step) in flow.steps.iter().filter(|s| !s.trim().is_empty()).enumerate() {
                line(&mut out, format!("{}. {}", i + 1, step.trim()));
            }
        }
        out.push('\n');
    }

    if !form.few_shot_examples.is_empty() {
        line(&mut out, "## Examples");
        for ex in &form.few_shot_examples {
            line(&mut out, format!("User: {}\nYou: {}\n", ex.user.trim(), ex.agent.trim()));
        }
    }

    out.trim_end().to_string()
}

pub fn compose_optimization_request(current_prompt: &str, pairs: &[OptimizationPair]) -> String {
    let mut out = format!("CURRENT SYSTEM PROMPT:\n<<<\n{}\n>>>\n\nCORRECTIONS FROM TESTING:\n", current_prompt.trim());
    for (i, pair) in pairs.iter().enumerate() {
        line(
            &mut out,
            format!(
                "\nCorrection {}:\nQuery: {}\nBad response: {}\nCorrected response: {}",
                i + 1,
                pair.query.trim(),
                pair.bad_response.trim(),
                pair.corrected_response.trim()
            ),
        );
    }
    out.push_str("\nRewrite the system prompt so that the agent would produce the corrected responses.");
    out
}

pub fn compose_chat_system(prompt: &str) -> String {
    format!(
        "{}\n\n---\nThis is a test conversation inside a prompt laboratory. Stay fully in character and never mention that you are being tested.",
        prompt.trim()
    )
}

fn persona_lines(form: &PromptForm) -> Vec<String> {
    let p = &form.persona;
    [("Name", &p.name), ("Role", &p.role), ("Tone", &p.tone), ("Language", &p.language)]
        .into_iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| format!("{k}: {}", v.trim()))
        .collect()
}

/// Appends `text` and a newline.
pub(crate) fn line(out: &mut String, text: impl AsRef<str>) {
    out.push_str(text.as_ref());
    out.push('\n');
}

fn push_section(out: &mut String, heading: &str, body: &str) {
    if !body.trim().is_empty() {
        line(out, format!("{heading}\n{}\n", body.trim()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::form::{sample_form, PromptForm};

    #[test]
    fn generation_request_keeps_section_order() {
        let text = compose_generation_request(&sample_form());
        let order = ["## PERSONA", "## OBJECTIVE", "## BUSINESS CONTEXT", "## RULES", "## FEW-SHOT EXAMPLES", "## TOOLS", "## CONVERSATION FLOWS"];
        let positions: Vec<usize> = order.iter().map(|h| text.find(h).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(text.contains("2. Confirm the date back to the patient"));
        assert!(text.contains("### Cancellation (when patient wants to cancel)"));
    }

    #[test]
    fn empty_sections_are_omitted() {
        let mut form = PromptForm::default();
        form.objective = "Answer billing questions".into();
        let text = compose_generation_request(&form);
        assert!(text.contains("## OBJECTIVE"));
        assert!(!text.contains("## RULES"));
        assert!(!text.contains("## PERSONA"));
    }

    #[test]
    fn draft_is_deterministic_markdown() {
        let form = sample_form();
        let a = compose_draft(&form);
        assert_eq!(a, compose_draft(&form));
        assert!(a.starts_with("# Clinic receptionist"));
        assert!(a.contains("You are Ana, Receptionist for a dental clinic."));
        assert!(a.contains("- `book_slot`: Reserve a calendar slot"));
    }

    #[test]
    fn optimization_request_lists_every_pair() {
        let pairs = vec![
            OptimizationPair::new("q1", "bad1", "good1"),
            OptimizationPair::new("q2", "bad2", "good2"),
        ];
        let text = compose_optimization_request("Be helpful.", &pairs);
        assert!(text.contains("Be helpful."));
        assert!(text.contains("Correction 2:\nQuery: q2\nBad response: bad2\nCorrected response: good2"));
    }
}
