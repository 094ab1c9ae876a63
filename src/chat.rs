use crate::ai::client::Turn;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// A simulated conversation against one prompt version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub prompt_id: Uuid,
    pub version: u32,
    pub owner: Uuid,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(prompt_id: Uuid, version: u32, owner: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt_id,
            version,
            owner,
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(Speaker::User, text.into());
    }

    pub fn push_agent(&mut self, text: impl Into<String>) {
        self.push(Speaker::Agent, text.into());
    }

    fn push(&mut self, speaker: Speaker, text: String) {
        self.messages.push(ChatMessage { speaker, text, at: Utc::now() });
    }

    pub fn turns(&self) -> Vec<Turn> {
        self.messages
            .iter()
            .map(|m| match m.speaker {
                Speaker::User => Turn::user(&m.text),
                Speaker::Agent => Turn::model(&m.text),
            })
            .collect()
    }

    /// The latest agent reply together with the user message that prompted it.
    pub fn last_exchange(&self) -> Option<(&str, &str)> {
        let agent_idx = self.messages.iter().rposition(|m| m.speaker == Speaker::Agent)?;
        let user = self.messages[..agent_idx]
            .iter()
            .rev()
            .find(|m| m.speaker == Speaker::User)?;
        Some((user.text.as_str(), self.messages[agent_idx].text.as_str()))
    }

    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| {
                let who = match m.speaker {
                    Speaker::User => "User",
                    Speaker::Agent => "Agent",
                };
                format!("{who}: {}", m.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
