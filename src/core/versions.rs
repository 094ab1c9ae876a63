use super::tokens;
use crate::error::{LabError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    Generated,
    Optimized,
    Manual,
    Restored { from: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptVersion {
    pub number: u32,
    pub content: String,
    pub source: VersionSource,
    pub created_at: DateTime<Utc>,
    pub tokens: usize,
    pub applied_pairs: usize,
}

/// Append-only list of prompt versions. Numbers start at 1 and never repeat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionHistory {
    versions: Vec<PromptVersion>,
}

impl VersionHistory {
    pub fn push(&mut self, content: impl Into<String>, source: VersionSource, applied_pairs: usize) -> &PromptVersion {
        let content = content.into();
        let number = self.versions.last().map(|v| v.number + 1).unwrap_or(1);
        self.versions.push(PromptVersion {
            number,
            tokens: tokens::estimate(&content).tokens,
            content,
            source,
            created_at: Utc::now(),
            applied_pairs,
        });
        &self.versions[self.versions.len() - 1]
    }

    pub fn latest(&self) -> Option<&PromptVersion> {
        self.versions.last()
    }

    pub fn get(&self, number: u32) -> Option<&PromptVersion> {
        self.versions.iter().find(|v| v.number == number)
    }

    pub fn restore(&mut self, number: u32) -> Result<&PromptVersion> {
        let content = self
            .get(number)
            .map(|v| v.content.clone())
            .ok_or_else(|| LabError::NotFound(format!("version {number}")))?;
        Ok(self.push(content, VersionSource::Restored { from: number }, 0))
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PromptVersion> {
        self.versions.iter()
    }
}
