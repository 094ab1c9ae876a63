use crate::error::{LabError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A correction captured while testing: what was asked, what the agent said,
/// and what it should have said.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationPair {
    pub id: Uuid,
    pub query: String,
    pub bad_response: String,
    pub corrected_response: String,
    /// Version number that absorbed this correction, if any.
    #[serde(default)]
    pub applied_in: Option<u32>,
}

impl OptimizationPair {
    pub fn new(query: impl Into<String>, bad: impl Into<String>, corrected: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query: query.into(),
            bad_response: bad.into(),
            corrected_response: corrected.into(),
            applied_in: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackLog {
    pairs: Vec<OptimizationPair>,
}

impl FeedbackLog {
    pub fn add(&mut self, query: &str, bad: &str, corrected: &str) -> Result<&OptimizationPair> {
        if query.trim().is_empty() || bad.trim().is_empty() || corrected.trim().is_empty() {
            return Err(LabError::ValidationFailed(
                "query, bad response and corrected response are all required".into(),
            ));
        }
        if bad.trim() == corrected.trim() {
            return Err(LabError::ValidationFailed("corrected response is identical to the bad one".into()));
        }
        self.pairs.push(OptimizationPair::new(query.trim(), bad.trim(), corrected.trim()));
        Ok(&self.pairs[self.pairs.len() - 1])
    }

    pub fn pending(&self) -> Vec<OptimizationPair> {
        self.pairs.iter().filter(|p| p.applied_in.is_none()).cloned().collect()
    }

    pub fn all(&self) -> &[OptimizationPair] {
        &self.pairs
    }

    pub fn mark_applied(&mut self, ids: &[Uuid], version: u32) {
        for pair in self.pairs.iter_mut().filter(|p| ids.contains(&p.id)) {
            pair.applied_in = Some(version);
        }
    }

    pub fn remove(&mut self, id: Uuid) -> Result<OptimizationPair> {
        let idx = self
            .pairs
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| LabError::NotFound(format!("correction {id}")))?;
        Ok(self.pairs.remove(idx))
    }
}
