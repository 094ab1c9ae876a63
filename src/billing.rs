//! Subscription plans, their limits, and per-account usage metering.

use crate::error::{LabError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Pro,
    Business,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Generation,
    Optimization,
    TestMessage,
    DocumentExtraction,
    VoiceCommand,
    Export,
    Sharing,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Feature::Generation => "generation",
            Feature::Optimization => "optimization",
            Feature::TestMessage => "test message",
            Feature::DocumentExtraction => "document extraction",
            Feature::VoiceCommand => "voice command",
            Feature::Export => "export",
            Feature::Sharing => "sharing",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Monthly,
    Daily,
}

/// Limits attached to a plan. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanLimits {
    pub generations_per_month: Option<u32>,
    pub optimizations_per_month: Option<u32>,
    pub test_messages_per_day: Option<u32>,
    pub max_prompts: Option<u32>,
    pub max_workspaces: Option<u32>,
    pub document_extraction: bool,
    pub voice_commands: bool,
    pub export: bool,
    pub sharing: bool,
}

impl Plan {
    pub fn limits(self) -> PlanLimits {
        match self {
            Plan::Free => PlanLimits {
                generations_per_month: Some(10),
                optimizations_per_month: Some(3),
                test_messages_per_day: Some(30),
                max_prompts: Some(3),
                max_workspaces: Some(1),
                document_extraction: false,
                voice_commands: false,
                export: true,
                sharing: false,
            },
            Plan::Pro => PlanLimits {
                generations_per_month: Some(200),
                optimizations_per_month: Some(100),
                test_messages_per_day: Some(500),
                max_prompts: Some(50),
                max_workspaces: Some(5),
                document_extraction: true,
                voice_commands: true,
                export: true,
                sharing: true,
            },
            Plan::Business => PlanLimits {
                generations_per_month: None,
                optimizations_per_month: None,
                test_messages_per_day: None,
                max_prompts: None,
                max_workspaces: None,
                document_extraction: true,
                voice_commands: true,
                export: true,
                sharing: true,
            },
        }
    }
}

impl PlanLimits {
    fn metered(&self, feature: Feature) -> Option<(Period, Option<u32>)> {
        match feature {
            Feature::Generation => Some((Period::Monthly, self.generations_per_month)),
            Feature::Optimization => Some((Period::Monthly, self.optimizations_per_month)),
            Feature::TestMessage => Some((Period::Daily, self.test_messages_per_day)),
            _ => None,
        }
    }

    fn allows(&self, feature: Feature) -> bool {
        match feature {
            Feature::DocumentExtraction => self.document_extraction,
            Feature::VoiceCommand => self.voice_commands,
            Feature::Export => self.export,
            Feature::Sharing => self.sharing,
            _ => true,
        }
    }

    /// Fails when `current` already sits at a count limit.
    pub fn check_count(limit: Option<u32>, current: usize, what: &str) -> Result<()> {
        match limit {
            Some(max) if current >= max as usize => Err(LabError::QuotaExceeded {
                feature: what.to_string(),
                limit: max,
            }),
            _ => Ok(()),
        }
    }
}

pub fn period_key(period: Period, now: DateTime<Utc>) -> String {
    match period {
        Period::Monthly => now.format("%Y-%m").to_string(),
        Period::Daily => now.format("%Y-%m-%d").to_string(),
    }
}

/// Usage counters keyed by feature and calendar period.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageMeter {
    counters: HashMap<String, u32>,
}

impl UsageMeter {
    fn key(feature: Feature, period: Period, now: DateTime<Utc>) -> String {
        format!("{feature}@{}", period_key(period, now))
    }

    pub fn used(&self, feature: Feature, period: Period, now: DateTime<Utc>) -> u32 {
        self.counters.get(&Self::key(feature, period, now)).copied().unwrap_or(0)
    }

    pub fn check(&self, plan: Plan, feature: Feature, now: DateTime<Utc>) -> Result<()> {
        let limits = plan.limits();
        if !limits.allows(feature) {
            return Err(LabError::Forbidden(format!("{feature} is not included in the {plan:?} plan")));
        }
        if let Some((period, Some(max))) = limits.metered(feature) {
            if self.used(feature, period, now) >= max {
                return Err(LabError::QuotaExceeded { feature: feature.to_string(), limit: max });
            }
        }
        Ok(())
    }

    /// Call only after the guarded operation succeeded.
    pub fn record(&mut self, feature: Feature, now: DateTime<Utc>) {
        let period = match feature {
            Feature::TestMessage => Period::Daily,
            _ => Period::Monthly,
        };
        *self.counters.entry(Self::key(feature, period, now)).or_insert(0) += 1;
    }

    /// Sum of all counters recorded for `feature` in the month containing `now`.
    pub fn monthly_total(&self, feature: Feature, now: DateTime<Utc>) -> u32 {
        let prefix = format!("{feature}@{}", period_key(Period::Monthly, now));
        self.counters
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(_, v)| *v)
            .sum()
    }
}
