use crate::error::{LabError, Result};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub dump_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
    pub rate_limit: NonZeroU32,
    pub rate_window: Duration,
}

impl AppConfig {
    /// Reads settings from the process environment. Call `dotenv().ok()` first
    /// to pick up a local `.env`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GEMINI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LabError::Config("GEMINI_API_KEY must be set".into()))?;

        let model = lookup("LABPROMPT_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let api_base = lookup("LABPROMPT_API_BASE")
            .map(|b| b.trim().trim_end_matches('/').to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let timeout_secs: u64 = parse_or(&lookup, "LABPROMPT_TIMEOUT_SECS", 60)?;
        let max_retries: u32 = parse_or(&lookup, "LABPROMPT_MAX_RETRIES", 3)?;
        let max_upload_bytes: usize = parse_or(&lookup, "LABPROMPT_MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?;
        let rate_limit: NonZeroU32 = parse_or(&lookup, "LABPROMPT_RATE_LIMIT", NonZeroU32::new(20).unwrap_or(NonZeroU32::MIN))?;
        let rate_window_secs: u64 = parse_or(&lookup, "LABPROMPT_RATE_WINDOW_SECS", 60)?;
        if rate_window_secs == 0 {
            return Err(LabError::Config("LABPROMPT_RATE_WINDOW_SECS must be at least 1".into()));
        }

        Ok(Self {
            api_key,
            model,
            api_base,
            timeout: Duration::from_secs(timeout_secs),
            max_retries: max_retries.max(1),
            dump_dir: lookup("LABPROMPT_DUMP_DIR").map(PathBuf::from),
            max_upload_bytes,
            rate_limit,
            rate_window: Duration::from_secs(rate_window_secs),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| LabError::Config(format!("{key} has an invalid value: '{raw}'"))),
        None => Ok(default),
    }
}
