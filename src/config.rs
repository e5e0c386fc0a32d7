use std::env;
use std::time::Duration;

use crate::error::RecipeError;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 300;

/// What to do with recipes already saved when a later step of the same
/// request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollbackPolicy {
    /// Leave saved recipes on the CMS.
    #[default]
    Keep,
    /// Delete every recipe saved by the failed request (best effort).
    Delete,
}

impl RollbackPolicy {
    pub fn from_string(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "keep" | "none" => Some(RollbackPolicy::Keep),
            "delete" | "rollback" => Some(RollbackPolicy::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_key: String,
    pub assistant_id: String,
    pub base_url: String,
    pub poll_interval: Duration,
    /// `None` polls until the run reaches a terminal status.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct StrapiConfig {
    pub url: String,
    pub api_token: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub assistant: AssistantConfig,
    pub strapi: StrapiConfig,
    pub rollback: RollbackPolicy,
}

impl AppConfig {
    /// Build the configuration from process environment variables.
    /// Call `dotenv().ok()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self, RecipeError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RecipeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| RecipeError::Config(format!("{} must be set", key)))
        };

        let poll_ms = parse_u64(&lookup, "ANALYSIS_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        if poll_ms == 0 {
            return Err(RecipeError::Config(
                "ANALYSIS_POLL_INTERVAL_MS must be at least 1".to_string(),
            ));
        }
        let timeout_secs = parse_u64(&lookup, "ANALYSIS_TIMEOUT_SECS", DEFAULT_ANALYSIS_TIMEOUT_SECS)?;

        let rollback = match lookup("RECIPE_ROLLBACK") {
            Some(raw) => RollbackPolicy::from_string(&raw).ok_or_else(|| {
                RecipeError::Config(format!("RECIPE_ROLLBACK must be 'keep' or 'delete', got '{}'", raw))
            })?,
            None => RollbackPolicy::default(),
        };

        Ok(AppConfig {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            assistant: AssistantConfig {
                api_key: required("OPENAI_API_KEY")?,
                assistant_id: required("ASSISTANT_ID")?,
                base_url: lookup("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                poll_interval: Duration::from_millis(poll_ms),
                timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            },
            strapi: StrapiConfig {
                url: required("STRAPI_URL")?.trim_end_matches('/').to_string(),
                api_token: required("STRAPI_API_TOKEN")?,
            },
            rollback,
        })
    }
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> Result<u64, RecipeError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| RecipeError::Config(format!("{} is not a valid number: {}", key, e))),
        None => Ok(default),
    }
}
