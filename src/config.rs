// src/config.rs
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful customer support assistant for our company. \
Your goal is to provide accurate, concise, and helpful responses to customer queries. \
Use a friendly and professional tone, and try to resolve the customer's issue as efficiently as possible. \
If you don't know the answer to a question, admit it honestly rather than making up information. \
Always ask clarifying questions if you need more information to provide an accurate response.";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub system_prompt: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub client_url: String,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub openai: OpenAiConfig,
}

impl AppConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| vars.get(name).filter(|v| !v.trim().is_empty()).cloned();

        let api_key = get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;

        Ok(Self {
            port: parse_or(&vars, "PORT", 5000)?,
            database_url: get("DATABASE_URL"),
            db_max_connections: parse_positive(&vars, "DB_MAX_CONNECTIONS", 5)?,
            client_url: get("CLIENT_URL").unwrap_or_else(|| "http://localhost:3000".to_string()),
            rate_limit_max: parse_positive(&vars, "RATE_LIMIT_MAX", 100)?,
            rate_limit_window: Duration::from_secs(parse_positive(&vars, "RATE_LIMIT_WINDOW_SECS", 15 * 60)?),
            openai: OpenAiConfig {
                api_key,
                model: get("OPENAI_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
                base_url: get("OPENAI_BASE_URL")
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                    .trim_end_matches('/')
                    .to_string(),
                timeout: Duration::from_secs(parse_positive(&vars, "OPENAI_TIMEOUT_SECS", 60)?),
                system_prompt: get("SYSTEM_PROMPT").unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            name,
            value: value.to_string(),
        }),
        None => Ok(default),
    }
}

/// Like `parse_or`, but zero is an invalid value.
fn parse_positive<T>(vars: &HashMap<String, String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + Default + PartialEq + ToString,
{
    let value = parse_or(vars, name, default)?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        });
    }
    Ok(value)
}
