use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Settings for the upstream text-completion API (OpenRouter compatible).
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub site_url: Option<String>,
    pub site_name: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub completion: CompletionConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let db_max_connections = parsed_var("DATABASE_MAX_CONNECTIONS").unwrap_or(10);
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "tsfchat".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "tsfchat-users".into()),
            ttl_minutes: parsed_var("JWT_TTL_MINUTES").unwrap_or(30),
            refresh_ttl_minutes: parsed_var("JWT_REFRESH_TTL_MINUTES").unwrap_or(60 * 24 * 14),
        };
        let completion = CompletionConfig {
            api_key: non_empty_var("OPENROUTER_API_KEY"),
            base_url: std::env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".into()),
            model: std::env::var("OPENROUTER_MODEL").unwrap_or_else(|_| "openai/gpt-4o".into()),
            site_url: non_empty_var("SITE_URL"),
            site_name: std::env::var("SITE_NAME")
                .map(|v| Some(v).filter(|s| !s.is_empty()))
                .unwrap_or_else(|_| Some("TSF Chat".into())),
            max_tokens: parsed_var("COMPLETION_MAX_TOKENS").unwrap_or(1000),
            temperature: parsed_var("COMPLETION_TEMPERATURE").unwrap_or(0.7),
            timeout_secs: parsed_var("COMPLETION_TIMEOUT_SECS").unwrap_or(30),
        };
        Ok(Self {
            database_url,
            db_max_connections,
            jwt,
            completion,
        })
    }
}

fn parsed_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
