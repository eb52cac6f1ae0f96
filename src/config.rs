use std::env;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` when `GEMINI_API_KEY` is unset; analysis then falls back to the offline engine.
    pub gemini: Option<GeminiConfig>,
    pub ai_timeout: Duration,
    pub ai_max_retries: u32,
    pub max_upload_bytes: usize,
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads the vars.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_owned())
        };

        let gemini = lookup("GEMINI_API_KEY")
            .map(|k| k.trim().to_owned())
            .filter(|k| !k.is_empty())
            .map(|api_key| GeminiConfig {
                api_key,
                model: var_or("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
                base_url: var_or("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL)
                    .trim_end_matches('/')
                    .to_owned(),
            });

        let ai_timeout_secs: u64 = parse_number("AI_TIMEOUT_SECS", &var_or("AI_TIMEOUT_SECS", "30"))?;
        if ai_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "AI_TIMEOUT_SECS",
                reason: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            host: var_or("HOST", "0.0.0.0"),
            port: parse_number("PORT", &var_or("PORT", "8000"))?,
            gemini,
            ai_timeout: Duration::from_secs(ai_timeout_secs),
            ai_max_retries: parse_number("AI_MAX_RETRIES", &var_or("AI_MAX_RETRIES", "0"))?,
            max_upload_bytes: parse_number("MAX_UPLOAD_BYTES", &var_or("MAX_UPLOAD_BYTES", "10485760"))?,
            log_level: var_or("LOG_LEVEL", "info"),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: format!("{raw:?} ({e})"),
    })
}
