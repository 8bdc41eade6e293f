// src/config/mod.rs
// Environment-driven configuration (.env first, then process env)

use once_cell::sync::Lazy;
use std::str::FromStr;

use crate::stream::StreamMode;

#[derive(Debug, Clone)]
pub struct ClothoConfig {
    // ── Endpoints
    pub api_url: String,
    pub chat_path: String,
    pub agent_url: String,
    pub agent_path: String,

    // ── Streaming
    pub stream_mode: StreamMode,
    pub flush_tail: bool,
    pub apology: String,

    // ── Timeouts (in seconds)
    pub connect_timeout: u64,
    pub request_timeout: u64,

    // ── Logging
    pub log_level: String,
}

// Values may carry trailing comments and whitespace from the .env file
fn var_or<T, L>(lookup: &L, key: &str, default: T) -> T
where
    T: FromStr,
    L: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => {
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        None => default,
    }
}

impl ClothoConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; missing or unparsable keys use defaults
    pub fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        Self {
            api_url: var_or(&lookup, "CLOTHO_API_URL", "http://localhost:8000".to_string()),
            chat_path: var_or(&lookup, "CLOTHO_CHAT_PATH", "/chat".to_string()),
            agent_url: var_or(&lookup, "CLOTHO_AGENT_URL", "http://localhost:8001".to_string()),
            agent_path: var_or(&lookup, "CLOTHO_AGENT_PATH", "/query/stream".to_string()),
            stream_mode: var_or(&lookup, "CLOTHO_STREAM_MODE", StreamMode::PlainText),
            flush_tail: var_or(&lookup, "CLOTHO_FLUSH_TAIL", true),
            apology: lookup("CLOTHO_APOLOGY")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| crate::stream::DEFAULT_APOLOGY.to_string()),
            connect_timeout: var_or(&lookup, "CLOTHO_CONNECT_TIMEOUT", 10),
            request_timeout: var_or(&lookup, "CLOTHO_REQUEST_TIMEOUT", 300),
            log_level: var_or(&lookup, "CLOTHO_LOG_LEVEL", "info".to_string()),
        }
    }

    pub fn is_debug(&self) -> bool {
        self.log_level.eq_ignore_ascii_case("debug") || self.log_level.eq_ignore_ascii_case("trace")
    }

    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

// Global config instance - loaded once at startup
pub static CONFIG: Lazy<ClothoConfig> = Lazy::new(ClothoConfig::from_env);
