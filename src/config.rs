//! Configuration helpers: provider shortcuts and environment overrides

use crate::vendor::WireFormat;
use std::env;

/// Environment variable overriding the base URL.
pub const BASE_URL_ENV: &str = "AGENT_STREAM_BASE_URL";

/// Environment variable overriding the model.
pub const MODEL_ENV: &str = "AGENT_STREAM_MODEL";

/// Supported provider shortcuts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    LMStudio,
    Ollama,
    LlamaCpp,
    VLLM,
    OpenAI,
    Anthropic,
}

impl Provider {
    /// Get the default base URL for this provider
    pub fn default_url(&self) -> &'static str {
        match self {
            Provider::LMStudio => "http://localhost:1234/v1",
            Provider::Ollama => "http://localhost:11434/v1",
            Provider::LlamaCpp => "http://localhost:8080/v1",
            Provider::VLLM => "http://localhost:8000/v1",
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    /// Wire format the provider's streaming endpoint speaks
    pub fn wire_format(&self) -> WireFormat {
        match self {
            Provider::Anthropic => WireFormat::Anthropic,
            _ => WireFormat::OpenAi,
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "lmstudio" | "lm-studio" | "lm_studio" => Ok(Provider::LMStudio),
            "ollama" => Ok(Provider::Ollama),
            "llamacpp" | "llama-cpp" | "llama_cpp" | "llama.cpp" => Ok(Provider::LlamaCpp),
            "vllm" => Ok(Provider::VLLM),
            "openai" => Ok(Provider::OpenAI),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            other => Err(crate::Error::config(format!("unknown provider: {other}"))),
        }
    }
}

/// Get the base URL from the environment or a provider default
///
/// Priority:
/// 1. `AGENT_STREAM_BASE_URL` environment variable
/// 2. Provider default URL (if provider is Some)
/// 3. fallback parameter, else LM Studio's default
///
/// # Examples
///
/// ```rust,no_run
/// use agent_stream::{get_base_url, Provider};
///
/// let url = get_base_url(None, None);
/// let url = get_base_url(Some(Provider::Ollama), None);
/// let url = get_base_url(None, Some("http://localhost:1234/v1"));
/// ```
pub fn get_base_url(provider: Option<Provider>, fallback: Option<&str>) -> String {
    resolve_base_url(env::var(BASE_URL_ENV).ok(), provider, fallback)
}

fn resolve_base_url(
    from_env: Option<String>,
    provider: Option<Provider>,
    fallback: Option<&str>,
) -> String {
    if let Some(url) = from_env.filter(|u| !u.trim().is_empty()) {
        return url;
    }

    if let Some(p) = provider {
        return p.default_url().to_string();
    }

    fallback
        .unwrap_or(Provider::LMStudio.default_url())
        .to_string()
}

/// Get the model name from the environment or a fallback
///
/// With `prefer_env`, `AGENT_STREAM_MODEL` wins over `fallback`.
///
/// ```rust,no_run
/// use agent_stream::get_model;
///
/// let model = get_model(Some("qwen2.5-32b-instruct"), true);
/// ```
pub fn get_model(fallback: Option<&str>, prefer_env: bool) -> Option<String> {
    let from_env = if prefer_env {
        env::var(MODEL_ENV).ok()
    } else {
        None
    };
    resolve_model(from_env, fallback)
}

fn resolve_model(from_env: Option<String>, fallback: Option<&str>) -> Option<String> {
    from_env
        .filter(|m| !m.trim().is_empty())
        .or_else(|| fallback.map(str::to_string))
}
