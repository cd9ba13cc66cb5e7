use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Settings for the provider call.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Supplied by the user's own key selection; never persisted by us.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_output_tokens: 16384,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub addr: SocketAddr,
    pub history_dir: PathBuf,
    /// Font embedded in section exports; searched for when unset.
    pub export_font: Option<PathBuf>,
    pub gemini: GeminiConfig,
}

impl AppConfig {
    /// Reads `HOST`, `PORT`, `HISTORY_DIR`, `EXPORT_FONT` and the `GEMINI_*` variables.
    pub fn from_env() -> Result<Self> {
        let defaults = GeminiConfig::default();
        let host: std::net::IpAddr = parse_var("HOST", "0.0.0.0".parse()?)?;
        let port: u16 = parse_var("PORT", 8080)?;

        let gemini = GeminiConfig {
            api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            base_url: std::env::var("GEMINI_API_BASE").unwrap_or(defaults.base_url),
            model: std::env::var("GEMINI_MODEL").unwrap_or(defaults.model),
            temperature: parse_var("GEMINI_TEMPERATURE", defaults.temperature)?,
            max_output_tokens: parse_var("GEMINI_MAX_OUTPUT_TOKENS", defaults.max_output_tokens)?,
        };

        Ok(Self {
            addr: SocketAddr::new(host, port),
            history_dir: std::env::var("HISTORY_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data")),
            export_font: std::env::var("EXPORT_FONT")
                .ok()
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            gemini,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}
