use anyhow::{Context as _, Result, anyhow};
use std::time::Duration;
use wizard_flow::WizardVariant;

pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Service settings, read from the environment
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub port: u16,
    pub variant: WizardVariant,
    pub analysis_timeout: Duration,
    /// Sessions older than this are evicted
    pub session_ttl: Duration,
    pub log_format: LogFormat,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("OPENROUTER_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| anyhow!("OPENROUTER_API_KEY not set"))?;

        let model = lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let temperature = match lookup("LLM_TEMPERATURE") {
            Some(raw) => raw
                .parse::<f64>()
                .with_context(|| format!("LLM_TEMPERATURE must be a number, got '{raw}'"))?,
            None => 0.2,
        };

        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT must be a valid port, got '{raw}'"))?,
            None => 3000,
        };

        let variant = match lookup("WIZARD_VARIANT") {
            Some(raw) => raw
                .parse::<WizardVariant>()
                .map_err(|e| anyhow!("WIZARD_VARIANT: {e}"))?,
            None => WizardVariant::default(),
        };

        let timeout_secs = seconds(&lookup, "ANALYSIS_TIMEOUT_SECS", 60)?;
        let session_ttl_secs = seconds(&lookup, "SESSION_TTL_SECS", 3600)?;
        if session_ttl_secs == 0 {
            return Err(anyhow!("SESSION_TTL_SECS must be greater than zero"));
        }

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        Ok(Self {
            api_key,
            model,
            temperature,
            port,
            variant,
            analysis_timeout: Duration::from_secs(timeout_secs),
            session_ttl: Duration::from_secs(session_ttl_secs),
            log_format,
        })
    }
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    match lookup(key) {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("{key} must be whole seconds, got '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[("OPENROUTER_API_KEY", "k")])).unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.port, 3000);
        assert_eq!(config.variant, WizardVariant::MultiRole);
        assert_eq!(config.analysis_timeout, Duration::from_secs(60));
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_missing_api_key() {
        let err = ServiceConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "k"),
            ("WIZARD_VARIANT", "single-role"),
            ("PORT", "8080"),
            ("LOG_FORMAT", "pretty"),
            ("ANALYSIS_TIMEOUT_SECS", "5"),
            ("SESSION_TTL_SECS", "600"),
        ]))
        .unwrap();
        assert_eq!(config.variant, WizardVariant::SingleRole);
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.analysis_timeout, Duration::from_secs(5));
        assert_eq!(config.session_ttl, Duration::from_secs(600));

        let err = ServiceConfig::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "k"),
            ("PORT", "http"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("PORT"));

        for raw in ["0", "soon"] {
            let err = ServiceConfig::from_lookup(lookup(&[
                ("OPENROUTER_API_KEY", "k"),
                ("SESSION_TTL_SECS", raw),
            ]))
            .unwrap_err();
            assert!(err.to_string().contains("SESSION_TTL_SECS"));
        }
    }
}
