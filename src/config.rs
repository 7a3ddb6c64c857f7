use serde::{Deserialize, Serialize};

/// Main configuration structure loaded from insight_lens.toml and environment variables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// Analysis configuration: endpoint, model fallback list, and output cap
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub base_url: String,
    pub model: String,
    /// Second candidate tried when the preferred model is unavailable;
    /// empty string disables the fallback entry
    pub fallback_model: String,
    pub max_tokens: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            fallback_model: "gpt-3.5-turbo".to_string(),
            max_tokens: 500,
        }
    }
}

impl AnalysisConfig {
    /// Ordered model fallback list: preferred first, then the fallback when distinct.
    pub fn candidates(&self) -> Vec<String> {
        let mut out = vec![self.model.clone()];
        let fallback = self.fallback_model.trim();
        if !fallback.is_empty() && fallback != self.model {
            out.push(fallback.to_string());
        }
        out
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http_bind: std::net::SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind: "127.0.0.1:8750"
                .parse()
                .expect("default bind address should parse"),
        }
    }
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub api_key: Option<String>,
    /// Completion provider: "openai" (hosted API) or "fake" (local, no network)
    pub provider: String,
    pub request_timeout_ms: u64,
    pub preview_rows: usize,
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: "openai".to_string(),
            request_timeout_ms: 30_000,
            preview_rows: 5,
            log_level: "insight_lens=info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from environment variables
    pub fn load_from_env() -> Self {
        let mut cfg = Self::default();

        cfg.api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        if let Ok(provider) = std::env::var("LENS_PROVIDER") {
            cfg.provider = provider.to_lowercase();
        }

        if let Some(ms) = std::env::var("LENS_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            cfg.request_timeout_ms = ms.clamp(1_000, 300_000);
        }

        if let Some(rows) = std::env::var("LENS_PREVIEW_ROWS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            cfg.preview_rows = rows.clamp(1, 50);
        }

        if let Ok(level) = std::env::var("LENS_LOG") {
            cfg.log_level = level;
        }

        cfg
    }
}

impl Config {
    /// Load configuration from TOML file and environment variables.
    /// Uses the LENS_CONFIG environment variable or defaults to "insight_lens.toml";
    /// environment variables win over file values.
    pub fn load() -> anyhow::Result<Self> {
        // Load environment variables with smart fallbacks:
        // 1) LENS_ENV_FILE if set
        // 2) ./.env
        // 3) ../.env (repo root when running from a subdirectory)
        if let Ok(env_path) = std::env::var("LENS_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else {
            let _ = dotenvy::from_path(".env");
            let core_present =
                std::env::var("OPENAI_API_KEY").is_ok() || std::env::var("LENS_PROVIDER").is_ok();
            if !core_present {
                let _ = dotenvy::from_path("../.env");
            }
        }

        let config_path =
            std::env::var("LENS_CONFIG").unwrap_or_else(|_| "insight_lens.toml".to_string());

        let mut config: Config = if let Ok(content) = std::fs::read_to_string(&config_path) {
            toml::from_str(&content)?
        } else {
            tracing::debug!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        // Env-first overrides
        if let Ok(base_url) = std::env::var("LENS_BASE_URL") {
            config.analysis.base_url = base_url;
        }
        if let Ok(model) = std::env::var("LENS_MODEL") {
            config.analysis.model = model;
        }
        if let Ok(fallback) = std::env::var("LENS_FALLBACK_MODEL") {
            config.analysis.fallback_model = fallback;
        }
        if let Some(max_tokens) = std::env::var("LENS_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            config.analysis.max_tokens = max_tokens.clamp(1, 4096);
        }
        if let Some(bind) = std::env::var("LENS_HTTP_BIND")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.server.http_bind = bind;
        }

        config.runtime = RuntimeConfig::load_from_env();

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.analysis.model.trim().is_empty() {
            anyhow::bail!("analysis.model must not be empty");
        }
        if !(1..=4096).contains(&self.analysis.max_tokens) {
            anyhow::bail!("analysis.max_tokens must be between 1 and 4096");
        }
        if !self.analysis.base_url.starts_with("http://")
            && !self.analysis.base_url.starts_with("https://")
        {
            anyhow::bail!(
                "analysis.base_url must be an http(s) URL, got: {}",
                self.analysis.base_url
            );
        }
        if !matches!(self.runtime.provider.as_str(), "openai" | "fake") {
            anyhow::bail!(
                "LENS_PROVIDER must be 'openai' or 'fake', got: {}",
                self.runtime.provider
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.max_tokens, 500);
        assert_eq!(config.runtime.preview_rows, 5);
    }

    #[test]
    fn candidates_list_preferred_then_fallback() {
        let analysis = AnalysisConfig::default();
        let candidates = analysis.candidates();
        assert_eq!(candidates, vec!["gpt-4o-mini", "gpt-3.5-turbo"]);
    }

    #[test]
    fn empty_fallback_disables_second_candidate() {
        let analysis = AnalysisConfig {
            fallback_model: "".to_string(),
            ..Default::default()
        };
        assert_eq!(analysis.candidates().len(), 1);
    }

    #[test]
    fn duplicate_fallback_is_deduped() {
        let analysis = AnalysisConfig {
            model: "gpt-4o-mini".to_string(),
            fallback_model: "gpt-4o-mini".to_string(),
            ..Default::default()
        };
        assert_eq!(analysis.candidates(), vec!["gpt-4o-mini"]);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str("[analysis]\nmodel = \"test-model\"\n").unwrap();
        assert_eq!(config.analysis.model, "test-model");
        assert_eq!(config.analysis.base_url, "https://api.openai.com/v1");
        assert_eq!(config.server.http_bind.port(), 8750);
    }

    #[test]
    fn rejects_bad_base_url() {
        let mut config = Config::default();
        config.analysis.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }
}
