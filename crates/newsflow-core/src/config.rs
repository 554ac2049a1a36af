//! Flow configuration loaded from an optional YAML file.
//!
//! ```yaml
//! database_path: "${NEWSFLOW_DB_PATH:-flow_states.db}"
//! output_dir: outputs
//! crews_dir: ./crews
//!
//! pricing:
//!   primary:   { input_per_million: 2.5,  output_per_million: 1.25 }
//!   secondary: { input_per_million: 0.15, output_per_million: 0.075 }
//!   primary_weight: 0.2
//!
//! fan_out:
//!   default_concurrency: 4
//!   per_step:
//!     research_news: 2
//!
//! llm:
//!   adapter: openai            # openai | anthropic
//!   base_url: "https://api.openai.com/v1"
//!   api_key: "${OPENAI_API_KEY}"
//!   models: [gpt-4o-mini, gpt-4o]
//!   timeout_secs: 300
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cost::PricingConfig;
use crate::error::FlowError;
use crate::flow::FlowStep;

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "newsflow.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Root directory for step artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Directory of crew definitions overriding the built-in ones.
    #[serde(default)]
    pub crews_dir: Option<String>,

    #[serde(default)]
    pub pricing: PricingConfig,

    #[serde(default)]
    pub fan_out: FanOutConfig,

    #[serde(default)]
    pub llm: LlmConfig,
}

fn default_database_path() -> String {
    "flow_states.db".to_string()
}

fn default_output_dir() -> String {
    "outputs".to_string()
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            output_dir: default_output_dir(),
            crews_dir: None,
            pricing: PricingConfig::default(),
            fan_out: FanOutConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl FlowConfig {
    /// Parse YAML after expanding `${VAR}` / `${VAR:-default}` references.
    pub fn from_yaml(yaml: &str) -> Result<Self, FlowError> {
        let expanded = resolve_env_vars(yaml);
        if expanded.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&expanded)
            .map_err(|e| FlowError::Configuration(format!("Invalid config: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self, FlowError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FlowError::Configuration(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Load an explicit config file, else `newsflow.yaml` if present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, FlowError> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    tracing::info!("Loading config from {}", DEFAULT_CONFIG_FILE);
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Bounds on concurrent crew invocations inside a fan-out step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanOutConfig {
    #[serde(default = "default_concurrency")]
    pub default_concurrency: usize,

    /// Overrides keyed by step name (`critique`, `research_news`, ...).
    #[serde(default)]
    pub per_step: HashMap<String, usize>,
}

fn default_concurrency() -> usize {
    4
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            default_concurrency: default_concurrency(),
            per_step: HashMap::new(),
        }
    }
}

impl FanOutConfig {
    pub fn limit_for(&self, step: FlowStep) -> usize {
        self.per_step
            .get(step.as_str())
            .copied()
            .unwrap_or(self.default_concurrency)
            .max(1)
    }
}

/// Settings for the LLM-backed crews.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// `openai` (chat completions) or `anthropic` (messages API).
    #[serde(default = "default_adapter")]
    pub adapter: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Falls back to `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` when unset.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Primary model first, then fallbacks.
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default)]
    pub temperature: Option<f32>,

    /// Extra requests asking the model to repair unparseable output.
    #[serde(default = "default_reformat_attempts")]
    pub reformat_attempts: u32,
}

fn default_adapter() -> String {
    "openai".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_models() -> Vec<String> {
    vec!["gpt-4o-mini".to_string(), "gpt-4o".to_string()]
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_reformat_attempts() -> u32 {
    1
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            adapter: default_adapter(),
            base_url: default_base_url(),
            api_key: None,
            models: default_models(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: None,
            reformat_attempts: default_reformat_attempts(),
        }
    }
}

impl LlmConfig {
    /// Configured key, else the adapter's conventional environment variable.
    /// Adapters without a known variable have no fallback.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty() && !k.starts_with("${"))
            .or_else(|| {
                let var = match self.adapter.as_str() {
                    "anthropic" | "claude" => "ANTHROPIC_API_KEY",
                    "openai" | "opencode" => "OPENAI_API_KEY",
                    _ => return None,
                };
                std::env::var(var).ok().filter(|k| !k.trim().is_empty())
            })
    }
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"))
}

/// Resolve environment variable references in a string.
/// Supports `${VAR}` and `${VAR:-default}` syntax; unknown variables
/// without a default are left as written.
pub fn resolve_env_vars(input: &str) -> String {
    env_var_pattern()
        .replace_all(input, |caps: &regex::Captures| {
            let var_expr = &caps[1];
            if let Some(idx) = var_expr.find(":-") {
                let var_name = &var_expr[..idx];
                let default_val = &var_expr[idx + 2..];
                std::env::var(var_name).unwrap_or_else(|_| default_val.to_string())
            } else {
                std::env::var(var_expr).unwrap_or_else(|_| format!("${{{}}}", var_expr))
            }
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("NEWSFLOW_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${NEWSFLOW_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix-${NEWSFLOW_TEST_VAR}-suffix"),
            "prefix-hello-suffix"
        );
        assert_eq!(resolve_env_vars("${NEWSFLOW_UNSET_VAR:-fallback}"), "fallback");
        assert_eq!(resolve_env_vars("${NEWSFLOW_UNSET_VAR}"), "${NEWSFLOW_UNSET_VAR}");
        std::env::remove_var("NEWSFLOW_TEST_VAR");
    }

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = FlowConfig::from_yaml("").unwrap();
        assert_eq!(config.database_path, "flow_states.db");
        assert_eq!(config.output_dir, "outputs");
        assert_eq!(config.fan_out.default_concurrency, 4);
        assert_eq!(config.llm.timeout_secs, 300);
        assert!((config.pricing.primary_weight - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = r#"
output_dir: "${NEWSFLOW_CFG_OUT:-/tmp/news}"
pricing:
  primary_weight: 0.5
fan_out:
  per_step:
    research_news: 2
    critique: 0
llm:
  adapter: anthropic
  models: [claude-sonnet]
"#;
        let config = FlowConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.output_dir, "/tmp/news");
        assert!((config.pricing.primary_weight - 0.5).abs() < f64::EPSILON);
        assert!((config.pricing.primary.input_per_million - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.fan_out.limit_for(FlowStep::ResearchNews), 2);
        assert_eq!(config.fan_out.limit_for(FlowStep::Critique), 1);
        assert_eq!(config.fan_out.limit_for(FlowStep::PlanResearch), 4);
        assert_eq!(config.llm.adapter, "anthropic");
        assert_eq!(config.llm.models, vec!["claude-sonnet".to_string()]);
        assert_eq!(config.llm.reformat_attempts, 1);
    }

    #[test]
    fn api_key_fallback_depends_on_adapter() {
        let configured = LlmConfig {
            adapter: "openai".to_string(),
            api_key: Some("sk-configured".to_string()),
            ..LlmConfig::default()
        };
        assert_eq!(configured.resolved_api_key().as_deref(), Some("sk-configured"));

        let unknown = LlmConfig {
            adapter: "local-gateway".to_string(),
            api_key: Some("   ".to_string()),
            ..LlmConfig::default()
        };
        assert_eq!(unknown.resolved_api_key(), None);

        let unexpanded = LlmConfig {
            adapter: "local-gateway".to_string(),
            api_key: Some("${NEWSFLOW_UNSET_KEY}".to_string()),
            ..LlmConfig::default()
        };
        assert_eq!(unexpanded.resolved_api_key(), None);
    }

    #[test]
    fn invalid_yaml_is_configuration_error() {
        let err = FlowConfig::from_yaml("fan_out: [not, a, map]").unwrap_err();
        assert!(matches!(err, FlowError::Configuration(_)));
    }

    #[test]
    fn missing_explicit_file_is_configuration_error() {
        let err = FlowConfig::load(Some(Path::new("/nonexistent/newsflow.yaml"))).unwrap_err();
        assert!(matches!(err, FlowError::Configuration(_)));
    }
}
