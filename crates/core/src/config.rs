use crate::error::{BasketError, BasketResult};
use crate::types::RuleMetric;
use serde::Deserialize;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `BASKET_INSIGHT__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub data: DataConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Upper bound on a `PUT /v1/transactions` body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Defaults for the mining pipeline. Requests may override any of these.
#[derive(Debug, Clone, Deserialize)]
pub struct MiningConfig {
    #[serde(default = "default_min_support")]
    pub min_support: f64,
    #[serde(default)]
    pub metric: RuleMetric,
    #[serde(default = "default_min_threshold")]
    pub min_threshold: f64,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default)]
    pub max_len: Option<usize>,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: Option<usize>,
    #[serde(default = "default_cancellation_marker")]
    pub cancellation_marker: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataConfig {
    /// JSON array of till records loaded at startup.
    #[serde(default)]
    pub transactions_path: Option<String>,
}

// Default functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_max_body_bytes() -> usize {
    32 * 1024 * 1024
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_min_support() -> f64 {
    0.01
}
fn default_min_threshold() -> f64 {
    0.7
}
fn default_top_n() -> usize {
    3
}
fn default_max_candidates() -> Option<usize> {
    Some(1_000_000)
}
fn default_cancellation_marker() -> String {
    "C".to_string()
}
fn default_cache_max_entries() -> usize {
    32
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            min_support: default_min_support(),
            metric: RuleMetric::default(),
            min_threshold: default_min_threshold(),
            top_n: default_top_n(),
            max_len: None,
            max_candidates: default_max_candidates(),
            cancellation_marker: default_cancellation_marker(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            mining: MiningConfig::default(),
            cache: CacheConfig::default(),
            data: DataConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then environment variables.
    /// Environment variables take precedence.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::with_name(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        let builder = builder.add_source(
            config::Environment::with_prefix("BASKET_INSIGHT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Reject settings that would only fail later, at request time.
    pub fn validate(&self) -> BasketResult<()> {
        let mining = &self.mining;
        if !mining.min_support.is_finite()
            || mining.min_support <= 0.0
            || mining.min_support > 1.0
        {
            return Err(BasketError::Config(format!(
                "mining.min_support must be in (0, 1], got {}",
                mining.min_support
            )));
        }
        if !mining.min_threshold.is_finite() {
            return Err(BasketError::Config("mining.min_threshold must be finite".to_string()));
        }
        if mining.top_n == 0 {
            return Err(BasketError::Config("mining.top_n must be at least 1".to_string()));
        }
        if mining.cancellation_marker.is_empty() {
            return Err(BasketError::Config(
                "mining.cancellation_marker must not be empty".to_string(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(BasketError::Config("cache.max_entries must be at least 1".to_string()));
        }
        Ok(())
    }
}
