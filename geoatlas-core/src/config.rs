//! Configuration system for GeoAtlas.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/geoatlas/config.toml` and/or `.geoatlas/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::research::{
    DEFAULT_TITLE_SIMILARITY_THRESHOLD, PipelineSettings, RelevancePolicy, ResearchKeywords,
};

/// Longest accepted search-cache lifetime (one day).
pub const MAX_CACHE_TTL_SECS: u64 = 86_400;

/// Top-level configuration for GeoAtlas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoAtlasConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Settings shared by every upstream HTTP call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl GeoAtlasConfig {
    /// Validate every section that has constraints beyond its types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http.validate()?;
        self.research.validate()
    }
}

impl HttpConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "http.timeout_secs must be at least 1".into(),
            });
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "http.connect_timeout_secs must be at least 1".into(),
            });
        }
        Ok(())
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            connect_timeout_secs: 5,
            user_agent: format!("GeoAtlas/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Research search and pipeline tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// How long a search result stays cached.
    pub cache_ttl_secs: u64,
    /// Upper bound on distinct cached searches.
    pub cache_max_entries: usize,
    /// Papers requested from the upstream provider per search.
    pub result_limit: usize,
    pub title_similarity_threshold: f64,
    pub fallback_ratio: f64,
    pub fallback_min_input: usize,
    pub keywords: ResearchKeywords,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        let relevance = RelevancePolicy::default();
        Self {
            cache_ttl_secs: 300,
            cache_max_entries: 256,
            result_limit: 50,
            title_similarity_threshold: DEFAULT_TITLE_SIMILARITY_THRESHOLD,
            fallback_ratio: relevance.fallback_ratio,
            fallback_min_input: relevance.fallback_min_input,
            keywords: ResearchKeywords::default(),
        }
    }
}

impl ResearchConfig {
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            keywords: self.keywords.clone(),
            title_similarity_threshold: self.title_similarity_threshold,
            relevance: RelevancePolicy {
                fallback_ratio: self.fallback_ratio,
                fallback_min_input: self.fallback_min_input,
            },
        }
    }

    /// Search-cache lifetime as a `chrono` duration.
    pub fn cache_ttl(&self) -> Result<Duration, ConfigError> {
        i64::try_from(self.cache_ttl_secs)
            .ok()
            .filter(|secs| *secs as u64 <= MAX_CACHE_TTL_SECS)
            .and_then(Duration::try_seconds)
            .ok_or_else(|| ConfigError::Invalid {
                message: format!(
                    "research.cache_ttl_secs must be at most {}, got {}",
                    MAX_CACHE_TTL_SECS, self.cache_ttl_secs
                ),
            })
    }

    /// Reject values that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache_ttl()?;
        if !(0.0..=1.0).contains(&self.title_similarity_threshold) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "research.title_similarity_threshold must be within [0, 1], got {}",
                    self.title_similarity_threshold
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.fallback_ratio) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "research.fallback_ratio must be within [0, 1], got {}",
                    self.fallback_ratio
                ),
            });
        }
        if self.result_limit == 0 {
            return Err(ConfigError::Invalid {
                message: "research.result_limit must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Upstream endpoints and credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub openalex_base_url: String,
    /// Contact address for the OpenAlex polite pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openalex_mailto: Option<String>,
    pub rest_countries_base_url: String,
    pub world_bank_base_url: String,
    pub natural_earth_base_url: String,
    pub news_base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_api_key: Option<String>,
    pub news_language: String,
    pub news_max_articles: usize,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            openalex_base_url: "https://api.openalex.org".into(),
            openalex_mailto: None,
            rest_countries_base_url: "https://restcountries.com/v3.1".into(),
            world_bank_base_url: "https://api.worldbank.org/v2".into(),
            natural_earth_base_url:
                "https://raw.githubusercontent.com/nvkelso/natural-earth-vector/master/geojson"
                    .into(),
            news_base_url: "https://gnews.io/api/v4".into(),
            news_api_key: None,
            news_language: "en".into(),
            news_max_articles: 10,
        }
    }
}

/// Address the HTTP gateway binds to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 18790,
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "geoatlas", "geoatlas")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the workspace-local config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".geoatlas").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `GEOATLAS_`)
/// 3. Workspace-local config (`.geoatlas/config.toml`)
/// 4. User config (`~/.config/geoatlas/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&GeoAtlasConfig>,
) -> Result<GeoAtlasConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(GeoAtlasConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // GEOATLAS_HTTP__TIMEOUT_SECS, GEOATLAS_SOURCES__NEWS_API_KEY, etc.
    figment = figment.merge(Env::prefixed("GEOATLAS_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Load a single explicit config file on top of the defaults and environment.
pub fn load_config_file(path: &Path) -> Result<GeoAtlasConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    Figment::from(Serialized::defaults(GeoAtlasConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("GEOATLAS_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

/// Write a default config file into `<workspace>/.geoatlas/config.toml`.
///
/// Leaves an existing file untouched. Returns the path either way.
pub fn init_workspace_config(workspace: &Path) -> anyhow::Result<PathBuf> {
    let config_path = workspace_config_path(workspace);
    if config_path.exists() {
        return Ok(config_path);
    }
    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let content = toml::to_string_pretty(&GeoAtlasConfig::default())?;
    std::fs::write(&config_path, content)?;
    Ok(config_path)
}
