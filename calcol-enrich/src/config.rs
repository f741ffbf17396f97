//! Service configuration for calcol-enrich
//!
//! Resolved once at startup from a [`ConfigSource`] (environment over TOML over
//! built-in defaults) and immutable afterwards.

use crate::providers::museum::DEFAULT_MUSEUM_SITES;
use crate::providers::{anthropic, bing, brave, google, openai};
use crate::quota::{QuotaKey, QuotaLimits};
use calcol_common::config::{default_data_dir, ConfigSource};
use calcol_common::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 5780;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MUSEUM_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_ADDED_BY: &str = "enrichment";

/// Credentials, endpoint and limits of one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    /// Google search engine id; unused elsewhere
    pub secondary_key: Option<String>,
    pub base_url: String,
    pub rate_per_second: u32,
    pub monthly_limit: u32,
}

impl ProviderConfig {
    /// Provider without credentials, on defaults
    pub fn disabled(base_url: &str, key: QuotaKey) -> Self {
        let limits = key.default_limits();
        Self {
            api_key: None,
            secondary_key: None,
            base_url: base_url.to_string(),
            rate_per_second: limits.rate_per_second,
            monthly_limit: limits.monthly_limit,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn limits(&self) -> QuotaLimits {
        QuotaLimits::new(self.rate_per_second, self.monthly_limit)
    }

    fn resolve(
        source: &ConfigSource,
        name: &str,
        key: QuotaKey,
        default_base_url: &str,
    ) -> Result<Self> {
        let limits = key.default_limits();
        Ok(Self {
            api_key: source.get_string(&format!("search.{}.api-key", name)),
            secondary_key: None,
            base_url: source
                .get_string(&format!("search.{}.base-url", name))
                .unwrap_or_else(|| default_base_url.to_string()),
            rate_per_second: source.get_or(
                &format!("quota.{}.rate-limit", key.as_str()),
                limits.rate_per_second,
            )?,
            monthly_limit: source.get_or(
                &format!("quota.{}.monthly-limit", key.as_str()),
                limits.monthly_limit,
            )?,
        })
    }
}

/// Generative backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProviderKind {
    OpenAi,
    Anthropic,
}

impl AiProviderKind {
    /// Unknown names fall back to OpenAI
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => AiProviderKind::OpenAi,
            "anthropic" => AiProviderKind::Anthropic,
            other => {
                warn!(provider = other, "Unknown AI provider, using OpenAI");
                AiProviderKind::OpenAi
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AiProviderKind::OpenAi => "openai",
            AiProviderKind::Anthropic => "anthropic",
        }
    }
}

/// Outbound HTTP settings shared by search and generative providers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Museum scraping settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuseumConfig {
    pub enabled: bool,
    /// Site URLs; a trailing empty query parameter (`?q=`) receives the query
    pub sites: Vec<String>,
    pub timeout: Duration,
}

impl Default for MuseumConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sites: DEFAULT_MUSEUM_SITES.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(DEFAULT_MUSEUM_TIMEOUT_SECS),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Complete service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichConfig {
    pub server: ServerConfig,
    pub database_path: PathBuf,
    pub log_level: String,
    pub http: HttpSettings,
    pub google: ProviderConfig,
    pub bing: ProviderConfig,
    pub brave: ProviderConfig,
    pub ai: ProviderConfig,
    pub ai_provider: AiProviderKind,
    pub museum: MuseumConfig,
    /// Prefix for catalog image URLs
    pub base_url: Option<String>,
    /// `added_by` recorded on enrichment links
    pub added_by: String,
}

impl Default for EnrichConfig {
    /// Built-in defaults only; no environment lookups
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
            },
            database_path: default_data_dir().join("calcol.db"),
            log_level: "info".to_string(),
            http: HttpSettings::default(),
            google: ProviderConfig::disabled(google::GOOGLE_API_URL, QuotaKey::Google),
            bing: ProviderConfig::disabled(bing::BING_API_URL, QuotaKey::Bing),
            brave: ProviderConfig::disabled(brave::BRAVE_API_URL, QuotaKey::Brave),
            ai: ProviderConfig::disabled(openai::OPENAI_API_URL, QuotaKey::Ai),
            ai_provider: AiProviderKind::OpenAi,
            museum: MuseumConfig::default(),
            base_url: None,
            added_by: DEFAULT_ADDED_BY.to_string(),
        }
    }
}

impl EnrichConfig {
    /// Resolve every key from the layered source
    pub fn from_source(source: &ConfigSource) -> Result<Self> {
        let mut google = ProviderConfig::resolve(source, "google", QuotaKey::Google, google::GOOGLE_API_URL)?;
        google.secondary_key = source.get_string("search.google.search-engine-id");

        let bing = ProviderConfig::resolve(source, "bing", QuotaKey::Bing, bing::BING_API_URL)?;
        let brave = ProviderConfig::resolve(source, "brave", QuotaKey::Brave, brave::BRAVE_API_URL)?;

        let ai_provider = source
            .get_string("search.ai.provider")
            .map(|name| AiProviderKind::parse(&name))
            .unwrap_or(AiProviderKind::OpenAi);
        let mut ai = ProviderConfig::resolve(source, "ai", QuotaKey::Ai, openai::OPENAI_API_URL)?;
        ai.base_url = match ai_provider {
            AiProviderKind::OpenAi => source
                .get_string("search.openai.base-url")
                .unwrap_or_else(|| openai::OPENAI_API_URL.to_string()),
            AiProviderKind::Anthropic => source
                .get_string("search.anthropic.base-url")
                .unwrap_or_else(|| anthropic::ANTHROPIC_API_URL.to_string()),
        };

        let museum_defaults = MuseumConfig::default();
        let museum = MuseumConfig {
            enabled: source.get_or("search.museum.enabled", true)?,
            sites: source
                .get_list("search.museum.sites")
                .unwrap_or(museum_defaults.sites),
            timeout: Duration::from_secs(
                source.get_or("search.museum.timeout-secs", DEFAULT_MUSEUM_TIMEOUT_SECS)?,
            ),
        };

        let database_path = source
            .get_string("database-path")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_dir().join("calcol.db"));

        let config = Self {
            server: ServerConfig {
                host: source
                    .get_string("server.host")
                    .unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: source.get_or("server.port", DEFAULT_PORT)?,
            },
            database_path,
            log_level: source
                .get_string("logging.level")
                .unwrap_or_else(|| "info".to_string()),
            http: HttpSettings {
                timeout: Duration::from_secs(
                    source.get_or("http.timeout-secs", DEFAULT_HTTP_TIMEOUT_SECS)?,
                ),
                max_body_bytes: source.get_or("http.max-body-bytes", DEFAULT_MAX_BODY_BYTES)?,
            },
            google,
            bing,
            brave,
            ai,
            ai_provider,
            museum,
            base_url: source
                .get_string("base-url")
                .map(|url| url.trim_end_matches('/').to_string()),
            added_by: source
                .get_string("enrichment.added-by")
                .unwrap_or_else(|| DEFAULT_ADDED_BY.to_string()),
        };

        config.log_summary();
        Ok(config)
    }

    /// Limits for the quota guard
    pub fn quota_limits(&self) -> BTreeMap<QuotaKey, QuotaLimits> {
        let mut limits = BTreeMap::new();
        limits.insert(QuotaKey::Google, self.google.limits());
        limits.insert(QuotaKey::Bing, self.bing.limits());
        limits.insert(QuotaKey::Brave, self.brave.limits());
        limits.insert(QuotaKey::Ai, self.ai.limits());
        limits
    }

    fn log_summary(&self) {
        let configured = |c: &ProviderConfig| c.api_key.is_some();
        info!(
            google = configured(&self.google) && self.google.secondary_key.is_some(),
            bing = configured(&self.bing),
            brave = configured(&self.brave),
            ai = configured(&self.ai),
            ai_provider = self.ai_provider.as_str(),
            museum = self.museum.enabled,
            "Enrichment providers configured"
        );
    }
}
