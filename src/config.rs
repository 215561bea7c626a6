use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::models::{Factor, WeightError, WeightVector};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub sources: SourceSettings,
    #[serde(default)]
    pub ranking: RankingSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    /// Shared L2 tier; unset runs with the in-process cache only
    pub redis_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    #[serde(default = "default_waqi_base_url")]
    pub waqi_base_url: String,
    #[serde(default = "default_waqi_token")]
    pub waqi_token: String,
    #[serde(default = "default_places_base_url")]
    pub places_base_url: String,
    /// Places searches are skipped when no key is configured
    #[serde(default)]
    pub places_api_key: Option<String>,
    #[serde(default = "default_places_radius_m")]
    pub places_radius_m: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_on_demand_deadline_secs")]
    pub on_demand_deadline_secs: u64,
    #[serde(default = "default_trips_per_month")]
    pub trips_per_month: u32,
    #[serde(default)]
    pub delivery: DeliveryCoverageSettings,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            waqi_base_url: default_waqi_base_url(),
            waqi_token: default_waqi_token(),
            places_base_url: default_places_base_url(),
            places_api_key: None,
            places_radius_m: default_places_radius_m(),
            request_timeout_secs: default_request_timeout_secs(),
            source_timeout_secs: default_source_timeout_secs(),
            max_concurrency: default_max_concurrency(),
            on_demand_deadline_secs: default_on_demand_deadline_secs(),
            trips_per_month: default_trips_per_month(),
            delivery: DeliveryCoverageSettings::default(),
        }
    }
}

fn default_waqi_base_url() -> String { "https://api.waqi.info".to_string() }
fn default_waqi_token() -> String { "demo".to_string() }
fn default_places_base_url() -> String { "https://maps.googleapis.com".to_string() }
fn default_places_radius_m() -> u32 { 2000 }
fn default_request_timeout_secs() -> u64 { 10 }
fn default_source_timeout_secs() -> u64 { 8 }
fn default_max_concurrency() -> usize { 16 }
fn default_on_demand_deadline_secs() -> u64 { 15 }
fn default_trips_per_month() -> u32 { 60 }

/// Cities each delivery service operates in; `*` matches every city
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryCoverageSettings {
    #[serde(default = "default_blinkit_cities")]
    pub blinkit: Vec<String>,
    #[serde(default = "default_everywhere")]
    pub zomato: Vec<String>,
    #[serde(default = "default_everywhere")]
    pub swiggy: Vec<String>,
}

impl Default for DeliveryCoverageSettings {
    fn default() -> Self {
        Self {
            blinkit: default_blinkit_cities(),
            zomato: default_everywhere(),
            swiggy: default_everywhere(),
        }
    }
}

fn default_blinkit_cities() -> Vec<String> {
    ["Mumbai", "Delhi", "Bangalore", "Hyderabad", "Chennai", "Kolkata", "Pune", "Bhopal"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_everywhere() -> Vec<String> {
    vec!["*".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingSettings {
    #[serde(default = "default_max_top_n")]
    pub max_top_n: usize,
    #[serde(default)]
    pub weights: WeightsConfig,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            max_top_n: default_max_top_n(),
            weights: WeightsConfig::default(),
        }
    }
}

fn default_max_top_n() -> usize { 50 }

/// Weights applied when a request omits its own
#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_rent_weight")]
    pub rent: f64,
    #[serde(default = "default_grocery_cost_weight")]
    pub grocery_cost: f64,
    #[serde(default = "default_delivery_availability_weight")]
    pub delivery_availability: f64,
    #[serde(default = "default_aqi_weight")]
    pub aqi: f64,
    #[serde(default = "default_hygiene_weight")]
    pub hygiene: f64,
    #[serde(default = "default_amenities_weight")]
    pub amenities: f64,
    #[serde(default = "default_connectivity_weight")]
    pub connectivity: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            rent: default_rent_weight(),
            grocery_cost: default_grocery_cost_weight(),
            delivery_availability: default_delivery_availability_weight(),
            aqi: default_aqi_weight(),
            hygiene: default_hygiene_weight(),
            amenities: default_amenities_weight(),
            connectivity: default_connectivity_weight(),
        }
    }
}

impl WeightsConfig {
    pub fn to_weight_vector(&self) -> Result<WeightVector, WeightError> {
        WeightVector::zero()
            .with(Factor::Rent, self.rent)?
            .with(Factor::GroceryCost, self.grocery_cost)?
            .with(Factor::DeliveryAvailability, self.delivery_availability)?
            .with(Factor::Aqi, self.aqi)?
            .with(Factor::Hygiene, self.hygiene)?
            .with(Factor::Amenities, self.amenities)?
            .with(Factor::Connectivity, self.connectivity)
    }
}

fn default_rent_weight() -> f64 { 0.25 }
fn default_grocery_cost_weight() -> f64 { 0.15 }
fn default_delivery_availability_weight() -> f64 { 0.10 }
fn default_aqi_weight() -> f64 { 0.15 }
fn default_hygiene_weight() -> f64 { 0.10 }
fn default_amenities_weight() -> f64 { 0.15 }
fn default_connectivity_weight() -> f64 { 0.10 }

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_access_token_ttl_minutes")]
    pub access_token_ttl_minutes: i64,
    /// Require a bearer token on recommendation routes
    #[serde(default)]
    pub require_token: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            access_token_ttl_minutes: default_access_token_ttl_minutes(),
            require_token: false,
        }
    }
}

impl AuthSettings {
    /// Secret still at its shipped placeholder
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

/// Placeholder signing secret; override with JWT_SECRET_KEY
pub const DEFAULT_JWT_SECRET: &str = "change-me";

fn default_jwt_secret() -> String { DEFAULT_JWT_SECRET.to_string() }
fn default_access_token_ttl_minutes() -> i64 { 30 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with RANKER__)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., RANKER__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("RANKER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = substitute_env_vars(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("RANKER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Apply the conventional unprefixed variables on top of loaded config
///
/// `DATABASE_URL`, `REDIS_URL`, `WAQI_TOKEN`, `GOOGLE_PLACES_API_KEY` and
/// `JWT_SECRET_KEY` are honored when set.
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let overrides = [
        ("DATABASE_URL", "database.url"),
        ("REDIS_URL", "cache.redis_url"),
        ("WAQI_TOKEN", "sources.waqi_token"),
        ("GOOGLE_PLACES_API_KEY", "sources.places_api_key"),
        ("JWT_SECRET_KEY", "auth.jwt_secret"),
    ];

    let mut builder = Config::builder().add_source(settings);
    for (var, key) in overrides {
        if let Ok(value) = env::var(var) {
            builder = builder.set_override(key, value)?;
        }
    }

    builder.build()
}
