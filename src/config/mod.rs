use crate::models::Category;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default = "default_categories")]
    pub categories: Vec<Category>,
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Navigation timeout. Generous by default — the site is slow and remote.
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    /// How long to wait for the card grid / detail marker to render.
    #[serde(default = "default_selector_timeout_secs")]
    pub selector_timeout_secs: u64,

    #[serde(default = "default_selector_poll_ms")]
    pub selector_poll_ms: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Pipeline configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Keep only records published on this day: "today", "yesterday",
    /// or an explicit YYYY-MM-DD. None keeps everything.
    #[serde(default)]
    pub publish_filter: Option<String>,
}

/// Export sink configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
}

/// Cloud upload configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,

    /// Target Drive folder. None uploads to the Drive root.
    #[serde(default)]
    pub folder_id: Option<String>,
}

/// HTTP front-end configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://www.q84sale.com".to_string()
}
fn default_navigation_timeout_secs() -> u64 {
    300
}
fn default_selector_timeout_secs() -> u64 {
    300
}
fn default_selector_poll_ms() -> u64 {
    250
}
fn default_request_delay_ms() -> u64 {
    300
}
fn default_jitter_ms() -> u64 {
    200
}
fn default_max_retries() -> u32 {
    3
}
fn default_out_dir() -> PathBuf {
    PathBuf::from("out")
}
fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// The for-sale category table from production use. Overridable via config.
fn default_categories() -> Vec<Category> {
    const BASE: &str = "https://www.q84sale.com/en/property/for-sale";
    vec![
        Category::new("House for Sale", &format!("{BASE}/house-for-sale/{{}}"), 5),
        Category::new("Building or floors", &format!("{BASE}/building-or-floors/{{}}"), 1),
        Category::new("Apartment for Sale", &format!("{BASE}/apartment-for-sale/{{}}"), 2),
        Category::new("Demolishing", &format!("{BASE}/demolishing/{{}}"), 1),
        Category::new("Lounge for Sale", &format!("{BASE}/lounge-for-sale/{{}}"), 1),
        Category::new("Chalet for Sale", &format!("{BASE}/chalet-for-sale/{{}}"), 1),
        Category::new("Farms for Sale", &format!("{BASE}/farms-for-sale/{{}}"), 1),
        Category::new("Land", &format!("{BASE}/land/{{}}"), 1),
        Category::new("Residential Certificate", &format!("{BASE}/residential-certificate/{{}}"), 1),
        Category::new("Commercial Land Certificate", &format!("{BASE}/commercial-land-certificate/{{}}"), 1),
        Category::new("Shop for Sale", &format!("{BASE}/shop-for-sale/{{}}"), 2),
        Category::new("Company", &format!("{BASE}/company/{{}}"), 1),
        Category::new("Wanted Property for Sale", &format!("{BASE}/wanted-property-for-sale/{{}}"), 1),
    ]
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("Q84").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());
        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig::default(),
            pipeline: PipelineConfig::default(),
            export: ExportConfig::default(),
            upload: UploadConfig::default(),
            server: ServerConfig::default(),
            categories: default_categories(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { out_dir: default_out_dir() }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            folder_id: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            selector_timeout_secs: default_selector_timeout_secs(),
            selector_poll_ms: default_selector_poll_ms(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_retries: default_max_retries(),
        }
    }
}
