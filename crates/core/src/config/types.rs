use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub production: ProductionConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Settings store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("reelpilot.db")
}

/// Remote generation backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Backend base URL (e.g., "https://sora.chatgpt.com")
    #[serde(default = "default_generation_url")]
    pub base_url: String,
    /// Path of the create-job endpoint
    #[serde(default = "default_create_path")]
    pub create_path: String,
    /// Path of the status-listing endpoint (query string included)
    #[serde(default = "default_drafts_path")]
    pub drafts_path: String,
    /// Model identifier sent with every job
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_orientation")]
    pub orientation: String,
    #[serde(default = "default_size")]
    pub size: String,
    /// Request timeout in seconds (default: 60)
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_url(),
            create_path: default_create_path(),
            drafts_path: default_drafts_path(),
            model: default_model(),
            orientation: default_orientation(),
            size: default_size(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_generation_url() -> String {
    "https://sora.chatgpt.com".to_string()
}

fn default_create_path() -> String {
    "/backend/nf/create".to_string()
}

fn default_drafts_path() -> String {
    "/backend/project_y/profile/drafts?limit=15".to_string()
}

fn default_model() -> String {
    "sy_8".to_string()
}

fn default_orientation() -> String {
    "landscape".to_string()
}

fn default_size() -> String {
    "small".to_string()
}

fn default_generation_timeout() -> u32 {
    60
}

/// Production batch tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProductionConfig {
    /// Delay between two status queries (seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Wall-clock ceiling for a single task (seconds)
    #[serde(default = "default_production_timeout")]
    pub timeout_secs: u64,
    /// How far before the batch start a remote record may be created and
    /// still count as ours when matched by prompt prefix
    #[serde(default = "default_backdate")]
    pub submit_backdate_secs: i64,
    /// Prompt prefix length used by the fallback matcher
    #[serde(default = "default_prefix_chars")]
    pub prompt_match_prefix_chars: usize,
    /// Only accept remote records whose id equals the submitted task id
    #[serde(default)]
    pub strict_id_matching: bool,
    /// Maximum number of error body characters kept in diagnostics
    #[serde(default = "default_error_body_chars")]
    pub error_body_max_chars: usize,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            timeout_secs: default_production_timeout(),
            submit_backdate_secs: default_backdate(),
            prompt_match_prefix_chars: default_prefix_chars(),
            strict_id_matching: false,
            error_body_max_chars: default_error_body_chars(),
        }
    }
}

fn default_poll_interval() -> u64 {
    12
}

fn default_production_timeout() -> u64 {
    1200 // 20 minutes
}

fn default_backdate() -> i64 {
    10
}

fn default_prefix_chars() -> usize {
    10
}

fn default_error_body_chars() -> usize {
    50
}

/// Publishing backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublishingConfig {
    #[serde(default = "default_publishing_url")]
    pub base_url: String,
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
    /// Request timeout in seconds (default: 300, uploads are large)
    #[serde(default = "default_publishing_timeout")]
    pub timeout_secs: u32,
    /// Privacy status set on upload; the platform flips it at publish time
    #[serde(default = "default_privacy")]
    pub privacy: String,
    #[serde(default = "default_category")]
    pub category_id: String,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            base_url: default_publishing_url(),
            upload_path: default_upload_path(),
            timeout_secs: default_publishing_timeout(),
            privacy: default_privacy(),
            category_id: default_category(),
        }
    }
}

fn default_publishing_url() -> String {
    "https://www.googleapis.com".to_string()
}

fn default_upload_path() -> String {
    "/upload/youtube/v3/videos?uploadType=multipart&part=snippet,status".to_string()
}

fn default_publishing_timeout() -> u32 {
    300
}

fn default_privacy() -> String {
    "private".to_string()
}

fn default_category() -> String {
    "22".to_string()
}

/// Simulation mode delays (no network access)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    #[serde(default = "default_submit_delay_min")]
    pub submit_delay_min_ms: u64,
    #[serde(default = "default_submit_delay_max")]
    pub submit_delay_max_ms: u64,
    #[serde(default = "default_render_delay_min")]
    pub render_delay_min_ms: u64,
    #[serde(default = "default_render_delay_max")]
    pub render_delay_max_ms: u64,
    #[serde(default = "default_upload_delay")]
    pub upload_delay_ms: u64,
    /// Poll interval used instead of the production one while simulating
    #[serde(default = "default_sim_poll_interval")]
    pub poll_interval_ms: u64,
    /// Label recorded as the artifact source
    #[serde(default = "default_sim_artifact_url")]
    pub artifact_url: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            submit_delay_min_ms: default_submit_delay_min(),
            submit_delay_max_ms: default_submit_delay_max(),
            render_delay_min_ms: default_render_delay_min(),
            render_delay_max_ms: default_render_delay_max(),
            upload_delay_ms: default_upload_delay(),
            poll_interval_ms: default_sim_poll_interval(),
            artifact_url: default_sim_artifact_url(),
        }
    }
}

fn default_submit_delay_min() -> u64 {
    2000
}

fn default_submit_delay_max() -> u64 {
    4000
}

fn default_render_delay_min() -> u64 {
    5000
}

fn default_render_delay_max() -> u64 {
    8000
}

fn default_upload_delay() -> u64 {
    2000
}

fn default_sim_poll_interval() -> u64 {
    500
}

fn default_sim_artifact_url() -> String {
    "https://storage.googleapis.com/gtv-videos-bucket/sample/ForBiggerJoyrides.mp4".to_string()
}

/// Sanitized config for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub generation: SanitizedGenerationConfig,
    pub production: ProductionConfig,
    pub publishing: SanitizedPublishingConfig,
    pub simulation: SimulationConfig,
}

/// Generation config without endpoint paths
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedGenerationConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedPublishingConfig {
    pub base_url: String,
    pub privacy: String,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            generation: SanitizedGenerationConfig {
                base_url: config.generation.base_url.clone(),
                model: config.generation.model.clone(),
                timeout_secs: config.generation.timeout_secs,
            },
            production: config.production.clone(),
            publishing: SanitizedPublishingConfig {
                base_url: config.publishing.base_url.clone(),
                privacy: config.publishing.privacy.clone(),
                timeout_secs: config.publishing.timeout_secs,
            },
            simulation: config.simulation.clone(),
        }
    }
}
