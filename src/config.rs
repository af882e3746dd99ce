use std::path::PathBuf;
use std::time::Duration;

/// Default generation service URL.
/// Override at build time: GENERATION_SERVICE_URL=https://example.com cargo build
pub const GENERATION_SERVICE_URL: &str = match option_env!("GENERATION_SERVICE_URL") {
    Some(url) => url,
    None => "https://web-production-5f72.up.railway.app",
};

pub const GENERATE_SITE_PATH: &str = "/generate-site";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct Settings {
    pub service_url: String,
    pub request_timeout: Duration,
    /// Holds the settings database and the log file.
    pub data_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            service_url: std::env::var("GENERATION_SERVICE_URL")
                .unwrap_or_else(|_| GENERATION_SERVICE_URL.to_string()),
            request_timeout: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            data_dir: std::env::var("SLOTSITE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".slotsite")),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_url: GENERATION_SERVICE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            data_dir: PathBuf::from(".slotsite"),
        }
    }
}
