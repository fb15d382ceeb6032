//! Gateway configuration

use pagedesk_core::TokenConfig;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,

    /// Origins allowed by the CORS layer (explicit allowlist)
    pub allowed_origins: Vec<String>,

    /// Graph API base URL
    pub graph_base_url: String,

    /// Platform app credentials
    pub app_id: String,
    pub app_secret: String,

    /// OAuth redirect URI registered with the platform
    pub oauth_redirect_uri: String,

    /// Identity provider admin API
    pub identity_base_url: String,
    pub identity_service_key: String,

    /// Domains automation webhooks may target
    pub webhook_allowlist: Vec<String>,

    /// SQLite database path
    pub db_path: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_required(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| panic!("{} must be set in the environment", key))
}

fn env_list(key: &str, default: &str) -> Vec<String> {
    env_or(key, default)
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Load configuration from the environment. Secrets are required;
    /// everything else has a local-development default.
    pub fn from_env() -> Self {
        Self {
            port: env_or("PAGEDESK_PORT", "3000")
                .parse()
                .expect("PAGEDESK_PORT must be a valid port number"),
            allowed_origins: env_list("PAGEDESK_ALLOWED_ORIGINS", "http://localhost:5173"),
            graph_base_url: env_or("PAGEDESK_GRAPH_BASE_URL", "https://graph.facebook.com/v19.0"),
            app_id: env_required("PAGEDESK_APP_ID"),
            app_secret: env_required("PAGEDESK_APP_SECRET"),
            oauth_redirect_uri: env_or(
                "PAGEDESK_OAUTH_REDIRECT_URI",
                "http://localhost:5173/oauth/callback",
            ),
            identity_base_url: env_required("PAGEDESK_IDENTITY_BASE_URL"),
            identity_service_key: env_required("PAGEDESK_IDENTITY_SERVICE_KEY"),
            webhook_allowlist: env_list(
                "PAGEDESK_WEBHOOK_ALLOWLIST",
                "hooks.zapier.com,hook.us1.make.com,hooks.slack.com",
            ),
            db_path: env_or("PAGEDESK_DB_PATH", "pagedesk.db"),
        }
    }

    /// Token signing configuration (separate env var, shared with core).
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig::from_env()
    }
}
