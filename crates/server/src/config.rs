//! Configuration loading and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub tokens: TokenStoreConfig,

    #[serde(default)]
    pub facebook: PlatformConfig,

    #[serde(default)]
    pub instagram: InstagramConfig,

    #[serde(default)]
    pub linkedin: PlatformConfig,

    #[serde(default)]
    pub pinterest: PlatformConfig,

    #[serde(default)]
    pub tiktok: PlatformConfig,

    #[serde(default)]
    pub youtube: PlatformConfig,

    #[serde(default)]
    pub google: PlatformConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Name of the env var holding the bearer token API clients must present
    #[serde(default = "default_api_token_env")]
    pub api_token_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStoreConfig {
    #[serde(default = "default_token_db_path")]
    pub db_path: PathBuf,
}

/// One vendor OAuth application. A platform is registered only when its
/// section is enabled; the client secret is referenced by env-var name and
/// never written to the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret_env: String,

    #[serde(default)]
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    #[serde(flatten)]
    pub app: PlatformConfig,

    /// Default integration path: "facebook_graph" or "direct"
    #[serde(default = "default_instagram_api")]
    pub api: String,
}

// Default value functions
fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_api_token_env() -> String {
    "SOCIAL_GATEWAY_API_TOKEN".to_string()
}

fn default_token_db_path() -> PathBuf {
    PathBuf::from("./tokens.sqlite")
}

fn default_instagram_api() -> String {
    "facebook_graph".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            api_token_env: default_api_token_env(),
        }
    }
}

impl Default for TokenStoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_token_db_path(),
        }
    }
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            app: PlatformConfig::default(),
            api: default_instagram_api(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("SOCIAL_GATEWAY")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# social-gateway configuration

[server]
listen = "0.0.0.0:3000"
api_token_env = "SOCIAL_GATEWAY_API_TOKEN"

[tokens]
db_path = "./tokens.sqlite"

[facebook]
enabled = false
client_id = ""
client_secret_env = "FACEBOOK_CLIENT_SECRET"
redirect_uri = "https://your-app.example/callback/facebook"

[instagram]
enabled = false
client_id = ""
client_secret_env = "INSTAGRAM_CLIENT_SECRET"
redirect_uri = "https://your-app.example/callback/instagram"
api = "facebook_graph"  # facebook_graph, direct

[linkedin]
enabled = false
client_id = ""
client_secret_env = "LINKEDIN_CLIENT_SECRET"
redirect_uri = "https://your-app.example/callback/linkedin"

[pinterest]
enabled = false
client_id = ""
client_secret_env = "PINTEREST_CLIENT_SECRET"
redirect_uri = "https://your-app.example/callback/pinterest"

[tiktok]
enabled = false
client_id = ""
client_secret_env = "TIKTOK_CLIENT_SECRET"
redirect_uri = "https://your-app.example/callback/tiktok"

[youtube]
enabled = false
client_id = ""
client_secret_env = "YOUTUBE_CLIENT_SECRET"
redirect_uri = "https://your-app.example/callback/youtube"

[google]
enabled = false
client_id = ""
client_secret_env = "GOOGLE_CLIENT_SECRET"
redirect_uri = "https://your-app.example/callback/google"
"#
        .to_string()
    }

    /// Enabled platform sections, paired with their config-file names
    pub fn enabled_platforms(&self) -> Vec<(&'static str, &PlatformConfig)> {
        let sections: [(&'static str, &PlatformConfig); 7] = [
            ("facebook", &self.facebook),
            ("instagram", &self.instagram.app),
            ("linkedin", &self.linkedin),
            ("pinterest", &self.pinterest),
            ("tiktok", &self.tiktok),
            ("youtube", &self.youtube),
            ("google", &self.google),
        ];
        sections
            .into_iter()
            .filter(|(_, cfg)| cfg.enabled)
            .collect()
    }
}
