//! Server configuration
//!
//! Layered with figment: built-in defaults, an optional TOML file,
//! `SHORTPIX_` environment variables (nested with `__`), and the variable
//! names used by the earlier Pages deployment (`TG_Bot_Token` etc.).

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Deserializer, Serialize};

/// Default Telegram Bot API origin
pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

/// Default legacy static host
pub const DEFAULT_LEGACY_ORIGIN: &str = "https://telegra.ph";

/// Default moderation API origin
pub const DEFAULT_MODERATION_API: &str = "https://api.moderatecontent.com";

/// Placeholder served to embedding sites when an image is blocked
pub const DEFAULT_BLOCKED_IMAGE: &str =
    "https://static-res.pages.dev/teleimage/img-block-compressed.png";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// SQLite database path; None = in-memory
    pub db_path: Option<String>,
    /// Disable to run without a metadata store (short codes then 404)
    pub kv_enabled: bool,
    /// Public origin used for redirects and returned links. When unset the
    /// origin is derived from the request's Host header.
    pub public_origin: Option<String>,
    /// Origin that unrecognised paths are forwarded to
    pub legacy_origin: String,
    /// Largest inbound request body buffered for forwarding or upload
    pub max_body_bytes: usize,
    /// Overall timeout for each outbound HTTP request
    pub request_timeout_secs: u64,
    pub telegram: TelegramConfig,
    pub moderation: ModerationConfig,
    pub policy: PolicyConfig,
}

/// Telegram Bot API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub api_base: String,
    pub bot_token: String,
    /// Channel uploads are sent to; uploads are disabled without it.
    /// Accepts `-100123` as well as `"-100123"`.
    #[serde(deserialize_with = "string_or_number")]
    pub chat_id: Option<String>,
}

/// Moderation API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    pub api_base: String,
    /// Moderation is skipped entirely when no key is configured
    pub api_key: Option<String>,
}

/// Access policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Only explicitly white-listed files are served
    pub whitelist_mode: bool,
    pub blocked_image_url: String,
    /// Referer path prefix that identifies the admin UI
    pub admin_path_marker: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            db_path: None,
            kv_enabled: true,
            public_origin: None,
            legacy_origin: DEFAULT_LEGACY_ORIGIN.to_string(),
            max_body_bytes: 20 * 1024 * 1024,
            request_timeout_secs: 60,
            telegram: TelegramConfig::default(),
            moderation: ModerationConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_TELEGRAM_API.to_string(),
            bot_token: String::new(),
            chat_id: None,
        }
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_MODERATION_API.to_string(),
            api_key: None,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            whitelist_mode: false,
            blocked_image_url: DEFAULT_BLOCKED_IMAGE.to_string(),
            admin_path_marker: "/admin".to_string(),
        }
    }
}

impl Config {
    /// Build the layered figment. The config file is optional.
    pub fn figment(config_path: &Path) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if config_path.exists() {
            tracing::info!(config_path = %config_path.display(), "Loading configuration from file");
            figment = figment.merge(Toml::file(config_path));
        } else {
            tracing::debug!("No config file found at {}", config_path.display());
        }

        figment
            .merge(Env::prefixed("SHORTPIX_").split("__"))
            .merge(legacy_env())
    }

    /// Load configuration from file and environment
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let config: Config = Self::figment(config_path).extract()?;
        Ok(config)
    }

    /// Outbound request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check if uploads can be sent to Telegram
    pub fn uploads_enabled(&self) -> bool {
        !self.telegram.bot_token.is_empty() && self.telegram.chat_id.is_some()
    }
}

/// Env values are typed by figment, so numeric ids arrive as integers
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Signed(n) => n.to_string(),
        Raw::Unsigned(n) => n.to_string(),
    }))
}

/// Environment names from the earlier deployment, mapped onto config keys
fn legacy_env() -> Env {
    Env::raw().filter_map(|key| {
        let mapped = match key.as_str().to_ascii_lowercase().as_str() {
            "tg_bot_token" => "telegram.bot_token",
            "tg_chat_id" => "telegram.chat_id",
            "moderatecontentapikey" => "moderation.api_key",
            "whitelist_mode" => "policy.whitelist_mode",
            _ => return None,
        };
        Some(mapped.into())
    })
}
