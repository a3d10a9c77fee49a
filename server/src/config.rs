use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Social coordination server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "social-server", version, about = "Real-time social coordination server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "SOCIAL_PORT", default_value = "3000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "SOCIAL_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./social.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "SOCIAL_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (DB, signing key)
    #[arg(long, env = "SOCIAL_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Real-time transport tuning (loaded from [realtime] section in TOML)
    #[arg(skip)]
    #[serde(default)]
    pub realtime: Option<RealtimeConfig>,

    /// Media storage (loaded from [media] section in TOML)
    #[arg(skip)]
    #[serde(default)]
    pub media: Option<MediaConfig>,
}

/// Keepalive settings for WebSocket connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Seconds between server pings (default: 30)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds to wait for a pong before closing (default: 10)
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
}

impl RealtimeConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs.max(1))
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval(),
            pong_timeout_secs: default_pong_timeout(),
        }
    }
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_timeout() -> u64 {
    10
}

/// Where uploaded media lives and how stored references map onto it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Media root directory (default: `<data_dir>/media`)
    #[serde(default)]
    pub dir: Option<String>,

    /// Public URL prefix stored in message media references, stripped to get the key
    #[serde(default)]
    pub public_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
            config: "./social.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            realtime: Some(RealtimeConfig::default()),
            media: None,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (SOCIAL_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(std::env::args_os())
    }

    /// Same as `load`, with an explicit argv. Exits on invalid arguments like `parse`.
    pub fn load_from<I, T>(args: I) -> Result<Self, figment::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command().get_matches_from(args);
        let cli = Self::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("SOCIAL_"))
            .merge(Serialized::defaults(command_line_overrides(&cli, &matches)))
            .extract()
    }

    pub fn realtime(&self) -> RealtimeConfig {
        self.realtime.clone().unwrap_or_default()
    }

    /// Resolved media directory.
    pub fn media_dir(&self) -> PathBuf {
        self.media
            .as_ref()
            .and_then(|m| m.dir.clone())
            .map(PathBuf::from)
            .unwrap_or_else(|| Path::new(&self.data_dir).join("media"))
    }

    pub fn media_base_url(&self) -> String {
        self.media
            .as_ref()
            .map(|m| m.public_base_url.clone())
            .unwrap_or_default()
    }
}

/// Only the values typed on the command line. Clap defaults and env fallbacks
/// would otherwise mask the TOML and env layers.
fn command_line_overrides(cli: &Config, matches: &ArgMatches) -> serde_json::Map<String, serde_json::Value> {
    let mut values = match serde_json::to_value(cli) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => return serde_json::Map::new(),
    };
    // Sections loaded only from TOML are not clap ids
    values.retain(|key, _| {
        matches.try_contains_id(key).unwrap_or(false)
            && matches.value_source(key) == Some(ValueSource::CommandLine)
    });
    values
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Social Server Configuration
# Place this file at ./social.toml or specify with --config <path>
# All settings can be overridden via environment variables (SOCIAL_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 3000)
# port = 3000

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database and JWT signing key
# data_dir = "./data"

# ---- Real-time transport ----
# [realtime]
# ping_interval_secs = 30   # Server ping cadence
# pong_timeout_secs = 10    # Close the socket if no pong arrives in time

# ---- Media storage ----
# [media]
# dir = "./data/media"
# public_base_url = "https://cdn.example.com"  # Prefix stripped from stored media URLs
"#
    .to_string()
}
