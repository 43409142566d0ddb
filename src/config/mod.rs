use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::github::ReportMode;
use crate::retry::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "contribot.toml";
const ENV_PREFIX: &str = "CONTRIBOT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub github: GithubConfig,
    pub discord: DiscordConfig,
    pub schedule: ScheduleConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    pub token: Option<String>,
    pub graphql_url: String,
    pub rest_url: String,
    /// Attempts per request, the first one included
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub timeout_secs: u64,
    pub mode: ReportMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub token: Option<String>,
    pub webhook_url: Option<String>,
    pub guild_id: Option<u64>,
    pub channel_id: Option<u64>,
    pub embed_color: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Local wall-clock time of the daily summary, `HH:MM`
    pub daily_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_file: PathBuf,
    pub lock_timeout_secs: u64,
    pub lock_poll_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github: GithubConfig {
                token: None,
                graphql_url: "https://api.github.com/graphql".to_string(),
                rest_url: "https://api.github.com".to_string(),
                max_attempts: 3,
                backoff_ms: 0,
                timeout_secs: 30,
                mode: ReportMode::Daily,
            },
            discord: DiscordConfig {
                token: None,
                webhook_url: None,
                guild_id: None,
                channel_id: None,
                embed_color: 0x2ECC71,
            },
            schedule: ScheduleConfig {
                daily_at: "23:42".to_string(),
            },
            storage: StorageConfig {
                data_file: PathBuf::from("data.json"),
                lock_timeout_secs: 10,
                lock_poll_ms: 50,
            },
        }
    }
}

impl Config {
    /// Layers defaults, an optional TOML file and `CONTRIBOT__*` environment
    /// variables. A missing file is only an error when it was asked for
    /// explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())
            .context("Failed to serialize default configuration")?;

        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration")?;

        let config: Self = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        config.schedule_time()?;
        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.github.max_attempts.max(1),
            backoff: Duration::from_millis(self.github.backoff_ms),
            timeout: Duration::from_secs(self.github.timeout_secs),
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.storage.lock_timeout_secs)
    }

    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.storage.lock_poll_ms.max(1))
    }

    pub fn schedule_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.schedule.daily_at, "%H:%M").with_context(|| {
            format!(
                "schedule.daily_at must be HH:MM, got {:?}",
                self.schedule.daily_at
            )
        })
    }

    pub fn github_token(&self) -> Result<&str> {
        match self.github.token.as_deref() {
            Some(token) if !token.is_empty() => Ok(token),
            _ => bail!("GitHub token is missing (set GITHUB_TOKEN or github.token)"),
        }
    }

    pub fn validate_for_bot(&self) -> Result<BotSettings> {
        let token = match self.discord.token.as_deref() {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => bail!("Discord bot token is missing (set DISCORD_TOKEN or discord.token)"),
        };
        let guild_id = match self.discord.guild_id {
            Some(id) if id != 0 => id,
            _ => bail!("Discord guild id is missing (set GUILD_ID or discord.guild_id)"),
        };
        let channel_id = match self.discord.channel_id {
            Some(id) if id != 0 => id,
            _ => bail!("Discord channel id is missing (set CHANNEL_ID or discord.channel_id)"),
        };
        self.github_token()?;

        Ok(BotSettings {
            token,
            guild_id,
            channel_id,
            daily_at: self.schedule_time()?,
        })
    }

    pub fn validate_for_webhook(&self) -> Result<&str> {
        match self.discord.webhook_url.as_deref() {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(url),
            Some(url) => bail!("Webhook URL is not an http(s) URL: {}", url),
            None => bail!("Webhook URL is missing (set DISCORD_WEBHOOK_URL or discord.webhook_url)"),
        }
    }
}

/// Values the gateway bot cannot start without.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub token: String,
    pub guild_id: u64,
    pub channel_id: u64,
    pub daily_at: NaiveTime,
}
