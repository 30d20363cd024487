use std::{env, time::Duration};

use thiserror::Error;

pub const DEFAULT_WAKATIME_BASE_URL: &str = "https://wakatime.com/api/v1";
pub const DEFAULT_GITHUB_STATUS_URL: &str = "https://api.github.com/user/status";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {0}")]
    MissingSecrets(String),
}

/// Secrets for both APIs. Always read from the environment (or a `.env`
/// file), never from flags, so they don't leak into process listings.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub wakatime_api_key: String,
    pub github_token: String,
}

impl Credentials {
    fn from_env() -> Result<Self, ConfigError> {
        let wakatime_api_key = env::var("WAKATIME_API_KEY")
            .ok()
            .filter(|v| !v.is_empty());
        let github_token = env::var("GITHUB_TOKEN").ok().filter(|v| !v.is_empty());

        match (wakatime_api_key, github_token) {
            (Some(wakatime_api_key), Some(github_token)) => Ok(Self {
                wakatime_api_key,
                github_token,
            }),
            (wakatime_api_key, github_token) => {
                let mut missing = vec![];
                if wakatime_api_key.is_none() {
                    missing.push("WAKATIME_API_KEY");
                }
                if github_token.is_none() {
                    missing.push("GITHUB_TOKEN");
                }
                Err(ConfigError::MissingSecrets(missing.join(", ")))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct IconSet {
    pub time: String,
    pub project: String,
    pub active: String,
    pub idle: String,
    pub error: String,
    pub progress_filled: String,
    pub progress_empty: String,
}

impl Default for IconSet {
    fn default() -> Self {
        Self {
            time: "⏰".into(),
            project: "📂".into(),
            active: "🚀".into(),
            idle: "🌟".into(),
            error: "⚠️".into(),
            progress_filled: "⬢".into(),
            progress_empty: "⬡".into(),
        }
    }
}

/// Display knobs for the composed status line. Loaded once at startup and
/// immutable afterwards.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub max_message_length: usize,
    pub progress_bar_width: usize,
    pub daily_goal_seconds: u64,
    pub icons: IconSet,
    pub separator: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_message_length: 80,
            progress_bar_width: 10,
            daily_goal_seconds: 8 * 3600,
            icons: IconSet::default(),
            separator: " ⟫ ".into(),
        }
    }
}

/// Tunables shared by every command.
#[derive(clap::Args, Debug, Clone)]
pub struct UpdaterOptions {
    #[arg(long, default_value_t = 300, help = "Seconds between update cycles")]
    pub interval: u64,
    #[arg(
        long,
        default_value_t = 80,
        help = "Maximum length of the published status message"
    )]
    pub max_status_length: usize,
    #[arg(
        long,
        default_value_t = 10,
        help = "Width of the progress bar in glyphs"
    )]
    pub progress_bar_length: usize,
    #[arg(
        long,
        default_value_t = 3,
        help = "Total tries against a rate limited activity API"
    )]
    pub retry_attempts: u32,
    #[arg(
        long,
        default_value_t = 8 * 3600,
        help = "Daily coding goal in seconds, drives the progress bar"
    )]
    pub daily_goal: u64,
    #[arg(
        long,
        default_value_t = 300,
        help = "Maximum heartbeat staleness in seconds to count as actively coding"
    )]
    pub activity_window: u64,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials: Credentials,
    pub update_interval: Duration,
    pub retry_attempts: u32,
    pub activity_window_seconds: u64,
    pub wakatime_base_url: String,
    pub github_status_url: String,
    pub render: RenderConfig,
}

impl Settings {
    /// Builds settings from CLI options and the environment. A `.env` file in
    /// the working directory is honored the same way the environment is.
    pub fn load(options: &UpdaterOptions) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let credentials = Credentials::from_env()?;

        Ok(Self {
            credentials,
            update_interval: Duration::from_secs(options.interval),
            retry_attempts: options.retry_attempts,
            activity_window_seconds: options.activity_window,
            wakatime_base_url: env::var("WAKATIME_API_URL")
                .unwrap_or_else(|_| DEFAULT_WAKATIME_BASE_URL.into()),
            github_status_url: env::var("GITHUB_STATUS_URL")
                .unwrap_or_else(|_| DEFAULT_GITHUB_STATUS_URL.into()),
            render: RenderConfig {
                max_message_length: options.max_status_length,
                progress_bar_width: options.progress_bar_length,
                daily_goal_seconds: options.daily_goal,
                ..RenderConfig::default()
            },
        })
    }
}
