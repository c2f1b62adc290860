use anyhow::Result;
use std::time::Duration;

/// Runtime configuration, loaded once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,

    // Search and queue limits
    pub search_results: usize,
    pub max_queue_size: usize,

    // Auto-leave grace periods, in seconds
    pub membership_grace_secs: u64,
    pub stop_grace_secs: u64,
    pub queue_end_grace_secs: u64,

    // Extractor
    pub ytdlp_bin: String,
    pub ytdlp_socket_timeout: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN")?,
            command_prefix: std::env::var("COMMAND_PREFIX")
                .unwrap_or_else(|_| "!".to_string()),

            search_results: std::env::var("SEARCH_RESULTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,

            membership_grace_secs: std::env::var("MEMBERSHIP_GRACE_SECS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()?,
            stop_grace_secs: std::env::var("STOP_GRACE_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            queue_end_grace_secs: std::env::var("QUEUE_END_GRACE_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()?,

            ytdlp_bin: std::env::var("YTDLP_BIN")
                .unwrap_or_else(|_| "yt-dlp".to_string()),
            ytdlp_socket_timeout: std::env::var("YTDLP_SOCKET_TIMEOUT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Sanity checks on loaded values, run before the bot starts.
    pub fn validate(&self) -> Result<()> {
        if self.command_prefix.is_empty() {
            anyhow::bail!("Command prefix must not be empty");
        }

        // Discord caps a component row at 5 buttons; the picker uses one row
        // per result up to the message limit of 5 rows of 5.
        if self.search_results == 0 || self.search_results > 25 {
            anyhow::bail!(
                "Search result count must be between 1 and 25, got: {}",
                self.search_results
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.ytdlp_socket_timeout == 0 {
            anyhow::bail!("Extractor socket timeout must be greater than 0");
        }

        Ok(())
    }

    pub fn membership_grace(&self) -> Duration {
        Duration::from_secs(self.membership_grace_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    pub fn queue_end_grace(&self) -> Duration {
        Duration::from_secs(self.queue_end_grace_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            command_prefix: "!".to_string(),

            search_results: 5,
            max_queue_size: 1000,

            membership_grace_secs: 1,
            stop_grace_secs: 5,
            queue_end_grace_secs: 15,

            ytdlp_bin: "yt-dlp".to_string(),
            ytdlp_socket_timeout: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_pass_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.membership_grace(), Duration::from_secs(1));
        assert_eq!(config.stop_grace(), Duration::from_secs(5));
        assert_eq!(config.queue_end_grace(), Duration::from_secs(15));
    }

    #[test]
    fn rejects_empty_prefix() {
        let config = Config {
            command_prefix: String::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_oversized_search_count() {
        let config = Config {
            search_results: 26,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
