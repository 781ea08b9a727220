use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::notify;
use crate::sync::{DEFAULT_CALENDAR_API_BASE, DEFAULT_DIRECTORY_API_BASE, GroupPacing, RetryPolicy};

pub const CONFIG_FILE_NAME: &str = "fems.toml";
pub const DATA_DIR_ENV: &str = "FEMS_DATA_DIR";
pub const TIME_ZONE_ENV: &str = "FEMS_TIME_ZONE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroupConfig {
    pub batch_size: usize,
    pub request_delay_ms: u64,
    pub batch_delay_ms: u64,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            request_delay_ms: 100,
            batch_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    pub batch_size: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            batch_size: notify::DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub time_zone: String,
    /// Environment variable holding the bearer token for both Google APIs.
    pub access_token_env: String,
    pub calendar: ApiConfig,
    pub directory: ApiConfig,
    pub retry: RetryConfig,
    pub group: GroupConfig,
    pub notify: NotifyConfig,
}

impl AppConfig {
    /// Reads `path` when it exists, otherwise starts from defaults, then
    /// applies environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)?
        } else {
            Self::default()
        };

        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(tz) = std::env::var(TIME_ZONE_ENV) {
            config.time_zone = tz;
        }

        config.tz()?;
        Ok(config)
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("fems.db")
    }

    pub fn tz(&self) -> Result<Tz> {
        self.time_zone
            .parse()
            .map_err(|_| Error::Config(format!("unknown time zone '{}'", self.time_zone)))
    }

    pub fn access_token(&self) -> Result<String> {
        std::env::var(&self.access_token_env)
            .map_err(|_| Error::Config(format!("{} is not set", self.access_token_env)))
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            Duration::from_millis(self.retry.initial_delay_ms),
        )
    }

    #[must_use]
    pub fn group_pacing(&self) -> GroupPacing {
        GroupPacing {
            batch_size: self.group.batch_size,
            request_delay: Duration::from_millis(self.group.request_delay_ms),
            batch_delay: Duration::from_millis(self.group.batch_delay_ms),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            time_zone: "Asia/Jakarta".to_string(),
            access_token_env: "FEMS_GOOGLE_TOKEN".to_string(),
            calendar: ApiConfig {
                api_base: DEFAULT_CALENDAR_API_BASE.to_string(),
            },
            directory: ApiConfig {
                api_base: DEFAULT_DIRECTORY_API_BASE.to_string(),
            },
            retry: RetryConfig::default(),
            group: GroupConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}
