mod app;

pub use app::{
    ApiConfig, AppConfig, CONFIG_FILE_NAME, DATA_DIR_ENV, GroupConfig, NotifyConfig, RetryConfig,
    TIME_ZONE_ENV,
};
