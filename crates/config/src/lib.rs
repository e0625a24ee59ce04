// Configuration loading

pub mod settings;

pub use settings::{
    default_path, load, ConfigError, LogLevel, RetrySettings, Settings,
    DEFAULT_API_URL,
};
