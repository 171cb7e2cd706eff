pub mod catalog;
pub mod config;
pub mod doi;
pub mod health;
pub mod io;
pub mod matcher;
pub mod names;
pub mod normalizer;
pub mod similarity;
pub mod testing;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use health::{HealthConfig, HealthError, HealthMonitor};
pub use matcher::{
    InputRecord, MatchEngine, MatchError, MatchMode, MatchStatus, MatchingConfig, TitleMatch,
};
