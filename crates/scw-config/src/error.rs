use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration directory not found")]
    ConfigDirNotFound,

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("profile {0:?} not found in the config file")]
    ProfileNotFound(String),

    #[error("invalid access key {0:?}: expected SCW followed by 17 uppercase letters or digits")]
    InvalidAccessKey(String),

    #[error("{key} must be a UUID, got {value:?}")]
    InvalidUuid { key: &'static str, value: String },

    #[error("{key}: {source}")]
    InvalidLocality {
        key: &'static str,
        #[source]
        source: scw_core::CoreError,
    },

    #[error("zone {zone} is not in region {region}")]
    ZoneRegionMismatch { zone: String, region: String },

    #[error("{0} is required: set it in the provider block, in SCW_{1} or in a profile")]
    MissingCredential(&'static str, &'static str),

    #[error("invalid SCW_WAIT_RETRY_INTERVAL: {0}")]
    InvalidRetryInterval(#[source] scw_core::CoreError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
