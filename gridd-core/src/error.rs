use thiserror::Error;

/// Errors detected while reading or validating configuration, before any
/// network action is taken. Always fatal to bootstrap.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("missing required setting: {key}")]
    MissingRequiredSetting { key: &'static str },

    #[error("invalid value for {key}: {message}")]
    InvalidSetting { key: &'static str, message: String },

    #[error("security is enabled but {field} is not set")]
    MissingSecurityMaterial { field: &'static str },

    #[error("discovery target incomplete: {field} is not set")]
    MissingDiscoveryTarget { field: &'static str },
}

/// Errors raised while starting the grid runtime or wiring services onto it.
/// Always fatal; any partially started resources are released before one of
/// these propagates.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("grid runtime failed to start")]
    StartFailure {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("cluster activation rejected")]
    ActivationFailure {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("dependent service '{service}' requires a started grid instance")]
    DependencyNotReady { service: &'static str },
}

#[derive(Error, Debug)]
pub enum GriddError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("grid runtime operation failed")]
    Runtime {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type GriddResult<T> = std::result::Result<T, GriddError>;
