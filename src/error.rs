use thiserror::Error;

#[derive(Error, Debug)]
pub enum GpError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Genotype error: {0}")]
    Genotype(String),

    #[error("Unbound sensor: {0}")]
    UnboundSensor(String),

    #[error("Evaluation error: {0}")]
    Evaluation(#[source] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("Config source error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, GpError>;
