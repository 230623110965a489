use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Config file not found. Checked:\n\
        - CLOUDWEAVE_CONFIG_PATH environment variable\n\
        - current directory: cloudweave.yaml\n\
        - ./.cloudweave/cloudweave.yaml\n\
        - ~/.config/cloudweave/cloudweave.yaml"
    )]
    ConfigFileNotFound,

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Duplicate connection name: {0}")]
    DuplicateConnection(String),

    #[error("Invalid connection {name}: {reason}")]
    InvalidConnection { name: String, reason: String },

    #[error("Invalid waiter setting {name}: {reason}")]
    InvalidWaiter { name: String, reason: String },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
