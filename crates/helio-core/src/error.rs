use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelioError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Missing config value '{key}' in node '{node}'")]
    MissingValue { node: String, key: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HelioError>;
