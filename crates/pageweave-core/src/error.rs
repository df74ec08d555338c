use crate::template::TemplateError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageweaveError {
    // Config errors
    #[error("CONFIG_NOT_FOUND: pageweave.toml not found in current or parent directories")]
    ConfigNotFound,

    #[error("CONFIG_PARSE_ERROR: {0}")]
    ConfigParseError(String),

    #[error("CONFIG_INVALID_VALUE: {field}: {reason}")]
    ConfigInvalidValue { field: String, reason: String },

    // Template corpus errors
    #[error("TEMPLATE_ROOT_NOT_FOUND: template root '{}' does not exist", path.display())]
    TemplateRootNotFound { path: PathBuf },

    #[error("TEMPLATE_ERROR: {0}")]
    Template(#[from] TemplateError),

    // Data errors
    #[error("CONTEXT_INVALID: {0}")]
    ContextInvalid(String),

    // IO errors
    #[error("IO_ERROR: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for PageweaveError {
    fn from(err: serde_json::Error) -> Self {
        PageweaveError::ContextInvalid(format!("JSON error: {}", err))
    }
}

impl From<toml::de::Error> for PageweaveError {
    fn from(err: toml::de::Error) -> Self {
        PageweaveError::ConfigParseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PageweaveError>;
