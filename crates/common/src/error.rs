use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClickrushError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type ClickrushResult<T> = Result<T, ClickrushError>;
