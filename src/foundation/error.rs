pub type AlphaVideoResult<T> = Result<T, AlphaVideoError>;

#[derive(thiserror::Error, Debug)]
pub enum AlphaVideoError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("capability error: {0}")]
    Capability(String),

    #[error("shader error: {0}")]
    Shader(String),

    #[error("media error: {0}")]
    Media(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("render error: {0}")]
    Render(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AlphaVideoError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn capability(msg: impl Into<String>) -> Self {
        Self::Capability(msg.into())
    }

    pub fn shader(msg: impl Into<String>) -> Self {
        Self::Shader(msg.into())
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }
}
