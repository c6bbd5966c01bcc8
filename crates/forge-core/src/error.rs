use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("No such command `{name}`. Supported commands are '{}'", known.join("', '"))]
    CommandNotFound { name: String, known: Vec<String> },

    #[error("command '{0}' is not a wizard")]
    NotAWizard(String),

    #[error("invalid stepIndex '{0}': must be a non-negative integer")]
    InvalidStepIndex(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("upstream service error: {0}")]
    Upstream(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ForgeError {
    /// Stable variant name, used as the `type` of diagnostic documents.
    pub fn kind(&self) -> &'static str {
        match self {
            ForgeError::CommandNotFound { .. } => "ForgeError::CommandNotFound",
            ForgeError::NotAWizard(_) => "ForgeError::NotAWizard",
            ForgeError::InvalidStepIndex(_) => "ForgeError::InvalidStepIndex",
            ForgeError::InvalidPayload(_) => "ForgeError::InvalidPayload",
            ForgeError::Configuration(_) => "ForgeError::Configuration",
            ForgeError::Upstream(_) => "ForgeError::Upstream",
            ForgeError::Archive(_) => "ForgeError::Archive",
            ForgeError::Io(_) => "ForgeError::Io",
            ForgeError::Yaml(_) => "ForgeError::Yaml",
            ForgeError::Json(_) => "ForgeError::Json",
        }
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;
