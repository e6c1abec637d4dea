use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Parsing Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Library Validation Error: {0}")]
    Validation(String),

    /// An external tool ran but reported failure. The message is the tool's own.
    #[error("{tool} failed: {message}")]
    Collaborator { tool: String, message: String },

    #[error("{tool} timed out after {seconds}s")]
    Timeout { tool: String, seconds: u64 },
}

impl ForgeError {
    pub fn collaborator(tool: impl Into<String>, message: impl Into<String>) -> Self {
        ForgeError::Collaborator {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// True for failures raised by synthesis or sequence-optimization tools.
    pub fn is_collaborator(&self) -> bool {
        matches!(
            self,
            ForgeError::Collaborator { .. } | ForgeError::Timeout { .. }
        )
    }
}

pub type ForgeResult<T> = Result<T, ForgeError>;
