#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("Failed to access store file `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed store data: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    BackendError(#[from] diesel::result::Error),

    #[error("Database connection unavailable: {message}")]
    Connection { message: String },

    #[error("Internal store error: {message}")]
    InternalError { message: String },
}

impl StoreError {
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string_lossy().to_string(),
            source,
        }
    }
}
