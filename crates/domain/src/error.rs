use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("log io error at {path}: {source}")]
    LogIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DomainError {
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }
}

impl From<csv::Error> for DomainError {
    fn from(err: csv::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
