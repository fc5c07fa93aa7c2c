use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed cascade xml: {0}")]
    Xml(#[from] quick_xml::DeError),
    #[error("invalid cascade: {0}")]
    Cascade(String),
    #[error("invalid detector parameters: {0}")]
    Parameters(String),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl VisionError {
    pub fn cascade<T: Into<String>>(message: T) -> Self {
        Self::Cascade(message.into())
    }
}
