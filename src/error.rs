use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad construction arguments: fewer than two widths, or a zero width.
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// Two vectors/matrices that must agree in length do not.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A file or stream could not be opened, read or written.
    #[error("{context}: {source}")]
    Persistence {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A persisted model is malformed or was produced for a different network.
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn persistence(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Persistence {
            context: context.into(),
            source,
        }
    }
}
