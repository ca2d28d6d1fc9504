use thiserror::Error;

/// Failures while reading geometry delivered by the API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("malformed WKT at byte {position}: {message}")]
    Parse { position: usize, message: String },
    #[error("unsupported WKT geometry type '{0}'")]
    UnsupportedType(String),
}

impl GeometryError {
    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }
}
