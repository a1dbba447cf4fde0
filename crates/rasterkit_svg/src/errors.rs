//! Error results that can be returned from the SVG service
use std::io;
use thiserror::Error;

/// Coarse classification of an [`SvgError`], for callers that branch on the failure type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidEncoding,
    CompressionError,
    ElementLimitExceeded,
    InvalidSize,
    MalformedDocument,
    InvalidHandle,
}

/// Every failure of the parser, rasterizer and registry. Each variant carries a readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SvgError {
    #[error("{0}")]
    InvalidEncoding(String),

    #[error("{0}")]
    CompressionError(String),

    #[error("{0}")]
    ElementLimitExceeded(String),

    #[error("{0}")]
    InvalidSize(String),

    #[error("{0}")]
    MalformedDocument(String),

    #[error("invalid document handle: {0}")]
    InvalidHandle(String),
}

impl SvgError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidEncoding(_) => ErrorKind::InvalidEncoding,
            Self::CompressionError(_) => ErrorKind::CompressionError,
            Self::ElementLimitExceeded(_) => ErrorKind::ElementLimitExceeded,
            Self::InvalidSize(_) => ErrorKind::InvalidSize,
            Self::MalformedDocument(_) => ErrorKind::MalformedDocument,
            Self::InvalidHandle(_) => ErrorKind::InvalidHandle,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidEncoding(msg)
            | Self::CompressionError(msg)
            | Self::ElementLimitExceeded(msg)
            | Self::InvalidSize(msg)
            | Self::MalformedDocument(msg)
            | Self::InvalidHandle(msg) => msg,
        }
    }
}

impl From<resvg::usvg::Error> for SvgError {
    fn from(err: resvg::usvg::Error) -> Self {
        use resvg::usvg::Error as E;

        match err {
            E::NotAnUtf8Str => Self::InvalidEncoding("Only UTF-8 content is supported".into()),
            E::MalformedGZip => {
                Self::CompressionError("Compressed SVG must use the GZip algorithm".into())
            }
            E::ElementsLimitReached => {
                Self::ElementLimitExceeded("SVG element limit exceeded".into())
            }
            E::InvalidSize => Self::InvalidSize("Invalid size".into()),
            other => Self::MalformedDocument(format!("Failed to parse SVG data: {other}")),
        }
    }
}

/// Image loaders report failures as I/O errors. The original error stays reachable through
/// `io::Error::get_ref()`.
impl From<SvgError> for io::Error {
    fn from(err: SvgError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}
