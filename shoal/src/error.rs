use thiserror::Error;

/// The error type reported by explicit validation passes.
///
/// Invariant violations detected during normal operation are programming
/// errors and abort via panics; this type only describes findings of
/// [`validate`](crate::container::Container::validate)-style integrity
/// checks invoked by callers or test harnesses.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn cardinality_mismatch(cached: u32, actual: u32) -> Error {
        ErrorKind::CardinalityMismatch { cached, actual }.into()
    }

    pub fn storage_bound(detail: impl Into<String>) -> Error {
        ErrorKind::StorageBound {
            detail: detail.into(),
        }
        .into()
    }

    pub fn under_threshold(cardinality: u32) -> Error {
        ErrorKind::UnderThreshold { cardinality }.into()
    }

    pub fn unordered(container: impl Into<String>, detail: impl Into<String>) -> Error {
        ErrorKind::Unordered {
            container: container.into(),
            detail: detail.into(),
        }
        .into()
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("cached cardinality {cached} does not match true population count {actual}")]
    CardinalityMismatch { cached: u32, actual: u32 },

    #[error("container storage exceeds its fixed bound: {detail}")]
    StorageBound { detail: String },

    #[error("bitmap container holds {cardinality} values, at or below the array threshold")]
    UnderThreshold { cardinality: u32 },

    #[error("{container} container violates ordering: {detail}")]
    Unordered { container: String, detail: String },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}
