use thiserror::Error;

/// Opaque failure from the record store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("already enrolled in this course")]
    AlreadyEnrolled,
    #[error("not enrolled in this course")]
    NotEnrolled,
    #[error("badge already assigned")]
    AlreadyAssigned,
    #[error("badge not assigned")]
    NotAssigned,
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("administrator role required")]
    Forbidden,
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A multi-step write failed after `step` had already been applied.
    #[error("partially applied after {step}: {source}")]
    PartiallyApplied {
        step: &'static str,
        #[source]
        source: StoreError,
    },
}

impl Error {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Error::Validation(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
