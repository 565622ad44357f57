//! Unified error type.
//!
//! Every participant in a pipeline fails the same way: by returning an
//! [`Error`]. Interceptors that want to say *where* a failure came from wrap
//! it with [`Error::interceptor`]; that annotation never hides the original
//! cause, which stays reachable through [`Error::root`] and
//! [`Error::downcast_ref`].

use std::error::Error as StdError;

/// A type-erased error produced by application code.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// `Result` alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned by handlers, interceptors and pipelines.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The execution context was cancelled.
    #[error("context cancelled")]
    Cancelled,

    /// The execution context's deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// An error annotated with the name of the interceptor that observed it.
    #[error("interceptor[{name}]: {source}")]
    Interceptor {
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// A handler or interceptor panicked and the panic was caught.
    #[error("panicked: {0}")]
    Panicked(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    #[error("config: {0}")]
    Config(#[from] config::ConfigError),

    /// Any application error.
    #[error(transparent)]
    Other(#[from] BoxError),
}

impl Error {
    /// Wraps an application error.
    ///
    /// ```rust
    /// use interpose::Error;
    ///
    /// let err = Error::new("unauthorized");
    /// assert_eq!(err.to_string(), "unauthorized");
    /// ```
    pub fn new(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }

    /// Annotates `err` with the name of the interceptor that produced or
    /// observed it.
    pub fn interceptor(name: impl Into<String>, err: Error) -> Self {
        Self::Interceptor { name: name.into(), source: Box::new(err) }
    }

    /// The outermost interceptor name, if this error carries an annotation.
    pub fn interceptor_name(&self) -> Option<&str> {
        match self {
            Self::Interceptor { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Peels every interceptor annotation and returns the original error.
    pub fn root(&self) -> &Error {
        let mut cur = self;
        while let Self::Interceptor { source, .. } = cur {
            cur = source;
        }
        cur
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled)
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self.root(), Self::DeadlineExceeded)
    }

    /// Finds an error of type `E` below any annotations, following the
    /// `source()` chain of the wrapped error.
    ///
    /// ```rust
    /// use interpose::Error;
    ///
    /// #[derive(Debug)]
    /// struct Denied;
    /// impl std::fmt::Display for Denied {
    ///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    ///         f.write_str("denied")
    ///     }
    /// }
    /// impl std::error::Error for Denied {}
    ///
    /// let err = Error::interceptor("auth", Error::new(Denied));
    /// assert!(err.downcast_ref::<Denied>().is_some());
    /// ```
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let mut cur: Option<&(dyn StdError + 'static)> = match self.root() {
            Self::Other(err) => Some(err.as_ref()),
            Self::Io(err) => Some(err),
            Self::Addr(err) => Some(err),
            Self::Config(err) => Some(err),
            _ => None,
        };
        while let Some(err) = cur {
            if let Some(found) = err.downcast_ref::<E>() {
                return Some(found);
            }
            cur = err.source();
        }
        None
    }
}
