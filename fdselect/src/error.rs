use crate::poller::RawFd;

use std::fmt;
use std::io;

/// Errors returned by a [`Selector`](crate::Selector).
///
/// Caller mistakes (`DuplicateRegistration`, `NotFound`, ...) are reported
/// without touching the kernel. Syscall failures are wrapped in
/// [`Error::Os`] and keep the platform error code.
#[derive(Debug)]
pub enum Error {
    /// The descriptor already has a live registration.
    DuplicateRegistration(RawFd),

    /// The descriptor has no live registration.
    NotFound(RawFd),

    /// The interest set was empty.
    InvalidInterest,

    /// The value cannot name an open descriptor.
    InvalidDescriptor(RawFd),

    /// The selector was closed.
    Closed,

    /// A kernel resource or syscall failed.
    Os(io::Error),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the platform error code if this is an [`Error::Os`].
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Os(err) => err.raw_os_error(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DuplicateRegistration(fd) => write!(f, "descriptor {fd} is already registered"),
            Error::NotFound(fd) => write!(f, "descriptor {fd} is not registered"),
            Error::InvalidInterest => f.write_str("interest set must not be empty"),
            Error::InvalidDescriptor(fd) => write!(f, "invalid descriptor {fd}"),
            Error::Closed => f.write_str("selector is closed"),
            Error::Os(err) => write!(f, "os error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Os(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Os(err)
    }
}
