//! Platform-specific readiness backends.
//!
//! This module defines the contract every backend honors and provides
//! one implementation per OS multiplexing facility:
//!
//! - [`KqueuePoller`] on macOS, iOS and FreeBSD,
//! - [`EpollPoller`] on Linux and Android,
//! - [`PollPoller`] on every unix, as a portable fallback,
//! - [`WsaPollPoller`] on Windows.
//!
//! The [`Selector`](crate::Selector) only talks to a backend through
//! [`Poller`]: submitting interest, removing it, and running one wait
//! call. Registration bookkeeping, event coalescing and key lookup are
//! backend agnostic and live in the selector.
//!
//! The default backend for the target is selected at compile time and
//! exported as [`DefaultPoller`].

use crate::interest::Interest;

use std::io;
use std::time::Duration;

pub mod timeout;

#[cfg(unix)]
pub(crate) mod unix;

mod scan;

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
mod kqueue;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod epoll;

#[cfg(unix)]
mod poll;

#[cfg(windows)]
mod wsapoll;

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
pub use kqueue::KqueuePoller;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use epoll::EpollPoller;

#[cfg(unix)]
pub use poll::PollPoller;

#[cfg(windows)]
pub use wsapoll::WsaPollPoller;

/// Backend used by [`Selector`](crate::Selector) when none is named.
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
pub type DefaultPoller = KqueuePoller;

/// Backend used by [`Selector`](crate::Selector) when none is named.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub type DefaultPoller = EpollPoller;

/// Backend used by [`Selector`](crate::Selector) when none is named.
#[cfg(all(
    unix,
    not(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "linux",
        target_os = "android",
    ))
))]
pub type DefaultPoller = PollPoller;

/// Backend used by [`Selector`](crate::Selector) when none is named.
#[cfg(windows)]
pub type DefaultPoller = WsaPollPoller;

/// Raw descriptor type monitored by the selector.
#[cfg(unix)]
pub type RawFd = std::os::fd::RawFd;

/// Raw descriptor type monitored by the selector.
///
/// On Windows only sockets can be monitored.
#[cfg(windows)]
pub type RawFd = std::os::windows::io::RawSocket;

/// Returns `false` for values that can never name an open descriptor.
#[cfg(unix)]
pub(crate) fn is_valid_fd(fd: RawFd) -> bool {
    fd >= 0
}

/// Returns `false` for values that can never name an open descriptor.
#[cfg(windows)]
pub(crate) fn is_valid_fd(fd: RawFd) -> bool {
    fd != windows_sys::Win32::Networking::WinSock::INVALID_SOCKET as RawFd
}

/// One raw readiness record reported by a backend.
///
/// A backend may report the same descriptor several times in a single
/// wait call (kqueue reports one record per filter). The selector merges
/// them before handing results to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    /// Descriptor the record refers to.
    pub fd: RawFd,

    /// Operations the kernel reported as ready.
    pub ready: Interest,
}

/// The contract a readiness backend implements.
///
/// A backend owns at most one kernel multiplexing handle. It keeps no
/// payloads and no keys: it only translates between [`Interest`] and the
/// native event representation and runs the blocking wait.
///
/// Backends are not internally synchronized. All methods take `&mut self`
/// and callers needing cross-thread access must provide their own lock.
pub trait Poller: Sized {
    /// Acquires the kernel handle.
    ///
    /// `max_events` bounds how many raw records a single [`wait`](Self::wait)
    /// call may report. It does not bound how many descriptors can be
    /// registered.
    fn open(max_events: usize) -> io::Result<Self>;

    /// Arms every member of `interest` for `fd` in a single submission.
    ///
    /// Either the whole interest set is armed or, on error, none of it is.
    fn add(&mut self, fd: RawFd, interest: Interest) -> io::Result<()>;

    /// Disarms every member of `interest` for `fd`.
    ///
    /// A descriptor the kernel no longer knows about (for instance because
    /// it was closed while registered) is treated as removed.
    fn remove(&mut self, fd: RawFd, interest: Interest) -> io::Result<()>;

    /// Runs exactly one wait call.
    ///
    /// - `None` blocks until at least one descriptor is ready,
    /// - `Some(Duration::ZERO)` returns immediately,
    /// - any other duration blocks at most that long.
    ///
    /// Raw records are appended to `events`, at most `max_events` of them.
    /// Interrupted waits are reported as errors and not retried.
    fn wait(&mut self, events: &mut Vec<RawEvent>, timeout: Option<Duration>) -> io::Result<()>;

    /// Releases the kernel handle.
    ///
    /// Calling it again is a no-op. Backends also release the handle when
    /// dropped.
    fn close(&mut self) -> io::Result<()>;
}
