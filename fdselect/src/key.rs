use crate::interest::Interest;
use crate::poller::RawFd;

/// A live registration.
///
/// An `EventKey` binds a file descriptor to the interest set it was
/// registered with and to an opaque payload owned by the caller.
/// The selector stores the payload and hands it back verbatim; it never
/// inspects or mutates it.
///
/// Keys are immutable. Changing the interest set of a descriptor means
/// unregistering it and registering it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventKey<T> {
    /// The monitored file descriptor.
    fd: RawFd,

    /// Operations the caller wants to be notified about.
    interest: Interest,

    /// Caller payload.
    data: T,
}

impl<T> EventKey<T> {
    pub(crate) fn new(fd: RawFd, interest: Interest, data: T) -> Self {
        Self { fd, interest, data }
    }

    /// Returns the registered file descriptor.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Returns the interest set the descriptor was registered with.
    pub fn interest(&self) -> Interest {
        self.interest
    }

    /// Returns a reference to the caller payload.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Consumes the key and returns the caller payload.
    pub fn into_data(self) -> T {
        self.data
    }
}
