use bitflags::bitflags;

bitflags! {
    /// A set of I/O operations on a file descriptor.
    ///
    /// The same type describes both what a caller wants to be notified
    /// about (the interest set of an [`EventKey`](crate::EventKey)) and
    /// what the kernel reported (the readiness set returned by
    /// [`Selector::select`](crate::Selector::select)).
    ///
    /// An interest set handed to the selector must not be empty.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Interest: u8 {
        /// The descriptor can be read without blocking.
        const READ = 0b01;

        /// The descriptor can be written without blocking.
        const WRITE = 0b10;
    }
}

impl Interest {
    /// Returns `true` if the set contains [`Interest::READ`].
    pub fn is_readable(self) -> bool {
        self.contains(Interest::READ)
    }

    /// Returns `true` if the set contains [`Interest::WRITE`].
    pub fn is_writable(self) -> bool {
        self.contains(Interest::WRITE)
    }
}
