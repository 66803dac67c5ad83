//! The selector: registration table plus select loop.
//!
//! A [`Selector`] owns one backend ([`Poller`]) and the table of live
//! [`EventKey`]s. Everything here is backend agnostic:
//!
//! - registration validates the request, submits it to the backend, and
//!   only then records the key, so the table never claims a descriptor
//!   the kernel did not accept;
//! - unregistration removes the key only once the backend confirmed the
//!   removal, so a failed call leaves the descriptor registered;
//! - a select call runs one backend wait, merges the raw records per
//!   descriptor and joins them back to their keys.
//!
//! # Concurrency
//!
//! The selector has no internal locking and never spawns threads. Every
//! operation takes `&mut self`, and the pairs returned by
//! [`Selector::select`] borrow the selector. The borrow checker therefore
//! rules out registering, unregistering or closing while a select call is
//! blocked or while its results are alive. Sharing a selector between
//! threads requires an external lock such as a `Mutex`.
//!
//! # Stale events
//!
//! A record whose descriptor has no live key by the time it is joined
//! against the table is dropped, never reported.

use crate::builder::DEFAULT_MAX_EVENTS;
use crate::error::{Error, Result};
use crate::interest::Interest;
use crate::key::EventKey;
use crate::poller::{DefaultPoller, Poller, RawEvent, RawFd, is_valid_fd};
use crate::table::RegistrationTable;

use log::{debug, trace, warn};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Closed,
}

/// Blocks a thread until registered descriptors become ready.
///
/// `T` is the caller payload stored in every [`EventKey`]. `P` is the
/// readiness backend and defaults to the best one for the target.
///
/// The kernel handle is acquired on construction and released either by
/// [`close`](Self::close) or when the selector is dropped.
///
/// # Examples
///
/// ```no_run
/// use fdselect::{Interest, Selector};
/// use std::net::TcpListener;
/// use std::os::fd::AsRawFd;
/// use std::time::Duration;
///
/// let listener = TcpListener::bind("127.0.0.1:0")?;
/// let mut selector = Selector::new()?;
///
/// selector.register(listener.as_raw_fd(), Interest::READ, "listener")?;
///
/// for (key, ready) in selector.select(Some(Duration::from_secs(1)))? {
///     println!("{} is ready for {:?}", key.data(), ready);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Selector<T, P: Poller = DefaultPoller> {
    /// Backend owning the kernel handle.
    poller: P,

    /// Live registrations.
    table: RegistrationTable<T>,

    /// Raw records of the last wait call.
    events: Vec<RawEvent>,

    /// Upper bound on records reported by one wait call.
    max_events: usize,

    state: State,
}

impl<T> Selector<T> {
    /// Creates a selector on the default backend with room for
    /// [`DEFAULT_MAX_EVENTS`] events per call.
    pub fn new() -> Result<Self> {
        Self::with_poller(DEFAULT_MAX_EVENTS)
    }

    /// Creates a selector on the default backend reporting at most
    /// `max_events` events per call.
    ///
    /// # Panics
    ///
    /// Panics if `max_events == 0`.
    pub fn with_max_events(max_events: usize) -> Result<Self> {
        Self::with_poller(max_events)
    }
}

impl<T, P: Poller> Selector<T, P> {
    /// Creates a selector on backend `P`.
    ///
    /// `max_events` bounds how many events a single [`select`](Self::select)
    /// call reports. It does not limit how many descriptors can be
    /// registered.
    ///
    /// # Panics
    ///
    /// Panics if `max_events == 0`.
    pub fn with_poller(max_events: usize) -> Result<Self> {
        assert!(max_events > 0, "max_events must be > 0");

        let poller = P::open(max_events)?;
        debug!("selector opened, max_events = {max_events}");

        Ok(Self {
            poller,
            table: RegistrationTable::new(),
            events: Vec::with_capacity(max_events),
            max_events,
            state: State::Open,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            State::Open => Ok(()),
            State::Closed => Err(Error::Closed),
        }
    }

    /// Starts monitoring `fd` for the operations in `interest`.
    ///
    /// The key is recorded only after the backend accepted every member of
    /// the interest set. On error the table is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInterest`] if `interest` is empty,
    /// - [`Error::InvalidDescriptor`] if `fd` cannot name a descriptor,
    /// - [`Error::DuplicateRegistration`] if `fd` is already registered,
    /// - [`Error::Os`] if the kernel rejected the registration,
    /// - [`Error::Closed`] after [`close`](Self::close).
    pub fn register(&mut self, fd: RawFd, interest: Interest, data: T) -> Result<&EventKey<T>> {
        self.ensure_open()?;

        if interest.is_empty() {
            return Err(Error::InvalidInterest);
        }
        if !is_valid_fd(fd) {
            return Err(Error::InvalidDescriptor(fd));
        }
        if self.table.contains(fd) {
            return Err(Error::DuplicateRegistration(fd));
        }

        self.poller.add(fd, interest)?;
        debug!("registered {fd} for {interest:?}");

        self.table
            .insert(EventKey::new(fd, interest, data))
            .ok_or(Error::DuplicateRegistration(fd))
    }

    /// Stops monitoring `fd` and returns its key.
    ///
    /// The key is removed from the table only after the backend confirmed
    /// the removal; if that fails the descriptor stays registered. A
    /// descriptor closed while registered can still be unregistered.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if `fd` is not registered,
    /// - [`Error::Os`] if the kernel rejected the removal,
    /// - [`Error::Closed`] after [`close`](Self::close).
    pub fn unregister(&mut self, fd: RawFd) -> Result<EventKey<T>> {
        self.ensure_open()?;

        let interest = self
            .table
            .get(fd)
            .map(EventKey::interest)
            .ok_or(Error::NotFound(fd))?;

        self.poller.remove(fd, interest)?;
        debug!("unregistered {fd}");

        self.table.remove(fd).ok_or(Error::NotFound(fd))
    }

    /// Replaces the registration of `fd` with a new interest set and payload.
    ///
    /// Keys are never updated in place: this unregisters `fd` and registers
    /// it again. If the second step fails, `fd` ends up unregistered.
    pub fn modify(&mut self, fd: RawFd, interest: Interest, data: T) -> Result<&EventKey<T>> {
        self.ensure_open()?;

        if interest.is_empty() {
            return Err(Error::InvalidInterest);
        }

        self.unregister(fd)?;
        self.register(fd, interest, data)
    }

    /// Waits until registered descriptors are ready, or the timeout elapses.
    ///
    /// - `None` blocks until at least one descriptor is ready,
    /// - `Some(Duration::ZERO)` polls without blocking,
    /// - any other duration blocks at most that long.
    ///
    /// Returns one `(key, readiness)` pair per ready descriptor, in no
    /// particular order. The readiness set is never empty and never holds
    /// operations outside the key's interest set. At most
    /// [`max_events`](Self::max_events) descriptors are reported; the rest
    /// are reported by a later call. Readiness is level-triggered, so a
    /// descriptor that stays ready is reported again on the next call.
    ///
    /// Interrupted waits fail with [`Error::Os`] and are not retried.
    pub fn select(&mut self, timeout: Option<Duration>) -> Result<Vec<(&EventKey<T>, Interest)>> {
        self.ensure_open()?;

        self.events.clear();
        self.poller.wait(&mut self.events, timeout)?;

        let ready = coalesce(&self.events);
        trace!(
            "select: {} raw events for {} descriptors",
            self.events.len(),
            ready.len()
        );

        let mut selected = Vec::with_capacity(ready.len());

        for (fd, ready) in ready {
            let Some(key) = self.table.get(fd) else {
                trace!("dropping event for unregistered {fd}");
                continue;
            };

            let ready = ready & key.interest();
            if !ready.is_empty() {
                selected.push((key, ready));
            }
        }

        Ok(selected)
    }

    /// Returns the key registered for `fd`, if any.
    ///
    /// This never touches the kernel. It returns `None` after
    /// [`close`](Self::close).
    pub fn lookup(&self, fd: RawFd) -> Option<&EventKey<T>> {
        self.table.get(fd)
    }

    /// Iterates over the live keys in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &EventKey<T>> {
        self.table.iter()
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if no descriptor is registered.
    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Upper bound on descriptors reported by one [`select`](Self::select).
    pub fn max_events(&self) -> usize {
        self.max_events
    }

    /// Returns `true` once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    /// Releases the kernel handle and forgets every registration.
    ///
    /// Calling it more than once is a no-op. Failures to release the handle
    /// are logged and otherwise ignored. Every later operation fails with
    /// [`Error::Closed`].
    pub fn close(&mut self) {
        if self.state == State::Closed {
            return;
        }

        self.state = State::Closed;
        self.table.clear();
        self.events.clear();

        if let Err(err) = self.poller.close() {
            warn!("failed to release selector handle: {err}");
        }

        debug!("selector closed");
    }
}

impl<T, P: Poller> Drop for Selector<T, P> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Merges raw records so each descriptor appears once.
///
/// The readiness sets of records sharing a descriptor are combined. The
/// order of first appearance is kept.
fn coalesce(events: &[RawEvent]) -> Vec<(RawFd, Interest)> {
    let mut ready: Vec<(RawFd, Interest)> = Vec::with_capacity(events.len());
    let mut slots: HashMap<RawFd, usize> = HashMap::with_capacity(events.len());

    for event in events {
        match slots.entry(event.fd) {
            Entry::Occupied(slot) => ready[*slot.get()].1 |= event.ready,
            Entry::Vacant(slot) => {
                slot.insert(ready.len());
                ready.push((event.fd, event.ready));
            }
        }
    }

    ready
}
