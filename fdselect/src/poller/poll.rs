//! Portable `poll(2)`-based backend.
//!
//! `poll` keeps no state in the kernel, so this backend owns the
//! `pollfd` array itself and hands the whole array to every wait call.
//! There is no kernel handle to acquire or release; `close` simply
//! forgets every registration.
//!
//! Because `poll` reports every ready descriptor at once, the per-call
//! limit is applied here through a [`RotatingScan`], so descriptors that
//! did not fit in one call are reported first on the next one.
//!
//! A descriptor closed while registered makes `poll` return `POLLNVAL`
//! for it immediately on every call. Such an entry is disabled the first
//! time it is seen, and the wait is resumed for the rest of the timeout.

use super::scan::RotatingScan;
use super::timeout::to_millis;
use super::unix::{cvt, sys_check_fd};
use super::{Poller, RawEvent};
use crate::interest::Interest;

use libc::{POLLERR, POLLHUP, POLLIN, POLLNVAL, POLLOUT, c_short, nfds_t, poll, pollfd};
use log::debug;
use std::collections::HashMap;
use std::io;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

/// `poll(2)` poller available on every unix.
pub struct PollPoller {
    /// Entries handed to `poll`, in registration order.
    fds: Vec<pollfd>,

    /// Registered descriptor of each entry in `fds`. Differs from the
    /// entry's own `fd` once the entry was disabled.
    owners: Vec<RawFd>,

    /// Position of each descriptor inside `fds`.
    index: HashMap<RawFd, usize>,

    scan: RotatingScan,

    /// Upper bound on records returned by one wait call.
    max_events: usize,

    closed: bool,
}

impl PollPoller {
    /// Translates an interest set into a `poll` event mask.
    fn mask(interest: Interest) -> c_short {
        let mut flags = 0;

        if interest.is_readable() {
            flags |= POLLIN;
        }
        if interest.is_writable() {
            flags |= POLLOUT;
        }

        flags
    }

    /// Translates `revents` back into a readiness set.
    fn readiness(revents: c_short) -> Interest {
        let mut ready = Interest::empty();

        if revents & (POLLIN | POLLERR | POLLHUP) != 0 {
            ready |= Interest::READ;
        }
        if revents & (POLLOUT | POLLERR | POLLHUP) != 0 {
            ready |= Interest::WRITE;
        }

        ready
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed {
            Err(io::Error::from_raw_os_error(libc::EBADF))
        } else {
            Ok(())
        }
    }
}

impl Poller for PollPoller {
    fn open(max_events: usize) -> io::Result<Self> {
        Ok(Self {
            fds: Vec::new(),
            owners: Vec::new(),
            index: HashMap::new(),
            scan: RotatingScan::new(),
            max_events,
            closed: false,
        })
    }

    /// Records the descriptor after checking that it is open.
    fn add(&mut self, fd: RawFd, interest: Interest) -> io::Result<()> {
        self.ensure_open()?;
        sys_check_fd(fd)?;

        if self.index.contains_key(&fd) {
            return Err(io::Error::from_raw_os_error(libc::EEXIST));
        }

        self.index.insert(fd, self.fds.len());
        self.owners.push(fd);
        self.fds.push(pollfd {
            fd,
            events: Self::mask(interest),
            revents: 0,
        });

        Ok(())
    }

    fn remove(&mut self, fd: RawFd, _interest: Interest) -> io::Result<()> {
        self.ensure_open()?;

        if let Some(pos) = self.index.remove(&fd) {
            self.fds.swap_remove(pos);
            self.owners.swap_remove(pos);

            if let Some(&moved) = self.owners.get(pos) {
                self.index.insert(moved, pos);
            }
        }

        Ok(())
    }

    fn wait(&mut self, events: &mut Vec<RawEvent>, timeout: Option<Duration>) -> io::Result<()> {
        self.ensure_open()?;

        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut remaining = timeout;

        loop {
            for pfd in self.fds.iter_mut() {
                pfd.revents = 0;
            }

            let n = cvt(unsafe {
                poll(
                    self.fds.as_mut_ptr(),
                    self.fds.len() as nfds_t,
                    to_millis(remaining),
                )
            })?;

            if n == 0 {
                return Ok(());
            }

            let reported = events.len();
            let mut disabled = false;

            let fds = &mut self.fds;
            let owners = &self.owners;

            self.scan.scan(fds.len(), self.max_events, events, |pos| {
                let pfd = &mut fds[pos];

                if pfd.revents & POLLNVAL != 0 {
                    debug!("descriptor {} is no longer open, disabling it", owners[pos]);
                    pfd.fd = -1;
                    disabled = true;
                    return None;
                }

                let ready = Self::readiness(pfd.revents);
                (!ready.is_empty()).then_some(RawEvent {
                    fd: owners[pos],
                    ready,
                })
            });

            if events.len() > reported || !disabled {
                return Ok(());
            }

            if let Some(deadline) = deadline {
                remaining = Some(deadline.saturating_duration_since(Instant::now()));
            }
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        self.fds.clear();
        self.owners.clear();
        self.index.clear();

        Ok(())
    }
}
