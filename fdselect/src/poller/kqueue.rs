//! macOS/FreeBSD `kqueue`-based backend.
//!
//! kqueue tracks read and write readiness with two independent filters,
//! `EVFILT_READ` and `EVFILT_WRITE`. Registering a descriptor therefore
//! emits one change per member of the interest set. All changes of one
//! registration are submitted in a single `kevent` call with
//! `EV_RECEIPT`, which makes the kernel report the outcome of every
//! change individually instead of stopping at the first failure.
//!
//! A wait call may return two records for the same descriptor (one per
//! filter). They are reported as-is; the selector coalesces them.
//!
//! Filters are added without `EV_CLEAR`, so notifications are
//! level-triggered.

use super::timeout::to_timespec;
use super::unix::{cvt, is_gone, sys_close, sys_set_cloexec};
use super::{Poller, RawEvent};
use crate::interest::Interest;

use libc::{
    EV_ADD, EV_DELETE, EV_ERROR, EV_RECEIPT, EVFILT_READ, EVFILT_WRITE, kevent, kqueue,
};
use log::{debug, warn};
use std::io;
use std::mem;
use std::os::fd::RawFd;
use std::ptr;
use std::time::Duration;

/// kqueue poller.
///
/// This poller owns:
/// - a `kqueue` descriptor (the kernel handle),
/// - a reusable buffer of `kevent` records sized to the per-call event
///   limit.
pub struct KqueuePoller {
    /// kqueue descriptor, `None` once closed.
    kq: Option<RawFd>,

    /// Reusable buffer for reported events.
    events: Vec<libc::kevent>,

    /// Upper bound on records returned by one wait call.
    max_events: usize,
}

// `udata` is never set, so the raw pointer inside `kevent` never
// refers to anything.
unsafe impl Send for KqueuePoller {}

/// Builds a change record for `fd`.
fn change(fd: RawFd, filter: i16, flags: u16) -> libc::kevent {
    let mut ev: libc::kevent = unsafe { mem::zeroed() };

    ev.ident = fd as libc::uintptr_t;
    ev.filter = filter;
    ev.flags = flags;

    ev
}

/// Returns the errno carried by a receipt, if the change failed.
fn receipt_error(ev: &libc::kevent) -> Option<io::Error> {
    if ev.flags & EV_ERROR != 0 && ev.data != 0 {
        Some(io::Error::from_raw_os_error(ev.data as i32))
    } else {
        None
    }
}

impl KqueuePoller {
    /// Translates an interest set into the filters that implement it.
    fn filters(interest: Interest) -> impl Iterator<Item = i16> {
        let read = interest.is_readable().then_some(EVFILT_READ);
        let write = interest.is_writable().then_some(EVFILT_WRITE);

        read.into_iter().chain(write)
    }

    /// Translates a reported filter back into a readiness set.
    fn readiness(filter: i16) -> Interest {
        match filter {
            EVFILT_READ => Interest::READ,
            EVFILT_WRITE => Interest::WRITE,
            _ => Interest::empty(),
        }
    }

    fn handle(&self) -> io::Result<RawFd> {
        self.kq
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EBADF))
    }

    /// Submits `changes` in one `kevent` call.
    ///
    /// On return every entry of `changes` holds the kernel's receipt for
    /// the corresponding change.
    fn submit(kq: RawFd, changes: &mut [libc::kevent]) -> io::Result<()> {
        let len = changes.len();
        let list = changes.as_mut_ptr();

        let n = cvt(unsafe { kevent(kq, list, len as _, list, len as _, ptr::null()) })?;

        if (n as usize) < len {
            // Receipts are only missing if the kernel gave up mid-batch.
            return Err(io::Error::other(
                "kevent returned fewer receipts than changes",
            ));
        }

        Ok(())
    }
}

impl Poller for KqueuePoller {
    /// Creates the kqueue and marks it close-on-exec.
    fn open(max_events: usize) -> io::Result<Self> {
        let kq = cvt(unsafe { kqueue() })?;

        if let Err(err) = sys_set_cloexec(kq) {
            let _ = sys_close(kq);
            return Err(err);
        }

        debug!("kqueue {kq} created");

        Ok(Self {
            kq: Some(kq),
            events: Vec::with_capacity(max_events),
            max_events,
        })
    }

    /// Adds one filter per interest member.
    ///
    /// If the kernel accepts some filters and rejects others, the accepted
    /// ones are deleted again before the first error is returned.
    fn add(&mut self, fd: RawFd, interest: Interest) -> io::Result<()> {
        let kq = self.handle()?;

        let mut changes: Vec<libc::kevent> = Self::filters(interest)
            .map(|filter| change(fd, filter, EV_ADD | EV_RECEIPT))
            .collect();

        Self::submit(kq, &mut changes)?;

        let Some(err) = changes.iter().find_map(receipt_error) else {
            return Ok(());
        };

        let mut rollback: Vec<libc::kevent> = changes
            .iter()
            .filter(|ev| receipt_error(ev).is_none())
            .map(|ev| change(fd, ev.filter, EV_DELETE | EV_RECEIPT))
            .collect();

        if !rollback.is_empty() {
            if let Err(rollback_err) = Self::submit(kq, &mut rollback) {
                warn!("failed to roll back partial registration of {fd}: {rollback_err}");
            }
        }

        Err(err)
    }

    /// Deletes one filter per interest member.
    ///
    /// Filters the kernel already dropped (`ENOENT`, or `EBADF` because the
    /// descriptor was closed) count as deleted.
    fn remove(&mut self, fd: RawFd, interest: Interest) -> io::Result<()> {
        let kq = self.handle()?;

        let mut changes: Vec<libc::kevent> = Self::filters(interest)
            .map(|filter| change(fd, filter, EV_DELETE | EV_RECEIPT))
            .collect();

        match Self::submit(kq, &mut changes) {
            Err(err) if is_gone(&err) => return Ok(()),
            result => result?,
        }

        match changes
            .iter()
            .filter_map(receipt_error)
            .find(|err| !is_gone(err))
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn wait(&mut self, events: &mut Vec<RawEvent>, timeout: Option<Duration>) -> io::Result<()> {
        let kq = self.handle()?;

        let timeout = timeout.map(to_timespec);
        let timeout_ptr = timeout
            .as_ref()
            .map_or(ptr::null(), |ts| ts as *const libc::timespec);

        let n = cvt(unsafe {
            kevent(
                kq,
                ptr::null(),
                0,
                self.events.as_mut_ptr(),
                self.max_events.min(i32::MAX as usize) as _,
                timeout_ptr,
            )
        })?;

        unsafe {
            self.events.set_len(n as usize);
        }

        for ev in &self.events {
            if ev.flags & EV_ERROR != 0 {
                continue;
            }

            let ready = Self::readiness(ev.filter);

            if !ready.is_empty() {
                events.push(RawEvent {
                    fd: ev.ident as RawFd,
                    ready,
                });
            }
        }

        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.events.clear();

        match self.kq.take() {
            Some(kq) => {
                debug!("kqueue {kq} closed");
                sys_close(kq)
            }
            None => Ok(()),
        }
    }
}

impl Drop for KqueuePoller {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::KqueuePoller;
    use crate::interest::Interest;

    use crate::poller::Poller;

    use libc::{EVFILT_READ, EVFILT_WRITE, F_GETFD, FD_CLOEXEC, fcntl};

    #[test]
    fn test_filters() {
        let both: Vec<i16> = KqueuePoller::filters(Interest::READ | Interest::WRITE).collect();
        assert_eq!(both, vec![EVFILT_READ, EVFILT_WRITE]);

        let write: Vec<i16> = KqueuePoller::filters(Interest::WRITE).collect();
        assert_eq!(write, vec![EVFILT_WRITE]);
    }

    #[test]
    fn test_readiness() {
        assert_eq!(KqueuePoller::readiness(EVFILT_READ), Interest::READ);
        assert_eq!(KqueuePoller::readiness(EVFILT_WRITE), Interest::WRITE);
        assert!(KqueuePoller::readiness(libc::EVFILT_TIMER).is_empty());
    }

    #[test]
    fn test_open_sets_cloexec() {
        let poller = KqueuePoller::open(8).expect("Failed to open poller");
        let kq = poller.kq.expect("kqueue must be open");

        let flags = unsafe { fcntl(kq, F_GETFD) };
        assert!(flags >= 0);
        assert_ne!(flags & FD_CLOEXEC, 0);
    }
}
