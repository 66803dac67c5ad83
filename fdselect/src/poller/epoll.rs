//! Linux `epoll`-based backend.
//!
//! Interest is submitted with a single `epoll_ctl(EPOLL_CTL_ADD)` whose
//! mask combines every requested direction, so arming is atomic. The
//! descriptor itself is stored as the event's user data, which lets the
//! wait loop translate records without any lookup table.
//!
//! Registrations are level-triggered: a descriptor that stays ready is
//! reported on every wait until its condition is cleared.
//!
//! This backend is the default on Linux and Android targets.

use super::timeout::to_millis;
use super::unix::{cvt, is_gone, sys_close};
use super::{Poller, RawEvent};
use crate::interest::Interest;

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLLERR, EPOLLHUP, EPOLLIN, EPOLLOUT, EPOLLRDHUP,
    epoll_create1, epoll_ctl, epoll_event, epoll_wait,
};
use log::debug;
use std::io;
use std::os::fd::RawFd;
use std::ptr;
use std::time::Duration;

/// Linux `epoll` poller.
///
/// This poller owns:
/// - an `epoll` instance (the kernel handle),
/// - a reusable buffer of `epoll_event` records sized to the per-call
///   event limit.
pub struct EpollPoller {
    /// Epoll file descriptor, `None` once closed.
    epoll: Option<RawFd>,

    /// Reusable buffer for epoll events.
    events: Vec<epoll_event>,

    /// Upper bound on records returned by one wait call.
    max_events: usize,
}

impl EpollPoller {
    /// Translates an interest set into an epoll event mask.
    fn mask(interest: Interest) -> u32 {
        let mut flags = 0;

        if interest.is_readable() {
            flags |= EPOLLIN;
        }
        if interest.is_writable() {
            flags |= EPOLLOUT;
        }

        flags as u32
    }

    /// Translates a reported epoll mask back into a readiness set.
    ///
    /// Errors and hang-ups wake both directions so the owner gets a chance
    /// to observe the failure through whichever operation it is waiting on.
    fn readiness(events: u32) -> Interest {
        let mut ready = Interest::empty();

        if events & ((EPOLLIN | EPOLLRDHUP | EPOLLERR | EPOLLHUP) as u32) != 0 {
            ready |= Interest::READ;
        }
        if events & ((EPOLLOUT | EPOLLERR | EPOLLHUP) as u32) != 0 {
            ready |= Interest::WRITE;
        }

        ready
    }

    fn handle(&self) -> io::Result<RawFd> {
        self.epoll
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EBADF))
    }
}

impl Poller for EpollPoller {
    /// Creates the epoll instance with `EPOLL_CLOEXEC`.
    fn open(max_events: usize) -> io::Result<Self> {
        let epoll = cvt(unsafe { epoll_create1(EPOLL_CLOEXEC) })?;
        debug!("epoll instance {epoll} created");

        Ok(Self {
            epoll: Some(epoll),
            events: Vec::with_capacity(max_events),
            max_events,
        })
    }

    fn add(&mut self, fd: RawFd, interest: Interest) -> io::Result<()> {
        let epoll = self.handle()?;

        let mut event = epoll_event {
            events: Self::mask(interest),
            u64: fd as u64,
        };

        cvt(unsafe { epoll_ctl(epoll, EPOLL_CTL_ADD, fd, &mut event) })?;
        Ok(())
    }

    fn remove(&mut self, fd: RawFd, _interest: Interest) -> io::Result<()> {
        let epoll = self.handle()?;

        match cvt(unsafe { epoll_ctl(epoll, EPOLL_CTL_DEL, fd, ptr::null_mut()) }) {
            Ok(_) => Ok(()),
            Err(err) if is_gone(&err) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn wait(&mut self, events: &mut Vec<RawEvent>, timeout: Option<Duration>) -> io::Result<()> {
        let epoll = self.handle()?;

        let n = cvt(unsafe {
            epoll_wait(
                epoll,
                self.events.as_mut_ptr(),
                self.max_events.min(i32::MAX as usize) as i32,
                to_millis(timeout),
            )
        })?;

        unsafe {
            self.events.set_len(n as usize);
        }

        for ev in &self.events {
            let ready = Self::readiness(ev.events);

            if !ready.is_empty() {
                events.push(RawEvent {
                    fd: ev.u64 as RawFd,
                    ready,
                });
            }
        }

        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.events.clear();

        match self.epoll.take() {
            Some(epoll) => {
                debug!("epoll instance {epoll} closed");
                sys_close(epoll)
            }
            None => Ok(()),
        }
    }
}

impl Drop for EpollPoller {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
