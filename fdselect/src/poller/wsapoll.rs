//! Windows `WSAPoll`-based backend.
//!
//! This backend mirrors the unix `poll` backend for WinSock sockets.
//! `WSAPoll` keeps no kernel-side registrations, so the `WSAPOLLFD`
//! array lives here and is handed to every wait call. The per-call event
//! limit is applied with a [`RotatingScan`].
//!
//! `WSAPoll` rejects an empty descriptor array, so a wait with nothing
//! registered just sleeps for the timeout. Sockets reported as `POLLNVAL`
//! are disabled and the wait resumes for the rest of the timeout.

use super::scan::RotatingScan;
use super::timeout::to_millis;
use super::{Poller, RawEvent, RawFd};
use crate::interest::Interest;

use log::debug;
use std::collections::HashMap;
use std::io;
use std::mem;
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use windows_sys::Win32::Networking::WinSock::{
    INVALID_SOCKET, POLLERR, POLLHUP, POLLIN, POLLNVAL, POLLOUT, SOCKET, SOCKET_ERROR, WSADATA,
    WSAPOLLFD, WSAPoll, WSAStartup,
};

/// Requested WinSock version, 2.2.
const WINSOCK_VERSION: u16 = 0x0202;

/// Initializes WinSock once per process and reports the startup result
/// to every caller.
fn ensure_winsock() -> io::Result<()> {
    static STARTUP: OnceLock<i32> = OnceLock::new();

    let rc = *STARTUP.get_or_init(|| unsafe {
        let mut data: WSADATA = mem::zeroed();
        WSAStartup(WINSOCK_VERSION, &mut data)
    });

    startup_result(rc)
}

/// Maps a `WSAStartup` return code, which is the error code itself.
fn startup_result(rc: i32) -> io::Result<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(rc))
    }
}

/// `WSAPoll` poller for Windows sockets.
pub struct WsaPollPoller {
    /// Entries handed to `WSAPoll`, in registration order.
    fds: Vec<WSAPOLLFD>,

    /// Registered socket of each entry in `fds`.
    owners: Vec<RawFd>,

    /// Position of each socket inside `fds`.
    index: HashMap<RawFd, usize>,

    scan: RotatingScan,

    /// Upper bound on records returned by one wait call.
    max_events: usize,

    closed: bool,
}

impl WsaPollPoller {
    fn mask(interest: Interest) -> i16 {
        let mut flags = 0;

        if interest.is_readable() {
            flags |= POLLIN;
        }
        if interest.is_writable() {
            flags |= POLLOUT;
        }

        flags
    }

    fn readiness(revents: i16) -> Interest {
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
            Err(io::Error::new(io::ErrorKind::NotConnected, "poller is closed"))
        } else {
            Ok(())
        }
    }
}

impl Poller for WsaPollPoller {
    fn open(max_events: usize) -> io::Result<Self> {
        ensure_winsock()?;

        Ok(Self {
            fds: Vec::new(),
            owners: Vec::new(),
            index: HashMap::new(),
            scan: RotatingScan::new(),
            max_events,
            closed: false,
        })
    }

    fn add(&mut self, fd: RawFd, interest: Interest) -> io::Result<()> {
        self.ensure_open()?;

        if self.index.contains_key(&fd) {
            return Err(io::Error::from(io::ErrorKind::AlreadyExists));
        }

        self.index.insert(fd, self.fds.len());
        self.owners.push(fd);
        self.fds.push(WSAPOLLFD {
            fd: fd as SOCKET,
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

        if self.fds.is_empty() {
            match timeout {
                Some(timeout) => thread::sleep(timeout),
                None => loop {
                    thread::park();
                },
            }
            return Ok(());
        }

        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut remaining = timeout;

        loop {
            for pfd in self.fds.iter_mut() {
                pfd.revents = 0;
            }

            let rc = unsafe {
                WSAPoll(
                    self.fds.as_mut_ptr(),
                    self.fds.len() as u32,
                    to_millis(remaining),
                )
            };
            if rc == SOCKET_ERROR {
                return Err(io::Error::last_os_error());
            }
            if rc == 0 {
                return Ok(());
            }

            let reported = events.len();
            let mut disabled = false;

            let fds = &mut self.fds;
            let owners = &self.owners;

            self.scan.scan(fds.len(), self.max_events, events, |pos| {
                let pfd = &mut fds[pos];

                if pfd.revents & POLLNVAL != 0 {
                    debug!("socket {} is no longer open, disabling it", owners[pos]);
                    pfd.fd = INVALID_SOCKET;
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
