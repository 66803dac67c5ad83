//! # fdselect
//!
//! **fdselect** is the kernel-event multiplexing layer underneath an
//! event-driven I/O reactor. Given a set of open file descriptors, it blocks
//! a single thread until one or more of them is ready for reading or
//! writing, or until a deadline elapses, then reports exactly which
//! descriptors are ready and for which operations.
//!
//! It provides:
//!
//! - A [`Selector`] tracking one [`EventKey`] per registered descriptor,
//!   each carrying a caller-owned payload
//! - Level-triggered readiness, coalesced into one entry per descriptor
//! - Interchangeable backends behind the [`Poller`] trait: kqueue, epoll,
//!   `poll(2)` and `WSAPoll`, with the best one picked per target
//! - Bounded per-call event buffers configured through [`SelectorBuilder`]
//!
//! The reactor driving repeated select calls and dispatching callbacks is
//! out of scope; so are the socket types owning the descriptors.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fdselect::{Interest, Selector};
//! use std::net::TcpListener;
//! use std::os::fd::AsRawFd;
//! use std::time::Duration;
//!
//! let listener = TcpListener::bind("127.0.0.1:8080")?;
//! let mut selector = Selector::new()?;
//!
//! selector.register(listener.as_raw_fd(), Interest::READ, "accept")?;
//!
//! loop {
//!     for (key, ready) in selector.select(Some(Duration::from_millis(500)))? {
//!         if ready.is_readable() {
//!             println!("{} fired on {}", key.data(), key.fd());
//!         }
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - [`poller`]: backend contract and the per-OS backends
//! - [`timeout`]: timeout conversions
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger.

mod builder;
mod error;
mod interest;
mod key;
mod selector;
mod table;

pub mod poller;

pub use builder::{DEFAULT_MAX_EVENTS, SelectorBuilder};
pub use error::{Error, Result};
pub use interest::Interest;
pub use key::EventKey;
pub use poller::timeout;
pub use poller::{DefaultPoller, Poller, RawEvent, RawFd};
pub use selector::Selector;
