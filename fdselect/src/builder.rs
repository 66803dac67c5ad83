use crate::error::Result;
use crate::poller::Poller;
use crate::selector::Selector;

/// Per-call event limit used when none is configured.
pub const DEFAULT_MAX_EVENTS: usize = 1024;

/// Builder for configuring and creating a selector.
///
/// `SelectorBuilder` allows customizing selector parameters before the
/// kernel handle is acquired. Currently, it supports configuring the
/// maximum number of events reported by one select call.
///
/// # Examples
///
/// ```rust
/// use fdselect::SelectorBuilder;
///
/// let selector = SelectorBuilder::new()
///     .max_events(64)
///     .build::<()>()?;
///
/// assert_eq!(selector.max_events(), 64);
/// # Ok::<(), fdselect::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct SelectorBuilder {
    /// Upper bound on events reported by one select call.
    max_events: usize,
}

impl SelectorBuilder {
    /// Creates a new `SelectorBuilder` with default configuration.
    ///
    /// By default, a select call reports at most [`DEFAULT_MAX_EVENTS`]
    /// events.
    pub fn new() -> Self {
        Self {
            max_events: DEFAULT_MAX_EVENTS,
        }
    }

    /// Sets the maximum number of events reported by one select call.
    ///
    /// This does not limit how many descriptors can be registered.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn max_events(mut self, n: usize) -> Self {
        assert!(n > 0, "max_events must be > 0");

        self.max_events = n;
        self
    }

    /// Builds a selector on the default backend.
    pub fn build<T>(self) -> Result<Selector<T>> {
        Selector::with_poller(self.max_events)
    }

    /// Builds a selector on backend `P`.
    pub fn build_with<T, P: Poller>(self) -> Result<Selector<T, P>> {
        Selector::with_poller(self.max_events)
    }
}

impl Default for SelectorBuilder {
    /// Creates a default `SelectorBuilder`.
    fn default() -> Self {
        Self::new()
    }
}
