//! Capped scan over a readiness array.
//!
//! `poll` and `WSAPoll` report every ready entry of the array they were
//! handed, with no limit. Backends built on them walk the array through a
//! [`RotatingScan`], which stops after `max_events` records and remembers
//! where it stopped, so entries that did not fit are reported first by
//! the next wait call.

use super::RawEvent;

use log::trace;

/// Start position of the next scan over a backend's readiness array.
#[derive(Debug, Default)]
pub(crate) struct RotatingScan {
    cursor: usize,
}

impl RotatingScan {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Visits every position of an array of `len` entries, starting where
    /// the previous scan stopped.
    ///
    /// `check` turns a position into a record, or `None` if the entry has
    /// nothing to report. Records are appended to `events`; the scan ends
    /// once `max_events` of them were appended.
    pub(crate) fn scan<F>(
        &mut self,
        len: usize,
        max_events: usize,
        events: &mut Vec<RawEvent>,
        mut check: F,
    ) where
        F: FnMut(usize) -> Option<RawEvent>,
    {
        if len == 0 {
            return;
        }

        let start = self.cursor % len;
        let mut reported = 0;

        for i in 0..len {
            let pos = (start + i) % len;

            let Some(event) = check(pos) else {
                continue;
            };

            events.push(event);
            reported += 1;

            if reported == max_events {
                trace!("event limit reached, resuming after position {pos}");
                self.cursor = pos + 1;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RotatingScan;
    use crate::interest::Interest;
    use crate::poller::RawEvent;

    fn ready(pos: usize) -> Option<RawEvent> {
        Some(RawEvent {
            fd: pos as _,
            ready: Interest::WRITE,
        })
    }

    fn fds(events: &[RawEvent]) -> Vec<usize> {
        events.iter().map(|ev| ev.fd as usize).collect()
    }

    #[test]
    fn test_scan_resumes_after_limit() {
        let mut scan = RotatingScan::new();
        let mut events = Vec::new();

        scan.scan(5, 2, &mut events, ready);
        assert_eq!(fds(&events), vec![0, 1]);

        events.clear();
        scan.scan(5, 2, &mut events, ready);
        assert_eq!(fds(&events), vec![2, 3]);

        events.clear();
        scan.scan(5, 2, &mut events, ready);
        assert_eq!(fds(&events), vec![4, 0]);
    }

    #[test]
    fn test_scan_skips_quiet_entries() {
        let mut scan = RotatingScan::new();
        let mut events = Vec::new();

        scan.scan(6, 8, &mut events, |pos| if pos % 2 == 0 { ready(pos) } else { None });

        assert_eq!(fds(&events), vec![0, 2, 4]);
    }

    #[test]
    fn test_scan_empty_array() {
        let mut scan = RotatingScan::new();
        let mut events = Vec::new();

        scan.scan(0, 4, &mut events, ready);

        assert!(events.is_empty());
    }
}
