#![cfg(unix)]

use fdselect::poller::PollPoller;
use fdselect::{Error, Interest, Selector, SelectorBuilder};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::time::Duration;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn close_is_idempotent() {
    init_logger();
    let mut selector = Selector::<()>::new().expect("Failed to create selector");

    assert!(!selector.is_closed());
    selector.close();
    selector.close();
    assert!(selector.is_closed());
}

#[test]
fn operations_fail_after_close() {
    init_logger();
    let mut selector = Selector::<u8>::new().expect("Failed to create selector");
    let (a, _b) = UnixStream::pair().expect("Failed to create socket pair");
    let fd = a.as_raw_fd();

    selector
        .register(fd, Interest::READ, 7)
        .expect("Failed to register");
    selector.close();

    assert!(matches!(
        selector.register(fd, Interest::READ, 8),
        Err(Error::Closed)
    ));
    assert!(matches!(selector.unregister(fd), Err(Error::Closed)));
    assert!(matches!(
        selector.select(Some(Duration::ZERO)),
        Err(Error::Closed)
    ));

    assert!(selector.lookup(fd).is_none());
    assert!(selector.is_empty());
}

#[test]
fn close_releases_payloads() {
    init_logger();
    let mut selector = Selector::<Arc<u32>>::new().expect("Failed to create selector");
    let (a, _b) = UnixStream::pair().expect("Failed to create socket pair");
    let payload = Arc::new(1);

    selector
        .register(a.as_raw_fd(), Interest::WRITE, payload.clone())
        .expect("Failed to register");
    assert_eq!(Arc::strong_count(&payload), 2);

    selector.close();
    assert_eq!(Arc::strong_count(&payload), 1);
}

#[test]
fn drop_releases_payloads() {
    init_logger();
    let payload = Arc::new(1);
    let (a, _b) = UnixStream::pair().expect("Failed to create socket pair");

    {
        let mut selector = Selector::<Arc<u32>>::new().expect("Failed to create selector");
        selector
            .register(a.as_raw_fd(), Interest::READ, payload.clone())
            .expect("Failed to register");
        assert_eq!(Arc::strong_count(&payload), 2);
    }

    assert_eq!(Arc::strong_count(&payload), 1);
}

#[test]
fn builder_selects_backend() {
    init_logger();
    let mut selector = SelectorBuilder::new()
        .max_events(4)
        .build_with::<(), PollPoller>()
        .expect("Failed to build selector");
    let (a, _b) = UnixStream::pair().expect("Failed to create socket pair");

    assert_eq!(selector.max_events(), 4);

    selector
        .register(a.as_raw_fd(), Interest::WRITE, ())
        .expect("Failed to register");

    let ready = selector
        .select(Some(Duration::from_secs(5)))
        .expect("select failed");
    assert_eq!(ready.len(), 1);
}

#[test]
#[should_panic(expected = "max_events must be > 0")]
fn zero_max_events_panics() {
    let _ = Selector::<()>::with_max_events(0);
}

#[test]
fn selector_is_send() {
    fn assert_send<T: Send>() {}

    assert_send::<Selector<u32>>();
    assert_send::<Selector<u32, PollPoller>>();
}

#[test]
fn selector_moves_across_threads() {
    init_logger();
    let (a, mut b) = UnixStream::pair().expect("Failed to create socket pair");
    let fd = a.as_raw_fd();

    let mut selector = Selector::<&str>::new().expect("Failed to create selector");
    selector
        .register(fd, Interest::READ, "peer")
        .expect("Failed to register");

    std::io::Write::write_all(&mut b, b"x").expect("Failed to write");

    let handle = std::thread::spawn(move || {
        let ready = selector
            .select(Some(Duration::from_secs(5)))
            .expect("select failed");
        ready.iter().map(|(key, _)| *key.data()).collect::<Vec<_>>()
    });

    let fired = handle.join().expect("select thread panicked");
    assert_eq!(fired, vec!["peer"]);
}
