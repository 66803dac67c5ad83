#![cfg(unix)]

use fdselect::{Error, Interest, Poller, Selector};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::Arc;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn selector<T, P: Poller>() -> Selector<T, P> {
    init_logger();
    Selector::with_poller(64).expect("Failed to create selector")
}

macro_rules! backend_tests {
    ($($name:ident),* $(,)?) => {
        mod default_poller {
            $(
                #[test]
                fn $name() {
                    super::$name::<fdselect::DefaultPoller>();
                }
            )*
        }

        mod poll_poller {
            $(
                #[test]
                fn $name() {
                    super::$name::<fdselect::poller::PollPoller>();
                }
            )*
        }
    };
}

backend_tests!(
    lookup_unregistered_is_none,
    register_then_lookup,
    duplicate_registration_leaves_table_unchanged,
    unregister_unknown_fails,
    register_unregister_lookup,
    empty_interest_is_rejected,
    invalid_descriptor_is_rejected,
    kernel_rejection_leaves_table_unchanged,
    unregister_after_close_of_descriptor,
    modify_replaces_key,
    keys_lists_live_registrations,
);

fn lookup_unregistered_is_none<P: Poller>() {
    let selector = selector::<(), P>();
    let (a, _b) = UnixStream::pair().expect("Failed to create socket pair");

    assert!(selector.lookup(a.as_raw_fd()).is_none());
    assert!(selector.lookup(1_000_000).is_none());
}

fn register_then_lookup<P: Poller>() {
    let mut selector = selector::<Arc<String>, P>();
    let (a, _b) = UnixStream::pair().expect("Failed to create socket pair");
    let fd = a.as_raw_fd();
    let payload = Arc::new(String::from("connection"));

    let key = selector
        .register(fd, Interest::READ | Interest::WRITE, payload.clone())
        .expect("Failed to register");
    assert_eq!(key.fd(), fd);

    let key = selector.lookup(fd).expect("key must be registered");
    assert_eq!(key.interest(), Interest::READ | Interest::WRITE);
    assert!(Arc::ptr_eq(key.data(), &payload));
    assert_eq!(selector.len(), 1);
}

fn duplicate_registration_leaves_table_unchanged<P: Poller>() {
    let mut selector = selector::<u32, P>();
    let (a, _b) = UnixStream::pair().expect("Failed to create socket pair");
    let fd = a.as_raw_fd();

    selector
        .register(fd, Interest::READ, 1)
        .expect("Failed to register");

    for _ in 0..2 {
        let err = selector
            .register(fd, Interest::WRITE, 2)
            .expect_err("duplicate registration must fail");
        assert!(matches!(err, Error::DuplicateRegistration(d) if d == fd));
    }

    let key = selector.lookup(fd).expect("key must be registered");
    assert_eq!(key.interest(), Interest::READ);
    assert_eq!(*key.data(), 1);
    assert_eq!(selector.len(), 1);
}

fn unregister_unknown_fails<P: Poller>() {
    let mut selector = selector::<(), P>();
    let (a, _b) = UnixStream::pair().expect("Failed to create socket pair");
    let fd = a.as_raw_fd();

    let err = selector
        .unregister(fd)
        .expect_err("unregistering an unknown descriptor must fail");
    assert!(matches!(err, Error::NotFound(d) if d == fd));
}

fn register_unregister_lookup<P: Poller>() {
    let mut selector = selector::<&str, P>();
    let (a, _b) = UnixStream::pair().expect("Failed to create socket pair");
    let fd = a.as_raw_fd();

    selector
        .register(fd, Interest::WRITE, "a")
        .expect("Failed to register");

    let key = selector.unregister(fd).expect("Failed to unregister");
    assert_eq!(key.fd(), fd);
    assert_eq!(key.interest(), Interest::WRITE);
    assert_eq!(key.into_data(), "a");

    assert!(selector.lookup(fd).is_none());
    assert!(selector.is_empty());

    // The descriptor can be registered again once removed.
    selector
        .register(fd, Interest::READ, "b")
        .expect("Failed to register again");
}

fn empty_interest_is_rejected<P: Poller>() {
    let mut selector = selector::<(), P>();
    let (a, _b) = UnixStream::pair().expect("Failed to create socket pair");
    let fd = a.as_raw_fd();

    let err = selector
        .register(fd, Interest::empty(), ())
        .expect_err("empty interest must be rejected");
    assert!(matches!(err, Error::InvalidInterest));
    assert!(selector.lookup(fd).is_none());
}

fn invalid_descriptor_is_rejected<P: Poller>() {
    let mut selector = selector::<(), P>();

    let err = selector
        .register(-1, Interest::READ, ())
        .expect_err("negative descriptor must be rejected");
    assert!(matches!(err, Error::InvalidDescriptor(-1)));
}

fn kernel_rejection_leaves_table_unchanged<P: Poller>() {
    let mut selector = selector::<(), P>();
    let fd = 1_000_000;

    let err = selector
        .register(fd, Interest::READ | Interest::WRITE, ())
        .expect_err("closed descriptor must be rejected");

    assert!(matches!(err, Error::Os(_)));
    assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    assert!(selector.lookup(fd).is_none());
    assert!(selector.is_empty());
}

fn unregister_after_close_of_descriptor<P: Poller>() {
    let mut selector = selector::<(), P>();
    let (a, _b) = UnixStream::pair().expect("Failed to create socket pair");
    let fd = a.as_raw_fd();

    selector
        .register(fd, Interest::READ, ())
        .expect("Failed to register");
    drop(a);

    selector
        .unregister(fd)
        .expect("a closed descriptor must still unregister");
    assert!(selector.lookup(fd).is_none());
}

fn modify_replaces_key<P: Poller>() {
    let mut selector = selector::<u32, P>();
    let (a, _b) = UnixStream::pair().expect("Failed to create socket pair");
    let fd = a.as_raw_fd();

    selector
        .register(fd, Interest::READ, 1)
        .expect("Failed to register");

    let err = selector
        .modify(fd, Interest::empty(), 2)
        .expect_err("empty interest must be rejected");
    assert!(matches!(err, Error::InvalidInterest));
    assert_eq!(*selector.lookup(fd).expect("key must survive").data(), 1);

    let key = selector
        .modify(fd, Interest::WRITE, 2)
        .expect("Failed to modify");
    assert_eq!(key.interest(), Interest::WRITE);
    assert_eq!(*key.data(), 2);
    assert_eq!(selector.len(), 1);

    let err = selector
        .modify(1_000_000, Interest::READ, 3)
        .expect_err("modifying an unknown descriptor must fail");
    assert!(matches!(err, Error::NotFound(1_000_000)));
}

fn keys_lists_live_registrations<P: Poller>() {
    let mut selector = selector::<usize, P>();
    let pairs: Vec<_> = (0..3)
        .map(|_| UnixStream::pair().expect("Failed to create socket pair"))
        .collect();

    for (i, (a, _)) in pairs.iter().enumerate() {
        selector
            .register(a.as_raw_fd(), Interest::READ, i)
            .expect("Failed to register");
    }

    let mut payloads: Vec<usize> = selector.keys().map(|key| *key.data()).collect();
    payloads.sort();
    assert_eq!(payloads, vec![0, 1, 2]);
}
