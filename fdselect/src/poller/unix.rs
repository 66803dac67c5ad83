use libc::{EBADF, ENOENT, F_GETFD, c_int, close, fcntl};
use std::io;
use std::os::fd::RawFd;

/// Closes a descriptor, reporting the `close(2)` error if any.
pub(crate) fn sys_close(fd: RawFd) -> io::Result<()> {
    let rc = unsafe { close(fd) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Fails with `EBADF` if `fd` is not an open descriptor.
pub(crate) fn sys_check_fd(fd: RawFd) -> io::Result<()> {
    let rc = unsafe { fcntl(fd, F_GETFD) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Marks a descriptor close-on-exec.
#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
pub(crate) fn sys_set_cloexec(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { fcntl(fd, F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    let rc = unsafe { fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// Returns `true` for errors meaning the kernel already forgot about a
/// descriptor, so there is nothing left to remove.
pub(crate) fn is_gone(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(code) if code == EBADF || code == ENOENT)
}

/// Converts a `-1`-on-error return value into an `io::Result`.
pub(crate) fn cvt(rc: c_int) -> io::Result<c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}
