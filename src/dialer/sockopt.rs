//! Socket-level options applied before a dialed socket connects.
//!
//! Binding to a device and the firewall mark are Linux features. Elsewhere
//! both calls report `Unsupported`, which the dialer logs and ignores.

use std::io;

use socket2::SockRef;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) fn bind_device(sock: &SockRef<'_>, ifce: &str) -> io::Result<()> {
    if ifce.is_empty() {
        return Ok(());
    }
    sock.bind_device(Some(ifce.as_bytes()))
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) fn set_mark(sock: &SockRef<'_>, mark: u32) -> io::Result<()> {
    if mark == 0 {
        return Ok(());
    }
    sock.set_mark(mark)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(crate) fn bind_device(_sock: &SockRef<'_>, ifce: &str) -> io::Result<()> {
    if ifce.is_empty() {
        return Ok(());
    }
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "binding to a device is not supported on this platform",
    ))
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub(crate) fn set_mark(_sock: &SockRef<'_>, mark: u32) -> io::Result<()> {
    if mark == 0 {
        return Ok(());
    }
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "SO_MARK is not supported on this platform",
    ))
}
