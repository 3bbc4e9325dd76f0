// Due to https://github.com/rust-lang/rust/issues/64247
#![allow(clippy::use_self)]
use std::convert::Infallible;
use std::num::TryFromIntError;
use thiserror::Error;

/// The WASI preview1 errno space.
///
/// Discriminants are the exact values handed back to the guest.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq, Hash)]
#[repr(u16)]
pub enum WasiError {
    #[error("No error occurred. System call completed successfully.")]
    ESUCCESS = 0,
    #[error("Argument list too long.")]
    E2BIG = 1,
    #[error("Permission denied.")]
    EACCES = 2,
    #[error("Address in use.")]
    EADDRINUSE = 3,
    #[error("Address not available.")]
    EADDRNOTAVAIL = 4,
    #[error("Address family not supported.")]
    EAFNOSUPPORT = 5,
    #[error("Resource unavailable, or operation would block.")]
    EAGAIN = 6,
    #[error("Connection already in progress.")]
    EALREADY = 7,
    #[error("Bad file descriptor.")]
    EBADF = 8,
    #[error("Bad message.")]
    EBADMSG = 9,
    #[error("Device or resource busy.")]
    EBUSY = 10,
    #[error("Operation canceled.")]
    ECANCELED = 11,
    #[error("No child processes.")]
    ECHILD = 12,
    #[error("Connection aborted.")]
    ECONNABORTED = 13,
    #[error("Connection refused.")]
    ECONNREFUSED = 14,
    #[error("Connection reset.")]
    ECONNRESET = 15,
    #[error("Resource deadlock would occur.")]
    EDEADLK = 16,
    #[error("Destination address required.")]
    EDESTADDRREQ = 17,
    #[error("Mathematics argument out of domain of function.")]
    EDOM = 18,
    #[error("Reserved.")]
    EDQUOT = 19,
    #[error("File exists.")]
    EEXIST = 20,
    #[error("Bad address.")]
    EFAULT = 21,
    #[error("File too large.")]
    EFBIG = 22,
    #[error("Host is unreachable.")]
    EHOSTUNREACH = 23,
    #[error("Identifier removed.")]
    EIDRM = 24,
    #[error("Illegal byte sequence.")]
    EILSEQ = 25,
    #[error("Operation in progress.")]
    EINPROGRESS = 26,
    #[error("Interrupted function.")]
    EINTR = 27,
    #[error("Invalid argument.")]
    EINVAL = 28,
    #[error("I/O error.")]
    EIO = 29,
    #[error("Socket is connected.")]
    EISCONN = 30,
    #[error("Is a directory.")]
    EISDIR = 31,
    #[error("Too many levels of symbolic links.")]
    ELOOP = 32,
    #[error("File descriptor value too large.")]
    EMFILE = 33,
    #[error("Too many links.")]
    EMLINK = 34,
    #[error("Message too large.")]
    EMSGSIZE = 35,
    #[error("Reserved.")]
    EMULTIHOP = 36,
    #[error("Filename too long.")]
    ENAMETOOLONG = 37,
    #[error("Network is down.")]
    ENETDOWN = 38,
    #[error("Connection aborted by network.")]
    ENETRESET = 39,
    #[error("Network unreachable.")]
    ENETUNREACH = 40,
    #[error("Too many files open in system.")]
    ENFILE = 41,
    #[error("No buffer space available.")]
    ENOBUFS = 42,
    #[error("No such device.")]
    ENODEV = 43,
    #[error("No such file or directory.")]
    ENOENT = 44,
    #[error("Executable file format error.")]
    ENOEXEC = 45,
    #[error("No locks available.")]
    ENOLCK = 46,
    #[error("Reserved.")]
    ENOLINK = 47,
    #[error("Not enough space.")]
    ENOMEM = 48,
    #[error("No message of the desired type.")]
    ENOMSG = 49,
    #[error("Protocol not available.")]
    ENOPROTOOPT = 50,
    #[error("No space left on device.")]
    ENOSPC = 51,
    #[error("Function not supported.")]
    ENOSYS = 52,
    #[error("The socket is not connected.")]
    ENOTCONN = 53,
    #[error("Not a directory or a symbolic link to a directory.")]
    ENOTDIR = 54,
    #[error("Directory not empty.")]
    ENOTEMPTY = 55,
    #[error("State not recoverable.")]
    ENOTRECOVERABLE = 56,
    #[error("Not a socket.")]
    ENOTSOCK = 57,
    #[error("Not supported, or operation not supported on socket.")]
    ENOTSUP = 58,
    #[error("Inappropriate I/O control operation.")]
    ENOTTY = 59,
    #[error("No such device or address.")]
    ENXIO = 60,
    #[error("Value too large to be stored in data type.")]
    EOVERFLOW = 61,
    #[error("Previous owner died.")]
    EOWNERDEAD = 62,
    #[error("Operation not permitted.")]
    EPERM = 63,
    #[error("Broken pipe.")]
    EPIPE = 64,
    #[error("Protocol error.")]
    EPROTO = 65,
    #[error("Protocol not supported.")]
    EPROTONOSUPPORT = 66,
    #[error("Protocol wrong type for socket.")]
    EPROTOTYPE = 67,
    #[error("Result too large.")]
    ERANGE = 68,
    #[error("Read-only file system.")]
    EROFS = 69,
    #[error("Invalid seek.")]
    ESPIPE = 70,
    #[error("No such process.")]
    ESRCH = 71,
    #[error("Reserved.")]
    ESTALE = 72,
    #[error("Connection timed out.")]
    ETIMEDOUT = 73,
    #[error("Text file busy.")]
    ETXTBSY = 74,
    #[error("Cross-device link.")]
    EXDEV = 75,
    #[error("Extension: Capabilities insufficient.")]
    ENOTCAPABLE = 76,
}

impl WasiError {
    pub fn as_raw_errno(self) -> u16 {
        self as u16
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Wasi(#[from] WasiError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(unix)]
    #[error(transparent)]
    Host(#[from] rustix::io::Errno),
}

impl From<TryFromIntError> for Error {
    fn from(_: TryFromIntError) -> Self {
        Self::Wasi(WasiError::EOVERFLOW)
    }
}

impl From<Infallible> for Error {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

impl Error {
    /// Folds the error into the guest-visible errno, translating host codes
    /// through the host error table.
    pub fn as_wasi_error(&self) -> WasiError {
        match self {
            Self::Wasi(no) => *no,
            Self::Io(e) => match e.raw_os_error() {
                Some(code) => crate::sys::errno_from_host(code),
                // Lookups through a directory capability report an attempt
                // to leave it this way, with no OS code attached.
                None if e.kind() == std::io::ErrorKind::PermissionDenied => WasiError::ENOTCAPABLE,
                None => {
                    tracing::debug!("Inconvertible OS error: {}", e);
                    WasiError::EIO
                }
            },
            #[cfg(unix)]
            Self::Host(errno) => crate::sys::errno_from_host(errno.raw_os_error()),
        }
    }

    pub const E2BIG: Self = Error::Wasi(WasiError::E2BIG);
    pub const EACCES: Self = Error::Wasi(WasiError::EACCES);
    pub const EBADF: Self = Error::Wasi(WasiError::EBADF);
    pub const EEXIST: Self = Error::Wasi(WasiError::EEXIST);
    pub const EFAULT: Self = Error::Wasi(WasiError::EFAULT);
    pub const EILSEQ: Self = Error::Wasi(WasiError::EILSEQ);
    pub const EINVAL: Self = Error::Wasi(WasiError::EINVAL);
    pub const EIO: Self = Error::Wasi(WasiError::EIO);
    pub const EISDIR: Self = Error::Wasi(WasiError::EISDIR);
    pub const ELOOP: Self = Error::Wasi(WasiError::ELOOP);
    pub const EMFILE: Self = Error::Wasi(WasiError::EMFILE);
    pub const ENOENT: Self = Error::Wasi(WasiError::ENOENT);
    pub const ENOSYS: Self = Error::Wasi(WasiError::ENOSYS);
    pub const ENOTDIR: Self = Error::Wasi(WasiError::ENOTDIR);
    pub const ENOTSUP: Self = Error::Wasi(WasiError::ENOTSUP);
    pub const EOVERFLOW: Self = Error::Wasi(WasiError::EOVERFLOW);
    pub const EPERM: Self = Error::Wasi(WasiError::EPERM);
    pub const ESPIPE: Self = Error::Wasi(WasiError::ESPIPE);
    pub const ENOTCAPABLE: Self = Error::Wasi(WasiError::ENOTCAPABLE);
}

pub type Result<T> = std::result::Result<T, Error>;
