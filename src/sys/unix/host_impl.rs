//! WASI host types specific to *nix host.
use crate::wasi::{self, Fdflags, Filestat, Filetype, Timestamp};
use crate::{Error, Result, WasiError};
use rustix::fs::OFlags;
use std::fs::{FileType, Metadata};
use std::os::unix::fs::{FileTypeExt, MetadataExt};

/// Translates a host `errno` value into the WASI errno space.
///
/// Host errors without a WASI counterpart fall back to `EINVAL`.
pub(crate) fn errno_from_host(errno: i32) -> WasiError {
    match errno {
        libc::EPERM => WasiError::EPERM,
        libc::ENOENT => WasiError::ENOENT,
        libc::ESRCH => WasiError::ESRCH,
        libc::EINTR => WasiError::EINTR,
        libc::EIO => WasiError::EIO,
        libc::ENXIO => WasiError::ENXIO,
        libc::E2BIG => WasiError::E2BIG,
        libc::ENOEXEC => WasiError::ENOEXEC,
        libc::EBADF => WasiError::EBADF,
        libc::ECHILD => WasiError::ECHILD,
        libc::EAGAIN => WasiError::EAGAIN,
        libc::ENOMEM => WasiError::ENOMEM,
        libc::EACCES => WasiError::EACCES,
        libc::EFAULT => WasiError::EFAULT,
        libc::EBUSY => WasiError::EBUSY,
        libc::EEXIST => WasiError::EEXIST,
        libc::EXDEV => WasiError::EXDEV,
        libc::ENODEV => WasiError::ENODEV,
        libc::ENOTDIR => WasiError::ENOTDIR,
        libc::EISDIR => WasiError::EISDIR,
        libc::EINVAL => WasiError::EINVAL,
        libc::ENFILE => WasiError::ENFILE,
        libc::EMFILE => WasiError::EMFILE,
        libc::ENOTTY => WasiError::ENOTTY,
        libc::ETXTBSY => WasiError::ETXTBSY,
        libc::EFBIG => WasiError::EFBIG,
        libc::ENOSPC => WasiError::ENOSPC,
        libc::ESPIPE => WasiError::ESPIPE,
        libc::EROFS => WasiError::EROFS,
        libc::EMLINK => WasiError::EMLINK,
        libc::EPIPE => WasiError::EPIPE,
        libc::EDOM => WasiError::EDOM,
        libc::ERANGE => WasiError::ERANGE,
        libc::EDEADLK => WasiError::EDEADLK,
        libc::ENAMETOOLONG => WasiError::ENAMETOOLONG,
        libc::ENOLCK => WasiError::ENOLCK,
        libc::ENOSYS => WasiError::ENOSYS,
        libc::ENOTEMPTY => WasiError::ENOTEMPTY,
        libc::ELOOP => WasiError::ELOOP,
        libc::ENOMSG => WasiError::ENOMSG,
        libc::EIDRM => WasiError::EIDRM,
        libc::ENOLINK => WasiError::ENOLINK,
        libc::EPROTO => WasiError::EPROTO,
        libc::EMULTIHOP => WasiError::EMULTIHOP,
        libc::EBADMSG => WasiError::EBADMSG,
        libc::EOVERFLOW => WasiError::EOVERFLOW,
        libc::EILSEQ => WasiError::EILSEQ,
        libc::ENOTSOCK => WasiError::ENOTSOCK,
        libc::EDESTADDRREQ => WasiError::EDESTADDRREQ,
        libc::EMSGSIZE => WasiError::EMSGSIZE,
        libc::EPROTOTYPE => WasiError::EPROTOTYPE,
        libc::ENOPROTOOPT => WasiError::ENOPROTOOPT,
        libc::EPROTONOSUPPORT => WasiError::EPROTONOSUPPORT,
        libc::EAFNOSUPPORT => WasiError::EAFNOSUPPORT,
        libc::EADDRINUSE => WasiError::EADDRINUSE,
        libc::EADDRNOTAVAIL => WasiError::EADDRNOTAVAIL,
        libc::ENETDOWN => WasiError::ENETDOWN,
        libc::ENETUNREACH => WasiError::ENETUNREACH,
        libc::ENETRESET => WasiError::ENETRESET,
        libc::ECONNABORTED => WasiError::ECONNABORTED,
        libc::ECONNRESET => WasiError::ECONNRESET,
        libc::ENOBUFS => WasiError::ENOBUFS,
        libc::EISCONN => WasiError::EISCONN,
        libc::ENOTCONN => WasiError::ENOTCONN,
        libc::ETIMEDOUT => WasiError::ETIMEDOUT,
        libc::ECONNREFUSED => WasiError::ECONNREFUSED,
        libc::EHOSTUNREACH => WasiError::EHOSTUNREACH,
        libc::EALREADY => WasiError::EALREADY,
        libc::EINPROGRESS => WasiError::EINPROGRESS,
        libc::ESTALE => WasiError::ESTALE,
        libc::EDQUOT => WasiError::EDQUOT,
        libc::ECANCELED => WasiError::ECANCELED,
        libc::EOWNERDEAD => WasiError::EOWNERDEAD,
        libc::ENOTRECOVERABLE => WasiError::ENOTRECOVERABLE,
        libc::ENOTSUP => WasiError::ENOTSUP,
        // Aliases which share a value with one of the above on some hosts.
        x if x == libc::EWOULDBLOCK => WasiError::EAGAIN,
        x if x == libc::EOPNOTSUPP => WasiError::ENOTSUP,
        x if x == libc::EHOSTDOWN => WasiError::EHOSTUNREACH,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        x if x == libc::EDEADLOCK => WasiError::EDEADLK,
        x => {
            tracing::debug!("Unknown errno value: {}", x);
            WasiError::EINVAL
        }
    }
}

/// Maps a guest signal number onto the host signal it stands for.
pub(crate) fn signal_from_wasi(sig: u8) -> Option<libc::c_int> {
    let signo = match sig {
        wasi::SIGABRT => libc::SIGABRT,
        wasi::SIGALRM => libc::SIGALRM,
        wasi::SIGBUS => libc::SIGBUS,
        wasi::SIGCHLD => libc::SIGCHLD,
        wasi::SIGCONT => libc::SIGCONT,
        wasi::SIGFPE => libc::SIGFPE,
        wasi::SIGHUP => libc::SIGHUP,
        wasi::SIGILL => libc::SIGILL,
        wasi::SIGINT => libc::SIGINT,
        wasi::SIGKILL => libc::SIGKILL,
        wasi::SIGPIPE => libc::SIGPIPE,
        wasi::SIGQUIT => libc::SIGQUIT,
        wasi::SIGSEGV => libc::SIGSEGV,
        wasi::SIGSTOP => libc::SIGSTOP,
        wasi::SIGTERM => libc::SIGTERM,
        wasi::SIGTRAP => libc::SIGTRAP,
        wasi::SIGTSTP => libc::SIGTSTP,
        wasi::SIGTTIN => libc::SIGTTIN,
        wasi::SIGTTOU => libc::SIGTTOU,
        wasi::SIGURG => libc::SIGURG,
        wasi::SIGUSR1 => libc::SIGUSR1,
        wasi::SIGUSR2 => libc::SIGUSR2,
        wasi::SIGVTALRM => libc::SIGVTALRM,
        wasi::SIGXCPU => libc::SIGXCPU,
        wasi::SIGXFSZ => libc::SIGXFSZ,
        _ => return None,
    };
    Some(signo)
}

/// FIFOs are presented to the guest as stream sockets.
pub(crate) fn filetype_from_std(ft: &FileType) -> Filetype {
    if ft.is_block_device() {
        Filetype::BlockDevice
    } else if ft.is_char_device() {
        Filetype::CharacterDevice
    } else if ft.is_dir() {
        Filetype::Directory
    } else if ft.is_fifo() || ft.is_socket() {
        Filetype::SocketStream
    } else if ft.is_file() {
        Filetype::RegularFile
    } else if ft.is_symlink() {
        Filetype::SymbolicLink
    } else {
        Filetype::Unknown
    }
}

pub(crate) fn filestat_from_metadata(meta: &Metadata, filetype: Filetype) -> Result<Filestat> {
    fn filestat_to_timestamp(secs: i64, nsecs: i64) -> Result<Timestamp> {
        u64::try_from(secs)?
            .checked_mul(1_000_000_000)
            .and_then(|sec_nsec| sec_nsec.checked_add(nsecs as u64))
            .ok_or(Error::EOVERFLOW)
    }

    Ok(Filestat {
        dev: meta.dev(),
        ino: meta.ino(),
        filetype,
        nlink: u32::try_from(meta.nlink())?,
        size: meta.size(),
        atim: filestat_to_timestamp(meta.atime(), meta.atime_nsec())?,
        mtim: filestat_to_timestamp(meta.mtime(), meta.mtime_nsec())?,
        ctim: filestat_to_timestamp(meta.ctime(), meta.ctime_nsec())?,
    })
}

/// The same classification for the file types a directory capability
/// reports.
pub(crate) fn filetype_from_cap(ft: &cap_std::fs::FileType) -> Filetype {
    use cap_fs_ext::FileTypeExt as CapFileTypeExt;
    if CapFileTypeExt::is_block_device(ft) {
        Filetype::BlockDevice
    } else if CapFileTypeExt::is_char_device(ft) {
        Filetype::CharacterDevice
    } else if ft.is_dir() {
        Filetype::Directory
    } else if CapFileTypeExt::is_fifo(ft) || CapFileTypeExt::is_socket(ft) {
        Filetype::SocketStream
    } else if ft.is_file() {
        Filetype::RegularFile
    } else if ft.is_symlink() {
        Filetype::SymbolicLink
    } else {
        Filetype::Unknown
    }
}

fn timestamp_from_system_time(t: std::time::SystemTime) -> Result<Timestamp> {
    let since_epoch = t
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|_| Error::EOVERFLOW)?;
    Ok(u64::try_from(since_epoch.as_nanos())?)
}

/// Builds a filestat from metadata looked up through a directory capability.
///
/// The status-change time is not exposed there; the birth time stands in for
/// it, or the modification time where the host does not record one.
pub(crate) fn filestat_from_cap_metadata(meta: &cap_std::fs::Metadata) -> Result<Filestat> {
    use cap_fs_ext::MetadataExt as CapMetadataExt;

    let mtim = timestamp_from_system_time(meta.modified()?.into_std())?;
    let ctim = match meta.created() {
        Ok(t) => timestamp_from_system_time(t.into_std())?,
        Err(_) => mtim,
    };
    Ok(Filestat {
        dev: CapMetadataExt::dev(meta),
        ino: CapMetadataExt::ino(meta),
        filetype: filetype_from_cap(&meta.file_type()),
        nlink: u32::try_from(CapMetadataExt::nlink(meta))?,
        size: meta.len(),
        atim: timestamp_from_system_time(meta.accessed()?.into_std())?,
        mtim,
        ctim,
    })
}

pub(crate) fn fdflags_from_host(oflags: OFlags) -> Fdflags {
    let mut fdflags = Fdflags::empty();
    if oflags.contains(OFlags::APPEND) {
        fdflags |= Fdflags::APPEND;
    }
    if oflags.contains(OFlags::NONBLOCK) {
        fdflags |= Fdflags::NONBLOCK;
    }
    if oflags.contains(OFlags::SYNC) {
        fdflags |= Fdflags::SYNC;
    }
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        if oflags.contains(OFlags::DSYNC) {
            fdflags |= Fdflags::DSYNC;
        }
        if oflags.contains(OFlags::RSYNC) {
            fdflags |= Fdflags::RSYNC;
        }
    }
    fdflags
}
