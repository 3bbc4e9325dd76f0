use super::host_impl;
use crate::wasi::{Clockid, Fdflags, Oflags, Timestamp};
use crate::{Error, Result};
use cap_fs_ext::{FollowSymlinks, OpenOptionsFollowExt, OpenOptionsMaybeDirExt};
use cap_std::fs::OpenOptions;
use rustix::fs::OFlags;
use rustix::time::{ClockId, Timespec};
use std::os::fd::AsFd;
use cap_fs_ext::OpenOptionsExt;

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        const DSYNC: OFlags = OFlags::DSYNC;
        const RSYNC: OFlags = OFlags::RSYNC;
    } else {
        // Hosts without data-only or read sync fall back to full sync.
        const DSYNC: OFlags = OFlags::SYNC;
        const RSYNC: OFlags = OFlags::SYNC;
    }
}

/// Computes the host open options for a guest `path_open`.
///
/// Creating or truncating needs a writable handle; without any access right
/// the file is opened read-only. Directories may be opened too, so that a
/// directory reached this way can serve as a `dirfd`.
pub(crate) fn open_options(
    read: bool,
    write: bool,
    oflags: Oflags,
    fdflags: Fdflags,
    follow: bool,
) -> OpenOptions {
    let mut opts = OpenOptions::new();
    opts.read(read || !write).write(write).maybe_dir(true);
    opts.follow(if follow {
        FollowSymlinks::Yes
    } else {
        FollowSymlinks::No
    });
    if oflags.contains(Oflags::CREAT) {
        if oflags.contains(Oflags::EXCL) {
            opts.create_new(true);
        } else {
            opts.create(true);
        }
        opts.write(true);
    }
    if oflags.contains(Oflags::TRUNC) {
        opts.truncate(true).write(true);
    }
    if fdflags.contains(Fdflags::APPEND) {
        opts.append(true);
    }
    opts.mode(0o666).custom_flags(status_flags(fdflags).bits() as i32);
    opts
}

/// The `open(2)` status flags with no dedicated open option.
fn status_flags(fdflags: Fdflags) -> OFlags {
    let mut flags = OFlags::empty();
    if fdflags.contains(Fdflags::DSYNC) {
        flags |= DSYNC;
    }
    if fdflags.contains(Fdflags::NONBLOCK) {
        flags |= OFlags::NONBLOCK;
    }
    if fdflags.contains(Fdflags::RSYNC) {
        flags |= RSYNC;
    }
    if fdflags.contains(Fdflags::SYNC) {
        flags |= OFlags::SYNC;
    }
    flags
}

/// The status flags currently set on a host descriptor.
pub(crate) fn fd_fdstat_get_flags<Fd: AsFd>(fd: Fd) -> Result<Fdflags> {
    let flags = rustix::fs::fcntl_getfl(fd)?;
    Ok(host_impl::fdflags_from_host(flags))
}

fn timestamp_from_timespec(ts: Timespec) -> Result<Timestamp> {
    u64::try_from(ts.tv_sec)?
        .checked_mul(1_000_000_000)
        .and_then(|sec_nsec| sec_nsec.checked_add(ts.tv_nsec as u64))
        .ok_or(Error::EOVERFLOW)
}

fn host_clock(clock_id: Clockid) -> ClockId {
    match clock_id {
        Clockid::Realtime => ClockId::Realtime,
        // CPU time is approximated from the monotonic clock.
        Clockid::Monotonic | Clockid::ProcessCputimeId | Clockid::ThreadCputimeId => {
            ClockId::Monotonic
        }
    }
}

pub(crate) fn clock_res_get(clock_id: Clockid) -> Result<Timestamp> {
    let resolution = timestamp_from_timespec(rustix::time::clock_getres(host_clock(clock_id)))?;
    // A clock resolution of zero is nonsensical; report at least one nanosecond.
    Ok(resolution.max(1))
}

/// Reads the host clock backing `clock_id`. CPU-time clocks are measured
/// from `cputime_start`, a monotonic reading taken when the context was built.
pub(crate) fn clock_time_get(clock_id: Clockid, cputime_start: Timestamp) -> Result<Timestamp> {
    let now = timestamp_from_timespec(rustix::time::clock_gettime(host_clock(clock_id)))?;
    match clock_id {
        Clockid::ProcessCputimeId | Clockid::ThreadCputimeId => Ok(now.saturating_sub(cputime_start)),
        Clockid::Monotonic | Clockid::Realtime => Ok(now),
    }
}

pub(crate) fn monotonic_now() -> Result<Timestamp> {
    clock_time_get(Clockid::Monotonic, 0)
}

/// Delivers `signo` to the calling process.
pub(crate) fn raise(signo: libc::c_int) -> Result<()> {
    // SAFETY: `raise` has no memory-safety preconditions.
    if unsafe { libc::raise(signo) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}
