use crate::ctx::WasiCtx;
use crate::fdentry::{Descriptor, EntryRights, FdEntry};
use crate::memory::*;
use crate::path::checked_path;
use crate::sys::fdentry_impl::determine_type_rights;
use crate::sys::{host_impl, hostcalls_impl};
use crate::wasi::{
    Dircookie, Dirent, Fd, Fdflags, Fdstat, Filedelta, Filesize, Fstflags, Lookupflags, Oflags,
    Rights, Size, Timestamp, Whence,
};
use crate::{Error, Result};
use cap_fs_ext::{DirEntryExt, DirExt};
use cap_std::fs::Dir;
use fs_set_times::{SetTimes, SystemTimeSpec};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileExt;
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};
use tracing::trace;

pub(crate) fn fd_advise(
    wasi_ctx: &mut WasiCtx,
    fd: Fd,
    offset: Filesize,
    len: Filesize,
    advice: u8,
) -> Result<()> {
    trace!(
        "fd_advise(fd={:?}, offset={}, len={}, advice={:?})",
        fd,
        offset,
        len,
        advice
    );

    wasi_ctx.get_fd_entry_checked(fd, EntryRights::from_base(Rights::FD_ADVISE))?;

    Err(Error::ENOSYS)
}

pub(crate) fn fd_allocate(
    wasi_ctx: &mut WasiCtx,
    fd: Fd,
    offset: Filesize,
    len: Filesize,
) -> Result<()> {
    trace!("fd_allocate(fd={:?}, offset={}, len={})", fd, offset, len);

    wasi_ctx.get_fd_entry_checked(fd, EntryRights::from_base(Rights::FD_ALLOCATE))?;

    Err(Error::ENOSYS)
}

pub(crate) fn fd_close(wasi_ctx: &mut WasiCtx, fd: Fd) -> Result<()> {
    trace!("fd_close(fd={:?})", fd);

    // Dropping the entry closes a host handle the layer opened; the process's
    // own stdio streams stay open.
    wasi_ctx.remove_fd_entry(fd)?;

    Ok(())
}

pub(crate) fn fd_datasync(wasi_ctx: &mut WasiCtx, fd: Fd) -> Result<()> {
    trace!("fd_datasync(fd={:?})", fd);

    let fe = wasi_ctx.get_fd_entry_checked(fd, EntryRights::from_base(Rights::FD_DATASYNC))?;
    fe.as_descriptor().as_file().sync_data()?;

    Ok(())
}

pub(crate) fn fd_sync(wasi_ctx: &mut WasiCtx, fd: Fd) -> Result<()> {
    trace!("fd_sync(fd={:?})", fd);

    let fe = wasi_ctx.get_fd_entry_checked(fd, EntryRights::from_base(Rights::FD_SYNC))?;
    fe.as_descriptor().as_file().sync_all()?;

    Ok(())
}

pub(crate) fn fd_fdstat_get(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    fd: Fd,
    fdstat_ptr: u32,
) -> Result<()> {
    trace!("fd_fdstat_get(fd={:?}, fdstat_ptr={:#x?})", fd, fdstat_ptr);

    let fe = wasi_ctx.get_fd_entry_mut(fd)?;
    let (file_type, rights) = fe.stat()?;
    let fdstat = Fdstat {
        fs_filetype: file_type,
        fs_flags: hostcalls_impl::fd_fdstat_get_flags(fe.as_descriptor())?,
        fs_rights_base: rights.base,
        fs_rights_inheriting: rights.inheriting,
    };

    trace!("     | *fdstat_ptr={:?}", fdstat);

    enc_fdstat_byref(memory.refresh(), fdstat_ptr, &fdstat)
}

pub(crate) fn fd_fdstat_set_flags(wasi_ctx: &mut WasiCtx, fd: Fd, fdflags: u16) -> Result<()> {
    trace!("fd_fdstat_set_flags(fd={:?}, fdflags={:#x?})", fd, fdflags);

    wasi_ctx.get_fd_entry_checked(fd, EntryRights::from_base(Rights::FD_FDSTAT_SET_FLAGS))?;

    Err(Error::ENOSYS)
}

/// Narrows the rights of `fd`. Asking for any right the descriptor does not
/// already hold fails with `EPERM` and leaves its rights untouched.
pub(crate) fn fd_fdstat_set_rights(
    wasi_ctx: &mut WasiCtx,
    fd: Fd,
    fs_rights_base: u64,
    fs_rights_inheriting: u64,
) -> Result<()> {
    trace!(
        "fd_fdstat_set_rights(fd={:?}, fs_rights_base={:#x?}, fs_rights_inheriting={:#x?})",
        fd,
        fs_rights_base,
        fs_rights_inheriting
    );

    let rights = EntryRights::new(
        Rights::from_bits_retain(fs_rights_base),
        Rights::from_bits_retain(fs_rights_inheriting),
    );
    let fe = wasi_ctx.get_fd_entry_checked(fd, rights)?;
    fe.set_rights(rights);

    Ok(())
}

pub(crate) fn fd_filestat_get(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    fd: Fd,
    filestat_ptr: u32,
) -> Result<()> {
    trace!("fd_filestat_get(fd={:?}, filestat_ptr={:#x?})", fd, filestat_ptr);

    let fe = wasi_ctx.get_fd_entry_checked(fd, EntryRights::from_base(Rights::FD_FILESTAT_GET))?;
    let file_type = fe.file_type()?;
    let metadata = fe.as_descriptor().as_file().metadata()?;
    let filestat = host_impl::filestat_from_metadata(&metadata, file_type)?;

    trace!("     | *filestat_ptr={:?}", filestat);

    enc_filestat_byref(memory.refresh(), filestat_ptr, &filestat)
}

pub(crate) fn fd_filestat_set_size(
    wasi_ctx: &mut WasiCtx,
    fd: Fd,
    st_size: Filesize,
) -> Result<()> {
    trace!("fd_filestat_set_size(fd={:?}, st_size={})", fd, st_size);

    let fe =
        wasi_ctx.get_fd_entry_checked(fd, EntryRights::from_base(Rights::FD_FILESTAT_SET_SIZE))?;
    fe.as_descriptor().as_file().set_len(st_size)?;

    Ok(())
}

/// Turns one `(set, set_now)` pair of `fstflags` bits into the change to
/// apply to that timestamp; `None` leaves it as it is.
fn time_spec(set: bool, set_now: bool, ts: Timestamp) -> Result<Option<SystemTimeSpec>> {
    match (set, set_now) {
        (true, true) => Err(Error::EINVAL),
        (true, false) => UNIX_EPOCH
            .checked_add(Duration::from_nanos(ts))
            .map(|t| Some(SystemTimeSpec::Absolute(t)))
            .ok_or(Error::EOVERFLOW),
        (false, true) => Ok(Some(SystemTimeSpec::SymbolicNow)),
        (false, false) => Ok(None),
    }
}

fn time_specs(
    st_atim: Timestamp,
    st_mtim: Timestamp,
    fst_flags: u16,
) -> Result<(Option<SystemTimeSpec>, Option<SystemTimeSpec>)> {
    let fst_flags = Fstflags::from_bits(fst_flags).ok_or(Error::EINVAL)?;
    let atim = time_spec(
        fst_flags.contains(Fstflags::ATIM),
        fst_flags.contains(Fstflags::ATIM_NOW),
        st_atim,
    )?;
    let mtim = time_spec(
        fst_flags.contains(Fstflags::MTIM),
        fst_flags.contains(Fstflags::MTIM_NOW),
        st_mtim,
    )?;
    Ok((atim, mtim))
}

pub(crate) fn fd_filestat_set_times(
    wasi_ctx: &mut WasiCtx,
    fd: Fd,
    st_atim: Timestamp,
    st_mtim: Timestamp,
    fst_flags: u16,
) -> Result<()> {
    trace!(
        "fd_filestat_set_times(fd={:?}, st_atim={}, st_mtim={}, fst_flags={:#x?})",
        fd,
        st_atim,
        st_mtim,
        fst_flags
    );

    let fe =
        wasi_ctx.get_fd_entry_checked(fd, EntryRights::from_base(Rights::FD_FILESTAT_SET_TIMES))?;
    let (atim, mtim) = time_specs(st_atim, st_mtim, fst_flags)?;
    SetTimes::set_times(&*fe.as_descriptor().as_file(), atim, mtim)?;

    Ok(())
}

fn preopen_name(fe: &FdEntry) -> Result<&str> {
    fe.preopen_path.as_deref().ok_or(Error::EINVAL)
}

pub(crate) fn fd_prestat_get(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    fd: Fd,
    prestat_ptr: u32,
) -> Result<()> {
    trace!("fd_prestat_get(fd={:?}, prestat_ptr={:#x?})", fd, prestat_ptr);

    let fe = wasi_ctx.get_fd_entry_checked(fd, EntryRights::empty())?;
    let name_len = u32::try_from(preopen_name(fe)?.len())?;

    trace!("     | *prestat_ptr.pr_name_len={:?}", name_len);

    enc_prestat_dir_byref(memory.refresh(), prestat_ptr, name_len)
}

pub(crate) fn fd_prestat_dir_name(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    fd: Fd,
    path_ptr: u32,
    path_len: Size,
) -> Result<()> {
    trace!(
        "fd_prestat_dir_name(fd={:?}, path_ptr={:#x?}, path_len={})",
        fd,
        path_ptr,
        path_len
    );

    let fe = wasi_ctx.get_fd_entry_checked(fd, EntryRights::empty())?;
    let name = preopen_name(fe)?.as_bytes();
    let name = &name[..name.len().min(path_len as usize)];

    trace!("     | (path_ptr,path_len)='{}'", String::from_utf8_lossy(name));

    enc_slice_of_u8(memory.refresh(), name, path_ptr)
}

pub(crate) fn fd_read(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    fd: Fd,
    iovs_ptr: u32,
    iovs_len: Size,
    nread: u32,
) -> Result<()> {
    trace!(
        "fd_read(fd={:?}, iovs_ptr={:#x?}, iovs_len={:?}, nread={:#x?})",
        fd,
        iovs_ptr,
        iovs_len,
        nread
    );

    let fe = wasi_ctx.get_fd_entry_checked(fd, EntryRights::from_base(Rights::FD_READ))?;
    let file = fe.as_descriptor().as_file();
    let mut file = &*file;

    let memory = memory.refresh();
    let iovs = dec_iovec_slice(memory, iovs_ptr, iovs_len)?;
    let mut total = 0usize;
    'iovs: for iov in &iovs {
        let buf = iov.as_slice_mut(memory)?;
        let mut r = 0;
        while r < buf.len() {
            let rr = file.read(&mut buf[r..])?;
            if rr == 0 {
                // End of file: the remaining iovecs stay untouched.
                break 'iovs;
            }
            r += rr;
            total += rr;
        }
    }

    let host_nread = u32::try_from(total)?;

    trace!("     | *nread={:?}", host_nread);

    enc_u32_byref(memory, nread, host_nread)
}

pub(crate) fn fd_pread(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    fd: Fd,
    iovs_ptr: u32,
    iovs_len: Size,
    offset: Filesize,
    nread: u32,
) -> Result<()> {
    trace!(
        "fd_pread(fd={:?}, iovs_ptr={:#x?}, iovs_len={:?}, offset={}, nread={:#x?})",
        fd,
        iovs_ptr,
        iovs_len,
        offset,
        nread
    );

    let fe = wasi_ctx.get_fd_entry_checked(
        fd,
        EntryRights::from_base(Rights::FD_READ | Rights::FD_SEEK),
    )?;
    let file = fe.as_descriptor().as_file();

    let memory = memory.refresh();
    let iovs = dec_iovec_slice(memory, iovs_ptr, iovs_len)?;
    let mut total: u64 = 0;
    'iovs: for iov in &iovs {
        let buf = iov.as_slice_mut(memory)?;
        let mut r = 0;
        while r < buf.len() {
            let at = offset
                .checked_add(total)
                .ok_or(Error::EOVERFLOW)?;
            let rr = file.read_at(&mut buf[r..], at)?;
            if rr == 0 {
                break 'iovs;
            }
            r += rr;
            total += rr as u64;
        }
    }

    let host_nread = u32::try_from(total)?;

    trace!("     | *nread={:?}", host_nread);

    enc_u32_byref(memory, nread, host_nread)
}

pub(crate) fn fd_write(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    fd: Fd,
    iovs_ptr: u32,
    iovs_len: Size,
    nwritten: u32,
) -> Result<()> {
    trace!(
        "fd_write(fd={:?}, iovs_ptr={:#x?}, iovs_len={:?}, nwritten={:#x?})",
        fd,
        iovs_ptr,
        iovs_len,
        nwritten
    );

    let fe = wasi_ctx.get_fd_entry_checked(fd, EntryRights::from_base(Rights::FD_WRITE))?;
    let file = fe.as_descriptor().as_file();
    let mut file = &*file;

    let memory = memory.refresh();
    let iovs = dec_iovec_slice(memory, iovs_ptr, iovs_len)?;
    let mut total = 0usize;
    for iov in &iovs {
        let buf = iov.as_slice(memory)?;
        let mut w = 0;
        while w < buf.len() {
            match file.write(&buf[w..])? {
                0 => return Err(Error::EIO),
                n => w += n,
            }
        }
        total += w;
    }

    let host_nwritten = u32::try_from(total)?;

    trace!("     | *nwritten={:?}", host_nwritten);

    enc_u32_byref(memory, nwritten, host_nwritten)
}

pub(crate) fn fd_pwrite(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    fd: Fd,
    iovs_ptr: u32,
    iovs_len: Size,
    offset: Filesize,
    nwritten: u32,
) -> Result<()> {
    trace!(
        "fd_pwrite(fd={:?}, iovs_ptr={:#x?}, iovs_len={:?}, offset={}, nwritten={:#x?})",
        fd,
        iovs_ptr,
        iovs_len,
        offset,
        nwritten
    );

    let fe = wasi_ctx.get_fd_entry_checked(
        fd,
        EntryRights::from_base(Rights::FD_WRITE | Rights::FD_SEEK),
    )?;
    let file = fe.as_descriptor().as_file();

    let memory = memory.refresh();
    let iovs = dec_iovec_slice(memory, iovs_ptr, iovs_len)?;
    let mut total: u64 = 0;
    for iov in &iovs {
        let buf = iov.as_slice(memory)?;
        let mut w = 0;
        while w < buf.len() {
            let at = offset
                .checked_add(total)
                .and_then(|at| at.checked_add(w as u64))
                .ok_or(Error::EOVERFLOW)?;
            match file.write_at(&buf[w..], at)? {
                0 => return Err(Error::EIO),
                n => w += n,
            }
        }
        total += w as u64;
    }

    let host_nwritten = u32::try_from(total)?;

    trace!("     | *nwritten={:?}", host_nwritten);

    enc_u32_byref(memory, nwritten, host_nwritten)
}

/// Lists the directory behind `fd` in name order, skipping the first `cookie`
/// entries. Each record is a dirent header followed by the entry's name; the
/// last record is cut short when `buf` fills up.
pub(crate) fn fd_readdir(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    fd: Fd,
    buf: u32,
    buf_len: Size,
    cookie: Dircookie,
    buf_used: u32,
) -> Result<()> {
    trace!(
        "fd_readdir(fd={:?}, buf={:#x?}, buf_len={}, cookie={:#x?}, buf_used={:#x?})",
        fd,
        buf,
        buf_len,
        cookie,
        buf_used,
    );

    let fe = wasi_ctx.get_fd_entry_checked(fd, EntryRights::from_base(Rights::FD_READDIR))?;
    let mut entries = fe.as_dir()?.entries()?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    let memory = memory.refresh();
    let out = dec_slice_of_mut_u8(memory, buf, buf_len)?;
    let mut used = 0;
    let skip = usize::try_from(cookie).unwrap_or(usize::MAX);
    for (i, entry) in entries.iter().enumerate().skip(skip) {
        let name = entry.file_name();
        let name = name.as_bytes();
        // Not following symlinks: a link is listed as a link.
        let stat = host_impl::filestat_from_cap_metadata(&entry.full_metadata()?)?;
        let dirent = Dirent {
            d_next: u64::try_from(i + 1)?,
            d_ino: stat.ino,
            d_namlen: u32::try_from(name.len())?,
            d_type: stat.filetype,
        };
        for chunk in [&dirent.to_bytes()[..], name] {
            let n = chunk.len().min(out.len() - used);
            out[used..used + n].copy_from_slice(&chunk[..n]);
            used += n;
        }
        if used == out.len() {
            break;
        }
    }

    let host_bufused = u32::try_from(used)?;

    trace!("     | *buf_used={:?}", host_bufused);

    enc_u32_byref(memory, buf_used, host_bufused)
}

pub(crate) fn fd_renumber(wasi_ctx: &mut WasiCtx, from: Fd, to: Fd) -> Result<()> {
    trace!("fd_renumber(from={:?}, to={:?})", from, to);

    wasi_ctx.get_fd_entry_checked(from, EntryRights::empty())?;
    wasi_ctx.get_fd_entry_checked(to, EntryRights::empty())?;

    if from == to {
        return Ok(());
    }

    let fe = wasi_ctx.remove_fd_entry(from)?;
    // The displaced entry is dropped here, closing its host handle.
    let _ = wasi_ctx.insert_fd_entry_at(to, fe);

    Ok(())
}

pub(crate) fn fd_seek(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    fd: Fd,
    offset: Filedelta,
    whence: u8,
    newoffset: u32,
) -> Result<()> {
    trace!(
        "fd_seek(fd={:?}, offset={:?}, whence={:?}, newoffset={:#x?})",
        fd,
        offset,
        whence,
        newoffset
    );

    let fe = wasi_ctx.get_fd_entry_checked(fd, EntryRights::from_base(Rights::FD_SEEK))?;
    let pos = match Whence::from_raw(whence).ok_or(Error::EINVAL)? {
        Whence::Cur => SeekFrom::Current(offset),
        Whence::End => SeekFrom::End(offset),
        Whence::Set => SeekFrom::Start(u64::try_from(offset).map_err(|_| Error::EINVAL)?),
    };
    let host_newoffset = (&*fe.as_descriptor().as_file()).seek(pos)?;

    trace!("     | *newoffset={:?}", host_newoffset);

    enc_u64_byref(memory.refresh(), newoffset, host_newoffset)
}

pub(crate) fn fd_tell(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    fd: Fd,
    newoffset: u32,
) -> Result<()> {
    trace!("fd_tell(fd={:?}, newoffset={:#x?})", fd, newoffset);

    let fe = wasi_ctx.get_fd_entry_checked(fd, EntryRights::from_base(Rights::FD_TELL))?;
    let host_offset = (&*fe.as_descriptor().as_file()).stream_position()?;

    trace!("     | *newoffset={:?}", host_offset);

    enc_u64_byref(memory.refresh(), newoffset, host_offset)
}

/// Checks `required` on `dirfd` and returns the directory capability behind
/// it.
fn checked_dir(wasi_ctx: &mut WasiCtx, dirfd: Fd, required: Rights) -> Result<&Dir> {
    wasi_ctx
        .get_fd_entry_checked(dirfd, EntryRights::from_base(required))?
        .as_dir()
}

/// Reads the guest path at `(path_ptr, path_len)`.
fn guest_path(memory: &mut dyn GuestMemory, path_ptr: u32, path_len: Size) -> Result<&Path> {
    let path = dec_str(memory.refresh(), path_ptr, path_len)?;

    trace!("     | (path_ptr,path_len)='{}'", path);

    checked_path(path)
}

fn follows_symlinks(flags: u32) -> bool {
    Lookupflags::from_bits_truncate(flags).contains(Lookupflags::SYMLINK_FOLLOW)
}

pub(crate) fn path_create_directory(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    dirfd: Fd,
    path_ptr: u32,
    path_len: Size,
) -> Result<()> {
    trace!(
        "path_create_directory(dirfd={:?}, path_ptr={:#x?}, path_len={})",
        dirfd,
        path_ptr,
        path_len,
    );

    let dir = checked_dir(wasi_ctx, dirfd, Rights::PATH_CREATE_DIRECTORY)?;
    let path = guest_path(memory, path_ptr, path_len)?;
    dir.create_dir(path)?;

    Ok(())
}

pub(crate) fn path_filestat_get(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    dirfd: Fd,
    dirflags: u32,
    path_ptr: u32,
    path_len: Size,
    filestat_ptr: u32,
) -> Result<()> {
    trace!(
        "path_filestat_get(dirfd={:?}, dirflags={:?}, path_ptr={:#x?}, path_len={}, filestat_ptr={:#x?})",
        dirfd,
        dirflags,
        path_ptr,
        path_len,
        filestat_ptr
    );

    let dir = checked_dir(wasi_ctx, dirfd, Rights::PATH_FILESTAT_GET)?;
    let path = guest_path(memory, path_ptr, path_len)?;
    let metadata = if follows_symlinks(dirflags) {
        dir.metadata(path)?
    } else {
        dir.symlink_metadata(path)?
    };
    let filestat = host_impl::filestat_from_cap_metadata(&metadata)?;

    trace!("     | *filestat_ptr={:?}", filestat);

    enc_filestat_byref(memory.refresh(), filestat_ptr, &filestat)
}

pub(crate) fn path_filestat_set_times(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    dirfd: Fd,
    dirflags: u32,
    path_ptr: u32,
    path_len: Size,
    st_atim: Timestamp,
    st_mtim: Timestamp,
    fst_flags: u16,
) -> Result<()> {
    trace!(
        "path_filestat_set_times(dirfd={:?}, dirflags={:?}, path_ptr={:#x?}, path_len={}, st_atim={}, st_mtim={}, fst_flags={:#x?})",
        dirfd,
        dirflags,
        path_ptr,
        path_len,
        st_atim,
        st_mtim,
        fst_flags
    );

    let dir = checked_dir(wasi_ctx, dirfd, Rights::PATH_FILESTAT_SET_TIMES)?;
    let path = guest_path(memory, path_ptr, path_len)?;
    let (atim, mtim) = time_specs(st_atim, st_mtim, fst_flags)?;
    let atim = atim.map(cap_fs_ext::SystemTimeSpec::from_std);
    let mtim = mtim.map(cap_fs_ext::SystemTimeSpec::from_std);
    if follows_symlinks(dirflags) {
        DirExt::set_times(&*dir, path, atim, mtim)?;
    } else {
        dir.set_symlink_times(path, atim, mtim)?;
    }

    Ok(())
}

pub(crate) fn path_link(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    old_dirfd: Fd,
    old_flags: u32,
    old_path_ptr: u32,
    old_path_len: Size,
    new_dirfd: Fd,
    new_path_ptr: u32,
    new_path_len: Size,
) -> Result<()> {
    trace!(
        "path_link(old_dirfd={:?}, old_flags={:?}, old_path_ptr={:#x?}, old_path_len={}, new_dirfd={:?}, new_path_ptr={:#x?}, new_path_len={})",
        old_dirfd,
        old_flags,
        old_path_ptr,
        old_path_len,
        new_dirfd,
        new_path_ptr,
        new_path_len,
    );

    checked_dir(wasi_ctx, old_dirfd, Rights::PATH_LINK_SOURCE)?;
    checked_dir(wasi_ctx, new_dirfd, Rights::PATH_LINK_TARGET)?;
    if follows_symlinks(old_flags) {
        trace!("     | following a symlink source is not supported");
        return Err(Error::EINVAL);
    }

    let old_path = guest_path(memory, old_path_ptr, old_path_len)?.to_owned();
    let new_path = guest_path(memory, new_path_ptr, new_path_len)?;
    let old_dir = wasi_ctx.get_fd_entry(old_dirfd)?.as_dir()?;
    let new_dir = wasi_ctx.get_fd_entry(new_dirfd)?.as_dir()?;
    old_dir.hard_link(old_path, new_dir, new_path)?;

    Ok(())
}

fn is_read(rights_base: Rights) -> bool {
    rights_base.intersects(Rights::FD_READ | Rights::FD_READDIR)
}

fn is_write(rights_base: Rights) -> bool {
    rights_base.intersects(
        Rights::FD_DATASYNC
            | Rights::FD_WRITE
            | Rights::FD_ALLOCATE
            | Rights::FD_FILESTAT_SET_SIZE,
    )
}

/// Rights `path_open` needs on the directory: `base` covers the lookup
/// itself, `inheriting` the descriptor it hands out.
fn path_open_rights(
    rights_base: Rights,
    rights_inheriting: Rights,
    oflags: Oflags,
    fdflags: Fdflags,
) -> EntryRights {
    let mut needed_base = Rights::PATH_OPEN;
    let mut needed_inheriting = rights_base | rights_inheriting;

    if oflags.contains(Oflags::CREAT) {
        needed_base |= Rights::PATH_CREATE_FILE;
    }
    if oflags.contains(Oflags::TRUNC) {
        needed_base |= Rights::PATH_FILESTAT_SET_SIZE;
    }

    if fdflags.contains(Fdflags::DSYNC) {
        needed_inheriting |= Rights::FD_DATASYNC;
    }
    if fdflags.intersects(Fdflags::RSYNC | Fdflags::SYNC) {
        needed_inheriting |= Rights::FD_SYNC;
    }
    if is_write(rights_base)
        && !fdflags.contains(Fdflags::APPEND)
        && !oflags.contains(Oflags::TRUNC)
    {
        needed_inheriting |= Rights::FD_SEEK;
    }

    EntryRights::new(needed_base, needed_inheriting)
}

/// Opens `path` beneath `dir`. Anything that turns out to be a directory is
/// kept as a directory capability.
fn open_beneath(
    dir: &Dir,
    path: &Path,
    rights_base: Rights,
    oflags: Oflags,
    fdflags: Fdflags,
    follow: bool,
) -> Result<Descriptor> {
    if oflags.contains(Oflags::DIRECTORY) {
        if oflags.intersects(Oflags::CREAT | Oflags::EXCL | Oflags::TRUNC) {
            return Err(Error::EINVAL);
        }
        let dir = if follow {
            dir.open_dir(path)?
        } else {
            dir.open_dir_nofollow(path)?
        };
        return Ok(Descriptor::Dir(dir));
    }

    let opts = hostcalls_impl::open_options(
        is_read(rights_base),
        is_write(rights_base),
        oflags,
        fdflags,
        follow,
    );
    let file = dir.open_with(path, &opts)?.into_std();
    if file.metadata()?.is_dir() {
        Ok(Descriptor::Dir(Dir::from_std_file(file)))
    } else {
        Ok(Descriptor::OsHandle(file))
    }
}

pub(crate) fn path_open(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    dirfd: Fd,
    dirflags: u32,
    path_ptr: u32,
    path_len: Size,
    oflags: u16,
    fs_rights_base: u64,
    fs_rights_inheriting: u64,
    fs_flags: u16,
    fd_out_ptr: u32,
) -> Result<()> {
    trace!(
        "path_open(dirfd={:?}, dirflags={:?}, path_ptr={:#x?}, path_len={:?}, oflags={:#x?}, fs_rights_base={:#x?}, fs_rights_inheriting={:#x?}, fs_flags={:#x?}, fd_out_ptr={:#x?})",
        dirfd,
        dirflags,
        path_ptr,
        path_len,
        oflags,
        fs_rights_base,
        fs_rights_inheriting,
        fs_flags,
        fd_out_ptr
    );

    let oflags = Oflags::from_bits(oflags).ok_or(Error::EINVAL)?;
    let fs_flags = Fdflags::from_bits(fs_flags).ok_or(Error::EINVAL)?;
    let requested = EntryRights::new(
        Rights::from_bits_retain(fs_rights_base),
        Rights::from_bits_retain(fs_rights_inheriting),
    );

    let needed = path_open_rights(requested.base, requested.inheriting, oflags, fs_flags);
    let dir_rights = wasi_ctx.get_fd_entry_checked(dirfd, needed)?.rights()?;
    let dir = wasi_ctx.get_fd_entry(dirfd)?.as_dir()?;
    let path = guest_path(memory, path_ptr, path_len)?;
    let descriptor = open_beneath(
        dir,
        path,
        requested.base,
        oflags,
        fs_flags,
        follows_symlinks(dirflags),
    )?;

    let mut fe = FdEntry::from_opened(descriptor, requested);
    let (_, canonical) = determine_type_rights(fe.as_descriptor())?;
    let inherited = EntryRights::new(dir_rights.inheriting, dir_rights.inheriting);
    fe.set_rights(requested.intersection(&inherited).intersection(&canonical));

    trace!("     | new rights {}", fe.rights()?);

    let guest_fd = wasi_ctx.insert_fd_entry(fe)?;

    trace!("     | *fd={:?}", guest_fd);

    enc_u32_byref(memory.refresh(), fd_out_ptr, guest_fd)
}

pub(crate) fn path_readlink(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    dirfd: Fd,
    path_ptr: u32,
    path_len: Size,
    buf_ptr: u32,
    buf_len: Size,
    buf_used: u32,
) -> Result<()> {
    trace!(
        "path_readlink(dirfd={:?}, path_ptr={:#x?}, path_len={:?}, buf_ptr={:#x?}, buf_len={}, buf_used={:#x?})",
        dirfd,
        path_ptr,
        path_len,
        buf_ptr,
        buf_len,
        buf_used,
    );

    let dir = checked_dir(wasi_ctx, dirfd, Rights::PATH_READLINK)?;
    let path = guest_path(memory, path_ptr, path_len)?;
    let target = dir.read_link(path)?;
    let target = target.as_os_str().as_bytes();
    let target = &target[..target.len().min(buf_len as usize)];

    let memory = memory.refresh();
    enc_slice_of_u8(memory, target, buf_ptr)?;

    let host_bufused = u32::try_from(target.len())?;

    trace!("     | *buf_used={:?}", host_bufused);

    enc_u32_byref(memory, buf_used, host_bufused)
}

pub(crate) fn path_remove_directory(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    dirfd: Fd,
    path_ptr: u32,
    path_len: Size,
) -> Result<()> {
    trace!(
        "path_remove_directory(dirfd={:?}, path_ptr={:#x?}, path_len={})",
        dirfd,
        path_ptr,
        path_len
    );

    let dir = checked_dir(wasi_ctx, dirfd, Rights::PATH_REMOVE_DIRECTORY)?;
    let path = guest_path(memory, path_ptr, path_len)?;
    dir.remove_dir(path)?;

    Ok(())
}

pub(crate) fn path_rename(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    old_dirfd: Fd,
    old_path_ptr: u32,
    old_path_len: Size,
    new_dirfd: Fd,
    new_path_ptr: u32,
    new_path_len: Size,
) -> Result<()> {
    trace!(
        "path_rename(old_dirfd={:?}, old_path_ptr={:#x?}, old_path_len={:?}, new_dirfd={:?}, new_path_ptr={:#x?}, new_path_len={:?})",
        old_dirfd,
        old_path_ptr,
        old_path_len,
        new_dirfd,
        new_path_ptr,
        new_path_len,
    );

    checked_dir(wasi_ctx, old_dirfd, Rights::PATH_RENAME_SOURCE)?;
    checked_dir(wasi_ctx, new_dirfd, Rights::PATH_RENAME_TARGET)?;

    let old_path = guest_path(memory, old_path_ptr, old_path_len)?.to_owned();
    let new_path = guest_path(memory, new_path_ptr, new_path_len)?;
    let old_dir = wasi_ctx.get_fd_entry(old_dirfd)?.as_dir()?;
    let new_dir = wasi_ctx.get_fd_entry(new_dirfd)?.as_dir()?;
    old_dir.rename(old_path, new_dir, new_path)?;

    Ok(())
}

pub(crate) fn path_symlink(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    old_path_ptr: u32,
    old_path_len: Size,
    dirfd: Fd,
    new_path_ptr: u32,
    new_path_len: Size,
) -> Result<()> {
    trace!(
        "path_symlink(old_path_ptr={:#x?}, old_path_len={}, dirfd={:?}, new_path_ptr={:#x?}, new_path_len={})",
        old_path_ptr,
        old_path_len,
        dirfd,
        new_path_ptr,
        new_path_len
    );

    let dir = checked_dir(wasi_ctx, dirfd, Rights::PATH_SYMLINK)?;
    let new_path = guest_path(memory, new_path_ptr, new_path_len)?.to_owned();
    // The target is stored as given; only the link itself is placed beneath
    // the directory.
    let old_path = dec_str(memory.refresh(), old_path_ptr, old_path_len)?;

    trace!("     | (old_path_ptr,old_path_len)='{}'", old_path);

    dir.symlink(old_path, new_path)?;

    Ok(())
}

pub(crate) fn path_unlink_file(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    dirfd: Fd,
    path_ptr: u32,
    path_len: Size,
) -> Result<()> {
    trace!(
        "path_unlink_file(dirfd={:?}, path_ptr={:#x?}, path_len={})",
        dirfd,
        path_ptr,
        path_len
    );

    let dir = checked_dir(wasi_ctx, dirfd, Rights::PATH_UNLINK_FILE)?;
    let path = guest_path(memory, path_ptr, path_len)?;
    dir.remove_file(path)?;

    Ok(())
}
