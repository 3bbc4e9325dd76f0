//! The `wasi_snapshot_preview1` import surface.
//!
//! Each method takes the raw integer arguments of the corresponding WASI
//! import, plus the guest's linear memory where the call reads or writes it,
//! and returns the WASI errno the guest observes (`0` on success). Host
//! failures never escape as Rust errors past this boundary.
use crate::ctx::WasiCtx;
use crate::hostcalls_impl;
use crate::memory::GuestMemory;
use crate::wasi::{Dircookie, Exitcode, Fd, Filedelta, Filesize, Size, Timestamp};
use crate::{Result, WasiError};
use tracing::trace;

/// Folds a hostcall result into the errno returned to the guest.
fn wrap(result: Result<()>) -> u16 {
    match result {
        Ok(()) => WasiError::ESUCCESS.as_raw_errno(),
        Err(e) => {
            let errno = e.as_wasi_error();
            trace!("     -> errno={:?} ({})", errno, e);
            errno.as_raw_errno()
        }
    }
}

pub trait WasiSnapshotPreview1 {
    fn args_get(&mut self, memory: &mut dyn GuestMemory, argv_ptr: u32, argv_buf: u32) -> u16;
    fn args_sizes_get(
        &mut self,
        memory: &mut dyn GuestMemory,
        argc_ptr: u32,
        argv_buf_size_ptr: u32,
    ) -> u16;
    fn environ_get(
        &mut self,
        memory: &mut dyn GuestMemory,
        environ_ptr: u32,
        environ_buf: u32,
    ) -> u16;
    fn environ_sizes_get(
        &mut self,
        memory: &mut dyn GuestMemory,
        environ_count_ptr: u32,
        environ_size_ptr: u32,
    ) -> u16;
    fn clock_res_get(
        &mut self,
        memory: &mut dyn GuestMemory,
        clock_id: u32,
        resolution_ptr: u32,
    ) -> u16;
    fn clock_time_get(
        &mut self,
        memory: &mut dyn GuestMemory,
        clock_id: u32,
        precision: Timestamp,
        time_ptr: u32,
    ) -> u16;
    fn fd_advise(&mut self, fd: Fd, offset: Filesize, len: Filesize, advice: u8) -> u16;
    fn fd_allocate(&mut self, fd: Fd, offset: Filesize, len: Filesize) -> u16;
    fn fd_close(&mut self, fd: Fd) -> u16;
    fn fd_datasync(&mut self, fd: Fd) -> u16;
    fn fd_fdstat_get(&mut self, memory: &mut dyn GuestMemory, fd: Fd, fdstat_ptr: u32) -> u16;
    fn fd_fdstat_set_flags(&mut self, fd: Fd, fdflags: u16) -> u16;
    fn fd_fdstat_set_rights(
        &mut self,
        fd: Fd,
        fs_rights_base: u64,
        fs_rights_inheriting: u64,
    ) -> u16;
    fn fd_filestat_get(&mut self, memory: &mut dyn GuestMemory, fd: Fd, filestat_ptr: u32)
    -> u16;
    fn fd_filestat_set_size(&mut self, fd: Fd, st_size: Filesize) -> u16;
    fn fd_filestat_set_times(
        &mut self,
        fd: Fd,
        st_atim: Timestamp,
        st_mtim: Timestamp,
        fst_flags: u16,
    ) -> u16;
    fn fd_pread(
        &mut self,
        memory: &mut dyn GuestMemory,
        fd: Fd,
        iovs_ptr: u32,
        iovs_len: Size,
        offset: Filesize,
        nread: u32,
    ) -> u16;
    fn fd_prestat_get(&mut self, memory: &mut dyn GuestMemory, fd: Fd, prestat_ptr: u32) -> u16;
    fn fd_prestat_dir_name(
        &mut self,
        memory: &mut dyn GuestMemory,
        fd: Fd,
        path_ptr: u32,
        path_len: Size,
    ) -> u16;
    fn fd_pwrite(
        &mut self,
        memory: &mut dyn GuestMemory,
        fd: Fd,
        iovs_ptr: u32,
        iovs_len: Size,
        offset: Filesize,
        nwritten: u32,
    ) -> u16;
    fn fd_read(
        &mut self,
        memory: &mut dyn GuestMemory,
        fd: Fd,
        iovs_ptr: u32,
        iovs_len: Size,
        nread: u32,
    ) -> u16;
    fn fd_readdir(
        &mut self,
        memory: &mut dyn GuestMemory,
        fd: Fd,
        buf: u32,
        buf_len: Size,
        cookie: Dircookie,
        buf_used: u32,
    ) -> u16;
    fn fd_renumber(&mut self, from: Fd, to: Fd) -> u16;
    fn fd_seek(
        &mut self,
        memory: &mut dyn GuestMemory,
        fd: Fd,
        offset: Filedelta,
        whence: u8,
        newoffset: u32,
    ) -> u16;
    fn fd_sync(&mut self, fd: Fd) -> u16;
    fn fd_tell(&mut self, memory: &mut dyn GuestMemory, fd: Fd, newoffset: u32) -> u16;
    fn fd_write(
        &mut self,
        memory: &mut dyn GuestMemory,
        fd: Fd,
        iovs_ptr: u32,
        iovs_len: Size,
        nwritten: u32,
    ) -> u16;
    fn path_create_directory(
        &mut self,
        memory: &mut dyn GuestMemory,
        dirfd: Fd,
        path_ptr: u32,
        path_len: Size,
    ) -> u16;
    fn path_filestat_get(
        &mut self,
        memory: &mut dyn GuestMemory,
        dirfd: Fd,
        dirflags: u32,
        path_ptr: u32,
        path_len: Size,
        filestat_ptr: u32,
    ) -> u16;
    #[allow(clippy::too_many_arguments)]
    fn path_filestat_set_times(
        &mut self,
        memory: &mut dyn GuestMemory,
        dirfd: Fd,
        dirflags: u32,
        path_ptr: u32,
        path_len: Size,
        st_atim: Timestamp,
        st_mtim: Timestamp,
        fst_flags: u16,
    ) -> u16;
    #[allow(clippy::too_many_arguments)]
    fn path_link(
        &mut self,
        memory: &mut dyn GuestMemory,
        old_dirfd: Fd,
        old_flags: u32,
        old_path_ptr: u32,
        old_path_len: Size,
        new_dirfd: Fd,
        new_path_ptr: u32,
        new_path_len: Size,
    ) -> u16;
    #[allow(clippy::too_many_arguments)]
    fn path_open(
        &mut self,
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
    ) -> u16;
    #[allow(clippy::too_many_arguments)]
    fn path_readlink(
        &mut self,
        memory: &mut dyn GuestMemory,
        dirfd: Fd,
        path_ptr: u32,
        path_len: Size,
        buf_ptr: u32,
        buf_len: Size,
        buf_used: u32,
    ) -> u16;
    fn path_remove_directory(
        &mut self,
        memory: &mut dyn GuestMemory,
        dirfd: Fd,
        path_ptr: u32,
        path_len: Size,
    ) -> u16;
    #[allow(clippy::too_many_arguments)]
    fn path_rename(
        &mut self,
        memory: &mut dyn GuestMemory,
        old_dirfd: Fd,
        old_path_ptr: u32,
        old_path_len: Size,
        new_dirfd: Fd,
        new_path_ptr: u32,
        new_path_len: Size,
    ) -> u16;
    fn path_symlink(
        &mut self,
        memory: &mut dyn GuestMemory,
        old_path_ptr: u32,
        old_path_len: Size,
        dirfd: Fd,
        new_path_ptr: u32,
        new_path_len: Size,
    ) -> u16;
    fn path_unlink_file(
        &mut self,
        memory: &mut dyn GuestMemory,
        dirfd: Fd,
        path_ptr: u32,
        path_len: Size,
    ) -> u16;
    fn poll_oneoff(
        &mut self,
        memory: &mut dyn GuestMemory,
        input: u32,
        output: u32,
        nsubscriptions: Size,
        nevents: u32,
    ) -> u16;
    /// Terminates the host process with `rval`.
    fn proc_exit(&mut self, rval: Exitcode) -> !;
    fn proc_raise(&mut self, sig: u8) -> u16;
    fn random_get(&mut self, memory: &mut dyn GuestMemory, buf_ptr: u32, buf_len: Size) -> u16;
    fn sched_yield(&mut self) -> u16;
    #[allow(clippy::too_many_arguments)]
    fn sock_recv(
        &mut self,
        sock: Fd,
        ri_data: u32,
        ri_data_len: Size,
        ri_flags: u16,
        ro_datalen: u32,
        ro_flags: u32,
    ) -> u16;
    fn sock_send(
        &mut self,
        sock: Fd,
        si_data: u32,
        si_data_len: Size,
        si_flags: u16,
        so_datalen: u32,
    ) -> u16;
    fn sock_shutdown(&mut self, sock: Fd, how: u8) -> u16;
}

impl WasiSnapshotPreview1 for WasiCtx {
    fn args_get(&mut self, memory: &mut dyn GuestMemory, argv_ptr: u32, argv_buf: u32) -> u16 {
        wrap(hostcalls_impl::args_get(self, memory, argv_ptr, argv_buf))
    }

    fn args_sizes_get(
        &mut self,
        memory: &mut dyn GuestMemory,
        argc_ptr: u32,
        argv_buf_size_ptr: u32,
    ) -> u16 {
        wrap(hostcalls_impl::args_sizes_get(
            self,
            memory,
            argc_ptr,
            argv_buf_size_ptr,
        ))
    }

    fn environ_get(
        &mut self,
        memory: &mut dyn GuestMemory,
        environ_ptr: u32,
        environ_buf: u32,
    ) -> u16 {
        wrap(hostcalls_impl::environ_get(
            self,
            memory,
            environ_ptr,
            environ_buf,
        ))
    }

    fn environ_sizes_get(
        &mut self,
        memory: &mut dyn GuestMemory,
        environ_count_ptr: u32,
        environ_size_ptr: u32,
    ) -> u16 {
        wrap(hostcalls_impl::environ_sizes_get(
            self,
            memory,
            environ_count_ptr,
            environ_size_ptr,
        ))
    }

    fn clock_res_get(
        &mut self,
        memory: &mut dyn GuestMemory,
        clock_id: u32,
        resolution_ptr: u32,
    ) -> u16 {
        wrap(hostcalls_impl::clock_res_get(
            memory,
            clock_id,
            resolution_ptr,
        ))
    }

    fn clock_time_get(
        &mut self,
        memory: &mut dyn GuestMemory,
        clock_id: u32,
        precision: Timestamp,
        time_ptr: u32,
    ) -> u16 {
        wrap(hostcalls_impl::clock_time_get(
            self, memory, clock_id, precision, time_ptr,
        ))
    }

    fn fd_advise(&mut self, fd: Fd, offset: Filesize, len: Filesize, advice: u8) -> u16 {
        wrap(hostcalls_impl::fd_advise(self, fd, offset, len, advice))
    }

    fn fd_allocate(&mut self, fd: Fd, offset: Filesize, len: Filesize) -> u16 {
        wrap(hostcalls_impl::fd_allocate(self, fd, offset, len))
    }

    fn fd_close(&mut self, fd: Fd) -> u16 {
        wrap(hostcalls_impl::fd_close(self, fd))
    }

    fn fd_datasync(&mut self, fd: Fd) -> u16 {
        wrap(hostcalls_impl::fd_datasync(self, fd))
    }

    fn fd_fdstat_get(&mut self, memory: &mut dyn GuestMemory, fd: Fd, fdstat_ptr: u32) -> u16 {
        wrap(hostcalls_impl::fd_fdstat_get(self, memory, fd, fdstat_ptr))
    }

    fn fd_fdstat_set_flags(&mut self, fd: Fd, fdflags: u16) -> u16 {
        wrap(hostcalls_impl::fd_fdstat_set_flags(self, fd, fdflags))
    }

    fn fd_fdstat_set_rights(
        &mut self,
        fd: Fd,
        fs_rights_base: u64,
        fs_rights_inheriting: u64,
    ) -> u16 {
        wrap(hostcalls_impl::fd_fdstat_set_rights(
            self,
            fd,
            fs_rights_base,
            fs_rights_inheriting,
        ))
    }

    fn fd_filestat_get(
        &mut self,
        memory: &mut dyn GuestMemory,
        fd: Fd,
        filestat_ptr: u32,
    ) -> u16 {
        wrap(hostcalls_impl::fd_filestat_get(
            self,
            memory,
            fd,
            filestat_ptr,
        ))
    }

    fn fd_filestat_set_size(&mut self, fd: Fd, st_size: Filesize) -> u16 {
        wrap(hostcalls_impl::fd_filestat_set_size(self, fd, st_size))
    }

    fn fd_filestat_set_times(
        &mut self,
        fd: Fd,
        st_atim: Timestamp,
        st_mtim: Timestamp,
        fst_flags: u16,
    ) -> u16 {
        wrap(hostcalls_impl::fd_filestat_set_times(
            self, fd, st_atim, st_mtim, fst_flags,
        ))
    }

    fn fd_pread(
        &mut self,
        memory: &mut dyn GuestMemory,
        fd: Fd,
        iovs_ptr: u32,
        iovs_len: Size,
        offset: Filesize,
        nread: u32,
    ) -> u16 {
        wrap(hostcalls_impl::fd_pread(
            self, memory, fd, iovs_ptr, iovs_len, offset, nread,
        ))
    }

    fn fd_prestat_get(&mut self, memory: &mut dyn GuestMemory, fd: Fd, prestat_ptr: u32) -> u16 {
        wrap(hostcalls_impl::fd_prestat_get(self, memory, fd, prestat_ptr))
    }

    fn fd_prestat_dir_name(
        &mut self,
        memory: &mut dyn GuestMemory,
        fd: Fd,
        path_ptr: u32,
        path_len: Size,
    ) -> u16 {
        wrap(hostcalls_impl::fd_prestat_dir_name(
            self, memory, fd, path_ptr, path_len,
        ))
    }

    fn fd_pwrite(
        &mut self,
        memory: &mut dyn GuestMemory,
        fd: Fd,
        iovs_ptr: u32,
        iovs_len: Size,
        offset: Filesize,
        nwritten: u32,
    ) -> u16 {
        wrap(hostcalls_impl::fd_pwrite(
            self, memory, fd, iovs_ptr, iovs_len, offset, nwritten,
        ))
    }

    fn fd_read(
        &mut self,
        memory: &mut dyn GuestMemory,
        fd: Fd,
        iovs_ptr: u32,
        iovs_len: Size,
        nread: u32,
    ) -> u16 {
        wrap(hostcalls_impl::fd_read(
            self, memory, fd, iovs_ptr, iovs_len, nread,
        ))
    }

    fn fd_readdir(
        &mut self,
        memory: &mut dyn GuestMemory,
        fd: Fd,
        buf: u32,
        buf_len: Size,
        cookie: Dircookie,
        buf_used: u32,
    ) -> u16 {
        wrap(hostcalls_impl::fd_readdir(
            self, memory, fd, buf, buf_len, cookie, buf_used,
        ))
    }

    fn fd_renumber(&mut self, from: Fd, to: Fd) -> u16 {
        wrap(hostcalls_impl::fd_renumber(self, from, to))
    }

    fn fd_seek(
        &mut self,
        memory: &mut dyn GuestMemory,
        fd: Fd,
        offset: Filedelta,
        whence: u8,
        newoffset: u32,
    ) -> u16 {
        wrap(hostcalls_impl::fd_seek(
            self, memory, fd, offset, whence, newoffset,
        ))
    }

    fn fd_sync(&mut self, fd: Fd) -> u16 {
        wrap(hostcalls_impl::fd_sync(self, fd))
    }

    fn fd_tell(&mut self, memory: &mut dyn GuestMemory, fd: Fd, newoffset: u32) -> u16 {
        wrap(hostcalls_impl::fd_tell(self, memory, fd, newoffset))
    }

    fn fd_write(
        &mut self,
        memory: &mut dyn GuestMemory,
        fd: Fd,
        iovs_ptr: u32,
        iovs_len: Size,
        nwritten: u32,
    ) -> u16 {
        wrap(hostcalls_impl::fd_write(
            self, memory, fd, iovs_ptr, iovs_len, nwritten,
        ))
    }

    fn path_create_directory(
        &mut self,
        memory: &mut dyn GuestMemory,
        dirfd: Fd,
        path_ptr: u32,
        path_len: Size,
    ) -> u16 {
        wrap(hostcalls_impl::path_create_directory(
            self, memory, dirfd, path_ptr, path_len,
        ))
    }

    fn path_filestat_get(
        &mut self,
        memory: &mut dyn GuestMemory,
        dirfd: Fd,
        dirflags: u32,
        path_ptr: u32,
        path_len: Size,
        filestat_ptr: u32,
    ) -> u16 {
        wrap(hostcalls_impl::path_filestat_get(
            self,
            memory,
            dirfd,
            dirflags,
            path_ptr,
            path_len,
            filestat_ptr,
        ))
    }

    fn path_filestat_set_times(
        &mut self,
        memory: &mut dyn GuestMemory,
        dirfd: Fd,
        dirflags: u32,
        path_ptr: u32,
        path_len: Size,
        st_atim: Timestamp,
        st_mtim: Timestamp,
        fst_flags: u16,
    ) -> u16 {
        wrap(hostcalls_impl::path_filestat_set_times(
            self, memory, dirfd, dirflags, path_ptr, path_len, st_atim, st_mtim, fst_flags,
        ))
    }

    fn path_link(
        &mut self,
        memory: &mut dyn GuestMemory,
        old_dirfd: Fd,
        old_flags: u32,
        old_path_ptr: u32,
        old_path_len: Size,
        new_dirfd: Fd,
        new_path_ptr: u32,
        new_path_len: Size,
    ) -> u16 {
        wrap(hostcalls_impl::path_link(
            self,
            memory,
            old_dirfd,
            old_flags,
            old_path_ptr,
            old_path_len,
            new_dirfd,
            new_path_ptr,
            new_path_len,
        ))
    }

    fn path_open(
        &mut self,
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
    ) -> u16 {
        wrap(hostcalls_impl::path_open(
            self,
            memory,
            dirfd,
            dirflags,
            path_ptr,
            path_len,
            oflags,
            fs_rights_base,
            fs_rights_inheriting,
            fs_flags,
            fd_out_ptr,
        ))
    }

    fn path_readlink(
        &mut self,
        memory: &mut dyn GuestMemory,
        dirfd: Fd,
        path_ptr: u32,
        path_len: Size,
        buf_ptr: u32,
        buf_len: Size,
        buf_used: u32,
    ) -> u16 {
        wrap(hostcalls_impl::path_readlink(
            self, memory, dirfd, path_ptr, path_len, buf_ptr, buf_len, buf_used,
        ))
    }

    fn path_remove_directory(
        &mut self,
        memory: &mut dyn GuestMemory,
        dirfd: Fd,
        path_ptr: u32,
        path_len: Size,
    ) -> u16 {
        wrap(hostcalls_impl::path_remove_directory(
            self, memory, dirfd, path_ptr, path_len,
        ))
    }

    fn path_rename(
        &mut self,
        memory: &mut dyn GuestMemory,
        old_dirfd: Fd,
        old_path_ptr: u32,
        old_path_len: Size,
        new_dirfd: Fd,
        new_path_ptr: u32,
        new_path_len: Size,
    ) -> u16 {
        wrap(hostcalls_impl::path_rename(
            self,
            memory,
            old_dirfd,
            old_path_ptr,
            old_path_len,
            new_dirfd,
            new_path_ptr,
            new_path_len,
        ))
    }

    fn path_symlink(
        &mut self,
        memory: &mut dyn GuestMemory,
        old_path_ptr: u32,
        old_path_len: Size,
        dirfd: Fd,
        new_path_ptr: u32,
        new_path_len: Size,
    ) -> u16 {
        wrap(hostcalls_impl::path_symlink(
            self,
            memory,
            old_path_ptr,
            old_path_len,
            dirfd,
            new_path_ptr,
            new_path_len,
        ))
    }

    fn path_unlink_file(
        &mut self,
        memory: &mut dyn GuestMemory,
        dirfd: Fd,
        path_ptr: u32,
        path_len: Size,
    ) -> u16 {
        wrap(hostcalls_impl::path_unlink_file(
            self, memory, dirfd, path_ptr, path_len,
        ))
    }

    fn poll_oneoff(
        &mut self,
        memory: &mut dyn GuestMemory,
        input: u32,
        output: u32,
        nsubscriptions: Size,
        nevents: u32,
    ) -> u16 {
        wrap(hostcalls_impl::poll_oneoff(
            self,
            memory,
            input,
            output,
            nsubscriptions,
            nevents,
        ))
    }

    fn proc_exit(&mut self, rval: Exitcode) -> ! {
        hostcalls_impl::proc_exit(rval)
    }

    fn proc_raise(&mut self, sig: u8) -> u16 {
        wrap(hostcalls_impl::proc_raise(sig))
    }

    fn random_get(&mut self, memory: &mut dyn GuestMemory, buf_ptr: u32, buf_len: Size) -> u16 {
        wrap(hostcalls_impl::random_get(self, memory, buf_ptr, buf_len))
    }

    fn sched_yield(&mut self) -> u16 {
        wrap(hostcalls_impl::sched_yield())
    }

    fn sock_recv(
        &mut self,
        sock: Fd,
        ri_data: u32,
        ri_data_len: Size,
        ri_flags: u16,
        ro_datalen: u32,
        ro_flags: u32,
    ) -> u16 {
        wrap(hostcalls_impl::sock_recv(
            self,
            sock,
            ri_data,
            ri_data_len,
            ri_flags,
            ro_datalen,
            ro_flags,
        ))
    }

    fn sock_send(
        &mut self,
        sock: Fd,
        si_data: u32,
        si_data_len: Size,
        si_flags: u16,
        so_datalen: u32,
    ) -> u16 {
        wrap(hostcalls_impl::sock_send(
            self,
            sock,
            si_data,
            si_data_len,
            si_flags,
            so_datalen,
        ))
    }

    fn sock_shutdown(&mut self, sock: Fd, how: u8) -> u16 {
        wrap(hostcalls_impl::sock_shutdown(self, sock, how))
    }
}
