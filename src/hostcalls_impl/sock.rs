//! Sockets are not supported. The calls still check the descriptor's rights
//! so that `EBADF` and `EPERM` take precedence over `ENOSYS`.
use crate::ctx::WasiCtx;
use crate::fdentry::EntryRights;
use crate::wasi::{Fd, Rights, Size};
use crate::{Error, Result};
use tracing::trace;

pub(crate) fn sock_recv(
    wasi_ctx: &mut WasiCtx,
    sock: Fd,
    ri_data: u32,
    ri_data_len: Size,
    ri_flags: u16,
    ro_datalen: u32,
    ro_flags: u32,
) -> Result<()> {
    trace!(
        "sock_recv(sock={:?}, ri_data={:#x?}, ri_data_len={}, ri_flags={:#x?}, ro_datalen={:#x?}, ro_flags={:#x?})",
        sock,
        ri_data,
        ri_data_len,
        ri_flags,
        ro_datalen,
        ro_flags
    );

    wasi_ctx.get_fd_entry_checked(sock, EntryRights::from_base(Rights::FD_READ))?;

    Err(Error::ENOSYS)
}

pub(crate) fn sock_send(
    wasi_ctx: &mut WasiCtx,
    sock: Fd,
    si_data: u32,
    si_data_len: Size,
    si_flags: u16,
    so_datalen: u32,
) -> Result<()> {
    trace!(
        "sock_send(sock={:?}, si_data={:#x?}, si_data_len={}, si_flags={:#x?}, so_datalen={:#x?})",
        sock,
        si_data,
        si_data_len,
        si_flags,
        so_datalen
    );

    wasi_ctx.get_fd_entry_checked(sock, EntryRights::from_base(Rights::FD_WRITE))?;

    Err(Error::ENOSYS)
}

pub(crate) fn sock_shutdown(wasi_ctx: &mut WasiCtx, sock: Fd, how: u8) -> Result<()> {
    trace!("sock_shutdown(sock={:?}, how={:?})", sock, how);

    wasi_ctx.get_fd_entry_checked(sock, EntryRights::from_base(Rights::SOCK_SHUTDOWN))?;

    Err(Error::ENOSYS)
}
