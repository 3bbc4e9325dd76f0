use crate::ctx::WasiCtx;
use crate::memory::*;
use crate::sys::{host_impl, hostcalls_impl};
use crate::wasi::{
    Clockid, EVENT_SIZE, Event, Eventtype, Exitcode, SUBSCRIPTION_SIZE, Size,
    Subclockflags, Timestamp,
};
use crate::{Error, Result, WasiError};
use cap_rand::RngCore;
use std::ffi::CString;
use tracing::trace;

/// Writes `strings` NUL-terminated and back to back at `buf`, and a pointer
/// to each at consecutive slots of `ptrs`.
fn enc_string_array(
    memory: &mut [u8],
    strings: &[CString],
    ptrs: u32,
    buf: u32,
) -> Result<()> {
    let mut buf_offset: u32 = 0;
    for (i, s) in strings.iter().enumerate() {
        let bytes = s.as_bytes_with_nul();
        let ptr = buf.checked_add(buf_offset).ok_or(Error::EOVERFLOW)?;

        enc_slice_of_u8(memory, bytes, ptr)?;
        enc_u32_byref(memory, ptrs + u32::try_from(i * 4)?, ptr)?;

        let len = u32::try_from(bytes.len())?;
        buf_offset = buf_offset.checked_add(len).ok_or(Error::EOVERFLOW)?;
    }
    Ok(())
}

/// The number of strings and their total size, NUL terminators included.
fn string_array_sizes(strings: &[CString]) -> Result<(Size, Size)> {
    let count = u32::try_from(strings.len())?;
    let size = strings
        .iter()
        .try_fold(0u32, |acc, s| {
            acc.checked_add(u32::try_from(s.as_bytes_with_nul().len()).ok()?)
        })
        .ok_or(Error::EOVERFLOW)?;
    Ok((count, size))
}

pub(crate) fn args_get(
    wasi_ctx: &WasiCtx,
    memory: &mut dyn GuestMemory,
    argv_ptr: u32,
    argv_buf: u32,
) -> Result<()> {
    trace!(
        "args_get(argv_ptr={:#x?}, argv_buf={:#x?})",
        argv_ptr,
        argv_buf,
    );

    enc_string_array(memory.refresh(), &wasi_ctx.args, argv_ptr, argv_buf)
}

pub(crate) fn args_sizes_get(
    wasi_ctx: &WasiCtx,
    memory: &mut dyn GuestMemory,
    argc_ptr: u32,
    argv_buf_size_ptr: u32,
) -> Result<()> {
    trace!(
        "args_sizes_get(argc_ptr={:#x?}, argv_buf_size_ptr={:#x?})",
        argc_ptr,
        argv_buf_size_ptr,
    );

    let (argc, argv_size) = string_array_sizes(&wasi_ctx.args)?;
    let memory = memory.refresh();

    trace!("     | *argc_ptr={:?}", argc);

    enc_u32_byref(memory, argc_ptr, argc)?;

    trace!("     | *argv_buf_size_ptr={:?}", argv_size);

    enc_u32_byref(memory, argv_buf_size_ptr, argv_size)
}

pub(crate) fn environ_get(
    wasi_ctx: &WasiCtx,
    memory: &mut dyn GuestMemory,
    environ_ptr: u32,
    environ_buf: u32,
) -> Result<()> {
    trace!(
        "environ_get(environ_ptr={:#x?}, environ_buf={:#x?})",
        environ_ptr,
        environ_buf,
    );

    enc_string_array(memory.refresh(), &wasi_ctx.env, environ_ptr, environ_buf)
}

pub(crate) fn environ_sizes_get(
    wasi_ctx: &WasiCtx,
    memory: &mut dyn GuestMemory,
    environ_count_ptr: u32,
    environ_size_ptr: u32,
) -> Result<()> {
    trace!(
        "environ_sizes_get(environ_count_ptr={:#x?}, environ_size_ptr={:#x?})",
        environ_count_ptr,
        environ_size_ptr,
    );

    let (environ_count, environ_size) = string_array_sizes(&wasi_ctx.env)?;
    let memory = memory.refresh();

    trace!("     | *environ_count_ptr={:?}", environ_count);

    enc_u32_byref(memory, environ_count_ptr, environ_count)?;

    trace!("     | *environ_size_ptr={:?}", environ_size);

    enc_u32_byref(memory, environ_size_ptr, environ_size)
}

pub(crate) fn random_get(
    wasi_ctx: &mut WasiCtx,
    memory: &mut dyn GuestMemory,
    buf_ptr: u32,
    buf_len: Size,
) -> Result<()> {
    trace!("random_get(buf_ptr={:#x?}, buf_len={:?})", buf_ptr, buf_len);

    let buf = dec_slice_of_mut_u8(memory.refresh(), buf_ptr, buf_len)?;

    wasi_ctx.random.try_fill_bytes(buf).map_err(|e| {
        tracing::debug!("random source failed: {}", e);
        Error::EIO
    })
}

pub(crate) fn clock_res_get(
    memory: &mut dyn GuestMemory,
    clock_id: u32,
    resolution_ptr: u32,
) -> Result<()> {
    trace!(
        "clock_res_get(clock_id={:?}, resolution_ptr={:#x?})",
        clock_id,
        resolution_ptr,
    );

    let clock_id = Clockid::from_raw(clock_id).ok_or(Error::EINVAL)?;
    let resolution = hostcalls_impl::clock_res_get(clock_id)?;

    trace!("     | *resolution_ptr={:?}", resolution);

    enc_u64_byref(memory.refresh(), resolution_ptr, resolution)
}

pub(crate) fn clock_time_get(
    wasi_ctx: &WasiCtx,
    memory: &mut dyn GuestMemory,
    clock_id: u32,
    precision: Timestamp,
    time_ptr: u32,
) -> Result<()> {
    trace!(
        "clock_time_get(clock_id={:?}, precision={:?}, time_ptr={:#x?})",
        clock_id,
        precision,
        time_ptr,
    );

    let clock_id = Clockid::from_raw(clock_id).ok_or(Error::EINVAL)?;
    let time = hostcalls_impl::clock_time_get(clock_id, wasi_ctx.cputime_start)?;

    trace!("     | *time_ptr={:?}", time);

    enc_u64_byref(memory.refresh(), time_ptr, time)
}

/// Waits for the latest clock deadline among the subscriptions, then reports
/// one event per subscription. Descriptor readiness is never polled: such
/// subscriptions complete immediately with `ENOSYS`.
pub(crate) fn poll_oneoff(
    wasi_ctx: &WasiCtx,
    memory: &mut dyn GuestMemory,
    input: u32,
    output: u32,
    nsubscriptions: Size,
    nevents: u32,
) -> Result<()> {
    trace!(
        "poll_oneoff(input={:#x?}, output={:#x?}, nsubscriptions={}, nevents={:#x?})",
        input,
        output,
        nsubscriptions,
        nevents,
    );

    if nsubscriptions == 0 {
        return Err(Error::EINVAL);
    }

    // Deadline on the host monotonic clock.
    let mut wait_until: Option<Timestamp> = None;
    let events = {
        let memory = memory.refresh();
        let input_len = nsubscriptions
            .checked_mul(SUBSCRIPTION_SIZE)
            .ok_or(Error::EOVERFLOW)?;
        let output_len = nsubscriptions
            .checked_mul(EVENT_SIZE)
            .ok_or(Error::EOVERFLOW)?;
        dec_slice_of_u8(memory, input, input_len)?;
        dec_slice_of_u8(memory, output, output_len)?;

        // Both tables fit in guest memory, which bounds the allocation.
        let mut events = Vec::with_capacity(nsubscriptions as usize);
        for i in 0..nsubscriptions {
            let sub = input + i * SUBSCRIPTION_SIZE;
            let userdata = dec_u64_byref(memory, sub)?;
            let r#type = Eventtype::from_raw(dec_u8_byref(memory, sub + 8)?).ok_or(Error::EINVAL)?;
            let error = match r#type {
                Eventtype::Clock => {
                    let clock_id = dec_u32_byref(memory, sub + 24)?;
                    let timeout = dec_u64_byref(memory, sub + 32)?;
                    let flags = Subclockflags::from_bits_truncate(dec_u16_byref(memory, sub + 48)?);
                    match Clockid::from_raw(clock_id) {
                        Some(clock_id) => {
                            let now = hostcalls_impl::clock_time_get(clock_id, wasi_ctx.cputime_start)?;
                            let end = if flags.contains(Subclockflags::SUBSCRIPTION_CLOCK_ABSTIME) {
                                timeout
                            } else {
                                now.saturating_add(timeout)
                            };
                            let deadline = hostcalls_impl::monotonic_now()?
                                .saturating_add(end.saturating_sub(now));
                            wait_until = wait_until.max(Some(deadline));
                            WasiError::ESUCCESS
                        }
                        None => WasiError::EINVAL,
                    }
                }
                Eventtype::FdRead | Eventtype::FdWrite => {
                    let fd = dec_u32_byref(memory, sub + 16)?;
                    trace!("     | readiness of fd={:?} is not polled", fd);
                    WasiError::ENOSYS
                }
            };
            events.push(Event {
                userdata,
                error: error.as_raw_errno(),
                r#type,
            });
        }
        events
    };

    if let Some(deadline) = wait_until {
        while hostcalls_impl::monotonic_now()? < deadline {
            std::hint::spin_loop();
        }
    }

    let memory = memory.refresh();
    for (i, event) in (0u32..).zip(events.iter()) {
        enc_event_byref(memory, output + i * EVENT_SIZE, event)?;
    }

    trace!("     | *nevents={:?}", events.len());

    enc_u32_byref(memory, nevents, u32::try_from(events.len())?)
}

pub(crate) fn proc_exit(rval: Exitcode) -> ! {
    trace!("proc_exit(rval={:?})", rval);
    // The status is passed through bit for bit; the host truncates it.
    std::process::exit(rval as i32);
}

pub(crate) fn proc_raise(sig: u8) -> Result<()> {
    trace!("proc_raise(sig={:?})", sig);

    let signo = host_impl::signal_from_wasi(sig).ok_or(Error::EINVAL)?;
    hostcalls_impl::raise(signo)
}

pub(crate) fn sched_yield() -> Result<()> {
    trace!("sched_yield()");

    std::thread::yield_now();

    Ok(())
}
