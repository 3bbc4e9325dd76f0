//! Functions to go back and forth between host values and their packed
//! little-endian representation in guest linear memory.
//!
//! Guest pointers are plain `u32` offsets. Every access is bounds-checked
//! against the current view and fails with `EFAULT` when it falls outside.
use crate::wasi::{
    DIRENT_SIZE, Dirent, EVENT_SIZE, Event, FDSTAT_SIZE, FILESTAT_SIZE, Fdstat, Filestat,
    IOVEC_SIZE, PREOPENTYPE_DIR, PRESTAT_SIZE,
};
use crate::{Error, Result};

/// Access to the engine-owned linear memory of a guest.
///
/// The engine may replace or grow the backing buffer between two accesses,
/// so callers must not hold on to a view across host I/O: every read or write
/// goes through a fresh call to [`GuestMemory::refresh`].
pub trait GuestMemory {
    /// Re-derives a byte view over the current linear memory.
    fn refresh(&mut self) -> &mut [u8];
}

impl GuestMemory for Vec<u8> {
    fn refresh(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl GuestMemory for Box<[u8]> {
    fn refresh(&mut self) -> &mut [u8] {
        self
    }
}

fn checked_range(memory: &[u8], ptr: u32, len: u32) -> Result<std::ops::Range<usize>> {
    let start = ptr as usize;
    // check for overflow
    let end = start.checked_add(len as usize).ok_or(Error::EFAULT)?;
    if end > memory.len() {
        return Err(Error::EFAULT);
    }
    Ok(start..end)
}

pub fn dec_slice_of_u8(memory: &[u8], ptr: u32, len: u32) -> Result<&[u8]> {
    let range = checked_range(memory, ptr, len)?;
    Ok(&memory[range])
}

pub fn dec_slice_of_mut_u8(memory: &mut [u8], ptr: u32, len: u32) -> Result<&mut [u8]> {
    let range = checked_range(memory, ptr, len)?;
    Ok(&mut memory[range])
}

pub fn enc_slice_of_u8(memory: &mut [u8], slice: &[u8], ptr: u32) -> Result<()> {
    let len = u32::try_from(slice.len())?;
    dec_slice_of_mut_u8(memory, ptr, len)?.copy_from_slice(slice);
    Ok(())
}

/// Guest strings are `(ptr, len)` pairs, never NUL-terminated.
pub fn dec_str(memory: &[u8], ptr: u32, len: u32) -> Result<&str> {
    let bytes = dec_slice_of_u8(memory, ptr, len)?;
    std::str::from_utf8(bytes).map_err(|_| Error::EILSEQ)
}

macro_rules! dec_enc_scalar {
    ($ty:ident, $dec_byref:ident, $enc_byref:ident) => {
        pub fn $dec_byref(memory: &[u8], ptr: u32) -> Result<$ty> {
            let bytes = dec_slice_of_u8(memory, ptr, std::mem::size_of::<$ty>() as u32)?;
            let mut raw = [0u8; std::mem::size_of::<$ty>()];
            raw.copy_from_slice(bytes);
            Ok($ty::from_le_bytes(raw))
        }

        pub fn $enc_byref(memory: &mut [u8], ptr: u32, x: $ty) -> Result<()> {
            enc_slice_of_u8(memory, &x.to_le_bytes(), ptr)
        }
    };
}

dec_enc_scalar!(u8, dec_u8_byref, enc_u8_byref);
dec_enc_scalar!(u16, dec_u16_byref, enc_u16_byref);
dec_enc_scalar!(u32, dec_u32_byref, enc_u32_byref);
dec_enc_scalar!(u64, dec_u64_byref, enc_u64_byref);

/// A `{u32 buf, u32 buf_len}` record naming a guest buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Iovec {
    pub buf: u32,
    pub buf_len: u32,
}

impl Iovec {
    pub fn as_slice<'m>(&self, memory: &'m [u8]) -> Result<&'m [u8]> {
        dec_slice_of_u8(memory, self.buf, self.buf_len)
    }

    pub fn as_slice_mut<'m>(&self, memory: &'m mut [u8]) -> Result<&'m mut [u8]> {
        dec_slice_of_mut_u8(memory, self.buf, self.buf_len)
    }
}

/// Decodes `iovs_len` iovecs starting at `iovs_ptr`.
///
/// Each described buffer is validated against the current view; the
/// returned records alias guest memory and are resolved again at the point of
/// use.
pub fn dec_iovec_slice(memory: &[u8], iovs_ptr: u32, iovs_len: u32) -> Result<Vec<Iovec>> {
    let table_len = iovs_len.checked_mul(IOVEC_SIZE).ok_or(Error::EOVERFLOW)?;
    dec_slice_of_u8(memory, iovs_ptr, table_len)?;

    (0..iovs_len)
        .map(|i| {
            let ptr = iovs_ptr + i * IOVEC_SIZE;
            let iov = Iovec {
                buf: dec_u32_byref(memory, ptr)?,
                buf_len: dec_u32_byref(memory, ptr + 4)?,
            };
            iov.as_slice(memory)?;
            Ok(iov)
        })
        .collect()
}

pub fn enc_fdstat_byref(memory: &mut [u8], ptr: u32, fdstat: &Fdstat) -> Result<()> {
    dec_slice_of_mut_u8(memory, ptr, FDSTAT_SIZE)?.fill(0);
    enc_u8_byref(memory, ptr, fdstat.fs_filetype.as_raw())?;
    enc_u16_byref(memory, ptr + 2, fdstat.fs_flags.bits())?;
    enc_u64_byref(memory, ptr + 8, fdstat.fs_rights_base.bits())?;
    enc_u64_byref(memory, ptr + 16, fdstat.fs_rights_inheriting.bits())
}

pub fn enc_filestat_byref(memory: &mut [u8], ptr: u32, filestat: &Filestat) -> Result<()> {
    dec_slice_of_mut_u8(memory, ptr, FILESTAT_SIZE)?.fill(0);
    enc_u64_byref(memory, ptr, filestat.dev)?;
    enc_u64_byref(memory, ptr + 8, filestat.ino)?;
    enc_u8_byref(memory, ptr + 16, filestat.filetype.as_raw())?;
    enc_u32_byref(memory, ptr + 20, filestat.nlink)?;
    enc_u64_byref(memory, ptr + 24, filestat.size)?;
    enc_u64_byref(memory, ptr + 32, filestat.atim)?;
    enc_u64_byref(memory, ptr + 40, filestat.mtim)?;
    enc_u64_byref(memory, ptr + 48, filestat.ctim)
}

pub fn enc_prestat_dir_byref(memory: &mut [u8], ptr: u32, name_len: u32) -> Result<()> {
    dec_slice_of_mut_u8(memory, ptr, PRESTAT_SIZE)?.fill(0);
    enc_u8_byref(memory, ptr, PREOPENTYPE_DIR)?;
    enc_u32_byref(memory, ptr + 4, name_len)
}

pub fn enc_event_byref(memory: &mut [u8], ptr: u32, event: &Event) -> Result<()> {
    dec_slice_of_mut_u8(memory, ptr, EVENT_SIZE)?.fill(0);
    enc_u64_byref(memory, ptr, event.userdata)?;
    enc_u16_byref(memory, ptr + 8, event.error)?;
    enc_u8_byref(memory, ptr + 10, event.r#type as u8)
}

impl Dirent {
    /// The fixed-size header that precedes the entry name in `fd_readdir`
    /// output.
    pub fn to_bytes(&self) -> [u8; DIRENT_SIZE as usize] {
        let mut raw = [0u8; DIRENT_SIZE as usize];
        raw[0..8].copy_from_slice(&self.d_next.to_le_bytes());
        raw[8..16].copy_from_slice(&self.d_ino.to_le_bytes());
        raw[16..20].copy_from_slice(&self.d_namlen.to_le_bytes());
        raw[20] = self.d_type.as_raw();
        raw
    }
}
