use anyhow::Result;
use tempfile::TempDir;
use wasi_compat::wasi::{Fd, Fdflags, Oflags, Rights};
use wasi_compat::{WasiCtx, WasiCtxBuilder, WasiError, WasiSnapshotPreview1};

mod path;
mod readdir;
mod rights;

/// The descriptor the sandbox directory is preopened at.
pub const DIR_FD: Fd = 3;

// Scratch regions of guest memory.
pub const OUT_PTR: u32 = 0x10;
pub const PATH_PTR: u32 = 0x100;
pub const IOVS_PTR: u32 = 0x400;
pub const DATA_PTR: u32 = 0x1000;

pub fn errno(e: WasiError) -> u16 {
    e.as_raw_errno()
}

/// A guest with a scratch directory preopened as `/sandbox` and 64 KiB of
/// linear memory.
pub struct Guest {
    pub dir: TempDir,
    pub ctx: WasiCtx,
    pub memory: Vec<u8>,
}

impl Guest {
    pub fn new() -> Result<Self> {
        Self::with_builder(WasiCtxBuilder::new())
    }

    pub fn with_builder(builder: WasiCtxBuilder) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let ctx = builder.preopened_dir(dir.path(), "/sandbox").build()?;
        Ok(Self {
            dir,
            ctx,
            memory: vec![0; 0x10000],
        })
    }

    pub fn put(&mut self, ptr: u32, bytes: &[u8]) {
        let ptr = ptr as usize;
        self.memory[ptr..ptr + bytes.len()].copy_from_slice(bytes);
    }

    pub fn get(&self, ptr: u32, len: usize) -> &[u8] {
        &self.memory[ptr as usize..ptr as usize + len]
    }

    pub fn u8_at(&self, ptr: u32) -> u8 {
        self.memory[ptr as usize]
    }

    pub fn u16_at(&self, ptr: u32) -> u16 {
        u16::from_le_bytes(self.get(ptr, 2).try_into().unwrap())
    }

    pub fn u32_at(&self, ptr: u32) -> u32 {
        u32::from_le_bytes(self.get(ptr, 4).try_into().unwrap())
    }

    pub fn u64_at(&self, ptr: u32) -> u64 {
        u64::from_le_bytes(self.get(ptr, 8).try_into().unwrap())
    }

    pub fn put_u32(&mut self, ptr: u32, x: u32) {
        self.put(ptr, &x.to_le_bytes());
    }

    /// Stores `path` in guest memory and returns its `(ptr, len)`.
    pub fn put_path(&mut self, ptr: u32, path: &str) -> (u32, u32) {
        self.put(ptr, path.as_bytes());
        (ptr, path.len() as u32)
    }

    /// `path_open` relative to the sandbox, returning the new descriptor or
    /// the errno.
    pub fn open(
        &mut self,
        path: &str,
        oflags: Oflags,
        base: Rights,
        fdflags: Fdflags,
    ) -> std::result::Result<Fd, u16> {
        let (ptr, len) = self.put_path(PATH_PTR, path);
        match self.ctx.path_open(
            &mut self.memory,
            DIR_FD,
            0,
            ptr,
            len,
            oflags.bits(),
            base.bits(),
            0,
            fdflags.bits(),
            OUT_PTR,
        ) {
            0 => Ok(self.u32_at(OUT_PTR)),
            e => Err(e),
        }
    }

    /// Lays out one iovec per chunk and copies the chunks into guest memory.
    fn put_iovecs(&mut self, chunks: &[&[u8]]) -> u32 {
        let mut data = DATA_PTR;
        for (i, chunk) in chunks.iter().enumerate() {
            let iov = IOVS_PTR + 8 * i as u32;
            self.put_u32(iov, data);
            self.put_u32(iov + 4, chunk.len() as u32);
            self.put(data, chunk);
            data += chunk.len() as u32;
        }
        chunks.len() as u32
    }

    /// Lays out one iovec per length over a zeroed buffer at `DATA_PTR`.
    fn put_read_iovecs(&mut self, lens: &[u32]) -> u32 {
        let total: u32 = lens.iter().sum();
        self.memory[DATA_PTR as usize..(DATA_PTR + total) as usize].fill(0);
        let mut data = DATA_PTR;
        for (i, len) in lens.iter().enumerate() {
            let iov = IOVS_PTR + 8 * i as u32;
            self.put_u32(iov, data);
            self.put_u32(iov + 4, *len);
            data += len;
        }
        lens.len() as u32
    }

    pub fn write(&mut self, fd: Fd, chunks: &[&[u8]]) -> std::result::Result<u32, u16> {
        let iovs_len = self.put_iovecs(chunks);
        match self
            .ctx
            .fd_write(&mut self.memory, fd, IOVS_PTR, iovs_len, OUT_PTR)
        {
            0 => Ok(self.u32_at(OUT_PTR)),
            e => Err(e),
        }
    }

    pub fn pwrite(
        &mut self,
        fd: Fd,
        chunks: &[&[u8]],
        offset: u64,
    ) -> std::result::Result<u32, u16> {
        let iovs_len = self.put_iovecs(chunks);
        match self
            .ctx
            .fd_pwrite(&mut self.memory, fd, IOVS_PTR, iovs_len, offset, OUT_PTR)
        {
            0 => Ok(self.u32_at(OUT_PTR)),
            e => Err(e),
        }
    }

    /// Reads into buffers of the given lengths and returns the bytes read.
    pub fn read(&mut self, fd: Fd, lens: &[u32]) -> std::result::Result<Vec<u8>, u16> {
        let iovs_len = self.put_read_iovecs(lens);
        match self
            .ctx
            .fd_read(&mut self.memory, fd, IOVS_PTR, iovs_len, OUT_PTR)
        {
            0 => {
                let n = self.u32_at(OUT_PTR) as usize;
                Ok(self.get(DATA_PTR, n).to_vec())
            }
            e => Err(e),
        }
    }

    pub fn pread(
        &mut self,
        fd: Fd,
        lens: &[u32],
        offset: u64,
    ) -> std::result::Result<Vec<u8>, u16> {
        let iovs_len = self.put_read_iovecs(lens);
        match self
            .ctx
            .fd_pread(&mut self.memory, fd, IOVS_PTR, iovs_len, offset, OUT_PTR)
        {
            0 => {
                let n = self.u32_at(OUT_PTR) as usize;
                Ok(self.get(DATA_PTR, n).to_vec())
            }
            e => Err(e),
        }
    }

    /// `fd_fdstat_get`, returning `(filetype, flags, base, inheriting)`.
    pub fn fdstat(&mut self, fd: Fd) -> std::result::Result<(u8, u16, u64, u64), u16> {
        match self.ctx.fd_fdstat_get(&mut self.memory, fd, OUT_PTR) {
            0 => Ok((
                self.u8_at(OUT_PTR),
                self.u16_at(OUT_PTR + 2),
                self.u64_at(OUT_PTR + 8),
                self.u64_at(OUT_PTR + 16),
            )),
            e => Err(e),
        }
    }
}
