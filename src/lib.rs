//! A host-side implementation of the `wasi_snapshot_preview1` imports.
//!
//! A [`WasiCtx`] owns the guest's descriptor table, arguments, environment
//! and random source. The engine that instantiates the module forwards each
//! import to the matching [`WasiSnapshotPreview1`] method, handing over the
//! guest's linear memory through [`GuestMemory`]; every call returns the
//! WASI errno the guest should see.
//!
//! ```ignore
//! use wasi_compat::{WasiCtxBuilder, WasiSnapshotPreview1};
//!
//! let mut ctx = WasiCtxBuilder::new()
//!     .arg("hello.wasm")
//!     .preopened_dir("/tmp/sandbox", "/sandbox")
//!     .build()?;
//! let mut memory = vec![0u8; 65536];
//! assert_eq!(ctx.args_sizes_get(&mut memory, 0, 4), 0);
//! ```
#![warn(unused_extern_crates, unused_import_braces, unused_qualifications)]

mod ctx;
mod error;
mod fdentry;
mod hostcalls_impl;
pub mod memory;
mod path;
mod snapshot;
mod sys;
pub mod wasi;

pub use ctx::{WasiCtx, WasiCtxBuilder, WasiCtxBuilderError};
pub use error::{Error, Result, WasiError};
pub use fdentry::EntryRights;
pub use memory::GuestMemory;
pub use snapshot::WasiSnapshotPreview1;
