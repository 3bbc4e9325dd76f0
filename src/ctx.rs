use crate::fdentry::{Descriptor, EntryRights, FdEntry};
use crate::sys::hostcalls_impl;
use crate::wasi::{self, Fd, Timestamp};
use crate::{Error, Result};
use cap_rand::{Rng, RngCore, SeedableRng};
use cap_std::fs::Dir;
use std::collections::BTreeMap;
use std::env;
use std::ffi::{CString, OsString};
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};

/// Failures while assembling a [`WasiCtx`].
#[derive(Debug, thiserror::Error)]
pub enum WasiCtxBuilderError {
    /// Error when opening or classifying a preopened directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// An argument or environment entry contains a NUL byte.
    #[error("contains NUL byte: {0:?}")]
    UnexpectedNul(OsString),
    /// A preopened path does not name a directory.
    #[error("preopened path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    /// The table ran out of descriptor numbers.
    #[error("too many preopened directories")]
    TooManyFiles,
}

type WasiCtxBuilderResult<T> = std::result::Result<T, WasiCtxBuilderError>;

fn into_cstring(s: OsString) -> WasiCtxBuilderResult<CString> {
    CString::new(s.clone().into_vec()).map_err(|_| WasiCtxBuilderError::UnexpectedNul(s))
}

/// A builder allowing customizable construction of `WasiCtx` instances.
#[derive(Debug, Default)]
pub struct WasiCtxBuilder {
    args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
    preopens: Vec<(PathBuf, String)>,
}

impl WasiCtxBuilder {
    /// Builder for a new `WasiCtx`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument to the command-line arguments list.
    pub fn arg<S: Into<OsString>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Replace the command-line arguments list.
    pub fn args<S: Into<OsString>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Inherit the command-line arguments from the host process.
    pub fn inherit_args(mut self) -> Self {
        self.args = env::args_os().collect();
        self
    }

    /// Add an entry to the environment. Entries keep the order in which they
    /// were added.
    pub fn env<K: Into<OsString>, V: Into<OsString>>(mut self, key: K, value: V) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Replace the environment.
    pub fn envs<K, V>(mut self, envs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.env = envs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Inherit the environment variables from the host process.
    pub fn inherit_env(mut self) -> Self {
        self.env = env::vars_os().collect();
        self
    }

    /// Add a preopened directory: the host directory `host_path` is exposed
    /// to the guest under the name `guest_path`.
    pub fn preopened_dir<P: AsRef<Path>, S: Into<String>>(
        mut self,
        host_path: P,
        guest_path: S,
    ) -> Self {
        self.preopens
            .push((host_path.as_ref().to_owned(), guest_path.into()));
        self
    }

    /// Build a `WasiCtx`, consuming this `WasiCtxBuilder`.
    ///
    /// Descriptors 0, 1 and 2 are the host's stdio streams. Preopened
    /// directories follow in the order they were added; without any, the
    /// current directory is preopened as `"."`.
    pub fn build(self) -> WasiCtxBuilderResult<WasiCtx> {
        let args = self
            .args
            .into_iter()
            .map(into_cstring)
            .collect::<WasiCtxBuilderResult<Vec<_>>>()?;

        let env = self
            .env
            .into_iter()
            .map(|(k, v)| {
                let mut pair = k;
                pair.push("=");
                pair.push(v);
                into_cstring(pair)
            })
            .collect::<WasiCtxBuilderResult<Vec<_>>>()?;

        let mut fds = BTreeMap::new();
        for (fd, descriptor) in [
            (wasi::STDIN_FILENO, Descriptor::Stdin),
            (wasi::STDOUT_FILENO, Descriptor::Stdout),
            (wasi::STDERR_FILENO, Descriptor::Stderr),
        ] {
            tracing::debug!("WasiCtx inserting ({:?}, {:?})", fd, descriptor);
            fds.insert(fd, FdEntry::from_stdio(descriptor));
        }

        let preopens = if self.preopens.is_empty() {
            vec![(PathBuf::from("."), String::from("."))]
        } else {
            self.preopens
        };
        for (host_path, guest_path) in preopens {
            let dir = match Dir::open_ambient_dir(&host_path, cap_std::ambient_authority()) {
                Ok(dir) => dir,
                Err(e) if e.raw_os_error() == Some(libc::ENOTDIR) => {
                    return Err(WasiCtxBuilderError::NotADirectory(host_path));
                }
                Err(e) => return Err(e.into()),
            };
            let fd = next_fd(&fds).ok_or(WasiCtxBuilderError::TooManyFiles)?;
            let fe = FdEntry::from_preopen(dir, guest_path);
            tracing::debug!("WasiCtx inserting ({:?}, {:?})", fd, fe);
            fds.insert(fd, fe);
        }

        let cputime_start = hostcalls_impl::monotonic_now().map_err(|e| match e {
            Error::Io(e) => WasiCtxBuilderError::Io(e),
            other => WasiCtxBuilderError::Io(std::io::Error::other(other)),
        })?;

        Ok(WasiCtx {
            fds,
            args,
            env,
            cputime_start,
            random: random_ctx(),
        })
    }
}

fn random_ctx() -> Box<dyn RngCore + Send + Sync> {
    let mut rng = cap_rand::thread_rng(cap_rand::ambient_authority());
    Box::new(cap_rand::rngs::StdRng::from_seed(rng.r#gen()))
}

/// The next free descriptor number: one past the highest in use.
fn next_fd(fds: &BTreeMap<Fd, FdEntry>) -> Option<Fd> {
    match fds.last_key_value() {
        Some((&max, _)) => max.checked_add(1),
        None => Some(0),
    }
}

/// The state of one WASI instance: its descriptor table, argv, environment,
/// the origin of the CPU-time clocks and its random source.
pub struct WasiCtx {
    fds: BTreeMap<Fd, FdEntry>,
    pub(crate) args: Vec<CString>,
    pub(crate) env: Vec<CString>,
    pub(crate) cputime_start: Timestamp,
    pub(crate) random: Box<dyn RngCore + Send + Sync>,
}

impl std::fmt::Debug for WasiCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasiCtx")
            .field("fds", &self.fds)
            .field("args", &self.args)
            .field("env", &self.env)
            .field("cputime_start", &self.cputime_start)
            .finish_non_exhaustive()
    }
}

impl WasiCtx {
    /// Make a new `WasiCtx` with the given arguments, the host's environment
    /// and the default preopen.
    pub fn new<S: Into<OsString>>(
        args: impl IntoIterator<Item = S>,
    ) -> WasiCtxBuilderResult<Self> {
        WasiCtxBuilder::new().args(args).inherit_env().build()
    }

    /// Check if `WasiCtx` contains the specified raw WASI `fd`.
    pub fn contains_fd_entry(&self, fd: Fd) -> bool {
        self.fds.contains_key(&fd)
    }

    /// Get an immutable `FdEntry` corresponding to the specified raw WASI `fd`.
    pub(crate) fn get_fd_entry(&self, fd: Fd) -> Result<&FdEntry> {
        self.fds.get(&fd).ok_or(Error::EBADF)
    }

    /// Get a mutable `FdEntry` corresponding to the specified raw WASI `fd`.
    pub(crate) fn get_fd_entry_mut(&mut self, fd: Fd) -> Result<&mut FdEntry> {
        self.fds.get_mut(&fd).ok_or(Error::EBADF)
    }

    /// Look up `fd` and verify it was granted every right in `required`.
    ///
    /// The entry's type and rights are computed from the host handle on
    /// first use.
    pub(crate) fn get_fd_entry_checked(
        &mut self,
        fd: Fd,
        required: EntryRights,
    ) -> Result<&mut FdEntry> {
        let fe = self.get_fd_entry_mut(fd)?;
        fe.validate_rights(&required)?;
        Ok(fe)
    }

    /// Insert the specified `FdEntry` into the `WasiCtx` object.
    ///
    /// The entry gets the number one past the highest descriptor currently in
    /// use, so numbers freed at the top of the table are handed out again.
    pub(crate) fn insert_fd_entry(&mut self, fe: FdEntry) -> Result<Fd> {
        let fd = next_fd(&self.fds).ok_or(Error::EMFILE)?;
        self.fds.insert(fd, fe);
        Ok(fd)
    }

    /// Insert the specified `FdEntry` with the specified raw WASI `fd` key into the `WasiCtx`
    /// object, returning the entry it displaced.
    pub(crate) fn insert_fd_entry_at(&mut self, fd: Fd, fe: FdEntry) -> Option<FdEntry> {
        self.fds.insert(fd, fe)
    }

    /// Remove `FdEntry` corresponding to the specified raw WASI `fd` from the `WasiCtx` object.
    pub(crate) fn remove_fd_entry(&mut self, fd: Fd) -> Result<FdEntry> {
        self.fds.remove(&fd).ok_or(Error::EBADF)
    }
}
