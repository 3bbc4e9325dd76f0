use crate::sys::fdentry_impl::determine_type_rights;
use crate::wasi::{self, Filetype, Rights};
use crate::{Error, Result};
use std::fmt;
use std::fs::File;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd};

/// A pair of capability sets: `base` applies to the descriptor itself and
/// `inheriting` bounds what descriptors opened through it may receive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryRights {
    pub base: Rights,
    pub inheriting: Rights,
}

impl EntryRights {
    pub fn new(base: Rights, inheriting: Rights) -> Self {
        Self { base, inheriting }
    }

    /// Create new `EntryRights` instance from `base` rights only, keeping
    /// `inheriting` set to none.
    pub fn from_base(base: Rights) -> Self {
        Self {
            base,
            inheriting: Rights::empty(),
        }
    }

    pub fn empty() -> Self {
        Self {
            base: Rights::empty(),
            inheriting: Rights::empty(),
        }
    }

    /// Check if `other` is a subset of those rights.
    pub fn contains(&self, other: &Self) -> bool {
        self.base.contains(other.base) && self.inheriting.contains(other.inheriting)
    }

    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            base: self.base & other.base,
            inheriting: self.inheriting & other.inheriting,
        }
    }
}

impl fmt::Display for EntryRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EntryRights {{ base: {:#x}, inheriting: {:#x} }}",
            self.base.bits(),
            self.inheriting.bits()
        )
    }
}

/// The canonical rights profile of a filetype.
pub(crate) fn rights_for_filetype(file_type: Filetype, is_tty: bool) -> EntryRights {
    match file_type {
        Filetype::BlockDevice => EntryRights::new(
            wasi::RIGHTS_BLOCK_DEVICE_BASE,
            wasi::RIGHTS_BLOCK_DEVICE_INHERITING,
        ),
        Filetype::CharacterDevice if is_tty => {
            EntryRights::new(wasi::RIGHTS_TTY_BASE, wasi::RIGHTS_TTY_INHERITING)
        }
        Filetype::CharacterDevice => EntryRights::new(
            wasi::RIGHTS_CHARACTER_DEVICE_BASE,
            wasi::RIGHTS_CHARACTER_DEVICE_INHERITING,
        ),
        Filetype::Directory => EntryRights::new(
            wasi::RIGHTS_DIRECTORY_BASE,
            wasi::RIGHTS_DIRECTORY_INHERITING,
        ),
        Filetype::RegularFile => EntryRights::new(
            wasi::RIGHTS_REGULAR_FILE_BASE,
            wasi::RIGHTS_REGULAR_FILE_INHERITING,
        ),
        Filetype::SocketDgram | Filetype::SocketStream => {
            EntryRights::new(wasi::RIGHTS_SOCKET_BASE, wasi::RIGHTS_SOCKET_INHERITING)
        }
        Filetype::SymbolicLink | Filetype::Unknown => EntryRights::empty(),
    }
}

/// The host side of a guest descriptor. Directories are held as
/// capabilities: every path lookup through them stays beneath them.
#[derive(Debug)]
pub(crate) enum Descriptor {
    OsHandle(File),
    Dir(cap_std::fs::Dir),
    Stdin,
    Stdout,
    Stderr,
}

impl Descriptor {
    /// A `File` view of the host handle. Views never close the descriptor
    /// they borrow.
    pub(crate) fn as_file(&self) -> HostFile<'_> {
        match self {
            Self::OsHandle(file) => HostFile::Borrowed(file),
            other => {
                // SAFETY: the descriptor outlives the returned view, which is
                // never dropped as a `File`.
                let file = unsafe { File::from_raw_fd(other.as_fd().as_raw_fd()) };
                HostFile::View(ManuallyDrop::new(file))
            }
        }
    }
}

impl AsFd for Descriptor {
    fn as_fd(&self) -> BorrowedFd<'_> {
        // SAFETY: the stdio descriptors are owned by the process and outlive
        // any borrow handed out here.
        match self {
            Self::OsHandle(file) => file.as_fd(),
            Self::Dir(dir) => dir.as_fd(),
            Self::Stdin => unsafe { BorrowedFd::borrow_raw(libc::STDIN_FILENO) },
            Self::Stdout => unsafe { BorrowedFd::borrow_raw(libc::STDOUT_FILENO) },
            Self::Stderr => unsafe { BorrowedFd::borrow_raw(libc::STDERR_FILENO) },
        }
    }
}

pub(crate) enum HostFile<'a> {
    Borrowed(&'a File),
    View(ManuallyDrop<File>),
}

impl Deref for HostFile<'_> {
    type Target = File;

    fn deref(&self) -> &File {
        match self {
            Self::Borrowed(file) => file,
            Self::View(file) => file,
        }
    }
}

/// One open guest-visible descriptor.
///
/// `file_type` and `rights` are computed lazily from the host handle the
/// first time the entry is checked, then cached. `preopen_path` is the
/// guest-visible name of a preopened directory.
#[derive(Debug)]
pub(crate) struct FdEntry {
    descriptor: Descriptor,
    file_type: Option<Filetype>,
    rights: Option<EntryRights>,
    pub(crate) preopen_path: Option<String>,
}

impl FdEntry {
    pub(crate) fn from_stdio(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            file_type: None,
            rights: None,
            preopen_path: None,
        }
    }

    /// A preopened directory; its type and rights are known up front.
    pub(crate) fn from_preopen(dir: cap_std::fs::Dir, guest_path: String) -> Self {
        Self {
            descriptor: Descriptor::Dir(dir),
            file_type: Some(Filetype::Directory),
            rights: Some(rights_for_filetype(Filetype::Directory, false)),
            preopen_path: Some(guest_path),
        }
    }

    /// A descriptor opened on behalf of the guest with already-derived rights.
    pub(crate) fn from_opened(descriptor: Descriptor, rights: EntryRights) -> Self {
        Self {
            descriptor,
            file_type: None,
            rights: Some(rights),
            preopen_path: None,
        }
    }

    /// Classifies the host handle on first use and caches the result. Rights
    /// already assigned to the entry are kept.
    pub(crate) fn stat(&mut self) -> Result<(Filetype, EntryRights)> {
        if let (Some(file_type), Some(rights)) = (self.file_type, self.rights) {
            return Ok((file_type, rights));
        }
        let (file_type, canonical) = determine_type_rights(&self.descriptor)?;
        self.file_type = Some(file_type);
        let rights = *self.rights.get_or_insert(canonical);
        Ok((file_type, rights))
    }

    pub(crate) fn file_type(&mut self) -> Result<Filetype> {
        self.stat().map(|(file_type, _)| file_type)
    }

    pub(crate) fn rights(&mut self) -> Result<EntryRights> {
        self.stat().map(|(_, rights)| rights)
    }

    pub(crate) fn set_rights(&mut self, rights: EntryRights) {
        self.rights = Some(rights);
    }

    /// Verifies that `required` is a subset of the rights granted to this
    /// entry, failing with `EPERM` otherwise.
    pub(crate) fn validate_rights(&mut self, required: &EntryRights) -> Result<()> {
        let rights = self.rights()?;
        if !rights.contains(required) {
            let missing_base = required.base & !rights.base;
            let missing_inheriting = required.inheriting & !rights.inheriting;
            tracing::trace!(
                "     | validate_rights failed: required {}, actual {}, missing base {:?}, missing inheriting {:?}",
                required,
                rights,
                missing_base,
                missing_inheriting,
            );
            return Err(Error::EPERM);
        }
        Ok(())
    }

    pub(crate) fn as_descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// The directory capability path-relative operations go through.
    pub(crate) fn as_dir(&self) -> Result<&cap_std::fs::Dir> {
        match &self.descriptor {
            Descriptor::Dir(dir) => Ok(dir),
            Descriptor::OsHandle(_) => Err(Error::ENOTDIR),
            Descriptor::Stdin | Descriptor::Stdout | Descriptor::Stderr => Err(Error::EINVAL),
        }
    }
}
