//! Types and constants of the WASI preview1 ABI as seen by the guest.
//!
//! All multi-byte values are little-endian in guest memory; the `*_SIZE`
//! constants give the packed sizes of the structures the hostcalls read and
//! write.
#![allow(non_camel_case_types)]

use bitflags::bitflags;

pub type Fd = u32;
pub type Size = u32;
pub type Filesize = u64;
pub type Timestamp = u64;
pub type Filedelta = i64;
pub type Userdata = u64;
pub type Dircookie = u64;
pub type Exitcode = u32;

bitflags! {
    /// Capability bits attached to every descriptor.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Rights: u64 {
        const FD_DATASYNC = 1 << 0;
        const FD_READ = 1 << 1;
        const FD_SEEK = 1 << 2;
        const FD_FDSTAT_SET_FLAGS = 1 << 3;
        const FD_SYNC = 1 << 4;
        const FD_TELL = 1 << 5;
        const FD_WRITE = 1 << 6;
        const FD_ADVISE = 1 << 7;
        const FD_ALLOCATE = 1 << 8;
        const PATH_CREATE_DIRECTORY = 1 << 9;
        const PATH_CREATE_FILE = 1 << 10;
        const PATH_LINK_SOURCE = 1 << 11;
        const PATH_LINK_TARGET = 1 << 12;
        const PATH_OPEN = 1 << 13;
        const FD_READDIR = 1 << 14;
        const PATH_READLINK = 1 << 15;
        const PATH_RENAME_SOURCE = 1 << 16;
        const PATH_RENAME_TARGET = 1 << 17;
        const PATH_FILESTAT_GET = 1 << 18;
        const PATH_FILESTAT_SET_SIZE = 1 << 19;
        const PATH_FILESTAT_SET_TIMES = 1 << 20;
        const FD_FILESTAT_GET = 1 << 21;
        const FD_FILESTAT_SET_SIZE = 1 << 22;
        const FD_FILESTAT_SET_TIMES = 1 << 23;
        const PATH_SYMLINK = 1 << 24;
        const PATH_REMOVE_DIRECTORY = 1 << 25;
        const PATH_UNLINK_FILE = 1 << 26;
        const POLL_FD_READWRITE = 1 << 27;
        const SOCK_SHUTDOWN = 1 << 28;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Fdflags: u16 {
        const APPEND = 1 << 0;
        const DSYNC = 1 << 1;
        const NONBLOCK = 1 << 2;
        const RSYNC = 1 << 3;
        const SYNC = 1 << 4;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Oflags: u16 {
        const CREAT = 1 << 0;
        const DIRECTORY = 1 << 1;
        const EXCL = 1 << 2;
        const TRUNC = 1 << 3;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Lookupflags: u32 {
        const SYMLINK_FOLLOW = 1 << 0;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Fstflags: u16 {
        const ATIM = 1 << 0;
        const ATIM_NOW = 1 << 1;
        const MTIM = 1 << 2;
        const MTIM_NOW = 1 << 3;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Subclockflags: u16 {
        const SUBSCRIPTION_CLOCK_ABSTIME = 1 << 0;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Filetype {
    Unknown = 0,
    BlockDevice = 1,
    CharacterDevice = 2,
    Directory = 3,
    RegularFile = 4,
    SocketDgram = 5,
    SocketStream = 6,
    SymbolicLink = 7,
}

impl Filetype {
    pub fn as_raw(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Clockid {
    Monotonic = 0,
    ProcessCputimeId = 1,
    Realtime = 2,
    ThreadCputimeId = 3,
}

impl Clockid {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Monotonic),
            1 => Some(Self::ProcessCputimeId),
            2 => Some(Self::Realtime),
            3 => Some(Self::ThreadCputimeId),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Whence {
    Cur = 0,
    End = 1,
    Set = 2,
}

impl Whence {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Cur),
            1 => Some(Self::End),
            2 => Some(Self::Set),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Eventtype {
    Clock = 0,
    FdRead = 1,
    FdWrite = 2,
}

impl Eventtype {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Clock),
            1 => Some(Self::FdRead),
            2 => Some(Self::FdWrite),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fdstat {
    pub fs_filetype: Filetype,
    pub fs_flags: Fdflags,
    pub fs_rights_base: Rights,
    pub fs_rights_inheriting: Rights,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Filestat {
    pub dev: u64,
    pub ino: u64,
    pub filetype: Filetype,
    pub nlink: u32,
    pub size: Filesize,
    pub atim: Timestamp,
    pub mtim: Timestamp,
    pub ctim: Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dirent {
    pub d_next: Dircookie,
    pub d_ino: u64,
    pub d_namlen: u32,
    pub d_type: Filetype,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    pub userdata: Userdata,
    pub error: u16,
    pub r#type: Eventtype,
}

pub const PREOPENTYPE_DIR: u8 = 0;

pub const STDIN_FILENO: Fd = 0;
pub const STDOUT_FILENO: Fd = 1;
pub const STDERR_FILENO: Fd = 2;

// Signal numbers as seen by the guest. The numbering is alphabetical.
pub const SIGABRT: u8 = 0;
pub const SIGALRM: u8 = 1;
pub const SIGBUS: u8 = 2;
pub const SIGCHLD: u8 = 3;
pub const SIGCONT: u8 = 4;
pub const SIGFPE: u8 = 5;
pub const SIGHUP: u8 = 6;
pub const SIGILL: u8 = 7;
pub const SIGINT: u8 = 8;
pub const SIGKILL: u8 = 9;
pub const SIGPIPE: u8 = 10;
pub const SIGQUIT: u8 = 11;
pub const SIGSEGV: u8 = 12;
pub const SIGSTOP: u8 = 13;
pub const SIGTERM: u8 = 14;
pub const SIGTRAP: u8 = 15;
pub const SIGTSTP: u8 = 16;
pub const SIGTTIN: u8 = 17;
pub const SIGTTOU: u8 = 18;
pub const SIGURG: u8 = 19;
pub const SIGUSR1: u8 = 20;
pub const SIGUSR2: u8 = 21;
pub const SIGVTALRM: u8 = 22;
pub const SIGXCPU: u8 = 23;
pub const SIGXFSZ: u8 = 24;

// Packed structure sizes.
pub const IOVEC_SIZE: u32 = 8;
pub const FDSTAT_SIZE: u32 = 24;
pub const FILESTAT_SIZE: u32 = 56;
pub const PRESTAT_SIZE: u32 = 8;
pub const DIRENT_SIZE: u32 = 24;
pub const SUBSCRIPTION_SIZE: u32 = 56;
pub const EVENT_SIZE: u32 = 32;

// Block and character device interaction is outside the scope of WASI. Simply
// allow everything.
pub const RIGHTS_BLOCK_DEVICE_BASE: Rights = Rights::all();
pub const RIGHTS_BLOCK_DEVICE_INHERITING: Rights = Rights::all();
pub const RIGHTS_CHARACTER_DEVICE_BASE: Rights = Rights::all();
pub const RIGHTS_CHARACTER_DEVICE_INHERITING: Rights = Rights::all();

// Only allow directory operations on directories. Directories can only
// yield file descriptors to other directories and files.
pub const RIGHTS_DIRECTORY_BASE: Rights = Rights::FD_FDSTAT_SET_FLAGS
    .union(Rights::FD_SYNC)
    .union(Rights::FD_ADVISE)
    .union(Rights::PATH_CREATE_DIRECTORY)
    .union(Rights::PATH_CREATE_FILE)
    .union(Rights::PATH_LINK_SOURCE)
    .union(Rights::PATH_LINK_TARGET)
    .union(Rights::PATH_OPEN)
    .union(Rights::FD_READDIR)
    .union(Rights::PATH_READLINK)
    .union(Rights::PATH_RENAME_SOURCE)
    .union(Rights::PATH_RENAME_TARGET)
    .union(Rights::PATH_FILESTAT_GET)
    .union(Rights::PATH_FILESTAT_SET_SIZE)
    .union(Rights::PATH_FILESTAT_SET_TIMES)
    .union(Rights::FD_FILESTAT_GET)
    .union(Rights::FD_FILESTAT_SET_TIMES)
    .union(Rights::PATH_SYMLINK)
    .union(Rights::PATH_UNLINK_FILE)
    .union(Rights::PATH_REMOVE_DIRECTORY)
    .union(Rights::POLL_FD_READWRITE);
pub const RIGHTS_DIRECTORY_INHERITING: Rights =
    RIGHTS_DIRECTORY_BASE.union(RIGHTS_REGULAR_FILE_BASE);

// Operations that apply to regular files.
pub const RIGHTS_REGULAR_FILE_BASE: Rights = Rights::FD_DATASYNC
    .union(Rights::FD_READ)
    .union(Rights::FD_SEEK)
    .union(Rights::FD_FDSTAT_SET_FLAGS)
    .union(Rights::FD_SYNC)
    .union(Rights::FD_TELL)
    .union(Rights::FD_WRITE)
    .union(Rights::FD_ADVISE)
    .union(Rights::FD_ALLOCATE)
    .union(Rights::FD_FILESTAT_GET)
    .union(Rights::FD_FILESTAT_SET_SIZE)
    .union(Rights::FD_FILESTAT_SET_TIMES)
    .union(Rights::POLL_FD_READWRITE);
pub const RIGHTS_REGULAR_FILE_INHERITING: Rights = Rights::empty();

// Operations that apply to sockets and socket pairs.
pub const RIGHTS_SOCKET_BASE: Rights = Rights::FD_READ
    .union(Rights::FD_FDSTAT_SET_FLAGS)
    .union(Rights::FD_WRITE)
    .union(Rights::FD_FILESTAT_GET)
    .union(Rights::POLL_FD_READWRITE)
    .union(Rights::SOCK_SHUTDOWN);
pub const RIGHTS_SOCKET_INHERITING: Rights = Rights::all();

// Operations that apply to TTYs.
pub const RIGHTS_TTY_BASE: Rights = Rights::FD_READ
    .union(Rights::FD_FDSTAT_SET_FLAGS)
    .union(Rights::FD_WRITE)
    .union(Rights::FD_FILESTAT_GET)
    .union(Rights::POLL_FD_READWRITE);
pub const RIGHTS_TTY_INHERITING: Rights = Rights::empty();
