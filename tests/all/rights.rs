use super::*;
use std::fs;
use wasi_compat::wasi::{self, Filetype};

#[test_log::test]
fn set_rights_only_narrows() -> Result<()> {
    let mut guest = Guest::new()?;
    let fd = guest
        .open(
            "file",
            Oflags::CREAT,
            wasi::RIGHTS_REGULAR_FILE_BASE,
            Fdflags::empty(),
        )
        .unwrap();

    let (filetype, _, base, inheriting) = guest.fdstat(fd).unwrap();
    assert_eq!(filetype, Filetype::RegularFile.as_raw());
    assert_eq!(base, wasi::RIGHTS_REGULAR_FILE_BASE.bits());
    assert_eq!(inheriting, 0);

    let narrowed = Rights::FD_READ | Rights::FD_SEEK | Rights::FD_TELL;
    assert_eq!(guest.ctx.fd_fdstat_set_rights(fd, narrowed.bits(), 0), 0);
    assert_eq!(guest.fdstat(fd).unwrap().2, narrowed.bits());

    // Regaining a dropped right is refused and changes nothing.
    let widened = narrowed | Rights::FD_WRITE;
    assert_eq!(
        guest.ctx.fd_fdstat_set_rights(fd, widened.bits(), 0),
        errno(WasiError::EPERM)
    );
    assert_eq!(
        guest
            .ctx
            .fd_fdstat_set_rights(fd, narrowed.bits(), Rights::FD_READ.bits()),
        errno(WasiError::EPERM)
    );
    assert_eq!(guest.fdstat(fd).unwrap().2, narrowed.bits());

    // Narrowing to the current set is allowed, and so is dropping to nothing.
    assert_eq!(guest.ctx.fd_fdstat_set_rights(fd, narrowed.bits(), 0), 0);
    assert_eq!(guest.ctx.fd_fdstat_set_rights(fd, 0, 0), 0);
    assert_eq!(guest.fdstat(fd).unwrap().2, 0);
    assert_eq!(
        guest.ctx.fd_fdstat_set_rights(fd, Rights::FD_READ.bits(), 0),
        errno(WasiError::EPERM)
    );
    Ok(())
}

#[test_log::test]
fn unknown_rights_bits_are_refused() -> Result<()> {
    let mut guest = Guest::new()?;
    let (_, _, base, inheriting) = guest.fdstat(DIR_FD).unwrap();
    assert_eq!(
        guest.ctx.fd_fdstat_set_rights(DIR_FD, base | 1 << 40, inheriting),
        errno(WasiError::EPERM)
    );
    assert_eq!(guest.fdstat(DIR_FD).unwrap().2, base);
    Ok(())
}

#[test_log::test]
fn writes_need_the_write_right() -> Result<()> {
    let mut guest = Guest::new()?;
    fs::write(guest.dir.path().join("file"), b"original")?;

    let fd = guest
        .open(
            "file",
            Oflags::empty(),
            Rights::FD_READ | Rights::FD_SEEK,
            Fdflags::empty(),
        )
        .unwrap();
    assert_eq!(
        guest.write(fd, &[b"clobbered"]),
        Err(errno(WasiError::EPERM))
    );
    assert_eq!(
        guest.pwrite(fd, &[b"clobbered"], 0),
        Err(errno(WasiError::EPERM))
    );
    assert_eq!(fs::read(guest.dir.path().join("file"))?, b"original");

    // The descriptor itself still reads.
    assert_eq!(guest.read(fd, &[64]).unwrap(), b"original");
    Ok(())
}

#[test_log::test]
fn pwrite_also_needs_seek() -> Result<()> {
    let mut guest = Guest::new()?;
    let fd = guest
        .open("file", Oflags::CREAT, Rights::FD_WRITE, Fdflags::APPEND)
        .unwrap();
    assert_eq!(guest.write(fd, &[b"abc"]), Ok(3));
    assert_eq!(guest.pwrite(fd, &[b"x"], 0), Err(errno(WasiError::EPERM)));
    assert_eq!(fs::read(guest.dir.path().join("file"))?, b"abc");
    Ok(())
}

#[test_log::test]
fn opened_rights_are_bounded_by_the_directory() -> Result<()> {
    let mut guest = Guest::new()?;

    // The preopen cannot hand out socket rights.
    assert_eq!(
        guest.open(
            "file",
            Oflags::CREAT,
            Rights::FD_READ | Rights::SOCK_SHUTDOWN,
            Fdflags::empty(),
        ),
        Err(errno(WasiError::EPERM))
    );
    assert!(!guest.dir.path().join("file").exists());

    // Once the directory drops `PATH_CREATE_FILE` nothing can be created.
    let (_, _, base, inheriting) = guest.fdstat(DIR_FD).unwrap();
    let base = base & !Rights::PATH_CREATE_FILE.bits();
    assert_eq!(guest.ctx.fd_fdstat_set_rights(DIR_FD, base, inheriting), 0);
    assert_eq!(
        guest.open("file", Oflags::CREAT, Rights::FD_READ, Fdflags::empty()),
        Err(errno(WasiError::EPERM))
    );
    assert!(!guest.dir.path().join("file").exists());
    Ok(())
}

#[test_log::test]
fn unsupported_calls_check_rights_first() -> Result<()> {
    let mut guest = Guest::new()?;
    let fd = guest
        .open(
            "file",
            Oflags::CREAT,
            Rights::FD_READ | Rights::FD_ADVISE | Rights::FD_ALLOCATE,
            Fdflags::empty(),
        )
        .unwrap();

    assert_eq!(guest.ctx.fd_advise(fd, 0, 0, 0), errno(WasiError::ENOSYS));
    assert_eq!(guest.ctx.fd_allocate(fd, 0, 16), errno(WasiError::ENOSYS));
    assert_eq!(
        guest.ctx.fd_fdstat_set_flags(fd, 0),
        errno(WasiError::EPERM)
    );
    assert_eq!(guest.ctx.fd_advise(99, 0, 0, 0), errno(WasiError::EBADF));

    assert_eq!(
        guest.ctx.sock_recv(fd, 0, 0, 0, 0, 0),
        errno(WasiError::ENOSYS)
    );
    assert_eq!(
        guest.ctx.sock_send(fd, 0, 0, 0, 0),
        errno(WasiError::EPERM)
    );
    assert_eq!(guest.ctx.sock_shutdown(fd, 0), errno(WasiError::EPERM));
    assert_eq!(guest.ctx.sock_shutdown(99, 0), errno(WasiError::EBADF));
    Ok(())
}
