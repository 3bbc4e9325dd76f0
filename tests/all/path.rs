use super::*;
use std::fs;
use wasi_compat::wasi::{Filetype, Fstflags, Lookupflags};

fn escape_fails(guest: &mut Guest, path: &str, oflags: Oflags) {
    assert_eq!(
        guest.open(path, oflags, Rights::FD_READ, Fdflags::empty()),
        Err(errno(WasiError::ENOTCAPABLE)),
        "{path}"
    );
}

#[test_log::test]
fn paths_cannot_escape_the_preopen() -> Result<()> {
    let root = tempfile::tempdir()?;
    let sandbox = root.path().join("sandbox");
    fs::create_dir(&sandbox)?;
    fs::write(root.path().join("secret"), b"secret")?;

    let mut guest = Guest {
        ctx: WasiCtxBuilder::new()
            .preopened_dir(&sandbox, "/sandbox")
            .build()?,
        dir: root,
        memory: vec![0; 0x10000],
    };

    escape_fails(&mut guest, "../../etc/passwd", Oflags::empty());
    escape_fails(&mut guest, "../secret", Oflags::empty());
    escape_fails(&mut guest, "../created", Oflags::CREAT);
    escape_fails(&mut guest, "../../no/such/file", Oflags::CREAT);
    escape_fails(&mut guest, "/etc/passwd", Oflags::empty());
    escape_fails(&mut guest, "a/../../secret", Oflags::empty());
    assert!(!guest.dir.path().join("created").exists());

    // Going up and back down inside the sandbox is fine.
    fs::create_dir(sandbox.join("sub"))?;
    fs::write(sandbox.join("file"), b"inside")?;
    let fd = guest
        .open("sub/../file", Oflags::empty(), Rights::FD_READ, Fdflags::empty())
        .unwrap();
    assert_eq!(guest.read(fd, &[16]).unwrap(), b"inside");
    Ok(())
}

#[test_log::test]
fn symlinks_cannot_escape_the_preopen() -> Result<()> {
    let root = tempfile::tempdir()?;
    let sandbox = root.path().join("sandbox");
    fs::create_dir(&sandbox)?;
    fs::write(root.path().join("secret"), b"secret")?;
    std::os::unix::fs::symlink("..", sandbox.join("up"))?;
    std::os::unix::fs::symlink("../secret", sandbox.join("leak"))?;

    let mut guest = Guest {
        ctx: WasiCtxBuilder::new()
            .preopened_dir(&sandbox, "/sandbox")
            .build()?,
        dir: root,
        memory: vec![0; 0x10000],
    };

    escape_fails(&mut guest, "up/secret", Oflags::empty());
    escape_fails(&mut guest, "up/new", Oflags::CREAT);
    assert!(!guest.dir.path().join("new").exists());

    let (ptr, len) = guest.put_path(PATH_PTR, "leak");
    let follow = Lookupflags::SYMLINK_FOLLOW.bits();
    assert_eq!(
        guest
            .ctx
            .path_filestat_get(&mut guest.memory, DIR_FD, follow, ptr, len, OUT_PTR),
        errno(WasiError::ENOTCAPABLE)
    );

    // Without following, the link itself is inspected.
    assert_eq!(
        guest
            .ctx
            .path_filestat_get(&mut guest.memory, DIR_FD, 0, ptr, len, OUT_PTR),
        0
    );
    assert_eq!(guest.u8_at(OUT_PTR + 16), Filetype::SymbolicLink.as_raw());
    Ok(())
}

fn create_through(guest: &mut Guest, path: &str, dirflags: u32) -> u16 {
    let (ptr, len) = guest.put_path(PATH_PTR, path);
    guest.ctx.path_open(
        &mut guest.memory,
        DIR_FD,
        dirflags,
        ptr,
        len,
        Oflags::CREAT.bits(),
        Rights::FD_WRITE.bits(),
        0,
        0,
        OUT_PTR,
    )
}

#[test_log::test]
fn dangling_symlinks_cannot_create_outside_the_preopen() -> Result<()> {
    let root = tempfile::tempdir()?;
    let sandbox = root.path().join("sandbox");
    fs::create_dir(&sandbox)?;
    std::os::unix::fs::symlink(root.path().join("absolute"), sandbox.join("absolute"))?;
    std::os::unix::fs::symlink("../relative", sandbox.join("relative"))?;

    let mut guest = Guest {
        ctx: WasiCtxBuilder::new()
            .preopened_dir(&sandbox, "/sandbox")
            .build()?,
        dir: root,
        memory: vec![0; 0x10000],
    };

    let follow = Lookupflags::SYMLINK_FOLLOW.bits();
    for name in ["absolute", "relative"] {
        assert_eq!(
            create_through(&mut guest, name, follow),
            errno(WasiError::ENOTCAPABLE),
            "{name}"
        );
        assert!(!guest.dir.path().join(name).exists(), "{name}");

        // Not following, the link itself is in the way.
        assert_ne!(create_through(&mut guest, name, 0), 0, "{name}");
        assert!(!guest.dir.path().join(name).exists(), "{name}");
        assert!(fs::symlink_metadata(sandbox.join(name))?.is_symlink());
    }

    // A dangling link that stays inside is followed and creates its target.
    std::os::unix::fs::symlink("made", sandbox.join("inside"))?;
    assert_eq!(create_through(&mut guest, "inside", follow), 0);
    assert!(sandbox.join("made").is_file());
    Ok(())
}

#[test_log::test]
fn hard_links_do_not_follow_the_source() -> Result<()> {
    let mut guest = Guest::new()?;
    fs::write(guest.dir.path().join("a"), b"")?;
    let (a_ptr, a_len) = guest.put_path(PATH_PTR, "a");
    let (b_ptr, b_len) = guest.put_path(PATH_PTR + 0x40, "b");
    assert_eq!(
        guest.ctx.path_link(
            &mut guest.memory,
            DIR_FD,
            Lookupflags::SYMLINK_FOLLOW.bits(),
            a_ptr,
            a_len,
            DIR_FD,
            b_ptr,
            b_len
        ),
        errno(WasiError::EINVAL)
    );
    assert!(!guest.dir.path().join("b").exists());
    Ok(())
}

#[test_log::test]
fn directories_are_created_and_removed() -> Result<()> {
    let mut guest = Guest::new()?;
    let (ptr, len) = guest.put_path(PATH_PTR, "dir");

    assert_eq!(
        guest
            .ctx
            .path_create_directory(&mut guest.memory, DIR_FD, ptr, len),
        0
    );
    assert!(guest.dir.path().join("dir").is_dir());
    assert_eq!(
        guest
            .ctx
            .path_create_directory(&mut guest.memory, DIR_FD, ptr, len),
        errno(WasiError::EEXIST)
    );

    assert_eq!(
        guest
            .ctx
            .path_filestat_get(&mut guest.memory, DIR_FD, 0, ptr, len, OUT_PTR),
        0
    );
    assert_eq!(guest.u8_at(OUT_PTR + 16), Filetype::Directory.as_raw());

    assert_eq!(
        guest
            .ctx
            .path_remove_directory(&mut guest.memory, DIR_FD, ptr, len),
        0
    );
    assert!(!guest.dir.path().join("dir").exists());
    assert_eq!(
        guest
            .ctx
            .path_remove_directory(&mut guest.memory, DIR_FD, ptr, len),
        errno(WasiError::ENOENT)
    );
    Ok(())
}

#[test_log::test]
fn files_are_linked_renamed_and_unlinked() -> Result<()> {
    let mut guest = Guest::new()?;
    fs::write(guest.dir.path().join("a"), b"data")?;

    let (a_ptr, a_len) = guest.put_path(PATH_PTR, "a");
    let (b_ptr, b_len) = guest.put_path(PATH_PTR + 0x40, "b");
    let (c_ptr, c_len) = guest.put_path(PATH_PTR + 0x80, "c");

    assert_eq!(
        guest.ctx.path_link(
            &mut guest.memory,
            DIR_FD,
            0,
            a_ptr,
            a_len,
            DIR_FD,
            b_ptr,
            b_len
        ),
        0
    );
    assert_eq!(
        guest
            .ctx
            .path_filestat_get(&mut guest.memory, DIR_FD, 0, a_ptr, a_len, OUT_PTR),
        0
    );
    assert_eq!(guest.u32_at(OUT_PTR + 20), 2);

    assert_eq!(
        guest.ctx.path_rename(
            &mut guest.memory,
            DIR_FD,
            b_ptr,
            b_len,
            DIR_FD,
            c_ptr,
            c_len
        ),
        0
    );
    assert!(!guest.dir.path().join("b").exists());
    assert_eq!(fs::read(guest.dir.path().join("c"))?, b"data");

    assert_eq!(
        guest
            .ctx
            .path_unlink_file(&mut guest.memory, DIR_FD, c_ptr, c_len),
        0
    );
    assert!(!guest.dir.path().join("c").exists());
    assert_eq!(
        guest
            .ctx
            .path_unlink_file(&mut guest.memory, DIR_FD, c_ptr, c_len),
        errno(WasiError::ENOENT)
    );
    Ok(())
}

#[test_log::test]
fn symlinks_are_created_and_read_back() -> Result<()> {
    let mut guest = Guest::new()?;
    let (target_ptr, target_len) = guest.put_path(PATH_PTR, "some/target");
    let (link_ptr, link_len) = guest.put_path(PATH_PTR + 0x40, "link");

    assert_eq!(
        guest.ctx.path_symlink(
            &mut guest.memory,
            target_ptr,
            target_len,
            DIR_FD,
            link_ptr,
            link_len
        ),
        0
    );

    let buf = DATA_PTR;
    assert_eq!(
        guest.ctx.path_readlink(
            &mut guest.memory,
            DIR_FD,
            link_ptr,
            link_len,
            buf,
            64,
            OUT_PTR
        ),
        0
    );
    assert_eq!(guest.u32_at(OUT_PTR), 11);
    assert_eq!(guest.get(buf, 11), b"some/target");

    // A short buffer truncates.
    assert_eq!(
        guest.ctx.path_readlink(
            &mut guest.memory,
            DIR_FD,
            link_ptr,
            link_len,
            buf,
            4,
            OUT_PTR
        ),
        0
    );
    assert_eq!(guest.u32_at(OUT_PTR), 4);
    Ok(())
}

#[test_log::test]
fn path_times_are_set_through_the_directory() -> Result<()> {
    let mut guest = Guest::new()?;
    fs::write(guest.dir.path().join("file"), b"")?;
    let (ptr, len) = guest.put_path(PATH_PTR, "file");

    let atim = 1_000_000_000_000_000_007;
    let mtim = 1_100_000_000_000_000_009;
    let flags = (Fstflags::ATIM | Fstflags::MTIM).bits();
    let follow = Lookupflags::SYMLINK_FOLLOW.bits();
    assert_eq!(
        guest.ctx.path_filestat_set_times(
            &mut guest.memory,
            DIR_FD,
            follow,
            ptr,
            len,
            atim,
            mtim,
            flags
        ),
        0
    );
    assert_eq!(
        guest
            .ctx
            .path_filestat_get(&mut guest.memory, DIR_FD, follow, ptr, len, OUT_PTR),
        0
    );
    assert_eq!(guest.u64_at(OUT_PTR + 32), atim);
    assert_eq!(guest.u64_at(OUT_PTR + 40), mtim);
    Ok(())
}

#[test_log::test]
fn path_calls_need_directory_rights() -> Result<()> {
    let mut guest = Guest::new()?;
    let fd = guest
        .open("file", Oflags::CREAT, Rights::FD_READ, Fdflags::empty())
        .unwrap();
    let (ptr, len) = guest.put_path(PATH_PTR, "dir");
    assert_eq!(
        guest.ctx.path_create_directory(&mut guest.memory, fd, ptr, len),
        errno(WasiError::EPERM)
    );
    assert_eq!(
        guest.ctx.path_create_directory(&mut guest.memory, 99, ptr, len),
        errno(WasiError::EBADF)
    );
    assert!(!guest.dir.path().join("dir").exists());
    Ok(())
}
