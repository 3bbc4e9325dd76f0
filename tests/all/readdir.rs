use super::*;
use std::collections::BTreeSet;
use std::fs;
use wasi_compat::wasi::{DIRENT_SIZE, Filetype};

struct DirEntry {
    next: u64,
    ino: u64,
    file_type: u8,
    name: String,
}

// Walks the complete records in an `fd_readdir` output buffer; a record cut
// short by the end of the buffer is dropped.
fn parse_dirents(mut buf: &[u8]) -> Vec<DirEntry> {
    let header = DIRENT_SIZE as usize;
    let mut entries = Vec::new();
    while buf.len() >= header {
        let next = u64::from_le_bytes(buf[0..8].try_into().unwrap());
        let ino = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        let namlen = u32::from_le_bytes(buf[16..20].try_into().unwrap()) as usize;
        let file_type = buf[20];
        if buf.len() < header + namlen {
            break;
        }
        let name = std::str::from_utf8(&buf[header..header + namlen])
            .expect("invalid utf8")
            .to_owned();
        entries.push(DirEntry {
            next,
            ino,
            file_type,
            name,
        });
        buf = &buf[header + namlen..];
    }
    entries
}

/// Returns the entries plus a bool indicating EOF.
fn exec_fd_readdir(guest: &mut Guest, fd: Fd, buf_len: u32, cookie: u64) -> (Vec<DirEntry>, bool) {
    assert_eq!(
        guest
            .ctx
            .fd_readdir(&mut guest.memory, fd, DATA_PTR, buf_len, cookie, OUT_PTR),
        0
    );
    let used = guest.u32_at(OUT_PTR);
    assert!(used <= buf_len);
    let entries = parse_dirents(guest.get(DATA_PTR, used as usize));
    (entries, used < buf_len)
}

#[test_log::test]
fn empty_directory_lists_nothing() -> Result<()> {
    let mut guest = Guest::new()?;
    let (entries, eof) = exec_fd_readdir(&mut guest, DIR_FD, 256, 0);
    assert!(eof);
    assert!(entries.is_empty());
    Ok(())
}

#[test_log::test]
fn entries_describe_the_files() -> Result<()> {
    let mut guest = Guest::new()?;
    fs::write(guest.dir.path().join("file"), b"")?;
    fs::create_dir(guest.dir.path().join("dir"))?;

    let (entries, eof) = exec_fd_readdir(&mut guest, DIR_FD, 256, 0);
    assert!(eof);
    assert_eq!(entries.len(), 2);

    // Listed in name order, each cookie pointing past its own entry.
    assert_eq!(entries[0].name, "dir");
    assert_eq!(entries[0].file_type, Filetype::Directory.as_raw());
    assert_eq!(entries[0].next, 1);
    assert_eq!(entries[1].name, "file");
    assert_eq!(entries[1].file_type, Filetype::RegularFile.as_raw());
    assert_eq!(entries[1].next, 2);

    let (ptr, len) = guest.put_path(PATH_PTR, "file");
    assert_eq!(
        guest
            .ctx
            .path_filestat_get(&mut guest.memory, DIR_FD, 0, ptr, len, OUT_PTR),
        0
    );
    assert_eq!(entries[1].ino, guest.u64_at(OUT_PTR + 8));

    // Resuming from the last cookie yields nothing more.
    let (entries, eof) = exec_fd_readdir(&mut guest, DIR_FD, 256, 2);
    assert!(eof);
    assert!(entries.is_empty());
    Ok(())
}

#[test_log::test]
fn small_buffers_resume_without_gaps_or_repeats() -> Result<()> {
    let mut guest = Guest::new()?;
    let names: BTreeSet<String> = (0..20).map(|i| format!("entry-{}", "x".repeat(i))).collect();
    for name in &names {
        fs::write(guest.dir.path().join(name), b"")?;
    }

    // The smallest buffer that still fits the longest record, then a few
    // more that split records at varying points.
    let longest = DIRENT_SIZE + "entry-".len() as u32 + 19;
    for buf_len in [longest, longest + 7, 100, 333] {
        let mut seen = Vec::new();
        let mut cookie = 0;
        loop {
            let (entries, eof) = exec_fd_readdir(&mut guest, DIR_FD, buf_len, cookie);
            if let Some(last) = entries.last() {
                cookie = last.next;
            }
            seen.extend(entries.into_iter().map(|e| e.name));
            if eof {
                break;
            }
        }
        assert_eq!(seen.len(), names.len(), "buf_len {buf_len}");
        assert_eq!(
            seen.iter().cloned().collect::<BTreeSet<_>>(),
            names,
            "buf_len {buf_len}"
        );
    }
    Ok(())
}

#[test_log::test]
fn readdir_needs_the_readdir_right() -> Result<()> {
    let mut guest = Guest::new()?;
    let fd = guest
        .open("file", Oflags::CREAT, Rights::FD_READ, Fdflags::empty())
        .unwrap();
    assert_eq!(
        guest
            .ctx
            .fd_readdir(&mut guest.memory, fd, DATA_PTR, 256, 0, OUT_PTR),
        errno(WasiError::EPERM)
    );
    Ok(())
}
