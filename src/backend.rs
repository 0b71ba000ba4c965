use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// How a `ByteFile` is shared with other processes while open.
///
/// Applied as an advisory lock for the lifetime of the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharePolicy {
    /// Deny both reads and writes to other lock-honoring openers.
    Exclusive,
    /// Allow concurrent readers, deny writers.
    ShareRead,
    /// No lock at all.
    ShareNone,
}

/// A raw random-access byte file opened with an fopen-style mode string.
#[derive(Debug)]
pub struct ByteFile {
    path: PathBuf,
    file: File,
}

impl ByteFile {
    /// Opens `path` with the given mode string (`"r"`, `"r+"`, `"w"`, `"w+"`,
    /// `"a"`, `"a+"`; a `b` anywhere in the string is accepted and ignored).
    ///
    /// Truncating modes only truncate once the share lock is held, so a
    /// refused open cannot destroy another session's file.
    pub fn open(
        path: impl Into<PathBuf>,
        mode: &str,
        share: SharePolicy,
    ) -> io::Result<ByteFile> {
        let path = path.into();
        let (options, truncate) = parse_mode(mode)?;
        let file = options.open(&path)?;
        match share {
            SharePolicy::Exclusive => FileExt::try_lock_exclusive(&file)?,
            SharePolicy::ShareRead => FileExt::try_lock_shared(&file)?,
            SharePolicy::ShareNone => {}
        }
        if truncate {
            file.set_len(0)?;
        }
        Ok(ByteFile { path, file })
    }

    /// Tries `mode_a`, then retries with `mode_b` when it is non-empty and
    /// different. Both failing surfaces the second error.
    pub fn open_with_fallback(
        path: impl Into<PathBuf>,
        mode_a: &str,
        mode_b: &str,
        share: SharePolicy,
    ) -> io::Result<ByteFile> {
        let path = path.into();
        match ByteFile::open(&path, mode_a, share) {
            Ok(file) => Ok(file),
            Err(err) if mode_b.is_empty() || mode_a == mode_b => Err(err),
            Err(_) => ByteFile::open(&path, mode_b, share),
        }
    }

    pub fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        self.file.seek(target)
    }

    pub fn stream_position(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    /// Flushes kernel buffers to the platter. The durability barrier of the
    /// commit protocol.
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for ByteFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for ByteFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn parse_mode(mode: &str) -> io::Result<(OpenOptions, bool)> {
    let stripped: String = mode.chars().filter(|ch| *ch != 'b').collect();
    let mut options = OpenOptions::new();
    let mut truncate = false;
    match stripped.as_str() {
        "r" => options.read(true),
        "r+" => options.read(true).write(true),
        "w" => {
            truncate = true;
            options.write(true).create(true)
        }
        "w+" => {
            truncate = true;
            options.read(true).write(true).create(true)
        }
        "a" => options.append(true).create(true),
        "a+" => options.read(true).append(true).create(true),
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unrecognized file mode {mode:?}"),
            ))
        }
    };
    Ok((options, truncate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn read_write_mode_requires_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.bin");
        let err = ByteFile::open(&path, "rb+", SharePolicy::ShareNone).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn fallback_creates_when_first_mode_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fresh.bin");
        let mut file =
            ByteFile::open_with_fallback(&path, "rb+", "wb+", SharePolicy::ShareNone).unwrap();
        file.write_all(b"abc").unwrap();
        drop(file);
        assert_eq!(fs::read(&path).unwrap(), b"abc");
    }

    #[test]
    fn fallback_preserves_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kept.bin");
        fs::write(&path, b"payload").unwrap();
        let mut file =
            ByteFile::open_with_fallback(&path, "rb+", "wb+", SharePolicy::ShareNone).unwrap();
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"payload");
    }

    #[test]
    fn unknown_mode_string_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("any.bin");
        let err = ByteFile::open(&path, "rw", SharePolicy::ShareNone).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn exclusive_lock_blocks_second_opener() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locked.bin");
        let held = ByteFile::open(&path, "wb+", SharePolicy::Exclusive).unwrap();
        ByteFile::open(&path, "rb+", SharePolicy::Exclusive).unwrap_err();
        drop(held);
        ByteFile::open(&path, "rb+", SharePolicy::Exclusive).unwrap();
    }

    #[test]
    fn refused_exclusive_open_does_not_truncate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, b"precious").unwrap();
        let held = ByteFile::open(&path, "rb+", SharePolicy::Exclusive).unwrap();
        ByteFile::open(&path, "wb+", SharePolicy::Exclusive).unwrap_err();
        drop(held);
        assert_eq!(fs::read(&path).unwrap(), b"precious");
    }

    #[test]
    fn shared_lock_admits_readers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared.bin");
        let _first = ByteFile::open(&path, "wb+", SharePolicy::ShareRead).unwrap();
        ByteFile::open(&path, "rb+", SharePolicy::ShareRead).unwrap();
    }

    #[test]
    fn seek_reports_resulting_offset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seek.bin");
        fs::write(&path, b"0123456789").unwrap();
        let mut file = ByteFile::open(&path, "rb+", SharePolicy::ShareNone).unwrap();
        assert_eq!(file.seek(SeekFrom::End(-2)).unwrap(), 8);
        assert_eq!(file.stream_position().unwrap(), 8);
    }
}
