//! Positioned access to a backing disk image.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::codec::{CodecError, OnDisk};
use crate::error::{FsError, Result};

const COPY_CHUNK: usize = 64 * 1024;

/// Synchronous byte-range I/O; the device never interprets what it stores.
pub trait BlockDevice {
    fn len(&self) -> Result<u64>;

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn read_vec(&mut self, offset: i64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at(to_offset(offset)?, &mut buf)?;
        Ok(buf)
    }

    fn write_bytes(&mut self, offset: i64, bytes: &[u8]) -> Result<()> {
        self.write_at(to_offset(offset)?, bytes)
    }

    fn read_record<T: OnDisk>(&mut self, offset: i64) -> Result<T>
    where
        Self: Sized,
    {
        let buf = self.read_vec(offset, T::SIZE)?;
        Ok(T::from_bytes(&buf)?)
    }

    fn write_record<T: OnDisk>(&mut self, offset: i64, record: &T) -> Result<()>
    where
        Self: Sized,
    {
        self.write_bytes(offset, &record.to_bytes())
    }

    /// Overwrites `len` bytes at `offset` with zeros.
    fn zero(&mut self, offset: i64, len: i64) -> Result<()> {
        if len <= 0 {
            return Ok(());
        }
        let zeros = vec![0u8; COPY_CHUNK.min(len as usize)];
        let mut done = 0i64;
        while done < len {
            let n = (len - done).min(zeros.len() as i64);
            self.write_bytes(offset + done, &zeros[..n as usize])?;
            done += n;
        }
        Ok(())
    }

    /// Moves `len` bytes from `src` to `dst`; overlapping ranges are safe.
    fn copy_within(&mut self, src: i64, dst: i64, len: i64) -> Result<()> {
        if len <= 0 || src == dst {
            return Ok(());
        }
        debug!("copy {len} bytes {src} -> {dst}");
        let chunk = COPY_CHUNK as i64;
        if dst < src {
            let mut done = 0;
            while done < len {
                let n = (len - done).min(chunk);
                let buf = self.read_vec(src + done, n as usize)?;
                self.write_bytes(dst + done, &buf)?;
                done += n;
            }
        } else {
            let mut left = len;
            while left > 0 {
                let n = left.min(chunk);
                let buf = self.read_vec(src + left - n, n as usize)?;
                self.write_bytes(dst + left - n, &buf)?;
                left -= n;
            }
        }
        Ok(())
    }
}

fn to_offset(offset: i64) -> Result<u64> {
    u64::try_from(offset).map_err(|_| FsError::corruption(format!("negative offset {offset}")))
}

/// A disk image file opened read-write for the duration of one command.
pub struct FileDevice {
    file: File,
    path: PathBuf,
}

impl FileDevice {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    FsError::not_found(format!("disk {}", path.display()))
                }
                _ => FsError::Device(e),
            })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockDevice for FileDevice {
    fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let needed = buf.len();
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => FsError::from(CodecError::Truncated { needed, got: 0 }),
            _ => FsError::Device(e),
        })
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        Ok(())
    }
}

/// In-memory device, handy for exercising the engine without touching disk.
#[derive(Debug, Clone, Default)]
pub struct MemDevice {
    bytes: Vec<u8>,
}

impl MemDevice {
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0; len],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl BlockDevice for MemDevice {
    fn len(&self) -> Result<u64> {
        Ok(self.bytes.len() as u64)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + buf.len();
        if end > self.bytes.len() {
            return Err(CodecError::Truncated {
                needed: end,
                got: self.bytes.len(),
            }
            .into());
        }
        buf.copy_from_slice(&self.bytes[start..end]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + buf.len();
        if end > self.bytes.len() {
            return Err(FsError::no_space(format!(
                "write of {} bytes at {start} past end of device",
                buf.len()
            )));
        }
        self.bytes[start..end].copy_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_layout::{Ebr, PART_NAME_LEN};

    #[test]
    fn records_round_trip_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.mia");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();

        let mut dev = FileDevice::open(&path).unwrap();
        let ebr = Ebr {
            mount: b'0',
            fit: b'F',
            start: 2048,
            size: 100,
            next: -1,
            name: [b'a'; PART_NAME_LEN],
        };
        dev.write_record(1024, &ebr).unwrap();
        let back: Ebr = dev.read_record(1024).unwrap();
        assert_eq!(back, ebr);
    }

    #[test]
    fn reading_past_the_end_is_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.mia");
        std::fs::write(&path, vec![0u8; 16]).unwrap();
        let mut dev = FileDevice::open(&path).unwrap();
        assert!(matches!(
            dev.read_record::<Ebr>(0),
            Err(FsError::Corruption(_))
        ));
    }

    #[test]
    fn missing_disk_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FileDevice::open(dir.path().join("none.mia")),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn overlapping_copies_preserve_data() {
        let mut dev = MemDevice::new(64);
        dev.write_bytes(8, b"0123456789").unwrap();
        dev.copy_within(8, 12, 10).unwrap();
        assert_eq!(&dev.as_bytes()[12..22], b"0123456789");
        dev.copy_within(12, 2, 10).unwrap();
        assert_eq!(&dev.as_bytes()[2..12], b"0123456789");
        dev.zero(2, 4).unwrap();
        assert_eq!(&dev.as_bytes()[2..6], &[0, 0, 0, 0]);
    }
}
