//! Random-access byte-range sources over an HDF5 file image.
//!
//! The enclosing file handle owns the storage; readers borrow it and never
//! close it. A `map` call must return exactly the requested range, so a short
//! read is an error.

use std::{
    fs::File,
    io::{self, ErrorKind, Read, Seek, SeekFrom},
    path::Path,
    sync::{Arc, Mutex},
};

use bytes::Bytes;

pub trait BackingStorage: Send + Sync {
    /// Read exactly `size` bytes starting at `address`.
    fn map(&self, address: u64, size: u64) -> io::Result<Bytes>;

    /// Total length of the underlying byte source.
    fn len(&self) -> io::Result<u64>;

    fn is_empty(&self) -> io::Result<bool> {
        self.len().map(|l| l == 0)
    }
}

impl<T: BackingStorage + ?Sized> BackingStorage for Arc<T> {
    fn map(&self, address: u64, size: u64) -> io::Result<Bytes> {
        (**self).map(address, size)
    }

    fn len(&self) -> io::Result<u64> {
        (**self).len()
    }
}

fn size_to_usize(size: u64) -> io::Result<usize> {
    usize::try_from(size)
        .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "range too large for this platform"))
}

/// File-backed storage using positioned reads behind a lock.
///
/// The lock covers the seek+read pair only; decompression of mapped bytes
/// stays parallel.
pub struct FileBacking {
    file: Mutex<File>,
}

impl FileBacking {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::from_file(File::open(path)?))
    }

    pub fn from_file(file: File) -> Self {
        Self {
            file: Mutex::new(file),
        }
    }
}

impl BackingStorage for FileBacking {
    fn map(&self, address: u64, size: u64) -> io::Result<Bytes> {
        let mut buf = vec![0; size_to_usize(size)?];
        {
            let mut f = self.file.lock().expect("file lock poisoned");
            f.seek(SeekFrom::Start(address))?;
            f.read_exact(&mut buf)?;
        }
        Ok(Bytes::from(buf))
    }

    fn len(&self) -> io::Result<u64> {
        let f = self.file.lock().expect("file lock poisoned");
        Ok(f.metadata()?.len())
    }
}

/// In-memory storage over a whole file image. `map` returns cheap views.
pub struct SliceBacking {
    data: Bytes,
}

impl SliceBacking {
    pub fn new<B: Into<Bytes>>(data: B) -> Self {
        Self { data: data.into() }
    }
}

impl BackingStorage for SliceBacking {
    fn map(&self, address: u64, size: u64) -> io::Result<Bytes> {
        let start = size_to_usize(address)?;
        let end = start
            .checked_add(size_to_usize(size)?)
            .filter(|e| *e <= self.data.len())
            .ok_or_else(|| {
                io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("range {}..+{} outside {}-byte image", address, size, self.data.len()),
                )
            })?;
        Ok(self.data.slice(start..end))
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn slice_backing_maps_exact_ranges() {
        let b = SliceBacking::new(vec![0u8, 1, 2, 3, 4, 5]);
        assert_eq!(b.map(2, 3).unwrap().as_ref(), &[2, 3, 4]);
        assert_eq!(b.map(0, 0).unwrap().len(), 0);
        assert_eq!(b.len().unwrap(), 6);
    }

    #[test]
    fn slice_backing_rejects_out_of_range() {
        let b = SliceBacking::new(vec![0u8; 4]);
        assert!(b.map(2, 3).is_err());
        assert!(b.map(5, 1).is_err());
    }

    #[test]
    fn file_backing_round_trip() -> anyhow::Result<()> {
        let dir = tempdir::TempDir::new("h5read-storage")?;
        let path = dir.path().join("blob.bin");
        let mut f = File::create(&path)?;
        f.write_all(&[10u8, 20, 30, 40, 50])?;
        drop(f);

        let b = FileBacking::open(&path)?;
        assert_eq!(b.map(1, 3)?.as_ref(), &[20, 30, 40]);
        assert_eq!(b.len()?, 5);
        assert!(b.map(3, 3).is_err());
        Ok(())
    }
}
