use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};
use std::sync::atomic::AtomicU32;
use tracing::{debug, warn};

/// Errors raised while opening or using a shared memory channel
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The producer has not created the region yet
    #[error("Shared memory region not found: {0:?}")]
    NotFound(PathBuf),

    #[error("Permission denied on shared memory region: {0:?}")]
    PermissionDenied(PathBuf),

    /// The region is smaller than the slot geometry requires
    #[error("Shared memory region {path:?} has {actual} bytes, expected at least {expected}")]
    SizeMismatch {
        path: PathBuf,
        expected: usize,
        actual: u64,
    },

    #[error("Record has {actual} bytes, channel slots hold {expected}")]
    RecordSize { expected: usize, actual: usize },

    #[error("Invalid channel geometry: {0}")]
    Geometry(String),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ChannelError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// A file-backed region mapped `MAP_SHARED` into this process
///
/// The memory belongs to the OS shared memory facility and outlives the
/// mapping. Unmapping happens on [`SharedRegion::close`] or on drop.
pub struct SharedRegion {
    ptr: NonNull<u8>,
    len: usize,
    path: PathBuf,
    file: Option<File>,
    mapped: bool,
}

// The mapping stays valid until unmapped; cross-process access discipline is
// the ring buffer's job.
unsafe impl Send for SharedRegion {}

impl SharedRegion {
    /// Maps an existing region. The file must hold at least `len` bytes.
    pub fn open(path: &Path, len: usize) -> Result<Self, ChannelError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| ChannelError::from_io(path, e))?;

        let actual = file
            .metadata()
            .map_err(|e| ChannelError::from_io(path, e))?
            .len();
        if actual < len as u64 {
            return Err(ChannelError::SizeMismatch {
                path: path.to_path_buf(),
                expected: len,
                actual,
            });
        }

        Self::map(path, file, len)
    }

    /// Creates (or grows) the backing file and maps it.
    ///
    /// Used where this process plays the producer that sets a region up.
    pub fn create(path: &Path, len: usize) -> Result<Self, ChannelError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| ChannelError::from_io(path, e))?;

        let actual = file
            .metadata()
            .map_err(|e| ChannelError::from_io(path, e))?
            .len();
        if actual < len as u64 {
            debug!("Sizing shared memory region {:?} to {} bytes", path, len);
            file.set_len(len as u64)
                .map_err(|e| ChannelError::from_io(path, e))?;
        }

        Self::map(path, file, len)
    }

    fn map(path: &Path, file: File, len: usize) -> Result<Self, ChannelError> {
        if len == 0 {
            return Err(ChannelError::Geometry(
                "cannot map a zero-length region".to_string(),
            ));
        }

        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(ChannelError::from_io(path, io::Error::last_os_error()));
        }
        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| ChannelError::Geometry("mmap returned a null mapping".to_string()))?;

        debug!("Mapped {} bytes of {:?}", len, path);
        Ok(Self {
            ptr,
            len,
            path: path.to_path_buf(),
            file: Some(file),
            mapped: true,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_bytes(&self, offset: usize, out: &mut [u8]) {
        assert!(
            offset + out.len() <= self.len,
            "read of {} bytes at {} past end of {}-byte region",
            out.len(),
            offset,
            self.len
        );
        unsafe {
            ptr::copy_nonoverlapping(self.ptr.as_ptr().add(offset), out.as_mut_ptr(), out.len());
        }
    }

    pub fn write_bytes(&mut self, offset: usize, data: &[u8]) {
        assert!(
            offset + data.len() <= self.len,
            "write of {} bytes at {} past end of {}-byte region",
            data.len(),
            offset,
            self.len
        );
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.as_ptr().add(offset), data.len());
        }
    }

    /// Control words are shared with another process, so they are only ever
    /// touched atomically.
    pub fn word(&self, offset: usize) -> &AtomicU32 {
        assert!(
            offset % 4 == 0 && offset + 4 <= self.len,
            "control word at {} is misaligned or out of bounds",
            offset
        );
        unsafe { &*(self.ptr.as_ptr().add(offset) as *const AtomicU32) }
    }

    /// Unmaps the region and closes the backing file
    pub fn close(mut self) -> Result<(), ChannelError> {
        self.unmap()
    }

    fn unmap(&mut self) -> Result<(), ChannelError> {
        if !self.mapped {
            return Ok(());
        }
        self.mapped = false;
        self.file.take();

        let rc = unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.len) };
        if rc != 0 {
            return Err(ChannelError::from_io(
                &self.path,
                io::Error::last_os_error(),
            ));
        }
        debug!("Unmapped {:?}", self.path);
        Ok(())
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        if let Err(e) = self.unmap() {
            warn!("Failed to unmap shared memory region: {}", e);
        }
    }
}

impl fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRegion")
            .field("path", &self.path)
            .field("len", &self.len)
            .field("mapped", &self.mapped)
            .finish()
    }
}
