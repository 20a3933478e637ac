use std::{
    fs::{File, OpenOptions},
    io::{Error as IoError, ErrorKind as IoErrorKind, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use bitflags::bitflags;
use rustix::{
    fd::AsFd,
    fs::{FileType, OFlags, fcntl_getfl, fstat},
};

#[cfg(target_os = "linux")]
use crate::ioctl::{device_size_bytes, is_read_only, logical_block_size};
use crate::XboxPartError;

bitflags! {
    /// Media attributes carried from a source into every partition built on it.
    ///
    /// The scanner never interprets these, it only copies them.
    #[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
    pub struct MediaAttributes: u32 {
        /// Media can be ejected.
        const EJECTABLE = 1 << 0;
        /// Media can be removed from its drive.
        const REMOVABLE = 1 << 1;
    }
}

/// Access level requested when opening a [`BlockSource`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Access {
    Reader,
    ReaderWriter,
}

/// A randomly addressable, open/close managed range of bytes.
///
/// Implementors count nested opens: every successful [`BlockSource::open`] is
/// matched by exactly one [`BlockSource::close`]. Prefer [`Session`] over
/// calling the pair by hand.
pub trait BlockSource {
    /// Whether the media is known to hold content.
    fn is_formatted(&self) -> bool;

    fn is_writable(&self) -> bool;

    /// Total size in bytes.
    fn size(&self) -> u64;

    /// Natural transfer unit in bytes.
    fn preferred_block_size(&self) -> u64;

    fn attributes(&self) -> MediaAttributes;

    fn is_open(&self) -> bool;

    fn open(&mut self, access: Access) -> Result<(), IoError>;

    fn close(&mut self);

    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// Fails unless the whole buffer could be read.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), IoError>;
}

/// An open session on a [`BlockSource`], closed again when dropped.
#[derive(Debug)]
pub struct Session<'a, S: BlockSource + ?Sized> {
    source: &'a mut S,
}

impl<'a, S: BlockSource + ?Sized> Session<'a, S> {
    pub fn open(source: &'a mut S, access: Access) -> Result<Self, IoError> {
        source.open(access)?;
        return Ok(Self { source });
    }

    #[inline]
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), IoError> {
        return self.source.read_at(offset, buf);
    }

    #[inline]
    pub fn source(&self) -> &S {
        return &*self.source;
    }
}

impl<S: BlockSource + ?Sized> Drop for Session<'_, S> {
    fn drop(&mut self) {
        self.source.close();
    }
}

/// [`BlockSource`] backed by a regular file or a block device.
///
/// # Fields
/// - `file`: The open [`File`].
/// - `path`: Path the file was opened from.
/// - `size`: Total size in bytes of the file or device.
/// - `block_size`: Logical block size in bytes.
/// - `writable`: Whether the descriptor was opened for writing and the
///   device is not marked read-only.
/// - `file_type`: File type taken from the `S_IFMT` bits of `st_mode`.
/// - `attributes`: Media attributes reported for the device.
/// - `opens`: Number of open sessions.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    path: PathBuf,
    size: u64,
    block_size: u64,
    writable: bool,
    file_type: FileType,
    attributes: MediaAttributes,
    opens: usize,
}

impl FileSource {
    /// Create a source from a [`File`].
    ///
    /// - Reads file metadata via [`fstat`](rustix::fs::fstat).
    /// - If the file is a block device:
    ///   - queries the logical block size, total size and read-only state
    ///     using kernel ioctls.
    /// - If the file is not a block device:
    ///   - defaults logical block size to `512` bytes,
    ///   - uses the file size from [`fstat`](rustix::fs::fstat).
    pub fn new(file: File, path: &Path) -> Result<FileSource, XboxPartError> {
        let stat = fstat(file.as_fd())?;
        let opened_rw = fcntl_getfl(file.as_fd())?.intersects(OFlags::RDWR | OFlags::WRONLY);
        let file_type = FileType::from_raw_mode(stat.st_mode);
        let is_block = file_type.is_block_device();

        #[cfg(target_os = "linux")]
        let (block_size, size, read_only, attributes) = if is_block {
            (
                u64::from(logical_block_size(file.as_fd())?),
                device_size_bytes(file.as_fd())?,
                is_read_only(file.as_fd())?,
                removable_attributes(stat.st_rdev),
            )
        } else {
            (512, stat.st_size as u64, false, MediaAttributes::empty())
        };

        #[cfg(not(target_os = "linux"))]
        let (block_size, size, read_only, attributes) = if is_block {
            let mut clone = file.try_clone()?;
            (512, clone.seek(SeekFrom::End(0))?, false, MediaAttributes::empty())
        } else {
            (512, stat.st_size as u64, false, MediaAttributes::empty())
        };

        log::debug!(
            "FileSource::new - PATH: {path:?}, SIZE: {size}, BLOCK SIZE: {block_size}, BLOCK DEVICE: {is_block}"
        );

        Ok(Self {
            file,
            path: path.to_path_buf(),
            size,
            block_size,
            writable: opened_rw && !read_only,
            file_type,
            attributes,
            opens: 0,
        })
    }

    /// Create a read-only source from a file path.
    pub fn from_filename(filename: &Path) -> Result<FileSource, XboxPartError> {
        let file = File::open(filename)?;

        return FileSource::new(file, filename);
    }

    /// Create a source from a file path, opened for reading and writing.
    pub fn from_filename_rw(filename: &Path) -> Result<FileSource, XboxPartError> {
        let file = OpenOptions::new().read(true).write(true).open(filename)?;

        return FileSource::new(file, filename);
    }

    /// Returns the path of the file or device as a [`Path`].
    #[inline]
    pub fn path(&self) -> &Path {
        return self.path.as_path();
    }

    /// Returns if the file is a block device.
    #[inline]
    pub fn is_block_device(&self) -> bool {
        return self.file_type.is_block_device();
    }

    /// Returns if the file is a regular file.
    #[inline]
    pub fn is_regular_file(&self) -> bool {
        return self.file_type.is_file();
    }
}

impl BlockSource for FileSource {
    fn is_formatted(&self) -> bool {
        return self.size > 0;
    }

    fn is_writable(&self) -> bool {
        return self.writable;
    }

    fn size(&self) -> u64 {
        return self.size;
    }

    fn preferred_block_size(&self) -> u64 {
        return self.block_size;
    }

    fn attributes(&self) -> MediaAttributes {
        return self.attributes;
    }

    fn is_open(&self) -> bool {
        return self.opens > 0;
    }

    fn open(&mut self, access: Access) -> Result<(), IoError> {
        if access == Access::ReaderWriter && !self.writable {
            return Err(IoError::new(
                IoErrorKind::PermissionDenied,
                "Source is not writable",
            ));
        }
        self.opens += 1;
        return Ok(());
    }

    fn close(&mut self) {
        self.opens = self.opens.saturating_sub(1);
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), IoError> {
        if self.opens == 0 {
            return Err(IoErrorKind::NotConnected.into());
        }

        let end = offset
            .checked_add(buf.len() as u64)
            .ok_or(IoErrorKind::InvalidInput)?;
        if end > self.size {
            return Err(IoErrorKind::UnexpectedEof.into());
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;

        return Ok(());
    }
}

#[cfg(target_os = "linux")]
fn removable_attributes(dev: rustix::fs::Dev) -> MediaAttributes {
    use rustix::fs::{major, minor};

    let path = format!("/sys/dev/block/{}:{}/removable", major(dev), minor(dev));

    match std::fs::read_to_string(&path) {
        Ok(t) if t.trim() == "1" => MediaAttributes::REMOVABLE | MediaAttributes::EJECTABLE,
        Ok(_) => MediaAttributes::empty(),
        Err(e) => {
            log::debug!("removable_attributes - PATH: {path:?}, Error: {e}");
            MediaAttributes::empty()
        }
    }
}
