use std::{
    fmt,
    io::{Error as IoError, ErrorKind as IoErrorKind},
};

use thiserror::Error;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{BigEndian, U16, U32},
};

use crate::{
    source::{Access, BlockSource, MediaAttributes, Session},
    util::{alloc_buffer, round_up},
};

pub const N_XBOX_PARTITIONS: usize = 4;

pub const CACHE_PART_START: u64 = 0x000080000;
pub const GAME_CACHE_PART_START: u64 = 0x080080000;
pub const XBOX_BACKWARDS_COMPAT_PART_START: u64 = 0x120EB0000;
pub const MAIN_PART_START: u64 = 0x130EB0000;

pub const XTAF_MAGIC: &[u8; 4] = b"XTAF";

const FATX_SUPERBLOCK_PADDING_LENGTH: usize = 4 + 4078;

/// Superblock checks run by [`scan`], in order.
///
/// The backwards compatibility partition is exposed without its own
/// superblock being checked.
#[rustfmt::skip]
const SIGNATURE_CHECKS: &[(&str, u64)] = &[
    ("cache", CACHE_PART_START),
    //("xbox backwards compat", XBOX_BACKWARDS_COMPAT_PART_START),
    ("main", MAIN_PART_START),
];

#[derive(Debug, Error)]
pub enum ScanFailure {
    #[error("Media is not formatted")]
    Unformatted,
    #[error("Invalid preferred block size: {0}")]
    InvalidBlockSize(u64),
    #[error("Unable to allocate a {0} byte read buffer")]
    Allocation(u64),
    #[error("Unable to open media for reading: {0}")]
    Open(#[source] IoError),
    #[error("I/O operation failed at offset {offset:#X}: {source}")]
    Read {
        offset: u64,
        #[source]
        source: IoError,
    },
    #[error("No XTAF signature at offset {offset:#X}, found {found:02X?}")]
    BadSignature { offset: u64, found: [u8; 4] },
    #[error("Media size {size:#X} leaves no room for the main partition")]
    Truncated { size: u64 },
}

/// The one way a scan can fail.
///
/// Every reason a device is rejected collapses into this error. The
/// underlying reason is kept for diagnostics and reachable with
/// [`NotXboxDisk::cause`].
#[derive(Debug, Error)]
#[error("Not an Xbox disk")]
pub struct NotXboxDisk {
    #[source]
    cause: ScanFailure,
}

impl NotXboxDisk {
    /// Returns why the device was rejected.
    pub fn cause(&self) -> &ScanFailure {
        &self.cause
    }
}

impl From<ScanFailure> for NotXboxDisk {
    fn from(cause: ScanFailure) -> Self {
        NotXboxDisk { cause }
    }
}

/// FATX volume header found at the start of the cache and main partitions.
///
/// Only `header` takes part in detection.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
pub struct FatxSuperblock {
    pub header: [u8; 4],
    pub volume_id: U32<BigEndian>,
    pub cluster_size: U32<BigEndian>,
    pub fat_count: U16<BigEndian>,
    junk: [u8; FATX_SUPERBLOCK_PADDING_LENGTH],
}

impl FatxSuperblock {
    /// Checks the header against `XTAF` one byte at a time.
    pub fn is_fatx(&self) -> bool {
        return self.header[0] == b'X'
            && self.header[1] == b'T'
            && self.header[2] == b'A'
            && self.header[3] == b'F';
    }
}

/// Content hint attached to a partition. Advisory only.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ContentHint {
    Fatx,
    Stfc,
}

impl ContentHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fatx => "FATX",
            Self::Stfc => "STFC",
        }
    }
}

impl fmt::Display for ContentHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One fixed region of an Xbox 360 drive.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct XboxPartition {
    /// Absolute byte offset from the start of the media.
    pub offset: u64,
    /// Length in bytes.
    pub size: u64,
    /// Block size inherited from the media.
    pub block_size: u64,
    pub name: &'static str,
    /// Position within the layout, also used as the location string.
    pub index: u32,
    pub content: ContentHint,
    /// Inherited from the media.
    pub writable: bool,
    /// Inherited from the media.
    pub attributes: MediaAttributes,
}

impl XboxPartition {
    /// Returns the first byte past the end of the partition.
    #[inline]
    pub fn end(&self) -> u64 {
        return self.offset + self.size;
    }

    /// Returns the location of the partition as a string.
    #[inline]
    pub fn location(&self) -> String {
        return self.index.to_string();
    }
}

struct PartitionLayout {
    name: &'static str,
    start: u64,
    /// `None` runs to the end of the media.
    end: Option<u64>,
    content: ContentHint,
}

const LAYOUT: [PartitionLayout; N_XBOX_PARTITIONS] = [
    PartitionLayout {
        name: "Cache Partition",
        start: CACHE_PART_START,
        end: Some(GAME_CACHE_PART_START),
        content: ContentHint::Fatx,
    },
    PartitionLayout {
        name: "Game Cache Partition",
        start: GAME_CACHE_PART_START,
        end: Some(XBOX_BACKWARDS_COMPAT_PART_START),
        content: ContentHint::Stfc,
    },
    PartitionLayout {
        name: "Xbox Backwards Compatibility drive",
        start: XBOX_BACKWARDS_COMPAT_PART_START,
        end: Some(MAIN_PART_START),
        content: ContentHint::Fatx,
    },
    PartitionLayout {
        name: "Main Xbox360 Partition",
        start: MAIN_PART_START,
        end: None,
        content: ContentHint::Fatx,
    },
];

/// Size of the buffer used for superblock reads on media with `block_size`
/// byte blocks.
///
/// Returns `None` if the block size is zero or the rounded size overflows.
pub fn superblock_buffer_size(block_size: u64) -> Option<u64> {
    return round_up(size_of::<FatxSuperblock>() as u64, block_size);
}

/// Decide whether `source` holds an Xbox 360 drive and describe its partitions.
///
/// The source must not be open for anything that conflicts with a read
/// session. One session is opened for the duration of the call and closed
/// before returning, whatever the outcome.
///
/// The cache and main superblocks are read in that order and the scan stops
/// at the first read error or signature mismatch. Nothing is retried.
///
/// # Returns
/// The cache, game cache, backwards compatibility and main partitions, in
/// that order. They tile `[CACHE_PART_START, source.size())` without gaps.
///
/// # Errors
/// Returns [`NotXboxDisk`] if the source is not formatted, cannot be opened,
/// cannot be read, lacks an `XTAF` signature, or is too small to hold the
/// main partition.
pub fn scan<S: BlockSource + ?Sized>(
    source: &mut S,
) -> Result<[XboxPartition; N_XBOX_PARTITIONS], NotXboxDisk> {
    return scan_layout(source).map_err(|e| {
        log::debug!("scan - REJECTED: {e}");
        NotXboxDisk::from(e)
    });
}

fn scan_layout<S: BlockSource + ?Sized>(
    source: &mut S,
) -> Result<[XboxPartition; N_XBOX_PARTITIONS], ScanFailure> {
    if !source.is_formatted() {
        return Err(ScanFailure::Unformatted);
    }

    let block_size = source.preferred_block_size();
    let buffer_size =
        superblock_buffer_size(block_size).ok_or(ScanFailure::InvalidBlockSize(block_size))?;
    let mut buffer = alloc_buffer(buffer_size).ok_or(ScanFailure::Allocation(buffer_size))?;

    log::debug!("scan - BLOCK SIZE: {block_size}, BUFFER SIZE: {buffer_size}");

    let mut session = Session::open(source, Access::Reader).map_err(ScanFailure::Open)?;

    for &(label, offset) in SIGNATURE_CHECKS {
        log::info!("Checking {label} partition.");
        check_superblock(&mut session, offset, &mut buffer)?;
    }

    log::info!("Disk is an xbox disk! Setting up partitions.");

    let media = session.source();
    let size = media.size();

    if size <= MAIN_PART_START {
        return Err(ScanFailure::Truncated { size });
    }

    let partitions = core::array::from_fn(|i| {
        let layout = &LAYOUT[i];
        let end = layout.end.unwrap_or(size);

        XboxPartition {
            offset: layout.start,
            size: end - layout.start,
            block_size,
            name: layout.name,
            index: i as u32,
            content: layout.content,
            writable: media.is_writable(),
            attributes: media.attributes(),
        }
    });

    return Ok(partitions);
}

fn check_superblock<S: BlockSource + ?Sized>(
    session: &mut Session<'_, S>,
    offset: u64,
    buffer: &mut [u8],
) -> Result<(), ScanFailure> {
    session
        .read_at(offset, buffer)
        .map_err(|source| ScanFailure::Read { offset, source })?;

    let (superblock, _) =
        FatxSuperblock::ref_from_prefix(buffer).map_err(|_| ScanFailure::Read {
            offset,
            source: IoErrorKind::UnexpectedEof.into(),
        })?;

    if !superblock.is_fatx() {
        return Err(ScanFailure::BadSignature {
            offset,
            found: superblock.header,
        });
    }

    log::debug!(
        "check_superblock - OFFSET: {offset:#X}, VOLUME ID: {:08X}, CLUSTER SIZE: {}, FATS: {}",
        superblock.volume_id.get(),
        superblock.cluster_size.get(),
        superblock.fat_count.get()
    );

    return Ok(());
}
