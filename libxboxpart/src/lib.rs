//! Detection of the fixed Xbox 360 hard drive partition layout.
//!
//! [`scan`] checks the `XTAF` superblocks at the known offsets of a
//! [`BlockSource`] and, if they match, returns the four partitions a
//! filesystem driver can mount independently.

pub mod header;
pub mod scan;
pub mod source;
pub(crate) mod util;

#[cfg(target_os = "linux")]
mod ioctl;


use std::io::Error as IoError;

use thiserror::Error;

pub use crate::{
    header::{DriveInfo, DriveInfoError, read_drive_info},
    scan::{
        CACHE_PART_START, ContentHint, FatxSuperblock, GAME_CACHE_PART_START, MAIN_PART_START,
        N_XBOX_PARTITIONS, NotXboxDisk, ScanFailure, XBOX_BACKWARDS_COMPAT_PART_START,
        XTAF_MAGIC, XboxPartition, scan,
    },
    source::{Access, BlockSource, FileSource, MediaAttributes, Session},
};

#[derive(Debug, Error)]
pub enum XboxPartError {
    #[error("I/O operation failed: {0}")]
    IoError(#[from] IoError),
    #[error("*NIX error code: {0}")]
    Errno(#[from] rustix::io::Errno),
    #[error(transparent)]
    NotXboxDisk(#[from] NotXboxDisk),
    #[error("Unable to read drive information: {0}")]
    DriveInfo(#[from] DriveInfoError),
}
