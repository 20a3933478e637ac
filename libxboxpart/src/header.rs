use std::io::Error as IoError;

use thiserror::Error;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{BigEndian, U16},
};

use crate::{
    source::{Access, BlockSource, Session},
    util::{alloc_buffer, decode_utf8_lossy_from, round_up},
};

const HEADER_PADDING_LENGTH: usize = 8192;
const PLAINTEXT_HD_INFO_LENGTH: usize = 68;
const ENCRYPTED_HD_INFO_LENGTH: usize = 20 + 4 + 256;
const PNG_LENGTH: usize = 2754;

const SERIAL_LENGTH: usize = 20;
const FIRMWARE_LENGTH: usize = 8;
const MODEL_LENGTH: usize = 40;

#[derive(Debug, Error)]
pub enum DriveInfoError {
    #[error("I/O operation failed: {0}")]
    IoError(#[from] IoError),
    #[error("Invalid preferred block size: {0}")]
    InvalidBlockSize(u64),
    #[error("Unable to allocate a {0} byte read buffer")]
    Allocation(u64),
    #[error("Drive header holds no identification strings")]
    Empty,
}

/// Plaintext identification block of the drive security sector.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
pub struct HdInfo {
    pub serial: [u8; SERIAL_LENGTH],
    pub firmware: [u8; FIRMWARE_LENGTH],
    pub model: [u8; MODEL_LENGTH],
}

/// Header found at the start of an Xbox 360 drive, ahead of the cache
/// partition.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
pub struct XboxHeader {
    junk: [u8; HEADER_PADDING_LENGTH],
    pub hd_info: HdInfo,
    pub enc_hd_info: [u8; ENCRYPTED_HD_INFO_LENGTH],
    pub png_length: U16<BigEndian>,
    pub png_data: [u8; PNG_LENGTH],
}

const _: () = assert!(size_of::<HdInfo>() == PLAINTEXT_HD_INFO_LENGTH);

/// Identification strings read from the drive header.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DriveInfo {
    pub serial: String,
    pub firmware: String,
    pub model: String,
    pub png_length: u16,
}

/// Read the drive identification strings from the header at offset 0.
///
/// This does not check that the source is an Xbox drive, run
/// [`scan`](crate::scan::scan) for that. A session is opened for the read and
/// closed before returning.
///
/// # Errors
/// Returns [`DriveInfoError::Empty`] if every identification field is blank.
pub fn read_drive_info<S: BlockSource + ?Sized>(
    source: &mut S,
) -> Result<DriveInfo, DriveInfoError> {
    let block_size = source.preferred_block_size();
    let buffer_size = round_up(size_of::<XboxHeader>() as u64, block_size)
        .ok_or(DriveInfoError::InvalidBlockSize(block_size))?;
    let mut buffer = alloc_buffer(buffer_size).ok_or(DriveInfoError::Allocation(buffer_size))?;

    let mut session = Session::open(source, Access::Reader)?;
    session.read_at(0, &mut buffer)?;
    drop(session);

    let (header, _) = XboxHeader::ref_from_prefix(&buffer)
        .map_err(|_| IoError::from(std::io::ErrorKind::UnexpectedEof))?;

    let info = DriveInfo {
        serial: decode_utf8_lossy_from(&header.hd_info.serial),
        firmware: decode_utf8_lossy_from(&header.hd_info.firmware),
        model: decode_utf8_lossy_from(&header.hd_info.model),
        png_length: header.png_length.get(),
    };

    log::debug!("read_drive_info - INFO: {info:?}");

    if info.serial.is_empty() && info.firmware.is_empty() && info.model.is_empty() {
        return Err(DriveInfoError::Empty);
    }

    return Ok(info);
}
