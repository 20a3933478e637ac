use std::os::fd::AsFd;

use rustix::{
    io,
    ioctl::{Getter, ioctl},
};

// _IOR(0x12, 114, size_t)
const BLKGETSIZE64: u32 = 0x80081272;
// _IO(0x12, 104)
const BLKSSZGET: u32 = 0x1268;
// _IO(0x12, 94)
const BLKROGET: u32 = 0x125e;

/// Size in bytes of the block device behind `fd`.
#[inline]
pub fn device_size_bytes<Fd: AsFd>(fd: Fd) -> io::Result<u64> {
    unsafe {
        let ctl = Getter::<{ BLKGETSIZE64 }, u64>::new();
        ioctl(fd, ctl)
    }
}

/// Logical sector size of the block device behind `fd`.
#[inline]
pub fn logical_block_size<Fd: AsFd>(fd: Fd) -> io::Result<u32> {
    unsafe {
        let ctl = Getter::<{ BLKSSZGET }, u32>::new();
        ioctl(fd, ctl)
    }
}

/// Whether the kernel marks the block device behind `fd` read-only.
#[inline]
pub fn is_read_only<Fd: AsFd>(fd: Fd) -> io::Result<bool> {
    let ro = unsafe {
        let ctl = Getter::<{ BLKROGET }, i32>::new();
        ioctl(fd, ctl)?
    };

    return Ok(ro != 0);
}
