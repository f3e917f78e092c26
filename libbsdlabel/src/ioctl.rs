use rustix::{
    fd::AsFd,
    io,
    ioctl::{Getter, ioctl},
};

/*
 * u64 result
 * #define BLKGETSIZE64 _IOR(0x12, 114, size_t)
 */

#[cfg(target_os = "linux")]
const BLKGETSIZE64: u32 = 2148012658;

/*
 * off_t = 8 bytes
 * #define DIOCGMEDIASIZE _IOR('d', 129, off_t)
 */

#[cfg(target_os = "freebsd")]
const DIOCGMEDIASIZE: u64 = 2148033665;

/*
 * u_int = 4 bytes
 * #define DIOCGSECTORSIZE _IOR('d', 128, u_int)
 */

#[cfg(target_os = "freebsd")]
const DIOCGSECTORSIZE: u64 = 2147771520;

/*
 * uint32_t = 4 bytes
 * #define DKIOCGETBLOCKSIZE _IOR('d', 24, uint32_t)
 */

#[cfg(target_os = "macos")]
const DKIOCGETBLOCKSIZE: u32 = 2147771416;

/*
 * uint64_t = 8 bytes
 * #define DKIOCGETBLOCKCOUNT _IOR('d', 25, uint64_t)
 */

#[cfg(target_os = "macos")]
const DKIOCGETBLOCKCOUNT: u32 = 2148033561;

#[inline]
pub(crate) fn logical_block_size<Fd: AsFd>(fd: Fd) -> io::Result<u32> {
    #[cfg(target_os = "linux")]
    return rustix::fs::ioctl_blksszget(fd);
    #[cfg(target_os = "freebsd")]
    return unsafe { ioctl(fd, Getter::<{ DIOCGSECTORSIZE }, u32>::new()) };
    #[cfg(target_os = "macos")]
    return unsafe { ioctl(fd, Getter::<{ DKIOCGETBLOCKSIZE }, u32>::new()) };
}

#[inline]
pub(crate) fn device_size_bytes<Fd: AsFd>(fd: Fd) -> io::Result<u64> {
    #[cfg(target_os = "linux")]
    return unsafe { ioctl(fd, Getter::<{ BLKGETSIZE64 }, u64>::new()) };
    #[cfg(target_os = "freebsd")]
    return unsafe { ioctl(fd, Getter::<{ DIOCGMEDIASIZE }, u64>::new()) };
    #[cfg(target_os = "macos")]
    {
        let block: u64 = unsafe { ioctl(fd.as_fd(), Getter::<{ DKIOCGETBLOCKSIZE }, u32>::new()) }?.into();
        let count: u64 = unsafe { ioctl(fd.as_fd(), Getter::<{ DKIOCGETBLOCKCOUNT }, u64>::new()) }?;
        return Ok(block * count);
    }
}

/* Label and bootstrap writes are followed by a best-effort flush. */
#[inline]
pub(crate) fn sync_device<Fd: AsFd>(fd: Fd) -> io::Result<()> {
    rustix::fs::fsync(fd)
}
