use std::path::Path;

use bitflags::bitflags;
use log::warn;
use zerocopy::{
    FromBytes, FromZeros, Immutable, IntoBytes, Unaligned,
    byteorder::{LittleEndian, U16, U32},
};

use crate::checksum::xor16;
use crate::labels::LabelError;
use crate::util::decode_label_name;

/*
 * 4.4BSD disklabel, little endian on disk.  The label sits inside the
 * boot block at a platform-dependent offset; its own offsets always
 * count 512-byte sectors no matter what the device uses.
 */

pub const BSD_MAGIC: u32 = 0x8256_4557;
pub const BSD_MAXPARTITIONS: usize = 16;
pub const BSD_BBSIZE: usize = 8192;
pub const BSD_SBSIZE: u32 = 8192;
pub const BSD_SECTOR_SIZE: u64 = 512;

pub const BSD_LABEL_HEADER_SIZE: usize = 148;

pub const BSD_FS_UNUSED: u8 = 0;
pub const BSD_FS_SWAP: u8 = 1;
pub const BSD_FS_V6: u8 = 2;
pub const BSD_FS_V7: u8 = 3;
pub const BSD_FS_SYSV: u8 = 4;
pub const BSD_FS_V71K: u8 = 5;
pub const BSD_FS_V8: u8 = 6;
pub const BSD_FS_BSDFFS: u8 = 7;
pub const BSD_FS_MSDOS: u8 = 8;
pub const BSD_FS_BSDLFS: u8 = 9;
pub const BSD_FS_OTHER: u8 = 10;
pub const BSD_FS_HPFS: u8 = 11;
pub const BSD_FS_ISO9660: u8 = 12;
pub const BSD_FS_BOOT: u8 = 13;
pub const BSD_FS_ADOS: u8 = 14;
pub const BSD_FS_HFS: u8 = 15;
pub const BSD_FS_ADVFS: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    #[default]
    I386,
    Alpha,
    Ia64,
}

impl Platform {
    pub fn label_sector(&self) -> u64 {
        match self {
            Platform::Alpha => 0,
            _ => 1,
        }
    }

    pub fn label_offset(&self) -> u64 {
        match self {
            Platform::Alpha => 64,
            _ => 0,
        }
    }

    pub fn label_byte_offset(&self) -> usize {
        (self.label_sector() * BSD_SECTOR_SIZE + self.label_offset()) as usize
    }

    pub fn prompts_geometry(&self) -> bool {
        matches!(self, Platform::Alpha | Platform::Ia64)
    }

    pub fn default_flags(&self) -> BsdFlags {
        match self {
            Platform::Alpha => BsdFlags::empty(),
            _ => BsdFlags::DOSPART,
        }
    }

    pub fn fstype_name(&self, code: u8) -> &'static str {
        match code {
            BSD_FS_UNUSED => "unused",
            BSD_FS_SWAP => "swap",
            BSD_FS_V6 => "Version 6",
            BSD_FS_V7 => "Version 7",
            BSD_FS_SYSV => "System V",
            BSD_FS_V71K => "4.1BSD",
            BSD_FS_V8 => "Eighth Edition",
            BSD_FS_BSDFFS => "4.2BSD",
            BSD_FS_MSDOS => match self {
                Platform::Alpha => "ext2",
                _ => "MS-DOS",
            },
            BSD_FS_BSDLFS => "4.4LFS",
            BSD_FS_OTHER => "unknown",
            BSD_FS_HPFS => "HPFS",
            BSD_FS_ISO9660 => "ISO-9660",
            BSD_FS_BOOT => "boot",
            BSD_FS_ADOS => "ADOS",
            BSD_FS_HFS => "HFS",
            BSD_FS_ADVFS => "AdvFS",
            _ => "?",
        }
    }
}

bitflags! {
    #[repr(transparent)]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct BsdFlags: u32 {
        const REMOVABLE = 0x01;
        const ECC       = 0x02;
        const BADSECT   = 0x04;
        const DOSPART   = 0x08;
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Unaligned, Immutable)]
pub struct BsdDriveType(U16<LittleEndian>);

impl BsdDriveType {
    pub const SMD: Self = Self(U16::new(1));
    pub const MSCP: Self = Self(U16::new(2));
    pub const DEC: Self = Self(U16::new(3));
    pub const SCSI: Self = Self(U16::new(4));
    pub const ESDI: Self = Self(U16::new(5));
    pub const ST506: Self = Self(U16::new(6));
    pub const HPIB: Self = Self(U16::new(7));
    pub const HPFL: Self = Self(U16::new(8));
    pub const TYPE9: Self = Self(U16::new(9));
    pub const FLOPPY: Self = Self(U16::new(10));

    pub fn name(&self) -> &'static str {
        match u16::from(self.0) {
            1 => "SMD",
            2 => "MSCP",
            3 => "old DEC",
            4 => "SCSI",
            5 => "ESDI",
            6 => "ST506",
            7 => "HP-IB",
            8 => "HP-FL",
            9 => "type 9",
            10 => "floppy",
            _ => "unknown",
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Unaligned, Immutable)]
pub struct BsdPartition {
    pub p_size: U32<LittleEndian>,
    pub p_offset: U32<LittleEndian>,
    pub p_fsize: U32<LittleEndian>,
    pub p_fstype: u8,
    pub p_frag: u8,
    pub p_cpg: U16<LittleEndian>,
}

impl BsdPartition {
    pub fn size(&self) -> u64 {
        u64::from(u32::from(self.p_size))
    }

    pub fn offset(&self) -> u64 {
        u64::from(u32::from(self.p_offset))
    }

    pub fn is_used(&self) -> bool {
        u32::from(self.p_size) > 0
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Unaligned, Immutable)]
pub struct BsdDisklabel {
    pub d_magic: U32<LittleEndian>,
    pub d_type: BsdDriveType,
    pub d_subtype: U16<LittleEndian>,
    pub d_typename: [u8; 16],
    pub d_packname: [u8; 16],

    pub d_secsize: U32<LittleEndian>,
    pub d_nsectors: U32<LittleEndian>,
    pub d_ntracks: U32<LittleEndian>,
    pub d_ncylinders: U32<LittleEndian>,
    pub d_secpercyl: U32<LittleEndian>,
    pub d_secperunit: U32<LittleEndian>,

    pub d_sparespertrack: U16<LittleEndian>,
    pub d_sparespercyl: U16<LittleEndian>,
    pub d_acylinders: U32<LittleEndian>,

    pub d_rpm: U16<LittleEndian>,
    pub d_interleave: U16<LittleEndian>,
    pub d_trackskew: U16<LittleEndian>,
    pub d_cylskew: U16<LittleEndian>,
    pub d_headswitch: U32<LittleEndian>,
    pub d_trkseek: U32<LittleEndian>,
    pub d_flags: U32<LittleEndian>,
    pub d_drivedata: [U32<LittleEndian>; 5],
    pub d_spare: [U32<LittleEndian>; 5],
    pub d_magic2: U32<LittleEndian>,
    pub d_checksum: U16<LittleEndian>,

    pub d_npartitions: U16<LittleEndian>,
    pub d_bbsize: U32<LittleEndian>,
    pub d_sbsize: U32<LittleEndian>,
    pub d_partitions: [BsdPartition; BSD_MAXPARTITIONS],
}

const _: () = assert!(size_of::<BsdPartition>() == 16);
const _: () = assert!(
    size_of::<BsdDisklabel>() == BSD_LABEL_HEADER_SIZE + BSD_MAXPARTITIONS * size_of::<BsdPartition>()
);

impl BsdDisklabel {
    pub fn npartitions(&self) -> usize {
        usize::from(u16::from(self.d_npartitions))
    }

    pub fn set_npartitions(&mut self, n: usize) {
        self.d_npartitions = U16::new(n as u16);
    }

    pub fn secpercyl(&self) -> u64 {
        u64::from(u32::from(self.d_secpercyl)).max(1)
    }

    pub fn secperunit(&self) -> u64 {
        u64::from(u32::from(self.d_secperunit))
    }

    pub fn flags(&self) -> BsdFlags {
        BsdFlags::from_bits_truncate(u32::from(self.d_flags))
    }

    pub fn type_name(&self) -> String {
        decode_label_name(&self.d_typename)
    }

    pub fn pack_name(&self) -> String {
        decode_label_name(&self.d_packname)
    }

    /* the checksum covers the header and the live slots only */
    fn checksum_len(&self) -> usize {
        let live = self.npartitions().min(BSD_MAXPARTITIONS);
        BSD_LABEL_HEADER_SIZE + live * size_of::<BsdPartition>()
    }
}

pub fn parse_from_bootblock(
    buf: &[u8],
    platform: Platform,
    path: &Path,
) -> Result<BsdDisklabel, LabelError> {
    let off = platform.label_byte_offset();
    let end = off + size_of::<BsdDisklabel>();
    if buf.len() < end {
        return Err(LabelError::Corrupt("boot block too short for a disklabel"));
    }

    let mut label = BsdDisklabel::read_from_bytes(&buf[off..end])
        .map_err(|_| LabelError::Corrupt("boot block too short for a disklabel"))?;

    if u32::from(label.d_magic) != BSD_MAGIC || u32::from(label.d_magic2) != BSD_MAGIC {
        return Err(LabelError::NotFound);
    }

    if label.npartitions() > BSD_MAXPARTITIONS {
        warn!(
            "{}: disklabel claims {} partitions, honoring the first {}",
            path.display(),
            label.npartitions(),
            BSD_MAXPARTITIONS
        );
        label.set_npartitions(BSD_MAXPARTITIONS);
    }

    let live = label.npartitions();
    for slot in label.d_partitions[live..].iter_mut() {
        *slot = BsdPartition::new_zeroed();
    }

    Ok(label)
}

/// Recompute the checksum and put the label back into the boot block.
pub fn write_to_bootblock(label: &mut BsdDisklabel, buf: &mut [u8], platform: Platform) {
    label.d_checksum = U16::new(0);
    let sum = xor16(&label.as_bytes()[..label.checksum_len()]);
    label.d_checksum = U16::new(sum);

    let off = platform.label_byte_offset();
    buf[off..off + size_of::<BsdDisklabel>()].copy_from_slice(label.as_bytes());
}
