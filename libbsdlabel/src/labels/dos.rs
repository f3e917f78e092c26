use std::path::Path;

use log::warn;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, Unaligned,
    byteorder::{LittleEndian, U32},
};

use crate::Device;
use crate::labels::LabelError;

/*
 * DOS master boot sector:
 *
 *     0 | Code area
 *   446 | Partition table, four 16-byte entries
 *   510 | 0x55
 *   511 | 0xAA
 */

const MBR_PT_OFFSET: usize = 0x1be;
const MBR_SIGNATURE: [u8; 2] = [0x55, 0xaa];

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Unaligned, Immutable)]
pub struct MbrPartitionType(u8);

impl MbrPartitionType {
    pub const MBR_EMPTY_PARTITION: Self = Self(0x00);
    pub const MBR_FAT12_PARTITION: Self = Self(0x01);
    pub const MBR_FAT16_LESS32M_PARTITION: Self = Self(0x04);
    pub const MBR_FAT16_PARTITION: Self = Self(0x06);
    pub const MBR_HPFS_NTFS_PARTITION: Self = Self(0x07);
    pub const MBR_FREEBSD_PARTITION: Self = Self(0xa5);
    pub const MBR_OPENBSD_PARTITION: Self = Self(0xa6);
    pub const MBR_NETBSD_PARTITION: Self = Self(0xa9);
    pub const MBR_DOS_ACCESS_PARTITION: Self = Self(0xe1);
    pub const MBR_DOS_RO_PARTITION: Self = Self(0xe3);
    pub const MBR_DOS_SECONDARY_PARTITION: Self = Self(0xf2);

    /* "hidden" variants flip this bit in the system byte */
    pub const MBR_HIDDEN_MASK: u8 = 0x10;

    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    pub fn as_byte(&self) -> u8 {
        self.0
    }

    pub fn is_bsd_family(&self) -> bool {
        let visible = Self(self.0 ^ Self::MBR_HIDDEN_MASK);

        *self == Self::MBR_FREEBSD_PARTITION
            || *self == Self::MBR_OPENBSD_PARTITION
            || *self == Self::MBR_NETBSD_PARTITION
            || visible == Self::MBR_FREEBSD_PARTITION
            || visible == Self::MBR_OPENBSD_PARTITION
            || visible == Self::MBR_NETBSD_PARTITION
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Unaligned, Immutable)]
pub struct DosPartitionEntry {
    pub boot_ind: u8,
    pub begin_head: u8,
    pub begin_sector: u8,
    pub begin_cylinder: u8,
    pub sys_ind: MbrPartitionType,
    pub end_head: u8,
    pub end_sector: u8,
    pub end_cylinder: u8,
    pub start_sect: U32<LittleEndian>,
    pub nr_sects: U32<LittleEndian>,
}

impl DosPartitionEntry {
    pub fn start(&self) -> u64 {
        u64::from(u32::from(self.start_sect))
    }

    pub fn size(&self) -> u64 {
        u64::from(u32::from(self.nr_sects))
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().iter().all(|b| *b == 0)
    }
}

/// The four primary slots of a parent MBR, read-only.
#[derive(Debug, Clone)]
pub struct DosTable {
    entries: [DosPartitionEntry; 4],
}

impl DosTable {
    pub fn parse(sector: &[u8]) -> Result<DosTable, LabelError> {
        if sector.len() < 512 {
            return Err(LabelError::Corrupt("short boot sector"));
        }
        if sector[510..512] != MBR_SIGNATURE {
            return Err(LabelError::NotFound);
        }

        let entries =
            <[DosPartitionEntry; 4]>::read_from_bytes(&sector[MBR_PT_OFFSET..MBR_PT_OFFSET + 64])
                .map_err(|_| LabelError::Corrupt("short partition table"))?;

        Ok(DosTable { entries })
    }

    pub fn read(dev: &mut Device) -> Result<DosTable, LabelError> {
        let mut sector = [0u8; 512];
        dev.read_exact_at(0, &mut sector)?;
        DosTable::parse(&sector)
    }

    pub fn partition(&self, index: usize) -> Option<&DosPartitionEntry> {
        self.entries.get(index)
    }

    /// First slot that could carry a nested BSD disklabel.
    pub fn bsd_candidate(&self, path: &Path) -> Option<usize> {
        for (i, part) in self.entries.iter().enumerate() {
            if part.is_empty() || !part.sys_ind.is_bsd_family() {
                continue;
            }
            if part.start() == 0 {
                warn!(
                    "{}: BSD partition {} starts at sector 0, ignoring it",
                    path.display(),
                    i + 1
                );
                continue;
            }
            return Some(i);
        }
        None
    }
}
