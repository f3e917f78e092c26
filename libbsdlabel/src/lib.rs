#![allow(clippy::needless_return)]

pub(crate) mod checksum;
pub(crate) mod ioctl;
mod util;

pub mod geometry;
pub mod labels;
pub mod prompt;

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};

use log::warn;
use rustix::fs::{FileType, fstat};
use thiserror::Error;

use crate::geometry::{Geometry, Unit};
use crate::ioctl::{device_size_bytes, logical_block_size, sync_device};
use crate::labels::LabelError;
use crate::labels::dos::DosTable;

#[derive(Debug, Error)]
pub enum BsdLabelError {
    #[error("label operation failed: {0}")]
    Label(#[from] LabelError),
    #[error("I/O operation failed: {0}")]
    Io(#[from] io::Error),
    #[error("*nix operation failed: {0}")]
    Os(#[from] rustix::io::Errno),
}

/// An open block device (or plain file) a label driver works against.
/// Holds the device parameters every driver needs and, for a nested
/// label, the parent DOS partition table.
#[derive(Debug)]
pub struct Device {
    file: File,
    path: PathBuf,
    sector_size: u64,
    size: u64,
    geom: Geometry,
    unit: Unit,
    readonly: bool,
    dos: Option<DosTable>,
}

impl Device {
    pub fn open<P: AsRef<Path>>(path: P, readonly: bool) -> Result<Device, BsdLabelError> {
        let file = OpenOptions::new()
            .read(true)
            .write(!readonly)
            .open(path.as_ref())?;

        Device::new(file, path.as_ref(), readonly)
    }

    pub fn new(file: File, path: &Path, readonly: bool) -> Result<Device, BsdLabelError> {
        let stat = fstat(file.as_fd())?;
        let is_block = FileType::from_raw_mode(stat.st_mode).is_block_device();

        let sector_size: u64 = if is_block {
            u64::from(logical_block_size(file.as_fd())?)
        } else {
            512
        };

        let size: u64 = if is_block {
            device_size_bytes(file.as_fd())?
        } else {
            stat.st_size as u64
        };

        let geom = Geometry::guess(size, sector_size);

        Ok(Device {
            file,
            path: path.to_path_buf(),
            sector_size,
            size,
            geom,
            unit: Unit::Sectors,
            readonly,
            dos: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sector_size(&self) -> u64 {
        self.sector_size
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn geometry(&self) -> Geometry {
        self.geom
    }

    pub fn override_geometry(&mut self, geom: Geometry) {
        self.geom = geom;
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn set_unit(&mut self, unit: Unit) {
        self.unit = unit;
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn dos_table(&self) -> Option<&DosTable> {
        self.dos.as_ref()
    }

    /// Bind the parent MBR for nested-label operation.  The table is
    /// read-only input here; editing it is the DOS driver's business.
    pub fn assign_dos_table(&mut self, table: DosTable) {
        self.dos = Some(table);
    }

    pub(crate) fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    pub(crate) fn write_all_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    /* best effort; a failed flush is not a failed write */
    pub(crate) fn sync(&self) {
        if let Err(err) = sync_device(self.file.as_fd()) {
            warn!("{}: sync failed: {err}", self.path.display());
        }
    }
}
