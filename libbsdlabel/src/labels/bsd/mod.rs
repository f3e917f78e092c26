mod bootstrap;
pub mod raw;

use std::io::{self};

use zerocopy::{
    FromZeros,
    byteorder::{U16, U32},
};

use crate::Device;
use crate::checksum::alpha_bootblock_checksum;
use crate::geometry::{self, Unit, cround};
use crate::labels::dos::{DosPartitionEntry, MbrPartitionType};
use crate::labels::{CreateStatus, LabelError, LabelOps, PartitionView};
use crate::prompt::Prompt;

use self::raw::{
    BSD_BBSIZE, BSD_FS_BSDFFS, BSD_FS_HPFS, BSD_FS_MSDOS, BSD_FS_OTHER, BSD_FS_UNUSED, BSD_MAGIC,
    BSD_MAXPARTITIONS, BSD_SBSIZE, BSD_SECTOR_SIZE, BsdDisklabel, BsdDriveType, BsdFlags,
    BsdPartition, Platform,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Absent,
    Fresh,
    Loaded,
    Dirty,
}

/// One BSD disklabel bound to a device, either at the start of the
/// whole disk or nested inside a DOS partition of BSD family.
pub struct BsdLabel {
    platform: Platform,
    buf: Vec<u8>,
    label: BsdDisklabel,
    state: State,
    dos_index: Option<usize>,
}

fn sectors32(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

fn dos_part<'a>(dev: &'a Device, index: usize) -> Result<&'a DosPartitionEntry, LabelError> {
    dev.dos_table()
        .ok_or(LabelError::InvalidArgument("no parent DOS label assigned"))?
        .partition(index)
        .ok_or(LabelError::InvalidArgument("parent partition out of range"))
}

fn translate_mbr_type(sys: MbrPartitionType) -> u8 {
    match sys {
        MbrPartitionType::MBR_FAT12_PARTITION
        | MbrPartitionType::MBR_FAT16_LESS32M_PARTITION
        | MbrPartitionType::MBR_FAT16_PARTITION
        | MbrPartitionType::MBR_DOS_ACCESS_PARTITION
        | MbrPartitionType::MBR_DOS_RO_PARTITION
        | MbrPartitionType::MBR_DOS_SECONDARY_PARTITION => BSD_FS_MSDOS,
        MbrPartitionType::MBR_HPFS_NTFS_PARTITION => BSD_FS_HPFS,
        _ => BSD_FS_OTHER,
    }
}

fn ask32(
    prompt: &mut dyn Prompt,
    text: &str,
    low: u64,
    default: u64,
    high: u64,
) -> Result<u32, LabelError> {
    Ok(sectors32(prompt.ask_number(text, low, default, high)?))
}

fn ask16(
    prompt: &mut dyn Prompt,
    text: &str,
    low: u64,
    default: u64,
) -> Result<u16, LabelError> {
    let v = prompt.ask_number(text, low, default, u64::from(u16::MAX))?;
    Ok(u16::try_from(v).unwrap_or(u16::MAX))
}

impl BsdLabel {
    pub fn new(platform: Platform) -> BsdLabel {
        BsdLabel {
            platform,
            buf: vec![0u8; BSD_BBSIZE],
            label: BsdDisklabel::new_zeroed(),
            state: State::Absent,
            dos_index: None,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn disklabel(&self) -> Option<&BsdDisklabel> {
        match self.state {
            State::Absent => None,
            _ => Some(&self.label),
        }
    }

    /// Pull the boot block off the device and parse the embedded label.
    /// Ok(false) means the block read fine but carries no label.
    pub fn read(&mut self, dev: &mut Device) -> Result<bool, LabelError> {
        let base = self.base_offset(dev)?;
        dev.read_exact_at(base, &mut self.buf)?;
        match raw::parse_from_bootblock(&self.buf, self.platform, dev.path()) {
            Ok(label) => {
                self.label = label;
                self.state = State::Loaded;
                Ok(true)
            }
            Err(LabelError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn edit_disklabel(&mut self, prompt: &mut dyn Prompt) -> Result<(), LabelError> {
        self.require_label()?;
        let d = &mut self.label;

        if self.platform.prompts_geometry() {
            let cur = u64::from(u32::from(d.d_secsize)).max(BSD_SECTOR_SIZE);
            d.d_secsize = U32::new(ask32(prompt, "bytes/sector", 1, cur, u64::from(u32::MAX))?);
            let cur = u64::from(u32::from(d.d_nsectors)).max(1);
            d.d_nsectors = U32::new(ask32(prompt, "sectors/track", 1, cur, u64::from(u32::MAX))?);
            let cur = u64::from(u32::from(d.d_ntracks)).max(1);
            d.d_ntracks = U32::new(ask32(prompt, "tracks/cylinder", 1, cur, u64::from(u32::MAX))?);
            let cur = u64::from(u32::from(d.d_ncylinders)).max(1);
            d.d_ncylinders = U32::new(ask32(prompt, "cylinders", 1, cur, u64::from(u32::MAX))?);
        }

        let spc_max = (u64::from(u32::from(d.d_nsectors)) * u64::from(u32::from(d.d_ntracks))).max(1);
        let spc = ask32(prompt, "sectors/cylinder", 1, spc_max, spc_max)?;
        d.d_secpercyl = U32::new(spc.max(1));

        d.d_rpm = U16::new(ask16(prompt, "rpm", 0, u64::from(u16::from(d.d_rpm)))?);
        d.d_interleave = U16::new(ask16(
            prompt,
            "interleave",
            1,
            u64::from(u16::from(d.d_interleave)).max(1),
        )?);
        d.d_trackskew = U16::new(ask16(prompt, "trackskew", 0, u64::from(u16::from(d.d_trackskew)))?);
        d.d_cylskew = U16::new(ask16(prompt, "cylinderskew", 0, u64::from(u16::from(d.d_cylskew)))?);
        d.d_headswitch = U32::new(ask32(
            prompt,
            "head switch time (msec)",
            0,
            u64::from(u32::from(d.d_headswitch)),
            u64::from(u32::MAX),
        )?);
        d.d_trkseek = U32::new(ask32(
            prompt,
            "track-to-track seek (msec)",
            0,
            u64::from(u32::from(d.d_trkseek)),
            u64::from(u32::MAX),
        )?);

        let secperunit = d.secpercyl() * u64::from(u32::from(d.d_ncylinders));
        d.d_secperunit = U32::new(sectors32(secperunit));

        self.state = State::Dirty;
        Ok(())
    }

    /// Copy start and size from a parent MBR slot into a BSD slot,
    /// translating the DOS system byte to a BSD filesystem type.
    pub fn part_link(
        &mut self,
        dev: &Device,
        parent_index: usize,
        index: usize,
    ) -> Result<(), LabelError> {
        self.require_label()?;
        if index >= BSD_MAXPARTITIONS {
            return Err(LabelError::InvalidArgument("partition index out of range"));
        }

        let part = dos_part(dev, parent_index)?;
        if part.is_empty() {
            return Err(LabelError::InvalidArgument("parent partition is empty"));
        }
        let (start, size, fstype) = (part.start(), part.size(), translate_mbr_type(part.sys_ind));

        let slot = &mut self.label.d_partitions[index];
        *slot = BsdPartition::new_zeroed();
        slot.p_offset = U32::new(sectors32(start));
        slot.p_size = U32::new(sectors32(size));
        slot.p_fstype = fstype;

        if self.label.npartitions() < index + 1 {
            self.label.set_npartitions(index + 1);
        }
        self.state = State::Dirty;
        Ok(())
    }

    pub fn link_partition(
        &mut self,
        dev: &Device,
        prompt: &mut dyn Prompt,
    ) -> Result<(), LabelError> {
        self.require_label()?;
        let parent = prompt.ask_number("parent partition number", 1, 1, 4)? as usize - 1;
        let index = prompt.ask_partnum("BSD partition", BSD_MAXPARTITIONS)?;
        self.part_link(dev, parent, index)
    }

    fn require_label(&self) -> Result<(), LabelError> {
        match self.state {
            State::Absent => Err(LabelError::InvalidArgument("no disklabel assigned")),
            _ => Ok(()),
        }
    }

    fn base_offset(&self, dev: &Device) -> Result<u64, LabelError> {
        match self.dos_index {
            Some(i) => Ok(dos_part(dev, i)?.start() * dev.sector_size()),
            None => Ok(0),
        }
    }

    fn read_bootblock(&mut self, dev: &mut Device) -> Result<(), LabelError> {
        let base = self.base_offset(dev)?;
        dev.read_exact_at(base, &mut self.buf)?;
        Ok(())
    }

    fn part_window(&self, dev: &Device) -> Result<(u64, u64), LabelError> {
        match self.dos_index {
            Some(i) => {
                let part = dos_part(dev, i)?;
                Ok((part.start(), part.start() + part.size() - 1))
            }
            None => Ok((0, self.label.secperunit().saturating_sub(1))),
        }
    }
}

impl LabelOps for BsdLabel {
    fn probe(&mut self, dev: &mut Device) -> Result<bool, LabelError> {
        if let Some(table) = dev.dos_table() {
            match table.bsd_candidate(dev.path()) {
                Some(i) => self.dos_index = Some(i),
                None => return Ok(false),
            }
        }
        self.read(dev)
    }

    fn list(&self, dev: &Device, out: &mut dyn io::Write) -> Result<(), LabelError> {
        self.require_label()?;
        let d = &self.label;

        writeln!(out, "# {}:", dev.path().display())?;
        writeln!(out, "type: {}", d.d_type.name())?;
        writeln!(out, "disk: {}", d.type_name())?;
        writeln!(out, "label: {}", d.pack_name())?;
        write!(out, "flags:")?;
        let flags = d.flags();
        if flags.contains(BsdFlags::REMOVABLE) {
            write!(out, " removable")?;
        }
        if flags.contains(BsdFlags::ECC) {
            write!(out, " ecc")?;
        }
        if flags.contains(BsdFlags::BADSECT) {
            write!(out, " badsect")?;
        }
        writeln!(out)?;
        writeln!(out, "bytes/sector: {}", u32::from(d.d_secsize))?;
        writeln!(out, "sectors/track: {}", u32::from(d.d_nsectors))?;
        writeln!(out, "tracks/cylinder: {}", u32::from(d.d_ntracks))?;
        writeln!(out, "sectors/cylinder: {}", u32::from(d.d_secpercyl))?;
        writeln!(out, "cylinders: {}", u32::from(d.d_ncylinders))?;
        writeln!(out, "rpm: {}", u16::from(d.d_rpm))?;
        writeln!(out, "interleave: {}", u16::from(d.d_interleave))?;
        writeln!(out, "trackskew: {}", u16::from(d.d_trackskew))?;
        writeln!(out, "cylinderskew: {}", u16::from(d.d_cylskew))?;
        writeln!(out, "headswitch: {}\t\t# milliseconds", u32::from(d.d_headswitch))?;
        writeln!(out, "track-to-track seek: {}\t# milliseconds", u32::from(d.d_trkseek))?;
        writeln!(out)?;
        writeln!(out, "{} partitions:", d.npartitions())?;
        writeln!(
            out,
            "{:>5} {:>10} {:>10} {:>10} {:<10} {:>6} {:>6} {:>5}",
            "Slice", "Start", "End", "Size", "Type", "Fsize", "Bsize", "Cpg"
        )?;

        let spc = d.secpercyl();
        for index in 0..d.npartitions() {
            let p = &d.d_partitions[index];
            if !p.is_used() {
                continue;
            }
            let (start, end, size) = match dev.unit() {
                Unit::Sectors => (
                    p.offset().to_string(),
                    (p.offset() + p.size() - 1).to_string(),
                    p.size().to_string(),
                ),
                Unit::Cylinders => (
                    geometry::cyl_start(p.offset(), spc).render(),
                    geometry::cyl_end(p.offset(), p.size(), spc).render(),
                    geometry::cyl_size(p.size(), spc).render(),
                ),
            };
            let view = self.get_part(index)?;
            writeln!(
                out,
                "{:>5} {:>10} {:>10} {:>10} {:<10} {:>6} {:>6} {:>5}",
                view.letter,
                start,
                end,
                size,
                self.platform.fstype_name(view.fstype),
                view.fsize.map(|v| v.to_string()).unwrap_or_default(),
                view.bsize.map(|v| v.to_string()).unwrap_or_default(),
                view.cpg.map(|v| v.to_string()).unwrap_or_default(),
            )?;
        }
        return Ok(());
    }

    fn write(&mut self, dev: &mut Device) -> Result<(), LabelError> {
        if dev.is_readonly() {
            return Err(LabelError::InvalidArgument("device is open read-only"));
        }
        self.require_label()?;

        raw::write_to_bootblock(&mut self.label, &mut self.buf, self.platform);
        if self.platform.label_sector() == 0 {
            alpha_bootblock_checksum(&mut self.buf[..BSD_SECTOR_SIZE as usize]);
        }

        let base = self.base_offset(dev)?;
        dev.write_all_at(base, &self.buf)?;
        dev.sync();

        self.state = State::Loaded;
        return Ok(());
    }

    fn create(
        &mut self,
        dev: &mut Device,
        prompt: &mut dyn Prompt,
    ) -> Result<CreateStatus, LabelError> {
        if dev.is_readonly() {
            return Err(LabelError::InvalidArgument("device is open read-only"));
        }

        let question = format!("{} contains no BSD disklabel, create one?", dev.path().display());
        if !prompt.ask_yesno(&question)? {
            return Ok(CreateStatus::Declined);
        }

        self.dos_index = match dev.dos_table() {
            Some(table) => Some(table.bsd_candidate(dev.path()).ok_or(LabelError::NotFound)?),
            None => None,
        };

        // keep whatever bootstrap already sits in the boot block
        if self.read_bootblock(dev).is_err() {
            self.buf.fill(0);
        }

        let geom = dev.geometry();
        let secpercyl = (u64::from(geom.heads) * u64::from(geom.sectors)).max(1);
        let secperunit = secpercyl * u64::from(geom.cylinders);

        let mut label = BsdDisklabel::new_zeroed();
        label.d_magic = U32::new(BSD_MAGIC);
        label.d_magic2 = U32::new(BSD_MAGIC);
        label.d_type = BsdDriveType::SCSI;
        label.d_secsize = U32::new(BSD_SECTOR_SIZE as u32);
        label.d_nsectors = U32::new(geom.sectors);
        label.d_ntracks = U32::new(geom.heads);
        label.d_ncylinders = U32::new(geom.cylinders);
        label.d_secpercyl = U32::new(sectors32(secpercyl));
        label.d_secperunit = U32::new(sectors32(secperunit));
        label.d_rpm = U16::new(3600);
        label.d_interleave = U16::new(1);
        label.d_flags = U32::new(self.platform.default_flags().bits());
        label.d_bbsize = U32::new(BSD_BBSIZE as u32);
        label.d_sbsize = U32::new(BSD_SBSIZE);

        match self.dos_index {
            Some(i) => {
                let part = dos_part(dev, i)?;
                label.set_npartitions(4);
                label.d_partitions[2].p_offset = U32::new(sectors32(part.start()));
                label.d_partitions[2].p_size = U32::new(sectors32(part.size()));
                label.d_partitions[3].p_size = label.d_secperunit;
            }
            None => {
                label.set_npartitions(3);
                label.d_partitions[2].p_size = label.d_secperunit;
            }
        }

        self.label = label;
        self.state = State::Fresh;
        Ok(CreateStatus::Created)
    }

    fn part_add(
        &mut self,
        dev: &Device,
        index: usize,
        _fstype: u8,
        prompt: &mut dyn Prompt,
    ) -> Result<(), LabelError> {
        if index >= BSD_MAXPARTITIONS {
            return Err(LabelError::InvalidArgument("partition index out of range"));
        }
        self.require_label()?;

        let (low, high) = self.part_window(dev)?;
        let spc = self.label.secpercyl();
        let unit = dev.unit();

        let (begin, end) = match unit {
            Unit::Cylinders => {
                let c = prompt.ask_number(
                    &format!("first {}", unit.noun()),
                    cround(low, spc),
                    cround(low, spc),
                    cround(high, spc),
                )?;
                let begin = geometry::first_sector_of_cylinder(c, spc);
                let c = prompt.ask_number(
                    &format!("last {}", unit.noun()),
                    cround(begin, spc),
                    cround(high, spc),
                    cround(high, spc),
                )?;
                (begin, geometry::last_sector_of_cylinder(c, spc))
            }
            Unit::Sectors => {
                let begin = prompt.ask_number(&format!("first {}", unit.noun()), low, low, high)?;
                let end = prompt.ask_number(&format!("last {}", unit.noun()), begin, high, high)?;
                (begin, end)
            }
        };

        let slot = &mut self.label.d_partitions[index];
        *slot = BsdPartition::new_zeroed();
        slot.p_offset = U32::new(sectors32(begin));
        slot.p_size = U32::new(sectors32(end - begin + 1));
        slot.p_fstype = BSD_FS_UNUSED;

        if self.label.npartitions() < index + 1 {
            self.label.set_npartitions(index + 1);
        }
        self.state = State::Dirty;
        return Ok(());
    }

    fn part_delete(&mut self, index: usize) -> Result<(), LabelError> {
        self.require_label()?;
        if index >= BSD_MAXPARTITIONS {
            return Err(LabelError::InvalidArgument("partition index out of range"));
        }

        self.label.d_partitions[index] = BsdPartition::new_zeroed();

        if index + 1 == self.label.npartitions() {
            let mut np = self.label.npartitions();
            while np > 0 && !self.label.d_partitions[np - 1].is_used() {
                np -= 1;
            }
            self.label.set_npartitions(np);
        }
        self.state = State::Dirty;
        return Ok(());
    }

    fn get_part(&self, index: usize) -> Result<PartitionView, LabelError> {
        self.require_label()?;
        if index >= BSD_MAXPARTITIONS {
            return Err(LabelError::InvalidArgument("partition index out of range"));
        }

        let p = &self.label.d_partitions[index];
        let (fsize, bsize, cpg) = match p.p_fstype {
            BSD_FS_UNUSED | BSD_FS_BSDFFS => {
                let fsize = u32::from(p.p_fsize);
                let bsize = fsize.saturating_mul(u32::from(p.p_frag));
                let cpg = (p.p_fstype == BSD_FS_BSDFFS).then(|| u16::from(p.p_cpg));
                (Some(fsize), Some(bsize), cpg)
            }
            _ => (None, None, None),
        };

        Ok(PartitionView {
            letter: (b'a' + index as u8) as char,
            offset: p.offset(),
            size: p.size(),
            used: p.is_used(),
            fstype: p.p_fstype,
            fsize,
            bsize,
            cpg,
        })
    }

    fn part_set_type(&mut self, index: usize, fstype: u8) -> Result<(), LabelError> {
        self.require_label()?;
        if index >= self.label.npartitions() {
            return Err(LabelError::InvalidArgument("partition index out of range"));
        }
        if self.label.d_partitions[index].p_fstype == fstype {
            return Ok(());
        }
        self.label.d_partitions[index].p_fstype = fstype;
        self.state = State::Dirty;
        return Ok(());
    }

    fn part_is_used(&self, index: usize) -> bool {
        index < BSD_MAXPARTITIONS
            && self.state != State::Absent
            && self.label.d_partitions[index].is_used()
    }
}
