use std::fs;
use std::path::Path;

use log::info;

use crate::Device;
use crate::checksum::alpha_bootblock_checksum;
use crate::labels::LabelError;
use crate::labels::bsd::raw::{self, BSD_BBSIZE, BSD_SECTOR_SIZE, BsdDisklabel, BsdDriveType};
use crate::labels::bsd::{BsdLabel, State};
use crate::prompt::Prompt;

/*
 * The boot program comes in two stages, <name>boot and boot<name>, and
 * the second stage shares the boot block with the embedded disklabel.
 * The label bytes are saved, zeroed, and restored around loading the
 * second stage; any non-zero byte left in that window means the boot
 * image itself claims it and the install is refused.
 */

impl BsdLabel {
    pub fn write_bootstrap(
        &mut self,
        dev: &mut Device,
        bootdir: &Path,
        prompt: &mut dyn Prompt,
    ) -> Result<(), LabelError> {
        if dev.is_readonly() {
            return Err(LabelError::InvalidArgument("device is open read-only"));
        }
        self.require_label()?;

        let default = if self.label.d_type == BsdDriveType::SCSI {
            "sd"
        } else {
            "wd"
        };
        let answer = prompt.ask_string(&format!("bootstrap file basename [{default}]"))?;
        let name = match answer.trim() {
            "" => default,
            other => other,
        };

        let secsize = u32::from(self.label.d_secsize) as usize;
        if secsize == 0 || secsize >= BSD_BBSIZE {
            return Err(LabelError::Corrupt("unusable sector size in disklabel"));
        }

        let first_path = bootdir.join(format!("{name}boot"));
        let first = fs::read(&first_path)?;
        if first.len() != secsize {
            return Err(LabelError::InvalidArgument(
                "first-stage boot image does not span one sector",
            ));
        }
        self.buf[..secsize].copy_from_slice(&first);

        let off = self.platform.label_byte_offset();
        let len = size_of::<BsdDisklabel>();
        let saved = self.buf[off..off + len].to_vec();
        self.buf[off..off + len].fill(0);

        let second_path = bootdir.join(format!("boot{name}"));
        let second = fs::read(&second_path)?;
        if second.len() != BSD_BBSIZE - secsize {
            return Err(LabelError::InvalidArgument(
                "second-stage boot image does not fill the boot block",
            ));
        }
        self.buf[secsize..].copy_from_slice(&second);

        if self.buf[off..off + len].iter().any(|b| *b != 0) {
            return Err(LabelError::Overlap);
        }
        self.buf[off..off + len].copy_from_slice(&saved);

        raw::write_to_bootblock(&mut self.label, &mut self.buf, self.platform);
        if self.platform.label_sector() == 0 {
            alpha_bootblock_checksum(&mut self.buf[..BSD_SECTOR_SIZE as usize]);
        }

        let base = self.base_offset(dev)?;
        dev.write_all_at(base, &self.buf)?;
        dev.sync();
        self.state = State::Loaded;

        info!(
            "{}: installed bootstrap from {} and {}",
            dev.path().display(),
            first_path.display(),
            second_path.display()
        );
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use std::fs::OpenOptions;

    use tempfile::{NamedTempFile, TempDir};

    use super::*;
    use crate::geometry::Geometry;
    use crate::labels::LabelOps;
    use crate::prompt::scripted::ScriptedPrompt;

    fn scratch_device() -> (NamedTempFile, Device) {
        let tmp = NamedTempFile::new().unwrap();
        tmp.as_file().set_len(64 * 1024).unwrap();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(tmp.path())
            .unwrap();
        let mut dev = Device::new(file, tmp.path(), false).unwrap();
        dev.override_geometry(Geometry {
            heads: 16,
            sectors: 63,
            cylinders: 1024,
        });
        (tmp, dev)
    }

    fn boot_images(second_stage_label_bytes: u8) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("wdboot"), vec![0xE9u8; 512]).unwrap();

        // second stage starts right where the i386 label lives
        let mut second = vec![0xB0u8; BSD_BBSIZE - 512];
        second[..size_of::<BsdDisklabel>()].fill(second_stage_label_bytes);
        std::fs::write(dir.path().join("bootwd"), second).unwrap();
        dir
    }

    fn created_label(dev: &mut Device) -> BsdLabel {
        let mut label = BsdLabel::new(raw::Platform::I386);
        let mut prompt = ScriptedPrompt::new().answer(true);
        label.create(dev, &mut prompt).unwrap();
        label.write(dev).unwrap();
        // drive type defaults to SCSI; flip it so the "wd" images match
        label.label.d_type = BsdDriveType::ST506;
        label
    }

    #[test]
    fn install_preserves_the_embedded_label() {
        let (tmp, mut dev) = scratch_device();
        let mut label = created_label(&mut dev);
        let dir = boot_images(0);

        let mut prompt = ScriptedPrompt::new().string("");
        label.write_bootstrap(&mut dev, dir.path(), &mut prompt).unwrap();

        let data = std::fs::read(tmp.path()).unwrap();
        assert!(data[..512].iter().all(|b| *b == 0xE9));
        assert_eq!(&data[512..516], &[0x57, 0x45, 0x56, 0x82]);
        // past the label, the second stage shines through
        let label_end = 512 + size_of::<BsdDisklabel>();
        assert!(data[label_end..BSD_BBSIZE].iter().all(|b| *b == 0xB0));

        let parsed =
            raw::parse_from_bootblock(&data[..BSD_BBSIZE], raw::Platform::I386, dev.path())
                .unwrap();
        assert_eq!(parsed.npartitions(), 3);
    }

    #[test]
    fn overlapping_second_stage_is_refused() {
        let (tmp, mut dev) = scratch_device();
        let mut label = created_label(&mut dev);
        let before = std::fs::read(tmp.path()).unwrap();
        let dir = boot_images(0x5a);

        let mut prompt = ScriptedPrompt::new().string("");
        assert!(matches!(
            label.write_bootstrap(&mut dev, dir.path(), &mut prompt),
            Err(LabelError::Overlap)
        ));

        // the device was never written
        assert_eq!(std::fs::read(tmp.path()).unwrap(), before);
    }

    #[test]
    fn basename_falls_back_to_drive_type() {
        let (_tmp, mut dev) = scratch_device();
        let mut label = created_label(&mut dev);
        let dir = TempDir::new().unwrap();

        // no wdboot in the directory: the default name is what fails
        let mut prompt = ScriptedPrompt::new().string("");
        assert!(matches!(
            label.write_bootstrap(&mut dev, dir.path(), &mut prompt),
            Err(LabelError::Io(_))
        ));
    }

    #[test]
    fn wrong_sized_stages_are_rejected() {
        let (_tmp, mut dev) = scratch_device();
        let mut label = created_label(&mut dev);

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("wdboot"), vec![0u8; 100]).unwrap();
        let mut prompt = ScriptedPrompt::new().string("");
        assert!(matches!(
            label.write_bootstrap(&mut dev, dir.path(), &mut prompt),
            Err(LabelError::InvalidArgument(_))
        ));

        std::fs::write(dir.path().join("wdboot"), vec![0u8; 512]).unwrap();
        std::fs::write(dir.path().join("bootwd"), vec![0u8; 100]).unwrap();
        let mut prompt = ScriptedPrompt::new().string("");
        assert!(matches!(
            label.write_bootstrap(&mut dev, dir.path(), &mut prompt),
            Err(LabelError::InvalidArgument(_))
        ));
    }
}
