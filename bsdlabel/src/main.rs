mod logger;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Arg, ArgAction, Command};
use libbsdlabel::{
    BsdLabelError, Device,
    geometry::Unit,
    labels::{
        CreateStatus, LabelError, LabelOps,
        bsd::{BsdLabel, raw::Platform},
        dos::DosTable,
    },
    prompt::{Prompt, PromptError},
};

const BOOTDIR: &str = env!("BOOTDIR");

struct StdinPrompt;

impl StdinPrompt {
    fn read_line(&self, text: &str) -> Result<Option<String>, PromptError> {
        print!("{text}: ");
        io::stdout().flush().map_err(PromptError::Io)?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line).map_err(PromptError::Io)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

impl Prompt for StdinPrompt {
    fn ask_number(
        &mut self,
        prompt: &str,
        low: u64,
        default: u64,
        high: u64,
    ) -> Result<u64, PromptError> {
        loop {
            let line = self
                .read_line(&format!("{prompt} ({low}-{high}, default {default})"))?
                .ok_or(PromptError::Cancelled)?;
            if line.is_empty() {
                return Ok(default);
            }
            match line.parse::<u64>() {
                Ok(v) if (low..=high).contains(&v) => return Ok(v),
                _ => println!("value must be between {low} and {high}"),
            }
        }
    }

    fn ask_yesno(&mut self, prompt: &str) -> Result<bool, PromptError> {
        loop {
            let line = self
                .read_line(&format!("{prompt} (y/n)"))?
                .ok_or(PromptError::Cancelled)?;
            match line.as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => println!("please answer y or n"),
            }
        }
    }

    fn ask_string(&mut self, prompt: &str) -> Result<String, PromptError> {
        self.read_line(prompt)?.ok_or(PromptError::Cancelled)
    }

    fn ask_partnum(&mut self, prompt: &str, limit: usize) -> Result<usize, PromptError> {
        let last = (b'a' + (limit - 1) as u8) as char;
        loop {
            let line = self
                .read_line(&format!("{prompt} (a-{last})"))?
                .ok_or(PromptError::Cancelled)?;
            if let Ok(index) = parse_slice(&line) {
                if index < limit {
                    return Ok(index);
                }
            }
            println!("please give a partition letter between a and {last}");
        }
    }
}

fn parse_slice(s: &str) -> Result<usize, LabelError> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c @ 'a'..='p'), None) => Ok(c as usize - 'a' as usize),
        _ => Err(LabelError::InvalidArgument(
            "slice must be a single letter between a and p",
        )),
    }
}

fn parse_type_spec(s: &str) -> Result<(usize, u8), LabelError> {
    let (slice, fstype) = s
        .split_once(':')
        .ok_or(LabelError::InvalidArgument("expected <slice>:<fstype>"))?;
    let fstype = fstype
        .parse::<u8>()
        .map_err(|_| LabelError::InvalidArgument("fstype must be a number between 0 and 255"))?;
    Ok((parse_slice(slice)?, fstype))
}

fn run() -> Result<ExitCode, BsdLabelError> {
    let matches = Command::new("bsdlabel")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Reads and edits BSD disklabels")
        .arg(
            Arg::new("readonly")
                .short('r')
                .long("readonly")
                .help("Open the device read-only")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("cylinders")
                .short('c')
                .long("cylinders")
                .help("Display and accept partition positions in cylinders")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("platform")
                .long("platform")
                .value_name("arch")
                .help("Label layout to use")
                .value_parser(["i386", "alpha", "ia64"])
                .default_value("i386"),
        )
        .arg(
            Arg::new("create")
                .long("create")
                .help("Create a fresh label when none is found")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("edit")
                .short('e')
                .long("edit")
                .help("Edit drive geometry and performance parameters")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("add")
                .short('a')
                .long("add")
                .value_name("slice")
                .help("Add a partition at the given slice letter"),
        )
        .arg(
            Arg::new("delete")
                .short('d')
                .long("delete")
                .value_name("slice")
                .help("Delete the partition at the given slice letter"),
        )
        .arg(
            Arg::new("type")
                .short('t')
                .long("type")
                .value_name("slice:fstype")
                .help("Set the filesystem type of a slice"),
        )
        .arg(
            Arg::new("link")
                .long("link")
                .help("Copy a parent MBR partition into a slice")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("install-boot")
                .short('B')
                .long("install-boot")
                .help("Install the two-stage bootstrap into the boot block")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("bootdir")
                .long("bootdir")
                .value_name("dir")
                .help("Directory holding the bootstrap images")
                .default_value(BOOTDIR),
        )
        .arg(
            Arg::new("device")
                .help("Block device or image file")
                .required(true)
                .index(1),
        )
        .get_matches();

    let device_path = PathBuf::from(matches.get_one::<String>("device").unwrap());
    let readonly = matches.get_flag("readonly");
    let platform = match matches.get_one::<String>("platform").unwrap().as_str() {
        "alpha" => Platform::Alpha,
        "ia64" => Platform::Ia64,
        _ => Platform::I386,
    };

    let mut dev = Device::open(&device_path, readonly)?;
    if matches.get_flag("cylinders") {
        dev.set_unit(Unit::Cylinders);
    }

    match DosTable::read(&mut dev) {
        Ok(table) => dev.assign_dos_table(table),
        Err(LabelError::NotFound) => {}
        Err(err) => return Err(err.into()),
    }

    let mut label = BsdLabel::new(platform);
    let mut prompt = StdinPrompt;
    let mut changed = false;

    let found = label.probe(&mut dev)?;
    if !found {
        if !matches.get_flag("create") {
            eprintln!(
                "bsdlabel: {}: no BSD disklabel found (use --create)",
                device_path.display()
            );
            return Ok(ExitCode::FAILURE);
        }
        match label.create(&mut dev, &mut prompt)? {
            CreateStatus::Created => changed = true,
            CreateStatus::Declined => return Ok(ExitCode::SUCCESS),
        }
    }

    if matches.get_flag("edit") {
        label.edit_disklabel(&mut prompt)?;
        changed = true;
    }
    if let Some(slice) = matches.get_one::<String>("add") {
        let index = parse_slice(slice)?;
        label.part_add(&dev, index, 0, &mut prompt)?;
        changed = true;
    }
    if let Some(slice) = matches.get_one::<String>("delete") {
        label.part_delete(parse_slice(slice)?)?;
        changed = true;
    }
    if let Some(spec) = matches.get_one::<String>("type") {
        let (index, fstype) = parse_type_spec(spec)?;
        label.part_set_type(index, fstype)?;
        changed = true;
    }
    if matches.get_flag("link") {
        label.link_partition(&dev, &mut prompt)?;
        changed = true;
    }

    if changed {
        label.write(&mut dev)?;
    }

    if matches.get_flag("install-boot") {
        let bootdir = PathBuf::from(matches.get_one::<String>("bootdir").unwrap());
        label.write_bootstrap(&mut dev, &bootdir, &mut prompt)?;
    }

    let stdout = io::stdout();
    label.list(&dev, &mut stdout.lock())?;
    return Ok(ExitCode::SUCCESS);
}

fn main() -> ExitCode {
    logger::init_logger();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("bsdlabel: {err}");
            ExitCode::FAILURE
        }
    }
}
