pub mod bsd;
pub mod dos;

use std::io::{self, Error as IoError};

use thiserror::Error;

use crate::Device;
use crate::prompt::{Prompt, PromptError};

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("I/O operation failed: {0}")]
    Io(#[from] IoError),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("no disklabel found")]
    NotFound,
    #[error("cancelled by user")]
    Cancelled,
    #[error("bootstrap overlaps the disklabel")]
    Overlap,
    #[error("corrupt disklabel: {0}")]
    Corrupt(&'static str),
}

impl From<PromptError> for LabelError {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::Cancelled => LabelError::Cancelled,
            PromptError::Io(e) => LabelError::Io(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateStatus {
    Created,
    Declined,
}

/// Editable view of one partition slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionView {
    pub letter: char,
    pub offset: u64,
    pub size: u64,
    pub used: bool,
    pub fstype: u8,
    pub fsize: Option<u32>,
    pub bsize: Option<u32>,
    pub cpg: Option<u16>,
}

/*
 * The capability set a label driver hands to the generic partitioner.
 * Drivers carry per-device label state, so this is a trait rather than
 * a table of bare function pointers.
 */
pub trait LabelOps {
    /// Look for an existing label on the device.  A clean "nothing
    /// there" is Ok(false), not an error.
    fn probe(&mut self, dev: &mut Device) -> Result<bool, LabelError>;

    fn list(&self, dev: &Device, out: &mut dyn io::Write) -> Result<(), LabelError>;

    fn write(&mut self, dev: &mut Device) -> Result<(), LabelError>;

    fn create(
        &mut self,
        dev: &mut Device,
        prompt: &mut dyn Prompt,
    ) -> Result<CreateStatus, LabelError>;

    fn part_add(
        &mut self,
        dev: &Device,
        index: usize,
        fstype: u8,
        prompt: &mut dyn Prompt,
    ) -> Result<(), LabelError>;

    fn part_delete(&mut self, index: usize) -> Result<(), LabelError>;

    fn get_part(&self, index: usize) -> Result<PartitionView, LabelError>;

    fn part_set_type(&mut self, index: usize, fstype: u8) -> Result<(), LabelError>;

    fn part_is_used(&self, index: usize) -> bool;
}
