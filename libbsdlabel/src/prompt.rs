use std::io::Error as IoError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("cancelled by user")]
    Cancelled,
    #[error("I/O operation failed: {0}")]
    Io(#[from] IoError),
}

/*
 * The editor never talks to a terminal itself; everything it needs to
 * ask goes through this trait.  Implementations re-prompt on malformed
 * input and surface end-of-input as Cancelled.
 */
pub trait Prompt {
    fn ask_number(
        &mut self,
        prompt: &str,
        low: u64,
        default: u64,
        high: u64,
    ) -> Result<u64, PromptError>;

    fn ask_yesno(&mut self, prompt: &str) -> Result<bool, PromptError>;

    fn ask_string(&mut self, prompt: &str) -> Result<String, PromptError>;

    /// Ask for a partition slot; returns a zero-based index below `limit`.
    fn ask_partnum(&mut self, prompt: &str, limit: usize) -> Result<usize, PromptError>;
}
