use std::io;

use thiserror::Error;

/// Fatal conditions that halt a run.
///
/// Every variant terminates the run that produced it; nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// `>` moved the memory pointer past the tape length.
    #[error("memory pointer can't be greater than memory length")]
    MemoryOverflow,

    /// `<` moved the memory pointer below zero.
    #[error("memory pointer can't be less than 0")]
    MemoryUnderflow,

    /// A cell was accessed at a pointer with no backing cell. The pointer may
    /// rest one past the last cell after `>`, but reading or writing there fails.
    #[error("memory pointer {pointer} has no cell (memory length {len})")]
    CellOutOfRange { pointer: usize, len: usize },

    #[error("operation ] must be entered after a [")]
    UnmatchedLoopEnd { position: usize },

    #[error("operation {} is not allowed", char::from(*.0))]
    Forbidden(u8),

    /// A custom operation moved the code pointer past the fetched program.
    #[error("code pointer {pointer} is past the end of the program (length {len})")]
    CodeOutOfRange { pointer: usize, len: usize },

    #[error("input while scanning input: {0}")]
    Read(#[source] io::Error),

    #[error("output while writing: {0}")]
    Write(#[source] io::Error),

    #[error("operation {} failed: {source}", char::from(*opcode))]
    Operation {
        opcode: u8,
        #[source]
        source: io::Error,
    },

    #[error("step limit of {limit} exceeded")]
    StepLimitExceeded { limit: usize },
}

impl Error {
    /// True for any memory pointer bound violation.
    pub fn is_bounds(&self) -> bool {
        matches!(
            self,
            Error::MemoryOverflow | Error::MemoryUnderflow | Error::CellOutOfRange { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
