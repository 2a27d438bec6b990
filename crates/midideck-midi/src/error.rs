//! Error types for the protocol layer.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid character '{0}' in SysEx template")]
    InvalidTemplateChar(char),

    #[error("unknown placeholder '%{0}' in SysEx template")]
    UnknownPlaceholder(char),

    #[error("unterminated hex byte at end of SysEx template")]
    UnterminatedHexByte,
}

pub type Result<T> = std::result::Result<T, Error>;
