//! Operator command input
//!
//! Bytes from each transport are assembled into lines by a
//! [`LineAssembler`]; the [`CommandMux`] merges the two line streams into the
//! single command stream the dispatcher consumes.

mod line_assembler;
mod mux;

pub use line_assembler::LineAssembler;
pub use mux::{CommandMux, QUEUE_DEPTH};

use alloc::string::String;
use core::fmt::{self, Display};

use thiserror_no_std::Error;

/// Where a command came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Serial,
    Wireless,
}

impl Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Serial => "serial",
            Self::Wireless => "wireless",
        })
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    #[error("{transport} line too long ({len} bytes), discarded")]
    LineTooLong { transport: Transport, len: usize },
}

/// One trimmed, non-empty line of operator input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command(String);

impl Command {
    /// `None` if the text is empty after trimming.
    pub fn new(text: &str) -> Option<Self> {
        let text = text.trim();
        (!text.is_empty()).then(|| Self(String::from(text)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Case-insensitive match against a short token such as `X` or `C`.
    pub fn is_token(&self, token: &str) -> bool {
        self.0.eq_ignore_ascii_case(token)
    }

    pub fn is_yes(&self) -> bool {
        self.is_token("Y")
    }

    /// The destructive-action confirmation. Exact case only.
    pub fn is_confirm(&self) -> bool {
        self.0 == "CONFIRM"
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
