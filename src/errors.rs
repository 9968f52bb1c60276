use std::fmt;

#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),

    /// Code which can't be decoded into instructions or blocks
    MalformedBytecode { bci: usize, reason: String },

    /// Command line argument that doesn't parse
    InvalidArgument(String),

    /// The graph can't be built for this method (but another compiler tier may still run it)
    ///
    /// This covers the `jsr`/`ret` shapes we don't handle and methods that are too big.
    Bailout(String),

    /// Subroutine entry at bytecode index 0 (indicates a bug)
    InvalidJsrEntry(usize),

    /// Operation only valid while parsing a subroutine was called outside of one (indicates a bug)
    NotParsingJsr,

    /// Operation only valid outside of a subroutine was called inside one (indicates a bug)
    ParsingJsr,

    /// A synchronization-entry handler is missing its default exception handler block
    MissingDefaultHandlerBlock,

    /// Graph builder has no scope data to parse with (indicates a bug)
    NoActiveScope,

    /// A block was expected to start at this index
    MissingBlock(usize),
}

impl Error {
    /// Should the caller fall back to a non-optimizing execution path?
    pub fn is_bailout(&self) -> bool {
        matches!(self, Error::Bailout(_))
    }

    pub(crate) fn malformed(bci: usize, reason: impl Into<String>) -> Error {
        Error::MalformedBytecode {
            bci,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::MalformedBytecode { bci, reason } => {
                write!(f, "malformed bytecode at bci {}: {}", bci, reason)
            }
            Error::InvalidArgument(arg) => write!(f, "invalid argument: {}", arg),
            Error::Bailout(reason) => write!(f, "bailout: {}", reason),
            Error::InvalidJsrEntry(bci) => write!(f, "jsr cannot possibly jump to bci {}", bci),
            Error::NotParsingJsr => f.write_str("not parsing a subroutine"),
            Error::ParsingJsr => f.write_str("unexpectedly parsing a subroutine"),
            Error::MissingDefaultHandlerBlock => {
                f.write_str("synchronization handler has no default exception handler block")
            }
            Error::NoActiveScope => f.write_str("no active scope"),
            Error::MissingBlock(bci) => write!(f, "no block starts at bci {}", bci),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}
