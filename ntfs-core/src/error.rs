use std::fmt;

use thiserror::Error;

/// The broad category an [`Error`] falls into, matching the domains laid
/// out for this engine: a caller deciding whether to retry, abort, or
/// continue past a single corrupt record can switch on this without
/// string-matching a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Argument,
    Io,
    Input,
    Compression,
    Memory,
    Runtime,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Domain::Argument => "argument",
            Domain::Io => "io",
            Domain::Input => "input",
            Domain::Compression => "compression",
            Domain::Memory => "memory",
            Domain::Runtime => "runtime",
        };
        f.write_str(name)
    }
}

/// Tagged (domain, kind) error, per the engine's error handling design.
///
/// `Input` errors on a single MFT entry or index node are not meant to
/// abort volume access on their own - that policy lives in the callers
/// (an entry gets marked corrupted and iteration continues); this type
/// only carries the tag and a message, it does not encode the recovery
/// policy.
#[derive(Debug, Error)]
pub enum Error {
    #[error("argument: invalid value: {0}")]
    InvalidValue(String),
    #[error("argument: out of bounds: {0}")]
    ArgumentOutOfBounds(String),
    #[error("argument: unsupported value: {0}")]
    UnsupportedValue(String),
    #[error("argument: value too large: {0}")]
    ValueTooLarge(String),

    #[error("io: open failed: {0}")]
    OpenFailed(String),
    #[error("io: read failed ({operation}): {source}")]
    ReadFailed {
        operation: String,
        #[source]
        source: std::io::Error,
    },
    #[error("io: seek failed: {0}")]
    SeekFailed(String),
    #[error("io: access denied: {0}")]
    AccessDenied(String),
    #[error("io: invalid resource: {0}")]
    InvalidResource(String),

    #[error("input: invalid data: {0}")]
    InvalidData(String),
    #[error("input: signature mismatch: {0}")]
    SignatureMismatch(String),
    #[error("input: checksum mismatch: {0}")]
    ChecksumMismatch(String),
    #[error("input: value mismatch: {0}")]
    ValueMismatch(String),

    #[error("compression: compress failed: {0}")]
    CompressFailed(String),
    #[error("compression: decompress failed: {0}")]
    DecompressFailed(String),

    #[error("memory: insufficient: {0}")]
    InsufficientMemory(String),
    #[error("memory: set failed: {0}")]
    MemorySetFailed(String),

    #[error("runtime: value missing: {0}")]
    ValueMissing(String),
    #[error("runtime: value already set: {0}")]
    ValueAlreadySet(String),
    #[error("runtime: initialize failed: {0}")]
    InitializeFailed(String),
    #[error("runtime: get failed: {0}")]
    GetFailed(String),
    #[error("runtime: set failed: {0}")]
    RuntimeSetFailed(String),
    #[error("runtime: out of bounds: {0}")]
    RuntimeOutOfBounds(String),
    #[error("runtime: unsupported value: {0}")]
    RuntimeUnsupportedValue(String),
    #[error("runtime: abort requested")]
    AbortRequested,
    #[error("runtime: value in use: {0}")]
    ValueInUse(String),
}

impl Error {
    pub fn domain(&self) -> Domain {
        use Error::*;
        match self {
            InvalidValue(_) | ArgumentOutOfBounds(_) | UnsupportedValue(_) | ValueTooLarge(_) => {
                Domain::Argument
            }
            OpenFailed(_) | ReadFailed { .. } | SeekFailed(_) | AccessDenied(_)
            | InvalidResource(_) => Domain::Io,
            InvalidData(_) | SignatureMismatch(_) | ChecksumMismatch(_) | ValueMismatch(_) => {
                Domain::Input
            }
            CompressFailed(_) | DecompressFailed(_) => Domain::Compression,
            InsufficientMemory(_) | MemorySetFailed(_) => Domain::Memory,
            ValueMissing(_)
            | ValueAlreadySet(_)
            | InitializeFailed(_)
            | GetFailed(_)
            | RuntimeSetFailed(_)
            | RuntimeOutOfBounds(_)
            | RuntimeUnsupportedValue(_)
            | AbortRequested
            | ValueInUse(_) => Domain::Runtime,
        }
    }

    /// Attach a description of the logical operation in progress to an IO
    /// read failure, e.g. "read MFT entry 42 at image offset 0x1a000".
    pub fn read_failed(operation: impl Into<String>, source: std::io::Error) -> Self {
        Error::ReadFailed {
            operation: operation.into(),
            source,
        }
    }

    /// True for errors that, per the error handling design, should not
    /// abort whole-volume access when raised while parsing a single MFT
    /// entry or index node.
    pub fn is_recoverable_input_error(&self) -> bool {
        self.domain() == Domain::Input
    }
}
