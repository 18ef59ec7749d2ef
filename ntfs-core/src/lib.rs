//! Domain-agnostic plumbing shared by the NTFS engine: the tagged error
//! type, the block-source and diagnostic-sink traits the engine consumes,
//! and the small newtypes (file references, LCN/VCN) used across every
//! layer.

pub mod abort;
pub mod block_source;
pub mod diagnostics;
pub mod error;
pub mod refs;

pub use abort::AbortSignal;
pub use block_source::{BlockSource, MemorySource};
pub use diagnostics::{DiagnosticSink, LogSink, NullSink};
pub use error::{Domain, Error};
pub use refs::{FileReference, Lcn, Vcn};
