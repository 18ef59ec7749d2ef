/// Per-volume diagnostic sink, replacing the teacher's process-wide
/// `log::{info,debug,trace}` calls with an object the caller can swap out.
///
/// `tag` identifies the subsystem emitting the message (`"fixup"`,
/// `"attribute_list"`, `"index"`, ...) so a caller routing these into a
/// structured log doesn't have to parse the message text.
pub trait DiagnosticSink: Send + Sync {
    fn trace(&self, tag: &str, message: &str);
    fn debug(&self, tag: &str, message: &str);
    fn warn(&self, tag: &str, message: &str);
}

/// Default sink: forwards into the `log` crate, the way every module in
/// the teacher codebase already does directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn trace(&self, tag: &str, message: &str) {
        log::trace!(target: "ntfs", "[{tag}] {message}");
    }

    fn debug(&self, tag: &str, message: &str) {
        log::debug!(target: "ntfs", "[{tag}] {message}");
    }

    fn warn(&self, tag: &str, message: &str) {
        log::warn!(target: "ntfs", "[{tag}] {message}");
    }
}

/// Sink that drops everything, for callers who want silence without the
/// overhead of routing through `log`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn trace(&self, _tag: &str, _message: &str) {}
    fn debug(&self, _tag: &str, _message: &str) {}
    fn warn(&self, _tag: &str, _message: &str) {}
}
