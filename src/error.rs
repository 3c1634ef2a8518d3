use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::ipc;

/// Errors raised while saving or replaying a session.
#[derive(Debug)]
pub enum SessionError {
    /// The session file could not be removed, created, written or read.
    FileIo { path: PathBuf, source: std::io::Error },
    /// The process owning a view exited before its argv was read.
    ProcessLookup { pid: i64, source: std::io::Error },
    /// A record in the session file is not valid JSON.
    Parse { line: usize, source: serde_json::Error },
    /// The compositor did not start the command.
    Launch { cmdline: String, reason: String },
    /// No view with the launched pid appeared in time.
    PlacementTimeout { pid: u32, waited: Duration },
    /// The compositor refused a request for this record.
    Rejected(std::io::Error),
    /// The connection to the compositor broke.
    Ipc(std::io::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::FileIo { path, source } => {
                write!(f, "Session file {:?}: {}", path, source)
            }
            SessionError::ProcessLookup { pid, source } => {
                write!(f, "Cannot read command line of pid {}: {}", pid, source)
            }
            SessionError::Parse { line, source } => {
                write!(f, "Malformed session record at line {}: {}", line, source)
            }
            SessionError::Launch { cmdline, reason } => {
                write!(f, "Failed to launch '{}': {}", cmdline, reason)
            }
            SessionError::PlacementTimeout { pid, waited } => write!(
                f,
                "No view appeared for pid {} within {} ms",
                pid,
                waited.as_millis()
            ),
            SessionError::Rejected(e) => write!(f, "Compositor rejected request: {}", e),
            SessionError::Ipc(e) => write!(f, "Compositor IPC failed: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::FileIo { source, .. } => Some(source),
            SessionError::ProcessLookup { source, .. } => Some(source),
            SessionError::Parse { source, .. } => Some(source),
            SessionError::Rejected(e) | SessionError::Ipc(e) => Some(e),
            SessionError::Launch { .. } | SessionError::PlacementTimeout { .. } => None,
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        if ipc::is_transport_error(&e) {
            SessionError::Ipc(e)
        } else {
            SessionError::Rejected(e)
        }
    }
}
