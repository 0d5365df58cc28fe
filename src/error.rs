//! Error types shared by the samplers and the process controller.
//!
//! Sampling errors are transient: the orchestrator logs them and skips
//! publication for the affected metric. Control errors are surfaced to the
//! caller unchanged and are never retried.

use std::io;
use std::path::PathBuf;

/// Failure of a single sampler invocation.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed {what}: {detail}")]
    Parse { what: &'static str, detail: String },

    #[error("{0} not available")]
    Unavailable(&'static str),
}

impl SampleError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SampleError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(what: &'static str, detail: impl Into<String>) -> Self {
        SampleError::Parse {
            what,
            detail: detail.into(),
        }
    }

    /// True when the underlying read failed because the entity is gone.
    /// A process that exits between open and read fails with ESRCH.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SampleError::Io { source, .. }
                if source.kind() == io::ErrorKind::NotFound
                    || source.raw_os_error() == Some(libc::ESRCH)
        )
    }
}

pub type SampleResult<T> = Result<T, SampleError>;

/// Typed result of a rejected or failed process-control request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error("process {pid} not found")]
    ProcessNotFound { pid: u32 },

    #[error("process {pid} changed identity (expected start {expected:.2}, found {actual:.2})")]
    ProcessChanged { pid: u32, expected: f64, actual: f64 },

    #[error("permission denied while signalling process {pid}")]
    PermissionDenied { pid: u32 },

    #[error("signalling process {pid} failed with errno {errno}")]
    Os { pid: u32, errno: i32 },

    #[error("pid {pid} is not a valid signal target")]
    InvalidTarget { pid: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let missing = SampleError::io("/proc/1/stat", io::Error::from(io::ErrorKind::NotFound));
        assert!(missing.is_not_found());

        let denied = SampleError::io(
            "/proc/1/stat",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(!denied.is_not_found());
        assert!(!SampleError::Unavailable("gpu").is_not_found());
    }

    #[test]
    fn test_exit_during_read_counts_as_not_found() {
        let exited = SampleError::io(
            "/proc/1/stat",
            io::Error::from_raw_os_error(libc::ESRCH),
        );
        assert!(exited.is_not_found());

        let busy = SampleError::io("/proc/1/stat", io::Error::from_raw_os_error(libc::EBUSY));
        assert!(!busy.is_not_found());
    }

    #[test]
    fn test_control_error_messages() {
        let err = ControlError::ProcessChanged {
            pid: 42,
            expected: 100.0,
            actual: 250.5,
        };
        assert_eq!(
            err.to_string(),
            "process 42 changed identity (expected start 100.00, found 250.50)"
        );
        assert_eq!(
            ControlError::ProcessNotFound { pid: 7 }.to_string(),
            "process 7 not found"
        );
    }
}
