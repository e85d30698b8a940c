// Consistent exit codes for the creatio-fs CLI.
//
//   0 = success
//   1 = general error
//   2 = usage/argument error
//   3 = path not found
//   4 = authentication error
//   5 = the server rejected the operation
//   6 = network or protocol error

use std::process;

use creatio_fs::FsError;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    NotFound = 3,
    Auth = 4,
    Rejected = 5,
    Network = 6,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(fs_err) = cause.downcast_ref::<FsError>() {
                return Self::from_fs_error(fs_err);
            }
            if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
                return match io_err.kind() {
                    std::io::ErrorKind::NotFound => Self::NotFound,
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::ConnectionRefused => {
                        Self::Network
                    }
                    _ => Self::Error,
                };
            }
        }
        Self::Error
    }

    pub fn from_fs_error(err: &FsError) -> Self {
        match err {
            FsError::NotFound(_) => Self::NotFound,
            FsError::Authentication(_) => Self::Auth,
            FsError::RemoteOperation(_)
            | FsError::ReadOnly(_)
            | FsError::AlreadyExists(_)
            | FsError::Unsupported(_) => Self::Rejected,
            FsError::Protocol { .. } | FsError::Transport { .. } => Self::Network,
            FsError::InvalidPath(_) | FsError::Config(_) => Self::Usage,
            _ => Self::Error,
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}
