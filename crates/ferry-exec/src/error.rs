//! Error types for ferry-exec

use thiserror::Error;

use crate::keys::KeyError;

/// Errors produced by connecting, transferring and executing
///
/// Every failure is terminal for the call that produced it; nothing in this
/// crate retries.
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Transport reported an error before the connection became ready
    #[error("connection failed: {0}")]
    Connect(String),

    /// Transport connected but rejected the supplied credentials
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Key material could not be loaded
    #[error("SSH key error: {0}")]
    Key(String),

    /// The exec channel could not be created or the command not issued
    #[error("failed to dispatch command '{command}': {reason}")]
    Dispatch {
        /// Command line that was being dispatched
        command: String,
        /// Underlying transport error
        reason: String,
    },

    /// Remote command exited with a non-zero status
    #[error("command '{command}' exited with non-zero code: {code}")]
    NonZeroExit {
        /// Command line that was executed
        command: String,
        /// Exit status reported by the remote process
        code: u32,
    },

    /// Local shell facility reported an error (spawn failure or non-zero exit)
    #[error("command '{command}' failed: {reason}")]
    LocalCommandFailed {
        /// Command line that was executed
        command: String,
        /// Error reported by the shell facility
        reason: String,
    },

    /// Command wrote to stderr while `fail_on_stderr` was set
    #[error("command '{command}' wrote to stderr")]
    StdErrPolicy {
        /// Command line that was executed
        command: String,
    },

    /// Exec stream ended without ever reporting a close
    #[error("channel for command '{command}' ended without a close event")]
    ChannelClosed {
        /// Command line that was executed
        command: String,
    },

    /// Copying a file to the remote host failed
    #[error("remote copy failed: {0}")]
    Transfer(String),

    /// Releasing a connection failed; logged, never returned from public operations
    #[error("cleanup failed: {0}")]
    Cleanup(String),

    /// I/O error on a local resource or transport stream
    #[error("I/O error: {0}")]
    Io(String),
}

impl ExecError {
    /// Check if the error came from the transport rather than from the
    /// command's own exit status or output
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ExecError::Connect(_)
                | ExecError::Authentication(_)
                | ExecError::Dispatch { .. }
                | ExecError::ChannelClosed { .. }
                | ExecError::Transfer(_)
                | ExecError::Cleanup(_)
                | ExecError::Io(_)
        )
    }

    /// Exit code carried by a remote non-zero exit, if any
    #[must_use]
    pub fn exit_code(&self) -> Option<u32> {
        match self {
            ExecError::NonZeroExit { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<KeyError> for ExecError {
    fn from(err: KeyError) -> Self {
        ExecError::Key(err.to_string())
    }
}

impl From<std::io::Error> for ExecError {
    fn from(err: std::io::Error) -> Self {
        ExecError::Io(err.to_string())
    }
}

/// Result type for execution operations
pub type Result<T> = std::result::Result<T, ExecError>;
