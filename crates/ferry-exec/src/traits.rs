//! Transport and executor traits

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::{ConnectionConfig, RemoteCommandOptions};
use crate::error::ExecError;

/// One event from a running remote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecEvent {
    /// Chunk of stdout
    Stdout(Vec<u8>),
    /// Chunk of stderr
    Stderr(Vec<u8>),
    /// The command finished and its channel closed
    Close {
        code: Option<u32>,
        signal: Option<String>,
    },
}

/// Ordered events of a single exec channel
#[async_trait]
pub trait ExecStream: Send {
    /// Next event, `None` once the channel is gone
    async fn next_event(&mut self) -> Option<ExecEvent>;
}

#[async_trait]
impl ExecStream for mpsc::Receiver<ExecEvent> {
    async fn next_event(&mut self) -> Option<ExecEvent> {
        self.recv().await
    }
}

/// A live session with a remote host
///
/// Not safe for unrelated concurrent operations without external
/// serialization.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Open an exec channel and issue `command` on it
    async fn exec(&self, command: &str) -> Result<Box<dyn ExecStream>, ExecError>;

    /// Upload a local file to `remote`
    async fn upload(&self, local: &Path, remote: &str) -> Result<(), ExecError>;

    /// Read a remote file's content
    async fn read_file(&self, remote: &str) -> Result<Vec<u8>, ExecError>;

    /// Release the session
    async fn close(&self) -> Result<(), ExecError>;
}

/// Establishes connections from a configuration
#[async_trait]
pub trait Connector: Send + Sync {
    /// Resolve once the connection is ready for use
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>, ExecError>;
}

/// Runs a command line somewhere and reports its verdict
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        cmd: &str,
        options: Option<&RemoteCommandOptions>,
    ) -> Result<(), ExecError>;

    fn runner_type(&self) -> &'static str;
}
