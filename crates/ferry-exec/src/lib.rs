//! ferry-exec: Remote execution abstraction
//!
//! Connects to remote hosts over SSH, copies files to them, and runs command
//! lines remotely or locally. Every command ends in a single verdict decided
//! from its exit code and, optionally, whether it wrote to stderr.

pub mod config;
pub mod error;
pub mod keys;
pub mod local;
pub mod remote;
pub mod session;
pub mod sink;
pub mod ssh;
pub mod traits;
pub mod transfer;
pub mod util;
pub mod verdict;

pub use config::{AuthMethod, ConnectionConfig, RemoteCommandOptions, TransportOptions};
pub use error::{ExecError, Result};
pub use local::{LocalRunner, exec_local};
pub use remote::{RemoteRunner, collect_verdict, exec_on_host, exec_remote};
pub use session::release;
pub use sink::{BufferSink, ConsoleSink, OutputSink, SinkLine};
pub use ssh::{SshConnection, SshConnector};
pub use traits::{CommandRunner, Connection, Connector, ExecEvent, ExecStream};
pub use transfer::copy_file;
pub use verdict::Verdict;
