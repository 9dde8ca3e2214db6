//! Connection and command configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Everything needed to reach and authenticate against a remote host
///
/// Validation is the caller's job; the transport receives these values as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Host address
    pub host: String,
    /// Port (default 22)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username
    pub username: String,
    /// Authentication material
    pub auth: AuthMethod,
    /// Transport-specific tuning
    #[serde(default)]
    pub options: TransportOptions,
}

fn default_port() -> u16 {
    22
}

impl ConnectionConfig {
    /// Create new connection config
    pub fn new(host: impl Into<String>, username: impl Into<String>, auth: AuthMethod) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            username: username.into(),
            auth,
            options: TransportOptions::default(),
        }
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// `host:port` label for logs
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Authentication material handed to the transport
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AuthMethod {
    /// Password authentication
    Password { password: String },
    /// Private key read from a file
    KeyFile {
        path: PathBuf,
        #[serde(default)]
        passphrase: Option<String>,
    },
    /// Base64-encoded private key held in an environment variable
    KeyEnv {
        var: String,
        #[serde(default)]
        passphrase: Option<String>,
    },
}

impl AuthMethod {
    /// Password authentication
    pub fn password(password: impl Into<String>) -> Self {
        AuthMethod::Password {
            password: password.into(),
        }
    }

    /// Unencrypted private key file
    pub fn key_file(path: impl Into<PathBuf>) -> Self {
        AuthMethod::KeyFile {
            path: path.into(),
            passphrase: None,
        }
    }
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::Password { .. } => f.write_str("Password(..)"),
            AuthMethod::KeyFile { path, .. } => f.debug_tuple("KeyFile").field(path).finish(),
            AuthMethod::KeyEnv { var, .. } => f.debug_tuple("KeyEnv").field(var).finish(),
        }
    }
}

/// Transport tuning passed through to the SSH client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportOptions {
    /// Drop the connection after this many idle seconds
    #[serde(default)]
    pub inactivity_timeout_secs: Option<u64>,
    /// Send keepalives at this interval
    #[serde(default)]
    pub keepalive_interval_secs: Option<u64>,
}

impl TransportOptions {
    pub fn inactivity_timeout(&self) -> Option<Duration> {
        self.inactivity_timeout_secs.map(Duration::from_secs)
    }

    pub fn keepalive_interval(&self) -> Option<Duration> {
        self.keepalive_interval_secs.map(Duration::from_secs)
    }
}

/// Options controlling how a command's outcome is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCommandOptions {
    /// Treat any stderr output as failure even when the exit code is zero
    #[serde(default = "default_fail_on_stderr")]
    pub fail_on_stderr: bool,
}

fn default_fail_on_stderr() -> bool {
    true
}

impl Default for RemoteCommandOptions {
    fn default() -> Self {
        Self {
            fail_on_stderr: default_fail_on_stderr(),
        }
    }
}

impl RemoteCommandOptions {
    /// Options that tolerate stderr output
    #[must_use]
    pub fn allow_stderr() -> Self {
        Self {
            fail_on_stderr: false,
        }
    }

    /// Resolve caller-supplied options, falling back to defaults
    pub(crate) fn resolve(options: Option<&Self>) -> Self {
        match options {
            Some(opts) => *opts,
            None => {
                tracing::debug!("options not passed, using defaults");
                Self::default()
            }
        }
    }
}
