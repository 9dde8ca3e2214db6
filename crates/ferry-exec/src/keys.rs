//! SSH key resolution

use std::env;
use std::path::{Path, PathBuf};

use russh::keys::PrivateKey;
use tracing::debug;

use crate::config::AuthMethod;

/// Where a private key comes from
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Explicit path to key file
    Path {
        path: PathBuf,
        passphrase: Option<String>,
    },
    /// Base64-encoded key from environment
    Env {
        var: String,
        passphrase: Option<String>,
    },
}

impl KeySource {
    /// Key source for an auth method, `None` for password auth
    #[must_use]
    pub fn from_auth(auth: &AuthMethod) -> Option<Self> {
        match auth {
            AuthMethod::Password { .. } => None,
            AuthMethod::KeyFile { path, passphrase } => Some(KeySource::Path {
                path: path.clone(),
                passphrase: passphrase.clone(),
            }),
            AuthMethod::KeyEnv { var, passphrase } => Some(KeySource::Env {
                var: var.clone(),
                passphrase: passphrase.clone(),
            }),
        }
    }

    /// Load and decode the private key
    ///
    /// Env keys are decoded in memory and never touch the filesystem.
    ///
    /// # Errors
    /// Returns `KeyError` if the key is missing, too permissive, not valid base64,
    /// or cannot be parsed
    pub fn resolve(&self) -> Result<PrivateKey, KeyError> {
        match self {
            KeySource::Path { path, passphrase } => {
                if !path.exists() {
                    return Err(KeyError::NotFound(path.display().to_string()));
                }
                validate_key_permissions(path)?;
                debug!(path = %path.display(), "loading SSH key from file");
                russh::keys::load_secret_key(path, passphrase.as_deref())
                    .map_err(|e| KeyError::Parse(e.to_string()))
            }
            KeySource::Env { var, passphrase } => {
                let encoded = env::var(var).map_err(|_| KeyError::EnvNotSet(var.clone()))?;
                let key_data = base64_decode(&encoded).map_err(|_| KeyError::InvalidBase64)?;
                let key_text = String::from_utf8(key_data).map_err(|_| KeyError::InvalidBase64)?;
                debug!(var = %var, "loading SSH key from environment");
                russh::keys::decode_secret_key(&key_text, passphrase.as_deref())
                    .map_err(|e| KeyError::Parse(e.to_string()))
            }
        }
    }
}

/// Key resolution errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("environment variable {0} not set")]
    EnvNotSet(String),

    #[error("invalid base64 encoding")]
    InvalidBase64,

    #[error("key file permissions too open: {0} (should be 600)")]
    BadPermissions(String),

    #[error("key file not found: {0}")]
    NotFound(String),

    #[error("failed to parse key: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn base64_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(input.trim())
}

#[cfg(unix)]
fn validate_key_permissions(path: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)?.permissions().mode();

    // group and other bits must be clear
    if mode & 0o77 != 0 {
        return Err(KeyError::BadPermissions(path.display().to_string()));
    }

    Ok(())
}

#[cfg(not(unix))]
fn validate_key_permissions(_path: &Path) -> Result<(), KeyError> {
    Ok(())
}
