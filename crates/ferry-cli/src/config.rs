//! Configuration loading and command-line overrides

use std::path::{Path, PathBuf};

use eyre::{WrapErr, eyre};
use ferry_exec::{AuthMethod, ConnectionConfig, RemoteCommandOptions};
use serde::Deserialize;

/// Contents of `ferry.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Remote host to connect to
    pub connection: Option<ConnectionConfig>,
    /// How command outcomes are judged
    #[serde(default)]
    pub command: RemoteCommandOptions,
}

/// Connection settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub key: Option<PathBuf>,
    pub password_env: Option<String>,
    pub allow_stderr: bool,
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading {}", path.display()))?;
        Self::parse(&content).wrap_err_with(|| format!("parsing {}", path.display()))
    }

    fn parse(content: &str) -> eyre::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from an explicit path, `FERRY_CONFIG`, or the default locations
    ///
    /// # Errors
    /// Returns error if a config file exists but cannot be loaded
    pub fn load_default(explicit: Option<&Path>) -> eyre::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var("FERRY_CONFIG") {
            return Self::load(Path::new(&path));
        }

        let mut paths = vec![
            PathBuf::from("ferry.toml"),
            PathBuf::from("/etc/ferry/ferry.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("ferry/ferry.toml"));
        }

        for path in paths {
            if path.exists() {
                return Self::load(&path);
            }
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Config::default())
    }

    /// Command options with overrides applied
    #[must_use]
    pub fn command_options(&self, overrides: &Overrides) -> RemoteCommandOptions {
        if overrides.allow_stderr {
            RemoteCommandOptions::allow_stderr()
        } else {
            self.command
        }
    }

    /// Connection settings with overrides applied
    ///
    /// # Errors
    /// Returns error if no host, user or credentials are known
    pub fn connection(&self, overrides: &Overrides) -> eyre::Result<ConnectionConfig> {
        let auth = match (&overrides.key, &overrides.password_env) {
            (Some(path), _) => Some(AuthMethod::key_file(path)),
            (None, Some(var)) => {
                let password = std::env::var(var)
                    .map_err(|_| eyre!("environment variable {var} not set"))?;
                Some(AuthMethod::password(password))
            }
            (None, None) => None,
        };

        let mut config = match (&self.connection, &overrides.host, &overrides.user) {
            (Some(base), _, _) => base.clone(),
            (None, Some(host), Some(user)) => {
                let auth = auth
                    .clone()
                    .ok_or_else(|| eyre!("no credentials: pass --key or --password-env"))?;
                ConnectionConfig::new(host, user, auth)
            }
            _ => {
                return Err(eyre!(
                    "no connection configured: pass --host and --user or add [connection] to ferry.toml"
                ));
            }
        };

        if let Some(host) = &overrides.host {
            config.host.clone_from(host);
        }
        if let Some(user) = &overrides.user {
            config.username.clone_from(user);
        }
        if let Some(port) = overrides.port {
            config.port = port;
        }
        if let Some(auth) = auth {
            config.auth = auth;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[connection]
host = "10.1.2.3"
username = "ansible"

[connection.auth]
method = "key_file"
path = "/home/ansible/.ssh/id_ed25519"

[connection.options]
keepalive_interval_secs = 30

[command]
fail_on_stderr = false
"#;

    #[test]
    fn test_parse_sample() {
        let config = Config::parse(SAMPLE).unwrap();
        let conn = config.connection(&Overrides::default()).unwrap();

        assert_eq!(conn.endpoint(), "10.1.2.3:22");
        assert_eq!(conn.username, "ansible");
        assert_eq!(conn.options.keepalive_interval_secs, Some(30));
        assert!(!config.command.fail_on_stderr);
    }

    #[test]
    fn test_empty_config_defaults() {
        let config = Config::parse("").unwrap();

        assert!(config.connection.is_none());
        assert!(config.command.fail_on_stderr);
        assert!(config.connection(&Overrides::default()).is_err());
    }

    #[test]
    fn test_overrides_win() {
        let config = Config::parse(SAMPLE).unwrap();
        let overrides = Overrides {
            host: Some("bastion".to_string()),
            port: Some(2222),
            key: Some(PathBuf::from("/keys/deploy")),
            ..Overrides::default()
        };

        let conn = config.connection(&overrides).unwrap();

        assert_eq!(conn.endpoint(), "bastion:2222");
        assert!(matches!(conn.auth, AuthMethod::KeyFile { ref path, .. } if path == Path::new("/keys/deploy")));
    }

    #[test]
    fn test_flags_without_file() {
        let overrides = Overrides {
            host: Some("web1".to_string()),
            user: Some("deploy".to_string()),
            key: Some(PathBuf::from("/keys/deploy")),
            allow_stderr: true,
            ..Overrides::default()
        };
        let config = Config::default();

        let conn = config.connection(&overrides).unwrap();

        assert_eq!(conn.port, 22);
        assert!(!config.command_options(&overrides).fail_on_stderr);
    }

    #[test]
    fn test_flags_without_credentials() {
        let overrides = Overrides {
            host: Some("web1".to_string()),
            user: Some("deploy".to_string()),
            ..Overrides::default()
        };

        assert!(Config::default().connection(&overrides).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ferry.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Config::load_default(Some(&path)).unwrap();

        assert!(config.connection.is_some());
    }
}
