//! ferry CLI
//!
//! Copies files to a remote host and runs commands there or locally

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::Result;
use eyre::{WrapErr, bail, eyre};
use ferry_exec::{
    ConnectionConfig, ConsoleSink, Connector, ExecError, RemoteCommandOptions, SshConnector,
    copy_file, exec_local, exec_remote, release, util,
};
use ferry_http::{HttpClient, Method, ResponseBody, WebRequest};
use tokio::time::{Instant, timeout};
use tracing::{info, warn};

mod config;
mod logging;

use config::{Config, Overrides};

#[derive(Parser)]
#[command(name = "ferry", version)]
#[command(about = "Copy files to remote hosts and run commands there", long_about = None)]
struct Cli {
    /// Path to ferry.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Give up on a command after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(flatten)]
    target: TargetArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct TargetArgs {
    /// Remote host
    #[arg(long, global = true)]
    host: Option<String>,

    /// SSH port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// SSH user
    #[arg(long, global = true)]
    user: Option<String>,

    /// Private key file
    #[arg(long, global = true)]
    key: Option<PathBuf>,

    /// Environment variable holding the SSH password
    #[arg(long, global = true)]
    password_env: Option<String>,

    /// Do not fail commands that write to stderr
    #[arg(long, global = true)]
    allow_stderr: bool,
}

impl From<TargetArgs> for Overrides {
    fn from(args: TargetArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            user: args.user,
            key: args.key,
            password_env: args.password_env,
            allow_stderr: args.allow_stderr,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Copy a local file to the remote host
    Copy { local: PathBuf, remote: String },

    /// Run a command on the remote host
    Exec { command: String },

    /// Run a command on this machine
    Local { command: String },

    /// Copy a script to the remote host and run it with bash
    RunScript {
        script: PathBuf,

        /// Directory on the remote host to copy the script into
        #[arg(long, default_value = "/tmp")]
        remote_dir: String,

        /// Run the script on this machine instead
        #[arg(long)]
        local: bool,
    },

    /// Write an inventory file listing the given hosts and print its path
    Inventory { hosts: Vec<String> },

    /// Send an HTTP request and print the response
    Fetch {
        url: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Request header as `Name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// Form-encoded request body
        #[arg(short, long)]
        data: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_json);

    let config = Config::load_default(cli.config.as_deref())?;
    let overrides = Overrides::from(cli.target);
    let options = config.command_options(&overrides);
    let limit = cli.timeout.map(Duration::from_secs);

    match cli.command {
        Commands::Copy { local, remote } => {
            let conn = config.connection(&overrides)?;
            bounded(limit, copy_file(&SshConnector::new(), &local, &remote, &conn, &ConsoleSink))
                .await?;
        }
        Commands::Exec { command } => {
            let conn = config.connection(&overrides)?;
            run_remote(&SshConnector::new(), &conn, &command, &options, limit).await?;
        }
        Commands::Local { command } => {
            info!(platform = util::agent_platform(), "running local command");
            bounded(limit, exec_local(&command, &ConsoleSink, Some(&options))).await?;
        }
        Commands::RunScript {
            script,
            remote_dir,
            local,
        } => {
            let target = ScriptTarget {
                config: &config,
                overrides: &overrides,
                connector: &SshConnector::new(),
            };
            run_script(&target, &script, &remote_dir, local, &options, limit).await?;
        }
        Commands::Inventory { hosts } => {
            let path = write_inventory(&hosts)?;
            println!("{}", path.display());
        }
        Commands::Fetch {
            url,
            method,
            headers,
            data,
        } => fetch(build_request(&url, &method, &headers, data)?).await?,
    }

    Ok(())
}

/// Race `operation` against the optional time limit
async fn bounded<F, T>(limit: Option<Duration>, operation: F) -> Result<T>
where
    F: Future<Output = Result<T, ExecError>>,
{
    let Some(limit) = limit else {
        return Ok(operation.await?);
    };

    match timeout(limit, operation).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(eyre!("timed out after {limit:?}")),
    }
}

/// Connect, run one command, and close the connection even on timeout
///
/// `limit` covers connecting and running together.
async fn run_remote(
    connector: &dyn Connector,
    conn: &ConnectionConfig,
    command: &str,
    options: &RemoteCommandOptions,
    limit: Option<Duration>,
) -> Result<()> {
    let started = Instant::now();
    let connection = bounded(limit, connector.connect(conn))
        .await
        .wrap_err_with(|| format!("connecting to {}", conn.endpoint()))?;

    let result = bounded(
        limit.map(|limit| limit.saturating_sub(started.elapsed())),
        exec_remote(command, connection.as_ref(), &ConsoleSink, Some(options)),
    )
    .await;

    if result.is_err() {
        warn!(command = %command, "remote command did not succeed, closing connection");
    }
    release(connection.as_ref()).await;

    result
}

/// Where `run-script` sends a remote script
struct ScriptTarget<'a> {
    config: &'a Config,
    overrides: &'a Overrides,
    connector: &'a dyn Connector,
}

async fn run_script(
    target: &ScriptTarget<'_>,
    script: &Path,
    remote_dir: &str,
    local: bool,
    options: &RemoteCommandOptions,
    limit: Option<Duration>,
) -> Result<()> {
    if !util::file_exists(script) {
        bail!("script not found: {}", script.display());
    }

    if local {
        let bash = util::which("bash").ok_or_else(|| eyre!("bash not found on PATH"))?;
        let command = format!(
            "{} {}",
            shell_quote(&bash.to_string_lossy()),
            shell_quote(&script.to_string_lossy())
        );
        return bounded(limit, exec_local(&command, &ConsoleSink, Some(options))).await;
    }

    let file_name = script
        .file_name()
        .ok_or_else(|| eyre!("not a file: {}", script.display()))?
        .to_string_lossy();
    let remote_path = format!("{}/{file_name}", remote_dir.trim_end_matches('/'));

    let conn = target.config.connection(target.overrides)?;
    bounded(
        limit,
        copy_file(target.connector, script, &remote_path, &conn, &ConsoleSink),
    )
    .await?;

    let command = format!("bash {}", shell_quote(&remote_path));
    run_remote(target.connector, &conn, &command, options, limit).await
}

/// Quote `arg` for a POSIX shell
fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

fn write_inventory(hosts: &[String]) -> Result<PathBuf> {
    if hosts.is_empty() {
        bail!("no hosts given");
    }

    let path = util::temporary_inventory_path();
    let mut file = std::fs::File::create(&path)
        .wrap_err_with(|| format!("creating {}", path.display()))?;
    writeln!(file, "[all]")?;
    for host in hosts {
        writeln!(file, "{host}")?;
    }

    info!(path = %path.display(), hosts = hosts.len(), "wrote inventory");
    Ok(path)
}

fn build_request(
    url: &str,
    method: &str,
    headers: &[String],
    data: Option<String>,
) -> Result<WebRequest> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .wrap_err_with(|| format!("invalid HTTP method: {method}"))?;

    let mut request = WebRequest::new(method, url);
    for header in headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| eyre!("header must look like `Name: value`: {header}"))?;
        request = request.with_header(name.trim(), value.trim());
    }
    if let Some(body) = data {
        request = request.with_body(body);
    }

    Ok(request)
}

async fn fetch(request: WebRequest) -> Result<()> {
    let client = HttpClient::from_env()?;
    let response = client.begin_request(request).await?;

    println!("{} {}", response.status_code, response.status_message);
    match &response.body {
        Some(ResponseBody::Json(value)) => println!("{value:#}"),
        Some(ResponseBody::Text(text)) => println!("{text}"),
        None => {}
    }

    if !response.is_success() {
        bail!("request failed with status {}", response.status_code);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use ferry_exec::{AuthMethod, Connection};

    use super::*;

    /// Connector for a host that never answers
    struct StalledConnector;

    #[async_trait]
    impl Connector for StalledConnector {
        async fn connect(
            &self,
            _config: &ConnectionConfig,
        ) -> Result<Box<dyn Connection>, ExecError> {
            std::future::pending().await
        }
    }

    fn stalled_target() -> ConnectionConfig {
        ConnectionConfig::new("10.255.255.1", "deploy", AuthMethod::password("x"))
    }

    #[test]
    fn test_cli_parses_exec() {
        let cli = Cli::try_parse_from([
            "ferry", "--host", "web1", "--user", "deploy", "-vv", "exec", "uptime",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.target.host.as_deref(), Some("web1"));
        assert!(matches!(cli.command, Commands::Exec { ref command } if command == "uptime"));
    }

    #[test]
    fn test_write_inventory() {
        let path = write_inventory(&["web1".to_string(), "web2".to_string()]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(content, "[all]\nweb1\nweb2\n");
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result = bounded(Some(Duration::from_millis(50)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), ExecError>(())
        })
        .await;

        assert!(result.unwrap_err().to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_timeout_covers_connect() {
        let result = run_remote(
            &StalledConnector,
            &stalled_target(),
            "uptime",
            &RemoteCommandOptions::default(),
            Some(Duration::from_millis(50)),
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.chain().any(|cause| cause.to_string().contains("timed out")));
    }

    #[tokio::test]
    async fn test_remote_script_connect_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("deploy.sh");
        std::fs::write(&script, "echo deployed\n").unwrap();

        let config = Config {
            connection: Some(stalled_target()),
            ..Config::default()
        };
        let target = ScriptTarget {
            config: &config,
            overrides: &Overrides::default(),
            connector: &StalledConnector,
        };
        let result = run_script(
            &target,
            &script,
            "/tmp",
            false,
            &RemoteCommandOptions::default(),
            Some(Duration::from_millis(50)),
        )
        .await;

        assert!(result.unwrap_err().to_string().contains("timed out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_local_script_path_with_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("my deploy's script.sh");
        std::fs::write(&script, "exit 0\n").unwrap();

        let config = Config::default();
        let target = ScriptTarget {
            config: &config,
            overrides: &Overrides::default(),
            connector: &StalledConnector,
        };
        run_script(
            &target,
            &script,
            "/tmp",
            true,
            &RemoteCommandOptions::default(),
            None,
        )
        .await
        .unwrap();
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/tmp/run me.sh"), "'/tmp/run me.sh'");
        assert_eq!(shell_quote("it's.sh"), r"'it'\''s.sh'");
    }

    #[test]
    fn test_build_request() {
        let request = build_request(
            "http://localhost/hosts",
            "post",
            &["Authorization: Bearer t".to_string()],
            Some("name=web1".to_string()),
        )
        .unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body, "name=web1");
        assert_eq!(
            request.headers.get("Authorization").map(String::as_str),
            Some("Bearer t")
        );
    }

    #[test]
    fn test_build_request_rejects_bad_header() {
        let result = build_request("http://localhost", "GET", &["no-colon".to_string()], None);

        assert!(result.unwrap_err().to_string().contains("no-colon"));
    }

    #[test]
    fn test_cli_parses_fetch() {
        let cli = Cli::try_parse_from([
            "ferry", "fetch", "-X", "PUT", "-H", "Accept: text/plain", "-d", "a=1", "http://x",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Commands::Fetch { ref method, ref headers, ref data, .. }
                if method == "PUT" && headers.len() == 1 && data.as_deref() == Some("a=1")
        ));
    }

    #[tokio::test]
    async fn test_bounded_passes_errors_through() {
        let result = bounded(None, async {
            Err::<(), _>(ExecError::NonZeroExit {
                command: "exit 3".to_string(),
                code: 3,
            })
        })
        .await;

        assert!(result.unwrap_err().to_string().contains("exit 3"));
    }
}
