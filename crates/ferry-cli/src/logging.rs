//! Logging setup

use tracing_subscriber::EnvFilter;

/// Create an environment filter based on verbosity level
///
/// `RUST_LOG` takes precedence when set.
pub fn create_env_filter(verbosity: u8) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbosity {
            0 => EnvFilter::new("ferry_cli=warn,ferry_exec=warn,ferry_http=warn"),
            1 => EnvFilter::new("ferry_cli=info,ferry_exec=info,ferry_http=info"),
            // -vv: include russh for connection troubleshooting
            2 => EnvFilter::new("ferry_cli=debug,ferry_exec=debug,ferry_http=debug,russh=debug"),
            _ => EnvFilter::new(
                "ferry_cli=trace,ferry_exec=trace,ferry_http=trace,russh=trace,russh_sftp=debug",
            ),
        }
    }
}

/// Install the global subscriber
///
/// Logs go to stderr so stdout carries only command output.
pub fn init(verbosity: u8, json: bool) {
    let filter = create_env_filter(verbosity);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
