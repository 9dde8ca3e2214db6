//! Remote command execution over an open connection

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::config::{ConnectionConfig, RemoteCommandOptions};
use crate::error::ExecError;
use crate::session::release;
use crate::sink::OutputSink;
use crate::traits::{CommandRunner, Connection, Connector, ExecEvent, ExecStream};
use crate::verdict::{Verdict, is_meaningful_stderr};

/// Run `command` on `connection` and judge the outcome
///
/// Stdout chunks go to `sink` as they arrive, meaningful stderr chunks are
/// surfaced as error entries. The verdict is decided only when the channel
/// reports close. The connection stays open; releasing it is the caller's job.
///
/// # Errors
/// `Dispatch` if the exec channel cannot be opened, `StdErrPolicy` or
/// `NonZeroExit` per the verdict, `ChannelClosed` if the channel vanishes
/// without a close event
#[instrument(skip(connection, sink, options), level = "debug")]
pub async fn exec_remote(
    command: &str,
    connection: &dyn Connection,
    sink: &dyn OutputSink,
    options: Option<&RemoteCommandOptions>,
) -> Result<(), ExecError> {
    let options = RemoteCommandOptions::resolve(options);

    debug!(command = %command, "dispatching remote command");

    let mut stream = connection.exec(command).await?;
    collect_verdict(command, stream.as_mut(), sink, &options).await
}

/// Open a connection, run `command` on it, and close it again
///
/// # Errors
/// `Connect`/`Authentication` if the connection cannot be made, otherwise as
/// [`exec_remote`]
#[instrument(skip(connector, config, sink, options), fields(host = %config.host))]
pub async fn exec_on_host(
    connector: &dyn Connector,
    config: &ConnectionConfig,
    command: &str,
    sink: &dyn OutputSink,
    options: Option<&RemoteCommandOptions>,
) -> Result<(), ExecError> {
    let connection = connector.connect(config).await?;
    let result = exec_remote(command, connection.as_ref(), sink, options).await;
    release(connection.as_ref()).await;
    result
}

/// Consume an exec stream until close and produce the verdict
///
/// The stderr flag is sticky: once a meaningful chunk is seen it stays set.
///
/// # Errors
/// See [`exec_remote`]
pub async fn collect_verdict(
    command: &str,
    stream: &mut dyn ExecStream,
    sink: &dyn OutputSink,
    options: &RemoteCommandOptions,
) -> Result<(), ExecError> {
    let mut stderr_written = false;

    while let Some(event) = stream.next_event().await {
        match event {
            ExecEvent::Stdout(data) => {
                sink.write_line(&String::from_utf8_lossy(&data));
            }
            ExecEvent::Stderr(data) => {
                let text = String::from_utf8_lossy(&data);
                debug!(stderr = %text, "stderr");
                if is_meaningful_stderr(&text) {
                    stderr_written = true;
                    sink.write_error(&text);
                }
            }
            ExecEvent::Close { code, signal } => {
                debug!(code = ?code, signal = ?signal, "remote command closed");

                let verdict = Verdict::decide(code, stderr_written, options.fail_on_stderr);
                if !verdict.is_success() {
                    warn!(command = %command, verdict = ?verdict, "remote command failed");
                }
                return verdict.into_result(command);
            }
        }
    }

    Err(ExecError::ChannelClosed {
        command: command.to_string(),
    })
}

/// Runs commands on one remote connection
///
/// The runner never closes the connection it was given.
pub struct RemoteRunner {
    connection: Arc<dyn Connection>,
    sink: Arc<dyn OutputSink>,
}

impl RemoteRunner {
    pub fn new(connection: Arc<dyn Connection>, sink: Arc<dyn OutputSink>) -> Self {
        Self { connection, sink }
    }
}

impl std::fmt::Debug for RemoteRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRunner").finish_non_exhaustive()
    }
}

#[async_trait]
impl CommandRunner for RemoteRunner {
    async fn run(
        &self,
        cmd: &str,
        options: Option<&RemoteCommandOptions>,
    ) -> Result<(), ExecError> {
        exec_remote(cmd, self.connection.as_ref(), self.sink.as_ref(), options).await
    }

    fn runner_type(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::sink::{BufferSink, SinkLine};

    async fn verdict_for(
        events: Vec<ExecEvent>,
        options: &RemoteCommandOptions,
    ) -> (Result<(), ExecError>, BufferSink) {
        let (tx, mut rx) = mpsc::channel(events.len().max(1));
        for event in events {
            tx.send(event).await.unwrap();
        }
        drop(tx);

        let sink = BufferSink::new();
        let result = collect_verdict("cmd", &mut rx, &sink, options).await;
        (result, sink)
    }

    fn close(code: Option<u32>) -> ExecEvent {
        ExecEvent::Close { code, signal: None }
    }

    #[tokio::test]
    async fn test_stdout_written_verbatim() {
        let (result, sink) = verdict_for(
            vec![
                ExecEvent::Stdout(b"ok".to_vec()),
                ExecEvent::Stdout(b"two\nlines".to_vec()),
                close(Some(0)),
            ],
            &RemoteCommandOptions::default(),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(sink.stdout(), vec!["ok", "two\nlines"]);
    }

    #[tokio::test]
    async fn test_whitespace_stderr_is_ignored() {
        let (result, sink) = verdict_for(
            vec![
                ExecEvent::Stderr(b"  \n".to_vec()),
                ExecEvent::Stderr(Vec::new()),
                close(Some(0)),
            ],
            &RemoteCommandOptions::default(),
        )
        .await;

        assert!(result.is_ok());
        assert!(sink.errors().is_empty());
    }

    #[tokio::test]
    async fn test_stderr_flag_is_sticky() {
        let (result, sink) = verdict_for(
            vec![
                ExecEvent::Stderr(b"warning: deprecated".to_vec()),
                ExecEvent::Stderr(b" ".to_vec()),
                ExecEvent::Stdout(b"done".to_vec()),
                close(Some(0)),
            ],
            &RemoteCommandOptions::default(),
        )
        .await;

        assert!(matches!(result, Err(ExecError::StdErrPolicy { .. })));
        assert_eq!(
            sink.lines(),
            vec![
                SinkLine::Err("warning: deprecated".to_string()),
                SinkLine::Out("done".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_signal_without_code_succeeds() {
        let (result, _) = verdict_for(
            vec![ExecEvent::Close {
                code: None,
                signal: Some("TERM".to_string()),
            }],
            &RemoteCommandOptions::default(),
        )
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_events_after_close_are_not_read() {
        let (result, sink) = verdict_for(
            vec![close(Some(0)), ExecEvent::Stderr(b"late".to_vec())],
            &RemoteCommandOptions::default(),
        )
        .await;

        assert!(result.is_ok());
        assert!(sink.errors().is_empty());
    }

    #[tokio::test]
    async fn test_stream_end_without_close() {
        let (result, _) = verdict_for(
            vec![ExecEvent::Stdout(b"partial".to_vec())],
            &RemoteCommandOptions::default(),
        )
        .await;

        assert!(matches!(result, Err(ExecError::ChannelClosed { .. })));
    }
}
