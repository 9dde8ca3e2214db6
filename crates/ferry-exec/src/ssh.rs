//! SSH transport using russh and russh-sftp

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use russh::keys::{PrivateKeyWithHashAlg, ssh_key};
use russh::{Channel, ChannelMsg, Disconnect, client};
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

use crate::config::{AuthMethod, ConnectionConfig};
use crate::error::ExecError;
use crate::keys::KeySource;
use crate::traits::{Connection, Connector, ExecEvent, ExecStream};

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Connection configs arrive pre-validated; host keys are not pinned here
        Ok(true)
    }
}

/// Opens SSH connections
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

impl SshConnector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for SshConnector {
    #[instrument(skip(self, config), fields(host = %config.host, port = config.port))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Connection>, ExecError> {
        info!(user = %config.username, "connecting to SSH");

        let client_config = client::Config {
            inactivity_timeout: config.options.inactivity_timeout(),
            keepalive_interval: config.options.keepalive_interval(),
            ..Default::default()
        };

        let mut handle = client::connect(
            Arc::new(client_config),
            (config.host.as_str(), config.port),
            SshClientHandler,
        )
        .await
        .map_err(|e| ExecError::Connect(format!("{}: {e}", config.endpoint())))?;

        authenticate(&mut handle, config).await?;

        info!("SSH connected and authenticated");

        Ok(Box::new(SshConnection {
            endpoint: config.endpoint(),
            session: Mutex::new(Some(handle)),
            sftp: Mutex::new(None),
        }))
    }
}

async fn authenticate(
    handle: &mut client::Handle<SshClientHandler>,
    config: &ConnectionConfig,
) -> Result<(), ExecError> {
    let auth_res = if let AuthMethod::Password { password } = &config.auth {
        handle
            .authenticate_password(&config.username, password)
            .await
            .map_err(|e| ExecError::Authentication(e.to_string()))?
    } else {
        let source = KeySource::from_auth(&config.auth)
            .ok_or_else(|| ExecError::Authentication("no key configured".to_string()))?;
        let key_pair = source.resolve()?;

        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        handle
            .authenticate_publickey(
                &config.username,
                PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
            )
            .await
            .map_err(|e| ExecError::Authentication(e.to_string()))?
    };

    if !auth_res.success() {
        return Err(ExecError::Authentication(format!(
            "{} rejected credentials for {}",
            config.endpoint(),
            config.username
        )));
    }

    Ok(())
}

/// Live SSH session
///
/// The SFTP subsystem is opened on first use and shut down by `close`.
pub struct SshConnection {
    endpoint: String,
    session: Mutex<Option<client::Handle<SshClientHandler>>>,
    sftp: Mutex<Option<SftpSession>>,
}

impl std::fmt::Debug for SshConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnection")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl SshConnection {
    async fn open_channel(&self) -> Result<Channel<client::Msg>, String> {
        let session = self.session.lock().await;
        let handle = session.as_ref().ok_or("connection already closed")?;
        handle
            .channel_open_session()
            .await
            .map_err(|e| e.to_string())
    }

    async fn sftp_session(&self) -> Result<MutexGuard<'_, Option<SftpSession>>, ExecError> {
        let mut sftp = self.sftp.lock().await;

        if sftp.is_none() {
            debug!(endpoint = %self.endpoint, "initializing SFTP channel");
            let channel = self.open_channel().await.map_err(ExecError::Io)?;
            channel
                .request_subsystem(true, "sftp")
                .await
                .map_err(|e| ExecError::Io(e.to_string()))?;
            let session = SftpSession::new(channel.into_stream())
                .await
                .map_err(|e| ExecError::Io(e.to_string()))?;
            *sftp = Some(session);
        }

        Ok(sftp)
    }
}

#[async_trait]
impl Connection for SshConnection {
    async fn exec(&self, command: &str) -> Result<Box<dyn ExecStream>, ExecError> {
        let dispatch_err = |reason: String| ExecError::Dispatch {
            command: command.to_string(),
            reason,
        };

        let channel = self.open_channel().await.map_err(dispatch_err)?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| dispatch_err(e.to_string()))?;

        debug!(endpoint = %self.endpoint, command = %command, "command dispatched");

        Ok(Box::new(SshExecStream::new(channel)))
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), ExecError> {
        let contents = tokio::fs::read(local)
            .await
            .map_err(|e| ExecError::Io(format!("{}: {e}", local.display())))?;

        let guard = self.sftp_session().await?;
        let sftp = guard
            .as_ref()
            .ok_or_else(|| ExecError::Io("SFTP session unavailable".to_string()))?;

        let mut file = sftp
            .open_with_flags(
                remote,
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
            )
            .await
            .map_err(|e| ExecError::Io(format!("{remote}: {e}")))?;
        file.write_all(&contents).await?;
        file.flush().await?;
        file.shutdown().await?;

        debug!(bytes = contents.len(), remote = %remote, "uploaded file");
        Ok(())
    }

    async fn read_file(&self, remote: &str) -> Result<Vec<u8>, ExecError> {
        let guard = self.sftp_session().await?;
        let sftp = guard
            .as_ref()
            .ok_or_else(|| ExecError::Io("SFTP session unavailable".to_string()))?;

        let mut file = sftp
            .open_with_flags(remote, OpenFlags::READ)
            .await
            .map_err(|e| ExecError::Io(format!("{remote}: {e}")))?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await?;

        Ok(contents)
    }

    async fn close(&self) -> Result<(), ExecError> {
        if let Some(sftp) = self.sftp.lock().await.take() {
            // peers often reset right after the SFTP session ends
            if let Err(e) = sftp.close().await {
                debug!(error = %e, "ignoring error closing SFTP session");
            }
        }

        if let Some(handle) = self.session.lock().await.take() {
            handle
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| ExecError::Cleanup(e.to_string()))?;
            info!(endpoint = %self.endpoint, "SSH disconnected");
        }

        Ok(())
    }
}

/// What one russh channel message means for the exec stream
#[derive(Debug, PartialEq)]
enum Step {
    Emit(ExecEvent),
    Skip,
    End,
}

/// Exit status and signal seen so far on an exec channel
///
/// Both are held until the channel closes, then reported together as a
/// single `Close`. A channel that vanishes before `Close` ends the stream
/// with no event, so the caller sees a lost channel rather than a verdict.
#[derive(Debug, Default)]
struct ExitState {
    code: Option<u32>,
    signal: Option<String>,
}

impl ExitState {
    fn translate(&mut self, msg: Option<ChannelMsg>) -> Step {
        match msg {
            Some(ChannelMsg::Data { data }) => Step::Emit(ExecEvent::Stdout(data.to_vec())),
            Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                Step::Emit(ExecEvent::Stderr(data.to_vec()))
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                self.code = Some(exit_status);
                Step::Skip
            }
            Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                self.signal = Some(format!("{signal_name:?}"));
                Step::Skip
            }
            // Eof can precede trailing data, only Close ends the exec
            Some(ChannelMsg::Close) => Step::Emit(ExecEvent::Close {
                code: self.code,
                signal: self.signal.take(),
            }),
            Some(_) => Step::Skip,
            None => Step::End,
        }
    }
}

/// Translates russh channel messages into [`ExecEvent`]s
pub struct SshExecStream {
    channel: Channel<client::Msg>,
    state: ExitState,
    closed: bool,
}

impl SshExecStream {
    fn new(channel: Channel<client::Msg>) -> Self {
        Self {
            channel,
            state: ExitState::default(),
            closed: false,
        }
    }
}

#[async_trait]
impl ExecStream for SshExecStream {
    async fn next_event(&mut self) -> Option<ExecEvent> {
        if self.closed {
            return None;
        }

        loop {
            match self.state.translate(self.channel.wait().await) {
                Step::Emit(event) => {
                    if matches!(event, ExecEvent::Close { .. }) {
                        self.closed = true;
                    }
                    return Some(event);
                }
                Step::Skip => {}
                Step::End => {
                    debug!("exec channel ended without close");
                    self.closed = true;
                    return None;
                }
            }
        }
    }
}
