//! Copying files to a remote host

use std::path::Path;

use tracing::{debug, error, info, instrument};

use crate::config::ConnectionConfig;
use crate::error::ExecError;
use crate::session::release;
use crate::sink::OutputSink;
use crate::traits::{Connection, Connector};

/// Upload `local` to `remote` over a dedicated connection
///
/// The uploaded file is read back and written to `sink` for visibility; the
/// content is not compared. The connection is closed whatever happens after
/// it was opened, and a close failure is logged only.
///
/// # Errors
/// `Transfer` wrapping the underlying connect, upload or read-back error
#[instrument(skip(connector, config, sink), fields(host = %config.host))]
pub async fn copy_file(
    connector: &dyn Connector,
    local: &Path,
    remote: &str,
    config: &ConnectionConfig,
    sink: &dyn OutputSink,
) -> Result<(), ExecError> {
    let connection = connector
        .connect(config)
        .await
        .map_err(|e| transfer_failure(&e))?;

    let result = upload_and_read_back(connection.as_ref(), local, remote, sink)
        .await
        .map_err(|e| transfer_failure(&e));

    release(connection.as_ref()).await;

    if result.is_ok() {
        info!(remote = %remote, "copied file to remote machine");
    }
    result
}

async fn upload_and_read_back(
    connection: &dyn Connection,
    local: &Path,
    remote: &str,
    sink: &dyn OutputSink,
) -> Result<(), ExecError> {
    connection.upload(local, remote).await?;
    debug!(src = %local.display(), dest = %remote, "uploaded file");

    let content = connection.read_file(remote).await?;
    sink.write_line(&format!("File content: {}", String::from_utf8_lossy(&content)));

    Ok(())
}

fn transfer_failure(err: &ExecError) -> ExecError {
    error!(error = %err, "remote copy failed");
    ExecError::Transfer(err.to_string())
}
