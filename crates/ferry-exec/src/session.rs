//! Connection release

use tracing::{debug, warn};

use crate::error::ExecError;
use crate::traits::Connection;

/// Close `connection`, logging and swallowing any error
///
/// Call on every exit path of an operation that opened a connection. A close
/// failure never changes the operation's outcome.
pub async fn release(connection: &dyn Connection) {
    match connection.close().await {
        Ok(()) => debug!("connection closed"),
        Err(e) => {
            let err = ExecError::Cleanup(e.to_string());
            warn!(error = %err, "ignoring error while closing connection");
        }
    }
}
