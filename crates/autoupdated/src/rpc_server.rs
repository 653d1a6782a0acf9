//! RPC Server - Unix socket server for front-end/daemon communication
//!
//! One JSON-RPC request per line, one response line per request.

use anyhow::{Context, Result};
use autoupdate_common::rpc::{RpcRequest, RpcResponse};
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use crate::rpc_handler::handle_request;
use crate::state::SharedState;

/// JSON-RPC parse error
const PARSE_ERROR: i32 = -32700;

/// Bind `socket_path` and serve until `shutdown` resolves
pub async fn serve(
    state: SharedState,
    socket_path: &Path,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    if let Some(socket_dir) = socket_path.parent() {
        tokio::fs::create_dir_all(socket_dir)
            .await
            .context("Failed to create socket directory")?;
    }

    // Remove stale socket from a previous run
    let _ = tokio::fs::remove_file(socket_path).await;

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind {}", socket_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o660))
            .context("Failed to set socket permissions")?;
    }

    info!("RPC server listening on {}", socket_path.display());

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let state = SharedState::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, state).await {
                            error!("Connection handler error: {:#}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
            _ = &mut shutdown => {
                info!("RPC server shutting down");
                break;
            }
        }
    }

    let _ = tokio::fs::remove_file(socket_path).await;
    Ok(())
}

/// Handle a single client connection
async fn handle_connection(stream: UnixStream, state: SharedState) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .context("Failed to read from socket")?;

        if bytes_read == 0 {
            debug!("Client disconnected");
            break;
        }

        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => handle_request(&state, request).await,
            Err(e) => {
                warn!("Invalid request JSON: {}", e);
                RpcResponse::error(Value::Null, PARSE_ERROR, format!("Parse error: {}", e))
            }
        };

        let response_json = serde_json::to_string(&response)? + "\n";
        writer
            .write_all(response_json.as_bytes())
            .await
            .context("Failed to write response")?;
    }

    Ok(())
}
