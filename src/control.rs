//! Control channel
//!
//! External commands reach the supervisor as JSON lines over a localhost TCP
//! socket. Each connection is served on its own task; requests go through the
//! supervisor's mutex, so they are handled one at a time.
//!
//! ```json
//! // Client -> Server
//! {"type": "stop"}
//! {"type": "open"}
//! {"type": "status"}
//! {"type": "spawn", "kind": "terminal"}
//! {"type": "ping"}
//!
//! // Server -> Client
//! {"type": "ack", "result": {"outcome": "stopped", ...}}
//! {"type": "status", "state": "running", "surface": {...}}
//! {"type": "error", "message": "..."}
//! {"type": "pong"}
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};

use crate::error::{HostError, Result};
use crate::session::SessionKind;
use crate::status::StatusSurface;
use crate::supervisor::{Command, CommandOutcome, LifecycleState, Supervisor};

/// Client-to-server message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    Stop,
    Open,
    Status,
    /// Start a new session of `kind`
    Spawn { kind: SessionKind },
    Ping,
}

/// Server-to-client message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlResponse {
    /// Command handled
    Ack { result: serde_json::Value },
    /// Current lifecycle state and status record
    Status {
        state: LifecycleState,
        surface: serde_json::Value,
    },
    /// Request could not be handled
    Error { message: String },
    Pong,
}

impl ControlResponse {
    fn ack(outcome: CommandOutcome) -> Self {
        if let CommandOutcome::Rejected { message } = outcome {
            return ControlResponse::Error { message };
        }
        match serde_json::to_value(outcome) {
            Ok(result) => ControlResponse::Ack { result },
            Err(e) => ControlResponse::Error {
                message: e.to_string(),
            },
        }
    }

    fn status(state: LifecycleState, surface: &StatusSurface) -> Self {
        ControlResponse::Status {
            state,
            surface: serde_json::to_value(surface).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Dispatch one request to the supervisor
pub async fn dispatch(supervisor: &Mutex<Supervisor>, request: ControlRequest) -> ControlResponse {
    match request {
        ControlRequest::Stop => {
            let outcome = supervisor.lock().await.handle_command(Command::Stop).await;
            ControlResponse::ack(outcome)
        }
        ControlRequest::Open => {
            let outcome = supervisor.lock().await.handle_command(Command::Open).await;
            ControlResponse::ack(outcome)
        }
        ControlRequest::Spawn { kind } => {
            let outcome = supervisor
                .lock()
                .await
                .handle_command(Command::Spawn(kind))
                .await;
            ControlResponse::ack(outcome)
        }
        ControlRequest::Status => {
            let supervisor = supervisor.lock().await;
            ControlResponse::status(supervisor.state(), &supervisor.status_snapshot())
        }
        ControlRequest::Ping => ControlResponse::Pong,
    }
}

/// Accept control connections until `shutdown` flips to `true`
pub async fn serve_control(
    listener: TcpListener,
    supervisor: Arc<Mutex<Supervisor>>,
    mut shutdown: watch::Receiver<bool>,
) {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Control channel listening on {}", addr);
    }
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    tracing::debug!("Accepted control connection from {}", addr);
                    let supervisor = Arc::clone(&supervisor);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, supervisor).await {
                            tracing::debug!("Control connection from {} ended: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept control connection: {}", e);
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::debug!("Control channel closing");
                    break;
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, supervisor: Arc<Mutex<Supervisor>>) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<ControlRequest>(line) {
            Ok(request) => dispatch(&supervisor, request).await,
            Err(e) => ControlResponse::Error {
                message: format!("Invalid request: {}", e),
            },
        };
        let mut json = serde_json::to_string(&response).map_err(|e| HostError::Control {
            message: e.to_string(),
        })?;
        json.push('\n');
        write_half.write_all(json.as_bytes()).await?;
    }
    Ok(())
}

/// Send one request to a running service and wait for the reply
pub async fn send_request(addr: SocketAddr, request: &ControlRequest) -> Result<ControlResponse> {
    let stream = TcpStream::connect(addr).await.map_err(|e| HostError::Control {
        message: format!("Failed to connect to {}: {}", addr, e),
    })?;
    let (read_half, mut write_half) = stream.into_split();

    let mut json = serde_json::to_string(request).map_err(|e| HostError::Control {
        message: e.to_string(),
    })?;
    json.push('\n');
    write_half.write_all(json.as_bytes()).await?;

    let mut lines = BufReader::new(read_half).lines();
    let line = lines.next_line().await?.ok_or_else(|| HostError::Control {
        message: "Connection closed before a reply".to_string(),
    })?;
    serde_json::from_str(&line).map_err(|e| HostError::Control {
        message: format!("Invalid reply: {}", e),
    })
}

/// Control address for `port` on the loopback interface
pub fn control_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}
