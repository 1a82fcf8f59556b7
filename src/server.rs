//! Unix socket server.
//!
//! Every connection is a client channel. The reader loop keeps servicing the channel while an
//! invocation runs in its own task, so a `ReadInputReply` can reach an invocation that is
//! suspended on standard input. Other channels are unaffected by the wait.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::{ExecError, ExecResult};
use crate::exec::Executor;
use crate::marshal::InputSource;
use crate::protocol::{Frame, MessageCode, StatusCode, code_name, read_frame, write_frame};
use crate::store::ensure_parent_dirs;

/// Standard input for one invocation, fed by the channel's reader loop.
pub struct ChannelInput {
    replies: watch::Receiver<Option<Vec<u8>>>,
    outbound: mpsc::Sender<Frame>,
    timeout: Duration,
}

impl ChannelInput {
    pub fn new(
        replies: watch::Receiver<Option<Vec<u8>>>,
        outbound: mpsc::Sender<Frame>,
        timeout: Duration,
    ) -> Self {
        Self {
            replies,
            outbound,
            timeout,
        }
    }
}

impl InputSource for ChannelInput {
    async fn read_input(&mut self) -> ExecResult<Vec<u8>> {
        let latest = self.replies.borrow_and_update().clone();
        if let Some(bytes) = latest {
            return Ok(bytes);
        }

        self.outbound
            .send(Frame::status(StatusCode::ReadInput, Vec::new()))
            .await
            .map_err(|_| ExecError::Disconnected)?;

        loop {
            match tokio::time::timeout(self.timeout, self.replies.changed()).await {
                Err(_) => return Err(ExecError::InputTimeout(self.timeout)),
                Ok(Err(_)) => return Err(ExecError::Disconnected),
                Ok(Ok(())) => {
                    let latest = self.replies.borrow_and_update().clone();
                    if let Some(bytes) = latest {
                        return Ok(bytes);
                    }
                }
            }
        }
    }
}

pub struct Server {
    config: ServerConfig,
    executor: Arc<Executor>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    pub fn new(config: ServerConfig, executor: Arc<Executor>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            executor,
            shutdown_tx,
        }
    }

    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind the socket, replacing a stale socket file.
    pub fn bind(&self) -> Result<UnixListener> {
        let socket_path = &self.config.socket_path;
        if socket_path.exists() {
            std::fs::remove_file(socket_path).with_context(|| {
                format!("failed to remove stale socket {}", socket_path.display())
            })?;
        }
        ensure_parent_dirs(socket_path)?;
        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("failed to bind {}", socket_path.display()))?;
        info!(path = %socket_path.display(), "Server listening");
        Ok(listener)
    }

    /// Accept connections until shutdown is requested.
    pub async fn serve(&self, listener: UnixListener) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            let executor = Arc::clone(&self.executor);
                            let timeout = self.config.input_timeout;
                            tokio::spawn(async move {
                                if let Err(err) = handle_connection(stream, executor, timeout).await {
                                    error!(error = %err, "Connection error");
                                }
                            });
                        }
                        Err(err) => error!(error = %err, "Accept error"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Server shutting down");
                    break;
                }
            }
        }
        remove_socket(&self.config.socket_path);
        Ok(())
    }

    pub async fn run(&self) -> Result<()> {
        let listener = self.bind()?;
        self.serve(listener).await
    }
}

fn remove_socket(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        debug!(error = %err, path = %path.display(), "Socket file not removed");
    }
}

/// Invocation currently running on a channel.
struct Pending {
    input_tx: watch::Sender<Option<Vec<u8>>>,
    task: JoinHandle<()>,
}

fn start_invocation(
    payload: Vec<u8>,
    executor: &Arc<Executor>,
    out_tx: &mpsc::Sender<Frame>,
    input_timeout: Duration,
) -> Pending {
    let (input_tx, input_rx) = watch::channel(None);
    let mut input = ChannelInput::new(input_rx, out_tx.clone(), input_timeout);
    let executor = Arc::clone(executor);
    let out = out_tx.clone();
    let task = tokio::spawn(async move {
        if let Some(response) = executor.execute(&payload, &mut input).await {
            let frame = Frame::status(response.status, response.payload);
            if out.send(frame).await.is_err() {
                debug!("Response dropped; client is gone");
            }
        }
    });
    Pending { input_tx, task }
}

/// Resolves when the running invocation ends; stays pending while the channel is idle.
async fn finished(pending: &mut Option<Pending>) -> std::result::Result<(), JoinError> {
    match pending {
        Some(p) => (&mut p.task).await,
        None => std::future::pending().await,
    }
}

/// Serve one client channel.
///
/// Invocations run one at a time in arrival order; `Arguments` received while one is running
/// wait in a queue.
async fn handle_connection(
    stream: UnixStream,
    executor: Arc<Executor>,
    input_timeout: Duration,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let (out_tx, mut out_rx) = mpsc::channel::<Frame>(16);
    let (in_tx, mut in_rx) = mpsc::channel::<Frame>(16);

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if let Err(err) = write_frame(&mut writer, &frame).await {
                debug!(error = %err, "Failed to write to client");
                break;
            }
        }
    });

    let reader_task = tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        loop {
            match read_frame(&mut reader).await {
                Ok(Some(frame)) => {
                    if in_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("Client disconnected");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "Failed to read from client");
                    break;
                }
            }
        }
    });

    debug!("Client connected");
    let mut queued: VecDeque<Vec<u8>> = VecDeque::new();
    let mut pending: Option<Pending> = None;

    loop {
        if pending.is_none() {
            if let Some(payload) = queued.pop_front() {
                pending = Some(start_invocation(payload, &executor, &out_tx, input_timeout));
            }
        }

        tokio::select! {
            joined = finished(&mut pending), if pending.is_some() => {
                if let Err(err) = joined {
                    error!(error = %err, "Command task failed");
                }
                pending = None;
            }
            frame = in_rx.recv() => {
                let Some(frame) = frame else {
                    break;
                };
                debug!(code = %code_name(frame.code), bytes = frame.payload.len(), "Message received");
                match MessageCode::from_code(frame.code) {
                    Some(MessageCode::Arguments) => {
                        if pending.is_some() {
                            debug!(waiting = queued.len() + 1, "Command queued behind the running one");
                        }
                        queued.push_back(frame.payload);
                    }
                    Some(MessageCode::ReadInputReply) => match &pending {
                        Some(p) => {
                            let _ = p.input_tx.send(Some(frame.payload));
                        }
                        None => warn!("Input reply without a running command; ignored"),
                    },
                    None => {
                        let err = ExecError::IncorrectMessage(frame.code);
                        warn!(error = %err, "Incorrect message code from client");
                    }
                }
            }
        }
    }

    if !queued.is_empty() {
        debug!(dropped = queued.len(), "Queued commands dropped; client is gone");
    }
    // Dropping the input sender wakes a suspended invocation with `Disconnected`.
    if let Some(Pending { input_tx, task }) = pending.take() {
        drop(input_tx);
        if let Err(err) = task.await {
            error!(error = %err, "Command task failed");
        }
    }
    drop(out_tx);
    let _ = writer_task.await;
    let _ = reader_task.await;
    Ok(())
}
