//! Newline-delimited JSON framing over a Unix domain socket (POSIX) or TCP (fallback).
//!
//! A dedicated task owns the read half and pushes decoded frames onto a bounded channel;
//! [`Connection::poll`] pulls with a short timeout so the turn loop stays responsive to
//! cancellation instead of blocking on a potentially-silent server.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{Config, Endpoint};
use crate::error::{Error, ProtocolError};
use crate::protocol::{ClientCommand, ServerMessage};

const CHANNEL_CAPACITY: usize = 64;
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The result of one [`Connection::poll`] call.
pub(crate) enum Frame {
    Message(ServerMessage),
    Error(ProtocolError),
    /// Nothing arrived within the poll interval; the caller should poll again.
    Timeout,
    /// The receive task ended: transport closed or faulted.
    Closed,
}

pub(crate) struct Connection {
    writer: Box<dyn AsyncWrite + Unpin + Send>,
    frames: mpsc::Receiver<Result<ServerMessage, ProtocolError>>,
    _receiver_task: JoinHandle<()>,
}

impl Connection {
    pub(crate) async fn open(config: &Config) -> Result<Self, Error> {
        let (reader, writer): (
            Box<dyn AsyncRead + Unpin + Send>,
            Box<dyn AsyncWrite + Unpin + Send>,
        ) = match &config.endpoint {
            #[cfg(unix)]
            Endpoint::UnixSocket(path) => {
                let stream = tokio::net::UnixStream::connect(path).await?;
                let (r, w) = tokio::io::split(stream);
                (Box::new(r), Box::new(w))
            }
            Endpoint::Tcp(addr) => {
                let stream = tokio::net::TcpStream::connect(addr).await?;
                let (r, w) = tokio::io::split(stream);
                (Box::new(r), Box::new(w))
            }
        };

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let receiver_task = tokio::spawn(receive_loop(reader, tx));

        Ok(Self {
            writer,
            frames: rx,
            _receiver_task: receiver_task,
        })
    }

    pub(crate) async fn send(&mut self, command: &ClientCommand) -> Result<(), Error> {
        let mut line = serde_json::to_string(command).map_err(ProtocolError::from)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub(crate) async fn poll(&mut self) -> Frame {
        match tokio::time::timeout(POLL_INTERVAL, self.frames.recv()).await {
            Ok(Some(Ok(message))) => Frame::Message(message),
            Ok(Some(Err(err))) => Frame::Error(err),
            Ok(None) => Frame::Closed,
            Err(_elapsed) => Frame::Timeout,
        }
    }

    /// Whether another frame is already buffered. The turn loop uses this to coalesce a
    /// run of interleaved opponent-turn updates into a single snapshot rather than
    /// stopping at the first `nextTurn` addressed to us.
    pub(crate) fn has_buffered_frame(&self) -> bool {
        !self.frames.is_empty()
    }
}

async fn receive_loop(
    reader: Box<dyn AsyncRead + Unpin + Send>,
    tx: mpsc::Sender<Result<ServerMessage, ProtocolError>>,
) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::debug!("transport closed");
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "transport read error, closing receive task");
                return;
            }
        };
        let parsed = serde_json::from_str::<ServerMessage>(&line).map_err(ProtocolError::from);
        if tx.send(parsed).await.is_err() {
            return;
        }
    }
}
