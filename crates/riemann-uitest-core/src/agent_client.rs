//! Async transport to the accessibility agent.
//!
//! [`AgentClient`] sends [`Request`]s and reads [`Response`]s over any
//! bidirectional async stream using the framing in [`crate::protocol`].
//!
//! # Example
//!
//! ```no_run
//! use std::net::SocketAddr;
//! use riemann_uitest_core::agent_client::AgentClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let addr: SocketAddr = "127.0.0.1:9800".parse()?;
//! let mut client = AgentClient::new(addr);
//! client.connect().await?;
//! client.heartbeat().await?;
//! client.disconnect();
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, debug_span, trace, Instrument};

use crate::protocol::{
    decode_response, encode_request, read_frame_length, ProtocolError, Request, Response,
    MAX_FRAME_LEN,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// A bidirectional async stream usable as an agent transport.
pub trait AgentStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AgentStream for T {}

/// Errors that can occur during agent communication.
#[derive(Error, Debug)]
pub enum AgentClientError {
    #[error("not connected to agent")]
    NotConnected,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The agent answered with an error response.
    #[error("agent error: {0}")]
    AgentError(String),

    #[error("operation timed out")]
    Timeout,
}

/// Async client holding at most one agent connection.
pub struct AgentClient {
    stream: Option<Box<dyn AgentStream>>,
    addr: Option<SocketAddr>,
}

impl AgentClient {
    /// Creates a client for `addr`; nothing is opened until [`connect`](Self::connect).
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            stream: None,
            addr: Some(addr),
        }
    }

    /// Wraps an already-connected stream.
    pub fn from_stream(stream: impl AgentStream + 'static) -> Self {
        Self {
            stream: Some(Box::new(stream)),
            addr: None,
        }
    }

    pub async fn connect(&mut self) -> Result<(), AgentClientError> {
        let addr = self
            .addr
            .ok_or_else(|| AgentClientError::ConnectionFailed("no address configured".into()))?;

        debug!(%addr, "connecting to agent");

        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| AgentClientError::Timeout)?
            .map_err(|e| AgentClientError::ConnectionFailed(e.to_string()))?;

        self.stream = Some(Box::new(stream));
        debug!("connected to agent");
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.stream.take();
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Sends a request and waits for its response.
    ///
    /// A [`Response::Error`] is returned as [`AgentClientError::AgentError`].
    pub async fn send(&mut self, request: &Request) -> Result<Response, AgentClientError> {
        let opcode = request.opcode_name();
        let span = debug_span!("agent_send", opcode);
        async {
            let frame = encode_request(request);
            self.write_frame(&frame).await?;

            let payload = self.read_frame().await?;
            match decode_response(&payload)? {
                Response::Error { message } => Err(AgentClientError::AgentError(message)),
                other => Ok(other),
            }
        }
        .instrument(span)
        .await
    }

    pub async fn heartbeat(&mut self) -> Result<(), AgentClientError> {
        self.send(&Request::Heartbeat).await?;
        Ok(())
    }

    async fn write_frame(&mut self, data: &[u8]) -> Result<(), AgentClientError> {
        let stream = self.stream.as_mut().ok_or(AgentClientError::NotConnected)?;
        trace!(frame_bytes = data.len(), "writing frame");
        let written = async {
            stream.write_all(data).await?;
            stream.flush().await
        }
        .await;
        if let Err(e) = written {
            self.stream.take();
            return Err(AgentClientError::Io(e));
        }
        Ok(())
    }

    /// Reads one response frame and returns its payload without the header.
    ///
    /// The stream is dropped on I/O error, timeout or an oversized length
    /// header so a late reply can never be read as the answer to a later
    /// request.
    async fn read_frame(&mut self) -> Result<Vec<u8>, AgentClientError> {
        let stream = self.stream.as_mut().ok_or(AgentClientError::NotConnected)?;

        let result = timeout(READ_TIMEOUT, async {
            let mut header = [0u8; 4];
            stream.read_exact(&mut header).await?;
            let len = read_frame_length(&header);
            if len > MAX_FRAME_LEN {
                return Err(AgentClientError::Protocol(ProtocolError::FrameTooLarge(
                    len,
                )));
            }

            let mut payload = vec![0u8; len as usize];
            trace!(payload_bytes = len, "reading frame");
            stream.read_exact(&mut payload).await?;

            Ok::<Vec<u8>, AgentClientError>(payload)
        })
        .await;

        match result {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(e)) => {
                self.stream.take();
                Err(e)
            }
            Err(_) => {
                self.stream.take();
                Err(AgentClientError::Timeout)
            }
        }
    }
}
