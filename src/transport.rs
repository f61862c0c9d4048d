use crate::cql::codec::{Frame, FrameCodec, Request};
use crate::error::{CqlError, Result};
use futures::sink::SinkExt;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_stream::StreamExt;
use tokio_util::codec::Framed;

pub(crate) trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

/// One byte-stream connection to a node, framed with the CQL codec. A fresh
/// transport still needs the STARTUP handshake; a transport checked out of
/// the persistent registry does not.
pub struct Transport {
    framed: Framed<Box<dyn Io>, FrameCodec>,
    fresh: bool,
    persistent: bool,
    key: String,
}

impl Transport {
    /// Opens a TCP connection under the connect timeout.
    pub(crate) async fn open(
        host: &str,
        port: u16,
        timeout: Duration,
        persistent: bool,
    ) -> Result<Transport> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| CqlError::Timeout(timeout))??;

        tracing::debug!(host, port, persistent, "connected");

        Ok(Transport {
            framed: Framed::new(Box::new(stream), FrameCodec::new()),
            fresh: true,
            persistent,
            key: format!("{host}:{port}"),
        })
    }

    /// Wraps an already-open byte stream; used by tests to script the peer.
    #[cfg(test)]
    pub(crate) fn from_stream<S: Io + 'static>(stream: S) -> Transport {
        Transport {
            framed: Framed::new(Box::new(stream), FrameCodec::new()),
            fresh: true,
            persistent: false,
            key: String::new(),
        }
    }

    /// As `from_stream`, but eligible for the persistent registry.
    #[cfg(test)]
    pub(crate) fn from_stream_persistent<S: Io + 'static>(stream: S, key: &str) -> Transport {
        Transport {
            framed: Framed::new(Box::new(stream), FrameCodec::new()),
            fresh: true,
            persistent: true,
            key: key.to_string(),
        }
    }

    pub(crate) fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub(crate) fn mark_established(&mut self) {
        self.fresh = false;
    }

    pub(crate) fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub(crate) async fn send(&mut self, request: Request) -> Result<()> {
        self.framed.send(request).await
    }

    /// Reads exactly one frame. A timeout, EOF or short read is fatal to the
    /// connection; there is no partial-frame recovery.
    pub(crate) async fn recv(&mut self, timeout: Duration) -> Result<Frame> {
        match tokio::time::timeout(timeout, self.framed.next()).await {
            Err(_) => Err(CqlError::Timeout(timeout)),
            Ok(None) => Err(CqlError::Closed),
            Ok(Some(frame)) => frame,
        }
    }
}

fn registry() -> &'static Mutex<HashMap<String, Transport>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Transport>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Takes a parked persistent transport for `host:port` out of the registry,
/// if a previous session left one behind.
pub(crate) fn checkout(host: &str, port: u16) -> Option<Transport> {
    let key = format!("{host}:{port}");
    let transport = registry().lock().ok()?.remove(&key);
    if transport.is_some() {
        tracing::debug!(%key, "reusing persistent transport");
    }
    transport
}

/// Parks a persistent transport for reuse by a future session. Serial reuse
/// only: a parked transport has no owner until checked out again.
pub(crate) fn park(transport: Transport) {
    if let Ok(mut registry) = registry().lock() {
        tracing::debug!(key = %transport.key, "parking persistent transport");
        registry.insert(transport.key.clone(), transport);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cql::opcode::Opcode;
    use bytes::Bytes;

    #[tokio::test]
    async fn recv_times_out() {
        let (client, _server) = tokio::io::duplex(64);
        let mut transport = Transport::from_stream(client);
        let err = transport.recv(Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, CqlError::Timeout(_)));
    }

    #[tokio::test]
    async fn short_read_is_fatal() {
        // Five header bytes then EOF: never a frame, always an error.
        let mock = tokio_test::io::Builder::new()
            .read(&[0x84, 0x00, 0x00, 0x00, 0x02])
            .build();
        let mut transport = Transport::from_stream(mock);
        let err = transport.recv(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, CqlError::Closed | CqlError::Io(_)));
    }

    #[tokio::test]
    async fn truncated_body_is_fatal() {
        // Header declares 4 body bytes but only 2 arrive before EOF.
        let mock = tokio_test::io::Builder::new()
            .read(&[0x84, 0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x04])
            .read(&[0x00, 0x01])
            .build();
        let mut transport = Transport::from_stream(mock);
        let err = transport.recv(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, CqlError::Closed | CqlError::Io(_)));
    }

    #[tokio::test]
    async fn sends_and_receives_frames() {
        let (client, server) = tokio::io::duplex(1024);
        let mut client = Transport::from_stream(client);
        let mut server = Transport::from_stream(server);

        client
            .send(Request::new(Opcode::Options, Bytes::new()))
            .await
            .unwrap();
        let frame = server.recv(Duration::from_secs(1)).await.unwrap();
        assert_eq!(frame.opcode, Opcode::Options);

        server
            .send(Request::response(Opcode::Ready, Bytes::new()))
            .await
            .unwrap();
        let frame = client.recv(Duration::from_secs(1)).await.unwrap();
        assert_eq!(frame.opcode, Opcode::Ready);
    }
}
