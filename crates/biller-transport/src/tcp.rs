//! Newline-framed TCP transport.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, MAX_LINE_LEN, Transport, TransportError};

/// A TCP [`Transport`] that listens for zone connections.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        if let Ok(local) = listener.local_addr() {
            tracing::info!(%local, "TCP transport listening");
        }
        Ok(Self { listener })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        // Replies are single short lines; don't let Nagle hold them back.
        let _ = stream.set_nodelay(true);

        let id = ConnectionId::next();
        tracing::debug!(%id, %peer, "accepted TCP connection");

        let (read_half, write_half) = stream.into_split();
        Ok(TcpConnection {
            id,
            peer,
            reader: Mutex::new(BufReader::new(read_half)),
            writer: Mutex::new(write_half),
        })
    }
}

/// A single zone connection.
///
/// The read and write halves sit behind separate locks so a reader task can
/// wait for the next line while replies are being written.
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
}

impl TcpConnection {
    /// Returns the remote address of the zone.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, line: &[u8]) -> Result<(), Self::Error> {
        let mut frame = Vec::with_capacity(line.len() + 1);
        frame.extend_from_slice(line);
        frame.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&frame)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut reader = self.reader.lock().await;
        let mut line = Vec::new();

        // Room for the terminator and an optional carriage return.
        let limit = (MAX_LINE_LEN + 2) as u64;
        let n = (&mut *reader)
            .take(limit)
            .read_until(b'\n', &mut line)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 {
            return Ok(None);
        }

        let terminated = line.last() == Some(&b'\n');
        if terminated {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }

        if line.len() > MAX_LINE_LEN || (!terminated && n as u64 == limit) {
            return Err(TransportError::LineTooLong { max: MAX_LINE_LEN });
        }

        Ok(Some(line))
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
