//! A socket wrapped for line-oriented talking and listening.

use std::collections::HashSet;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::observability::Logger;

/// Every line on the wire ends with CR + LF, per the HTTP RFCs.
pub const HTTP_CRLF: &str = "\r\n";

/// Shared set of peers with a live server-side connection.
pub(crate) type LiveSet = Arc<Mutex<HashSet<SocketAddr>>>;

/// A connected socket with the small surface a line-based protocol needs:
/// send bytes, send a CRLF-terminated line, read a line, close.
///
/// Server-side connections carry a handle to the server's live set and
/// remove themselves from it on close (or drop, whichever comes first).
/// Client-side connections made via [`Connection::connect`] have no set to
/// maintain.
pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
    live: Option<LiveSet>,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, peer: SocketAddr, live: Option<LiveSet>) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            peer,
            live,
        }
    }

    /// Opens a client connection to a listening server.
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let peer = stream.peer_addr()?;
        Ok(Self::new(stream, peer, None))
    }

    /// The remote end of this connection.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Sends raw text, exactly as given.
    pub async fn send(&mut self, msg: &str) -> io::Result<()> {
        self.writer.write_all(msg.as_bytes()).await?;
        self.writer.flush().await
    }

    /// Sends one line, appending CR + LF.
    pub async fn send_line(&mut self, msg: &str) -> io::Result<()> {
        self.writer.write_all(msg.as_bytes()).await?;
        self.writer.write_all(HTTP_CRLF.as_bytes()).await?;
        self.writer.flush().await
    }

    /// Reads one line, without its trailing newline.
    ///
    /// `Ok(None)` means the peer stopped talking (end of stream), which is a
    /// normal way for a conversation to end, not an error.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).await?;
        if read == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Shuts the socket down and deregisters from the server's live set.
    pub async fn close(mut self) -> io::Result<()> {
        let result = self.writer.shutdown().await;
        self.deregister();
        result
    }

    fn deregister(&mut self) {
        if let Some(live) = self.live.take() {
            let remaining = match live.lock() {
                Ok(mut set) => {
                    set.remove(&self.peer);
                    set.len()
                }
                Err(_) => return,
            };
            Logger::trace(
                "WEB_CONNECTION_CLOSED",
                &[
                    ("peer", &self.peer.to_string()),
                    ("remaining", &remaining.to_string()),
                ],
            );
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.deregister();
    }
}
