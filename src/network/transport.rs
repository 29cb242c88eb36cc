// src/network/transport.rs
// Stream plumbing: boxed duplex halves and the TCP dial helper.

use crate::events::model::LogLevel;
use crate::network::events::emit_transport_event;
use std::io;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;

/// Buffered read half of a connection stream.
pub type BoxedReader = Box<dyn AsyncBufRead + Unpin + Send>;
/// Write half of a connection stream.
pub type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Split any duplex transport into the boxed halves a connection consumes.
/// Used for accepted sockets and for in-memory streams in tests.
pub fn split_stream<S>(stream: S) -> (BoxedReader, BoxedWriter)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    (Box::new(BufReader::new(read_half)), Box::new(write_half))
}

/// Dial a TCP endpoint and hand back boxed halves.
pub async fn dial(address: &str) -> io::Result<(BoxedReader, BoxedWriter)> {
    emit_transport_event(
        "transport",
        LogLevel::Info,
        "dial_start",
        None,
        Some(format!("addr={}", address)),
    );
    let stream = TcpStream::connect(address).await?;
    let remote = stream.peer_addr()?;
    let local = stream.local_addr()?;
    emit_transport_event(
        "transport",
        LogLevel::Info,
        "tcp_connected",
        None,
        Some(format!("local={} remote={}", local, remote)),
    );
    let (read_half, write_half) = stream.into_split();
    Ok((Box::new(BufReader::new(read_half)), Box::new(write_half)))
}
