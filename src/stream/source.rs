//! Chunk sources
//!
//! Anything that yields the raw MPEG byte stream in pieces of arbitrary,
//! non-zero size. `Ok(None)` marks the end of the stream.

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use socket2::{Domain, Protocol, Socket, Type};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpSocket, TcpStream};

use crate::config::SourceConfig;
use crate::error::StreamError;

/// Producer of stream chunks
pub trait ChunkSource: Send {
    /// Read the next non-empty chunk, or `None` at end of stream
    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Bytes>, StreamError>> + Send;
}

/// Chunks read from any async byte reader
pub struct ReaderChunkSource<R> {
    reader: R,
    buf: BytesMut,
    chunk_size: usize,
}

impl<R: AsyncRead + Unpin + Send> ReaderChunkSource<R> {
    /// Read at most `chunk_size` bytes per chunk
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(chunk_size),
            chunk_size: chunk_size.max(1),
        }
    }
}

impl<R: AsyncRead + Unpin + Send> ChunkSource for ReaderChunkSource<R> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        self.buf.reserve(self.chunk_size);
        let mut limited = (&mut self.reader).take(self.chunk_size as u64);

        let read = limited
            .read_buf(&mut self.buf)
            .await
            .map_err(|e| StreamError::ReadFailed(e.to_string()))?;

        if read == 0 {
            return Ok(None);
        }
        Ok(Some(self.buf.split().freeze()))
    }
}

/// TCP stream source
pub type TcpChunkSource = ReaderChunkSource<TcpStream>;

/// Connect to a streaming server
pub async fn connect_tcp(config: &SourceConfig) -> Result<TcpChunkSource, StreamError> {
    let addr: SocketAddr = config
        .address
        .parse()
        .map_err(|_| StreamError::InvalidAddress(config.address.clone()))?;

    let socket = create_socket(addr, config.recv_buffer_size)
        .map_err(|e| StreamError::ConnectionFailed(e.to_string()))?;

    let stream = socket
        .connect(addr)
        .await
        .map_err(|e| StreamError::ConnectionFailed(format!("{}: {}", addr, e)))?;

    tracing::info!("Connected to stream at {}", addr);
    Ok(ReaderChunkSource::new(stream, config.chunk_size))
}

/// Create a non-blocking TCP socket with the requested receive buffer
fn create_socket(addr: SocketAddr, recv_buffer_size: Option<usize>) -> io::Result<TcpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

    if let Some(size) = recv_buffer_size {
        socket.set_recv_buffer_size(size)?;
        tracing::debug!(
            "Receive buffer requested {} bytes, got {} bytes",
            size,
            socket.recv_buffer_size()?
        );
    }
    socket.set_nodelay(true)?;
    socket.set_keepalive(true)?;
    socket.set_nonblocking(true)?;

    Ok(TcpSocket::from_std_stream(socket.into()))
}

/// Chunks taken from a `futures` stream of byte buffers
pub struct StreamChunkSource<S> {
    stream: S,
}

impl<S> StreamChunkSource<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

impl<S> ChunkSource for StreamChunkSource<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin + Send,
{
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        while let Some(item) = self.stream.next().await {
            let chunk = item.map_err(|e| StreamError::ReadFailed(e.to_string()))?;
            // empty chunks carry nothing
            if !chunk.is_empty() {
                return Ok(Some(chunk));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_stream_source_skips_empty_chunks() {
        let items = vec![
            Ok(Bytes::from_static(&[1, 2, 3])),
            Ok(Bytes::new()),
            Ok(Bytes::from_static(&[4])),
        ];
        let mut source = StreamChunkSource::new(stream::iter(items));

        assert_eq!(source.next_chunk().await.unwrap().unwrap().len(), 3);
        assert_eq!(source.next_chunk().await.unwrap().unwrap()[..], [4]);
        assert!(source.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stream_source_error() {
        let items = vec![Err(io::Error::new(io::ErrorKind::Other, "reset"))];
        let mut source = StreamChunkSource::new(stream::iter(items));

        assert!(matches!(
            source.next_chunk().await,
            Err(StreamError::ReadFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_reader_source_limits_chunk_size() {
        let (mut writer, reader) = tokio::io::duplex(64);
        writer.write_all(&[7u8; 10]).await.unwrap();
        drop(writer);

        let mut source = ReaderChunkSource::new(reader, 4);
        let mut total = 0;
        while let Some(chunk) = source.next_chunk().await.unwrap() {
            assert!(!chunk.is_empty() && chunk.len() <= 4);
            total += chunk.len();
        }
        assert_eq!(total, 10);
    }

    #[tokio::test]
    async fn test_tcp_source_reads_until_close() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            conn.write_all(&[0xAB; 100]).await.unwrap();
        });

        let config = SourceConfig {
            address: addr.to_string(),
            ..Default::default()
        };
        let mut source = connect_tcp(&config).await.unwrap();
        let mut total = 0;
        while let Some(chunk) = source.next_chunk().await.unwrap() {
            total += chunk.len();
        }
        assert_eq!(total, 100);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let config = SourceConfig {
            address: "not an address".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            connect_tcp(&config).await,
            Err(StreamError::InvalidAddress(_))
        ));
    }
}
