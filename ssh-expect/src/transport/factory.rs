//! Pluggable stream openers for the SSH transport.

use std::io;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// A byte stream the SSH protocol can run over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> AsyncStream for T {}

/// Boxed stream handed to the transport.
pub type BoxedStream = Box<dyn AsyncStream>;

/// Opens the raw stream a new SSH connection runs over.
///
/// Implement this to reach a host through something other than a direct TCP
/// connection, such as a SOCKS proxy or a local jump process.
pub trait ConnectionFactory: Send + Sync {
    /// Open a stream to `host:port`.
    fn open<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, io::Result<BoxedStream>>;
}

/// Plain TCP connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpFactory;

impl ConnectionFactory for TcpFactory {
    fn open<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, io::Result<BoxedStream>> {
        async move {
            let stream = TcpStream::connect((host, port)).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream) as BoxedStream)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct DuplexFactory(std::sync::Mutex<Option<tokio::io::DuplexStream>>);

    impl ConnectionFactory for DuplexFactory {
        fn open<'a>(&'a self, _host: &'a str, _port: u16) -> BoxFuture<'a, io::Result<BoxedStream>> {
            async move {
                let stream = self
                    .0
                    .lock()
                    .unwrap()
                    .take()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "already used"))?;
                Ok(Box::new(stream) as BoxedStream)
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_custom_factory_hands_out_stream_once() {
        let (local, mut remote) = tokio::io::duplex(64);
        let factory = DuplexFactory(std::sync::Mutex::new(Some(local)));

        let mut stream = factory.open("ignored", 22).await.unwrap();
        stream.write_all(b"SSH-2.0-test\r\n").await.unwrap();
        let mut buf = [0u8; 14];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"SSH-2.0-test\r\n");

        assert!(factory.open("ignored", 22).await.is_err());
    }

    #[tokio::test]
    async fn test_tcp_factory_reports_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(TcpFactory.open("127.0.0.1", port).await.is_err());
    }
}
