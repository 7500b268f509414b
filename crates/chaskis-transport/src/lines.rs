//! Line framing over a split byte stream.
//!
//! Incoming bytes are cut at `\n`, a trailing `\r` is stripped and invalid
//! UTF-8 is replaced rather than rejected. Outgoing lines get `\r\n`
//! appended and must not contain a line break themselves.

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf,
    WriteHalf,
};
use tracing::{trace, warn};

use chaskis_core::format::redact;
use chaskis_core::{TransportError, TransportResult};

/// Longest line accepted from the server, terminator included.
///
/// IRC limits lines to 512 bytes; tags and lenient servers push this
/// further, so allow some headroom before discarding.
pub const MAX_LINE_LENGTH: usize = 8192;

/// Object-safe alias for any duplex byte stream.
pub trait IrcStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> IrcStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// A type-erased duplex stream (plain TCP, TLS, or an in-memory mock).
pub type BoxedStream = Box<dyn IrcStream>;

/// Splits a stream into its line reader and line writer.
pub fn split_lines(stream: BoxedStream, peer: impl Into<String>) -> (LineReader, LineWriter) {
    let peer = peer.into();
    let (reader, writer) = tokio::io::split(stream);
    (
        LineReader {
            inner: BufReader::new(reader),
            buf: Vec::new(),
            discarding: false,
            peer: peer.clone(),
        },
        LineWriter {
            inner: Some(writer),
            peer,
        },
    )
}

// =============================================================================
// LineReader
// =============================================================================

/// Reading half of a transport.
pub struct LineReader {
    inner: BufReader<ReadHalf<BoxedStream>>,
    buf: Vec<u8>,
    discarding: bool,
    peer: String,
}

impl LineReader {
    /// Returns the peer address this reader is attached to.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Reads the next non-empty line.
    ///
    /// Returns `Ok(None)` when the peer closes the connection. Partially
    /// read data is kept across calls, so the returned future can be dropped
    /// in a `select!` without losing bytes.
    pub async fn read_line(&mut self) -> TransportResult<Option<String>> {
        loop {
            let budget = MAX_LINE_LENGTH.saturating_sub(self.buf.len()).max(1) as u64;
            let read = (&mut self.inner)
                .take(budget)
                .read_until(b'\n', &mut self.buf)
                .await?;

            let terminated = self.buf.last() == Some(&b'\n');

            if read == 0 && !terminated {
                // EOF. Flush a final unterminated line, if any.
                if self.buf.is_empty() || self.discarding {
                    self.buf.clear();
                    self.discarding = false;
                    return Ok(None);
                }
                let line = take_line(&mut self.buf);
                if line.trim().is_empty() {
                    return Ok(None);
                }
                return Ok(Some(line));
            }

            if !terminated {
                if self.buf.len() >= MAX_LINE_LENGTH {
                    if !self.discarding {
                        warn!(peer = %self.peer, limit = MAX_LINE_LENGTH, "Discarding over-long line");
                    }
                    self.discarding = true;
                    self.buf.clear();
                }
                continue;
            }

            if self.discarding {
                self.discarding = false;
                self.buf.clear();
                continue;
            }

            let line = take_line(&mut self.buf);
            if line.trim().is_empty() {
                continue;
            }

            trace!(peer = %self.peer, line = %redact(&line), "<<");
            return Ok(Some(line));
        }
    }
}

fn take_line(buf: &mut Vec<u8>) -> String {
    let mut end = buf.len();
    while end > 0 && matches!(buf[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    let line = String::from_utf8_lossy(&buf[..end]).into_owned();
    buf.clear();
    line
}

// =============================================================================
// LineWriter
// =============================================================================

/// Writing half of a transport.
pub struct LineWriter {
    inner: Option<WriteHalf<BoxedStream>>,
    peer: String,
}

impl LineWriter {
    /// Returns the peer address this writer is attached to.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Writes one line followed by `\r\n` and flushes it.
    pub async fn write_line(&mut self, line: &str) -> TransportResult<()> {
        if line.contains(['\r', '\n']) {
            return Err(TransportError::InvalidLine(redact(line)));
        }

        let writer = self.inner.as_mut().ok_or(TransportError::Shutdown)?;

        let mut frame = Vec::with_capacity(line.len() + 2);
        frame.extend_from_slice(line.as_bytes());
        frame.extend_from_slice(b"\r\n");

        writer.write_all(&frame).await?;
        writer.flush().await?;

        trace!(peer = %self.peer, line = %redact(line), ">>");
        Ok(())
    }

    /// Shuts down the write side. Calling this more than once is a no-op.
    pub async fn shutdown(&mut self) -> TransportResult<()> {
        if let Some(mut writer) = self.inner.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.is_none()
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    fn reader_over(mock: tokio_test::io::Mock) -> LineReader {
        split_lines(Box::new(mock), "mock").0
    }

    #[tokio::test]
    async fn reads_crlf_and_lf_lines() {
        let mock = Builder::new()
            .read(b"PING :a\r\n:srv 001 bot :hi\n")
            .build();
        let mut reader = reader_over(mock);

        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("PING :a"));
        assert_eq!(
            reader.read_line().await.unwrap().as_deref(),
            Some(":srv 001 bot :hi")
        );
        assert_eq!(reader.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn reassembles_lines_split_across_reads() {
        let mock = Builder::new()
            .read(b"PRIVMSG #c")
            .read(b"han :hel")
            .read(b"lo\r\n")
            .build();
        let mut reader = reader_over(mock);

        assert_eq!(
            reader.read_line().await.unwrap().as_deref(),
            Some("PRIVMSG #chan :hello")
        );
    }

    #[tokio::test]
    async fn skips_blank_lines() {
        let mock = Builder::new().read(b"\r\n\r\nPING :x\r\n").build();
        let mut reader = reader_over(mock);

        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("PING :x"));
    }

    #[tokio::test]
    async fn replaces_invalid_utf8() {
        let mock = Builder::new().read(b"PRIVMSG #c :\xff\xfe ok\r\n").build();
        let mut reader = reader_over(mock);

        let line = reader.read_line().await.unwrap().unwrap();
        assert!(line.starts_with("PRIVMSG #c :"));
        assert!(line.ends_with(" ok"));
    }

    #[tokio::test]
    async fn discards_over_long_lines() {
        let mut long = vec![b'a'; MAX_LINE_LENGTH + 100];
        long.extend_from_slice(b"\r\nPING :after\r\n");
        let mock = Builder::new().read(&long).build();
        let mut reader = reader_over(mock);

        assert_eq!(
            reader.read_line().await.unwrap().as_deref(),
            Some("PING :after")
        );
    }

    #[tokio::test]
    async fn returns_final_unterminated_line_at_eof() {
        let mock = Builder::new().read(b"ERROR :Closing link").build();
        let mut reader = reader_over(mock);

        assert_eq!(
            reader.read_line().await.unwrap().as_deref(),
            Some("ERROR :Closing link")
        );
        assert_eq!(reader.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn writes_crlf_terminated_lines() {
        let mock = Builder::new().write(b"NICK bot\r\n").build();
        let (_reader, mut writer) = split_lines(Box::new(mock), "mock");

        writer.write_line("NICK bot").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_embedded_line_breaks() {
        let mock = Builder::new().build();
        let (_reader, mut writer) = split_lines(Box::new(mock), "mock");

        let err = writer.write_line("PRIVMSG #c :a\r\nQUIT").await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidLine(_)));
    }

    #[tokio::test]
    async fn write_after_shutdown_fails() {
        let mock = Builder::new().build();
        let (_reader, mut writer) = split_lines(Box::new(mock), "mock");

        writer.shutdown().await.unwrap();
        writer.shutdown().await.unwrap();
        assert!(writer.is_shut_down());
        assert_eq!(
            writer.write_line("PING x").await.unwrap_err(),
            TransportError::Shutdown
        );
    }
}
