//! Stdio transport with LSP header framing.
//!
//! Every message is prefixed with a header block:
//! ```text
//! Content-Length: <length>\r\n
//! \r\n
//! <payload>
//! ```
//! Headers other than `Content-Length` are ignored.

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
};

use super::error::TransportError;

const CONTENT_LENGTH: &str = "content-length";

/// Largest payload accepted from a server.
pub const MAX_FRAME_LENGTH: usize = 64 * 1024 * 1024;

/// Boxed inbound half of a transport.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed outbound half of a transport.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Reads framed messages from the server's output stream.
pub struct FrameReader {
    reader: BufReader<BoxedReader>,
}

impl FrameReader {
    /// Wraps the server's output stream.
    #[must_use]
    pub fn new(reader: BoxedReader) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Reads the next complete message payload.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] at end of stream,
    /// [`TransportError::MissingContentLength`] or
    /// [`TransportError::InvalidHeader`] for malformed headers or a length
    /// above [`MAX_FRAME_LENGTH`], and
    /// [`TransportError::Io`] when reading fails.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        let content_length = self.read_headers().await?;
        let mut payload = vec![0_u8; content_length];
        self.reader.read_exact(&mut payload).await?;
        Ok(payload)
    }

    async fn read_headers(&mut self) -> Result<usize, TransportError> {
        let mut content_length: Option<usize> = None;

        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await? == 0 {
                return Err(TransportError::Closed);
            }

            let header = line.trim();
            if header.is_empty() {
                break;
            }

            if let Some((name, value)) = header.split_once(':')
                && name.trim().eq_ignore_ascii_case(CONTENT_LENGTH)
            {
                let length = value
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|length| *length <= MAX_FRAME_LENGTH)
                    .ok_or_else(|| TransportError::InvalidHeader {
                        line: header.to_owned(),
                    })?;
                content_length = Some(length);
            }
        }

        content_length.ok_or(TransportError::MissingContentLength)
    }
}

/// Writes framed messages to the server's input stream.
pub struct FrameWriter {
    writer: BufWriter<BoxedWriter>,
}

impl FrameWriter {
    /// Wraps the server's input stream.
    #[must_use]
    pub fn new(writer: BoxedWriter) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Writes one framed message and flushes it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if writing fails.
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let header = format!("Content-Length: {}\r\n\r\n", payload.len());
        self.writer.write_all(header.as_bytes()).await?;
        self.writer.write_all(payload).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// The duplex byte stream connecting the session to a server.
pub struct Transport {
    reader: FrameReader,
    writer: FrameWriter,
}

impl Transport {
    /// Builds a transport from the server's output and input streams.
    #[must_use]
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: FrameReader::new(Box::new(reader)),
            writer: FrameWriter::new(Box::new(writer)),
        }
    }

    /// Splits the transport into its halves.
    #[must_use]
    pub fn into_split(self) -> (FrameReader, FrameWriter) {
        (self.reader, self.writer)
    }
}
