use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tracing::trace;

use crate::config::Config;
use crate::connection::Role;
use crate::error::{Error, Result};
use crate::protocol::{Frame, FrameHeader, FrameValidator};
use crate::transport::{FrameRead, FrameTransport, FrameWrite};

/// Minimum spare capacity reserved before each socket read.
const READ_CHUNK: usize = 4096;

/// Seed for the mask generator. Falls back to the clock if the OS source
/// is unavailable.
fn random_mask_seed() -> u32 {
    let mut buf = [0u8; 4];
    if getrandom::getrandom(&mut buf).is_ok() {
        u32::from_le_bytes(buf)
    } else {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() ^ (d.as_secs() as u32))
            .unwrap_or(0x1234_5678)
    }
}

/// An upgraded byte stream speaking RFC 6455 frames.
pub struct WebSocketCodec<T> {
    io: T,
    config: Config,
}

impl<T> WebSocketCodec<T> {
    /// Wrap a stream on which the opening handshake has completed.
    ///
    /// The role, limits and buffer sizes are taken from `config`.
    #[must_use]
    pub fn new(io: T, config: Config) -> Self {
        Self { io, config }
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.config.role
    }

    #[must_use]
    pub fn into_inner(self) -> T {
        self.io
    }
}

impl<T> FrameTransport for WebSocketCodec<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    type Reader = CodecReader<ReadHalf<T>>;
    type Writer = CodecWriter<WriteHalf<T>>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (read_half, write_half) = tokio::io::split(self.io);
        (
            CodecReader::new(read_half, &self.config),
            CodecWriter::new(write_half, &self.config),
        )
    }
}

/// Decodes frames from the read side of a stream.
pub struct CodecReader<R> {
    io: R,
    read_buf: BytesMut,
    validator: FrameValidator,
    header: Option<FrameHeader>,
}

impl<R> CodecReader<R> {
    #[must_use]
    pub fn new(io: R, config: &Config) -> Self {
        let validator = FrameValidator::new(config.role, config.limits.clone())
            .with_accept_unmasked(config.accept_unmasked_frames);
        Self {
            io,
            read_buf: BytesMut::with_capacity(config.read_buffer_size),
            validator,
            header: None,
        }
    }

    /// Try to take one complete frame out of the buffer.
    ///
    /// The header is validated as soon as it is available, before the
    /// payload is waited for, so an oversized frame is rejected without
    /// buffering it.
    fn decode(&mut self) -> Result<Option<Frame>> {
        let header = match self.header {
            Some(header) => header,
            None => match FrameHeader::parse(&self.read_buf) {
                Ok(header) => {
                    self.validator.validate(&header)?;
                    self.header = Some(header);
                    header
                }
                Err(Error::IncompleteFrame { .. }) => return Ok(None),
                Err(err) => return Err(err),
            },
        };

        match Frame::from_header(&header, &self.read_buf) {
            Ok((frame, consumed)) => {
                self.read_buf.advance(consumed);
                self.header = None;
                Ok(Some(frame))
            }
            Err(Error::IncompleteFrame { needed }) => {
                self.read_buf.reserve(needed);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

impl<R> FrameRead for CodecReader<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.decode()? {
                trace!(opcode = %frame.opcode, len = frame.payload().len(), fin = frame.fin, "frame read");
                return Ok(frame);
            }

            self.read_buf.reserve(READ_CHUNK);
            let n = self.io.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(Error::io(
                    std::io::ErrorKind::UnexpectedEof,
                    "transport closed without a close frame",
                ));
            }
        }
    }
}

/// Encodes frames onto the write side of a stream.
///
/// Frames accumulate in a buffer and reach the stream on [`flush`] or when
/// the buffer grows past the configured write buffer size.
///
/// [`flush`]: FrameWrite::flush
pub struct CodecWriter<W> {
    io: W,
    write_buf: BytesMut,
    high_water: usize,
    role: Role,
    mask_counter: u32,
}

impl<W> CodecWriter<W> {
    #[must_use]
    pub fn new(io: W, config: &Config) -> Self {
        Self {
            io,
            write_buf: BytesMut::with_capacity(config.write_buffer_size),
            high_water: config.write_buffer_size,
            role: config.role,
            mask_counter: random_mask_seed(),
        }
    }

    /// Bytes encoded but not yet handed to the stream.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.write_buf.len()
    }

    fn next_mask(&mut self) -> [u8; 4] {
        self.mask_counter = self.mask_counter.wrapping_add(0x9E37_79B9);
        let mut x = self.mask_counter;
        x = (x ^ (x >> 16)).wrapping_mul(0x85EB_CA6B);
        x = (x ^ (x >> 13)).wrapping_mul(0xC2B2_AE35);
        (x ^ (x >> 16)).to_le_bytes()
    }
}

impl<W> CodecWriter<W>
where
    W: AsyncWrite + Unpin,
{
    async fn write_out(&mut self) -> Result<()> {
        if !self.write_buf.is_empty() {
            self.io.write_all(&self.write_buf).await?;
            self.write_buf.clear();
        }
        Ok(())
    }
}

impl<W> FrameWrite for CodecWriter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let mask = self.role.must_mask().then(|| self.next_mask());
        frame.encode(&mut self.write_buf, mask);
        if self.write_buf.len() >= self.high_water {
            self.write_out().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.write_out().await?;
        self.io.flush().await?;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.write_out().await?;
        self.io.shutdown().await?;
        Ok(())
    }
}
