// Byte-stream framing for the serial link
//
// Frame format: [0xFF, 0xFF, Length, Body..., Checksum]
// Checksum is the inverted low byte of Length + sum(Body).

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Packet header bytes
pub const HEADER: [u8; 2] = [0xFF, 0xFF];

/// Largest body accepted; the longest request (Create) is 8 bytes
pub const MAX_BODY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("body of {0} bytes does not fit a frame (1..={max})", max = MAX_BODY_LEN)]
    BodyTooLong(usize),

    #[error("invalid frame length {0}")]
    InvalidLength(u8),

    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Timeout waiting for a frame")]
    Timeout,
}

/// Checksum over the length byte and body
pub fn checksum(length: u8, body: &[u8]) -> u8 {
    let sum = body
        .iter()
        .fold(length as u32, |acc, &b| acc + b as u32);
    !(sum as u8)
}

/// Wrap a body in header, length and checksum
pub fn encode_frame(body: &[u8]) -> Result<Vec<u8>, FrameError> {
    if body.is_empty() || body.len() > MAX_BODY_LEN {
        return Err(FrameError::BodyTooLong(body.len()));
    }
    let length = body.len() as u8;
    let mut frame = Vec::with_capacity(HEADER.len() + 2 + body.len());
    frame.extend_from_slice(&HEADER);
    frame.push(length);
    frame.extend_from_slice(body);
    frame.push(checksum(length, body));
    Ok(frame)
}

/// Incremental frame parser. Garbage and corrupt frames are skipped one byte
/// at a time until a valid header lines up again.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes waiting for the rest of a frame
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Next complete frame body, an error for a corrupt one, or `None` if more
    /// bytes are needed
    pub fn next_frame(&mut self) -> Option<Result<Vec<u8>, FrameError>> {
        // Skip to the first header candidate
        let start = self
            .buf
            .windows(2)
            .position(|w| w == HEADER)
            .unwrap_or_else(|| self.buf.len().saturating_sub(1));
        if start > 0 {
            debug!("Discarding {} bytes before frame header", start);
            self.buf.drain(..start);
        }
        if self.buf.len() < 3 || self.buf[..2] != HEADER {
            return None;
        }

        let length = self.buf[2];
        if length == 0 || length as usize > MAX_BODY_LEN {
            self.buf.drain(..1);
            return Some(Err(FrameError::InvalidLength(length)));
        }

        let total = HEADER.len() + 1 + length as usize + 1;
        if self.buf.len() < total {
            return None;
        }

        let body = &self.buf[3..3 + length as usize];
        let expected = checksum(length, body);
        let actual = self.buf[total - 1];
        if expected != actual {
            self.buf.drain(..1);
            return Some(Err(FrameError::ChecksumMismatch { expected, actual }));
        }

        let body = body.to_vec();
        self.buf.drain(..total);
        Some(Ok(body))
    }
}

/// A duplex byte stream that can report how much is ready to read
pub trait ByteChannel: Read + Write {
    fn bytes_available(&mut self) -> io::Result<usize>;
}

impl ByteChannel for Box<dyn SerialPort> {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.bytes_to_read()? as usize)
    }
}

/// Framed link over a serial port (or any `ByteChannel`)
pub struct SerialLink<C: ByteChannel = Box<dyn SerialPort>> {
    channel: C,
    decoder: FrameDecoder,
}

impl SerialLink {
    /// Open a serial port with the default read timeout
    pub fn open(port_name: &str, baudrate: u32) -> Result<Self, LinkError> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS))
            .open()?;
        Ok(Self::new(port))
    }
}

impl<C: ByteChannel> SerialLink<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            decoder: FrameDecoder::new(),
        }
    }

    /// Move whatever bytes are ready into the decoder without blocking
    pub fn poll(&mut self) -> Result<usize, LinkError> {
        let available = self.channel.bytes_available()?;
        if available == 0 {
            return Ok(0);
        }
        let mut chunk = vec![0u8; available];
        let n = self.channel.read(&mut chunk)?;
        self.decoder.push(&chunk[..n]);
        Ok(n)
    }

    /// Next decoded frame body, skipping (and logging) corrupt frames
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.decoder.next_frame()? {
                Ok(body) => return Some(body),
                Err(e) => warn!("Dropping corrupt frame: {}", e),
            }
        }
    }

    /// Frame and write one body
    pub fn send(&mut self, body: &[u8]) -> Result<(), LinkError> {
        let frame = encode_frame(body)?;
        self.channel.write_all(&frame)?;
        self.channel.flush()?;
        Ok(())
    }

    /// Block until a full frame arrives or `timeout` passes
    pub fn recv(&mut self, timeout: Duration) -> Result<Vec<u8>, LinkError> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 64];
        loop {
            if let Some(body) = self.next_frame() {
                return Ok(body);
            }
            if Instant::now() >= deadline {
                return Err(LinkError::Timeout);
            }
            match self.channel.read(&mut chunk) {
                Ok(n) => self.decoder.push(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => return Err(LinkError::Io(e)),
            }
        }
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }
}
