//! Framing of irc lines on top of [AnyDelimiterCodec]

use bytes::BytesMut;
use thiserror::Error;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, Encoder};

use super::message::Message;

/// Servers send at most 512 bytes per line, but ircv3 tags may add to that.
const MAX_INCOMING_LINE_LEN: usize = 8192;

#[derive(Error, Debug)]
pub enum IrcCodecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line exceeds the maximum length")]
    LineTooLong,
}

impl From<AnyDelimiterCodecError> for IrcCodecError {
    fn from(err: AnyDelimiterCodecError) -> Self {
        match err {
            AnyDelimiterCodecError::MaxChunkLengthExceeded => IrcCodecError::LineTooLong,
            AnyDelimiterCodecError::Io(err) => IrcCodecError::Io(err),
        }
    }
}

/// Decodes lines into [Message]s and encodes [Message]s as CRLF-terminated lines.
///
/// Lines are split on raw bytes. Irc doesn't mandate an encoding, so invalid
/// UTF-8 is replaced instead of failing the connection.
#[derive(Debug)]
pub struct IrcCodec {
    lines: AnyDelimiterCodec,
}

impl IrcCodec {
    pub fn new() -> Self {
        Self {
            lines: AnyDelimiterCodec::new_with_max_length(
                b"\n".to_vec(),
                b"\r\n".to_vec(),
                MAX_INCOMING_LINE_LEN,
            ),
        }
    }
}

impl Default for IrcCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for IrcCodec {
    type Item = Message;
    type Error = IrcCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(line) = self.lines.decode(buf)? {
            if let Some(message) = parse_line(&line) {
                return Ok(Some(message));
            }
        }

        Ok(None)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(line) = self.lines.decode_eof(buf)? {
            if let Some(message) = parse_line(&line) {
                return Ok(Some(message));
            }
        }

        Ok(None)
    }
}

/// Blank and malformed lines are dropped instead of failing the whole stream.
fn parse_line(raw: &[u8]) -> Option<Message> {
    let line = String::from_utf8_lossy(raw);

    if line.trim().is_empty() {
        return None;
    }

    match line.parse() {
        Ok(message) => Some(message),
        Err(err) => {
            tracing::debug!(line = %line, "ignoring malformed irc line: {err}");
            None
        }
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = IrcCodecError;

    fn encode(&mut self, message: Message, buf: &mut BytesMut) -> Result<(), Self::Error> {
        let line = message.to_string();

        buf.reserve(line.len() + 2);
        buf.extend_from_slice(line.as_bytes());
        buf.extend_from_slice(b"\r\n");

        Ok(())
    }
}
